pub mod ionex;
pub mod tec_store;

#[cfg(feature = "netcdf")]
pub mod gim_netcdf;

pub use tec_store::{GimProduct, TecGridStore};
