//! Core ionosphere processing modules

pub mod geodesy;
pub mod tec_field;
pub mod point_model;
pub mod tec_source;
pub mod iono_geometry;
pub mod azimuth_iono;
pub mod batch;

// Re-export main types
pub use geodesy::GeoPath;
pub use tec_field::{Interpolation, TecField, TecGrid};
pub use point_model::{KlobucharChapmanModel, PointIonoSample, PointIonosphereModel};
pub use tec_source::{GridTecSource, ModelTecSource, TecSource};
pub use iono_geometry::{FrameGeometry, FrameTecSeries, InstantTec, IonoGeometryModel, PiercePoints};
pub use azimuth_iono::AzimuthIonoEstimator;
pub use batch::{apply_iono_correction, build_source, BatchSummary, FrameBatchRunner, FrameOutcome};
