//! daz-iono: ionospheric azimuth-shift estimation for Sentinel-1 TOPS frames
//!
//! For every frame and acquisition, the slant TEC at the two burst-overlap
//! edges is sampled from a point ionosphere model or from daily global
//! ionosphere maps (JPL HR-GIM, CODE IONEX), and converted into the azimuth
//! offset the ionosphere adds between an acquisition and the frame's
//! reference acquisition.

pub mod types;
pub mod config;
pub mod io;
pub mod core;

// Re-export main types and functions for easier access
pub use types::{
    GeoPoint, FrameRecord, EpochRecord, FrameIonoStats, EpochIonoColumns,
    IonoError, IonoResult, FrameError,
};
pub use config::{AzimuthMethod, IonoConfig, PhysicalConstants, StoreConfig, TecScaling, TecSourceKind};
pub use io::TecGridStore;
pub use crate::core::{
    apply_iono_correction, AzimuthIonoEstimator, BatchSummary, FrameBatchRunner,
    IonoGeometryModel, KlobucharChapmanModel, PointIonosphereModel, TecField, TecSource,
};

use std::sync::Arc;

/// Fill the ionosphere columns of both tables using the configured source
pub fn extract_iono(
    config: &IonoConfig,
    model: Arc<dyn PointIonosphereModel>,
    frames: &mut [FrameRecord],
    epochs: &mut [EpochRecord],
) -> BatchSummary {
    log::info!(
        "Extracting ionosphere for {} frames from the {} source",
        frames.len(),
        config.source
    );
    let source = crate::core::build_source(config, model);
    FrameBatchRunner::new(config, source.as_ref()).run(frames, epochs)
}
