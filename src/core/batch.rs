//! Frame-by-frame driver filling the ionosphere columns of the frame and
//! epoch tables

use crate::config::{IonoConfig, TecSourceKind};
use crate::core::azimuth_iono::AzimuthIonoEstimator;
use crate::core::iono_geometry::{FrameTecSeries, IonoGeometryModel};
use crate::core::point_model::PointIonosphereModel;
use crate::core::tec_source::{GridTecSource, ModelTecSource, TecSource};
use crate::io::tec_store::TecGridStore;
use crate::types::{
    EpochIonoColumns, EpochRecord, FrameError, FrameIonoStats, FrameRecord, IonoResult,
};
use chrono::NaiveDate;
use std::sync::Arc;

/// Results of one frame
#[derive(Debug, Clone)]
pub struct FrameOutcome {
    pub frame: String,
    /// One entry per requested epoch date, in order
    pub epochs: Vec<EpochIonoColumns>,
    pub stats: FrameIonoStats,
}

/// Summary of a batch run
#[derive(Debug, Default)]
pub struct BatchSummary {
    pub processed: usize,
    pub failed: Vec<FrameError>,
}

impl BatchSummary {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Build the TEC source selected by the configuration
pub fn build_source(config: &IonoConfig, model: Arc<dyn PointIonosphereModel>) -> Box<dyn TecSource> {
    match config.source {
        TecSourceKind::Model => Box::new(ModelTecSource::new(model)),
        TecSourceKind::Grid => {
            let store = TecGridStore::new(config.store.clone());
            Box::new(GridTecSource::new(store, config.scaling).with_model(model))
        }
    }
}

pub struct FrameBatchRunner<'a> {
    geometry: IonoGeometryModel<'a>,
    estimator: AzimuthIonoEstimator,
    model_heights: bool,
}

impl<'a> FrameBatchRunner<'a> {
    pub fn new(config: &IonoConfig, source: &'a dyn TecSource) -> Self {
        let model_heights = config.model_heights();
        Self {
            geometry: IonoGeometryModel::new(config.constants, source, model_heights),
            estimator: AzimuthIonoEstimator::new(config.constants, config.method),
            model_heights,
        }
    }

    /// Ionosphere columns of one frame for the given epoch dates
    pub fn process_frame(
        &self,
        frame: &FrameRecord,
        epoch_dates: &[NaiveDate],
    ) -> Result<FrameOutcome, FrameError> {
        self.try_process_frame(frame, epoch_dates)
            .map_err(|e| FrameError::new(frame.frame.clone(), e))
    }

    fn try_process_frame(
        &self,
        frame: &FrameRecord,
        epoch_dates: &[NaiveDate],
    ) -> IonoResult<FrameOutcome> {
        let series = self.geometry.frame_tec(frame, epoch_dates)?;
        let corrections = self.estimator.estimate(frame, &series)?;

        let epochs = series
            .epochs
            .iter()
            .zip(corrections)
            .map(|(tec, daz_iono_mm)| EpochIonoColumns {
                tecs_a: tec.tecs_a,
                tecs_b: tec.tecs_b,
                daz_iono_mm,
                daz_mm_noiono: None,
            })
            .collect();

        Ok(FrameOutcome {
            frame: frame.frame.clone(),
            epochs,
            stats: self.frame_stats(&series),
        })
    }

    fn frame_stats(&self, series: &FrameTecSeries) -> FrameIonoStats {
        let (hiono, hiono_std, hiono_range) = if self.model_heights {
            height_statistics(&series.shell_heights())
        } else {
            (self.geometry.constants().default_shell_height_km, 0.0, 0.0)
        };
        FrameIonoStats {
            hiono,
            hiono_std,
            hiono_range,
            tecs_a: series.master.tecs_a,
            tecs_b: series.master.tecs_b,
        }
    }

    /// Process every frame, writing results into both tables.
    ///
    /// Output columns are reset first; a failed frame keeps the reset values
    /// and does not stop the run.
    pub fn run(&self, frames: &mut [FrameRecord], epochs: &mut [EpochRecord]) -> BatchSummary {
        for frame in frames.iter_mut() {
            frame.iono = FrameIonoStats::default();
        }
        for epoch in epochs.iter_mut() {
            epoch.iono = EpochIonoColumns::default();
        }

        let mut summary = BatchSummary::default();
        let total = frames.len();
        for (n, frame) in frames.iter_mut().enumerate() {
            log::info!("Processing frame {} ({} of {})", frame.frame, n + 1, total);

            let rows: Vec<usize> = epochs
                .iter()
                .enumerate()
                .filter(|(_, e)| e.frame == frame.frame)
                .map(|(i, _)| i)
                .collect();
            let dates: Vec<NaiveDate> = rows.iter().map(|&i| epochs[i].epochdate).collect();

            match self.process_frame(frame, &dates) {
                Ok(outcome) => {
                    for (&row, columns) in rows.iter().zip(outcome.epochs) {
                        epochs[row].iono = columns;
                    }
                    frame.iono = outcome.stats;
                    summary.processed += 1;
                }
                Err(e) => {
                    log::warn!("Skipping {}", e);
                    summary.failed.push(e);
                }
            }
        }

        if !summary.failed.is_empty() {
            log::warn!("{} of {} frames failed", summary.failed.len(), total);
        }
        summary
    }
}

/// Mean, population standard deviation and range
fn height_statistics(heights: &[f64]) -> (f64, f64, f64) {
    if heights.is_empty() {
        return (0.0, 0.0, 0.0);
    }
    let n = heights.len() as f64;
    let mean = heights.iter().sum::<f64>() / n;
    let variance = heights.iter().map(|h| (h - mean).powi(2)).sum::<f64>() / n;
    let max = heights.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let min = heights.iter().copied().fold(f64::INFINITY, f64::min);
    (mean, variance.sqrt(), max - min)
}

/// Fill `daz_mm_noiono` from the tide-corrected offsets where available,
/// otherwise the raw offsets
pub fn apply_iono_correction(epochs: &mut [EpochRecord]) {
    for epoch in epochs.iter_mut() {
        epoch.iono.daz_mm_noiono = epoch
            .daz_mm_notide
            .or(epoch.daz_mm)
            .map(|daz| daz - epoch.iono.daz_iono_mm);
    }
}
