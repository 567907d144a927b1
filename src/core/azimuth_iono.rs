//! Azimuth shift caused by the ionosphere across a TOPS burst overlap

use crate::config::{AzimuthMethod, PhysicalConstants};
use crate::core::iono_geometry::{FrameTecSeries, InstantTec};
use crate::types::{FrameRecord, IonoError, IonoResult};
use std::f64::consts::PI;

pub struct AzimuthIonoEstimator {
    constants: PhysicalConstants,
    method: AzimuthMethod,
}

impl AzimuthIonoEstimator {
    pub fn new(constants: PhysicalConstants, method: AzimuthMethod) -> Self {
        Self { constants, method }
    }

    pub fn method(&self) -> AzimuthMethod {
        self.method
    }

    /// Doppler centroid difference of the frame, population default when
    /// missing or zero
    pub fn resolve_df_dc(&self, frame: &FrameRecord) -> f64 {
        match frame.df_dc {
            Some(df_dc) if df_dc.is_finite() && df_dc != 0.0 => df_dc,
            _ => {
                log::warn!(
                    "Frame {} has no dfDC, using default {} Hz",
                    frame.frame,
                    self.constants.default_df_dc
                );
                self.constants.default_df_dc
            }
        }
    }

    /// Shift (pixels) from the slant TEC change at the burst edges.
    ///
    /// Positive values are to be subtracted from the observed offset.
    pub fn gradient_shift(&self, df_dc: f64, master: &InstantTec, epoch: &InstantTec) -> f64 {
        let c = &self.constants;
        let (f_high, f_low) = c.overlap_frequencies(df_dc);
        let tec_overlap =
            (master.tecs_a - epoch.tecs_a) / f_high - (master.tecs_b - epoch.tecs_b) / f_low;
        2.0 * c.prf * c.k_iono / (c.speed_of_light * df_dc) * tec_overlap
    }

    /// Legacy burst phase-ramp shift (pixels) after Liang et al. (2019)
    pub fn liang_shift(
        &self,
        df_dc: f64,
        ka: f64,
        satellite_altitude: f64,
        master: &InstantTec,
        epoch: &InstantTec,
    ) -> f64 {
        let c = &self.constants;
        let (f_high, f_low) = c.overlap_frequencies(df_dc);

        let doppler_shift = |tec: &InstantTec| {
            let phase_low = -4.0 * PI * c.k_iono / c.speed_of_light / f_low * tec.tecs_b;
            let phase_high = -4.0 * PI * c.k_iono / c.speed_of_light / f_high * tec.tecs_a;
            let ramp_rate = (phase_high - phase_low) / c.burst_interval; // rad/s
            let shell_ratio = tec.shell_height_km * 1000.0 / satellite_altitude;
            -(1.0 / (2.0 * PI)) * ramp_rate / ka * (shell_ratio + 0.5) // s
        };

        c.prf * (doppler_shift(epoch) - doppler_shift(master))
    }

    pub fn to_millimetres(shift_px: f64, azimuth_resolution: f64) -> f64 {
        shift_px * azimuth_resolution * 1000.0
    }

    /// Ionosphere azimuth correction (mm) for every epoch of the series
    pub fn estimate(&self, frame: &FrameRecord, series: &FrameTecSeries) -> IonoResult<Vec<f64>> {
        let df_dc = self.resolve_df_dc(frame);

        let shifts: Vec<f64> = match self.method {
            AzimuthMethod::Gradient => series
                .epochs
                .iter()
                .map(|epoch| self.gradient_shift(df_dc, &series.master, epoch))
                .collect(),
            AzimuthMethod::Liang => {
                let ka = frame
                    .ka
                    .filter(|ka| ka.is_finite() && *ka != 0.0)
                    .ok_or_else(|| {
                        IonoError::Metadata(format!(
                            "Frame {} has no azimuth FM rate (ka) for the Liang estimator",
                            frame.frame
                        ))
                    })?;
                let altitude = series.geometry.satellite_altitude;
                series
                    .epochs
                    .iter()
                    .map(|epoch| self.liang_shift(df_dc, ka, altitude, &series.master, epoch))
                    .collect()
            }
        };

        Ok(shifts
            .into_iter()
            .map(|px| Self::to_millimetres(px, frame.azimuth_resolution))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::{TimeZone, Utc};

    fn tec(a: f64, b: f64) -> InstantTec {
        InstantTec {
            instant: Utc.with_ymd_and_hms(2020, 1, 1, 17, 30, 0).unwrap(),
            shell_height_km: 450.0,
            tecs_a: a,
            tecs_b: b,
        }
    }

    fn frame_with_df_dc(df_dc: Option<f64>) -> FrameRecord {
        FrameRecord {
            frame: "117A_05094_131313".to_string(),
            master: chrono::NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
            centre_time: chrono::NaiveTime::from_hms_opt(17, 30, 0).unwrap(),
            heading: 0.0,
            center_lat: 45.0,
            center_lon: 10.0,
            avg_incidence_angle: 39.0,
            centre_range_m: 880_000.0,
            centre_range_ok_m: None,
            df_dc,
            azimuth_resolution: 14.0,
            ka: None,
            iono: Default::default(),
        }
    }

    #[test]
    fn test_df_dc_default_when_missing() {
        let estimator = AzimuthIonoEstimator::new(PhysicalConstants::default(), AzimuthMethod::Gradient);
        for df_dc in [None, Some(0.0), Some(f64::NAN)] {
            assert_eq!(estimator.resolve_df_dc(&frame_with_df_dc(df_dc)), 4365.0);
        }
        assert_eq!(estimator.resolve_df_dc(&frame_with_df_dc(Some(4100.0))), 4100.0);
    }

    #[test]
    fn test_gradient_golden_value() {
        let estimator = AzimuthIonoEstimator::new(PhysicalConstants::default(), AzimuthMethod::Gradient);
        let (f_high, _) = PhysicalConstants::default().overlap_frequencies(4365.0);
        assert_eq!(f_high, 5_405_002_682.5);

        let px = estimator.gradient_shift(4365.0, &tec(40e16, 40e16), &tec(41e16, 40e16));
        assert_relative_eq!(px, -0.05544888365114049, max_relative = 1e-12);

        let mm = AzimuthIonoEstimator::to_millimetres(px, 14.0);
        assert_relative_eq!(mm, -776.2843711159669, max_relative = 1e-12);
    }

    #[test]
    fn test_no_tec_change_no_shift() {
        let estimator = AzimuthIonoEstimator::new(PhysicalConstants::default(), AzimuthMethod::Gradient);
        let same = tec(3e17, 3e17);
        assert_eq!(estimator.gradient_shift(4365.0, &same, &same), 0.0);

        let liang = AzimuthIonoEstimator::new(PhysicalConstants::default(), AzimuthMethod::Liang);
        assert_eq!(liang.liang_shift(4365.0, -2300.0, 700e3, &same, &same), 0.0);
    }

    #[test]
    fn test_liang_responds_to_edge_difference() {
        let estimator = AzimuthIonoEstimator::new(PhysicalConstants::default(), AzimuthMethod::Liang);
        let master = tec(3e17, 3e17);
        let up = estimator.liang_shift(4365.0, -2300.0, 700e3, &master, &tec(3.1e17, 3e17));
        let down = estimator.liang_shift(4365.0, -2300.0, 700e3, &master, &tec(2.9e17, 3e17));
        assert!(up != 0.0);
        assert_relative_eq!(up, -down, max_relative = 1e-6);
    }
}
