//! Point ionosphere models: vertical TEC and F2 peak height over one location

use crate::types::{IonoError, IonoResult};
use chrono::{DateTime, Timelike, Utc};
use std::f64::consts::PI;

/// GPS L1 carrier (Hz), the reference of the Klobuchar delay
const L1_FREQUENCY: f64 = 1575.42e6;
const SPEED_OF_LIGHT: f64 = 299_792_458.0;
const K_IONO: f64 = 40.308193;

/// Output of a point model query
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointIonoSample {
    /// Vertical TEC between the ground and the ceiling altitude (el/m^2)
    pub tec: f64,
    /// Height of the F2 layer peak (km), if the model provides one
    pub hmf2_km: Option<f64>,
}

/// Ionosphere model evaluated at a single point and instant
pub trait PointIonosphereModel: Send + Sync {
    /// Vertical TEC from the ground up to `ceiling_km`, plus the F2 peak height
    fn evaluate(
        &self,
        instant: DateTime<Utc>,
        lat: f64,
        lon: f64,
        ceiling_km: f64,
    ) -> IonoResult<PointIonoSample>;
}

/// Klobuchar day-time cosine for the column content, distributed in height
/// by an alpha-Chapman layer peaking at `hmf2_km`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KlobucharChapmanModel {
    pub alpha: [f64; 4],
    pub beta: [f64; 4],
    pub hmf2_km: f64,
    pub scale_height_km: f64,
}

impl Default for KlobucharChapmanModel {
    fn default() -> Self {
        Self {
            // Typical broadcast coefficients
            alpha: [1.1176e-8, 7.4506e-9, -5.9605e-8, -1.1921e-7],
            beta: [90_112.0, 0.0, -196_608.0, -131_072.0],
            hmf2_km: 350.0,
            scale_height_km: 60.0,
        }
    }
}

impl KlobucharChapmanModel {
    pub fn new(alpha: [f64; 4], beta: [f64; 4]) -> Self {
        Self { alpha, beta, ..Self::default() }
    }

    pub fn with_peak(mut self, hmf2_km: f64, scale_height_km: f64) -> Self {
        self.hmf2_km = hmf2_km;
        self.scale_height_km = scale_height_km;
        self
    }

    /// Zenith group delay at L1 (s)
    pub fn vertical_delay(&self, instant: DateTime<Utc>, lat: f64, lon: f64) -> f64 {
        // Semicircles, IPP taken at the user position for a zenith path
        let phi_i = (lat / 180.0).clamp(-0.416, 0.416);
        let lambda_i = lon / 180.0;
        let phi_m = phi_i + 0.064 * ((lambda_i - 1.617) * PI).cos();

        let time_of_day = instant.num_seconds_from_midnight() as f64;
        let t = (43_200.0 * lambda_i + time_of_day).rem_euclid(86_400.0);

        let polynomial = |c: &[f64; 4]| c[0] + phi_m * (c[1] + phi_m * (c[2] + phi_m * c[3]));
        let amplitude = polynomial(&self.alpha).max(0.0);
        let period = polynomial(&self.beta).max(72_000.0);

        let x = 2.0 * PI * (t - 50_400.0) / period;
        if x.abs() < 1.57 {
            5e-9 + amplitude * (1.0 - x * x / 2.0 + x.powi(4) / 24.0)
        } else {
            5e-9
        }
    }

    /// Fraction of the Chapman layer content below `height_km`
    pub fn fraction_below(&self, height_km: f64) -> f64 {
        let cumulative = |h: f64| (-(-(h - self.hmf2_km) / self.scale_height_km).exp()).exp();
        let ground = cumulative(0.0);
        ((cumulative(height_km) - ground) / (1.0 - ground)).clamp(0.0, 1.0)
    }
}

impl PointIonosphereModel for KlobucharChapmanModel {
    fn evaluate(
        &self,
        instant: DateTime<Utc>,
        lat: f64,
        lon: f64,
        ceiling_km: f64,
    ) -> IonoResult<PointIonoSample> {
        if !(lat.is_finite() && lon.is_finite() && ceiling_km.is_finite()) {
            return Err(IonoError::Processing(format!(
                "Invalid point model query at ({}, {}) up to {} km",
                lat, lon, ceiling_km
            )));
        }
        let delay = self.vertical_delay(instant, lat, lon);
        let total_tec = delay * SPEED_OF_LIGHT * L1_FREQUENCY * L1_FREQUENCY / K_IONO;

        Ok(PointIonoSample {
            tec: total_tec * self.fraction_below(ceiling_km),
            hmf2_km: Some(self.hmf2_km),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::TimeZone;

    #[test]
    fn test_night_floor() {
        let model = KlobucharChapmanModel::default();
        // 02:00 local at Greenwich
        let night = Utc.with_ymd_and_hms(2021, 3, 1, 2, 0, 0).unwrap();
        assert_relative_eq!(model.vertical_delay(night, 0.0, 0.0), 5e-9);

        let sample = model.evaluate(night, 0.0, 0.0, 20_000.0).unwrap();
        let expected = 5e-9 * SPEED_OF_LIGHT * L1_FREQUENCY * L1_FREQUENCY / K_IONO;
        assert_relative_eq!(sample.tec, expected, max_relative = 1e-9);
        assert_eq!(sample.hmf2_km, Some(350.0));
    }

    #[test]
    fn test_afternoon_exceeds_night() {
        let model = KlobucharChapmanModel::default();
        let noon = Utc.with_ymd_and_hms(2021, 3, 1, 14, 0, 0).unwrap();
        let night = Utc.with_ymd_and_hms(2021, 3, 1, 2, 0, 0).unwrap();
        assert!(model.vertical_delay(noon, 10.0, 0.0) > model.vertical_delay(night, 10.0, 0.0));
    }

    #[test]
    fn test_chapman_fraction() {
        let model = KlobucharChapmanModel::default();
        assert!(model.fraction_below(0.0).abs() < 1e-12);
        assert_relative_eq!(model.fraction_below(350.0), (-1.0f64).exp(), max_relative = 1e-9);
        assert!(model.fraction_below(20_000.0) > 0.999_999);
        assert!(model.fraction_below(700.0) > model.fraction_below(450.0));
    }

    #[test]
    fn test_rejects_nan_position() {
        let model = KlobucharChapmanModel::default();
        let instant = Utc.with_ymd_and_hms(2021, 3, 1, 2, 0, 0).unwrap();
        assert!(model.evaluate(instant, f64::NAN, 0.0, 700.0).is_err());
    }
}
