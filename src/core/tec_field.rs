//! Space-time vertical TEC fields and their interpolation.
//!
//! Global ionosphere maps are produced in a sun-fixed frame, so interpolating
//! between two map epochs first rotates the query longitude by the Earth
//! rotation elapsed since (or until) each epoch, then blends the two spatial
//! estimates linearly in time (Schaer et al., 1998, IONEX 1.1).

use crate::core::geodesy::wrap_longitude;
use crate::types::{IonoError, IonoResult};
use chrono::{DateTime, NaiveDate, Timelike, Utc};
use ndarray::Array3;

const SECONDS_PER_DAY: f64 = 86_400.0;

/// How to interpolate between map epochs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Interpolation {
    /// Earth-rotation corrected blend of the bracketing maps
    #[default]
    Rotated,
    /// Plain trilinear interpolation in time, latitude and longitude
    Direct,
}

/// Spatial TEC maps sharing one latitude/longitude grid
#[derive(Debug, Clone)]
pub struct TecGrid {
    /// Latitude axis in degrees, monotonic (either direction)
    pub latitudes: Vec<f64>,
    /// Longitude axis in degrees, monotonic increasing
    pub longitudes: Vec<f64>,
    /// Vertical TEC (el/m^2), indexed as (time, latitude, longitude)
    pub values: Array3<f64>,
}

impl TecGrid {
    pub fn new(latitudes: Vec<f64>, longitudes: Vec<f64>, values: Array3<f64>) -> IonoResult<Self> {
        let (_, n_lat, n_lon) = values.dim();
        if n_lat != latitudes.len() || n_lon != longitudes.len() {
            return Err(IonoError::InvalidFormat(format!(
                "TEC grid shape {:?} does not match axes ({} latitudes, {} longitudes)",
                values.dim(),
                latitudes.len(),
                longitudes.len()
            )));
        }
        if latitudes.len() < 2 || longitudes.len() < 2 {
            return Err(IonoError::InvalidFormat(
                "TEC grid needs at least two latitudes and two longitudes".to_string(),
            ));
        }
        Ok(Self { latitudes, longitudes, values })
    }

    pub fn epoch_count(&self) -> usize {
        self.values.dim().0
    }

    /// Bilinear interpolation of one map. NaN outside the grid.
    pub fn bilinear(&self, time_index: usize, lat: f64, lon: f64) -> f64 {
        let (Some(lat_b), Some(lon_b)) = (bracket(&self.latitudes, lat), bracket(&self.longitudes, lon))
        else {
            return f64::NAN;
        };
        let value = |i: usize, j: usize| self.values[[time_index, i, j]];

        let lower = lerp(value(lat_b.0, lon_b.0), value(lat_b.0, lon_b.1), lon_b.2);
        let upper = lerp(value(lat_b.1, lon_b.0), value(lat_b.1, lon_b.1), lon_b.2);
        lerp(lower, upper, lat_b.2)
    }

    /// Value of the grid node nearest to (lat, lon)
    pub fn nearest_node(&self, time_index: usize, lat: f64, lon: f64) -> Option<f64> {
        if time_index >= self.epoch_count() {
            return None;
        }
        let i = nearest_index(&self.latitudes, lat)?;
        let j = nearest_index(&self.longitudes, lon)?;
        Some(self.values[[time_index, i, j]])
    }
}

/// Hourly maps of one UTC day (CODE / IONEX), time axis in decimal hours
#[derive(Debug, Clone)]
pub struct LegacyTecField {
    pub day: NaiveDate,
    pub hours: Vec<f64>,
    pub grid: TecGrid,
}

/// 15-minute maps (JPL HR-GIM) keyed by absolute epochs
#[derive(Debug, Clone)]
pub struct HighResTecField {
    pub epochs: Vec<DateTime<Utc>>,
    pub grid: TecGrid,
}

/// Vertical TEC over space and time for one day of products
#[derive(Debug, Clone)]
pub enum TecField {
    Legacy(LegacyTecField),
    HighRes(HighResTecField),
}

impl TecField {
    pub fn legacy(day: NaiveDate, hours: Vec<f64>, grid: TecGrid) -> IonoResult<Self> {
        check_time_axis(hours.len(), grid.epoch_count())?;
        Ok(TecField::Legacy(LegacyTecField { day, hours, grid }))
    }

    pub fn high_res(epochs: Vec<DateTime<Utc>>, grid: TecGrid) -> IonoResult<Self> {
        check_time_axis(epochs.len(), grid.epoch_count())?;
        Ok(TecField::HighRes(HighResTecField { epochs, grid }))
    }

    pub fn grid(&self) -> &TecGrid {
        match self {
            TecField::Legacy(field) => &field.grid,
            TecField::HighRes(field) => &field.grid,
        }
    }

    /// Number of maps in the field
    pub fn sample_count(&self) -> usize {
        self.grid().epoch_count()
    }

    pub fn is_high_resolution(&self) -> bool {
        matches!(self, TecField::HighRes(_))
    }

    /// Earth-rotation corrected vertical TEC at (lat, lon) and `instant`
    pub fn vertical_tec(&self, lat: f64, lon: f64, instant: DateTime<Utc>) -> f64 {
        self.vertical_tec_with(lat, lon, instant, Interpolation::Rotated)
    }

    /// Vertical TEC (el/m^2) at (lat, lon) and `instant`; NaN when the
    /// instant or position falls outside the field
    pub fn vertical_tec_with(
        &self,
        lat: f64,
        lon: f64,
        instant: DateTime<Utc>,
        interpolation: Interpolation,
    ) -> f64 {
        // Both shapes reduce to a time axis in seconds plus the query offset on it
        let (axis, t) = match self {
            TecField::Legacy(field) => {
                let hour = instant.num_seconds_from_midnight() as f64 / 3600.0
                    + instant.nanosecond() as f64 * 1e-9 / 3600.0;
                let axis: Vec<f64> = field.hours.iter().map(|h| h * 3600.0).collect();
                (axis, hour * 3600.0)
            }
            TecField::HighRes(field) => {
                let origin = field.epochs[0];
                let axis: Vec<f64> = field
                    .epochs
                    .iter()
                    .map(|epoch| seconds_between(origin, *epoch))
                    .collect();
                (axis, seconds_between(origin, instant))
            }
        };

        let Some((pre, post)) = bracket_epochs(&axis, t) else {
            log::debug!("Instant {} outside the TEC field time axis", instant);
            return f64::NAN;
        };
        let grid = self.grid();

        match interpolation {
            Interpolation::Rotated => {
                let lon0 = wrap_longitude(lon + (t - axis[pre]) / SECONDS_PER_DAY * 360.0);
                let tec0 = grid.bilinear(pre, lat, lon0);
                if pre == post {
                    return tec0;
                }
                let lon1 = wrap_longitude(lon + (t - axis[post]) / SECONDS_PER_DAY * 360.0);
                let tec1 = grid.bilinear(post, lat, lon1);
                let span = axis[post] - axis[pre];
                (axis[post] - t) / span * tec0 + (t - axis[pre]) / span * tec1
            }
            Interpolation::Direct => {
                let tec0 = grid.bilinear(pre, lat, lon);
                if pre == post {
                    return tec0;
                }
                let tec1 = grid.bilinear(post, lat, lon);
                lerp(tec0, tec1, (t - axis[pre]) / (axis[post] - axis[pre]))
            }
        }
    }

    /// Stored value of the node nearest to (lat, lon) in map `time_index`
    pub fn nearest_node(&self, time_index: usize, lat: f64, lon: f64) -> Option<f64> {
        self.grid().nearest_node(time_index, lat, lon)
    }
}

fn check_time_axis(axis_len: usize, maps: usize) -> IonoResult<()> {
    if axis_len != maps || maps == 0 {
        return Err(IonoError::InvalidFormat(format!(
            "Time axis has {} entries for {} TEC maps",
            axis_len, maps
        )));
    }
    Ok(())
}

fn seconds_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    let delta = to - from;
    delta.num_milliseconds() as f64 / 1000.0
}

/// Indices of the last axis entry <= t and the first entry >= t
fn bracket_epochs(axis: &[f64], t: f64) -> Option<(usize, usize)> {
    let pre = axis.iter().rposition(|&x| x <= t)?;
    let post = axis.iter().position(|&x| x >= t)?;
    Some((pre, post))
}

/// Bracketing indices and fractional weight of `x` on a monotonic axis
fn bracket(axis: &[f64], x: f64) -> Option<(usize, usize, f64)> {
    if !x.is_finite() {
        return None;
    }
    let n = axis.len();
    let ascending = axis[n - 1] >= axis[0];
    let (lo, hi) = if ascending { (axis[0], axis[n - 1]) } else { (axis[n - 1], axis[0]) };
    if x < lo || x > hi {
        return None;
    }
    for i in 0..n - 1 {
        let (a, b) = (axis[i], axis[i + 1]);
        let inside = if ascending { a <= x && x <= b } else { b <= x && x <= a };
        if inside {
            let weight = if b == a { 0.0 } else { (x - a) / (b - a) };
            return Some((i, i + 1, weight));
        }
    }
    None
}

fn nearest_index(axis: &[f64], x: f64) -> Option<usize> {
    if !x.is_finite() {
        return None;
    }
    axis.iter()
        .enumerate()
        .min_by(|a, b| (a.1 - x).abs().total_cmp(&(b.1 - x).abs()))
        .map(|(i, _)| i)
}

fn lerp(a: f64, b: f64, weight: f64) -> f64 {
    if weight == 0.0 {
        a
    } else if weight == 1.0 {
        b
    } else {
        a + (b - a) * weight
    }
}
