//! JPL high-resolution GIM reader (NetCDF)

use crate::core::tec_field::{TecField, TecGrid};
use crate::types::{IonoError, IonoResult};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use ndarray::Array3;
use std::path::Path;

/// el/m^2 per TECU
const TECU: f64 = 1e16;

/// Largest `time` value accepted as an offset (about 3000 years)
const MAX_OFFSET_SECS: f64 = 1e11;

/// Epoch of the `time` variable: 2000-01-01 12:00:00 UTC
fn j2000() -> IonoResult<DateTime<Utc>> {
    NaiveDate::from_ymd_opt(2000, 1, 1)
        .and_then(|d| d.and_hms_opt(12, 0, 0))
        .map(|dt| dt.and_utc())
        .ok_or_else(|| IonoError::Processing("Invalid J2000 epoch".to_string()))
}

/// Absolute epoch of a `time` entry in seconds from J2000
fn epoch_from_seconds(origin: DateTime<Utc>, seconds: f64) -> IonoResult<DateTime<Utc>> {
    let invalid = || IonoError::InvalidFormat(format!("Invalid HR-GIM time value {}", seconds));
    if !seconds.is_finite() || seconds.abs() > MAX_OFFSET_SECS {
        return Err(invalid());
    }
    let offset = Duration::milliseconds((seconds * 1000.0).round() as i64);
    origin.checked_add_signed(offset).ok_or_else(invalid)
}

fn read_variable(file: &netcdf::File, name: &str) -> IonoResult<(Vec<f64>, Vec<usize>)> {
    let var = file
        .variable(name)
        .ok_or_else(|| IonoError::InvalidFormat(format!("NetCDF variable '{}' missing", name)))?;
    let shape = var.dimensions().iter().map(|d| d.len()).collect();
    let values = var.get_values::<f64, _>(..)?;
    Ok((values, shape))
}

/// Read a `jpldDDD0.YYi.nc` file: `tecmap(time, lat, lon)` in TECU
pub fn read_jpl_gim<P: AsRef<Path>>(path: P) -> IonoResult<TecField> {
    log::info!("Reading JPL HR-GIM file: {}", path.as_ref().display());
    let file = netcdf::open(path.as_ref())?;

    let (seconds, _) = read_variable(&file, "time")?;
    let (latitudes, _) = read_variable(&file, "lat")?;
    let (longitudes, _) = read_variable(&file, "lon")?;
    let (tecmap, shape) = read_variable(&file, "tecmap")?;

    let expected = [seconds.len(), latitudes.len(), longitudes.len()];
    if shape != expected {
        return Err(IonoError::InvalidFormat(format!(
            "tecmap has shape {:?}, expected {:?}",
            shape, expected
        )));
    }

    let values = Array3::from_shape_vec((expected[0], expected[1], expected[2]), tecmap)
        .map_err(|e| IonoError::InvalidFormat(format!("tecmap layout: {}", e)))?
        .mapv(|v| v * TECU);

    let origin = j2000()?;
    let epochs = seconds
        .iter()
        .map(|&s| epoch_from_seconds(origin, s))
        .collect::<IonoResult<Vec<_>>>()?;

    log::debug!(
        "HR-GIM: {} maps on a {}x{} grid starting {}",
        epochs.len(),
        latitudes.len(),
        longitudes.len(),
        epochs.first().map(|e| e.to_rfc3339()).unwrap_or_default()
    );

    let grid = TecGrid::new(latitudes, longitudes, values)?;
    TecField::high_res(epochs, grid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::tec_field::TecField;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn write_tecmap(path: &Path, times: &[f64]) -> Result<(), netcdf::Error> {
        let latitudes = [-10.0, 0.0, 10.0];
        let longitudes = [-20.0, -10.0, 0.0, 10.0];
        let mut file = netcdf::create(path)?;
        file.add_dimension("time", times.len())?;
        file.add_dimension("lat", latitudes.len())?;
        file.add_dimension("lon", longitudes.len())?;

        file.add_variable::<f64>("time", &["time"])?.put_values(times, ..)?;
        file.add_variable::<f64>("lat", &["lat"])?.put_values(&latitudes[..], ..)?;
        file.add_variable::<f64>("lon", &["lon"])?.put_values(&longitudes[..], ..)?;

        // TECU rising with the map index
        let tecmap: Vec<f64> = (0..times.len())
            .flat_map(|t| std::iter::repeat(10.0 + t as f64).take(latitudes.len() * longitudes.len()))
            .collect();
        file.add_variable::<f64>("tecmap", &["time", "lat", "lon"])?
            .put_values(&tecmap, ..)?;
        Ok(())
    }

    #[test]
    fn test_reads_epochs_and_scales_to_electrons() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("jpld1300.23i.nc");
        // 2023-05-10 00:00 and 00:15 UTC
        let start = 736_948_800.0;
        write_tecmap(&path, &[start, start + 900.0]).unwrap();

        let field = read_jpl_gim(&path).unwrap();
        assert!(field.is_high_resolution());
        assert_eq!(field.sample_count(), 2);

        let TecField::HighRes(high_res) = &field else {
            panic!("expected a high-resolution field");
        };
        assert_eq!(high_res.epochs[0], Utc.with_ymd_and_hms(2023, 5, 10, 0, 0, 0).unwrap());
        assert_eq!(high_res.epochs[1], Utc.with_ymd_and_hms(2023, 5, 10, 0, 15, 0).unwrap());

        assert_eq!(field.nearest_node(0, 0.0, 0.0), Some(10.0 * TECU));
        assert_eq!(field.nearest_node(1, 10.0, -20.0), Some(11.0 * TECU));
    }

    #[test]
    fn test_fill_value_time_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("jpld1300.23i.nc");
        write_tecmap(&path, &[736_948_800.0, 9.969_209_968_386_869e36]).unwrap();

        assert!(matches!(read_jpl_gim(&path), Err(IonoError::InvalidFormat(_))));
    }

    #[test]
    fn test_epoch_offsets() {
        let origin = j2000().unwrap();
        assert_eq!(
            epoch_from_seconds(origin, 0.0).unwrap(),
            Utc.with_ymd_and_hms(2000, 1, 1, 12, 0, 0).unwrap()
        );
        assert_eq!(
            epoch_from_seconds(origin, -43_200.0).unwrap(),
            Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0).unwrap()
        );
        assert!(epoch_from_seconds(origin, f64::NAN).is_err());
        assert!(epoch_from_seconds(origin, f64::MAX).is_err());
    }
}
