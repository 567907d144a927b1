//! IONEX reader for the hourly CODE global ionosphere maps
//!
//! Only the TEC maps are read; RMS and height maps are skipped. The map grid
//! is the fixed CODE layout: 87.5 to -87.5 deg latitude in 2.5 deg steps and
//! -180 to 180 deg longitude in 5 deg steps.

use crate::core::tec_field::{TecField, TecGrid};
use crate::types::{IonoError, IonoResult};
use chrono::NaiveDate;
use ndarray::Array3;
use std::path::Path;

/// Raw value marking a missing node
const MISSING_VALUE: f64 = 9999.0;
/// el/m^2 per TECU
const TECU: f64 = 1e16;
/// Used when the header carries no EXPONENT record
const DEFAULT_EXPONENT: i32 = -1;

const LAT_FIRST: f64 = 87.5;
const LAT_STEP: f64 = -2.5;
const LAT_COUNT: usize = 71;
const LON_FIRST: f64 = -180.0;
const LON_STEP: f64 = 5.0;
const LON_COUNT: usize = 73;

/// Header records needed to decode the maps
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IonexHeader {
    pub exponent: i32,
    /// Time between maps (s)
    pub interval_secs: u32,
}

impl IonexHeader {
    /// Map epochs as hours of day, 0 to 24 inclusive
    pub fn hours(&self) -> Vec<f64> {
        let count = (86_400 / self.interval_secs) as usize + 1;
        let step = self.interval_secs as f64 / 3600.0;
        (0..count).map(|i| i as f64 * step).collect()
    }
}

/// Read an IONEX file holding one day of maps
pub fn read_ionex_file<P: AsRef<Path>>(path: P, day: NaiveDate) -> IonoResult<TecField> {
    log::info!("Reading IONEX file: {}", path.as_ref().display());
    let content = std::fs::read_to_string(path.as_ref())?;
    parse_ionex(&content, day)
}

/// Parse IONEX text into a daily TEC field (el/m^2)
pub fn parse_ionex(content: &str, day: NaiveDate) -> IonoResult<TecField> {
    let header = parse_header(content)?;
    let maps = parse_tec_maps(content)?;

    let hours = header.hours();
    if maps.len() != hours.len() {
        return Err(IonoError::InvalidFormat(format!(
            "IONEX holds {} TEC maps but INTERVAL {} s implies {}",
            maps.len(),
            header.interval_secs,
            hours.len()
        )));
    }

    let scale = 10f64.powi(header.exponent) * TECU;
    let mut values = Array3::<f64>::zeros((maps.len(), LAT_COUNT, LON_COUNT));
    for (t, map) in maps.iter().enumerate() {
        for (i, row) in map.iter().enumerate() {
            let mut row: Vec<f64> = row
                .iter()
                .map(|&v| if v == MISSING_VALUE { f64::NAN } else { v })
                .collect();
            fill_missing(&mut row);
            for (j, v) in row.into_iter().enumerate() {
                values[[t, i, j]] = v * scale;
            }
        }
    }

    let latitudes = (0..LAT_COUNT).map(|i| LAT_FIRST + LAT_STEP * i as f64).collect();
    let longitudes = (0..LON_COUNT).map(|j| LON_FIRST + LON_STEP * j as f64).collect();
    let grid = TecGrid::new(latitudes, longitudes, values)?;

    log::debug!(
        "IONEX for {}: {} maps, exponent {}, interval {} s",
        day,
        hours.len(),
        header.exponent,
        header.interval_secs
    );
    TecField::legacy(day, hours, grid)
}

/// Record label of a header line (columns 61-80)
fn label(line: &str) -> &str {
    line.get(60..).map(str::trim).unwrap_or("")
}

fn parse_header(content: &str) -> IonoResult<IonexHeader> {
    let mut exponent = None;
    let mut interval = None;

    for line in content.lines() {
        match label(line) {
            "END OF HEADER" => break,
            "EXPONENT" => exponent = first_field::<i32>(line),
            "INTERVAL" => interval = first_field::<f64>(line),
            _ => {}
        }
    }

    let interval_secs = match interval {
        Some(v) if v >= 1.0 && 86_400 % (v as u32) == 0 => v as u32,
        Some(v) => {
            return Err(IonoError::InvalidFormat(format!("Unsupported IONEX INTERVAL {}", v)))
        }
        None => return Err(IonoError::InvalidFormat("IONEX header has no INTERVAL".to_string())),
    };

    let exponent = exponent.unwrap_or_else(|| {
        log::warn!("IONEX header has no EXPONENT, assuming {}", DEFAULT_EXPONENT);
        DEFAULT_EXPONENT
    });

    Ok(IonexHeader { exponent, interval_secs })
}

fn first_field<T: std::str::FromStr>(line: &str) -> Option<T> {
    line.get(..60).unwrap_or(line).split_whitespace().next()?.parse().ok()
}

/// Raw TEC maps as [latitude rows][longitude values]
fn parse_tec_maps(content: &str) -> IonoResult<Vec<Vec<Vec<f64>>>> {
    let mut maps = Vec::new();
    let mut current: Option<Vec<Vec<f64>>> = None;

    for line in content.lines() {
        match label(line) {
            "START OF TEC MAP" => current = Some(Vec::new()),
            "END OF TEC MAP" => {
                if let Some(map) = current.take() {
                    check_map_shape(&map, maps.len())?;
                    maps.push(map);
                }
            }
            "LAT/LON1/LON2/DLON/H" => {
                if let Some(map) = current.as_mut() {
                    map.push(Vec::with_capacity(LON_COUNT));
                }
            }
            // Data lines run to column 80, so they are told apart by content.
            // EPOCH OF CURRENT MAP and in-map EXPONENT records fail to parse.
            _ => {
                if let Some(row) = current.as_mut().and_then(|map| map.last_mut()) {
                    let values: Option<Vec<f64>> =
                        line.split_whitespace().map(|t| t.parse().ok()).collect();
                    if let Some(values) = values {
                        row.extend(values);
                    }
                }
            }
        }
    }

    if maps.is_empty() {
        return Err(IonoError::InvalidFormat("IONEX holds no TEC maps".to_string()));
    }
    Ok(maps)
}

fn check_map_shape(map: &[Vec<f64>], index: usize) -> IonoResult<()> {
    if map.len() != LAT_COUNT || map.iter().any(|row| row.len() != LON_COUNT) {
        return Err(IonoError::InvalidFormat(format!(
            "TEC map {} is not {}x{}",
            index + 1,
            LAT_COUNT,
            LON_COUNT
        )));
    }
    Ok(())
}

/// Replace NaN entries by linear interpolation along the row, extrapolating
/// linearly from the two outermost valid values at either end
fn fill_missing(row: &mut [f64]) {
    let valid: Vec<usize> = (0..row.len()).filter(|&i| !row[i].is_nan()).collect();
    if valid.len() == row.len() || valid.is_empty() {
        return;
    }
    if valid.len() == 1 {
        let v = row[valid[0]];
        row.iter_mut().for_each(|x| *x = v);
        return;
    }

    for i in 0..row.len() {
        if !row[i].is_nan() {
            continue;
        }
        let upper = valid.partition_point(|&k| k < i);
        let (lo, hi) = if upper == 0 {
            (valid[0], valid[1])
        } else if upper == valid.len() {
            (valid[upper - 2], valid[upper - 1])
        } else {
            (valid[upper - 1], valid[upper])
        };
        let slope = (row[hi] - row[lo]) / (hi - lo) as f64;
        row[i] = row[lo] + slope * (i as f64 - lo as f64);
    }
}
