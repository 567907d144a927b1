#![allow(dead_code)]

use chrono::{Datelike, NaiveDate, NaiveTime};
use daz_iono::types::{FrameIonoStats, FrameRecord};
use std::path::{Path, PathBuf};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn record(content: &str, label: &str) -> String {
    format!("{:<60}{}\n", content, label)
}

/// IONEX text with 25 hourly maps on the CODE grid. `raw(lat, lon)` gives the
/// stored value in 0.1 TECU.
pub fn ionex_text(raw: impl Fn(f64, f64) -> i32) -> String {
    let mut text = String::new();
    text += &record("     1.0            IONOSPHERE MAPS     GNSS", "IONEX VERSION / TYPE");
    text += &record("  3600", "INTERVAL");
    text += &record("    -1", "EXPONENT");
    text += &record("", "END OF HEADER");

    for m in 0..25 {
        text += &record(&format!("{:>6}", m + 1), "START OF TEC MAP");
        text += &record(&format!("  2020     1     1 {:>5}     0     0", m), "EPOCH OF CURRENT MAP");
        for i in 0..71 {
            let lat = 87.5 - 2.5 * i as f64;
            text += &record(&format!("  {:6.1}-180.0 180.0   5.0 450.0", lat), "LAT/LON1/LON2/DLON/H");
            let values: Vec<String> = (0..73)
                .map(|j| format!("{:5}", raw(lat, -180.0 + 5.0 * j as f64)))
                .collect();
            for chunk in values.chunks(16) {
                text += &chunk.concat();
                text += "\n";
            }
        }
        text += &record(&format!("{:>6}", m + 1), "END OF TEC MAP");
    }
    text += &record("", "END OF FILE");
    text
}

/// Cache file name of the CODE daily map
pub fn code_name(day: NaiveDate) -> String {
    format!("CODG{:03}0.{:02}I", day.ordinal(), day.year() % 100)
}

pub fn write_ionex(dir: &Path, day: NaiveDate, raw: impl Fn(f64, f64) -> i32) -> PathBuf {
    let path = dir.join(code_name(day));
    std::fs::write(&path, ionex_text(raw)).expect("Failed to write IONEX file");
    path
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

/// Ascending-like frame over northern Italy, heading due north
pub fn test_frame(name: &str) -> FrameRecord {
    FrameRecord {
        frame: name.to_string(),
        master: date(2020, 1, 1),
        centre_time: NaiveTime::from_hms_opt(17, 30, 0).expect("valid time"),
        heading: 0.0,
        center_lat: 45.0,
        center_lon: 10.0,
        avg_incidence_angle: 39.0,
        centre_range_m: 880_000.0,
        centre_range_ok_m: None,
        df_dc: Some(4365.0),
        azimuth_resolution: 14.0,
        ka: Some(-2300.0),
        iono: FrameIonoStats::default(),
    }
}
