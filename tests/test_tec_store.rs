mod common;

use chrono::{TimeZone, Utc};
use common::{code_name, date, init_logging, ionex_text, write_ionex};
use daz_iono::config::{StoreConfig, TecScaling};
use daz_iono::core::tec_source::{GridTecSource, TecSource};
use daz_iono::io::TecGridStore;
use daz_iono::types::GeoPoint;
use std::io::Write;
use tempfile::TempDir;

#[test]
fn test_offline_store_reads_cached_ionex() {
    init_logging();
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    write_ionex(temp_dir.path(), date(2020, 1, 13), |_, _| 250);

    let store = TecGridStore::new(StoreConfig::offline(temp_dir.path()));
    let instant = Utc.with_ymd_and_hms(2020, 1, 13, 17, 42, 10).unwrap();
    let field = store.field_for(instant).expect("Failed to load cached map");

    assert_eq!(field.sample_count(), 25);
    assert!(!field.is_high_resolution());
    let tec = field.vertical_tec(44.3, 9.1, instant);
    println!("TEC from constant map: {:.4e}", tec);
    assert!((tec - 25e16).abs() < 1e6);

    // Same day is served from memory
    std::fs::remove_file(temp_dir.path().join(code_name(date(2020, 1, 13)))).unwrap();
    assert!(store.field_for(instant).is_ok());
}

#[test]
fn test_compressed_long_name_is_unpacked() {
    use flate2::write::GzEncoder;
    use flate2::Compression;

    init_logging();
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let archive = temp_dir.path().join("COD0OPSFIN_20231300000_01D_01H_GIM.INX.gz");
    let mut encoder = GzEncoder::new(std::fs::File::create(&archive).unwrap(), Compression::default());
    encoder.write_all(ionex_text(|_, _| 120).as_bytes()).unwrap();
    encoder.finish().unwrap();

    let store = TecGridStore::new(StoreConfig::offline(temp_dir.path()));
    let field = store.field_for_day(date(2023, 5, 10)).expect("Failed to load archived map");

    assert!((field.nearest_node(3, 0.0, 0.0).unwrap() - 12e16).abs() < 1e6);
    assert!(!archive.exists());
    assert!(temp_dir.path().join("COD0OPSFIN_20231300000_01D_01H_GIM.INX").exists());
}

#[test]
fn test_grid_source_scaling_and_longitude_rule() {
    init_logging();
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    // 0.1 TECU per degree of longitude east of the antimeridian
    write_ionex(temp_dir.path(), date(2020, 1, 13), |_, lon| (lon + 200.0).round() as i32);

    let store = TecGridStore::new(StoreConfig::offline(temp_dir.path()));
    let source = GridTecSource::new(store, TecScaling::Fixed(0.85));

    // Map epoch: no rotation shift
    let instant = Utc.with_ymd_and_hms(2020, 1, 13, 0, 0, 0).unwrap();
    let at_10 = source.sample(&GeoPoint::new(20.0, 10.0), instant, 700.0).unwrap();
    assert!((at_10 - 0.85 * 21e16).abs() < 1e6);

    let at_190 = source.sample(&GeoPoint::new(20.0, 190.0), instant, 700.0).unwrap();
    assert!((at_190 - at_10).abs() < 1e-6 * at_10);
}

#[test]
fn test_missing_day_is_unavailable() {
    init_logging();
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    write_ionex(temp_dir.path(), date(2020, 1, 13), |_, _| 250);

    let store = TecGridStore::new(StoreConfig::offline(temp_dir.path()));
    let source = GridTecSource::new(store, TecScaling::default());
    let instant = Utc.with_ymd_and_hms(2020, 1, 14, 12, 0, 0).unwrap();
    assert!(source.sample(&GeoPoint::new(45.0, 10.0), instant, 700.0).is_err());
}
