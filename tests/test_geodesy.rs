use approx::assert_relative_eq;
use daz_iono::core::geodesy::{
    aer_to_ecef, displace, ecef_to_geodetic, geodetic_to_ecef, geodesic_midpoint,
    path_intersection, GeoPath,
};
use daz_iono::types::GeoPoint;

#[test]
fn test_ecef_round_trip_across_globe() {
    for &(lat, lon, alt) in &[
        (45.0, 10.0, 0.0),
        (-33.9, 151.2, 120.0),
        (78.2, -15.6, 693_000.0),
        (0.0, 179.9, 450_000.0),
    ] {
        let point = ecef_to_geodetic(geodetic_to_ecef(lat, lon, alt));
        assert_relative_eq!(point.latitude, lat, epsilon = 1e-7);
        assert_relative_eq!(point.longitude, lon, epsilon = 1e-8);
        assert_relative_eq!(point.altitude, alt, epsilon = 1e-2);
    }
}

#[test]
fn test_line_of_sight_scales_linearly() {
    // Points along one straight line of sight keep their ECEF proportions
    let scene = GeoPoint::new(45.0, 10.0);
    let origin = geodetic_to_ecef(45.0, 10.0, 0.0);
    let far = aer_to_ecef(-90.0, 51.0, 880_000.0, &scene);
    let near = aer_to_ecef(-90.0, 51.0, 440_000.0, &scene);
    for k in 0..3 {
        assert_relative_eq!(near[k] - origin[k], 0.5 * (far[k] - origin[k]), epsilon = 1e-6);
    }
}

#[test]
fn test_search_segment_intersection() {
    // Meridian segment through (45, 9) crossed by the path from the scene
    // centre towards a point south-west of it
    let crossing = GeoPoint::new(45.0, 9.0);
    let search = GeoPath::new(
        displace(&crossing, 20_000.0, 180.0).unwrap(),
        displace(&crossing, 20_000.0, 0.0).unwrap(),
    );
    let towards = GeoPath::new(GeoPoint::new(45.0, 10.0), GeoPoint::new(44.8, 8.0));
    let point = path_intersection(&search, &towards).unwrap();

    assert_relative_eq!(point.longitude, 9.0, epsilon = 1e-9);
    assert!(point.latitude < 45.0 && point.latitude > 44.8);

    let mid = geodesic_midpoint(&towards.start, &towards.end).unwrap();
    assert!(mid.longitude > 8.0 && mid.longitude < 10.0);
}
