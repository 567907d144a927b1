//! WGS84 coordinate transforms and geodesic helpers used to place the
//! ionosphere pierce points of a frame.
//!
//! Point conversions go through `map_3d` (radians in, radians out) and
//! ellipsoidal geodesics through `geo`. Great-circle intersections work on
//! n-vectors (the unit surface normal), so they are well defined anywhere
//! except for coincident paths.

use crate::types::{GeoPoint, IonoError, IonoResult};
use geo::{GeodesicDestination, GeodesicIntermediate, Point};
use map_3d::{aer2ecef, deg2rad, ecef2geodetic, geodetic2ecef, rad2deg, Ellipsoid};

const DEGENERATE_NORM: f64 = 1e-12;

/// Great-circle path between two points
#[derive(Debug, Clone, Copy)]
pub struct GeoPath {
    pub start: GeoPoint,
    pub end: GeoPoint,
}

impl GeoPath {
    pub fn new(start: GeoPoint, end: GeoPoint) -> Self {
        Self { start, end }
    }
}

/// Convert geodetic latitude/longitude (degrees) and ellipsoidal height (m) to ECEF
pub fn geodetic_to_ecef(lat: f64, lon: f64, alt: f64) -> [f64; 3] {
    let (x, y, z) = geodetic2ecef(deg2rad(lat), deg2rad(lon), alt, Ellipsoid::WGS84);
    [x, y, z]
}

/// Convert ECEF coordinates to geodetic latitude, longitude and height
pub fn ecef_to_geodetic(xyz: [f64; 3]) -> GeoPoint {
    let (lat, lon, alt) = ecef2geodetic(xyz[0], xyz[1], xyz[2], Ellipsoid::WGS84);
    GeoPoint::with_altitude(rad2deg(lat), rad2deg(lon), alt)
}

/// Convert a local azimuth/elevation/range observation into ECEF.
///
/// Azimuth is clockwise from north, observer height in meters.
pub fn aer_to_ecef(
    azimuth_deg: f64,
    elevation_deg: f64,
    slant_range: f64,
    observer: &GeoPoint,
) -> [f64; 3] {
    let (x, y, z) = aer2ecef(
        deg2rad(azimuth_deg),
        deg2rad(elevation_deg),
        slant_range,
        deg2rad(observer.latitude),
        deg2rad(observer.longitude),
        observer.altitude,
        Ellipsoid::WGS84,
    );
    [x, y, z]
}

/// Surface normal (n-vector) of a geodetic point
pub fn to_nvector(point: &GeoPoint) -> [f64; 3] {
    let (slat, clat) = point.latitude.to_radians().sin_cos();
    let (slon, clon) = point.longitude.to_radians().sin_cos();
    [clat * clon, clat * slon, slat]
}

/// Geodetic point (zero height) of an n-vector
pub fn from_nvector(n: [f64; 3]) -> GeoPoint {
    let lat = n[2].atan2((n[0] * n[0] + n[1] * n[1]).sqrt());
    let lon = n[1].atan2(n[0]);
    GeoPoint::new(lat.to_degrees(), lon.to_degrees())
}

fn to_geo(point: &GeoPoint) -> Point<f64> {
    Point::new(point.longitude, point.latitude)
}

fn from_geo(point: Point<f64>, context: impl FnOnce() -> String) -> IonoResult<GeoPoint> {
    if !point.x().is_finite() || !point.y().is_finite() {
        return Err(IonoError::Geometry(context()));
    }
    Ok(GeoPoint::new(point.y(), wrap_longitude(point.x())))
}

/// Point at `fraction` along the geodesic from `a` to `b`
pub fn geodesic_interpolate(a: &GeoPoint, b: &GeoPoint, fraction: f64) -> IonoResult<GeoPoint> {
    let point = to_geo(a).geodesic_intermediate(&to_geo(b), fraction);
    from_geo(point, || {
        format!(
            "Cannot interpolate between ({:.4}, {:.4}) and ({:.4}, {:.4})",
            a.latitude, a.longitude, b.latitude, b.longitude
        )
    })
}

/// Midpoint of the geodesic between two points
pub fn geodesic_midpoint(a: &GeoPoint, b: &GeoPoint) -> IonoResult<GeoPoint> {
    geodesic_interpolate(a, b, 0.5)
}

/// Move a point by `distance` meters along the ellipsoidal geodesic starting
/// at `azimuth_deg`
pub fn displace(point: &GeoPoint, distance: f64, azimuth_deg: f64) -> IonoResult<GeoPoint> {
    let moved = to_geo(point).geodesic_destination(azimuth_deg, distance);
    from_geo(moved, || {
        format!(
            "Geodesic displacement failed ({} m at azimuth {:.3})",
            distance, azimuth_deg
        )
    })
}

/// Intersection of two great circles, taking the solution on the side of the
/// paths' own points
pub fn path_intersection(path_a: &GeoPath, path_b: &GeoPath) -> IonoResult<GeoPoint> {
    let a1 = to_nvector(&path_a.start);
    let a2 = to_nvector(&path_a.end);
    let b1 = to_nvector(&path_b.start);
    let b2 = to_nvector(&path_b.end);

    let normal_a = cross(a1, a2);
    let normal_b = cross(b1, b2);
    let candidate = normalize(cross(normal_a, normal_b)).ok_or_else(|| {
        IonoError::Geometry("Great-circle paths are parallel or degenerate".to_string())
    })?;

    let reference = [
        a1[0] + a2[0] + b1[0] + b2[0],
        a1[1] + a2[1] + b1[1] + b2[1],
        a1[2] + a2[2] + b1[2] + b2[2],
    ];
    let side = dot(candidate, reference);
    if side == 0.0 || !side.is_finite() {
        return Err(IonoError::Geometry(
            "Ambiguous great-circle intersection".to_string(),
        ));
    }
    let sign = side.signum();

    Ok(from_nvector([sign * candidate[0], sign * candidate[1], sign * candidate[2]]))
}

/// Wrap a longitude into [-180, 180)
pub fn wrap_longitude(lon: f64) -> f64 {
    (lon + 180.0).rem_euclid(360.0) - 180.0
}

fn cross(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

fn dot(a: [f64; 3], b: [f64; 3]) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

fn normalize(v: [f64; 3]) -> Option<[f64; 3]> {
    let norm = dot(v, v).sqrt();
    if norm < DEGENERATE_NORM || !norm.is_finite() {
        return None;
    }
    Some([v[0] / norm, v[1] / norm, v[2] / norm])
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_equator_prime_meridian() {
        let [x, y, z] = geodetic_to_ecef(0.0, 0.0, 0.0);
        assert_abs_diff_eq!(x, 6_378_137.0, epsilon = 1e-6);
        assert_abs_diff_eq!(y, 0.0, epsilon = 1e-6);
        assert_abs_diff_eq!(z, 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_ecef_round_trip() {
        for &(lat, lon, alt) in &[
            (51.5, -1.25, 120.0),
            (-33.9, 151.2, 0.0),
            (89.9, 45.0, 700_000.0),
            (0.0, 179.99, 450_000.0),
        ] {
            let point = ecef_to_geodetic(geodetic_to_ecef(lat, lon, alt));
            assert_abs_diff_eq!(point.latitude, lat, epsilon = 1e-7);
            assert_abs_diff_eq!(point.longitude, lon, epsilon = 1e-9);
            assert_abs_diff_eq!(point.altitude, alt, epsilon = 1e-2);
        }
    }

    #[test]
    fn test_aer_zenith() {
        let observer = GeoPoint::new(40.0, 15.0);
        let point = ecef_to_geodetic(aer_to_ecef(0.0, 90.0, 700_000.0, &observer));
        assert_abs_diff_eq!(point.latitude, 40.0, epsilon = 1e-9);
        assert_abs_diff_eq!(point.longitude, 15.0, epsilon = 1e-9);
        assert_abs_diff_eq!(point.altitude, 700_000.0, epsilon = 1e-3);
    }

    #[test]
    fn test_aer_east_looking() {
        // Looking east along the horizon moves the point east and up
        let observer = GeoPoint::new(0.0, 0.0);
        let point = ecef_to_geodetic(aer_to_ecef(90.0, 0.0, 100_000.0, &observer));
        assert!(point.longitude > 0.0);
        assert_abs_diff_eq!(point.latitude, 0.0, epsilon = 1e-7);
        assert!(point.altitude > 0.0);
    }

    #[test]
    fn test_midpoint_on_equator() {
        let mid = geodesic_midpoint(&GeoPoint::new(0.0, 0.0), &GeoPoint::new(0.0, 90.0)).unwrap();
        assert_abs_diff_eq!(mid.latitude, 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(mid.longitude, 45.0, epsilon = 1e-9);
    }

    #[test]
    fn test_midpoint_on_meridian() {
        let mid = geodesic_midpoint(&GeoPoint::new(10.0, 5.0), &GeoPoint::new(20.0, 5.0)).unwrap();
        assert_abs_diff_eq!(mid.longitude, 5.0, epsilon = 1e-9);
        assert_abs_diff_eq!(mid.latitude, 15.0, epsilon = 0.05);
    }

    #[test]
    fn test_displace_north() {
        let start = GeoPoint::new(0.0, 10.0);
        // One degree of latitude at the equator is 110574.4 m on WGS84
        let moved = displace(&start, 110_574.4, 0.0).unwrap();
        assert_abs_diff_eq!(moved.latitude, 1.0, epsilon = 1e-4);
        assert_abs_diff_eq!(moved.longitude, 10.0, epsilon = 1e-9);
    }

    #[test]
    fn test_displace_and_back() {
        let start = GeoPoint::new(45.0, 7.0);
        let out = displace(&start, 9_791.88, 180.0).unwrap();
        assert!(out.latitude < start.latitude);
        let back = displace(&out, 9_791.88, 0.0).unwrap();
        assert_abs_diff_eq!(back.latitude, start.latitude, epsilon = 1e-9);
        assert_abs_diff_eq!(back.longitude, start.longitude, epsilon = 1e-9);
    }

    #[test]
    fn test_intersection_equator_meridian() {
        let equator = GeoPath::new(GeoPoint::new(0.0, -10.0), GeoPoint::new(0.0, 10.0));
        let meridian = GeoPath::new(GeoPoint::new(-5.0, 3.0), GeoPoint::new(5.0, 3.0));
        let hit = path_intersection(&equator, &meridian).unwrap();
        assert_abs_diff_eq!(hit.latitude, 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(hit.longitude, 3.0, epsilon = 1e-9);
    }

    #[test]
    fn test_intersection_same_circle_fails() {
        let a = GeoPath::new(GeoPoint::new(0.0, -10.0), GeoPoint::new(0.0, 10.0));
        let b = GeoPath::new(GeoPoint::new(0.0, 20.0), GeoPoint::new(0.0, 30.0));
        assert!(path_intersection(&a, &b).is_err());
    }

    #[test]
    fn test_wrap_longitude() {
        assert_abs_diff_eq!(wrap_longitude(190.0), -170.0);
        assert_abs_diff_eq!(wrap_longitude(-190.0), 170.0);
        assert_abs_diff_eq!(wrap_longitude(180.0), -180.0);
        assert_abs_diff_eq!(wrap_longitude(45.0), 45.0);
    }
}
