//! Single-layer ionosphere geometry of a TOPS burst overlap
//!
//! For each acquisition the slant path from the scene centre to the two
//! burst edges crosses the ionosphere shell at two points, A (backward edge)
//! and B (forward edge). The slant TEC at these points drives the azimuth
//! shift estimate.

use crate::config::PhysicalConstants;
use crate::core::geodesy::{
    aer_to_ecef, displace, ecef_to_geodetic, geodesic_midpoint, path_intersection, GeoPath,
};
use crate::core::tec_source::TecSource;
use crate::types::{FrameRecord, GeoPoint, IonoError, IonoResult};
use chrono::{DateTime, NaiveDate, Utc};

/// Frame geometry shared by every acquisition of the frame
#[derive(Debug, Clone, Copy)]
pub struct FrameGeometry {
    pub scene_center: GeoPoint,
    /// Sub-satellite point at the scene centre time
    pub satellite_ground: GeoPoint,
    /// Satellite height above the ellipsoid (m)
    pub satellite_altitude: f64,
    /// Midway between scene centre and sub-satellite point, where the peak
    /// height is queried
    pub peak_query_point: GeoPoint,
    /// Sub-satellite point half a burst backwards (A') and forwards (B')
    pub burst_edge_a: GeoPoint,
    pub burst_edge_b: GeoPoint,
    pub heading: f64,
    pub incidence: f64,
    pub slant_range: f64,
}

impl FrameGeometry {
    /// Azimuth from scene to satellite, right-looking sensor
    pub fn look_azimuth(&self) -> f64 {
        self.heading - 90.0
    }

    pub fn look_elevation(&self) -> f64 {
        90.0 - self.incidence
    }

    /// Upper bound of the TEC column below the satellite (km)
    pub fn tec_ceiling_km(&self) -> f64 {
        (self.satellite_altitude / 1000.0).round()
    }
}

/// Shell crossing and the two TEC sampling points for one shell height
#[derive(Debug, Clone, Copy)]
pub struct PiercePoints {
    /// Ground position of the shell crossing on the scene-centre line of sight
    pub shell_ground: GeoPoint,
    pub a: GeoPoint,
    pub b: GeoPoint,
}

/// Slant TEC of one acquisition (el/m^2)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InstantTec {
    pub instant: DateTime<Utc>,
    pub shell_height_km: f64,
    pub tecs_a: f64,
    pub tecs_b: f64,
}

/// Slant TEC series of a frame, reference acquisition split off
#[derive(Debug, Clone)]
pub struct FrameTecSeries {
    pub geometry: FrameGeometry,
    /// In the order of the requested epoch dates
    pub epochs: Vec<InstantTec>,
    pub master: InstantTec,
}

impl FrameTecSeries {
    /// Shell heights of all acquisitions, reference last
    pub fn shell_heights(&self) -> Vec<f64> {
        self.epochs
            .iter()
            .chain(std::iter::once(&self.master))
            .map(|e| e.shell_height_km)
            .collect()
    }
}

pub struct IonoGeometryModel<'a> {
    constants: PhysicalConstants,
    source: &'a dyn TecSource,
    model_heights: bool,
}

impl<'a> IonoGeometryModel<'a> {
    pub fn new(constants: PhysicalConstants, source: &'a dyn TecSource, model_heights: bool) -> Self {
        Self {
            constants,
            source,
            model_heights,
        }
    }

    pub fn constants(&self) -> &PhysicalConstants {
        &self.constants
    }

    /// Satellite position and burst edges of a frame
    pub fn frame_geometry(&self, frame: &FrameRecord) -> IonoResult<FrameGeometry> {
        validate_frame(frame)?;

        let scene_center = frame.scene_center();
        let slant_range = frame.slant_range();
        let heading = frame.heading;
        let incidence = frame.avg_incidence_angle;

        // Slant range is relative to the ellipsoid, scene height 0
        let satellite = ecef_to_geodetic(aer_to_ecef(
            heading - 90.0,
            90.0 - incidence,
            slant_range,
            &scene_center,
        ));
        if !(satellite.altitude > 0.0) {
            return Err(IonoError::Geometry(format!(
                "Satellite altitude {:.1} m derived for frame {}",
                satellite.altitude, frame.frame
            )));
        }
        let satellite_ground = GeoPoint::new(satellite.latitude, satellite.longitude);

        let half_burst = self.constants.burst_length() / 2.0;
        let geometry = FrameGeometry {
            scene_center,
            satellite_ground,
            satellite_altitude: satellite.altitude,
            peak_query_point: geodesic_midpoint(&scene_center, &satellite_ground)?,
            burst_edge_a: displace(&satellite_ground, half_burst, heading - 180.0)?,
            burst_edge_b: displace(&satellite_ground, half_burst, heading)?,
            heading,
            incidence,
            slant_range,
        };

        log::debug!(
            "Frame {}: satellite over ({:.4}, {:.4}) at {:.1} km",
            frame.frame,
            satellite_ground.latitude,
            satellite_ground.longitude,
            geometry.satellite_altitude / 1000.0
        );
        Ok(geometry)
    }

    /// Shell height (km) for each instant
    pub fn shell_heights(
        &self,
        geometry: &FrameGeometry,
        instants: &[DateTime<Utc>],
    ) -> IonoResult<Vec<f64>> {
        if !self.model_heights {
            return Ok(vec![self.constants.default_shell_height_km; instants.len()]);
        }

        instants
            .iter()
            .map(|&instant| {
                self.source
                    .estimate_peak_height(
                        &geometry.peak_query_point,
                        instant,
                        self.constants.peak_query_ceiling_km,
                    )
                    .unwrap_or_else(|| {
                        Err(IonoError::Unavailable(format!(
                            "{} source cannot estimate the ionosphere peak height",
                            self.source.kind()
                        )))
                    })
            })
            .collect()
    }

    /// Sampling points A and B for a shell at `shell_height_km`
    pub fn pierce_points(&self, geometry: &FrameGeometry, shell_height_km: f64) -> IonoResult<PiercePoints> {
        let shell_height = shell_height_km * 1000.0;
        let shell_range = geometry.slant_range * shell_height / geometry.satellite_altitude;
        let crossing = ecef_to_geodetic(aer_to_ecef(
            geometry.look_azimuth(),
            geometry.look_elevation(),
            shell_range,
            &geometry.scene_center,
        ));
        let shell_ground = GeoPoint::new(crossing.latitude, crossing.longitude);

        let burst_length = self.constants.burst_length();
        let search = GeoPath::new(
            displace(&shell_ground, burst_length, geometry.heading - 180.0)?,
            displace(&shell_ground, burst_length, geometry.heading)?,
        );

        let a = path_intersection(&search, &GeoPath::new(geometry.scene_center, geometry.burst_edge_a))?;
        let b = path_intersection(&search, &GeoPath::new(geometry.scene_center, geometry.burst_edge_b))?;
        Ok(PiercePoints { shell_ground, a, b })
    }

    /// Vertical to slant TEC factor of the single-layer model
    pub fn slant_factor(&self, incidence_deg: f64, shell_height_km: f64) -> f64 {
        let re = self.constants.earth_radius;
        let sin_shell = re / (re + shell_height_km * 1000.0) * incidence_deg.to_radians().sin();
        1.0 / (1.0 - sin_shell * sin_shell).sqrt()
    }

    /// Slant TEC at A and B for one acquisition. Failed TEC queries give NaN.
    pub fn instant_tec(
        &self,
        geometry: &FrameGeometry,
        instant: DateTime<Utc>,
        shell_height_km: f64,
    ) -> IonoResult<InstantTec> {
        let points = self.pierce_points(geometry, shell_height_km)?;
        let factor = self.slant_factor(geometry.incidence, shell_height_km);
        let ceiling = geometry.tec_ceiling_km();

        Ok(InstantTec {
            instant,
            shell_height_km,
            tecs_a: self.sample_or_nan(&points.a, instant, ceiling) * factor,
            tecs_b: self.sample_or_nan(&points.b, instant, ceiling) * factor,
        })
    }

    fn sample_or_nan(&self, point: &GeoPoint, instant: DateTime<Utc>, ceiling_km: f64) -> f64 {
        match self.source.sample(point, instant, ceiling_km) {
            Ok(tec) => tec,
            Err(e) => {
                log::warn!(
                    "No TEC at ({:.3}, {:.3}) for {}: {}",
                    point.latitude,
                    point.longitude,
                    instant,
                    e
                );
                f64::NAN
            }
        }
    }

    /// Slant TEC series for the given epochs plus the frame's reference date
    pub fn frame_tec(&self, frame: &FrameRecord, epoch_dates: &[NaiveDate]) -> IonoResult<FrameTecSeries> {
        if epoch_dates.is_empty() {
            return Err(IonoError::Metadata(format!("Frame {} has no epochs", frame.frame)));
        }
        let geometry = self.frame_geometry(frame)?;

        // Reference acquisition last
        let instants: Vec<DateTime<Utc>> = epoch_dates
            .iter()
            .chain(std::iter::once(&frame.master))
            .map(|&date| frame.acquisition_time(date))
            .collect();
        let heights = self.shell_heights(&geometry, &instants)?;

        let mut epochs = instants
            .iter()
            .zip(heights)
            .map(|(&instant, height)| self.instant_tec(&geometry, instant, height))
            .collect::<IonoResult<Vec<_>>>()?;

        let master = epochs
            .pop()
            .ok_or_else(|| IonoError::Processing("Empty acquisition list".to_string()))?;
        Ok(FrameTecSeries {
            geometry,
            epochs,
            master,
        })
    }
}

fn validate_frame(frame: &FrameRecord) -> IonoResult<()> {
    let range = frame.slant_range();
    if !(range.is_finite() && range > 0.0) {
        return Err(IonoError::Metadata(format!("Invalid centre range {}", range)));
    }
    let incidence = frame.avg_incidence_angle;
    if !(incidence > 0.0 && incidence < 90.0) {
        return Err(IonoError::Metadata(format!("Invalid incidence angle {}", incidence)));
    }
    if !frame.heading.is_finite() {
        return Err(IonoError::Metadata("Heading is not finite".to_string()));
    }
    let center = frame.scene_center();
    if !(center.is_finite() && center.latitude.abs() <= 90.0) {
        return Err(IonoError::Metadata(format!(
            "Invalid scene centre ({}, {})",
            center.latitude, center.longitude
        )));
    }
    Ok(())
}
