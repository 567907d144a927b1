use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

/// Geographic point on the WGS84 ellipsoid
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,  // degrees
    pub longitude: f64, // degrees
    pub altitude: f64,  // meters above the ellipsoid
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude, altitude: 0.0 }
    }

    pub fn with_altitude(latitude: f64, longitude: f64, altitude: f64) -> Self {
        Self { latitude, longitude, altitude }
    }

    pub fn is_finite(&self) -> bool {
        self.latitude.is_finite() && self.longitude.is_finite() && self.altitude.is_finite()
    }
}

/// One Sentinel-1 frame: acquisition geometry plus the ionosphere statistics
/// written back by the batch runner
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameRecord {
    pub frame: String,
    pub master: NaiveDate,
    pub centre_time: NaiveTime,
    pub heading: f64,             // degrees
    pub center_lat: f64,          // degrees
    pub center_lon: f64,          // degrees
    pub avg_incidence_angle: f64, // degrees
    pub centre_range_m: f64,
    /// Range re-estimated after the GAMMA centre_range issue, preferred when present
    #[serde(default)]
    pub centre_range_ok_m: Option<f64>,
    /// Doppler centroid difference across the burst overlap (Hz)
    #[serde(default, rename = "dfDC")]
    pub df_dc: Option<f64>,
    pub azimuth_resolution: f64, // meters
    /// Azimuth FM rate (Hz/s), only needed by the legacy Liang estimator
    #[serde(default)]
    pub ka: Option<f64>,
    #[serde(flatten)]
    pub iono: FrameIonoStats,
}

impl FrameRecord {
    /// Slant range to the scene centre, corrected value first
    pub fn slant_range(&self) -> f64 {
        match self.centre_range_ok_m {
            Some(r) if r.is_finite() && r > 0.0 => r,
            _ => self.centre_range_m,
        }
    }

    /// Acquisition instant of the given date at this frame's centre time
    pub fn acquisition_time(&self, date: NaiveDate) -> DateTime<Utc> {
        date.and_time(self.centre_time).and_utc()
    }

    pub fn scene_center(&self) -> GeoPoint {
        GeoPoint::new(self.center_lat, self.center_lon)
    }
}

/// Per-frame ionosphere outputs
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameIonoStats {
    #[serde(rename = "Hiono", default)]
    pub hiono: f64, // km
    #[serde(rename = "Hiono_std", default)]
    pub hiono_std: f64,
    #[serde(rename = "Hiono_range", default)]
    pub hiono_range: f64,
    /// Slant TEC at burst edge A for the reference epoch (el/m^2)
    #[serde(rename = "tecs_A", default)]
    pub tecs_a: f64,
    #[serde(rename = "tecs_B", default)]
    pub tecs_b: f64,
}

/// One non-reference acquisition of a frame
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpochRecord {
    pub frame: String,
    pub epochdate: NaiveDate,
    /// Observed azimuth offset (mm)
    #[serde(default)]
    pub daz_mm: Option<f64>,
    /// Observed azimuth offset with solid-earth tides removed (mm)
    #[serde(default)]
    pub daz_mm_notide: Option<f64>,
    #[serde(flatten)]
    pub iono: EpochIonoColumns,
}

impl EpochRecord {
    pub fn new(frame: impl Into<String>, epochdate: NaiveDate) -> Self {
        Self {
            frame: frame.into(),
            epochdate,
            daz_mm: None,
            daz_mm_notide: None,
            iono: EpochIonoColumns::default(),
        }
    }
}

/// Per-epoch ionosphere outputs
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EpochIonoColumns {
    #[serde(rename = "tecs_A", default)]
    pub tecs_a: f64,
    #[serde(rename = "tecs_B", default)]
    pub tecs_b: f64,
    /// Correction to subtract from the observed azimuth offset (mm)
    #[serde(default)]
    pub daz_iono_mm: f64,
    /// Observed offset minus `daz_iono_mm`, filled by `apply_iono_correction`
    #[serde(default)]
    pub daz_mm_noiono: Option<f64>,
}

/// Error types for ionosphere processing
#[derive(Debug, thiserror::Error)]
pub enum IonoError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid data format: {0}")]
    InvalidFormat(String),

    #[error("Download error: {0}")]
    Download(String),

    #[error("Data unavailable: {0}")]
    Unavailable(String),

    #[error("Geometry error: {0}")]
    Geometry(String),

    #[error("Metadata error: {0}")]
    Metadata(String),

    #[error("Processing error: {0}")]
    Processing(String),

    #[cfg(feature = "netcdf")]
    #[error("NetCDF error: {0}")]
    NetCdf(#[from] netcdf::Error),
}

/// Result type for ionosphere operations
pub type IonoResult<T> = Result<T, IonoError>;

/// Failure of a single frame, isolated by the batch runner
#[derive(Debug, thiserror::Error)]
#[error("frame {frame}: {source}")]
pub struct FrameError {
    pub frame: String,
    #[source]
    pub source: IonoError,
}

impl FrameError {
    pub fn new(frame: impl Into<String>, source: IonoError) -> Self {
        Self { frame: frame.into(), source }
    }
}
