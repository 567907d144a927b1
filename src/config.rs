//! Processing parameters and physical constants

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Physical and sensor constants shared by the geometry model and the
/// azimuth estimator
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhysicalConstants {
    /// Pulse repetition frequency (Hz)
    pub prf: f64,
    /// Carrier frequency (Hz)
    pub carrier_frequency: f64,
    /// Ionospheric refraction constant (m^3/s^2)
    pub k_iono: f64,
    /// Speed of light (m/s)
    pub speed_of_light: f64,
    /// Earth radius used by the single-layer mapping function (m)
    pub earth_radius: f64,
    /// Nominal satellite ground-track velocity (m/s)
    pub ground_velocity: f64,
    /// Burst cycle time (s)
    pub burst_interval: f64,
    /// Default ionosphere shell height (km)
    pub default_shell_height_km: f64,
    /// Population mean Doppler centroid difference, used when a frame has none (Hz)
    pub default_df_dc: f64,
    /// Upper altitude for the F2 peak height query (km)
    pub peak_query_ceiling_km: f64,
}

impl Default for PhysicalConstants {
    fn default() -> Self {
        Self {
            prf: 486.486,                  // Sentinel-1 IW
            carrier_frequency: 5.4050005e9, // C-band
            k_iono: 40.308193,
            speed_of_light: 299_792_458.0,
            earth_radius: 6_378_160.0,
            ground_velocity: 7100.0,
            burst_interval: 2.758277,
            default_shell_height_km: 450.0,
            default_df_dc: 4365.0,
            peak_query_ceiling_km: 800.0,
        }
    }
}

impl PhysicalConstants {
    /// Along-track length of one burst on the ground (m)
    pub fn burst_length(&self) -> f64 {
        self.ground_velocity * self.burst_interval
    }

    /// Effective (high, low) carrier frequencies of the burst overlap
    pub fn overlap_frequencies(&self, df_dc: f64) -> (f64, f64) {
        (
            self.carrier_frequency + df_dc * 0.5,
            self.carrier_frequency - df_dc * 0.5,
        )
    }
}

/// Where vertical TEC comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TecSourceKind {
    /// Point ionosphere model ("iri")
    #[serde(alias = "iri")]
    Model,
    /// Gridded global ionosphere maps, JPL HR-GIM or CODE ("code")
    #[serde(alias = "code")]
    Grid,
}

impl std::fmt::Display for TecSourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TecSourceKind::Model => write!(f, "model"),
            TecSourceKind::Grid => write!(f, "grid"),
        }
    }
}

/// Azimuth shift formula
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AzimuthMethod {
    /// Closed-form TEC gradient model (default)
    #[serde(alias = "gomba")]
    Gradient,
    /// Legacy Liang et al. (2019) burst-ramp formula, experimental
    Liang,
}

/// Fraction of the gridded (GNSS-height) TEC attributed to the path below
/// the SAR satellite
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TecScaling {
    Fixed(f64),
    /// Ratio of point-model TEC below the satellite to TEC below 20000 km
    Auto,
}

impl Default for TecScaling {
    fn default() -> Self {
        TecScaling::Fixed(0.85)
    }
}

/// GIM product store settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub cache_dir: PathBuf,
    pub allow_download: bool,
    /// Try the 15-minute JPL HR-GIM before the hourly CODE maps
    pub prefer_high_resolution: bool,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub jpl_base_url: String,
    pub code_base_url: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        let cache_dir = dirs::cache_dir()
            .map(|dir| dir.join("daz-iono").join("gim"))
            .unwrap_or_else(|| PathBuf::from("gim_cache"));
        Self {
            cache_dir,
            allow_download: true,
            prefer_high_resolution: true,
            timeout_secs: 300,
            max_retries: 3,
            jpl_base_url: "https://sideshow.jpl.nasa.gov/pub/iono_daily/gim_for_research/jpld".to_string(),
            code_base_url: "http://ftp.aiub.unibe.ch/CODE".to_string(),
        }
    }
}

impl StoreConfig {
    /// Local-only store, nothing is fetched
    pub fn offline(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            allow_download: false,
            ..Self::default()
        }
    }
}

/// Top-level ionosphere extraction settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IonoConfig {
    pub source: TecSourceKind,
    /// Estimate the shell height from the point model instead of the fixed default
    pub use_model_height: bool,
    pub method: AzimuthMethod,
    pub scaling: TecScaling,
    pub constants: PhysicalConstants,
    pub store: StoreConfig,
}

impl Default for IonoConfig {
    fn default() -> Self {
        Self {
            source: TecSourceKind::Model,
            use_model_height: false,
            method: AzimuthMethod::Gradient,
            scaling: TecScaling::default(),
            constants: PhysicalConstants::default(),
            store: StoreConfig::default(),
        }
    }
}

impl IonoConfig {
    /// Whether shell heights come from the point model. The model source always
    /// estimates them.
    pub fn model_heights(&self) -> bool {
        self.use_model_height || self.source == TecSourceKind::Model
    }
}
