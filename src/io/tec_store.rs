//! Local store of daily global ionosphere maps
//!
//! Products are looked up in the cache directory first, then downloaded.
//! Preference order: JPL HR-GIM (15 min, NetCDF), CODE IONEX under the old
//! short names, CODE IONEX under the long final-product name.

use crate::config::StoreConfig;
use crate::core::tec_field::TecField;
use crate::io::ionex::read_ionex_file;
use crate::types::{IonoError, IonoResult};
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use regex::Regex;
use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Daily GIM products in preference order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GimProduct {
    /// JPL high-resolution research GIM
    JplHighRes,
    /// CODE daily map, short name CODGddd0.yyI
    CodeFinal,
    /// CODE alternative short name CGIMddd0.yyI
    CodeAlternate,
    /// CODE long name COD0OPSFIN_yyyyddd0000_01D_01H_GIM.INX
    CodeLongName,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Compression {
    Gzip,
    /// Unix `compress` (.Z)
    Lzw,
}

impl GimProduct {
    pub const ALL: [GimProduct; 4] = [
        GimProduct::JplHighRes,
        GimProduct::CodeFinal,
        GimProduct::CodeAlternate,
        GimProduct::CodeLongName,
    ];

    pub fn is_high_resolution(&self) -> bool {
        matches!(self, GimProduct::JplHighRes)
    }

    /// Name of the uncompressed file in the cache
    pub fn file_name(&self, day: NaiveDate) -> String {
        let doy = day.ordinal();
        let yy = day.year() % 100;
        match self {
            GimProduct::JplHighRes => format!("jpld{:03}0.{:02}i.nc", doy, yy),
            GimProduct::CodeFinal => format!("CODG{:03}0.{:02}I", doy, yy),
            GimProduct::CodeAlternate => format!("CGIM{:03}0.{:02}I", doy, yy),
            GimProduct::CodeLongName => {
                format!("COD0OPSFIN_{}{:03}0000_01D_01H_GIM.INX", day.year(), doy)
            }
        }
    }

    /// Name of the file as published
    pub fn remote_name(&self, day: NaiveDate) -> String {
        match self.compression() {
            Compression::Gzip => format!("{}.gz", self.file_name(day)),
            Compression::Lzw => format!("{}.Z", self.file_name(day)),
        }
    }

    pub fn url(&self, day: NaiveDate, config: &StoreConfig) -> String {
        let base = match self {
            GimProduct::JplHighRes => &config.jpl_base_url,
            _ => &config.code_base_url,
        };
        format!("{}/{}/{}", base.trim_end_matches('/'), day.year(), self.remote_name(day))
    }

    /// `CodeAlternate` matches the same cached files as `CodeFinal`
    fn has_own_cache_pattern(&self) -> bool {
        !matches!(self, GimProduct::CodeAlternate)
    }

    fn compression(&self) -> Compression {
        match self {
            GimProduct::CodeFinal | GimProduct::CodeAlternate => Compression::Lzw,
            GimProduct::JplHighRes | GimProduct::CodeLongName => Compression::Gzip,
        }
    }

    /// Pattern for an already decompressed file of this product family
    fn cached_pattern(&self, day: NaiveDate) -> String {
        let doy = day.ordinal();
        let yy = day.year() % 100;
        match self {
            GimProduct::JplHighRes => format!(r"^jpld{:03}0\.{:02}.*\.nc$", doy, yy),
            // Any 4-letter centre under the short naming
            GimProduct::CodeFinal | GimProduct::CodeAlternate => {
                format!(r"^.{{4}}{:03}0\.{:02}.$", doy, yy)
            }
            GimProduct::CodeLongName => format!("^{}$", regex::escape(&self.file_name(day))),
        }
    }
}

/// Day-keyed store of TEC fields, backed by the cache directory.
///
/// Days that could not be served are remembered so they are not fetched
/// again by later frames of the same run.
pub struct TecGridStore {
    config: StoreConfig,
    days: Mutex<HashMap<NaiveDate, Option<Arc<TecField>>>>,
}

impl TecGridStore {
    pub fn new(config: StoreConfig) -> Self {
        if config.prefer_high_resolution && !cfg!(feature = "netcdf") {
            log::warn!(
                "JPL HR-GIM requested but NetCDF support is not compiled in; \
                 falling back to CODE IONEX products (build with the `netcdf` feature)"
            );
        }
        Self {
            config,
            days: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// TEC field covering the UTC day of `instant`
    pub fn field_for(&self, instant: DateTime<Utc>) -> IonoResult<Arc<TecField>> {
        self.field_for_day(instant.date_naive())
    }

    pub fn field_for_day(&self, day: NaiveDate) -> IonoResult<Arc<TecField>> {
        // Held across loading, so one day is never fetched twice concurrently
        let mut days = self
            .days
            .lock()
            .map_err(|_| IonoError::Processing("TEC store lock poisoned".to_string()))?;

        if let Some(entry) = days.get(&day) {
            return entry
                .clone()
                .ok_or_else(|| IonoError::Unavailable(format!("No GIM product for {}", day)));
        }

        let loaded = self.load_day(day).map(Arc::new);
        match &loaded {
            Ok(field) => {
                days.insert(day, Some(Arc::clone(field)));
            }
            Err(e) => {
                log::error!("No usable GIM product for {}: {}", day, e);
                days.insert(day, None);
            }
        }
        loaded
    }

    /// Products tried, in order
    pub fn candidates(&self) -> Vec<GimProduct> {
        GimProduct::ALL
            .iter()
            .copied()
            .filter(|p| !p.is_high_resolution() || self.high_resolution_enabled())
            .collect()
    }

    /// Whether the JPL HR-GIM is tried first
    pub fn high_resolution_enabled(&self) -> bool {
        self.config.prefer_high_resolution && cfg!(feature = "netcdf")
    }

    fn load_day(&self, day: NaiveDate) -> IonoResult<TecField> {
        let candidates = self.candidates();
        for (i, product) in candidates.iter().enumerate() {
            log::debug!(
                "Trying GIM source {} of {} for {}: {:?}",
                i + 1,
                candidates.len(),
                day,
                product
            );
            let path = match self.obtain(*product, day) {
                Ok(path) => path,
                Err(e) => {
                    log::debug!("{:?} not available for {}: {}", product, day, e);
                    continue;
                }
            };
            match read_product(*product, &path, day) {
                Ok(field) => {
                    log::info!("Using {} for {}", path.display(), day);
                    return Ok(field);
                }
                Err(e) => log::warn!("Failed to read {}: {}", path.display(), e),
            }
        }
        Err(IonoError::Unavailable(format!(
            "No GIM product could be found or downloaded for {}",
            day
        )))
    }

    /// Local path of a product, decompressing or downloading as needed
    fn obtain(&self, product: GimProduct, day: NaiveDate) -> IonoResult<PathBuf> {
        if product.has_own_cache_pattern() {
            if let Some(path) = self.find_cached(product, day)? {
                return Ok(path);
            }
        }

        let compressed = self.config.cache_dir.join(product.remote_name(day));
        if compressed.exists() {
            return decompress(&compressed, product.compression());
        }

        if !self.config.allow_download {
            return Err(IonoError::Unavailable(format!(
                "{} not in cache and downloads are disabled",
                product.file_name(day)
            )));
        }

        std::fs::create_dir_all(&self.config.cache_dir)?;
        let url = product.url(day, &self.config);
        self.download(&url, &compressed)?;
        decompress(&compressed, product.compression())
    }

    /// Previously decompressed file matching the product's naming
    pub fn find_cached(&self, product: GimProduct, day: NaiveDate) -> IonoResult<Option<PathBuf>> {
        let dir = &self.config.cache_dir;
        if !dir.is_dir() {
            return Ok(None);
        }
        let pattern = Regex::new(&product.cached_pattern(day))
            .map_err(|e| IonoError::Processing(format!("Bad cache pattern: {}", e)))?;

        let mut matches: Vec<PathBuf> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_file())
            .filter(|entry| pattern.is_match(&entry.file_name().to_string_lossy()))
            .map(|entry| entry.path())
            .collect();
        matches.sort();
        Ok(matches.into_iter().next())
    }

    fn download(&self, url: &str, output_path: &Path) -> IonoResult<()> {
        log::info!("Downloading GIM product from: {}", url);

        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(self.config.timeout_secs))
            .user_agent(concat!("daz-iono/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| IonoError::Download(format!("Failed to create HTTP client: {}", e)))?;

        let max_retries = self.config.max_retries.max(1);
        let mut last_error = None;

        for attempt in 1..=max_retries {
            log::debug!("Download attempt {} of {}", attempt, max_retries);
            match try_download_once(&client, url, output_path) {
                Ok(bytes) => {
                    log::info!("Downloaded {} bytes to {}", bytes, output_path.display());
                    return Ok(());
                }
                Err(DownloadFailure::NotFound(e)) => return Err(e),
                Err(DownloadFailure::Transient(e)) => {
                    last_error = Some(e);
                    if attempt < max_retries {
                        log::warn!("Download attempt {} failed, retrying...", attempt);
                        std::thread::sleep(Duration::from_secs(2));
                    }
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| IonoError::Download("Download failed after all retries".to_string())))
    }
}

enum DownloadFailure {
    /// Client error status, retrying will not help
    NotFound(IonoError),
    Transient(IonoError),
}

fn try_download_once(
    client: &reqwest::blocking::Client,
    url: &str,
    output_path: &Path,
) -> Result<usize, DownloadFailure> {
    let response = client.get(url).send().map_err(|e| {
        DownloadFailure::Transient(IonoError::Download(format!("HTTP request failed: {}", e)))
    })?;

    let status = response.status();
    if !status.is_success() {
        let error = IonoError::Download(format!("HTTP {}: {}", status.as_u16(), url));
        return Err(if status.is_client_error() {
            DownloadFailure::NotFound(error)
        } else {
            DownloadFailure::Transient(error)
        });
    }

    let content = response.bytes().map_err(|e| {
        DownloadFailure::Transient(IonoError::Download(format!(
            "Failed to read response body: {}",
            e
        )))
    })?;
    if content.is_empty() {
        return Err(DownloadFailure::Transient(IonoError::Download(format!(
            "Empty response from {}",
            url
        ))));
    }

    std::fs::write(output_path, &content)
        .map_err(|e| DownloadFailure::Transient(IonoError::Io(e)))?;
    Ok(content.len())
}

/// Decompress next to the archive and remove the archive.
///
/// An archive that cannot be unpacked is removed as well, so the next
/// attempt downloads it again.
fn decompress(path: &Path, compression: Compression) -> IonoResult<PathBuf> {
    let target = path.with_extension("");
    log::debug!("Decompressing {} to {}", path.display(), target.display());

    if let Err(e) = unpack(path, &target, compression) {
        log::warn!("Removing unusable archive {}: {}", path.display(), e);
        let _ = std::fs::remove_file(&target);
        let _ = std::fs::remove_file(path);
        return Err(e);
    }

    std::fs::remove_file(path)?;
    Ok(target)
}

fn unpack(path: &Path, target: &Path, compression: Compression) -> IonoResult<()> {
    match compression {
        Compression::Gzip => {
            let mut decoder = flate2::read::GzDecoder::new(File::open(path)?);
            let mut output = File::create(target)?;
            if let Err(e) = std::io::copy(&mut decoder, &mut output) {
                return Err(IonoError::InvalidFormat(format!(
                    "Failed to gunzip {}: {}",
                    path.display(),
                    e
                )));
            }
        }
        Compression::Lzw => {
            // gzip understands the LZW format of `compress`
            let output = std::process::Command::new("gzip")
                .arg("-dc")
                .arg(path)
                .output()
                .map_err(|e| {
                    IonoError::Processing(format!("Failed to run gzip (is it installed?): {}", e))
                })?;
            if !output.status.success() {
                return Err(IonoError::InvalidFormat(format!(
                    "gzip could not decompress {}: {}",
                    path.display(),
                    String::from_utf8_lossy(&output.stderr).trim()
                )));
            }
            File::create(target)?.write_all(&output.stdout)?;
        }
    }
    Ok(())
}

/// Parse a decompressed product file
pub fn read_product(product: GimProduct, path: &Path, day: NaiveDate) -> IonoResult<TecField> {
    if product.is_high_resolution() {
        read_high_resolution(path)
    } else {
        read_ionex_file(path, day)
    }
}

#[cfg(feature = "netcdf")]
fn read_high_resolution(path: &Path) -> IonoResult<TecField> {
    crate::io::gim_netcdf::read_jpl_gim(path)
}

#[cfg(not(feature = "netcdf"))]
fn read_high_resolution(path: &Path) -> IonoResult<TecField> {
    Err(IonoError::Unavailable(format!(
        "{} needs NetCDF support (build with the `netcdf` feature)",
        path.display()
    )))
}
