//! Vertical TEC samplers over the two supported sources

use crate::config::{TecScaling, TecSourceKind};
use crate::core::point_model::PointIonosphereModel;
use crate::core::tec_field::Interpolation;
use crate::io::tec_store::TecGridStore;
use crate::types::{GeoPoint, IonoError, IonoResult};
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Ceiling of the reference column used for automatic grid scaling (km)
const GNSS_CEILING_KM: f64 = 20_000.0;

/// Longitude as passed to the TEC sources.
///
/// NOTE: values above 180 are reduced by 180, not 360. Frames east of the
/// antimeridian in 0..360 notation therefore sample the wrong meridian; kept
/// so results stay comparable with earlier processing.
pub fn normalize_longitude(lon: f64) -> f64 {
    if lon > 180.0 {
        lon - 180.0
    } else {
        lon
    }
}

/// Vertical TEC sampler
pub trait TecSource: Send + Sync {
    fn kind(&self) -> TecSourceKind;

    /// Vertical TEC (el/m^2) between the ground and `ceiling_km` above `point`
    fn sample(&self, point: &GeoPoint, instant: DateTime<Utc>, ceiling_km: f64) -> IonoResult<f64>;

    /// F2 peak height (km), when this source can estimate one
    fn estimate_peak_height(
        &self,
        _point: &GeoPoint,
        _instant: DateTime<Utc>,
        _ceiling_km: f64,
    ) -> Option<IonoResult<f64>> {
        None
    }
}

/// TEC straight from a point ionosphere model
pub struct ModelTecSource {
    model: Arc<dyn PointIonosphereModel>,
}

impl ModelTecSource {
    pub fn new(model: Arc<dyn PointIonosphereModel>) -> Self {
        Self { model }
    }
}

impl TecSource for ModelTecSource {
    fn kind(&self) -> TecSourceKind {
        TecSourceKind::Model
    }

    fn sample(&self, point: &GeoPoint, instant: DateTime<Utc>, ceiling_km: f64) -> IonoResult<f64> {
        let lon = normalize_longitude(point.longitude);
        Ok(self.model.evaluate(instant, point.latitude, lon, ceiling_km)?.tec)
    }

    fn estimate_peak_height(
        &self,
        point: &GeoPoint,
        instant: DateTime<Utc>,
        ceiling_km: f64,
    ) -> Option<IonoResult<f64>> {
        Some(model_peak_height(self.model.as_ref(), point, instant, ceiling_km))
    }
}

fn model_peak_height(
    model: &dyn PointIonosphereModel,
    point: &GeoPoint,
    instant: DateTime<Utc>,
    ceiling_km: f64,
) -> IonoResult<f64> {
    let lon = normalize_longitude(point.longitude);
    model
        .evaluate(instant, point.latitude, lon, ceiling_km)?
        .hmf2_km
        .filter(|h| h.is_finite())
        .ok_or_else(|| IonoError::Unavailable("Point model gave no F2 peak height".to_string()))
}

/// TEC from daily global ionosphere maps, scaled to the part of the column
/// below the SAR satellite
pub struct GridTecSource {
    store: TecGridStore,
    scaling: TecScaling,
    interpolation: Interpolation,
    /// Peak heights and automatic scaling
    model: Option<Arc<dyn PointIonosphereModel>>,
}

impl GridTecSource {
    pub fn new(store: TecGridStore, scaling: TecScaling) -> Self {
        Self {
            store,
            scaling,
            interpolation: Interpolation::default(),
            model: None,
        }
    }

    pub fn with_model(mut self, model: Arc<dyn PointIonosphereModel>) -> Self {
        self.model = Some(model);
        self
    }

    pub fn with_interpolation(mut self, interpolation: Interpolation) -> Self {
        self.interpolation = interpolation;
        self
    }

    pub fn store(&self) -> &TecGridStore {
        &self.store
    }

    /// Fraction of the map TEC applied at this point
    pub fn scale_factor(
        &self,
        lat: f64,
        lon: f64,
        instant: DateTime<Utc>,
        ceiling_km: f64,
    ) -> IonoResult<f64> {
        match self.scaling {
            TecScaling::Fixed(alpha) => Ok(alpha),
            TecScaling::Auto => {
                let model = self.model.as_ref().ok_or_else(|| {
                    IonoError::Processing("Automatic TEC scaling needs a point model".to_string())
                })?;
                let below_sat = model.evaluate(instant, lat, lon, ceiling_km)?.tec;
                let full = model.evaluate(instant, lat, lon, GNSS_CEILING_KM)?.tec;
                if full <= 0.0 || !full.is_finite() {
                    return Err(IonoError::Processing(format!(
                        "Point model TEC {} cannot scale the map",
                        full
                    )));
                }
                Ok(below_sat / full)
            }
        }
    }
}

impl TecSource for GridTecSource {
    fn kind(&self) -> TecSourceKind {
        TecSourceKind::Grid
    }

    fn sample(&self, point: &GeoPoint, instant: DateTime<Utc>, ceiling_km: f64) -> IonoResult<f64> {
        let lon = normalize_longitude(point.longitude);
        let alpha = self.scale_factor(point.latitude, lon, instant, ceiling_km)?;
        let field = self.store.field_for(instant)?;
        let tec = field.vertical_tec_with(point.latitude, lon, instant, self.interpolation);
        if tec.is_nan() {
            return Err(IonoError::Unavailable(format!(
                "No map value at ({:.3}, {:.3}) for {}",
                point.latitude, lon, instant
            )));
        }
        Ok(alpha * tec)
    }

    fn estimate_peak_height(
        &self,
        point: &GeoPoint,
        instant: DateTime<Utc>,
        ceiling_km: f64,
    ) -> Option<IonoResult<f64>> {
        self.model
            .as_ref()
            .map(|model| model_peak_height(model.as_ref(), point, instant, ceiling_km))
    }
}
