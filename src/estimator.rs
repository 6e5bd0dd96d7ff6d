use crate::config::EstimationConfig;
use crate::error::EstimateError;
use crate::geocoder::{Geocoder, UNKNOWN_COUNTRY};
use crate::penetration::PenetrationTable;
use crate::population::{self, PopulationSource};
use crate::processing::{self, DotPlan};
use crate::sampling;
use crate::types::{EstimationResult, LocationQuery, Sourced, ViewportBounds};
use geo::Rect;
use rand::Rng;
use tracing::{debug, info, warn};

pub const SELECTED_AREA: &str = "Selected Area";

pub struct Estimator<G, P> {
    geocoder: G,
    population: P,
    penetration: PenetrationTable,
    config: EstimationConfig,
}

/// Everything decided before sampling. Sampling is kept apart so callers
/// choose the random source.
#[derive(Debug, Clone)]
pub struct EstimatePlan {
    pub area_name: String,
    pub country: String,
    pub lat: f64,
    pub lon: f64,
    pub population: u64,
    pub rate_percent: f64,
    pub dots: DotPlan,
    pub sample_rect: Rect<f64>,
}

impl EstimatePlan {
    pub fn into_result<R: Rng + ?Sized>(self, rng: &mut R) -> EstimationResult {
        let dots = sampling::sample_points(&self.sample_rect, self.dots.dot_count, rng);
        EstimationResult {
            estimated_phones: self.dots.estimated_phones,
            population: self.population,
            rate_percent: self.rate_percent,
            lat: self.lat,
            lon: self.lon,
            area_name: self.area_name,
            dots,
            phones_per_dot: self.dots.phones_per_dot,
        }
    }
}

/// Builds a query from raw request values. `address` wins when both are present;
/// blank addresses count as absent.
pub fn parse_query(
    address: Option<&str>,
    bounds: Option<&str>,
    zoom: Option<&str>,
) -> Result<LocationQuery, EstimateError> {
    if let Some(address) = address.map(str::trim).filter(|a| !a.is_empty()) {
        return Ok(LocationQuery::Address(address.to_string()));
    }

    let raw = bounds
        .map(str::trim)
        .filter(|b| !b.is_empty())
        .ok_or(EstimateError::MissingLocation)?;

    Ok(LocationQuery::Viewport {
        bounds: parse_bounds(raw)?,
        zoom: zoom.and_then(|z| z.trim().parse::<f64>().ok()).filter(|z| z.is_finite()),
    })
}

/// Parses "south,west,north,east".
pub fn parse_bounds(raw: &str) -> Result<ViewportBounds, EstimateError> {
    let values: Vec<f64> = raw
        .split(',')
        .map(|part| part.trim().parse::<f64>())
        .collect::<Result<_, _>>()
        .map_err(|_| EstimateError::InvalidBounds(raw.to_string()))?;

    match values[..] {
        [south, west, north, east] if values.iter().all(|v| v.is_finite()) => {
            Ok(ViewportBounds { south, west, north, east })
        }
        _ => Err(EstimateError::InvalidBounds(raw.to_string())),
    }
}

impl<G: Geocoder, P: PopulationSource> Estimator<G, P> {
    pub fn new(geocoder: G, population: P, penetration: PenetrationTable, config: EstimationConfig) -> Self {
        Self {
            geocoder,
            population,
            penetration,
            config,
        }
    }

    pub async fn estimate(&self, query: &LocationQuery) -> Result<EstimationResult, EstimateError> {
        let plan = self.plan(query).await?;
        Ok(plan.into_result(&mut rand::thread_rng()))
    }

    pub async fn plan(&self, query: &LocationQuery) -> Result<EstimatePlan, EstimateError> {
        let (area_name, country, lat, lon, sample_rect, zoom) = match query {
            LocationQuery::Address(text) => {
                let location = match self.geocoder.resolve_address(text).await {
                    Ok(Some(location)) => location,
                    Ok(None) => return Err(EstimateError::AddressNotFound(text.clone())),
                    Err(e) => {
                        warn!("geocoding '{}' failed: {}", text, e);
                        return Err(EstimateError::AddressNotFound(text.clone()));
                    }
                };
                let rect = sampling::box_around(location.lat, location.lon, self.config.address_box_degrees);
                (location.display_name, location.country, location.lat, location.lon, rect, None)
            }
            LocationQuery::Viewport { bounds, zoom } => {
                let (lat, lon) = bounds.center();
                let country = self.country_at(lat, lon).await.into_value();
                (SELECTED_AREA.to_string(), country, lat, lon, bounds.to_rect(), *zoom)
            }
        };

        let sourced = population::lookup(&self.population, &country, self.config.fallback_population).await;
        let fallback_used = sourced.is_degraded();
        let population = sourced.into_value().population;
        if !self.penetration.is_mapped(&country) {
            debug!("no penetration rate for '{}', using the default", country);
        }
        let rate = self.penetration.rate_for(&country);
        let dots = processing::plan_dots(&self.config, population, rate.rate_percent, zoom);

        info!(
            "estimate for '{}' ({}): population {}{}, rate {}%, {} phones, {} dots",
            area_name,
            country,
            population,
            if fallback_used { " (fallback)" } else { "" },
            rate.rate_percent,
            dots.estimated_phones,
            dots.dot_count
        );

        Ok(EstimatePlan {
            area_name,
            country,
            lat,
            lon,
            population,
            rate_percent: rate.rate_percent,
            dots,
            sample_rect,
        })
    }

    async fn country_at(&self, lat: f64, lon: f64) -> Sourced<String> {
        let reason = match self.geocoder.resolve_country(lat, lon).await {
            Ok(Some(country)) => return Sourced::Fresh(country),
            Ok(None) => format!("no country at ({}, {})", lat, lon),
            Err(e) => format!("reverse geocoding ({}, {}) failed: {}", lat, lon, e),
        };
        warn!("{}; country is {}", reason, UNKNOWN_COUNTRY);
        Sourced::Degraded {
            fallback: UNKNOWN_COUNTRY.to_string(),
            reason,
        }
    }
}
