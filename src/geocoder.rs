use crate::error::UpstreamError;
use crate::types::ResolvedLocation;
use reqwest::Client;
use serde::Deserialize;
use std::future::Future;
use tracing::debug;

pub const UNKNOWN_COUNTRY: &str = "Unknown";

pub trait Geocoder: Send + Sync {
    /// Best single match for a free-text address, `None` when nothing matches.
    fn resolve_address(
        &self,
        text: &str,
    ) -> impl Future<Output = Result<Option<ResolvedLocation>, UpstreamError>> + Send;

    /// Country name at a coordinate, `None` when the service reports no country.
    fn resolve_country(
        &self,
        lat: f64,
        lon: f64,
    ) -> impl Future<Output = Result<Option<String>, UpstreamError>> + Send;
}

#[derive(Debug, Deserialize)]
struct NominatimPlace {
    lat: String,
    lon: String,
    #[serde(default)]
    display_name: String,
    #[serde(default)]
    address: Option<NominatimAddress>,
}

#[derive(Debug, Deserialize)]
struct NominatimAddress {
    #[serde(default)]
    country: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NominatimReverse {
    #[serde(default)]
    address: Option<NominatimAddress>,
}

#[derive(Debug, Clone)]
pub struct Nominatim { // OpenStreetMap search/reverse endpoints
    client: Client,
    base_url: String,
    language: String,
}

impl Nominatim {
    pub fn new(client: Client, base_url: &str, language: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            language: language.to_string(),
        }
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, UpstreamError> {
        let url = format!("{}/{}", self.base_url, path);
        debug!("geocoder request: {} {:?}", url, query);

        let resp = self.client
            .get(&url)
            .query(query)
            .query(&[("format", "json"), ("accept-language", self.language.as_str())])
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(UpstreamError::Status(resp.status()));
        }
        let body = resp.bytes().await?;
        serde_json::from_slice(&body).map_err(|e| UpstreamError::Malformed(e.to_string()))
    }
}

impl Geocoder for Nominatim {
    async fn resolve_address(&self, text: &str) -> Result<Option<ResolvedLocation>, UpstreamError> {
        let places: Vec<NominatimPlace> = self
            .get_json(
                "search",
                &[
                    ("q", text.to_string()),
                    ("limit", "1".to_string()),
                    ("addressdetails", "1".to_string()),
                ],
            )
            .await?;

        places.into_iter().next().map(place_to_location).transpose()
    }

    async fn resolve_country(&self, lat: f64, lon: f64) -> Result<Option<String>, UpstreamError> {
        let place: NominatimReverse = self
            .get_json("reverse", &[("lat", lat.to_string()), ("lon", lon.to_string())])
            .await?;

        Ok(place.address.and_then(|a| a.country).filter(|c| !c.trim().is_empty()))
    }
}

fn place_to_location(place: NominatimPlace) -> Result<ResolvedLocation, UpstreamError> {
    let lat: f64 = place.lat.trim().parse()
        .map_err(|_| UpstreamError::Malformed(format!("latitude '{}'", place.lat)))?;
    let lon: f64 = place.lon.trim().parse()
        .map_err(|_| UpstreamError::Malformed(format!("longitude '{}'", place.lon)))?;

    let country = place.address
        .and_then(|a| a.country)
        .filter(|c| !c.trim().is_empty())
        .or_else(|| country_from_display_name(&place.display_name))
        .unwrap_or_else(|| UNKNOWN_COUNTRY.to_string());

    Ok(ResolvedLocation {
        lat,
        lon,
        display_name: place.display_name,
        country,
    })
}

/// Nominatim display names end with the country: "Nairobi, Nairobi County, Kenya".
fn country_from_display_name(display_name: &str) -> Option<String> {
    display_name
        .rsplit(',')
        .next()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
