use crate::error::UpstreamError;
use crate::types::{PopulationEstimate, Sourced};
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use std::future::Future;
use tracing::{debug, warn};

pub trait PopulationSource: Send + Sync {
    /// Population of `country`, `None` when the service has no matching entry.
    fn fetch(&self, country: &str) -> impl Future<Output = Result<Option<u64>, UpstreamError>> + Send;
}

/// Fail-soft wrapper: any fault or miss becomes the fallback population.
pub async fn lookup<P: PopulationSource>(
    source: &P,
    country: &str,
    fallback: u64,
) -> Sourced<PopulationEstimate> {
    let estimate = |population| PopulationEstimate {
        country: country.to_string(),
        population,
    };

    let outcome = match source.fetch(country).await {
        Ok(Some(population)) => return Sourced::Fresh(estimate(population)),
        Ok(None) => format!("no population entry for '{}'", country),
        Err(e) => format!("population lookup for '{}' failed: {}", country, e),
    };

    warn!("{}; using fallback population {}", outcome, fallback);
    Sourced::Degraded {
        fallback: estimate(fallback),
        reason: outcome,
    }
}

#[derive(Debug, Deserialize)]
struct CountryEntry {
    name: CountryName,
    population: u64,
}

#[derive(Debug, Deserialize)]
struct CountryName {
    #[serde(default)]
    common: String,
    #[serde(default)]
    official: String,
}

#[derive(Debug, Clone)]
pub struct RestCountries {
    client: Client,
    base_url: String,
}

impl RestCountries {
    pub fn new(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn name_url(&self, country: &str) -> Result<Url, UpstreamError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| UpstreamError::InvalidUrl(format!("{}: {}", self.base_url, e)))?;
        url.path_segments_mut()
            .map_err(|_| UpstreamError::InvalidUrl(self.base_url.clone()))?
            .push("name")
            .push(country);
        url.query_pairs_mut()
            .append_pair("fullText", "true")
            .append_pair("fields", "name,population");
        Ok(url)
    }
}

impl PopulationSource for RestCountries {
    async fn fetch(&self, country: &str) -> Result<Option<u64>, UpstreamError> {
        let url = self.name_url(country)?;
        debug!("population request: {}", url);

        let resp = self.client.get(url).send().await?;
        match resp.status() {
            StatusCode::NOT_FOUND => Ok(None),
            s if s.is_success() => {
                let body = resp.bytes().await?;
                let entries: Vec<CountryEntry> = serde_json::from_slice(&body)
                    .map_err(|e| UpstreamError::Malformed(e.to_string()))?;
                Ok(pick_population(&entries, country))
            }
            s => Err(UpstreamError::Status(s)),
        }
    }
}

fn pick_population(entries: &[CountryEntry], country: &str) -> Option<u64> {
    entries
        .iter()
        .find(|e| e.name.common == country || e.name.official == country)
        .or_else(|| entries.first())
        .map(|e| e.population)
}
