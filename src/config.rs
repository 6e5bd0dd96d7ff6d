use std::collections::HashMap;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::fs;
use std::env;
use anyhow::{bail, Context, Result};

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub upstream: UpstreamConfig,
    pub estimation: EstimationConfig,
    pub penetration: PenetrationConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub static_dir: PathBuf, // front-end assets, served on every non-API path
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct UpstreamConfig {
    pub geocoder_url: String,
    pub population_url: String,
    pub user_agent: String,
    pub language: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EstimationConfig {
    pub fallback_population: u64,
    pub max_dots: usize,
    pub fine_zoom_threshold: f64,
    pub fine_phones_per_dot: u64,
    pub coarse_phones_per_dot: u64,
    pub address_box_degrees: f64, // side length of the square sampled around an address
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PenetrationConfig {
    pub default_rate: f64,
    pub rates: HashMap<String, f64>, // country name -> phones per 100 people
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            static_dir: PathBuf::from("public"),
        }
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            geocoder_url: "https://nominatim.openstreetmap.org".to_string(),
            population_url: "https://restcountries.com/v3.1".to_string(),
            user_agent: "PhoneEstimator/1.0".to_string(),
            language: "en".to_string(),
            timeout_secs: 5,
        }
    }
}

impl Default for EstimationConfig {
    fn default() -> Self {
        Self {
            fallback_population: 10_000,
            max_dots: 1000,
            fine_zoom_threshold: 12.0,
            fine_phones_per_dot: 1,
            coarse_phones_per_dot: 100,
            address_box_degrees: 0.05,
        }
    }
}

impl Default for PenetrationConfig {
    fn default() -> Self {
        let rates = [
            ("United States", 120.0),
            ("United Kingdom", 110.0),
            ("China", 115.0),
            ("Kenya", 90.0),
        ]
        .into_iter()
        .map(|(name, rate)| (name.to_string(), rate))
        .collect();

        Self {
            default_rate: 100.0,
            rates,
        }
    }
}

impl AppConfig {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        let config: AppConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML configuration: {:?}", path))?;
        config.validate()?;
        Ok(config)
    }

    /// Applies `PORT`, `HOST`, `GEOCODER_URL` and `POPULATION_URL` on top of the file values.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(v) = env::var("PORT") {
            self.server.port = v.parse()
                .with_context(|| format!("PORT is not a valid port number: {}", v))?;
        }
        if let Ok(v) = env::var("HOST") { self.server.host = v; }
        if let Ok(v) = env::var("GEOCODER_URL") { self.upstream.geocoder_url = v; }
        if let Ok(v) = env::var("POPULATION_URL") { self.upstream.population_url = v; }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let p = &self.penetration;
        if !(p.default_rate > 0.0) {
            bail!("penetration.default_rate must be positive, got {}", p.default_rate);
        }
        for (country, rate) in &p.rates {
            if !(*rate > 0.0) {
                bail!("penetration rate for '{}' must be positive, got {}", country, rate);
            }
        }

        let e = &self.estimation;
        if e.max_dots == 0 {
            bail!("estimation.max_dots must be at least 1");
        }
        if e.fine_phones_per_dot == 0 || e.coarse_phones_per_dot == 0 {
            bail!("phones per dot must be at least 1");
        }
        if !(e.address_box_degrees > 0.0) {
            bail!("estimation.address_box_degrees must be positive, got {}", e.address_box_degrees);
        }
        if self.upstream.timeout_secs == 0 {
            bail!("upstream.timeout_secs must be at least 1");
        }
        Ok(())
    }
}
