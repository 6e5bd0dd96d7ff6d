use crate::config::PenetrationConfig;
use crate::types::PenetrationRate;
use std::collections::HashMap;

/// Phones-per-100-people by country name, fixed at startup.
///
/// Keys are matched exactly and case-sensitively against the geocoder's country
/// name; anything unmapped gets the default rate.
#[derive(Debug, Clone)]
pub struct PenetrationTable {
    rates: HashMap<String, f64>,
    default_rate: f64,
}

impl PenetrationTable {
    pub fn new(rates: HashMap<String, f64>, default_rate: f64) -> Self {
        Self { rates, default_rate }
    }

    pub fn from_config(config: &PenetrationConfig) -> Self {
        Self::new(config.rates.clone(), config.default_rate)
    }

    pub fn rate_for(&self, country: &str) -> PenetrationRate {
        let rate_percent = self.rates.get(country).copied().unwrap_or(self.default_rate);
        PenetrationRate {
            country: country.to_string(),
            rate_percent,
        }
    }

    pub fn is_mapped(&self, country: &str) -> bool {
        self.rates.contains_key(country)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> PenetrationTable {
        PenetrationTable::from_config(&PenetrationConfig::default())
    }

    #[test]
    fn test_mapped_country() {
        assert_eq!(table().rate_for("Kenya").rate_percent, 90.0);
        assert_eq!(table().rate_for("United States").rate_percent, 120.0);
    }

    #[test]
    fn test_unmapped_and_unknown_use_default() {
        let t = table();
        assert_eq!(t.rate_for("Atlantis").rate_percent, 100.0);
        assert_eq!(t.rate_for("Unknown").rate_percent, 100.0);
        assert!(!t.is_mapped("Unknown"));
    }

    #[test]
    fn test_match_is_case_sensitive() {
        let t = table();
        assert_eq!(t.rate_for("kenya").rate_percent, 100.0);
        assert_eq!(t.rate_for(" Kenya").rate_percent, 100.0);
    }

    #[test]
    fn test_same_country_same_rate() {
        let t = table();
        assert_eq!(t.rate_for("China"), t.rate_for("China"));
    }

    #[test]
    fn test_injected_table() {
        let t = PenetrationTable::new(HashMap::from([("Chile".to_string(), 130.0)]), 75.0);
        assert_eq!(t.rate_for("Chile").rate_percent, 130.0);
        assert_eq!(t.rate_for("Kenya").rate_percent, 75.0);
    }
}
