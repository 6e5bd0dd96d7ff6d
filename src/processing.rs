use crate::config::EstimationConfig;

/// Phone count and how densely it is drawn at a given zoom.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DotPlan {
    pub estimated_phones: u64,
    pub phones_per_dot: u64,
    pub dot_count: usize,
}

pub fn estimate_phones(population: u64, rate_percent: f64) -> u64 {
    let phones = (population as f64 * rate_percent / 100.0).round();
    // negative rates are rejected at config load; clamp anyway so the cast never wraps
    phones.max(0.0) as u64
}

/// One phone per dot when zoomed in past the threshold, coarse grouping otherwise.
/// A missing zoom counts as zoomed out.
pub fn phones_per_dot(config: &EstimationConfig, zoom: Option<f64>) -> u64 {
    match zoom {
        Some(z) if z > config.fine_zoom_threshold => config.fine_phones_per_dot,
        _ => config.coarse_phones_per_dot,
    }
}

pub fn plan_dots(
    config: &EstimationConfig,
    population: u64,
    rate_percent: f64,
    zoom: Option<f64>,
) -> DotPlan {
    let estimated_phones = estimate_phones(population, rate_percent);
    let phones_per_dot = phones_per_dot(config, zoom).max(1);
    let dots = estimated_phones / phones_per_dot;
    let dot_count = usize::try_from(dots).unwrap_or(usize::MAX).min(config.max_dots);

    DotPlan {
        estimated_phones,
        phones_per_dot,
        dot_count,
    }
}
