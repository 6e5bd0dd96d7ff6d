use geo::{Coord, Rect};
use serde::Serialize;

/// What a request asks about: a free-text place or the map's current viewport.
#[derive(Debug, Clone, PartialEq)]
pub enum LocationQuery {
    Address(String),
    Viewport { bounds: ViewportBounds, zoom: Option<f64> },
}

/// South/west/north/east edges in degrees, as the map widget reports them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportBounds {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

impl ViewportBounds {
    pub fn center(&self) -> (f64, f64) {
        ((self.south + self.north) / 2.0, (self.west + self.east) / 2.0)
    }

    /// The bounds as a geo rectangle, x = longitude, y = latitude.
    pub fn to_rect(&self) -> Rect<f64> {
        Rect::new(
            Coord { x: self.west, y: self.south },
            Coord { x: self.east, y: self.north },
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedLocation {
    pub lat: f64,
    pub lon: f64,
    pub display_name: String,
    pub country: String, // free-text name, "Unknown" when the geocoder has none
}

#[derive(Debug, Clone, PartialEq)]
pub struct PopulationEstimate {
    pub country: String,
    pub population: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PenetrationRate {
    pub country: String,
    pub rate_percent: f64,
}

/// A density marker standing for `phonesPerDot` phones, not a device.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Point {
    pub lat: f64,
    pub lon: f64,
}

/// The JSON payload returned for a successful estimate.
#[derive(Debug, Clone, Serialize)]
pub struct EstimationResult {
    #[serde(rename = "estimate")]
    pub estimated_phones: u64,
    pub population: u64,
    #[serde(rename = "rate")]
    pub rate_percent: f64,
    pub lat: f64,
    pub lon: f64,
    #[serde(rename = "area")]
    pub area_name: String,
    pub dots: Vec<Point>,
    #[serde(rename = "phonesPerDot")]
    pub phones_per_dot: u64,
}

/// Outcome of a lookup that never fails outward. `Degraded` keeps the reason
/// so callers can log it before collapsing to the value.
#[derive(Debug, Clone, PartialEq)]
pub enum Sourced<T> {
    Fresh(T),
    Degraded { fallback: T, reason: String },
}

impl<T> Sourced<T> {
    #[cfg(test)]
    pub fn value(&self) -> &T {
        match self {
            Sourced::Fresh(v) => v,
            Sourced::Degraded { fallback, .. } => fallback,
        }
    }

    pub fn into_value(self) -> T {
        match self {
            Sourced::Fresh(v) => v,
            Sourced::Degraded { fallback, .. } => fallback,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Sourced::Degraded { .. })
    }
}
