use crate::types::Point;
use geo::{Coord, Rect};
use rand::Rng;

/// Scatters `count` independent, uniformly distributed points over `rect`
/// (x = longitude, y = latitude). Points may overlap.
pub fn sample_points<R: Rng + ?Sized>(rect: &Rect<f64>, count: usize, rng: &mut R) -> Vec<Point> {
    let min = rect.min();
    let (width, height) = (rect.width(), rect.height());

    (0..count)
        .map(|_| Point {
            lat: min.y + rng.gen::<f64>() * height,
            lon: min.x + rng.gen::<f64>() * width,
        })
        .collect()
}

/// Square of side `side_degrees` centered on a coordinate, used when an address
/// resolves to a single point rather than an area.
pub fn box_around(lat: f64, lon: f64, side_degrees: f64) -> Rect<f64> {
    let half = side_degrees / 2.0;
    Rect::new(
        Coord { x: lon - half, y: lat - half },
        Coord { x: lon + half, y: lat + half },
    )
}
