//! Great-circle math, nearest-neighbour ordering and map links.

use serde::{Deserialize, Serialize};
use url::Url;

const EARTH_RADIUS_KM: f64 = 6371.0;
const DIRECTIONS_BASE: &str = "https://www.google.com/maps/dir/";
const SEARCH_BASE: &str = "https://www.google.com/maps/search/";

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

/// A successfully geocoded place.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub name: String,
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(name: impl Into<String>, coordinates: Coordinates) -> Self {
        Self { name: name.into(), lat: coordinates.lat, lon: coordinates.lon }
    }

    pub fn coordinates(&self) -> Coordinates {
        Coordinates { lat: self.lat, lon: self.lon }
    }

    fn as_param(&self) -> String {
        format!("{},{}", self.lat, self.lon)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TravelMode {
    Walking,
    Driving,
}

impl TravelMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Walking => "walking",
            Self::Driving => "driving",
        }
    }
}

pub fn haversine_km(a: Coordinates, b: Coordinates) -> f64 {
    let (p1, p2) = (a.lat.to_radians(), b.lat.to_radians());
    let d_phi = (b.lat - a.lat).to_radians();
    let d_lambda = (b.lon - a.lon).to_radians();
    let x = (d_phi / 2.0).sin().powi(2) + p1.cos() * p2.cos() * (d_lambda / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * x.sqrt().min(1.0).asin()
}

/// Greedy nearest-neighbour tour starting at the first point. Inputs of two
/// points or fewer come back unchanged. Quadratic, fine for a handful of stops.
pub fn order_nearest(points: Vec<GeoPoint>) -> Vec<GeoPoint> {
    if points.len() <= 2 {
        return points;
    }

    let mut remaining = points;
    let mut ordered = Vec::with_capacity(remaining.len());
    ordered.push(remaining.remove(0));

    while !remaining.is_empty() {
        let Some(last) = ordered.last().map(GeoPoint::coordinates) else {
            break;
        };
        let mut best = 0;
        let mut best_distance = f64::INFINITY;
        for (index, candidate) in remaining.iter().enumerate() {
            let distance = haversine_km(last, candidate.coordinates());
            if distance < best_distance {
                best = index;
                best_distance = distance;
            }
        }
        ordered.push(remaining.remove(best));
    }

    ordered
}

pub fn path_length_km(points: &[GeoPoint]) -> f64 {
    points.windows(2).map(|pair| haversine_km(pair[0].coordinates(), pair[1].coordinates())).sum()
}

/// Multi-stop directions link in visiting order; `None` below two points.
pub fn directions_link(points: &[GeoPoint], mode: TravelMode) -> Option<String> {
    let (origin, rest) = points.split_first()?;
    let (destination, waypoints) = rest.split_last()?;

    let mut params = vec![
        ("api", "1".to_owned()),
        ("origin", origin.as_param()),
        ("destination", destination.as_param()),
        ("travelmode", mode.as_str().to_owned()),
    ];
    if !waypoints.is_empty() {
        let joined = waypoints.iter().map(GeoPoint::as_param).collect::<Vec<_>>().join("|");
        params.push(("waypoints", joined));
    }

    Url::parse_with_params(DIRECTIONS_BASE, &params).ok().map(String::from)
}

/// Map search link for a free-text place query.
pub fn search_link(query: &str) -> Option<String> {
    let query = query.trim();
    if query.is_empty() {
        return None;
    }
    Url::parse_with_params(SEARCH_BASE, &[("api", "1"), ("query", query)]).ok().map(String::from)
}
