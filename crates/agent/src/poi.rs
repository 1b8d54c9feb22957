//! Walking route through the places a tourism answer highlighted.

use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, info};

use wayfarer_core::domain::decision::join_place;
use wayfarer_core::geo::{directions_link, order_nearest};
use wayfarer_core::{GeoPoint, RouteResult, TourismResult, TravelMode};

use crate::ports::Geocoder;

pub const MAX_STOPS: usize = 8;
const FALLBACK_HIGHLIGHTS: usize = 7;
pub const TOO_FEW_POINTS_NOTE: &str =
    "Не удалось определить координаты для достаточного количества мест. Попробуй уточнить названия.";
const LINK_SOURCE: &str = "google_maps_url";

/// Place names to visit: the one-day plan when it has any, else the top
/// highlights. "Утро: Храм" contributes "Храм".
pub fn candidate_names(tourism: &TourismResult) -> Vec<String> {
    let from_plan: Vec<String> = tourism
        .plan_1_day
        .iter()
        .map(|line| line.split_once(':').map_or(line.as_str(), |(_, rest)| rest).trim())
        .filter(|name| !name.is_empty())
        .map(str::to_owned)
        .collect();

    let names = if from_plan.is_empty() {
        tourism
            .highlights
            .iter()
            .take(FALLBACK_HIGHLIGHTS)
            .map(|place| place.name.trim().to_owned())
            .filter(|name| !name.is_empty())
            .collect()
    } else {
        from_plan
    };

    names.into_iter().take(MAX_STOPS).collect()
}

#[derive(Clone, Debug, PartialEq)]
pub struct PoiRoute {
    pub result: RouteResult,
    pub origin: Option<GeoPoint>,
    pub destination: Option<GeoPoint>,
}

pub struct PoiRouteBuilder {
    geocoder: Arc<dyn Geocoder>,
}

impl PoiRouteBuilder {
    pub fn new(geocoder: Arc<dyn Geocoder>) -> Self {
        Self { geocoder }
    }

    /// `None` on no match or lookup failure; never a placeholder point.
    pub async fn geocode(&self, name: &str, query: &str) -> Option<GeoPoint> {
        match self.geocoder.geocode(query).await {
            Ok(coordinates) => Some(GeoPoint::new(name, coordinates)),
            Err(error) => {
                debug!(event_name = "poi.geocode_miss", query, kind = error.kind());
                None
            }
        }
    }

    pub fn order(&self, points: Vec<GeoPoint>) -> Vec<GeoPoint> {
        order_nearest(points)
    }

    pub fn build_link(&self, ordered: &[GeoPoint]) -> Option<String> {
        directions_link(ordered, TravelMode::Walking)
    }

    pub async fn build(
        &self,
        tourism: &TourismResult,
        city: Option<&str>,
        country: Option<&str>,
    ) -> PoiRoute {
        let place = join_place(city, country);
        let lookups = candidate_names(tourism).into_iter().map(|name| {
            let query = tourism.query_for(&name).map(str::to_owned).unwrap_or_else(|| match &place {
                Some(place) => format!("{name}, {place}"),
                None => name.clone(),
            });
            async move { self.geocode(&name, &query).await }
        });
        let points: Vec<GeoPoint> = join_all(lookups).await.into_iter().flatten().collect();

        if points.len() < 2 {
            info!(event_name = "poi.too_few_points", resolved = points.len());
            return PoiRoute {
                result: RouteResult::note("", "", TOO_FEW_POINTS_NOTE),
                origin: None,
                destination: None,
            };
        }

        let ordered = self.order(points);
        let maps_url = self.build_link(&ordered);
        info!(event_name = "poi.route_built", stops = ordered.len());

        PoiRoute {
            origin: ordered.first().cloned(),
            destination: ordered.last().cloned(),
            result: RouteResult {
                start: ordered.first().map(|p| p.name.clone()).unwrap_or_default(),
                end: ordered.last().map(|p| p.name.clone()).unwrap_or_default(),
                points: ordered.iter().map(|p| p.name.clone()).collect(),
                maps_url,
                source: LINK_SOURCE.to_owned(),
                ..RouteResult::default()
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;

    use wayfarer_core::{Coordinates, EvidenceError, TourismPlace, TourismResult};

    use super::{candidate_names, PoiRouteBuilder, TOO_FEW_POINTS_NOTE};
    use crate::ports::Geocoder;

    struct TableGeocoder {
        table: HashMap<&'static str, (f64, f64)>,
        queries: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Geocoder for TableGeocoder {
        async fn geocode(&self, query: &str) -> Result<Coordinates, EvidenceError> {
            self.queries.lock().expect("queries").push(query.to_owned());
            self.table
                .get(query)
                .map(|&(lat, lon)| Coordinates { lat, lon })
                .ok_or_else(|| EvidenceError::NotFound(query.to_owned()))
        }
    }

    fn place(name: &str, query: Option<&str>) -> TourismPlace {
        TourismPlace {
            name: name.to_owned(),
            query: query.map(str::to_owned),
            ..TourismPlace::default()
        }
    }

    #[test]
    fn plan_lines_win_over_highlights() {
        let tourism = TourismResult {
            plan_1_day: vec!["Утро: Колизей".into(), "Пантеон".into(), "Вечер:  ".into()],
            highlights: vec![place("Ватикан", None)],
            ..TourismResult::default()
        };
        assert_eq!(candidate_names(&tourism), vec!["Колизей", "Пантеон"]);
    }

    #[test]
    fn highlights_fallback_is_capped() {
        let tourism = TourismResult {
            highlights: (0..12).map(|i| place(&format!("P{i}"), None)).collect(),
            ..TourismResult::default()
        };
        assert_eq!(candidate_names(&tourism).len(), 7);

        let long_plan = TourismResult {
            plan_1_day: (0..12).map(|i| format!("Шаг: P{i}")).collect(),
            ..TourismResult::default()
        };
        assert_eq!(candidate_names(&long_plan).len(), 8);
    }

    #[tokio::test]
    async fn resolved_places_are_ordered_and_linked() {
        let geocoder = Arc::new(TableGeocoder {
            table: HashMap::from([
                ("Colosseum, Rome, Italy", (41.8902, 12.4922)),
                ("Vatican, Rome, Italy", (41.9029, 12.4534)),
                ("Forum, Rome, Italy", (41.8925, 12.4853)),
            ]),
            queries: Mutex::new(Vec::new()),
        });
        let tourism = TourismResult {
            highlights: vec![
                place("Colosseum", Some("Colosseum, Rome, Italy")),
                place("Vatican", None),
                place("Forum", None),
                place("Nowhere", None),
            ],
            ..TourismResult::default()
        };

        let route = PoiRouteBuilder::new(geocoder.clone()).build(&tourism, Some("Rome"), Some("Italy")).await;

        assert_eq!(route.result.points, vec!["Colosseum", "Forum", "Vatican"]);
        assert!(route.result.maps_url.as_deref().is_some_and(|url| url.contains("travelmode=walking")));
        assert_eq!(route.origin.map(|p| p.name), Some("Colosseum".to_owned()));
        assert_eq!(route.destination.map(|p| p.name), Some("Vatican".to_owned()));
        assert!(geocoder.queries.lock().expect("queries").contains(&"Nowhere, Rome, Italy".to_owned()));
    }

    #[tokio::test]
    async fn fewer_than_two_points_yield_only_a_note() {
        let geocoder = Arc::new(TableGeocoder {
            table: HashMap::from([("Colosseum, Rome", (41.8902, 12.4922))]),
            queries: Mutex::new(Vec::new()),
        });
        let tourism = TourismResult {
            highlights: vec![place("Colosseum", None), place("Atlantis", None)],
            ..TourismResult::default()
        };

        let route = PoiRouteBuilder::new(geocoder).build(&tourism, Some("Rome"), None).await;

        assert_eq!(route.result.notes, vec![TOO_FEW_POINTS_NOTE.to_owned()]);
        assert!(route.result.points.is_empty());
        assert_eq!(route.result.maps_url, None);
        assert_eq!(route.origin, None);
    }
}
