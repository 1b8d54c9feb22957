use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, info};

use wayfarer_agent::ports::{Geocoder, RouteProvider};
use wayfarer_core::config::CacheConfig;
use wayfarer_core::geo::directions_link;
use wayfarer_core::{
    Coordinates, EvidenceError, ExpiringCache, GeoPoint, RouteResult, RouteStep, TravelMode,
};

use crate::http::fetch_json;

const CACHE_TTL: Duration = Duration::from_secs(6 * 3600);
const MAX_STEPS: usize = 20;
const UNSPECIFIED: &str = "не указано";
pub const GEOCODE_FAILED_NOTE: &str =
    "Не удалось геокодировать одну из точек. Попробуй формат: «Город, Страна -> Город, Страна».";
const DEFAULT_INSTRUCTION: &str = "Двигайтесь по маршруту";

/// Driving directions between two free-text places via an OSRM server.
pub struct OsrmRouter {
    client: Client,
    base_url: String,
    timeout_secs: u64,
    geocoder: Arc<dyn Geocoder>,
    cache: ExpiringCache<Value>,
}

impl OsrmRouter {
    pub fn new(
        client: Client,
        base_url: &str,
        timeout_secs: u64,
        geocoder: Arc<dyn Geocoder>,
        cache: &CacheConfig,
    ) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
            timeout_secs,
            geocoder,
            cache: ExpiringCache::from_config(cache),
        }
    }

    /// `None` when the place has no match; transport failures propagate.
    async fn locate(&self, place: &str) -> Result<Option<Coordinates>, EvidenceError> {
        match self.geocoder.geocode(place).await {
            Ok(at) => Ok(Some(at)),
            Err(EvidenceError::NotFound(_)) => Ok(None),
            Err(error) => Err(error),
        }
    }

    async fn fetch(&self, a: Coordinates, b: Coordinates) -> Result<Value, EvidenceError> {
        let path = format!("{},{};{},{}", a.lon, a.lat, b.lon, b.lat);
        let key = format!("osrm:{},{}->{},{}", a.lon, a.lat, b.lon, b.lat);
        if let Some(hit) = self.cache.get(&key) {
            return Ok(hit);
        }
        let request = self
            .client
            .get(format!("{}/route/v1/driving/{path}", self.base_url))
            .query(&[("overview", "false"), ("steps", "true")]);
        let body: Value = fetch_json(request, self.timeout_secs).await?;
        self.cache.set(key, body.clone(), Some(CACHE_TTL));
        Ok(body)
    }
}

#[async_trait]
impl RouteProvider for OsrmRouter {
    async fn route(&self, start: &str, end: &str) -> Result<RouteResult, EvidenceError> {
        let (start, end) = (start.trim(), end.trim());
        let (a, b) = (self.locate(start).await?, self.locate(end).await?);
        let (Some(a), Some(b)) = (a, b) else {
            return Ok(RouteResult::note(
                non_blank(start),
                non_blank(end),
                GEOCODE_FAILED_NOTE,
            ));
        };

        let body = self.fetch(a, b).await?;
        let mut result = parse_route(start, end, &body);
        if result.notes.is_empty() {
            let points = [GeoPoint::new(start, a), GeoPoint::new(end, b)];
            result.maps_url = directions_link(&points, TravelMode::Driving);
            info!(
                event_name = "route.built",
                distance_km = result.distance_km.unwrap_or_default(),
                steps = result.steps.len()
            );
        } else {
            debug!(event_name = "route.rejected", notes = ?result.notes);
        }
        Ok(result)
    }
}

fn non_blank(text: &str) -> &str {
    if text.is_empty() {
        UNSPECIFIED
    } else {
        text
    }
}

fn parse_route(start: &str, end: &str, body: &Value) -> RouteResult {
    let code = body["code"].as_str().unwrap_or("unknown");
    let Some(route) = body["routes"].get(0).filter(|_| code == "Ok") else {
        return RouteResult::note(start, end, format!("OSRM вернул ошибку: {code}"));
    };

    let steps = route["legs"]
        .as_array()
        .into_iter()
        .flatten()
        .flat_map(|leg| leg["steps"].as_array().into_iter().flatten())
        .take(MAX_STEPS)
        .map(|step| RouteStep {
            instruction: instruction(step),
            distance_m: step["distance"].as_f64().map(|m| m as u64),
            duration_s: step["duration"].as_f64().map(|s| s as u64),
        })
        .collect();

    RouteResult {
        start: start.to_owned(),
        end: end.to_owned(),
        distance_km: Some(route["distance"].as_f64().unwrap_or_default() / 1000.0),
        duration_min: Some(route["duration"].as_f64().unwrap_or_default() / 60.0),
        steps,
        source: "osrm".to_owned(),
        ..RouteResult::default()
    }
}

fn instruction(step: &Value) -> String {
    let maneuver = &step["maneuver"];
    let base = [maneuver["type"].as_str(), maneuver["modifier"].as_str()]
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    let name = step["name"].as_str().map(str::trim).unwrap_or_default();
    match (base.is_empty(), name.is_empty()) {
        (false, false) => format!("{base} на {name}"),
        (true, false) => name.to_owned(),
        (false, true) => base,
        (true, true) => DEFAULT_INSTRUCTION.to_owned(),
    }
}
