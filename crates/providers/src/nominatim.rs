use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use wayfarer_agent::ports::Geocoder;
use wayfarer_core::config::CacheConfig;
use wayfarer_core::{Coordinates, EvidenceError, ExpiringCache};

use crate::http::{fetch_json, parse_degrees};

const CACHE_TTL: Duration = Duration::from_secs(7 * 24 * 3600);

/// Free-text geocoding against a Nominatim instance. Hits are cached for a
/// week by lowercased query; misses are not cached.
pub struct NominatimGeocoder {
    client: Client,
    base_url: String,
    timeout_secs: u64,
    cache: ExpiringCache<Coordinates>,
}

impl NominatimGeocoder {
    pub fn new(client: Client, base_url: &str, timeout_secs: u64, cache: &CacheConfig) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
            timeout_secs,
            cache: ExpiringCache::from_config(cache),
        }
    }
}

#[async_trait]
impl Geocoder for NominatimGeocoder {
    async fn geocode(&self, query: &str) -> Result<Coordinates, EvidenceError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(EvidenceError::NotFound(String::new()));
        }
        let key = format!("geo:{}", query.to_lowercase());
        if let Some(hit) = self.cache.get(&key) {
            return Ok(hit);
        }

        let request = self
            .client
            .get(format!("{}/search", self.base_url))
            .query(&[("q", query), ("format", "json"), ("limit", "1")]);
        let body: Value = fetch_json(request, self.timeout_secs).await?;

        let coordinates = first_hit(&body).ok_or_else(|| EvidenceError::NotFound(query.to_owned()))?;
        debug!(event_name = "geocode.hit", query, lat = coordinates.lat, lon = coordinates.lon);
        self.cache.set(key, coordinates, Some(CACHE_TTL));
        Ok(coordinates)
    }
}

fn first_hit(body: &Value) -> Option<Coordinates> {
    let first = body.as_array()?.first()?;
    Some(Coordinates { lat: parse_degrees(&first["lat"])?, lon: parse_degrees(&first["lon"])? })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::first_hit;

    #[test]
    fn reads_string_coordinates_of_the_first_hit() {
        let body = json!([
            {"lat": "41.8933203", "lon": "12.4829321", "display_name": "Roma"},
            {"lat": "0", "lon": "0"}
        ]);
        let hit = first_hit(&body).expect("hit");
        assert!((hit.lat - 41.8933203).abs() < 1e-9);
        assert!((hit.lon - 12.4829321).abs() < 1e-9);
    }

    #[test]
    fn empty_or_broken_results_are_misses() {
        assert_eq!(first_hit(&json!([])), None);
        assert_eq!(first_hit(&json!({"error": "rate limited"})), None);
        assert_eq!(first_hit(&json!([{"lat": "x", "lon": "1"}])), None);
    }
}
