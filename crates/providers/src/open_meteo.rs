use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use wayfarer_agent::ports::WeatherProvider;
use wayfarer_core::domain::decision::join_place;
use wayfarer_core::config::CacheConfig;
use wayfarer_core::{Coordinates, EvidenceError, ExpiringCache, WeatherResult};

use crate::http::{fetch_json, parse_degrees};

const GEOCODE_TTL: Duration = Duration::from_secs(24 * 3600);
const FORECAST_TTL: Duration = Duration::from_secs(1800);
const DAILY_FIELDS: &str =
    "weathercode,temperature_2m_max,temperature_2m_min,precipitation_probability_max,windspeed_10m_max";

pub const NO_PLACE_SUMMARY: &str = "Не указана локация для прогноза.";
pub const UNKNOWN_PLACE_SUMMARY: &str = "Не удалось найти локацию. Уточни город/страну.";
const RAIN_ADVICE: &str = "Возьми зонт/дождевик.";
const COLD_ADVICE: &str = "Одевайся теплее (ветрозащита пригодится).";
const HEAT_ADVICE: &str = "Вода и головной убор будут кстати.";

/// Forecasts from Open-Meteo, keyed by its own geocoder. No API key.
pub struct OpenMeteoWeather {
    client: Client,
    forecast_url: String,
    geocoding_url: String,
    timeout_secs: u64,
    places: ExpiringCache<Option<(Coordinates, String)>>,
    forecasts: ExpiringCache<Value>,
}

impl OpenMeteoWeather {
    pub fn new(
        client: Client,
        forecast_url: &str,
        geocoding_url: &str,
        timeout_secs: u64,
        cache: &CacheConfig,
    ) -> Self {
        Self {
            client,
            forecast_url: forecast_url.trim_end_matches('/').to_owned(),
            geocoding_url: geocoding_url.trim_end_matches('/').to_owned(),
            timeout_secs,
            places: ExpiringCache::from_config(cache),
            forecasts: ExpiringCache::from_config(cache),
        }
    }

    async fn locate(&self, place: &str) -> Result<Option<(Coordinates, String)>, EvidenceError> {
        let key = format!("om_geo:{}", place.to_lowercase());
        if let Some(hit) = self.places.get(&key) {
            return Ok(hit);
        }
        let request = self.client.get(format!("{}/search", self.geocoding_url)).query(&[
            ("name", place),
            ("count", "1"),
            ("language", "ru"),
            ("format", "json"),
        ]);
        let body: Value = fetch_json(request, self.timeout_secs).await?;
        let located = first_location(&body, place);
        if located.is_some() {
            self.places.set(key, located.clone(), Some(GEOCODE_TTL));
        }
        Ok(located)
    }

    async fn raw_forecast(&self, at: Coordinates) -> Result<Value, EvidenceError> {
        let key = format!("om_fc:{:.4},{:.4}", at.lat, at.lon);
        if let Some(hit) = self.forecasts.get(&key) {
            return Ok(hit);
        }
        let request = self.client.get(format!("{}/forecast", self.forecast_url)).query(&[
            ("latitude", at.lat.to_string()),
            ("longitude", at.lon.to_string()),
            ("daily", DAILY_FIELDS.to_owned()),
            ("current_weather", "true".to_owned()),
            ("timezone", "auto".to_owned()),
            ("forecast_days", "3".to_owned()),
        ]);
        let body: Value = fetch_json(request, self.timeout_secs).await?;
        self.forecasts.set(key, body.clone(), Some(FORECAST_TTL));
        Ok(body)
    }
}

#[async_trait]
impl WeatherProvider for OpenMeteoWeather {
    async fn forecast(
        &self,
        country: Option<&str>,
        city: Option<&str>,
    ) -> Result<WeatherResult, EvidenceError> {
        let Some(place) = join_place(city, country) else {
            return Ok(WeatherResult { summary: NO_PLACE_SUMMARY.to_owned(), ..WeatherResult::default() });
        };
        let Some((at, label)) = self.locate(&place).await? else {
            debug!(event_name = "weather.place_unknown", place = %place);
            return Ok(WeatherResult {
                place,
                summary: UNKNOWN_PLACE_SUMMARY.to_owned(),
                ..WeatherResult::default()
            });
        };
        let body = self.raw_forecast(at).await?;
        Ok(build_result(label, &body))
    }
}

fn first_location(body: &Value, query: &str) -> Option<(Coordinates, String)> {
    let first = body["results"].as_array()?.first()?;
    let at = Coordinates {
        lat: parse_degrees(&first["latitude"])?,
        lon: parse_degrees(&first["longitude"])?,
    };
    let name = first["name"].as_str().filter(|s| !s.is_empty()).unwrap_or(query);
    let label = [Some(name), first["admin1"].as_str(), first["country"].as_str()]
        .into_iter()
        .flatten()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(", ");
    Some((at, label))
}

/// Today's line from a forecast payload.
#[derive(Debug, Default, PartialEq)]
struct DayForecast {
    date: Option<String>,
    code: Option<i64>,
    temp_max: Option<f64>,
    temp_min: Option<f64>,
    precipitation_pct: Option<f64>,
    wind_kmh: Option<f64>,
}

fn first_day(daily: &Value) -> DayForecast {
    let at = |key: &str| daily[key].get(0).filter(|v| !v.is_null());
    DayForecast {
        date: at("time").and_then(Value::as_str).map(str::to_owned),
        code: at("weathercode").and_then(Value::as_i64),
        temp_max: at("temperature_2m_max").and_then(Value::as_f64),
        temp_min: at("temperature_2m_min").and_then(Value::as_f64),
        precipitation_pct: at("precipitation_probability_max").and_then(Value::as_f64),
        wind_kmh: at("windspeed_10m_max").and_then(Value::as_f64),
    }
}

fn build_result(place: String, body: &Value) -> WeatherResult {
    let day = first_day(&body["daily"]);
    let current = &body["current_weather"];

    let date = day.date.as_deref().map(pretty_date).unwrap_or_default();
    let mut lines = vec![format!("Прогноз на {date}: {}.", describe_code(day.code))];
    if let (Some(min), Some(max)) = (day.temp_min, day.temp_max) {
        lines.push(format!("Температура: от {min:.0}°C до {max:.0}°C."));
    }
    if let Some(pct) = day.precipitation_pct {
        lines.push(format!("Вероятность осадков: {}%.", pct as i64));
    }
    if let Some(wind) = day.wind_kmh {
        lines.push(format!("Ветер (макс): {wind:.0} км/ч."));
    }

    let mut advice = Vec::new();
    if day.precipitation_pct.is_some_and(|pct| pct as i64 >= 50) {
        advice.push(RAIN_ADVICE.to_owned());
    }
    if day.temp_max.is_some_and(|max| max <= 5.0) {
        advice.push(COLD_ADVICE.to_owned());
    }
    if day.temp_max.is_some_and(|max| max >= 28.0) {
        advice.push(HEAT_ADVICE.to_owned());
    }

    WeatherResult {
        place,
        summary: lines.join(" "),
        now_temp_c: current["temperature"].as_f64(),
        feels_like_c: None,
        wind_ms: current["windspeed"].as_f64().map(|kmh| kmh / 3.6),
        advice,
        source: "open-meteo".to_owned(),
    }
}

fn pretty_date(raw: &str) -> String {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map(|date| date.format("%d.%m.%Y").to_string())
        .unwrap_or_else(|_| raw.to_owned())
}

/// WMO weather interpretation codes, in Russian.
pub fn describe_code(code: Option<i64>) -> String {
    let Some(code) = code else {
        return "нет данных".to_owned();
    };
    let text = match code {
        0 => "ясно",
        1 => "в основном ясно",
        2 => "переменная облачность",
        3 => "пасмурно",
        45 => "туман",
        48 => "изморозевый туман",
        51 => "морось (слабая)",
        53 => "морось (умеренная)",
        55 => "морось (сильная)",
        56 => "ледяная морось (слабая)",
        57 => "ледяная морось (сильная)",
        61 => "дождь (слабый)",
        63 => "дождь (умеренный)",
        65 => "дождь (сильный)",
        66 => "ледяной дождь (слабый)",
        67 => "ледяной дождь (сильный)",
        71 => "снег (слабый)",
        73 => "снег (умеренный)",
        75 => "снег (сильный)",
        77 => "снежные зёрна",
        80 => "ливни (слабые)",
        81 => "ливни (умеренные)",
        82 => "ливни (сильные)",
        85 => "снегопад (слабый)",
        86 => "снегопад (сильный)",
        95 => "гроза",
        96 => "гроза с градом (слабая)",
        99 => "гроза с градом (сильная)",
        other => return format!("код {other}"),
    };
    text.to_owned()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{build_result, describe_code, first_location, COLD_ADVICE, HEAT_ADVICE, RAIN_ADVICE};

    fn payload(code: i64, min: f64, max: f64, rain: i64) -> serde_json::Value {
        json!({
            "current_weather": {"temperature": 17.4, "windspeed": 18.0},
            "daily": {
                "time": ["2026-04-03", "2026-04-04", "2026-04-05"],
                "weathercode": [code, 3, 3],
                "temperature_2m_max": [max, 20.0, 21.0],
                "temperature_2m_min": [min, 9.0, 10.0],
                "precipitation_probability_max": [rain, 10, 0],
                "windspeed_10m_max": [22.6, 10.0, 12.0]
            }
        })
    }

    #[test]
    fn summary_describes_today() {
        let result = build_result("Roma, Lazio, Italia".into(), &payload(61, 9.6, 18.2, 70));

        assert_eq!(
            result.summary,
            "Прогноз на 03.04.2026: дождь (слабый). Температура: от 10°C до 18°C. \
             Вероятность осадков: 70%. Ветер (макс): 23 км/ч."
        );
        assert_eq!(result.advice, vec![RAIN_ADVICE.to_owned()]);
        assert_eq!(result.now_temp_c, Some(17.4));
        assert_eq!(result.wind_ms, Some(5.0));
        assert_eq!(result.source, "open-meteo");
    }

    #[test]
    fn advice_follows_temperature_extremes() {
        assert_eq!(build_result("x".into(), &payload(71, -8.0, 2.0, 10)).advice, vec![COLD_ADVICE]);
        assert_eq!(build_result("x".into(), &payload(0, 22.0, 33.0, 0)).advice, vec![HEAT_ADVICE]);
    }

    #[test]
    fn sparse_payload_still_yields_a_summary() {
        let result = build_result("x".into(), &json!({"daily": {}}));
        assert_eq!(result.summary, "Прогноз на : нет данных.");
        assert!(result.advice.is_empty());
        assert_eq!(result.wind_ms, None);
    }

    #[test]
    fn unknown_codes_are_shown_raw() {
        assert_eq!(describe_code(Some(2)), "переменная облачность");
        assert_eq!(describe_code(Some(42)), "код 42");
        assert_eq!(describe_code(None), "нет данных");
    }

    #[test]
    fn location_label_skips_missing_parts() {
        let body = json!({"results": [
            {"name": "Киото", "latitude": 35.02107, "longitude": 135.75385, "country": "Япония"}
        ]});
        let (at, label) = first_location(&body, "Kyoto").expect("located");
        assert_eq!(label, "Киото, Япония");
        assert!((at.lat - 35.02107).abs() < 1e-9);
        assert_eq!(first_location(&json!({"generationtime_ms": 0.4}), "Atlantis"), None);
    }
}
