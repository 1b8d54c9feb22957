use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;
use tracing::info;

use wayfarer_agent::ports::KnowledgeBase;

#[derive(Debug, Default, Deserialize)]
struct CountryEntry {
    #[serde(default)]
    aliases: Vec<String>,
    #[serde(default)]
    cities: BTreeMap<String, CityEntry>,
    /// Free-text sections (`visa`, `transport`, ...) stored beside the
    /// structured keys.
    #[serde(flatten)]
    rest: BTreeMap<String, Value>,
}

#[derive(Debug, Default, Deserialize)]
struct CityEntry {
    #[serde(default)]
    aliases: Vec<String>,
}

/// Destination knowledge loaded from a JSON file shaped as
/// `{country_key: {aliases: [..], cities: {city_key: {aliases: [..]}}, <section>: text}}`.
/// Lookups are exact and case-insensitive over keys and aliases.
#[derive(Debug, Default)]
pub struct JsonKnowledgeBase {
    countries: BTreeMap<String, CountryEntry>,
    country_aliases: BTreeMap<String, String>,
    city_aliases: BTreeMap<String, BTreeMap<String, String>>,
}

impl JsonKnowledgeBase {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read knowledge base {}", path.display()))?;
        let base = Self::from_json(&raw)
            .with_context(|| format!("invalid knowledge base {}", path.display()))?;
        info!(event_name = "knowledge.loaded", countries = base.countries.len(), path = %path.display());
        Ok(base)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let countries: BTreeMap<String, CountryEntry> = serde_json::from_str(raw)?;

        let mut country_aliases = BTreeMap::new();
        let mut city_aliases = BTreeMap::new();
        for (key, entry) in &countries {
            country_aliases.insert(key.to_lowercase(), key.clone());
            for alias in &entry.aliases {
                country_aliases.insert(alias.trim().to_lowercase(), key.clone());
            }
            let cities: &mut BTreeMap<String, String> = city_aliases.entry(key.clone()).or_default();
            for (city_key, city) in &entry.cities {
                cities.insert(city_key.to_lowercase(), city_key.clone());
                for alias in &city.aliases {
                    cities.insert(alias.trim().to_lowercase(), city_key.clone());
                }
            }
        }

        Ok(Self { countries, country_aliases, city_aliases })
    }

    pub fn len(&self) -> usize {
        self.countries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.countries.is_empty()
    }

    fn country_key(&self, text: &str) -> Option<&str> {
        self.countries
            .get_key_value(text)
            .map(|(key, _)| key.as_str())
            .or_else(|| self.country_aliases.get(&text.trim().to_lowercase()).map(String::as_str))
    }
}

impl KnowledgeBase for JsonKnowledgeBase {
    fn resolve_country(&self, text: &str) -> Option<String> {
        self.country_key(text).map(str::to_owned)
    }

    fn resolve_city(&self, country_key: &str, text: &str) -> Option<String> {
        let country = self.country_key(country_key)?;
        self.city_aliases.get(country)?.get(&text.trim().to_lowercase()).cloned()
    }

    fn sections(&self, country_key: &str, names: &[&str]) -> BTreeMap<String, String> {
        let Some(entry) = self.country_key(country_key).and_then(|key| self.countries.get(key)) else {
            return BTreeMap::new();
        };
        names
            .iter()
            .filter_map(|name| {
                let text = entry.rest.get(*name)?.as_str()?.trim();
                (!text.is_empty()).then(|| ((*name).to_owned(), text.to_owned()))
            })
            .collect()
    }
}
