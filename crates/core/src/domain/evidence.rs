use serde::{Deserialize, Serialize};

use crate::domain::capability::{Capability, CapabilitySet};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TourismPlace {
    pub name: String,
    pub why: String,
    pub time_needed: Option<String>,
    /// Geocodable search string, usually "Name, City, Country".
    pub query: Option<String>,
    pub summary: Option<String>,
    pub image_url: Option<String>,
    pub maps_url: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FoodPlace {
    pub name: String,
    pub why: String,
    pub query: Option<String>,
    pub maps_url: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TourismResult {
    pub destination_title: String,
    pub overview: String,
    pub history: String,
    pub city_image_url: Option<String>,
    pub highlights: Vec<TourismPlace>,
    pub etiquette: Vec<String>,
    pub food_spots: Vec<FoodPlace>,
    pub areas: Vec<String>,
    pub plan_1_day: Vec<String>,
    pub tips: Vec<String>,
    pub questions_to_clarify: Vec<String>,
}

impl TourismResult {
    pub fn is_meaningful(&self) -> bool {
        !self.overview.trim().is_empty()
            || self.highlights.iter().any(|p| !p.name.trim().is_empty())
            || !self.food_spots.is_empty()
            || !self.plan_1_day.is_empty()
            || !self.tips.is_empty()
    }

    /// Looks up the geocoding query a highlight declared for itself.
    pub fn query_for(&self, name: &str) -> Option<&str> {
        self.highlights
            .iter()
            .find(|place| place.name.trim().eq_ignore_ascii_case(name.trim()))
            .and_then(|place| place.query.as_deref())
            .filter(|query| !query.trim().is_empty())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LegalResult {
    pub visa_required: Option<bool>,
    pub visa: Vec<String>,
    pub entry_and_registration: Vec<String>,
    pub prohibitions_and_fines: Vec<String>,
    pub recommendations: Vec<String>,
    pub sources: Vec<String>,
    pub missing_info: Option<String>,
}

impl LegalResult {
    pub fn has_details(&self) -> bool {
        !(self.visa.is_empty()
            && self.entry_and_registration.is_empty()
            && self.prohibitions_and_fines.is_empty()
            && self.recommendations.is_empty())
    }

    pub fn is_meaningful(&self) -> bool {
        self.visa_required.is_some() || self.has_details() || self.missing_info.is_some()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WeatherResult {
    pub place: String,
    pub summary: String,
    pub now_temp_c: Option<f64>,
    pub feels_like_c: Option<f64>,
    pub wind_ms: Option<f64>,
    pub advice: Vec<String>,
    pub source: String,
}

impl WeatherResult {
    pub fn is_meaningful(&self) -> bool {
        !self.summary.trim().is_empty()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RouteStep {
    pub instruction: String,
    pub distance_m: Option<u64>,
    pub duration_s: Option<u64>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RouteResult {
    pub start: String,
    pub end: String,
    pub distance_km: Option<f64>,
    pub duration_min: Option<f64>,
    pub steps: Vec<RouteStep>,
    pub notes: Vec<String>,
    pub source: String,
    pub maps_url: Option<String>,
    /// Visiting order of a multi-stop walk; empty for A to B routes.
    pub points: Vec<String>,
}

impl RouteResult {
    /// A route carrying only an explanation for the user.
    pub fn note(start: impl Into<String>, end: impl Into<String>, note: impl Into<String>) -> Self {
        Self { start: start.into(), end: end.into(), notes: vec![note.into()], ..Self::default() }
    }

    pub fn is_meaningful(&self) -> bool {
        self.maps_url.is_some()
            || !self.points.is_empty()
            || !self.steps.is_empty()
            || !self.notes.is_empty()
    }
}

/// One piece of evidence, tagged by the capability that produced it.
#[derive(Clone, Debug, PartialEq)]
pub enum Evidence {
    Tourism(TourismResult),
    Legal(LegalResult),
    Weather(WeatherResult),
    Route(RouteResult),
}

impl Evidence {
    pub fn capability(&self) -> Capability {
        match self {
            Self::Tourism(_) => Capability::Tourism,
            Self::Legal(_) => Capability::Legal,
            Self::Weather(_) => Capability::Weather,
            Self::Route(_) => Capability::Route,
        }
    }

    pub fn is_meaningful(&self) -> bool {
        match self {
            Self::Tourism(result) => result.is_meaningful(),
            Self::Legal(result) => result.is_meaningful(),
            Self::Weather(result) => result.is_meaningful(),
            Self::Route(result) => result.is_meaningful(),
        }
    }
}

/// Aggregated, partially-optional result of one turn.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EvidenceBundle {
    pub destination_title: String,
    pub tourism: Option<TourismResult>,
    pub legal: Option<LegalResult>,
    pub weather: Option<WeatherResult>,
    pub route: Option<RouteResult>,
    pub advisory: Option<String>,
}

impl EvidenceBundle {
    pub fn new(destination_title: impl Into<String>) -> Self {
        Self { destination_title: destination_title.into(), ..Self::default() }
    }

    /// Stores evidence unless it is trivial. Returns whether it was kept.
    pub fn insert(&mut self, evidence: Evidence) -> bool {
        if !evidence.is_meaningful() {
            return false;
        }
        match evidence {
            Evidence::Tourism(result) => self.tourism = Some(result),
            Evidence::Legal(result) => self.legal = Some(result),
            Evidence::Weather(result) => self.weather = Some(result),
            Evidence::Route(result) => self.route = Some(result),
        }
        true
    }

    pub fn capabilities(&self) -> CapabilitySet {
        let mut present = CapabilitySet::new();
        if self.tourism.is_some() {
            present.insert(Capability::Tourism);
        }
        if self.legal.is_some() {
            present.insert(Capability::Legal);
        }
        if self.weather.is_some() {
            present.insert(Capability::Weather);
        }
        if self.route.is_some() {
            present.insert(Capability::Route);
        }
        present
    }

    pub fn is_empty(&self) -> bool {
        self.capabilities().is_empty() && self.advisory.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::{Evidence, EvidenceBundle, LegalResult, RouteResult, TourismPlace, TourismResult};
    use crate::domain::capability::Capability;

    #[test]
    fn trivial_evidence_is_not_stored() {
        let mut bundle = EvidenceBundle::new("✈️ Japan");
        assert!(!bundle.insert(Evidence::Legal(LegalResult::default())));
        assert!(!bundle.insert(Evidence::Tourism(TourismResult::default())));
        assert!(bundle.is_empty());

        let legal = LegalResult { visa_required: Some(true), ..LegalResult::default() };
        assert!(bundle.insert(Evidence::Legal(legal)));
        assert_eq!(bundle.capabilities().iter().collect::<Vec<_>>(), vec![Capability::Legal]);
    }

    #[test]
    fn note_only_route_counts_as_evidence() {
        let route = RouteResult::note("", "", "could not geocode");
        assert!(route.is_meaningful());
        assert!(route.points.is_empty());
    }

    #[test]
    fn tourism_query_lookup_ignores_case() {
        let tourism = TourismResult {
            highlights: vec![TourismPlace {
                name: "Colosseum".into(),
                query: Some("Colosseum, Rome, Italy".into()),
                ..TourismPlace::default()
            }],
            ..TourismResult::default()
        };
        assert_eq!(tourism.query_for("colosseum"), Some("Colosseum, Rome, Italy"));
        assert_eq!(tourism.query_for("Pantheon"), None);
    }

    #[test]
    fn lenient_schema_accepts_partial_model_output() {
        let parsed: TourismResult =
            serde_json::from_str(r#"{"overview":"Old capital","highlights":[{"name":"Gion"}]}"#)
                .expect("partial payload");
        assert_eq!(parsed.highlights[0].why, "");
        assert!(parsed.is_meaningful());
    }
}
