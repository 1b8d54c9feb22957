//! Collaborator seams the orchestrator is wired with. Every lookup returns
//! an explicit `Result`; the orchestrator decides what a failure means.

use std::collections::BTreeMap;

use async_trait::async_trait;

use wayfarer_core::{
    Coordinates, EvidenceError, LegalResult, RouteResult, TourismResult, WeatherResult,
};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TourismQuery {
    pub country: Option<String>,
    pub city: Option<String>,
    pub dates: Option<String>,
    pub question: String,
    pub summary: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LegalQuery {
    pub country: Option<String>,
    pub city: Option<String>,
    pub question: String,
}

#[async_trait]
pub trait TourismProvider: Send + Sync {
    async fn tourism(&self, query: &TourismQuery) -> Result<TourismResult, EvidenceError>;
}

#[async_trait]
pub trait LegalProvider: Send + Sync {
    async fn legal(&self, query: &LegalQuery) -> Result<LegalResult, EvidenceError>;
}

#[async_trait]
pub trait WeatherProvider: Send + Sync {
    async fn forecast(
        &self,
        country: Option<&str>,
        city: Option<&str>,
    ) -> Result<WeatherResult, EvidenceError>;
}

/// Explicit A to B routing.
#[async_trait]
pub trait RouteProvider: Send + Sync {
    async fn route(&self, start: &str, end: &str) -> Result<RouteResult, EvidenceError>;
}

#[async_trait]
pub trait Geocoder: Send + Sync {
    /// `NotFound` when the lookup has no match.
    async fn geocode(&self, query: &str) -> Result<Coordinates, EvidenceError>;
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EncyclopediaPage {
    pub title: String,
    pub extract: String,
    pub thumbnail_url: Option<String>,
}

#[async_trait]
pub trait Encyclopedia: Send + Sync {
    async fn lookup(&self, query: &str, sentences: u8) -> Result<EncyclopediaPage, EvidenceError>;
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RetrievalFilter {
    pub country: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetrievedChunk {
    pub text: String,
    pub source: String,
    pub metadata: BTreeMap<String, String>,
}

#[async_trait]
pub trait Retriever: Send + Sync {
    async fn retrieve(
        &self,
        query: &str,
        k: usize,
        filter: &RetrievalFilter,
    ) -> Result<Vec<RetrievedChunk>, EvidenceError>;
}

/// Long-term destination knowledge with alias lookup.
pub trait KnowledgeBase: Send + Sync {
    fn resolve_country(&self, text: &str) -> Option<String>;
    fn resolve_city(&self, country_key: &str, text: &str) -> Option<String>;
    fn sections(&self, country_key: &str, names: &[&str]) -> BTreeMap<String, String>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NoopRetriever;

#[async_trait]
impl Retriever for NoopRetriever {
    async fn retrieve(
        &self,
        _query: &str,
        _k: usize,
        _filter: &RetrievalFilter,
    ) -> Result<Vec<RetrievedChunk>, EvidenceError> {
        Ok(Vec::new())
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NoopEncyclopedia;

#[async_trait]
impl Encyclopedia for NoopEncyclopedia {
    async fn lookup(&self, query: &str, _sentences: u8) -> Result<EncyclopediaPage, EvidenceError> {
        Err(EvidenceError::NotFound(query.to_owned()))
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct EmptyKnowledgeBase;

impl KnowledgeBase for EmptyKnowledgeBase {
    fn resolve_country(&self, _text: &str) -> Option<String> {
        None
    }

    fn resolve_city(&self, _country_key: &str, _text: &str) -> Option<String> {
        None
    }

    fn sections(&self, _country_key: &str, _names: &[&str]) -> BTreeMap<String, String> {
        BTreeMap::new()
    }
}
