//! Concrete collaborators for the orchestrator: the chat backend plus the
//! key-free public data services (Nominatim, Open-Meteo, OSRM, Wikipedia)
//! and the file-backed knowledge sources.

pub mod chat;
pub mod http;
pub mod knowledge;
pub mod legal_dir;
pub mod nominatim;
pub mod open_meteo;
pub mod osrm;
pub mod wikipedia;

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};

use wayfarer_agent::ports::{EmptyKnowledgeBase, KnowledgeBase, NoopRetriever, Retriever};
use wayfarer_agent::Collaborators;
use wayfarer_core::config::AppConfig;

pub use chat::OpenAiCompatibleClient;
pub use knowledge::JsonKnowledgeBase;
pub use legal_dir::LegalDirectoryRetriever;
pub use nominatim::NominatimGeocoder;
pub use open_meteo::OpenMeteoWeather;
pub use osrm::OsrmRouter;
pub use wikipedia::WikipediaClient;

/// Wires every collaborator from configuration. Missing knowledge files are
/// not fatal: the assistant runs without them and says so in the logs.
pub fn build_collaborators(config: &AppConfig) -> Result<Collaborators> {
    let providers = &config.providers;
    let client = http::build_client(&providers.user_agent, providers.timeout_secs)
        .context("failed to build provider http client")?;

    let llm = Arc::new(OpenAiCompatibleClient::from_config(&config.llm)?);
    let geocoder = Arc::new(NominatimGeocoder::new(
        client.clone(),
        &providers.nominatim_url,
        providers.timeout_secs,
        &config.cache,
    ));
    let weather = Arc::new(OpenMeteoWeather::new(
        client.clone(),
        &providers.open_meteo_url,
        &providers.open_meteo_geocoding_url,
        providers.timeout_secs,
        &config.cache,
    ));
    let route = Arc::new(OsrmRouter::new(
        client.clone(),
        &providers.osrm_url,
        providers.timeout_secs,
        geocoder.clone(),
        &config.cache,
    ));
    let encyclopedia =
        Arc::new(WikipediaClient::new(
            client,
            &providers.wikipedia_lang,
            providers.timeout_secs,
            &config.cache,
        ));

    let knowledge: Arc<dyn KnowledgeBase> = match &providers.knowledge_base_path {
        Some(path) if path.exists() => Arc::new(JsonKnowledgeBase::load(path)?),
        Some(path) => {
            warn!(event_name = "knowledge.missing", path = %path.display());
            Arc::new(EmptyKnowledgeBase)
        }
        None => Arc::new(EmptyKnowledgeBase),
    };
    let retriever: Arc<dyn Retriever> = match &providers.legal_kb_dir {
        Some(dir) if dir.is_dir() => Arc::new(LegalDirectoryRetriever::load(dir)?),
        Some(dir) => {
            warn!(event_name = "legal_index.missing", dir = %dir.display());
            Arc::new(NoopRetriever)
        }
        None => Arc::new(NoopRetriever),
    };

    info!(
        event_name = "providers.ready",
        llm_provider = ?config.llm.provider,
        model = %config.llm.model,
        nominatim = %providers.nominatim_url,
        osrm = %providers.osrm_url
    );

    Ok(Collaborators { llm, weather, route, geocoder, encyclopedia, knowledge, retriever })
}
