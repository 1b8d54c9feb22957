//! Core types for the wayfarer travel assistant: configuration, error
//! taxonomy, session state, evidence types, the per-turn flow and the
//! small pure helpers (cache, geo) shared by every other crate.

pub mod cache;
pub mod config;
pub mod domain;
pub mod errors;
pub mod flows;
pub mod geo;

pub use cache::ExpiringCache;
pub use domain::capability::{Capability, CapabilitySet};
pub use domain::decision::RoutingDecision;
pub use domain::evidence::{
    Evidence, EvidenceBundle, FoodPlace, LegalResult, RouteResult, RouteStep, TourismPlace,
    TourismResult, WeatherResult,
};
pub use domain::session::{MediaCard, PendingInputKind, Role, SessionState, TurnArtifacts};
pub use errors::{ApplicationError, DomainError, EvidenceError, InterfaceError};
pub use flows::{TurnFlow, TurnPhase};
pub use geo::{Coordinates, GeoPoint, TravelMode};
