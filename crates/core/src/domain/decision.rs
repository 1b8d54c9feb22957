use serde::{Deserialize, Serialize};

use crate::domain::capability::{Capability, CapabilitySet};

/// Structured reading of one user message.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingDecision {
    pub country: Option<String>,
    pub city: Option<String>,
    pub dates: Option<String>,
    pub start_location: Option<String>,
    pub end_location: Option<String>,
    pub capabilities: CapabilitySet,
    pub user_question: String,
}

impl RoutingDecision {
    pub fn wants(&self, capability: Capability) -> bool {
        self.capabilities.contains(capability)
    }

    /// "city, country" with missing parts skipped.
    pub fn destination(&self) -> Option<String> {
        join_place(self.city.as_deref(), self.country.as_deref())
    }

    pub fn has_destination(&self) -> bool {
        self.country.is_some() || self.city.is_some()
    }

    pub fn has_endpoints(&self) -> bool {
        self.start_location.is_some() || self.end_location.is_some()
    }

    /// Collapses whitespace-only slots to `None` so "present" means non-empty.
    pub fn normalized(mut self) -> Self {
        self.country = non_empty(self.country);
        self.city = non_empty(self.city);
        self.dates = non_empty(self.dates);
        self.start_location = non_empty(self.start_location);
        self.end_location = non_empty(self.end_location);
        self.user_question = self.user_question.trim().to_owned();
        self
    }
}

pub fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_owned()).filter(|v| !v.is_empty())
}

pub fn join_place(city: Option<&str>, country: Option<&str>) -> Option<String> {
    let parts: Vec<&str> =
        [city, country].into_iter().flatten().map(str::trim).filter(|p| !p.is_empty()).collect();
    (!parts.is_empty()).then(|| parts.join(", "))
}
