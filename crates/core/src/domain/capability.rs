use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A category of evidence a provider can supply.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Tourism,
    Legal,
    Weather,
    Route,
}

impl Capability {
    pub const ALL: [Capability; 4] =
        [Capability::Tourism, Capability::Legal, Capability::Weather, Capability::Route];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Tourism => "tourism",
            Self::Legal => "legal",
            Self::Weather => "weather",
            Self::Route => "route",
        }
    }

    /// Whether answering needs a known destination (country or city).
    pub fn needs_destination(self) -> bool {
        !matches!(self, Self::Route)
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("unknown capability `{0}`")]
pub struct UnknownCapability(pub String);

impl FromStr for Capability {
    type Err = UnknownCapability;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "tourism" => Ok(Self::Tourism),
            "legal" => Ok(Self::Legal),
            "weather" => Ok(Self::Weather),
            "route" => Ok(Self::Route),
            other => Err(UnknownCapability(other.to_owned())),
        }
    }
}

/// Ordered, duplicate-free set of requested capabilities.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CapabilitySet(BTreeSet<Capability>);

impl CapabilitySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn only(capability: Capability) -> Self {
        Self::from_iter([capability])
    }

    pub fn insert(&mut self, capability: Capability) -> bool {
        self.0.insert(capability)
    }

    pub fn contains(&self, capability: Capability) -> bool {
        self.0.contains(&capability)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = Capability> + '_ {
        self.0.iter().copied()
    }

    /// Lenient parse of model output: unknown labels are dropped.
    pub fn from_labels<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        labels.into_iter().filter_map(|label| label.as_ref().parse().ok()).collect()
    }
}

impl FromIterator<Capability> for CapabilitySet {
    fn from_iter<T: IntoIterator<Item = Capability>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl fmt::Display for CapabilitySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let labels: Vec<&str> = self.iter().map(Capability::as_str).collect();
        f.write_str(&labels.join(","))
    }
}
