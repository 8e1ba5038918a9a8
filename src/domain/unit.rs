// Monitored production unit identity
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque, session-stable identifier of a production unit (line or work-center).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnitId(String);

impl UnitId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UnitId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Result of the unit lookup. An empty lookup is a state of its own, not an empty table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "units", rename_all = "snake_case")]
pub enum UnitListing {
    NoUnits,
    Units(Vec<UnitId>),
}

impl UnitListing {
    pub fn from_ids(ids: Vec<UnitId>) -> Self {
        if ids.is_empty() {
            Self::NoUnits
        } else {
            Self::Units(ids)
        }
    }

    pub fn contains(&self, unit: &UnitId) -> bool {
        match self {
            Self::NoUnits => false,
            Self::Units(ids) => ids.contains(unit),
        }
    }
}
