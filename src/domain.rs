use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::GiCatError;

/// Title used for resources whose listing carries no `title` element.
pub const UNTITLED_RESOURCE: &str = "n/a";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProfileId(String);

impl ProfileId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProfileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ProfileId {
    type Err = GiCatError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim();
        if normalized.is_empty() {
            return Err(GiCatError::Discovery("empty profile id".to_string()));
        }
        Ok(Self(normalized.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: ProfileId,
    pub name: String,
}

/// A harvestable unit (a "harvester") discovered under a profile's distributor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resource {
    pub id: String,
    pub title: String,
}

impl Resource {
    pub fn new(id: impl Into<String>, title: Option<String>) -> Self {
        let title = title
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| UNTITLED_RESOURCE.to_string());
        Self {
            id: id.into(),
            title,
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.title, self.id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HarvestStatus {
    Pending,
    Completed,
    Error,
}

impl fmt::Display for HarvestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HarvestStatus::Pending => write!(f, "pending"),
            HarvestStatus::Completed => write!(f, "completed"),
            HarvestStatus::Error => write!(f, "error"),
        }
    }
}
