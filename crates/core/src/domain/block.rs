use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::config::ConfigId;
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockId(pub String);

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A named recommendation slot ("related products", "trending now")
/// composed from one or more configs and truncated to `max_products`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecommendationBlock {
    pub id: BlockId,
    pub name: String,
    /// Display title shown by the serving layer.
    pub title: Option<String>,
    /// Config ids in display order; priority still decides execution order.
    pub config_ids: Vec<ConfigId>,
    pub max_products: usize,
    /// Block-level cache duration. Zero defers to the contributing
    /// configs' own TTLs.
    pub cache_duration_secs: u32,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RecommendationBlock {
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.name.trim().is_empty() {
            return Err(DomainError::InvalidBlock {
                block: self.id.to_string(),
                reason: "name must not be blank".to_string(),
            });
        }
        if self.max_products == 0 {
            return Err(DomainError::InvalidBlock {
                block: self.name.clone(),
                reason: "max products must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}
