use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::behavior::UserId;
use crate::domain::config::{AlgorithmKind, ConfigId};
use crate::domain::product::{CategoryId, ProductId, ProductProfile};

/// Everything a recommendation request carries. All ambient values —
/// subject, locale, the clock — are explicit here so computation stays
/// deterministic and testable.
#[derive(Clone, Debug)]
pub struct RequestContext {
    pub user_id: Option<UserId>,
    pub product_id: Option<ProductId>,
    pub context_type: Option<String>,
    pub context_data: BTreeMap<String, serde_json::Value>,
    pub locale: Option<String>,
    pub now: DateTime<Utc>,
}

impl RequestContext {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            user_id: None,
            product_id: None,
            context_type: None,
            context_data: BTreeMap::new(),
            locale: None,
            now,
        }
    }

    pub fn with_user(mut self, user_id: UserId) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn with_product(mut self, product_id: ProductId) -> Self {
        self.product_id = Some(product_id);
        self
    }

    pub fn with_context_type(mut self, context_type: impl Into<String>) -> Self {
        self.context_type = Some(context_type.into());
        self
    }

    pub fn with_context_value(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.context_data.insert(key.into(), value);
        self
    }

    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = Some(locale.into());
        self
    }
}

/// Raw values for the scoring dimensions, before per-request
/// normalization. Recency is carried separately as `last_activity` on
/// the candidate because the decay transform needs the request clock.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SignalValues {
    pub price: f64,
    pub rating: f64,
    pub popularity: f64,
    /// Affinity between the candidate and the request subject, as the
    /// producing strategy measures it (content similarity, co-purchase
    /// strength, share of the user's category history).
    pub category_affinity: f64,
    pub custom: f64,
}

/// A product considered for recommendation before scoring.
#[derive(Clone, Debug, PartialEq)]
pub struct Candidate {
    pub product_id: ProductId,
    pub category: Option<CategoryId>,
    /// Algorithm-native score; orders hybrid merging and survives into
    /// the ranked output for display.
    pub raw_score: f64,
    pub signals: SignalValues,
    /// Latest activity relevant to this candidate, input to the decayed
    /// recency dimension.
    pub last_activity: Option<DateTime<Utc>>,
}

impl Candidate {
    /// Seed a candidate from a feature-store profile.
    pub fn from_profile(profile: &ProductProfile, raw_score: f64) -> Self {
        Self {
            product_id: profile.product_id.clone(),
            category: profile.category_id.clone(),
            raw_score,
            signals: SignalValues {
                price: profile.price,
                rating: profile.rating,
                popularity: profile.popularity,
                category_affinity: 0.0,
                custom: profile.custom_signal(),
            },
            last_activity: None,
        }
    }
}

/// Normalized per-dimension contributions behind a composite score.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SignalBreakdown {
    pub price: f64,
    pub rating: f64,
    pub popularity: f64,
    pub recency: f64,
    pub category_affinity: f64,
    pub custom: f64,
}

/// One entry of a served recommendation list.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RankedProduct {
    pub product_id: ProductId,
    pub score: f64,
    pub algorithm: AlgorithmKind,
    pub config_id: ConfigId,
    pub raw_score: f64,
    pub signals: SignalBreakdown,
}
