use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::product::{CategoryId, ProductId};
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConfigId(pub String);

impl fmt::Display for ConfigId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The seven ranking strategies a config can select.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlgorithmKind {
    ContentBased,
    Collaborative,
    Hybrid,
    Popularity,
    Trending,
    CrossSell,
    UpSell,
}

impl AlgorithmKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlgorithmKind::ContentBased => "content_based",
            AlgorithmKind::Collaborative => "collaborative",
            AlgorithmKind::Hybrid => "hybrid",
            AlgorithmKind::Popularity => "popularity",
            AlgorithmKind::Trending => "trending",
            AlgorithmKind::CrossSell => "cross_sell",
            AlgorithmKind::UpSell => "up_sell",
        }
    }

    /// Stored algorithm names are free-form text; anything unrecognized
    /// falls back to content-based ranking.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "collaborative" => AlgorithmKind::Collaborative,
            "hybrid" => AlgorithmKind::Hybrid,
            "popularity" => AlgorithmKind::Popularity,
            "trending" => AlgorithmKind::Trending,
            "cross_sell" | "cross-sell" => AlgorithmKind::CrossSell,
            "up_sell" | "up-sell" | "upsell" => AlgorithmKind::UpSell,
            _ => AlgorithmKind::ContentBased,
        }
    }
}

impl fmt::Display for AlgorithmKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Weight vector blending the six scoring dimensions.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SignalWeights {
    pub price: f64,
    pub rating: f64,
    pub popularity: f64,
    pub recency: f64,
    pub category: f64,
    pub custom: f64,
}

impl SignalWeights {
    pub fn sum(&self) -> f64 {
        self.price + self.rating + self.popularity + self.recency + self.category + self.custom
    }

    fn components(&self) -> [(&'static str, f64); 6] {
        [
            ("price", self.price),
            ("rating", self.rating),
            ("popularity", self.popularity),
            ("recency", self.recency),
            ("category", self.category),
            ("custom", self.custom),
        ]
    }
}

impl Default for SignalWeights {
    fn default() -> Self {
        Self { price: 0.10, rating: 0.25, popularity: 0.25, recency: 0.20, category: 0.15, custom: 0.05 }
    }
}

/// Branch weights for the hybrid strategy's weighted union.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct HybridBlend {
    pub content: f64,
    pub collaborative: f64,
}

impl Default for HybridBlend {
    fn default() -> Self {
        Self { content: 0.5, collaborative: 0.5 }
    }
}

/// Typed candidate filters applied before scoring.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigFilters {
    pub include_categories: Vec<CategoryId>,
    pub exclude_products: Vec<ProductId>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
}

impl ConfigFilters {
    pub fn is_empty(&self) -> bool {
        self.include_categories.is_empty()
            && self.exclude_products.is_empty()
            && self.min_price.is_none()
            && self.max_price.is_none()
    }
}

/// A named algorithm + weighting + caching policy. Edited only between
/// recomputations; the serving path treats it as immutable.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecommendationConfig {
    pub id: ConfigId,
    pub name: String,
    pub algorithm: AlgorithmKind,
    pub weights: SignalWeights,
    /// Per-day multiplicative discount applied to recency signals.
    pub decay_factor: f64,
    pub min_score: f64,
    pub max_results: usize,
    pub cache_ttl_secs: u32,
    pub enable_caching: bool,
    pub enable_analytics: bool,
    pub priority: i32,
    pub active: bool,
    pub hybrid: HybridBlend,
    pub filters: ConfigFilters,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RecommendationConfig {
    /// Baseline config used when a block must degrade to popularity
    /// ranking and nothing is configured.
    pub fn popularity_fallback(now: DateTime<Utc>) -> Self {
        Self {
            id: ConfigId("cfg-popularity-fallback".to_string()),
            name: "popularity-fallback".to_string(),
            algorithm: AlgorithmKind::Popularity,
            weights: SignalWeights {
                price: 0.0,
                rating: 0.2,
                popularity: 0.6,
                recency: 0.2,
                category: 0.0,
                custom: 0.0,
            },
            decay_factor: 0.9,
            min_score: 0.0,
            max_results: 10,
            cache_ttl_secs: 300,
            enable_caching: true,
            enable_analytics: false,
            priority: 0,
            active: true,
            hybrid: HybridBlend::default(),
            filters: ConfigFilters::default(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        let invalid = |reason: String| DomainError::InvalidConfig {
            config: self.name.clone(),
            reason,
        };

        for (name, weight) in self.weights.components() {
            if !weight.is_finite() || weight < 0.0 {
                return Err(invalid(format!("weight `{name}` must be finite and non-negative")));
            }
        }
        if self.weights.sum() <= 0.0 {
            return Err(invalid("at least one weight must be positive".to_string()));
        }
        if !(self.decay_factor > 0.0 && self.decay_factor <= 1.0) {
            return Err(invalid("decay factor must be in (0, 1]".to_string()));
        }
        if !(0.0..=1.0).contains(&self.min_score) {
            return Err(invalid("min score must be in [0, 1]".to_string()));
        }
        if self.max_results == 0 {
            return Err(invalid("max results must be at least 1".to_string()));
        }
        if self.hybrid.content < 0.0 || self.hybrid.collaborative < 0.0 {
            return Err(invalid("hybrid blend weights must be non-negative".to_string()));
        }
        if let (Some(min), Some(max)) = (self.filters.min_price, self.filters.max_price) {
            if min > max {
                return Err(invalid("price filter bounds are inverted".to_string()));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::{AlgorithmKind, RecommendationConfig};
    use crate::errors::DomainError;

    #[test]
    fn unknown_algorithm_name_defaults_to_content_based() {
        assert_eq!(AlgorithmKind::parse("coulomb_matrix"), AlgorithmKind::ContentBased);
        assert_eq!(AlgorithmKind::parse("Cross-Sell"), AlgorithmKind::CrossSell);
        assert_eq!(AlgorithmKind::parse(" trending "), AlgorithmKind::Trending);
    }

    #[test]
    fn algorithm_name_round_trips() {
        for kind in [
            AlgorithmKind::ContentBased,
            AlgorithmKind::Collaborative,
            AlgorithmKind::Hybrid,
            AlgorithmKind::Popularity,
            AlgorithmKind::Trending,
            AlgorithmKind::CrossSell,
            AlgorithmKind::UpSell,
        ] {
            assert_eq!(AlgorithmKind::parse(kind.as_str()), kind);
        }
    }

    #[test]
    fn fallback_config_passes_validation() {
        assert_eq!(RecommendationConfig::popularity_fallback(Utc::now()).validate(), Ok(()));
    }

    #[test]
    fn validation_rejects_zero_decay() {
        let mut config = RecommendationConfig::popularity_fallback(Utc::now());
        config.decay_factor = 0.0;
        assert!(matches!(config.validate(), Err(DomainError::InvalidConfig { .. })));
    }

    #[test]
    fn validation_rejects_all_zero_weights() {
        let mut config = RecommendationConfig::popularity_fallback(Utc::now());
        config.weights.rating = 0.0;
        config.weights.popularity = 0.0;
        config.weights.recency = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validation_rejects_inverted_price_bounds() {
        let mut config = RecommendationConfig::popularity_fallback(Utc::now());
        config.filters.min_price = Some(100.0);
        config.filters.max_price = Some(10.0);
        assert!(config.validate().is_err());
    }
}
