use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::config::AlgorithmKind;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProductId(pub String);

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CategoryId(pub String);

impl fmt::Display for CategoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Custom numeric feature attached to a product by the catalog.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProductFeature {
    pub key: String,
    pub value: f64,
    pub weight: f64,
}

/// Per-product view served by the feature store: the scalar signals the
/// scoring engine blends plus the custom feature vector used for
/// content similarity.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProductProfile {
    pub product_id: ProductId,
    pub category_id: Option<CategoryId>,
    pub price: f64,
    /// Average review rating on a 0-5 scale.
    pub rating: f64,
    /// Aggregate interaction count maintained by catalog jobs.
    pub popularity: f64,
    pub active: bool,
    pub features: Vec<ProductFeature>,
}

impl ProductProfile {
    /// Weighted sum of the custom feature vector, the raw value of the
    /// `custom` scoring dimension.
    pub fn custom_signal(&self) -> f64 {
        self.features.iter().map(|feature| feature.value * feature.weight).sum()
    }
}

/// Precomputed similarity pair, refreshed by offline jobs and read-only
/// at request time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProductSimilarity {
    pub product_id: ProductId,
    pub similar_product_id: ProductId,
    pub algorithm: AlgorithmKind,
    pub similarity_score: f64,
    pub calculation_data: Option<serde_json::Value>,
    pub calculated_at: DateTime<Utc>,
}

/// Weighted cosine similarity between two custom feature vectors. The
/// subject side's weights apply; features missing on either side
/// contribute nothing. Returns 0.0 when either vector has no magnitude.
pub fn weighted_cosine(subject: &[ProductFeature], candidate: &[ProductFeature]) -> f64 {
    use std::collections::HashMap;

    let weights: HashMap<&str, f64> =
        subject.iter().map(|feature| (feature.key.as_str(), feature.weight.max(0.0))).collect();
    let subject_values: HashMap<&str, f64> =
        subject.iter().map(|feature| (feature.key.as_str(), feature.value)).collect();
    let candidate_values: HashMap<&str, f64> =
        candidate.iter().map(|feature| (feature.key.as_str(), feature.value)).collect();

    let mut dot = 0.0;
    let mut subject_norm = 0.0;
    let mut candidate_norm = 0.0;

    for (key, weight) in &weights {
        let a = subject_values.get(key).copied().unwrap_or(0.0);
        let b = candidate_values.get(key).copied().unwrap_or(0.0);
        dot += weight * a * b;
        subject_norm += weight * a * a;
        candidate_norm += weight * b * b;
    }

    if subject_norm <= f64::EPSILON || candidate_norm <= f64::EPSILON {
        return 0.0;
    }

    dot / (subject_norm.sqrt() * candidate_norm.sqrt())
}
