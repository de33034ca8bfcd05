use std::collections::HashMap;

use async_trait::async_trait;

use super::{normalize_raw_scores, CollaborativeStrategy, ContentBasedStrategy, RankingStrategy};
use crate::domain::config::{AlgorithmKind, RecommendationConfig};
use crate::domain::product::ProductId;
use crate::ranking::store::{SignalStore, StoreError};
use crate::ranking::types::{Candidate, RequestContext};
use crate::ranking::EngineTuning;

/// Weighted union of the content-based and collaborative candidate
/// sets. Raw scores are normalized per branch before merging so the two
/// scales can be blended with the config's branch weights.
pub struct HybridStrategy {
    content: ContentBasedStrategy,
    collaborative: CollaborativeStrategy,
}

impl HybridStrategy {
    pub fn new(tuning: EngineTuning) -> Self {
        Self {
            content: ContentBasedStrategy::new(tuning),
            collaborative: CollaborativeStrategy::new(tuning),
        }
    }
}

fn merge_into(
    merged: &mut HashMap<ProductId, Candidate>,
    branch: Vec<Candidate>,
    branch_weight: f64,
) {
    use std::collections::hash_map::Entry;

    for candidate in branch {
        let weighted = candidate.raw_score * branch_weight;
        match merged.entry(candidate.product_id.clone()) {
            Entry::Occupied(mut slot) => {
                let existing = slot.get_mut();
                existing.raw_score += weighted;
                existing.signals.category_affinity = existing
                    .signals
                    .category_affinity
                    .max(candidate.signals.category_affinity);
                existing.signals.popularity =
                    existing.signals.popularity.max(candidate.signals.popularity);
                existing.last_activity = match (existing.last_activity, candidate.last_activity) {
                    (Some(a), Some(b)) => Some(a.max(b)),
                    (a, b) => a.or(b),
                };
            }
            Entry::Vacant(slot) => {
                let mut fresh = candidate;
                fresh.raw_score = weighted;
                slot.insert(fresh);
            }
        }
    }
}

#[async_trait]
impl RankingStrategy for HybridStrategy {
    fn kind(&self) -> AlgorithmKind {
        AlgorithmKind::Hybrid
    }

    async fn candidates(
        &self,
        store: &dyn SignalStore,
        request: &RequestContext,
        config: &RecommendationConfig,
    ) -> Result<Vec<Candidate>, StoreError> {
        let mut content = self.content.candidates(store, request, config).await?;
        let mut collaborative = self.collaborative.candidates(store, request, config).await?;

        normalize_raw_scores(&mut content);
        normalize_raw_scores(&mut collaborative);

        let mut merged = HashMap::new();
        merge_into(&mut merged, content, config.hybrid.content);
        merge_into(&mut merged, collaborative, config.hybrid.collaborative);

        Ok(merged.into_values().collect())
    }
}
