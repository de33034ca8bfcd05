use std::collections::{HashMap, HashSet};

use async_trait::async_trait;

use super::RankingStrategy;
use crate::domain::config::{AlgorithmKind, RecommendationConfig};
use crate::domain::product::{CategoryId, ProductId};
use crate::ranking::store::{SignalStore, StoreError};
use crate::ranking::types::{Candidate, RequestContext};
use crate::ranking::EngineTuning;

/// Item-to-item co-occurrence over the interaction matrix: products
/// favored by the users who interacted with the subject user's products,
/// minus everything the user has already touched.
pub struct CollaborativeStrategy {
    tuning: EngineTuning,
}

impl CollaborativeStrategy {
    pub fn new(tuning: EngineTuning) -> Self {
        Self { tuning }
    }

    /// Share of the user's interaction history falling in each category,
    /// the raw value of the category-affinity dimension.
    async fn category_shares(
        &self,
        store: &dyn SignalStore,
        product_ids: &[ProductId],
    ) -> Result<HashMap<CategoryId, f64>, StoreError> {
        let mut counts: HashMap<CategoryId, f64> = HashMap::new();
        let mut total = 0.0;

        for product_id in product_ids.iter().take(self.tuning.candidate_pool) {
            if let Some(profile) = store.profile(product_id).await? {
                if let Some(category) = profile.category_id {
                    *counts.entry(category).or_insert(0.0) += 1.0;
                    total += 1.0;
                }
            }
        }

        if total > 0.0 {
            for share in counts.values_mut() {
                *share /= total;
            }
        }
        Ok(counts)
    }
}

#[async_trait]
impl RankingStrategy for CollaborativeStrategy {
    fn kind(&self) -> AlgorithmKind {
        AlgorithmKind::Collaborative
    }

    async fn candidates(
        &self,
        store: &dyn SignalStore,
        request: &RequestContext,
        _config: &RecommendationConfig,
    ) -> Result<Vec<Candidate>, StoreError> {
        let user_id = match &request.user_id {
            Some(user_id) => user_id,
            None => return Ok(Vec::new()),
        };

        let history = store.interactions_for_user(user_id).await?;
        if history.is_empty() {
            return Ok(Vec::new());
        }

        let seen: HashSet<&ProductId> =
            history.iter().map(|interaction| &interaction.product_id).collect();
        let history_ids: Vec<ProductId> =
            history.iter().map(|interaction| interaction.product_id.clone()).collect();

        let shares = self.category_shares(store, &history_ids).await?;
        let co_activity = store
            .co_interaction_counts(&history_ids, Some(user_id), self.tuning.candidate_pool)
            .await?;

        let mut candidates = Vec::new();
        for activity in co_activity {
            if seen.contains(&activity.product_id) {
                continue;
            }
            let profile = match store.profile(&activity.product_id).await? {
                Some(profile) if profile.active => profile,
                _ => continue,
            };

            // Co-occurrence count carries the ranking; a high peer
            // rating nudges it up.
            let rating_boost = activity.avg_rating.map_or(1.0, |rating| 1.0 + rating / 10.0);
            let raw_score = activity.interaction_count as f64 * rating_boost;

            let mut candidate = Candidate::from_profile(&profile, raw_score);
            candidate.signals.category_affinity = profile
                .category_id
                .as_ref()
                .and_then(|category| shares.get(category).copied())
                .unwrap_or(0.0);
            candidate.last_activity = activity.last_interaction;
            candidates.push(candidate);
        }

        Ok(candidates)
    }
}
