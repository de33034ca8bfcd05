use async_trait::async_trait;

use super::RankingStrategy;
use crate::domain::config::{AlgorithmKind, RecommendationConfig};
use crate::domain::product::weighted_cosine;
use crate::ranking::store::{SignalStore, StoreError};
use crate::ranking::types::{Candidate, RequestContext};
use crate::ranking::EngineTuning;

/// Ranks products co-purchased with the subject product.
pub struct CrossSellStrategy {
    tuning: EngineTuning,
}

impl CrossSellStrategy {
    pub fn new(tuning: EngineTuning) -> Self {
        Self { tuning }
    }
}

#[async_trait]
impl RankingStrategy for CrossSellStrategy {
    fn kind(&self) -> AlgorithmKind {
        AlgorithmKind::CrossSell
    }

    async fn candidates(
        &self,
        store: &dyn SignalStore,
        request: &RequestContext,
        _config: &RecommendationConfig,
    ) -> Result<Vec<Candidate>, StoreError> {
        let subject_id = match &request.product_id {
            Some(product_id) => product_id,
            None => return Ok(Vec::new()),
        };
        let subject_category =
            store.profile(subject_id).await?.and_then(|profile| profile.category_id);

        let pairs = store.co_purchased_with(subject_id, self.tuning.candidate_pool).await?;

        let mut candidates = Vec::with_capacity(pairs.len());
        for pair in pairs {
            if pair.product_id == *subject_id {
                continue;
            }
            let profile = match store.profile(&pair.product_id).await? {
                Some(profile) if profile.active => profile,
                _ => continue,
            };

            let mut candidate = Candidate::from_profile(&profile, pair.co_count as f64);
            candidate.signals.category_affinity =
                match (&subject_category, &profile.category_id) {
                    (Some(lhs), Some(rhs)) if lhs == rhs => 1.0,
                    _ => 0.0,
                };
            candidate.last_activity = pair.last_purchased;
            candidates.push(candidate);
        }

        Ok(candidates)
    }
}

/// Ranks same-category products priced above the subject, closest in
/// feature space first.
pub struct UpSellStrategy {
    tuning: EngineTuning,
}

impl UpSellStrategy {
    pub fn new(tuning: EngineTuning) -> Self {
        Self { tuning }
    }
}

#[async_trait]
impl RankingStrategy for UpSellStrategy {
    fn kind(&self) -> AlgorithmKind {
        AlgorithmKind::UpSell
    }

    async fn candidates(
        &self,
        store: &dyn SignalStore,
        request: &RequestContext,
        _config: &RecommendationConfig,
    ) -> Result<Vec<Candidate>, StoreError> {
        let subject_id = match &request.product_id {
            Some(product_id) => product_id,
            None => return Ok(Vec::new()),
        };
        let subject = match store.profile(subject_id).await? {
            Some(profile) => profile,
            None => return Ok(Vec::new()),
        };
        let category = match &subject.category_id {
            Some(category) => category,
            None => return Ok(Vec::new()),
        };

        let pool = store.category_profiles(category, self.tuning.candidate_pool).await?;

        let mut candidates = Vec::new();
        for profile in pool {
            if profile.product_id == *subject_id || !profile.active {
                continue;
            }
            // Only higher-tier products qualify as an up-sell.
            if profile.price <= subject.price {
                continue;
            }

            let similarity = weighted_cosine(&subject.features, &profile.features);
            let mut candidate = Candidate::from_profile(&profile, similarity);
            candidate.signals.category_affinity = similarity;
            candidates.push(candidate);
        }

        Ok(candidates)
    }
}
