use async_trait::async_trait;

use super::RankingStrategy;
use crate::domain::config::{AlgorithmKind, RecommendationConfig};
use crate::domain::product::weighted_cosine;
use crate::ranking::store::{SignalStore, StoreError};
use crate::ranking::types::{Candidate, RequestContext};
use crate::ranking::EngineTuning;

/// Ranks products by feature similarity to the subject product.
///
/// Precomputed similarity pairs are preferred; when none exist the
/// strategy falls back to weighted cosine over the custom feature
/// vectors of the subject's category pool.
pub struct ContentBasedStrategy {
    tuning: EngineTuning,
}

impl ContentBasedStrategy {
    pub fn new(tuning: EngineTuning) -> Self {
        Self { tuning }
    }

    async fn from_precomputed(
        &self,
        store: &dyn SignalStore,
        request: &RequestContext,
    ) -> Result<Vec<Candidate>, StoreError> {
        let subject = match &request.product_id {
            Some(product_id) => product_id,
            None => return Ok(Vec::new()),
        };

        let similarities = store
            .similarities_for(subject, AlgorithmKind::ContentBased, self.tuning.candidate_pool)
            .await?;

        let mut candidates = Vec::with_capacity(similarities.len());
        for similarity in similarities {
            if similarity.similar_product_id == *subject {
                continue;
            }
            let profile = match store.profile(&similarity.similar_product_id).await? {
                Some(profile) if profile.active => profile,
                _ => continue,
            };

            let mut candidate = Candidate::from_profile(&profile, similarity.similarity_score);
            candidate.signals.category_affinity = similarity.similarity_score;
            candidates.push(candidate);
        }

        Ok(candidates)
    }

    async fn from_feature_vectors(
        &self,
        store: &dyn SignalStore,
        request: &RequestContext,
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
            let similarity = weighted_cosine(&subject.features, &profile.features);
            let mut candidate = Candidate::from_profile(&profile, similarity);
            candidate.signals.category_affinity = similarity;
            candidates.push(candidate);
        }

        Ok(candidates)
    }
}

#[async_trait]
impl RankingStrategy for ContentBasedStrategy {
    fn kind(&self) -> AlgorithmKind {
        AlgorithmKind::ContentBased
    }

    async fn candidates(
        &self,
        store: &dyn SignalStore,
        request: &RequestContext,
        _config: &RecommendationConfig,
    ) -> Result<Vec<Candidate>, StoreError> {
        let precomputed = self.from_precomputed(store, request).await?;
        if !precomputed.is_empty() {
            return Ok(precomputed);
        }
        self.from_feature_vectors(store, request).await
    }
}
