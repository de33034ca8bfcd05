use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{Duration, NaiveTime};

use super::RankingStrategy;
use crate::domain::config::{AlgorithmKind, RecommendationConfig};
use crate::domain::product::ProductId;
use crate::ranking::store::{SignalStore, StoreError};
use crate::ranking::types::{Candidate, RequestContext};
use crate::ranking::EngineTuning;

/// Ranks by all-time interaction volume.
pub struct PopularityStrategy {
    tuning: EngineTuning,
}

impl PopularityStrategy {
    pub fn new(tuning: EngineTuning) -> Self {
        Self { tuning }
    }
}

#[async_trait]
impl RankingStrategy for PopularityStrategy {
    fn kind(&self) -> AlgorithmKind {
        AlgorithmKind::Popularity
    }

    async fn candidates(
        &self,
        store: &dyn SignalStore,
        _request: &RequestContext,
        _config: &RecommendationConfig,
    ) -> Result<Vec<Candidate>, StoreError> {
        let totals = store.interaction_totals(self.tuning.candidate_pool).await?;

        let mut candidates = Vec::with_capacity(totals.len());
        for activity in totals {
            let profile = match store.profile(&activity.product_id).await? {
                Some(profile) if profile.active => profile,
                _ => continue,
            };

            let count = activity.interaction_count as f64;
            let mut candidate = Candidate::from_profile(&profile, count);
            candidate.signals.popularity = candidate.signals.popularity.max(count);
            candidate.last_activity = activity.last_interaction;
            candidates.push(candidate);
        }

        Ok(candidates)
    }
}

/// Ranks by windowed interaction volume with per-day decay, so recent
/// activity dominates long-standing volume.
pub struct TrendingStrategy {
    tuning: EngineTuning,
}

impl TrendingStrategy {
    pub fn new(tuning: EngineTuning) -> Self {
        Self { tuning }
    }
}

#[async_trait]
impl RankingStrategy for TrendingStrategy {
    fn kind(&self) -> AlgorithmKind {
        AlgorithmKind::Trending
    }

    async fn candidates(
        &self,
        store: &dyn SignalStore,
        request: &RequestContext,
        config: &RecommendationConfig,
    ) -> Result<Vec<Candidate>, StoreError> {
        let today = request.now.date_naive();
        let since = today - Duration::days(self.tuning.trending_window_days as i64);
        let daily = store.daily_activity_since(since, self.tuning.candidate_pool * 8).await?;

        struct Momentum {
            score: f64,
            latest: chrono::NaiveDate,
        }

        let mut momentum: HashMap<ProductId, Momentum> = HashMap::new();
        for activity in daily {
            let age_days = (today - activity.day).num_days().max(0);
            let weighted = activity.count as f64 * config.decay_factor.powi(age_days as i32);

            momentum
                .entry(activity.product_id)
                .and_modify(|entry| {
                    entry.score += weighted;
                    entry.latest = entry.latest.max(activity.day);
                })
                .or_insert(Momentum { score: weighted, latest: activity.day });
        }

        let mut candidates = Vec::with_capacity(momentum.len());
        for (product_id, entry) in momentum {
            let profile = match store.profile(&product_id).await? {
                Some(profile) if profile.active => profile,
                _ => continue,
            };

            let mut candidate = Candidate::from_profile(&profile, entry.score);
            candidate.last_activity = Some(entry.latest.and_time(NaiveTime::MIN).and_utc());
            candidates.push(candidate);
        }

        Ok(candidates)
    }
}
