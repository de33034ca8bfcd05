//! The seven ranking strategies.
//!
//! Each strategy maps a request subject to raw-scored candidates through
//! the `SignalStore` seam. A strategy with nothing to say returns an
//! empty list; errors surface only for data-source failures.

mod collaborative;
mod content;
mod cross_sell;
mod hybrid;
mod popularity;

pub use collaborative::CollaborativeStrategy;
pub use content::ContentBasedStrategy;
pub use cross_sell::{CrossSellStrategy, UpSellStrategy};
pub use hybrid::HybridStrategy;
pub use popularity::{PopularityStrategy, TrendingStrategy};

use async_trait::async_trait;

use super::store::{SignalStore, StoreError};
use super::types::{Candidate, RequestContext};
use crate::domain::config::{AlgorithmKind, RecommendationConfig};

#[async_trait]
pub trait RankingStrategy: Send + Sync {
    fn kind(&self) -> AlgorithmKind;

    async fn candidates(
        &self,
        store: &dyn SignalStore,
        request: &RequestContext,
        config: &RecommendationConfig,
    ) -> Result<Vec<Candidate>, StoreError>;
}

/// Min-max scale raw scores into [0, 1] in place. Used where candidate
/// sets from different sources must merge on a shared scale.
pub(crate) fn normalize_raw_scores(candidates: &mut [Candidate]) {
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for candidate in candidates.iter() {
        min = min.min(candidate.raw_score);
        max = max.max(candidate.raw_score);
    }

    let width = max - min;
    for candidate in candidates.iter_mut() {
        candidate.raw_score = if width > f64::EPSILON {
            (candidate.raw_score - min) / width
        } else if max > 0.0 {
            1.0
        } else {
            0.0
        };
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use async_trait::async_trait;
    use chrono::{Duration, NaiveDate, TimeZone, Utc};

    use super::*;
    use crate::domain::behavior::{BehaviorKind, UserId, UserProductInteraction};
    use crate::domain::product::{
        CategoryId, ProductFeature, ProductId, ProductProfile, ProductSimilarity,
    };
    use crate::ranking::store::{DailyActivity, ProductActivity, PurchasePair};
    use crate::ranking::types::RequestContext;
    use crate::ranking::EngineTuning;

    #[derive(Default)]
    struct FixtureStore {
        profiles: HashMap<ProductId, ProductProfile>,
        similarities: Vec<ProductSimilarity>,
        interactions: Vec<UserProductInteraction>,
        co_counts: Vec<ProductActivity>,
        totals: Vec<ProductActivity>,
        daily: Vec<DailyActivity>,
        purchases: Vec<PurchasePair>,
    }

    impl FixtureStore {
        fn with_profile(mut self, profile: ProductProfile) -> Self {
            self.profiles.insert(profile.product_id.clone(), profile);
            self
        }
    }

    #[async_trait]
    impl SignalStore for FixtureStore {
        async fn profile(
            &self,
            product_id: &ProductId,
        ) -> Result<Option<ProductProfile>, StoreError> {
            Ok(self.profiles.get(product_id).cloned())
        }

        async fn category_profiles(
            &self,
            category_id: &CategoryId,
            limit: usize,
        ) -> Result<Vec<ProductProfile>, StoreError> {
            Ok(self
                .profiles
                .values()
                .filter(|profile| profile.category_id.as_ref() == Some(category_id))
                .take(limit)
                .cloned()
                .collect())
        }

        async fn similarities_for(
            &self,
            product_id: &ProductId,
            algorithm: AlgorithmKind,
            limit: usize,
        ) -> Result<Vec<ProductSimilarity>, StoreError> {
            Ok(self
                .similarities
                .iter()
                .filter(|sim| sim.product_id == *product_id && sim.algorithm == algorithm)
                .take(limit)
                .cloned()
                .collect())
        }

        async fn interactions_for_user(
            &self,
            user_id: &UserId,
        ) -> Result<Vec<UserProductInteraction>, StoreError> {
            Ok(self
                .interactions
                .iter()
                .filter(|interaction| interaction.user_id == *user_id)
                .cloned()
                .collect())
        }

        async fn co_interaction_counts(
            &self,
            _product_ids: &[ProductId],
            _exclude_user: Option<&UserId>,
            limit: usize,
        ) -> Result<Vec<ProductActivity>, StoreError> {
            Ok(self.co_counts.iter().take(limit).cloned().collect())
        }

        async fn interaction_totals(
            &self,
            limit: usize,
        ) -> Result<Vec<ProductActivity>, StoreError> {
            Ok(self.totals.iter().take(limit).cloned().collect())
        }

        async fn daily_activity_since(
            &self,
            since: NaiveDate,
            limit: usize,
        ) -> Result<Vec<DailyActivity>, StoreError> {
            Ok(self
                .daily
                .iter()
                .filter(|activity| activity.day >= since)
                .take(limit)
                .cloned()
                .collect())
        }

        async fn co_purchased_with(
            &self,
            _product_id: &ProductId,
            limit: usize,
        ) -> Result<Vec<PurchasePair>, StoreError> {
            Ok(self.purchases.iter().take(limit).cloned().collect())
        }
    }

    fn profile(id: &str, category: &str, price: f64) -> ProductProfile {
        ProductProfile {
            product_id: ProductId(id.to_string()),
            category_id: Some(CategoryId(category.to_string())),
            price,
            rating: 4.0,
            popularity: 10.0,
            active: true,
            features: vec![
                ProductFeature { key: "battery".to_string(), value: 0.8, weight: 1.0 },
                ProductFeature { key: "screen".to_string(), value: 0.5, weight: 1.0 },
            ],
        }
    }

    fn config() -> crate::domain::config::RecommendationConfig {
        crate::domain::config::RecommendationConfig::popularity_fallback(Utc::now())
    }

    fn request_for_product(id: &str) -> RequestContext {
        RequestContext::new(Utc.with_ymd_and_hms(2026, 8, 4, 9, 0, 0).unwrap())
            .with_product(ProductId(id.to_string()))
    }

    #[tokio::test]
    async fn content_based_prefers_precomputed_similarities() {
        let mut store = FixtureStore::default()
            .with_profile(profile("subject", "audio", 50.0))
            .with_profile(profile("close", "audio", 55.0))
            .with_profile(profile("far", "audio", 45.0));
        store.similarities.push(ProductSimilarity {
            product_id: ProductId("subject".to_string()),
            similar_product_id: ProductId("close".to_string()),
            algorithm: AlgorithmKind::ContentBased,
            similarity_score: 0.92,
            calculation_data: None,
            calculated_at: Utc::now(),
        });

        let strategy = ContentBasedStrategy::new(EngineTuning::default());
        let candidates = strategy
            .candidates(&store, &request_for_product("subject"), &config())
            .await
            .expect("candidates");

        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].product_id.0, "close");
        assert!((candidates[0].raw_score - 0.92).abs() < 1e-9);
    }

    #[tokio::test]
    async fn content_based_falls_back_to_feature_vectors() {
        let store = FixtureStore::default()
            .with_profile(profile("subject", "audio", 50.0))
            .with_profile(profile("twin", "audio", 52.0));

        let strategy = ContentBasedStrategy::new(EngineTuning::default());
        let candidates = strategy
            .candidates(&store, &request_for_product("subject"), &config())
            .await
            .expect("candidates");

        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].product_id.0, "twin");
        // Identical feature vectors score as fully similar.
        assert!((candidates[0].raw_score - 1.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn content_based_without_subject_is_empty() {
        let store = FixtureStore::default();
        let strategy = ContentBasedStrategy::new(EngineTuning::default());
        let request = RequestContext::new(Utc::now());

        let candidates =
            strategy.candidates(&store, &request, &config()).await.expect("candidates");
        assert!(candidates.is_empty());
    }

    #[tokio::test]
    async fn collaborative_skips_already_seen_products() {
        let now = Utc::now();
        let mut store = FixtureStore::default()
            .with_profile(profile("owned", "audio", 30.0))
            .with_profile(profile("fresh", "audio", 40.0));
        store.interactions.push(UserProductInteraction {
            user_id: UserId("u1".to_string()),
            product_id: ProductId("owned".to_string()),
            interaction_type: BehaviorKind::Purchase,
            rating: None,
            interaction_count: 3,
            first_interaction: now,
            last_interaction: now,
        });
        store.co_counts = vec![
            ProductActivity {
                product_id: ProductId("owned".to_string()),
                interaction_count: 9,
                avg_rating: None,
                last_interaction: Some(now),
            },
            ProductActivity {
                product_id: ProductId("fresh".to_string()),
                interaction_count: 4,
                avg_rating: Some(5.0),
                last_interaction: Some(now),
            },
        ];

        let strategy = CollaborativeStrategy::new(EngineTuning::default());
        let request = RequestContext::new(now).with_user(UserId("u1".to_string()));
        let candidates =
            strategy.candidates(&store, &request, &config()).await.expect("candidates");

        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].product_id.0, "fresh");
        // Full category overlap with the user's history.
        assert!((candidates[0].signals.category_affinity - 1.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn collaborative_without_user_is_empty() {
        let store = FixtureStore::default();
        let strategy = CollaborativeStrategy::new(EngineTuning::default());
        let request = RequestContext::new(Utc::now());

        let candidates =
            strategy.candidates(&store, &request, &config()).await.expect("candidates");
        assert!(candidates.is_empty());
    }

    #[tokio::test]
    async fn popularity_ranks_by_interaction_totals_and_skips_inactive() {
        let now = Utc::now();
        let mut inactive = profile("ghost", "audio", 20.0);
        inactive.active = false;

        let mut store = FixtureStore::default()
            .with_profile(profile("hit", "audio", 25.0))
            .with_profile(inactive);
        store.totals = vec![
            ProductActivity {
                product_id: ProductId("hit".to_string()),
                interaction_count: 120,
                avg_rating: Some(4.5),
                last_interaction: Some(now),
            },
            ProductActivity {
                product_id: ProductId("ghost".to_string()),
                interaction_count: 500,
                avg_rating: None,
                last_interaction: Some(now),
            },
        ];

        let strategy = PopularityStrategy::new(EngineTuning::default());
        let candidates = strategy
            .candidates(&store, &RequestContext::new(now), &config())
            .await
            .expect("candidates");

        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].product_id.0, "hit");
        assert_eq!(candidates[0].signals.popularity, 120.0);
    }

    #[tokio::test]
    async fn trending_favors_recent_bursts_over_old_volume() {
        let now = Utc.with_ymd_and_hms(2026, 8, 4, 9, 0, 0).unwrap();
        let today = now.date_naive();

        let mut store = FixtureStore::default()
            .with_profile(profile("burst", "audio", 30.0))
            .with_profile(profile("steady", "audio", 30.0));
        store.daily = vec![
            DailyActivity { product_id: ProductId("burst".to_string()), day: today, count: 40 },
            DailyActivity {
                product_id: ProductId("steady".to_string()),
                day: today - Duration::days(20),
                count: 60,
            },
        ];

        let mut cfg = config();
        cfg.decay_factor = 0.8;

        let strategy = TrendingStrategy::new(EngineTuning::default());
        let candidates = strategy
            .candidates(&store, &RequestContext::new(now), &cfg)
            .await
            .expect("candidates");

        let burst = candidates.iter().find(|c| c.product_id.0 == "burst").expect("burst");
        let steady = candidates.iter().find(|c| c.product_id.0 == "steady").expect("steady");
        assert!(burst.raw_score > steady.raw_score);
    }

    #[tokio::test]
    async fn cross_sell_ranks_co_purchases() {
        let now = Utc::now();
        let mut store = FixtureStore::default()
            .with_profile(profile("subject", "audio", 50.0))
            .with_profile(profile("cable", "accessories", 9.0));
        store.purchases = vec![PurchasePair {
            product_id: ProductId("cable".to_string()),
            co_count: 18,
            last_purchased: Some(now),
        }];

        let strategy = CrossSellStrategy::new(EngineTuning::default());
        let candidates = strategy
            .candidates(&store, &request_for_product("subject"), &config())
            .await
            .expect("candidates");

        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].product_id.0, "cable");
        assert_eq!(candidates[0].raw_score, 18.0);
        assert_eq!(candidates[0].signals.category_affinity, 0.0);
    }

    #[tokio::test]
    async fn up_sell_only_offers_higher_priced_same_category_products() {
        let store = FixtureStore::default()
            .with_profile(profile("subject", "audio", 50.0))
            .with_profile(profile("premium", "audio", 90.0))
            .with_profile(profile("budget", "audio", 20.0))
            .with_profile(profile("other", "garden", 200.0));

        let strategy = UpSellStrategy::new(EngineTuning::default());
        let candidates = strategy
            .candidates(&store, &request_for_product("subject"), &config())
            .await
            .expect("candidates");

        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].product_id.0, "premium");
    }

    #[tokio::test]
    async fn hybrid_merges_branches_with_blend_weights() {
        let now = Utc::now();
        let mut store = FixtureStore::default()
            .with_profile(profile("subject", "audio", 50.0))
            .with_profile(profile("both", "audio", 60.0))
            .with_profile(profile("content-only", "audio", 40.0));
        store.similarities = vec![
            ProductSimilarity {
                product_id: ProductId("subject".to_string()),
                similar_product_id: ProductId("both".to_string()),
                algorithm: AlgorithmKind::ContentBased,
                similarity_score: 0.9,
                calculation_data: None,
                calculated_at: now,
            },
            ProductSimilarity {
                product_id: ProductId("subject".to_string()),
                similar_product_id: ProductId("content-only".to_string()),
                algorithm: AlgorithmKind::ContentBased,
                similarity_score: 0.3,
                calculation_data: None,
                calculated_at: now,
            },
        ];
        store.interactions.push(UserProductInteraction {
            user_id: UserId("u1".to_string()),
            product_id: ProductId("subject".to_string()),
            interaction_type: BehaviorKind::View,
            rating: None,
            interaction_count: 2,
            first_interaction: now,
            last_interaction: now,
        });
        store.co_counts = vec![ProductActivity {
            product_id: ProductId("both".to_string()),
            interaction_count: 7,
            avg_rating: None,
            last_interaction: Some(now),
        }];

        let strategy = HybridStrategy::new(EngineTuning::default());
        let request = request_for_product("subject").with_user(UserId("u1".to_string()));
        let candidates =
            strategy.candidates(&store, &request, &config()).await.expect("candidates");

        let both = candidates.iter().find(|c| c.product_id.0 == "both").expect("both");
        let content_only =
            candidates.iter().find(|c| c.product_id.0 == "content-only").expect("content-only");

        // "both" collects contributions from the two branches.
        assert!(both.raw_score > content_only.raw_score);
    }
}

