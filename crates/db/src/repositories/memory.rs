//! In-memory repository and store implementations.
//!
//! Back the engine's tests and embeddable cache-less deployments where
//! SQLite is not wanted. Semantics mirror the SQL implementations.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::RwLock;

use relevon_core::domain::analytics::{AnalyticsEvent, DailyBlockStats};
use relevon_core::domain::behavior::{
    BehaviorEvent, BehaviorKind, UserId, UserProductInteraction,
};
use relevon_core::domain::block::{BlockId, RecommendationBlock};
use relevon_core::domain::cache::CacheEntry;
use relevon_core::domain::config::{AlgorithmKind, ConfigId, RecommendationConfig};
use relevon_core::domain::product::{
    CategoryId, ProductId, ProductProfile, ProductSimilarity,
};
use relevon_core::ranking::store::{
    DailyActivity, ProductActivity, PurchasePair, SignalStore, StoreError,
};

use super::{
    AnalyticsRepository, BehaviorRepository, CacheRepository, ConfigRepository, RepositoryError,
};

#[derive(Default)]
pub struct InMemoryConfigRepository {
    blocks: RwLock<HashMap<String, RecommendationBlock>>,
    configs: RwLock<HashMap<String, RecommendationConfig>>,
    attachments: RwLock<Vec<(BlockId, ConfigId, u32)>>,
}

impl InMemoryConfigRepository {
    async fn config_ids_for(&self, block_id: &BlockId) -> Vec<ConfigId> {
        let mut attached: Vec<(u32, ConfigId)> = self
            .attachments
            .read()
            .await
            .iter()
            .filter(|(attached_block, _, _)| attached_block == block_id)
            .map(|(_, config_id, position)| (*position, config_id.clone()))
            .collect();
        attached.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1 .0.cmp(&b.1 .0)));
        attached.into_iter().map(|(_, config_id)| config_id).collect()
    }
}

#[async_trait::async_trait]
impl ConfigRepository for InMemoryConfigRepository {
    async fn find_block(
        &self,
        name: &str,
    ) -> Result<Option<RecommendationBlock>, RepositoryError> {
        let block = {
            let blocks = self.blocks.read().await;
            blocks.values().find(|block| block.name == name).cloned()
        };
        match block {
            Some(mut block) => {
                block.config_ids = self.config_ids_for(&block.id).await;
                Ok(Some(block))
            }
            None => Ok(None),
        }
    }

    async fn find_block_by_id(
        &self,
        id: &BlockId,
    ) -> Result<Option<RecommendationBlock>, RepositoryError> {
        let block = {
            let blocks = self.blocks.read().await;
            blocks.get(&id.0).cloned()
        };
        match block {
            Some(mut block) => {
                block.config_ids = self.config_ids_for(&block.id).await;
                Ok(Some(block))
            }
            None => Ok(None),
        }
    }

    async fn active_configs_for_block(
        &self,
        block_id: &BlockId,
    ) -> Result<Vec<RecommendationConfig>, RepositoryError> {
        let ordered_ids = self.config_ids_for(block_id).await;
        let configs = self.configs.read().await;

        let mut active: Vec<(usize, RecommendationConfig)> = ordered_ids
            .iter()
            .enumerate()
            .filter_map(|(position, config_id)| {
                configs
                    .get(&config_id.0)
                    .filter(|config| config.active)
                    .map(|config| (position, config.clone()))
            })
            .collect();

        active.sort_by(|a, b| {
            b.1.priority
                .cmp(&a.1.priority)
                .then_with(|| a.0.cmp(&b.0))
                .then_with(|| a.1.id.0.cmp(&b.1.id.0))
        });
        Ok(active.into_iter().map(|(_, config)| config).collect())
    }

    async fn save_block(&self, block: RecommendationBlock) -> Result<(), RepositoryError> {
        self.blocks.write().await.insert(block.id.0.clone(), block);
        Ok(())
    }

    async fn save_config(&self, config: RecommendationConfig) -> Result<(), RepositoryError> {
        self.configs.write().await.insert(config.id.0.clone(), config);
        Ok(())
    }

    async fn attach_config(
        &self,
        block_id: &BlockId,
        config_id: &ConfigId,
        position: u32,
    ) -> Result<(), RepositoryError> {
        let mut attachments = self.attachments.write().await;
        attachments.retain(|(attached_block, attached_config, _)| {
            !(attached_block == block_id && attached_config == config_id)
        });
        attachments.push((block_id.clone(), config_id.clone(), position));
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryCacheRepository {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

#[async_trait::async_trait]
impl CacheRepository for InMemoryCacheRepository {
    async fn find_valid(
        &self,
        cache_key: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<CacheEntry>, RepositoryError> {
        let mut entries = self.entries.write().await;
        if let Some(entry) = entries.get_mut(cache_key) {
            if !entry.is_expired(now) {
                entry.hit_count += 1;
                return Ok(Some(entry.clone()));
            }
        }
        // Expired rows read as a miss and are dropped on observation.
        entries.remove(cache_key);
        Ok(None)
    }

    async fn put(&self, mut entry: CacheEntry) -> Result<(), RepositoryError> {
        entry.hit_count = 0;
        self.entries.write().await.insert(entry.cache_key.clone(), entry);
        Ok(())
    }

    async fn invalidate_block(&self, block_id: &BlockId) -> Result<u64, RepositoryError> {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.block_id != *block_id);
        Ok((before - entries.len()) as u64)
    }

    async fn invalidate_all(&self) -> Result<u64, RepositoryError> {
        let mut entries = self.entries.write().await;
        let removed = entries.len() as u64;
        entries.clear();
        Ok(removed)
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, RepositoryError> {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        Ok((before - entries.len()) as u64)
    }
}

#[derive(Default)]
pub struct InMemoryAnalyticsRepository {
    events: RwLock<Vec<AnalyticsEvent>>,
}

impl InMemoryAnalyticsRepository {
    pub async fn events(&self) -> Vec<AnalyticsEvent> {
        self.events.read().await.clone()
    }
}

#[async_trait::async_trait]
impl AnalyticsRepository for InMemoryAnalyticsRepository {
    async fn append(&self, event: AnalyticsEvent) -> Result<(), RepositoryError> {
        let mut events = self.events.write().await;
        if events.iter().all(|existing| existing.id != event.id) {
            events.push(event);
        }
        Ok(())
    }

    async fn daily_stats(
        &self,
        block_id: &BlockId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<DailyBlockStats>, RepositoryError> {
        use relevon_core::domain::analytics::AnalyticsAction;

        let events = self.events.read().await;
        let mut days: HashMap<NaiveDate, DailyBlockStats> = HashMap::new();

        for event in events.iter().filter(|event| {
            event.block_id == *block_id && event.event_date >= from && event.event_date <= to
        }) {
            let day = days.entry(event.event_date).or_insert_with(|| DailyBlockStats {
                date: event.event_date,
                views: 0,
                clicks: 0,
                conversions: 0,
            });
            match event.action {
                AnalyticsAction::Impression => day.views += 1,
                AnalyticsAction::Click => day.clicks += 1,
                AnalyticsAction::Conversion => day.conversions += 1,
            }
        }

        let mut stats: Vec<DailyBlockStats> = days.into_values().collect();
        stats.sort_by_key(|day| day.date);
        Ok(stats)
    }
}

/// In-memory feature/interaction store. Doubles as the behavior
/// repository so embedded deployments ingest and rank over one state.
#[derive(Default)]
pub struct InMemorySignalStore {
    profiles: RwLock<HashMap<String, ProductProfile>>,
    similarities: RwLock<Vec<ProductSimilarity>>,
    interactions: RwLock<HashMap<(String, String), UserProductInteraction>>,
    behaviors: RwLock<Vec<BehaviorEvent>>,
}

impl InMemorySignalStore {
    pub async fn add_profile(&self, profile: ProductProfile) {
        self.profiles.write().await.insert(profile.product_id.0.clone(), profile);
    }

    pub async fn add_similarity(&self, similarity: ProductSimilarity) {
        self.similarities.write().await.push(similarity);
    }
}

#[async_trait::async_trait]
impl BehaviorRepository for InMemorySignalStore {
    async fn append_event(&self, event: &BehaviorEvent) -> Result<bool, RepositoryError> {
        let mut behaviors = self.behaviors.write().await;
        if behaviors.iter().any(|existing| existing.id == event.id) {
            return Ok(false);
        }
        behaviors.push(event.clone());
        Ok(true)
    }

    async fn upsert_interaction(&self, event: &BehaviorEvent) -> Result<(), RepositoryError> {
        let user_id = match &event.user_id {
            Some(user_id) => user_id.clone(),
            None => return Ok(()),
        };

        let mut interactions = self.interactions.write().await;
        let key = (user_id.0.clone(), event.product_id.0.clone());
        match interactions.entry(key) {
            std::collections::hash_map::Entry::Occupied(mut slot) => slot.get_mut().absorb(event),
            std::collections::hash_map::Entry::Vacant(slot) => {
                slot.insert(UserProductInteraction::open(event, user_id));
            }
        }
        Ok(())
    }

    async fn find_interaction(
        &self,
        user_id: &UserId,
        product_id: &ProductId,
    ) -> Result<Option<UserProductInteraction>, RepositoryError> {
        let interactions = self.interactions.read().await;
        Ok(interactions.get(&(user_id.0.clone(), product_id.0.clone())).cloned())
    }

    async fn reset_interaction(
        &self,
        user_id: &UserId,
        product_id: &ProductId,
    ) -> Result<(), RepositoryError> {
        let mut interactions = self.interactions.write().await;
        interactions.remove(&(user_id.0.clone(), product_id.0.clone()));
        Ok(())
    }
}

#[async_trait::async_trait]
impl SignalStore for InMemorySignalStore {
    async fn profile(&self, product_id: &ProductId) -> Result<Option<ProductProfile>, StoreError> {
        Ok(self.profiles.read().await.get(&product_id.0).cloned())
    }

    async fn category_profiles(
        &self,
        category_id: &CategoryId,
        limit: usize,
    ) -> Result<Vec<ProductProfile>, StoreError> {
        let profiles = self.profiles.read().await;
        let mut pool: Vec<ProductProfile> = profiles
            .values()
            .filter(|profile| profile.active && profile.category_id.as_ref() == Some(category_id))
            .cloned()
            .collect();
        pool.sort_by(|a, b| {
            b.popularity
                .partial_cmp(&a.popularity)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.product_id.cmp(&b.product_id))
        });
        pool.truncate(limit);
        Ok(pool)
    }

    async fn similarities_for(
        &self,
        product_id: &ProductId,
        algorithm: AlgorithmKind,
        limit: usize,
    ) -> Result<Vec<ProductSimilarity>, StoreError> {
        let similarities = self.similarities.read().await;
        let mut matched: Vec<ProductSimilarity> = similarities
            .iter()
            .filter(|sim| sim.product_id == *product_id && sim.algorithm == algorithm)
            .cloned()
            .collect();
        matched.sort_by(|a, b| {
            b.similarity_score
                .partial_cmp(&a.similarity_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.similar_product_id.cmp(&b.similar_product_id))
        });
        matched.truncate(limit);
        Ok(matched)
    }

    async fn interactions_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<UserProductInteraction>, StoreError> {
        let interactions = self.interactions.read().await;
        let mut rows: Vec<UserProductInteraction> = interactions
            .values()
            .filter(|row| row.user_id == *user_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.last_interaction.cmp(&a.last_interaction));
        Ok(rows)
    }

    async fn co_interaction_counts(
        &self,
        product_ids: &[ProductId],
        exclude_user: Option<&UserId>,
        limit: usize,
    ) -> Result<Vec<ProductActivity>, StoreError> {
        let interactions = self.interactions.read().await;

        let peers: std::collections::HashSet<&str> = interactions
            .values()
            .filter(|row| {
                product_ids.contains(&row.product_id)
                    && exclude_user.map_or(true, |user| row.user_id != *user)
            })
            .map(|row| row.user_id.0.as_str())
            .collect();

        let mut grouped: HashMap<ProductId, ProductActivity> = HashMap::new();
        for row in interactions.values().filter(|row| {
            peers.contains(row.user_id.0.as_str()) && !product_ids.contains(&row.product_id)
        }) {
            let entry =
                grouped.entry(row.product_id.clone()).or_insert_with(|| ProductActivity {
                    product_id: row.product_id.clone(),
                    interaction_count: 0,
                    avg_rating: None,
                    last_interaction: None,
                });
            entry.interaction_count += row.interaction_count;
            if let Some(rating) = row.rating {
                entry.avg_rating = Some(match entry.avg_rating {
                    Some(existing) => (existing + rating) / 2.0,
                    None => rating,
                });
            }
            entry.last_interaction = match (entry.last_interaction, Some(row.last_interaction)) {
                (Some(a), Some(b)) => Some(a.max(b)),
                (a, b) => a.or(b),
            };
        }

        let mut activity: Vec<ProductActivity> = grouped.into_values().collect();
        activity.sort_by(|a, b| {
            b.interaction_count
                .cmp(&a.interaction_count)
                .then_with(|| a.product_id.cmp(&b.product_id))
        });
        activity.truncate(limit);
        Ok(activity)
    }

    async fn interaction_totals(&self, limit: usize) -> Result<Vec<ProductActivity>, StoreError> {
        let interactions = self.interactions.read().await;

        let mut grouped: HashMap<ProductId, ProductActivity> = HashMap::new();
        for row in interactions.values() {
            let entry =
                grouped.entry(row.product_id.clone()).or_insert_with(|| ProductActivity {
                    product_id: row.product_id.clone(),
                    interaction_count: 0,
                    avg_rating: None,
                    last_interaction: None,
                });
            entry.interaction_count += row.interaction_count;
            if let Some(rating) = row.rating {
                entry.avg_rating = Some(match entry.avg_rating {
                    Some(existing) => (existing + rating) / 2.0,
                    None => rating,
                });
            }
            entry.last_interaction = match (entry.last_interaction, Some(row.last_interaction)) {
                (Some(a), Some(b)) => Some(a.max(b)),
                (a, b) => a.or(b),
            };
        }

        let mut totals: Vec<ProductActivity> = grouped.into_values().collect();
        totals.sort_by(|a, b| {
            b.interaction_count
                .cmp(&a.interaction_count)
                .then_with(|| a.product_id.cmp(&b.product_id))
        });
        totals.truncate(limit);
        Ok(totals)
    }

    async fn daily_activity_since(
        &self,
        since: NaiveDate,
        limit: usize,
    ) -> Result<Vec<DailyActivity>, StoreError> {
        let behaviors = self.behaviors.read().await;

        let mut grouped: HashMap<(ProductId, NaiveDate), u64> = HashMap::new();
        for event in behaviors.iter().filter(|event| event.occurred_at.date_naive() >= since) {
            *grouped
                .entry((event.product_id.clone(), event.occurred_at.date_naive()))
                .or_insert(0) += 1;
        }

        let mut daily: Vec<DailyActivity> = grouped
            .into_iter()
            .map(|((product_id, day), count)| DailyActivity { product_id, day, count })
            .collect();
        daily.sort_by(|a, b| b.day.cmp(&a.day).then_with(|| b.count.cmp(&a.count)));
        daily.truncate(limit);
        Ok(daily)
    }

    async fn co_purchased_with(
        &self,
        product_id: &ProductId,
        limit: usize,
    ) -> Result<Vec<PurchasePair>, StoreError> {
        let interactions = self.interactions.read().await;

        let buyers: std::collections::HashSet<&str> = interactions
            .values()
            .filter(|row| {
                row.product_id == *product_id && row.interaction_type == BehaviorKind::Purchase
            })
            .map(|row| row.user_id.0.as_str())
            .collect();

        let mut grouped: HashMap<ProductId, PurchasePair> = HashMap::new();
        for row in interactions.values().filter(|row| {
            row.product_id != *product_id
                && row.interaction_type == BehaviorKind::Purchase
                && buyers.contains(row.user_id.0.as_str())
        }) {
            let entry = grouped.entry(row.product_id.clone()).or_insert_with(|| PurchasePair {
                product_id: row.product_id.clone(),
                co_count: 0,
                last_purchased: None,
            });
            entry.co_count += row.interaction_count;
            entry.last_purchased = match (entry.last_purchased, Some(row.last_interaction)) {
                (Some(a), Some(b)) => Some(a.max(b)),
                (a, b) => a.or(b),
            };
        }

        let mut pairs: Vec<PurchasePair> = grouped.into_values().collect();
        pairs.sort_by(|a, b| {
            b.co_count.cmp(&a.co_count).then_with(|| a.product_id.cmp(&b.product_id))
        });
        pairs.truncate(limit);
        Ok(pairs)
    }
}
