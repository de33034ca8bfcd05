use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;

use relevon_core::domain::analytics::{AnalyticsEvent, DailyBlockStats};
use relevon_core::domain::behavior::{BehaviorEvent, UserId, UserProductInteraction};
use relevon_core::domain::block::{BlockId, RecommendationBlock};
use relevon_core::domain::cache::CacheEntry;
use relevon_core::domain::config::{ConfigId, RecommendationConfig};
use relevon_core::domain::product::{ProductId, ProductProfile, ProductSimilarity};

pub mod analytics;
pub mod behavior;
pub mod cache;
pub mod catalog;
pub mod config;
pub mod memory;

pub use analytics::SqlAnalyticsRepository;
pub use behavior::SqlBehaviorRepository;
pub use cache::SqlCacheRepository;
pub use catalog::SqlCatalogRepository;
pub use config::SqlConfigRepository;
pub use memory::{
    InMemoryAnalyticsRepository, InMemoryCacheRepository, InMemoryConfigRepository,
    InMemorySignalStore,
};

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

/// Registry of blocks and their configs. The serving path only reads;
/// the write half exists for administration and seeding, applied
/// between recomputations.
#[async_trait]
pub trait ConfigRepository: Send + Sync {
    async fn find_block(&self, name: &str)
        -> Result<Option<RecommendationBlock>, RepositoryError>;

    async fn find_block_by_id(
        &self,
        id: &BlockId,
    ) -> Result<Option<RecommendationBlock>, RepositoryError>;

    /// Active configs attached to a block, priority descending with
    /// block position as the tie-break. Unknown block ids yield an
    /// empty list.
    async fn active_configs_for_block(
        &self,
        block_id: &BlockId,
    ) -> Result<Vec<RecommendationConfig>, RepositoryError>;

    async fn save_block(&self, block: RecommendationBlock) -> Result<(), RepositoryError>;

    async fn save_config(&self, config: RecommendationConfig) -> Result<(), RepositoryError>;

    async fn attach_config(
        &self,
        block_id: &BlockId,
        config_id: &ConfigId,
        position: u32,
    ) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait CacheRepository: Send + Sync {
    /// Return the entry for a key when it is still live at `now`,
    /// bumping its hit counter. Expired rows read as a miss and are
    /// removed on observation.
    async fn find_valid(
        &self,
        cache_key: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<CacheEntry>, RepositoryError>;

    /// Insert or overwrite the entry for its key.
    async fn put(&self, entry: CacheEntry) -> Result<(), RepositoryError>;

    /// Drop every entry for one block. Returns the number removed.
    async fn invalidate_block(&self, block_id: &BlockId) -> Result<u64, RepositoryError>;

    /// Administrative full clear. Returns the number removed.
    async fn invalidate_all(&self) -> Result<u64, RepositoryError>;

    /// Maintenance sweep of rows past their deadline.
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, RepositoryError>;
}

#[async_trait]
pub trait AnalyticsRepository: Send + Sync {
    async fn append(&self, event: AnalyticsEvent) -> Result<(), RepositoryError>;

    /// Daily impression/click/conversion counts for a block inside the
    /// inclusive date range, oldest first.
    async fn daily_stats(
        &self,
        block_id: &BlockId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<DailyBlockStats>, RepositoryError>;
}

#[async_trait]
pub trait BehaviorRepository: Send + Sync {
    /// Append the raw event to the behavior log. Returns false when the
    /// event id was already recorded (replayed delivery).
    async fn append_event(&self, event: &BehaviorEvent) -> Result<bool, RepositoryError>;

    /// Upsert the (user, product) aggregate for an event. Events without
    /// a user id only feed the raw log and are skipped here.
    async fn upsert_interaction(&self, event: &BehaviorEvent) -> Result<(), RepositoryError>;

    async fn find_interaction(
        &self,
        user_id: &UserId,
        product_id: &ProductId,
    ) -> Result<Option<UserProductInteraction>, RepositoryError>;

    /// Explicitly clear one aggregate, the only sanctioned way a count
    /// goes down.
    async fn reset_interaction(
        &self,
        user_id: &UserId,
        product_id: &ProductId,
    ) -> Result<(), RepositoryError>;
}

/// Write half of the feature store, used by seeding and by the offline
/// similarity refresh.
#[async_trait]
pub trait CatalogRepository: Send + Sync {
    async fn save_profile(&self, profile: &ProductProfile) -> Result<(), RepositoryError>;

    /// Swap out the precomputed pairs for one (product, algorithm).
    async fn replace_similarities(
        &self,
        product_id: &ProductId,
        pairs: Vec<ProductSimilarity>,
    ) -> Result<(), RepositoryError>;
}
