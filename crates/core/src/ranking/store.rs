use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;

use crate::domain::behavior::{UserId, UserProductInteraction};
use crate::domain::config::AlgorithmKind;
use crate::domain::product::{CategoryId, ProductId, ProductProfile, ProductSimilarity};

/// Data-source failure surfaced by a strategy. The resolver treats it as
/// a degraded (empty) result, never as a caller-visible error.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("signal store unavailable: {0}")]
    Unavailable(String),
}

/// Interaction rollup for one product.
#[derive(Clone, Debug, PartialEq)]
pub struct ProductActivity {
    pub product_id: ProductId,
    pub interaction_count: u64,
    pub avg_rating: Option<f64>,
    pub last_interaction: Option<DateTime<Utc>>,
}

/// Interaction count for one product on one day.
#[derive(Clone, Debug, PartialEq)]
pub struct DailyActivity {
    pub product_id: ProductId,
    pub day: NaiveDate,
    pub count: u64,
}

/// Co-purchase rollup relative to some subject product.
#[derive(Clone, Debug, PartialEq)]
pub struct PurchasePair {
    pub product_id: ProductId,
    pub co_count: u64,
    pub last_purchased: Option<DateTime<Utc>>,
}

/// Read-only seam between the ranking strategies and the feature /
/// interaction data owned by the catalog and order subsystems. Keeps the
/// ranking layer unit-testable without a database.
#[async_trait]
pub trait SignalStore: Send + Sync {
    async fn profile(&self, product_id: &ProductId) -> Result<Option<ProductProfile>, StoreError>;

    /// Active profiles in a category, the candidate pool for
    /// content-based and up-sell ranking.
    async fn category_profiles(
        &self,
        category_id: &CategoryId,
        limit: usize,
    ) -> Result<Vec<ProductProfile>, StoreError>;

    /// Precomputed similarity pairs for a product, best first.
    async fn similarities_for(
        &self,
        product_id: &ProductId,
        algorithm: AlgorithmKind,
        limit: usize,
    ) -> Result<Vec<ProductSimilarity>, StoreError>;

    async fn interactions_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<UserProductInteraction>, StoreError>;

    /// Products interacted with by other users of the given products,
    /// strongest co-occurrence first.
    async fn co_interaction_counts(
        &self,
        product_ids: &[ProductId],
        exclude_user: Option<&UserId>,
        limit: usize,
    ) -> Result<Vec<ProductActivity>, StoreError>;

    /// All-time interaction totals, most popular first.
    async fn interaction_totals(&self, limit: usize) -> Result<Vec<ProductActivity>, StoreError>;

    /// Per-day interaction counts since the given day.
    async fn daily_activity_since(
        &self,
        since: NaiveDate,
        limit: usize,
    ) -> Result<Vec<DailyActivity>, StoreError>;

    /// Products purchased by the users who purchased the subject.
    async fn co_purchased_with(
        &self,
        product_id: &ProductId,
        limit: usize,
    ) -> Result<Vec<PurchasePair>, StoreError>;
}
