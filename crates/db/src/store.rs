//! SQL implementation of the ranking layer's `SignalStore` seam.

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::Row;

use relevon_core::domain::behavior::{BehaviorKind, UserId, UserProductInteraction};
use relevon_core::domain::config::AlgorithmKind;
use relevon_core::domain::product::{
    CategoryId, ProductFeature, ProductId, ProductProfile, ProductSimilarity,
};
use relevon_core::ranking::store::{
    DailyActivity, ProductActivity, PurchasePair, SignalStore, StoreError,
};

use crate::repositories::config::parse_timestamp;
use crate::repositories::RepositoryError;
use crate::DbPool;

#[derive(Clone)]
pub struct SqlSignalStore {
    pool: DbPool,
}

impl SqlSignalStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn features_for(
        &self,
        product_id: &ProductId,
    ) -> Result<Vec<ProductFeature>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT feature_key, feature_value, weight
             FROM product_feature WHERE product_id = ? ORDER BY feature_key",
        )
        .bind(&product_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let decode = |e: sqlx::Error| RepositoryError::Decode(e.to_string());
                Ok(ProductFeature {
                    key: row.try_get("feature_key").map_err(decode)?,
                    value: row.try_get("feature_value").map_err(decode)?,
                    weight: row.try_get("weight").map_err(decode)?,
                })
            })
            .collect()
    }

    async fn row_to_profile(
        &self,
        row: &sqlx::sqlite::SqliteRow,
    ) -> Result<ProductProfile, RepositoryError> {
        let decode = |e: sqlx::Error| RepositoryError::Decode(e.to_string());

        let product_id = ProductId(row.try_get("product_id").map_err(decode)?);
        let category_id: Option<String> = row.try_get("category_id").map_err(decode)?;
        let features = self.features_for(&product_id).await?;

        Ok(ProductProfile {
            product_id,
            category_id: category_id.map(CategoryId),
            price: row.try_get("price").map_err(decode)?,
            rating: row.try_get("rating").map_err(decode)?,
            popularity: row.try_get("popularity").map_err(decode)?,
            active: row.try_get("active").map_err(decode)?,
            features,
        })
    }
}

fn unavailable(error: RepositoryError) -> StoreError {
    StoreError::Unavailable(error.to_string())
}

fn activity_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<ProductActivity, RepositoryError> {
    let decode = |e: sqlx::Error| RepositoryError::Decode(e.to_string());

    let product_id: String = row.try_get("product_id").map_err(decode)?;
    let count: i64 = row.try_get("interaction_count").map_err(decode)?;
    let avg_rating: Option<f64> = row.try_get("avg_rating").map_err(decode)?;
    let last_raw: Option<String> = row.try_get("last_interaction").map_err(decode)?;

    Ok(ProductActivity {
        product_id: ProductId(product_id),
        interaction_count: count.max(0) as u64,
        avg_rating,
        last_interaction: last_raw.as_deref().map(parse_timestamp),
    })
}

#[async_trait]
impl SignalStore for SqlSignalStore {
    async fn profile(&self, product_id: &ProductId) -> Result<Option<ProductProfile>, StoreError> {
        let row = sqlx::query(
            "SELECT product_id, category_id, price, rating, popularity, active
             FROM product_profile WHERE product_id = ?",
        )
        .bind(&product_id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| unavailable(e.into()))?;

        match row {
            Some(row) => Ok(Some(self.row_to_profile(&row).await.map_err(unavailable)?)),
            None => Ok(None),
        }
    }

    async fn category_profiles(
        &self,
        category_id: &CategoryId,
        limit: usize,
    ) -> Result<Vec<ProductProfile>, StoreError> {
        let rows = sqlx::query(
            "SELECT product_id, category_id, price, rating, popularity, active
             FROM product_profile
             WHERE category_id = ? AND active = 1
             ORDER BY popularity DESC, product_id
             LIMIT ?",
        )
        .bind(&category_id.0)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| unavailable(e.into()))?;

        let mut profiles = Vec::with_capacity(rows.len());
        for row in &rows {
            profiles.push(self.row_to_profile(row).await.map_err(unavailable)?);
        }
        Ok(profiles)
    }

    async fn similarities_for(
        &self,
        product_id: &ProductId,
        algorithm: AlgorithmKind,
        limit: usize,
    ) -> Result<Vec<ProductSimilarity>, StoreError> {
        let rows = sqlx::query(
            "SELECT product_id, similar_product_id, algorithm, similarity_score,
                    calculation_data, calculated_at
             FROM product_similarity
             WHERE product_id = ? AND algorithm = ?
             ORDER BY similarity_score DESC, similar_product_id
             LIMIT ?",
        )
        .bind(&product_id.0)
        .bind(algorithm.as_str())
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| unavailable(e.into()))?;

        rows.iter()
            .map(|row| {
                let decode =
                    |e: sqlx::Error| unavailable(RepositoryError::Decode(e.to_string()));

                let calculation_data: Option<String> =
                    row.try_get("calculation_data").map_err(decode)?;
                let calculated_at: String = row.try_get("calculated_at").map_err(decode)?;

                Ok(ProductSimilarity {
                    product_id: ProductId(row.try_get("product_id").map_err(decode)?),
                    similar_product_id: ProductId(
                        row.try_get("similar_product_id").map_err(decode)?,
                    ),
                    algorithm: AlgorithmKind::parse(
                        &row.try_get::<String, _>("algorithm").map_err(decode)?,
                    ),
                    similarity_score: row.try_get("similarity_score").map_err(decode)?,
                    calculation_data: calculation_data
                        .and_then(|raw| serde_json::from_str(&raw).ok()),
                    calculated_at: parse_timestamp(&calculated_at),
                })
            })
            .collect()
    }

    async fn interactions_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<UserProductInteraction>, StoreError> {
        let rows = sqlx::query(
            "SELECT user_id, product_id, interaction_type, rating, interaction_count,
                    first_interaction, last_interaction
             FROM user_product_interaction
             WHERE user_id = ?
             ORDER BY last_interaction DESC",
        )
        .bind(&user_id.0)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| unavailable(e.into()))?;

        rows.iter()
            .map(|row| {
                let decode =
                    |e: sqlx::Error| unavailable(RepositoryError::Decode(e.to_string()));

                let kind_raw: String = row.try_get("interaction_type").map_err(decode)?;
                let interaction_type = BehaviorKind::parse(&kind_raw).ok_or_else(|| {
                    StoreError::Unavailable(format!("unknown interaction type `{kind_raw}`"))
                })?;
                let count: i64 = row.try_get("interaction_count").map_err(decode)?;
                let first_raw: String = row.try_get("first_interaction").map_err(decode)?;
                let last_raw: String = row.try_get("last_interaction").map_err(decode)?;

                Ok(UserProductInteraction {
                    user_id: UserId(row.try_get("user_id").map_err(decode)?),
                    product_id: ProductId(row.try_get("product_id").map_err(decode)?),
                    interaction_type,
                    rating: row.try_get("rating").map_err(decode)?,
                    interaction_count: count.max(0) as u64,
                    first_interaction: parse_timestamp(&first_raw),
                    last_interaction: parse_timestamp(&last_raw),
                })
            })
            .collect()
    }

    async fn co_interaction_counts(
        &self,
        product_ids: &[ProductId],
        exclude_user: Option<&UserId>,
        limit: usize,
    ) -> Result<Vec<ProductActivity>, StoreError> {
        if product_ids.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; product_ids.len()].join(", ");
        let sql = format!(
            "SELECT b.product_id AS product_id,
                    SUM(b.interaction_count) AS interaction_count,
                    AVG(b.rating) AS avg_rating,
                    MAX(b.last_interaction) AS last_interaction
             FROM user_product_interaction a
             JOIN user_product_interaction b ON a.user_id = b.user_id
             WHERE a.product_id IN ({placeholders})
               AND b.product_id NOT IN ({placeholders})
               AND (? IS NULL OR a.user_id != ?)
             GROUP BY b.product_id
             ORDER BY interaction_count DESC, b.product_id
             LIMIT ?"
        );

        let mut query = sqlx::query(&sql);
        for product_id in product_ids {
            query = query.bind(&product_id.0);
        }
        for product_id in product_ids {
            query = query.bind(&product_id.0);
        }
        let excluded = exclude_user.map(|user| user.0.as_str());
        query = query.bind(excluded).bind(excluded).bind(limit as i64);

        let rows = query.fetch_all(&self.pool).await.map_err(|e| unavailable(e.into()))?;
        rows.iter().map(|row| activity_from_row(row).map_err(unavailable)).collect()
    }

    async fn interaction_totals(&self, limit: usize) -> Result<Vec<ProductActivity>, StoreError> {
        let rows = sqlx::query(
            "SELECT product_id,
                    SUM(interaction_count) AS interaction_count,
                    AVG(rating) AS avg_rating,
                    MAX(last_interaction) AS last_interaction
             FROM user_product_interaction
             GROUP BY product_id
             ORDER BY interaction_count DESC, product_id
             LIMIT ?",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| unavailable(e.into()))?;

        rows.iter().map(|row| activity_from_row(row).map_err(unavailable)).collect()
    }

    async fn daily_activity_since(
        &self,
        since: NaiveDate,
        limit: usize,
    ) -> Result<Vec<DailyActivity>, StoreError> {
        let rows = sqlx::query(
            "SELECT product_id, substr(occurred_at, 1, 10) AS day, COUNT(*) AS count
             FROM user_behavior
             WHERE occurred_at >= ?
             GROUP BY product_id, day
             ORDER BY day DESC, count DESC
             LIMIT ?",
        )
        .bind(since.to_string())
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| unavailable(e.into()))?;

        rows.iter()
            .map(|row| {
                let decode =
                    |e: sqlx::Error| unavailable(RepositoryError::Decode(e.to_string()));

                let day_raw: String = row.try_get("day").map_err(decode)?;
                let day = day_raw.parse::<NaiveDate>().map_err(|e| {
                    StoreError::Unavailable(format!("bad activity day `{day_raw}`: {e}"))
                })?;
                let count: i64 = row.try_get("count").map_err(decode)?;

                Ok(DailyActivity {
                    product_id: ProductId(row.try_get("product_id").map_err(decode)?),
                    day,
                    count: count.max(0) as u64,
                })
            })
            .collect()
    }

    async fn co_purchased_with(
        &self,
        product_id: &ProductId,
        limit: usize,
    ) -> Result<Vec<PurchasePair>, StoreError> {
        let rows = sqlx::query(
            "SELECT b.product_id AS product_id,
                    SUM(b.interaction_count) AS co_count,
                    MAX(b.last_interaction) AS last_interaction
             FROM user_product_interaction a
             JOIN user_product_interaction b ON a.user_id = b.user_id
             WHERE a.product_id = ?
               AND a.interaction_type = 'purchase'
               AND b.interaction_type = 'purchase'
               AND b.product_id != ?
             GROUP BY b.product_id
             ORDER BY co_count DESC, b.product_id
             LIMIT ?",
        )
        .bind(&product_id.0)
        .bind(&product_id.0)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| unavailable(e.into()))?;

        rows.iter()
            .map(|row| {
                let decode =
                    |e: sqlx::Error| unavailable(RepositoryError::Decode(e.to_string()));

                let count: i64 = row.try_get("co_count").map_err(decode)?;
                let last_raw: Option<String> = row.try_get("last_interaction").map_err(decode)?;

                Ok(PurchasePair {
                    product_id: ProductId(row.try_get("product_id").map_err(decode)?),
                    co_count: count.max(0) as u64,
                    last_purchased: last_raw.as_deref().map(parse_timestamp),
                })
            })
            .collect()
    }
}
