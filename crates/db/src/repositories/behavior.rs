use sqlx::Row;

use relevon_core::domain::behavior::{
    BehaviorEvent, BehaviorKind, UserId, UserProductInteraction,
};
use relevon_core::domain::product::ProductId;

use super::config::parse_timestamp;
use super::{BehaviorRepository, RepositoryError};
use crate::DbPool;

pub struct SqlBehaviorRepository {
    pool: DbPool,
}

impl SqlBehaviorRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

// Mirror of BehaviorKind::strength for use inside the upsert statement,
// so the strongest-kind rule applies atomically under concurrent writes.
const STRENGTH_CASE: &str = "CASE ? \
     WHEN 'view' THEN 1 WHEN 'click' THEN 2 WHEN 'add_to_cart' THEN 3 \
     WHEN 'rate' THEN 4 WHEN 'purchase' THEN 5 ELSE 0 END";

fn row_to_interaction(
    row: &sqlx::sqlite::SqliteRow,
) -> Result<UserProductInteraction, RepositoryError> {
    let decode = |e: sqlx::Error| RepositoryError::Decode(e.to_string());

    let user_id: String = row.try_get("user_id").map_err(decode)?;
    let product_id: String = row.try_get("product_id").map_err(decode)?;
    let interaction_type_raw: String = row.try_get("interaction_type").map_err(decode)?;
    let rating: Option<f64> = row.try_get("rating").map_err(decode)?;
    let interaction_count: i64 = row.try_get("interaction_count").map_err(decode)?;
    let first_interaction_raw: String = row.try_get("first_interaction").map_err(decode)?;
    let last_interaction_raw: String = row.try_get("last_interaction").map_err(decode)?;

    let interaction_type = BehaviorKind::parse(&interaction_type_raw).ok_or_else(|| {
        RepositoryError::Decode(format!("unknown interaction type `{interaction_type_raw}`"))
    })?;

    Ok(UserProductInteraction {
        user_id: UserId(user_id),
        product_id: ProductId(product_id),
        interaction_type,
        rating,
        interaction_count: interaction_count.max(0) as u64,
        first_interaction: parse_timestamp(&first_interaction_raw),
        last_interaction: parse_timestamp(&last_interaction_raw),
    })
}

#[async_trait::async_trait]
impl BehaviorRepository for SqlBehaviorRepository {
    async fn append_event(&self, event: &BehaviorEvent) -> Result<bool, RepositoryError> {
        let metadata = if event.metadata.is_empty() {
            None
        } else {
            Some(
                serde_json::to_string(&event.metadata)
                    .map_err(|e| RepositoryError::Decode(format!("metadata: {e}")))?,
            )
        };

        let result = sqlx::query(
            "INSERT INTO user_behavior
                (id, user_id, session_id, product_id, category_id, behavior_type,
                 rating, metadata, occurred_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO NOTHING",
        )
        .bind(&event.id)
        .bind(event.user_id.as_ref().map(|id| id.0.as_str()))
        .bind(&event.session_id)
        .bind(&event.product_id.0)
        .bind(event.category_id.as_ref().map(|id| id.0.as_str()))
        .bind(event.kind.as_str())
        .bind(event.rating)
        .bind(metadata)
        .bind(event.occurred_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn upsert_interaction(&self, event: &BehaviorEvent) -> Result<(), RepositoryError> {
        let user_id = match &event.user_id {
            Some(user_id) => user_id,
            None => return Ok(()),
        };
        let occurred_at = event.occurred_at.to_rfc3339();

        // Single atomic statement: count bump, last-seen refresh,
        // rating overwrite only when provided, strongest kind wins.
        let sql = format!(
            "INSERT INTO user_product_interaction
                (user_id, product_id, interaction_type, rating, interaction_count,
                 first_interaction, last_interaction)
             VALUES (?, ?, ?, ?, 1, ?, ?)
             ON CONFLICT(user_id, product_id) DO UPDATE SET
                interaction_count = interaction_count + 1,
                last_interaction = MAX(last_interaction, excluded.last_interaction),
                rating = COALESCE(excluded.rating, rating),
                interaction_type = CASE
                    WHEN ({strength}) > ({existing_strength}) THEN excluded.interaction_type
                    ELSE interaction_type
                END",
            strength = STRENGTH_CASE.replacen('?', "excluded.interaction_type", 1),
            existing_strength = STRENGTH_CASE.replacen('?', "interaction_type", 1),
        );

        sqlx::query(&sql)
            .bind(&user_id.0)
            .bind(&event.product_id.0)
            .bind(event.kind.as_str())
            .bind(event.rating)
            .bind(&occurred_at)
            .bind(&occurred_at)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn find_interaction(
        &self,
        user_id: &UserId,
        product_id: &ProductId,
    ) -> Result<Option<UserProductInteraction>, RepositoryError> {
        let row = sqlx::query(
            "SELECT user_id, product_id, interaction_type, rating, interaction_count,
                    first_interaction, last_interaction
             FROM user_product_interaction
             WHERE user_id = ? AND product_id = ?",
        )
        .bind(&user_id.0)
        .bind(&product_id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_interaction).transpose()
    }

    async fn reset_interaction(
        &self,
        user_id: &UserId,
        product_id: &ProductId,
    ) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM user_product_interaction WHERE user_id = ? AND product_id = ?")
            .bind(&user_id.0)
            .bind(&product_id.0)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
