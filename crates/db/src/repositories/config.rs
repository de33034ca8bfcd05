use chrono::{DateTime, Utc};
use sqlx::Row;

use relevon_core::domain::block::{BlockId, RecommendationBlock};
use relevon_core::domain::config::{
    AlgorithmKind, ConfigFilters, ConfigId, HybridBlend, RecommendationConfig, SignalWeights,
};

use super::{ConfigRepository, RepositoryError};
use crate::DbPool;

pub struct SqlConfigRepository {
    pool: DbPool,
}

impl SqlConfigRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn get_text(row: &sqlx::sqlite::SqliteRow, column: &str) -> Result<String, RepositoryError> {
    row.try_get(column).map_err(|e| RepositoryError::Decode(e.to_string()))
}

fn get_opt_text(
    row: &sqlx::sqlite::SqliteRow,
    column: &str,
) -> Result<Option<String>, RepositoryError> {
    row.try_get(column).map_err(|e| RepositoryError::Decode(e.to_string()))
}

fn get_f64(row: &sqlx::sqlite::SqliteRow, column: &str) -> Result<f64, RepositoryError> {
    row.try_get(column).map_err(|e| RepositoryError::Decode(e.to_string()))
}

fn get_i64(row: &sqlx::sqlite::SqliteRow, column: &str) -> Result<i64, RepositoryError> {
    row.try_get(column).map_err(|e| RepositoryError::Decode(e.to_string()))
}

fn get_bool(row: &sqlx::sqlite::SqliteRow, column: &str) -> Result<bool, RepositoryError> {
    row.try_get(column).map_err(|e| RepositoryError::Decode(e.to_string()))
}

pub(crate) fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn row_to_block(row: &sqlx::sqlite::SqliteRow) -> Result<RecommendationBlock, RepositoryError> {
    Ok(RecommendationBlock {
        id: BlockId(get_text(row, "id")?),
        name: get_text(row, "name")?,
        title: get_opt_text(row, "title")?,
        config_ids: Vec::new(),
        max_products: get_i64(row, "max_products")?.max(1) as usize,
        cache_duration_secs: get_i64(row, "cache_duration_secs")?.max(0) as u32,
        active: get_bool(row, "active")?,
        created_at: parse_timestamp(&get_text(row, "created_at")?),
        updated_at: parse_timestamp(&get_text(row, "updated_at")?),
    })
}

fn row_to_config(row: &sqlx::sqlite::SqliteRow) -> Result<RecommendationConfig, RepositoryError> {
    let filters = match get_opt_text(row, "filters")? {
        Some(raw) if !raw.is_empty() => serde_json::from_str(&raw)
            .map_err(|e| RepositoryError::Decode(format!("filters: {e}")))?,
        _ => ConfigFilters::default(),
    };

    Ok(RecommendationConfig {
        id: ConfigId(get_text(row, "id")?),
        name: get_text(row, "name")?,
        algorithm: AlgorithmKind::parse(&get_text(row, "algorithm")?),
        weights: SignalWeights {
            price: get_f64(row, "weight_price")?,
            rating: get_f64(row, "weight_rating")?,
            popularity: get_f64(row, "weight_popularity")?,
            recency: get_f64(row, "weight_recency")?,
            category: get_f64(row, "weight_category")?,
            custom: get_f64(row, "weight_custom")?,
        },
        decay_factor: get_f64(row, "decay_factor")?,
        min_score: get_f64(row, "min_score")?,
        max_results: get_i64(row, "max_results")?.max(1) as usize,
        cache_ttl_secs: get_i64(row, "cache_ttl_secs")?.max(0) as u32,
        enable_caching: get_bool(row, "enable_caching")?,
        enable_analytics: get_bool(row, "enable_analytics")?,
        priority: get_i64(row, "priority")? as i32,
        active: get_bool(row, "active")?,
        hybrid: HybridBlend {
            content: get_f64(row, "hybrid_content_weight")?,
            collaborative: get_f64(row, "hybrid_collaborative_weight")?,
        },
        filters,
        created_at: parse_timestamp(&get_text(row, "created_at")?),
        updated_at: parse_timestamp(&get_text(row, "updated_at")?),
    })
}

async fn load_config_ids(
    pool: &DbPool,
    block_id: &BlockId,
) -> Result<Vec<ConfigId>, RepositoryError> {
    let rows = sqlx::query(
        "SELECT config_id FROM recommendation_block_config
         WHERE block_id = ? ORDER BY position, config_id",
    )
    .bind(&block_id.0)
    .fetch_all(pool)
    .await?;

    rows.iter().map(|row| Ok(ConfigId(get_text(row, "config_id")?))).collect()
}

#[async_trait::async_trait]
impl ConfigRepository for SqlConfigRepository {
    async fn find_block(
        &self,
        name: &str,
    ) -> Result<Option<RecommendationBlock>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, name, title, max_products, cache_duration_secs, active,
                    created_at, updated_at
             FROM recommendation_block WHERE name = ?",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let mut block = row_to_block(&row)?;
                block.config_ids = load_config_ids(&self.pool, &block.id).await?;
                Ok(Some(block))
            }
            None => Ok(None),
        }
    }

    async fn find_block_by_id(
        &self,
        id: &BlockId,
    ) -> Result<Option<RecommendationBlock>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, name, title, max_products, cache_duration_secs, active,
                    created_at, updated_at
             FROM recommendation_block WHERE id = ?",
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let mut block = row_to_block(&row)?;
                block.config_ids = load_config_ids(&self.pool, &block.id).await?;
                Ok(Some(block))
            }
            None => Ok(None),
        }
    }

    async fn active_configs_for_block(
        &self,
        block_id: &BlockId,
    ) -> Result<Vec<RecommendationConfig>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT c.id, c.name, c.algorithm,
                    c.weight_price, c.weight_rating, c.weight_popularity,
                    c.weight_recency, c.weight_category, c.weight_custom,
                    c.decay_factor, c.min_score, c.max_results, c.cache_ttl_secs,
                    c.enable_caching, c.enable_analytics, c.priority, c.active,
                    c.hybrid_content_weight, c.hybrid_collaborative_weight,
                    c.filters, c.created_at, c.updated_at
             FROM recommendation_config c
             JOIN recommendation_block_config bc ON bc.config_id = c.id
             WHERE bc.block_id = ? AND c.active = 1
             ORDER BY c.priority DESC, bc.position, c.id",
        )
        .bind(&block_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_config).collect()
    }

    async fn save_block(&self, block: RecommendationBlock) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO recommendation_block
                (id, name, title, max_products, cache_duration_secs, active,
                 created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                title = excluded.title,
                max_products = excluded.max_products,
                cache_duration_secs = excluded.cache_duration_secs,
                active = excluded.active,
                updated_at = excluded.updated_at",
        )
        .bind(&block.id.0)
        .bind(&block.name)
        .bind(&block.title)
        .bind(block.max_products as i64)
        .bind(i64::from(block.cache_duration_secs))
        .bind(block.active)
        .bind(block.created_at.to_rfc3339())
        .bind(block.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn save_config(&self, config: RecommendationConfig) -> Result<(), RepositoryError> {
        let filters = if config.filters.is_empty() {
            None
        } else {
            Some(
                serde_json::to_string(&config.filters)
                    .map_err(|e| RepositoryError::Decode(format!("filters: {e}")))?,
            )
        };

        sqlx::query(
            "INSERT INTO recommendation_config
                (id, name, algorithm,
                 weight_price, weight_rating, weight_popularity,
                 weight_recency, weight_category, weight_custom,
                 decay_factor, min_score, max_results, cache_ttl_secs,
                 enable_caching, enable_analytics, priority, active,
                 hybrid_content_weight, hybrid_collaborative_weight,
                 filters, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                algorithm = excluded.algorithm,
                weight_price = excluded.weight_price,
                weight_rating = excluded.weight_rating,
                weight_popularity = excluded.weight_popularity,
                weight_recency = excluded.weight_recency,
                weight_category = excluded.weight_category,
                weight_custom = excluded.weight_custom,
                decay_factor = excluded.decay_factor,
                min_score = excluded.min_score,
                max_results = excluded.max_results,
                cache_ttl_secs = excluded.cache_ttl_secs,
                enable_caching = excluded.enable_caching,
                enable_analytics = excluded.enable_analytics,
                priority = excluded.priority,
                active = excluded.active,
                hybrid_content_weight = excluded.hybrid_content_weight,
                hybrid_collaborative_weight = excluded.hybrid_collaborative_weight,
                filters = excluded.filters,
                updated_at = excluded.updated_at",
        )
        .bind(&config.id.0)
        .bind(&config.name)
        .bind(config.algorithm.as_str())
        .bind(config.weights.price)
        .bind(config.weights.rating)
        .bind(config.weights.popularity)
        .bind(config.weights.recency)
        .bind(config.weights.category)
        .bind(config.weights.custom)
        .bind(config.decay_factor)
        .bind(config.min_score)
        .bind(config.max_results as i64)
        .bind(i64::from(config.cache_ttl_secs))
        .bind(config.enable_caching)
        .bind(config.enable_analytics)
        .bind(i64::from(config.priority))
        .bind(config.active)
        .bind(config.hybrid.content)
        .bind(config.hybrid.collaborative)
        .bind(filters)
        .bind(config.created_at.to_rfc3339())
        .bind(config.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn attach_config(
        &self,
        block_id: &BlockId,
        config_id: &ConfigId,
        position: u32,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO recommendation_block_config (block_id, config_id, position)
             VALUES (?, ?, ?)
             ON CONFLICT(block_id, config_id) DO UPDATE SET position = excluded.position",
        )
        .bind(&block_id.0)
        .bind(&config_id.0)
        .bind(i64::from(position))
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use relevon_core::domain::block::{BlockId, RecommendationBlock};
    use relevon_core::domain::config::{
        AlgorithmKind, ConfigId, RecommendationConfig,
    };
    use relevon_core::domain::product::CategoryId;

    use super::SqlConfigRepository;
    use crate::repositories::ConfigRepository;
    use crate::{connect_with_settings, migrations};

    async fn setup() -> sqlx::SqlitePool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        pool
    }

    fn sample_block(id: &str, name: &str) -> RecommendationBlock {
        let now = Utc::now();
        RecommendationBlock {
            id: BlockId(id.to_string()),
            name: name.to_string(),
            title: Some("Related products".to_string()),
            config_ids: Vec::new(),
            max_products: 6,
            cache_duration_secs: 120,
            active: true,
            created_at: now,
            updated_at: now,
        }
    }

    fn sample_config(id: &str, name: &str, priority: i32) -> RecommendationConfig {
        let mut config = RecommendationConfig::popularity_fallback(Utc::now());
        config.id = ConfigId(id.to_string());
        config.name = name.to_string();
        config.priority = priority;
        config
    }

    #[tokio::test]
    async fn block_round_trips_with_config_ids() {
        let pool = setup().await;
        let repo = SqlConfigRepository::new(pool);

        repo.save_block(sample_block("blk-1", "related-products")).await.expect("save block");
        repo.save_config(sample_config("cfg-a", "content", 10)).await.expect("save cfg a");
        repo.save_config(sample_config("cfg-b", "popular", 5)).await.expect("save cfg b");
        repo.attach_config(&BlockId("blk-1".to_string()), &ConfigId("cfg-a".to_string()), 0)
            .await
            .expect("attach a");
        repo.attach_config(&BlockId("blk-1".to_string()), &ConfigId("cfg-b".to_string()), 1)
            .await
            .expect("attach b");

        let block = repo.find_block("related-products").await.expect("find").expect("some block");
        assert_eq!(block.id.0, "blk-1");
        assert_eq!(block.config_ids.len(), 2);
        assert_eq!(block.max_products, 6);
    }

    #[tokio::test]
    async fn unknown_block_name_is_none() {
        let pool = setup().await;
        let repo = SqlConfigRepository::new(pool);

        let found = repo.find_block("missing").await.expect("find");
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn active_configs_order_by_priority_descending() {
        let pool = setup().await;
        let repo = SqlConfigRepository::new(pool);
        let block_id = BlockId("blk-1".to_string());

        repo.save_block(sample_block("blk-1", "related-products")).await.expect("save block");
        repo.save_config(sample_config("cfg-low", "low", 1)).await.expect("save low");
        repo.save_config(sample_config("cfg-high", "high", 9)).await.expect("save high");

        let mut inactive = sample_config("cfg-off", "off", 100);
        inactive.active = false;
        repo.save_config(inactive).await.expect("save inactive");

        for (config_id, position) in [("cfg-low", 0), ("cfg-high", 1), ("cfg-off", 2)] {
            repo.attach_config(&block_id, &ConfigId(config_id.to_string()), position)
                .await
                .expect("attach");
        }

        let configs = repo.active_configs_for_block(&block_id).await.expect("configs");
        let names: Vec<&str> = configs.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["high", "low"]);
    }

    #[tokio::test]
    async fn config_filters_round_trip() {
        let pool = setup().await;
        let repo = SqlConfigRepository::new(pool);
        let block_id = BlockId("blk-1".to_string());

        repo.save_block(sample_block("blk-1", "related-products")).await.expect("save block");

        let mut config = sample_config("cfg-f", "filtered", 1);
        config.algorithm = AlgorithmKind::CrossSell;
        config.filters.include_categories.push(CategoryId("audio".to_string()));
        config.filters.max_price = Some(499.0);
        repo.save_config(config).await.expect("save config");
        repo.attach_config(&block_id, &ConfigId("cfg-f".to_string()), 0).await.expect("attach");

        let configs = repo.active_configs_for_block(&block_id).await.expect("configs");
        assert_eq!(configs.len(), 1);
        assert_eq!(configs[0].algorithm, AlgorithmKind::CrossSell);
        assert_eq!(configs[0].filters.include_categories.len(), 1);
        assert_eq!(configs[0].filters.max_price, Some(499.0));
    }
}
