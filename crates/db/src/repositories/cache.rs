use chrono::{DateTime, Utc};
use sqlx::Row;

use relevon_core::domain::behavior::UserId;
use relevon_core::domain::block::BlockId;
use relevon_core::domain::cache::CacheEntry;
use relevon_core::domain::product::ProductId;

use super::config::parse_timestamp;
use super::{CacheRepository, RepositoryError};
use crate::DbPool;

pub struct SqlCacheRepository {
    pool: DbPool,
}

impl SqlCacheRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_entry(row: &sqlx::sqlite::SqliteRow) -> Result<CacheEntry, RepositoryError> {
    let decode = |e: sqlx::Error| RepositoryError::Decode(e.to_string());

    let cache_key: String = row.try_get("cache_key").map_err(decode)?;
    let block_id: String = row.try_get("block_id").map_err(decode)?;
    let user_id: Option<String> = row.try_get("user_id").map_err(decode)?;
    let product_id: Option<String> = row.try_get("product_id").map_err(decode)?;
    let context_type: Option<String> = row.try_get("context_type").map_err(decode)?;
    let context_data_raw: Option<String> = row.try_get("context_data").map_err(decode)?;
    let payload_raw: String = row.try_get("payload").map_err(decode)?;
    let hit_count: i64 = row.try_get("hit_count").map_err(decode)?;
    let expires_at_raw: String = row.try_get("expires_at").map_err(decode)?;
    let created_at_raw: String = row.try_get("created_at").map_err(decode)?;

    let context_data = match context_data_raw {
        Some(raw) if !raw.is_empty() => serde_json::from_str(&raw)
            .map_err(|e| RepositoryError::Decode(format!("context data: {e}")))?,
        _ => Default::default(),
    };
    let payload = serde_json::from_str(&payload_raw)
        .map_err(|e| RepositoryError::Decode(format!("payload: {e}")))?;

    Ok(CacheEntry {
        cache_key,
        block_id: BlockId(block_id),
        user_id: user_id.map(UserId),
        product_id: product_id.map(ProductId),
        context_type,
        context_data,
        payload,
        hit_count: hit_count.max(0) as u64,
        expires_at: parse_timestamp(&expires_at_raw),
        created_at: parse_timestamp(&created_at_raw),
    })
}

#[async_trait::async_trait]
impl CacheRepository for SqlCacheRepository {
    async fn find_valid(
        &self,
        cache_key: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<CacheEntry>, RepositoryError> {
        let now_raw = now.to_rfc3339();

        // Expired rows are dropped on observation rather than served.
        sqlx::query("DELETE FROM recommendation_cache WHERE cache_key = ? AND expires_at <= ?")
            .bind(cache_key)
            .bind(&now_raw)
            .execute(&self.pool)
            .await?;

        let touched = sqlx::query(
            "UPDATE recommendation_cache SET hit_count = hit_count + 1
             WHERE cache_key = ? AND expires_at > ?",
        )
        .bind(cache_key)
        .bind(&now_raw)
        .execute(&self.pool)
        .await?;

        if touched.rows_affected() == 0 {
            return Ok(None);
        }

        let row = sqlx::query(
            "SELECT cache_key, block_id, user_id, product_id, context_type, context_data,
                    payload, hit_count, expires_at, created_at
             FROM recommendation_cache WHERE cache_key = ?",
        )
        .bind(cache_key)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_entry).transpose()
    }

    async fn put(&self, entry: CacheEntry) -> Result<(), RepositoryError> {
        let context_data = if entry.context_data.is_empty() {
            None
        } else {
            Some(
                serde_json::to_string(&entry.context_data)
                    .map_err(|e| RepositoryError::Decode(format!("context data: {e}")))?,
            )
        };
        let payload = serde_json::to_string(&entry.payload)
            .map_err(|e| RepositoryError::Decode(format!("payload: {e}")))?;

        sqlx::query(
            "INSERT INTO recommendation_cache
                (cache_key, block_id, user_id, product_id, context_type, context_data,
                 payload, hit_count, expires_at, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, 0, ?, ?)
             ON CONFLICT(cache_key) DO UPDATE SET
                block_id = excluded.block_id,
                user_id = excluded.user_id,
                product_id = excluded.product_id,
                context_type = excluded.context_type,
                context_data = excluded.context_data,
                payload = excluded.payload,
                hit_count = 0,
                expires_at = excluded.expires_at,
                created_at = excluded.created_at",
        )
        .bind(&entry.cache_key)
        .bind(&entry.block_id.0)
        .bind(entry.user_id.as_ref().map(|id| id.0.as_str()))
        .bind(entry.product_id.as_ref().map(|id| id.0.as_str()))
        .bind(&entry.context_type)
        .bind(context_data)
        .bind(payload)
        .bind(entry.expires_at.to_rfc3339())
        .bind(entry.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn invalidate_block(&self, block_id: &BlockId) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM recommendation_cache WHERE block_id = ?")
            .bind(&block_id.0)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn invalidate_all(&self) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM recommendation_cache").execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM recommendation_cache WHERE expires_at <= ?")
            .bind(now.to_rfc3339())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use relevon_core::domain::block::BlockId;
    use relevon_core::domain::cache::CacheEntry;
    use relevon_core::domain::config::{AlgorithmKind, ConfigId};
    use relevon_core::domain::product::ProductId;
    use relevon_core::ranking::types::{RankedProduct, RequestContext, SignalBreakdown};

    use super::SqlCacheRepository;
    use crate::repositories::CacheRepository;
    use crate::{connect_with_settings, migrations};

    async fn setup() -> sqlx::SqlitePool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        pool
    }

    fn ranked(id: &str, score: f64) -> RankedProduct {
        RankedProduct {
            product_id: ProductId(id.to_string()),
            score,
            algorithm: AlgorithmKind::Popularity,
            config_id: ConfigId("cfg-1".to_string()),
            raw_score: score,
            signals: SignalBreakdown::default(),
        }
    }

    fn entry_at(key: &str, ttl_secs: u32, now: chrono::DateTime<Utc>) -> CacheEntry {
        CacheEntry::for_request(
            key.to_string(),
            BlockId("blk-1".to_string()),
            &RequestContext::new(now),
            vec![ranked("p1", 0.9), ranked("p2", 0.7)],
            ttl_secs,
        )
    }

    #[tokio::test]
    async fn entry_is_served_before_expiry_and_missed_after() {
        let pool = setup().await;
        let repo = SqlCacheRepository::new(pool);
        let t0 = Utc.with_ymd_and_hms(2026, 8, 4, 12, 0, 0).unwrap();

        repo.put(entry_at("related|user:u1", 60, t0)).await.expect("put");

        let hit = repo
            .find_valid("related|user:u1", t0 + Duration::seconds(30))
            .await
            .expect("get at +30s")
            .expect("hit");
        assert_eq!(hit.hit_count, 1);
        assert_eq!(hit.payload.len(), 2);
        assert_eq!(hit.payload[0].product_id.0, "p1");

        let miss = repo
            .find_valid("related|user:u1", t0 + Duration::seconds(61))
            .await
            .expect("get at +61s");
        assert!(miss.is_none());
    }

    #[tokio::test]
    async fn hit_count_increments_monotonically() {
        let pool = setup().await;
        let repo = SqlCacheRepository::new(pool);
        let t0 = Utc.with_ymd_and_hms(2026, 8, 4, 12, 0, 0).unwrap();

        repo.put(entry_at("trending", 600, t0)).await.expect("put");

        for expected in 1..=3u64 {
            let hit = repo
                .find_valid("trending", t0 + Duration::seconds(expected as i64))
                .await
                .expect("get")
                .expect("hit");
            assert_eq!(hit.hit_count, expected);
        }
    }

    #[tokio::test]
    async fn put_overwrites_and_resets_hit_count() {
        let pool = setup().await;
        let repo = SqlCacheRepository::new(pool);
        let t0 = Utc.with_ymd_and_hms(2026, 8, 4, 12, 0, 0).unwrap();

        repo.put(entry_at("related", 60, t0)).await.expect("first put");
        repo.find_valid("related", t0 + Duration::seconds(1)).await.expect("get").expect("hit");

        repo.put(entry_at("related", 60, t0 + Duration::seconds(10))).await.expect("second put");
        let hit = repo
            .find_valid("related", t0 + Duration::seconds(11))
            .await
            .expect("get")
            .expect("hit");
        assert_eq!(hit.hit_count, 1);
    }

    #[tokio::test]
    async fn invalidate_block_clears_only_that_block() {
        let pool = setup().await;
        let repo = SqlCacheRepository::new(pool);
        let t0 = Utc.with_ymd_and_hms(2026, 8, 4, 12, 0, 0).unwrap();

        repo.put(entry_at("one", 600, t0)).await.expect("put one");
        let mut other = entry_at("two", 600, t0);
        other.block_id = BlockId("blk-2".to_string());
        repo.put(other).await.expect("put two");

        let removed =
            repo.invalidate_block(&BlockId("blk-1".to_string())).await.expect("invalidate");
        assert_eq!(removed, 1);

        assert!(repo.find_valid("one", t0).await.expect("get one").is_none());
        assert!(repo.find_valid("two", t0).await.expect("get two").is_some());
    }

    #[tokio::test]
    async fn purge_expired_removes_only_dead_rows() {
        let pool = setup().await;
        let repo = SqlCacheRepository::new(pool);
        let t0 = Utc.with_ymd_and_hms(2026, 8, 4, 12, 0, 0).unwrap();

        repo.put(entry_at("short", 10, t0)).await.expect("put short");
        repo.put(entry_at("long", 600, t0)).await.expect("put long");

        let removed = repo.purge_expired(t0 + Duration::seconds(30)).await.expect("purge");
        assert_eq!(removed, 1);
        assert!(repo.find_valid("long", t0 + Duration::seconds(30)).await.expect("get").is_some());
    }
}
