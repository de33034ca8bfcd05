use std::str::FromStr;

use chrono::NaiveDate;
use sqlx::Row;

use relevon_core::domain::analytics::{AnalyticsEvent, DailyBlockStats};
use relevon_core::domain::block::BlockId;

use super::{AnalyticsRepository, RepositoryError};
use crate::DbPool;

pub struct SqlAnalyticsRepository {
    pool: DbPool,
}

impl SqlAnalyticsRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl AnalyticsRepository for SqlAnalyticsRepository {
    async fn append(&self, event: AnalyticsEvent) -> Result<(), RepositoryError> {
        let metrics = if event.metrics.is_empty() {
            None
        } else {
            Some(
                serde_json::to_string(&event.metrics)
                    .map_err(|e| RepositoryError::Decode(format!("metrics: {e}")))?,
            )
        };

        sqlx::query(
            "INSERT INTO recommendation_analytics
                (id, block_id, config_id, user_id, product_id, action, metrics,
                 event_date, recorded_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO NOTHING",
        )
        .bind(&event.id)
        .bind(&event.block_id.0)
        .bind(&event.config_id.0)
        .bind(event.user_id.as_ref().map(|id| id.0.as_str()))
        .bind(event.product_id.as_ref().map(|id| id.0.as_str()))
        .bind(event.action.as_str())
        .bind(metrics)
        .bind(event.event_date.to_string())
        .bind(event.recorded_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn daily_stats(
        &self,
        block_id: &BlockId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<DailyBlockStats>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT event_date,
                    SUM(CASE WHEN action = 'impression' THEN 1 ELSE 0 END) AS views,
                    SUM(CASE WHEN action = 'click' THEN 1 ELSE 0 END) AS clicks,
                    SUM(CASE WHEN action = 'conversion' THEN 1 ELSE 0 END) AS conversions
             FROM recommendation_analytics
             WHERE block_id = ? AND event_date >= ? AND event_date <= ?
             GROUP BY event_date
             ORDER BY event_date",
        )
        .bind(&block_id.0)
        .bind(from.to_string())
        .bind(to.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let date_raw: String =
                    row.try_get("event_date").map_err(|e| RepositoryError::Decode(e.to_string()))?;
                let date = NaiveDate::from_str(&date_raw)
                    .map_err(|e| RepositoryError::Decode(format!("event date: {e}")))?;
                let views: i64 =
                    row.try_get("views").map_err(|e| RepositoryError::Decode(e.to_string()))?;
                let clicks: i64 =
                    row.try_get("clicks").map_err(|e| RepositoryError::Decode(e.to_string()))?;
                let conversions: i64 = row
                    .try_get("conversions")
                    .map_err(|e| RepositoryError::Decode(e.to_string()))?;

                Ok(DailyBlockStats {
                    date,
                    views: views.max(0) as u64,
                    clicks: clicks.max(0) as u64,
                    conversions: conversions.max(0) as u64,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::{NaiveDate, Utc};

    use relevon_core::domain::analytics::{
        AnalyticsAction, AnalyticsEvent, BlockPerformance,
    };
    use relevon_core::domain::behavior::UserId;
    use relevon_core::domain::block::BlockId;
    use relevon_core::domain::config::ConfigId;
    use relevon_core::domain::product::ProductId;

    use super::SqlAnalyticsRepository;
    use crate::repositories::AnalyticsRepository;
    use crate::{connect_with_settings, migrations};

    async fn setup() -> sqlx::SqlitePool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        pool
    }

    fn event(id: &str, action: AnalyticsAction, day: u32) -> AnalyticsEvent {
        AnalyticsEvent {
            id: id.to_string(),
            block_id: BlockId("blk-1".to_string()),
            config_id: ConfigId("cfg-1".to_string()),
            user_id: Some(UserId("u1".to_string())),
            product_id: Some(ProductId("p1".to_string())),
            action,
            metrics: BTreeMap::new(),
            event_date: NaiveDate::from_ymd_opt(2026, 8, day).expect("valid date"),
            recorded_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn daily_stats_aggregate_per_day() {
        let pool = setup().await;
        let repo = SqlAnalyticsRepository::new(pool);

        for (id, action, day) in [
            ("e1", AnalyticsAction::Impression, 1),
            ("e2", AnalyticsAction::Impression, 1),
            ("e3", AnalyticsAction::Click, 1),
            ("e4", AnalyticsAction::Impression, 2),
            ("e5", AnalyticsAction::Click, 2),
            ("e6", AnalyticsAction::Conversion, 2),
        ] {
            repo.append(event(id, action, day)).await.expect("append");
        }

        let from = NaiveDate::from_ymd_opt(2026, 8, 1).expect("from");
        let to = NaiveDate::from_ymd_opt(2026, 8, 31).expect("to");
        let days =
            repo.daily_stats(&BlockId("blk-1".to_string()), from, to).await.expect("stats");

        assert_eq!(days.len(), 2);
        assert_eq!(days[0].views, 2);
        assert_eq!(days[0].clicks, 1);
        assert_eq!(days[0].conversions, 0);
        assert_eq!(days[1].views, 1);
        assert_eq!(days[1].clicks, 1);
        assert_eq!(days[1].conversions, 1);

        let performance = BlockPerformance::from_daily(&days);
        assert_eq!(performance.total_requests, 3);
        assert!(performance.avg_ctr >= 0.0 && performance.avg_ctr <= 100.0);
    }

    #[tokio::test]
    async fn date_range_excludes_outside_days() {
        let pool = setup().await;
        let repo = SqlAnalyticsRepository::new(pool);

        repo.append(event("in", AnalyticsAction::Impression, 10)).await.expect("append in");
        repo.append(event("out", AnalyticsAction::Impression, 25)).await.expect("append out");

        let from = NaiveDate::from_ymd_opt(2026, 8, 5).expect("from");
        let to = NaiveDate::from_ymd_opt(2026, 8, 15).expect("to");
        let days =
            repo.daily_stats(&BlockId("blk-1".to_string()), from, to).await.expect("stats");

        assert_eq!(days.len(), 1);
        assert_eq!(days[0].date.to_string(), "2026-08-10");
    }

    #[tokio::test]
    async fn duplicate_event_ids_are_ignored() {
        let pool = setup().await;
        let repo = SqlAnalyticsRepository::new(pool);

        repo.append(event("dup", AnalyticsAction::Impression, 1)).await.expect("first");
        repo.append(event("dup", AnalyticsAction::Impression, 1)).await.expect("second");

        let from = NaiveDate::from_ymd_opt(2026, 8, 1).expect("from");
        let to = NaiveDate::from_ymd_opt(2026, 8, 2).expect("to");
        let days =
            repo.daily_stats(&BlockId("blk-1".to_string()), from, to).await.expect("stats");
        assert_eq!(days[0].views, 1);
    }
}
