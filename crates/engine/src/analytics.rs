//! Best-effort outcome recording and performance rollups.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use tracing::warn;
use uuid::Uuid;

use relevon_core::domain::analytics::{
    AnalyticsAction, AnalyticsEvent, BlockPerformance,
};
use relevon_core::domain::behavior::UserId;
use relevon_core::domain::block::BlockId;
use relevon_core::domain::config::ConfigId;
use relevon_core::domain::product::ProductId;
use relevon_db::repositories::{AnalyticsRepository, RepositoryError};

/// Appends outcome rows without ever failing the caller: one retry for
/// transient storage trouble, then a logged warning.
pub struct AnalyticsRecorder {
    repo: Arc<dyn AnalyticsRepository>,
}

impl AnalyticsRecorder {
    pub fn new(repo: Arc<dyn AnalyticsRepository>) -> Self {
        Self { repo }
    }

    pub fn build_event(
        block_id: BlockId,
        config_id: ConfigId,
        user_id: Option<UserId>,
        product_id: Option<ProductId>,
        action: AnalyticsAction,
        now: DateTime<Utc>,
    ) -> AnalyticsEvent {
        AnalyticsEvent {
            id: Uuid::new_v4().to_string(),
            block_id,
            config_id,
            user_id,
            product_id,
            action,
            metrics: BTreeMap::new(),
            event_date: now.date_naive(),
            recorded_at: now,
        }
    }

    /// Record one observed outcome. Write failures are retried once and
    /// then logged; the caller's response is never affected.
    pub async fn record_event(
        &self,
        block_id: BlockId,
        config_id: ConfigId,
        user_id: Option<UserId>,
        product_id: Option<ProductId>,
        action: AnalyticsAction,
        now: DateTime<Utc>,
    ) {
        let event =
            Self::build_event(block_id, config_id, user_id, product_id, action, now);
        self.append_with_retry(event).await;
    }

    pub(crate) async fn append_with_retry(&self, event: AnalyticsEvent) {
        let retry = event.clone();
        if self.repo.append(event).await.is_ok() {
            return;
        }
        if let Err(error) = self.repo.append(retry).await {
            warn!(
                event_name = "recommendation.analytics.write_failed",
                error = %error,
                "analytics write dropped after retry"
            );
        }
    }

    /// Fire-and-forget batch recording, detached from the caller's
    /// response path.
    pub fn record_detached(self: &Arc<Self>, events: Vec<AnalyticsEvent>) {
        if events.is_empty() {
            return;
        }
        let recorder = Arc::clone(self);
        tokio::spawn(async move {
            for event in events {
                recorder.append_with_retry(event).await;
            }
        });
    }

    /// Display rollup for a block over an inclusive date range.
    pub async fn block_performance(
        &self,
        block_id: &BlockId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<BlockPerformance, RepositoryError> {
        let days = self.repo.daily_stats(block_id, from, to).await?;
        Ok(BlockPerformance::from_daily(&days))
    }
}
