//! Behavior ingestion feeding the interaction matrix.

use std::sync::Arc;

use tracing::debug;

use relevon_core::domain::behavior::{BehaviorEvent, UserId};
use relevon_core::domain::product::ProductId;
use relevon_db::repositories::{BehaviorRepository, RepositoryError};

/// Accepts raw behavior events from the serving layer: every event
/// lands in the append-only log, and identified events fold into the
/// (user, product) aggregate the collaborative strategies read.
pub struct BehaviorIngestor {
    behaviors: Arc<dyn BehaviorRepository>,
}

impl BehaviorIngestor {
    pub fn new(behaviors: Arc<dyn BehaviorRepository>) -> Self {
        Self { behaviors }
    }

    pub async fn record(&self, event: BehaviorEvent) -> Result<(), RepositoryError> {
        let fresh = self.behaviors.append_event(&event).await?;
        if !fresh {
            // Redelivered event ids must not inflate the aggregates.
            debug!(
                event_name = "recommendation.behavior.replayed",
                behavior_id = %event.id,
                "duplicate behavior event ignored"
            );
            return Ok(());
        }
        self.behaviors.upsert_interaction(&event).await
    }

    /// Administrative reset of one (user, product) aggregate.
    pub async fn reset(
        &self,
        user_id: &UserId,
        product_id: &ProductId,
    ) -> Result<(), RepositoryError> {
        self.behaviors.reset_interaction(user_id, product_id).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{Duration, TimeZone, Utc};

    use relevon_core::domain::behavior::{BehaviorEvent, BehaviorKind, UserId};
    use relevon_core::domain::product::ProductId;
    use relevon_db::repositories::{BehaviorRepository, InMemorySignalStore};

    use super::BehaviorIngestor;

    fn event(id: &str, occurred_at: chrono::DateTime<Utc>) -> BehaviorEvent {
        BehaviorEvent {
            id: id.to_string(),
            user_id: Some(UserId("u1".to_string())),
            session_id: "sess-1".to_string(),
            product_id: ProductId("p1".to_string()),
            category_id: None,
            kind: BehaviorKind::View,
            rating: None,
            metadata: serde_json::Map::new(),
            occurred_at,
        }
    }

    #[tokio::test]
    async fn two_views_aggregate_once_each() {
        let store = Arc::new(InMemorySignalStore::default());
        let ingestor = BehaviorIngestor::new(store.clone());
        let t0 = Utc.with_ymd_and_hms(2026, 8, 4, 9, 0, 0).unwrap();

        ingestor.record(event("e1", t0)).await.expect("first");
        ingestor.record(event("e2", t0 + Duration::minutes(1))).await.expect("second");

        let row = store
            .find_interaction(&UserId("u1".to_string()), &ProductId("p1".to_string()))
            .await
            .expect("find")
            .expect("row");
        assert_eq!(row.interaction_count, 2);
        assert_eq!(row.first_interaction, t0);
    }

    #[tokio::test]
    async fn replayed_event_id_is_ignored() {
        let store = Arc::new(InMemorySignalStore::default());
        let ingestor = BehaviorIngestor::new(store.clone());
        let t0 = Utc.with_ymd_and_hms(2026, 8, 4, 9, 0, 0).unwrap();

        ingestor.record(event("e1", t0)).await.expect("first");
        ingestor.record(event("e1", t0)).await.expect("replay");

        let row = store
            .find_interaction(&UserId("u1".to_string()), &ProductId("p1".to_string()))
            .await
            .expect("find")
            .expect("row");
        assert_eq!(row.interaction_count, 1);
    }

    #[tokio::test]
    async fn reset_clears_the_aggregate() {
        let store = Arc::new(InMemorySignalStore::default());
        let ingestor = BehaviorIngestor::new(store.clone());
        let t0 = Utc.with_ymd_and_hms(2026, 8, 4, 9, 0, 0).unwrap();

        ingestor.record(event("e1", t0)).await.expect("record");
        ingestor
            .reset(&UserId("u1".to_string()), &ProductId("p1".to_string()))
            .await
            .expect("reset");

        let row = store
            .find_interaction(&UserId("u1".to_string()), &ProductId("p1".to_string()))
            .await
            .expect("find");
        assert!(row.is_none());
    }
}
