//! Application wiring: configuration, database, migrations, and the
//! assembled recommendation service facade.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;
use tracing::info;

use relevon_core::config::{AppConfig, ConfigError, LoadOptions};
use relevon_core::domain::analytics::{AnalyticsAction, BlockPerformance};
use relevon_core::domain::behavior::{BehaviorEvent, UserId};
use relevon_core::domain::block::BlockId;
use relevon_core::domain::config::ConfigId;
use relevon_core::domain::product::ProductId;
use relevon_core::ranking::types::{RankedProduct, RequestContext};
use relevon_core::ranking::{EngineTuning, StrategyRegistry};
use relevon_db::repositories::{
    RepositoryError, SqlAnalyticsRepository, SqlBehaviorRepository, SqlCacheRepository,
    SqlConfigRepository,
};
use relevon_db::{connect_with_settings, migrations, DbPool, SqlSignalStore};

use crate::analytics::AnalyticsRecorder;
use crate::cache::CacheService;
use crate::ingest::BehaviorIngestor;
use crate::resolver::BlockResolver;

/// The wired engine: the four operations the serving layer consumes,
/// plus behavior ingestion.
pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub resolver: Arc<BlockResolver>,
    pub analytics: Arc<AnalyticsRecorder>,
    pub cache: Arc<CacheService>,
    pub ingestor: BehaviorIngestor,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        database_url = %config.database.url,
        "starting recommendation engine bootstrap"
    );

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(event_name = "system.bootstrap.migrations_applied", "database migrations applied");

    let registry = Arc::new(StrategyRegistry::new(EngineTuning {
        candidate_pool: config.engine.candidate_pool,
        trending_window_days: config.engine.trending_window_days,
    }));
    let cache = Arc::new(CacheService::new(Arc::new(SqlCacheRepository::new(db_pool.clone()))));
    let analytics =
        Arc::new(AnalyticsRecorder::new(Arc::new(SqlAnalyticsRepository::new(db_pool.clone()))));
    let ingestor =
        BehaviorIngestor::new(Arc::new(SqlBehaviorRepository::new(db_pool.clone())));

    let mut resolver = BlockResolver::new(
        Arc::new(SqlConfigRepository::new(db_pool.clone())),
        Arc::new(SqlSignalStore::new(db_pool.clone())),
        Arc::clone(&cache),
        Arc::clone(&analytics),
        registry,
    );
    if let Some(fallback) = &config.engine.fallback_block {
        resolver = resolver.with_fallback_block(fallback.clone());
    }

    Ok(Application {
        config,
        db_pool,
        resolver: Arc::new(resolver),
        analytics,
        cache,
        ingestor,
    })
}

impl Application {
    /// Ordered product list for a block request.
    pub async fn recommendations(
        &self,
        block_name: &str,
        request: &RequestContext,
    ) -> Vec<RankedProduct> {
        self.resolver.recommendations(block_name, request).await
    }

    /// Record an observed outcome (impression, click, conversion).
    pub async fn record_event(
        &self,
        block_id: BlockId,
        config_id: ConfigId,
        user_id: Option<UserId>,
        product_id: Option<ProductId>,
        action: AnalyticsAction,
        now: DateTime<Utc>,
    ) {
        self.analytics.record_event(block_id, config_id, user_id, product_id, action, now).await;
    }

    /// Administrative cache invalidation for one block or everything.
    pub async fn clear_cache(
        &self,
        block_id: Option<&BlockId>,
    ) -> Result<u64, RepositoryError> {
        self.cache.invalidate(block_id).await
    }

    /// Dashboard rollup for a block over an inclusive date range.
    pub async fn block_performance(
        &self,
        block_id: &BlockId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<BlockPerformance, RepositoryError> {
        self.analytics.block_performance(block_id, from, to).await
    }

    /// Ingest one raw behavior event into the interaction matrix.
    pub async fn record_behavior(&self, event: BehaviorEvent) -> Result<(), RepositoryError> {
        self.ingestor.record(event).await
    }
}
