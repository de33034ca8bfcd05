//! Request orchestration for the recommendation engine: block
//! resolution, cache coalescing, best-effort analytics, and behavior
//! ingestion, wired over the core ranking layer and the persistence
//! crate.

pub mod analytics;
pub mod bootstrap;
pub mod cache;
pub mod ingest;
pub mod resolver;
pub mod telemetry;

pub use analytics::AnalyticsRecorder;
pub use bootstrap::{bootstrap, bootstrap_with_config, Application, BootstrapError};
pub use cache::CacheService;
pub use ingest::BehaviorIngestor;
pub use resolver::BlockResolver;
