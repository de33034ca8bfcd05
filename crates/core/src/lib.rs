pub mod cache_key;
pub mod config;
pub mod domain;
pub mod errors;
pub mod ranking;

pub use domain::analytics::{
    conversion_rate, ctr, AnalyticsAction, AnalyticsEvent, BlockPerformance, DailyBlockStats,
};
pub use domain::behavior::{BehaviorEvent, BehaviorKind, UserId, UserProductInteraction};
pub use domain::block::{BlockId, RecommendationBlock};
pub use domain::cache::CacheEntry;
pub use domain::config::{
    AlgorithmKind, ConfigFilters, ConfigId, HybridBlend, RecommendationConfig, SignalWeights,
};
pub use domain::product::{
    CategoryId, ProductFeature, ProductId, ProductProfile, ProductSimilarity,
};
pub use errors::{ApplicationError, DomainError};
pub use ranking::scoring::ScoreBlender;
pub use ranking::store::{
    DailyActivity, ProductActivity, PurchasePair, SignalStore, StoreError,
};
pub use ranking::types::{Candidate, RankedProduct, RequestContext, SignalBreakdown, SignalValues};
pub use ranking::{EngineTuning, StrategyRegistry};
