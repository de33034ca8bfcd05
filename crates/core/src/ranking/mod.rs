//! Candidate generation and scoring.
//!
//! A `RankingStrategy` turns a request subject into candidates with raw
//! dimension signals, reading everything it needs through the
//! `SignalStore` seam; the `ScoreBlender` then normalizes, weights,
//! filters and orders them. Strategies never fail a request: missing
//! subjects or empty data produce empty candidate lists.

pub mod algorithms;
pub mod scoring;
pub mod store;
pub mod types;

use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::config::AlgorithmKind;
use algorithms::{
    CollaborativeStrategy, ContentBasedStrategy, CrossSellStrategy, HybridStrategy,
    PopularityStrategy, RankingStrategy, TrendingStrategy, UpSellStrategy,
};

/// Default cap on candidates pulled from any single data source.
pub const DEFAULT_CANDIDATE_POOL: usize = 100;

/// Default lookback window for the trending strategy.
pub const DEFAULT_TRENDING_WINDOW_DAYS: u32 = 30;

/// Runtime knobs shared by the strategies, resolved once at startup.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EngineTuning {
    pub candidate_pool: usize,
    pub trending_window_days: u32,
}

impl Default for EngineTuning {
    fn default() -> Self {
        Self {
            candidate_pool: DEFAULT_CANDIDATE_POOL,
            trending_window_days: DEFAULT_TRENDING_WINDOW_DAYS,
        }
    }
}

/// Typed algorithm dispatch, built once at startup. Lookups never miss:
/// every `AlgorithmKind` has a registered strategy and the content-based
/// strategy backstops any gap.
pub struct StrategyRegistry {
    strategies: HashMap<AlgorithmKind, Arc<dyn RankingStrategy>>,
    fallback: Arc<dyn RankingStrategy>,
}

impl StrategyRegistry {
    pub fn new(tuning: EngineTuning) -> Self {
        let content: Arc<dyn RankingStrategy> = Arc::new(ContentBasedStrategy::new(tuning));
        let mut strategies: HashMap<AlgorithmKind, Arc<dyn RankingStrategy>> = HashMap::new();

        strategies.insert(AlgorithmKind::ContentBased, Arc::clone(&content));
        strategies.insert(AlgorithmKind::Collaborative, Arc::new(CollaborativeStrategy::new(tuning)));
        strategies.insert(AlgorithmKind::Hybrid, Arc::new(HybridStrategy::new(tuning)));
        strategies.insert(AlgorithmKind::Popularity, Arc::new(PopularityStrategy::new(tuning)));
        strategies.insert(AlgorithmKind::Trending, Arc::new(TrendingStrategy::new(tuning)));
        strategies.insert(AlgorithmKind::CrossSell, Arc::new(CrossSellStrategy::new(tuning)));
        strategies.insert(AlgorithmKind::UpSell, Arc::new(UpSellStrategy::new(tuning)));

        Self { strategies, fallback: content }
    }

    pub fn strategy_for(&self, kind: AlgorithmKind) -> Arc<dyn RankingStrategy> {
        self.strategies.get(&kind).cloned().unwrap_or_else(|| Arc::clone(&self.fallback))
    }
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        Self::new(EngineTuning::default())
    }
}
