//! Block resolution: config lookup, cache check, algorithm execution,
//! scoring, cache store, impression reporting.
//!
//! The serving path is deliberately infallible. Every upstream failure
//! degrades to a smaller or empty result plus a logged diagnostic; the
//! caller never sees an error.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, warn};

use relevon_core::cache_key;
use relevon_core::domain::analytics::AnalyticsAction;
use relevon_core::domain::block::RecommendationBlock;
use relevon_core::domain::cache::CacheEntry;
use relevon_core::domain::config::{ConfigId, RecommendationConfig};
use relevon_core::ranking::scoring::ScoreBlender;
use relevon_core::ranking::store::SignalStore;
use relevon_core::ranking::types::{RankedProduct, RequestContext};
use relevon_core::ranking::StrategyRegistry;
use relevon_db::repositories::ConfigRepository;

use crate::analytics::AnalyticsRecorder;
use crate::cache::CacheService;

pub struct BlockResolver {
    configs: Arc<dyn ConfigRepository>,
    store: Arc<dyn SignalStore>,
    cache: Arc<CacheService>,
    analytics: Arc<AnalyticsRecorder>,
    registry: Arc<StrategyRegistry>,
    blender: ScoreBlender,
    fallback_block: Option<String>,
}

/// Effective TTL for a block's composed result: the block-level
/// duration when set, else the most conservative contributing config
/// TTL. Zero means the result is not cacheable.
fn effective_ttl(block: &RecommendationBlock, configs: &[RecommendationConfig]) -> u32 {
    if block.cache_duration_secs > 0 {
        return block.cache_duration_secs;
    }
    configs
        .iter()
        .map(|config| config.cache_ttl_secs)
        .filter(|ttl| *ttl > 0)
        .min()
        .unwrap_or(0)
}

impl BlockResolver {
    pub fn new(
        configs: Arc<dyn ConfigRepository>,
        store: Arc<dyn SignalStore>,
        cache: Arc<CacheService>,
        analytics: Arc<AnalyticsRecorder>,
        registry: Arc<StrategyRegistry>,
    ) -> Self {
        Self {
            configs,
            store,
            cache,
            analytics,
            registry,
            blender: ScoreBlender,
            fallback_block: None,
        }
    }

    /// Serve this block instead when a caller names an unknown or
    /// inactive one.
    pub fn with_fallback_block(mut self, block_name: impl Into<String>) -> Self {
        self.fallback_block = Some(block_name.into());
        self
    }

    /// Resolve a block request to an ordered product list.
    pub async fn recommendations(
        &self,
        block_name: &str,
        request: &RequestContext,
    ) -> Vec<RankedProduct> {
        let block = match self.resolve_block(block_name).await {
            Some(block) => block,
            None => return Vec::new(),
        };

        let configs = self.load_configs(&block).await;
        if configs.is_empty() {
            debug!(
                event_name = "recommendation.block.no_configs",
                block = %block.name,
                "block has no usable configs; returning empty result"
            );
            return Vec::new();
        }

        let ttl = effective_ttl(&block, &configs);
        let cacheable = ttl > 0 && configs.iter().all(|config| config.enable_caching);
        if !cacheable {
            let results = self.compute(&block, &configs, request).await;
            self.report_impressions(&block, &configs, request, &results);
            return results;
        }

        let key = cache_key::derive(&block.name, request);
        if let Some(entry) = self.cache.fetch(&key, request.now).await {
            self.report_impressions(&block, &configs, request, &entry.payload);
            return entry.payload;
        }

        // Single-flight: the first miss computes, concurrent misses for
        // the same key wait and then read the stored entry.
        let slot = self.cache.slot(&key).await;
        let guard = slot.lock().await;
        if let Some(entry) = self.cache.fetch(&key, request.now).await {
            drop(guard);
            self.report_impressions(&block, &configs, request, &entry.payload);
            return entry.payload;
        }

        let results = self.compute(&block, &configs, request).await;
        self.cache
            .store(CacheEntry::for_request(
                key.clone(),
                block.id.clone(),
                request,
                results.clone(),
                ttl,
            ))
            .await;
        drop(guard);
        self.cache.release_slot(&key).await;

        self.report_impressions(&block, &configs, request, &results);
        results
    }

    async fn resolve_block(&self, name: &str) -> Option<RecommendationBlock> {
        if let Some(block) = self.lookup_block(name).await {
            return Some(block);
        }

        if let Some(fallback) = &self.fallback_block {
            if fallback != name {
                warn!(
                    event_name = "recommendation.block.fallback",
                    requested = %name,
                    fallback = %fallback,
                    "unknown or inactive block; serving fallback block"
                );
                return self.lookup_block(fallback).await;
            }
        }

        warn!(
            event_name = "recommendation.block.unknown",
            requested = %name,
            "unknown or inactive block; returning empty result"
        );
        None
    }

    async fn lookup_block(&self, name: &str) -> Option<RecommendationBlock> {
        match self.configs.find_block(name).await {
            Ok(Some(block)) if block.active => Some(block),
            Ok(_) => None,
            Err(error) => {
                warn!(
                    event_name = "recommendation.block.lookup_failed",
                    block = %name,
                    error = %error,
                    "block lookup failed; returning empty result"
                );
                None
            }
        }
    }

    async fn load_configs(&self, block: &RecommendationBlock) -> Vec<RecommendationConfig> {
        let configs = match self.configs.active_configs_for_block(&block.id).await {
            Ok(configs) => configs,
            Err(error) => {
                warn!(
                    event_name = "recommendation.config.lookup_failed",
                    block = %block.name,
                    error = %error,
                    "config lookup failed; returning empty result"
                );
                return Vec::new();
            }
        };

        configs
            .into_iter()
            .filter(|config| match config.validate() {
                Ok(()) => true,
                Err(error) => {
                    warn!(
                        event_name = "recommendation.config.invalid",
                        config = %config.name,
                        error = %error,
                        "invalid config skipped"
                    );
                    false
                }
            })
            .collect()
    }

    /// Run each config's strategy in priority order and merge the
    /// scored lists: first occurrence of a product wins, the request
    /// subject never recommends itself, and the block cap truncates.
    async fn compute(
        &self,
        block: &RecommendationBlock,
        configs: &[RecommendationConfig],
        request: &RequestContext,
    ) -> Vec<RankedProduct> {
        let mut seen = HashSet::new();
        if let Some(subject) = &request.product_id {
            seen.insert(subject.clone());
        }

        let mut results: Vec<RankedProduct> = Vec::new();
        for config in configs {
            if results.len() >= block.max_products {
                break;
            }

            let strategy = self.registry.strategy_for(config.algorithm);
            let candidates =
                match strategy.candidates(self.store.as_ref(), request, config).await {
                    Ok(candidates) => candidates,
                    Err(error) => {
                        warn!(
                            event_name = "recommendation.algorithm.degraded",
                            config = %config.name,
                            algorithm = %config.algorithm,
                            error = %error,
                            "strategy failed; continuing with remaining configs"
                        );
                        continue;
                    }
                };

            for ranked in self.blender.blend(candidates, config, request.now) {
                if seen.insert(ranked.product_id.clone()) {
                    results.push(ranked);
                }
            }
        }

        results.truncate(block.max_products);
        results
    }

    fn report_impressions(
        &self,
        block: &RecommendationBlock,
        configs: &[RecommendationConfig],
        request: &RequestContext,
        results: &[RankedProduct],
    ) {
        let enabled: HashSet<&ConfigId> = configs
            .iter()
            .filter(|config| config.enable_analytics)
            .map(|config| &config.id)
            .collect();

        let events: Vec<_> = results
            .iter()
            .filter(|ranked| enabled.contains(&ranked.config_id))
            .map(|ranked| {
                AnalyticsRecorder::build_event(
                    block.id.clone(),
                    ranked.config_id.clone(),
                    request.user_id.clone(),
                    Some(ranked.product_id.clone()),
                    AnalyticsAction::Impression,
                    request.now,
                )
            })
            .collect();

        self.analytics.record_detached(events);
    }
}
