//! Deterministic demo dataset for local development and integration
//! tests: a small catalog, a few weeks of shopper behavior, precomputed
//! similarities, and three wired-up recommendation blocks.

use chrono::{DateTime, Duration, Utc};

use relevon_core::domain::behavior::{BehaviorEvent, BehaviorKind, UserId};
use relevon_core::domain::block::{BlockId, RecommendationBlock};
use relevon_core::domain::config::{
    AlgorithmKind, ConfigId, HybridBlend, RecommendationConfig, SignalWeights,
};
use relevon_core::domain::product::{
    CategoryId, ProductFeature, ProductId, ProductProfile, ProductSimilarity,
};

use crate::repositories::{
    BehaviorRepository, CatalogRepository, ConfigRepository, RepositoryError,
    SqlBehaviorRepository, SqlCatalogRepository, SqlConfigRepository,
};
use crate::DbPool;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SeedSummary {
    pub products: usize,
    pub behavior_events: usize,
    pub similarities: usize,
    pub configs: usize,
    pub blocks: usize,
}

struct ProductSeed {
    id: &'static str,
    category: &'static str,
    price: f64,
    rating: f64,
    popularity: f64,
    features: &'static [(&'static str, f64)],
}

const PRODUCT_SEEDS: &[ProductSeed] = &[
    ProductSeed {
        id: "prod_headphones",
        category: "audio",
        price: 129.0,
        rating: 4.6,
        popularity: 220.0,
        features: &[("battery_hours", 0.8), ("noise_cancelling", 0.9), ("wireless", 1.0)],
    },
    ProductSeed {
        id: "prod_earbuds",
        category: "audio",
        price: 79.0,
        rating: 4.3,
        popularity: 340.0,
        features: &[("battery_hours", 0.5), ("noise_cancelling", 0.6), ("wireless", 1.0)],
    },
    ProductSeed {
        id: "prod_studio_monitors",
        category: "audio",
        price: 399.0,
        rating: 4.8,
        popularity: 60.0,
        features: &[("battery_hours", 0.0), ("noise_cancelling", 0.0), ("wireless", 0.0)],
    },
    ProductSeed {
        id: "prod_dac",
        category: "audio",
        price: 189.0,
        rating: 4.5,
        popularity: 85.0,
        features: &[("battery_hours", 0.2), ("noise_cancelling", 0.0), ("wireless", 0.3)],
    },
    ProductSeed {
        id: "prod_camera",
        category: "photo",
        price: 899.0,
        rating: 4.7,
        popularity: 150.0,
        features: &[("sensor_size", 0.9), ("video", 0.8)],
    },
    ProductSeed {
        id: "prod_tripod",
        category: "photo",
        price: 59.0,
        rating: 4.1,
        popularity: 180.0,
        features: &[("sensor_size", 0.0), ("video", 0.2)],
    },
    ProductSeed {
        id: "prod_lens_50mm",
        category: "photo",
        price: 349.0,
        rating: 4.9,
        popularity: 95.0,
        features: &[("sensor_size", 0.7), ("video", 0.4)],
    },
];

struct BehaviorSeed {
    user: &'static str,
    product: &'static str,
    kind: BehaviorKind,
    age_days: i64,
    rating: Option<f64>,
}

const BEHAVIOR_SEEDS: &[BehaviorSeed] = &[
    BehaviorSeed { user: "user_ana", product: "prod_headphones", kind: BehaviorKind::View, age_days: 9, rating: None },
    BehaviorSeed { user: "user_ana", product: "prod_headphones", kind: BehaviorKind::Purchase, age_days: 8, rating: None },
    BehaviorSeed { user: "user_ana", product: "prod_dac", kind: BehaviorKind::Purchase, age_days: 8, rating: None },
    BehaviorSeed { user: "user_ana", product: "prod_headphones", kind: BehaviorKind::Rate, age_days: 5, rating: Some(5.0) },
    BehaviorSeed { user: "user_bram", product: "prod_headphones", kind: BehaviorKind::Purchase, age_days: 20, rating: None },
    BehaviorSeed { user: "user_bram", product: "prod_dac", kind: BehaviorKind::Purchase, age_days: 19, rating: None },
    BehaviorSeed { user: "user_bram", product: "prod_earbuds", kind: BehaviorKind::View, age_days: 3, rating: None },
    BehaviorSeed { user: "user_cleo", product: "prod_earbuds", kind: BehaviorKind::Purchase, age_days: 2, rating: None },
    BehaviorSeed { user: "user_cleo", product: "prod_earbuds", kind: BehaviorKind::Rate, age_days: 1, rating: Some(4.0) },
    BehaviorSeed { user: "user_cleo", product: "prod_headphones", kind: BehaviorKind::View, age_days: 1, rating: None },
    BehaviorSeed { user: "user_dian", product: "prod_camera", kind: BehaviorKind::Purchase, age_days: 14, rating: None },
    BehaviorSeed { user: "user_dian", product: "prod_tripod", kind: BehaviorKind::Purchase, age_days: 14, rating: None },
    BehaviorSeed { user: "user_dian", product: "prod_lens_50mm", kind: BehaviorKind::View, age_days: 2, rating: None },
    BehaviorSeed { user: "user_elio", product: "prod_camera", kind: BehaviorKind::Purchase, age_days: 6, rating: None },
    BehaviorSeed { user: "user_elio", product: "prod_lens_50mm", kind: BehaviorKind::Purchase, age_days: 5, rating: None },
    BehaviorSeed { user: "user_elio", product: "prod_earbuds", kind: BehaviorKind::View, age_days: 1, rating: None },
];

struct SimilaritySeed {
    product: &'static str,
    similar: &'static str,
    score: f64,
}

const SIMILARITY_SEEDS: &[SimilaritySeed] = &[
    SimilaritySeed { product: "prod_headphones", similar: "prod_earbuds", score: 0.88 },
    SimilaritySeed { product: "prod_headphones", similar: "prod_dac", score: 0.54 },
    SimilaritySeed { product: "prod_headphones", similar: "prod_studio_monitors", score: 0.41 },
    SimilaritySeed { product: "prod_camera", similar: "prod_lens_50mm", score: 0.79 },
    SimilaritySeed { product: "prod_camera", similar: "prod_tripod", score: 0.62 },
];

fn seed_profile(seed: &ProductSeed) -> ProductProfile {
    ProductProfile {
        product_id: ProductId(seed.id.to_string()),
        category_id: Some(CategoryId(seed.category.to_string())),
        price: seed.price,
        rating: seed.rating,
        popularity: seed.popularity,
        active: true,
        features: seed
            .features
            .iter()
            .map(|(key, value)| ProductFeature {
                key: (*key).to_string(),
                value: *value,
                weight: 1.0,
            })
            .collect(),
    }
}

fn seed_config(
    id: &str,
    name: &str,
    algorithm: AlgorithmKind,
    weights: SignalWeights,
    priority: i32,
    now: DateTime<Utc>,
) -> RecommendationConfig {
    RecommendationConfig {
        id: ConfigId(id.to_string()),
        name: name.to_string(),
        algorithm,
        weights,
        decay_factor: 0.9,
        min_score: 0.05,
        max_results: 8,
        cache_ttl_secs: 300,
        enable_caching: true,
        enable_analytics: true,
        priority,
        active: true,
        hybrid: HybridBlend::default(),
        filters: Default::default(),
        created_at: now,
        updated_at: now,
    }
}

fn seed_block(
    id: &str,
    name: &str,
    title: &str,
    max_products: usize,
    cache_duration_secs: u32,
    now: DateTime<Utc>,
) -> RecommendationBlock {
    RecommendationBlock {
        id: BlockId(id.to_string()),
        name: name.to_string(),
        title: Some(title.to_string()),
        config_ids: Vec::new(),
        max_products,
        cache_duration_secs,
        active: true,
        created_at: now,
        updated_at: now,
    }
}

/// Seed the demo dataset. Timestamps are derived from `now` so tests
/// control the clock. Idempotent: reseeding overwrites the same rows.
pub async fn seed_demo_catalog(
    pool: &DbPool,
    now: DateTime<Utc>,
) -> Result<SeedSummary, RepositoryError> {
    let catalog = SqlCatalogRepository::new(pool.clone());
    let behaviors = SqlBehaviorRepository::new(pool.clone());
    let configs = SqlConfigRepository::new(pool.clone());

    let mut summary = SeedSummary::default();

    for seed in PRODUCT_SEEDS {
        catalog.save_profile(&seed_profile(seed)).await?;
        summary.products += 1;
    }

    for (index, seed) in BEHAVIOR_SEEDS.iter().enumerate() {
        let event = BehaviorEvent {
            id: format!("seed-behavior-{index}"),
            user_id: Some(UserId(seed.user.to_string())),
            session_id: format!("seed-session-{}", seed.user),
            product_id: ProductId(seed.product.to_string()),
            category_id: None,
            kind: seed.kind,
            rating: seed.rating,
            metadata: serde_json::Map::new(),
            occurred_at: now - Duration::days(seed.age_days),
        };
        // Replayed seeds must not double-count interaction aggregates.
        if behaviors.append_event(&event).await? {
            behaviors.upsert_interaction(&event).await?;
        }
        summary.behavior_events += 1;
    }

    for seed in SIMILARITY_SEEDS {
        catalog
            .replace_similarities(
                &ProductId(seed.product.to_string()),
                vec![ProductSimilarity {
                    product_id: ProductId(seed.product.to_string()),
                    similar_product_id: ProductId(seed.similar.to_string()),
                    algorithm: AlgorithmKind::ContentBased,
                    similarity_score: seed.score,
                    calculation_data: None,
                    calculated_at: now,
                }],
            )
            .await?;
        summary.similarities += 1;
    }

    let related = seed_config(
        "cfg_related_content",
        "related-content",
        AlgorithmKind::ContentBased,
        SignalWeights { price: 0.05, rating: 0.20, popularity: 0.15, recency: 0.10, category: 0.40, custom: 0.10 },
        10,
        now,
    );
    let also_bought = seed_config(
        "cfg_also_bought",
        "also-bought",
        AlgorithmKind::CrossSell,
        SignalWeights { price: 0.05, rating: 0.15, popularity: 0.30, recency: 0.20, category: 0.30, custom: 0.00 },
        5,
        now,
    );
    let trending = seed_config(
        "cfg_trending",
        "trending",
        AlgorithmKind::Trending,
        SignalWeights { price: 0.00, rating: 0.20, popularity: 0.50, recency: 0.30, category: 0.00, custom: 0.00 },
        10,
        now,
    );
    let for_you = seed_config(
        "cfg_for_you",
        "for-you",
        AlgorithmKind::Hybrid,
        SignalWeights { price: 0.05, rating: 0.20, popularity: 0.25, recency: 0.20, category: 0.25, custom: 0.05 },
        8,
        now,
    );

    for config in [&related, &also_bought, &trending, &for_you] {
        configs.save_config(config.clone()).await?;
        summary.configs += 1;
    }

    let related_block = seed_block(
        "blk_related",
        "related-products",
        "Related products",
        6,
        120,
        now,
    );
    let trending_block =
        seed_block("blk_trending", "trending-now", "Trending now", 8, 300, now);
    let personal_block = seed_block("blk_for_you", "for-you", "Picked for you", 6, 60, now);

    for block in [&related_block, &trending_block, &personal_block] {
        configs.save_block(block.clone()).await?;
        summary.blocks += 1;
    }

    configs.attach_config(&related_block.id, &related.id, 0).await?;
    configs.attach_config(&related_block.id, &also_bought.id, 1).await?;
    configs.attach_config(&trending_block.id, &trending.id, 0).await?;
    configs.attach_config(&personal_block.id, &for_you.id, 0).await?;

    Ok(summary)
}
