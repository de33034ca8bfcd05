//! Composite scoring over candidate signal dimensions.

use chrono::{DateTime, Utc};

use super::types::{Candidate, RankedProduct, SignalBreakdown};
use crate::domain::config::RecommendationConfig;

/// Blends raw candidate signals into one composite score per candidate.
///
/// Normalization is min-max over the current candidate set, recomputed
/// per request, so scores stay comparable across algorithms whose raw
/// outputs live on incompatible scales.
#[derive(Clone, Copy, Debug, Default)]
pub struct ScoreBlender;

#[derive(Clone, Copy)]
struct Span {
    min: f64,
    max: f64,
}

impl Span {
    fn over(values: impl Iterator<Item = f64>) -> Self {
        let mut span = Span { min: f64::INFINITY, max: f64::NEG_INFINITY };
        for value in values {
            span.min = span.min.min(value);
            span.max = span.max.max(value);
        }
        span
    }

    /// Map a raw value into [0, 1]. A degenerate span (all candidates
    /// share one value) maps to 1.0 when that value is positive so a
    /// lone strong signal still contributes, and to 0.0 otherwise.
    fn normalize(&self, value: f64) -> f64 {
        let width = self.max - self.min;
        if width > f64::EPSILON {
            ((value - self.min) / width).clamp(0.0, 1.0)
        } else if self.max > 0.0 {
            1.0
        } else {
            0.0
        }
    }
}

fn decayed_recency(
    last_activity: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    decay_factor: f64,
) -> f64 {
    match last_activity {
        Some(last) => {
            let age_days = (now - last).num_days().max(0);
            decay_factor.powi(age_days as i32)
        }
        None => 0.0,
    }
}

fn passes_filters(candidate: &Candidate, config: &RecommendationConfig) -> bool {
    let filters = &config.filters;

    if filters.exclude_products.contains(&candidate.product_id) {
        return false;
    }
    if !filters.include_categories.is_empty() {
        match &candidate.category {
            Some(category) if filters.include_categories.contains(category) => {}
            _ => return false,
        }
    }
    if let Some(min_price) = filters.min_price {
        if candidate.signals.price < min_price {
            return false;
        }
    }
    if let Some(max_price) = filters.max_price {
        if candidate.signals.price > max_price {
            return false;
        }
    }

    true
}

impl ScoreBlender {
    /// Filter, normalize, weight, order, truncate.
    ///
    /// The weight vector is scaled to sum 1 so composites land in
    /// [0, 1] regardless of how a config spells its weights; ties break
    /// by ascending product id for determinism.
    pub fn blend(
        &self,
        candidates: Vec<Candidate>,
        config: &RecommendationConfig,
        now: DateTime<Utc>,
    ) -> Vec<RankedProduct> {
        let candidates: Vec<Candidate> =
            candidates.into_iter().filter(|candidate| passes_filters(candidate, config)).collect();
        if candidates.is_empty() {
            return Vec::new();
        }

        let weight_sum = config.weights.sum();
        if weight_sum <= 0.0 {
            return Vec::new();
        }

        let recencies: Vec<f64> = candidates
            .iter()
            .map(|candidate| decayed_recency(candidate.last_activity, now, config.decay_factor))
            .collect();

        let price_span = Span::over(candidates.iter().map(|c| c.signals.price));
        let rating_span = Span::over(candidates.iter().map(|c| c.signals.rating));
        let popularity_span = Span::over(candidates.iter().map(|c| c.signals.popularity));
        let recency_span = Span::over(recencies.iter().copied());
        let affinity_span = Span::over(candidates.iter().map(|c| c.signals.category_affinity));
        let custom_span = Span::over(candidates.iter().map(|c| c.signals.custom));

        let weights = config.weights;
        let mut ranked: Vec<RankedProduct> = candidates
            .into_iter()
            .zip(recencies)
            .map(|(candidate, recency_raw)| {
                let breakdown = SignalBreakdown {
                    price: price_span.normalize(candidate.signals.price),
                    rating: rating_span.normalize(candidate.signals.rating),
                    popularity: popularity_span.normalize(candidate.signals.popularity),
                    recency: recency_span.normalize(recency_raw),
                    category_affinity: affinity_span.normalize(candidate.signals.category_affinity),
                    custom: custom_span.normalize(candidate.signals.custom),
                };

                let score = (weights.price * breakdown.price
                    + weights.rating * breakdown.rating
                    + weights.popularity * breakdown.popularity
                    + weights.recency * breakdown.recency
                    + weights.category * breakdown.category_affinity
                    + weights.custom * breakdown.custom)
                    / weight_sum;

                RankedProduct {
                    product_id: candidate.product_id,
                    score,
                    algorithm: config.algorithm,
                    config_id: config.id.clone(),
                    raw_score: candidate.raw_score,
                    signals: breakdown,
                }
            })
            .filter(|ranked| ranked.score >= config.min_score)
            .collect();

        ranked.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.product_id.cmp(&b.product_id))
        });
        ranked.truncate(config.max_results);
        ranked
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::ScoreBlender;
    use crate::domain::config::{RecommendationConfig, SignalWeights};
    use crate::domain::product::{CategoryId, ProductId};
    use crate::ranking::types::{Candidate, SignalValues};

    fn config_with_weights(weights: SignalWeights) -> RecommendationConfig {
        let mut config = RecommendationConfig::popularity_fallback(Utc::now());
        config.weights = weights;
        config.min_score = 0.0;
        config.max_results = 10;
        config
    }

    fn popularity_only() -> SignalWeights {
        SignalWeights { price: 0.0, rating: 0.0, popularity: 1.0, recency: 0.0, category: 0.0, custom: 0.0 }
    }

    fn candidate(id: &str, popularity: f64) -> Candidate {
        Candidate {
            product_id: ProductId(id.to_string()),
            category: Some(CategoryId("audio".to_string())),
            raw_score: popularity,
            signals: SignalValues { popularity, ..SignalValues::default() },
            last_activity: None,
        }
    }

    #[test]
    fn higher_popularity_ranks_first_under_popularity_only_weights() {
        let config = config_with_weights(popularity_only());
        let ranked = ScoreBlender.blend(
            vec![candidate("p-low", 5.0), candidate("p-high", 10.0)],
            &config,
            Utc::now(),
        );

        let ids: Vec<&str> = ranked.iter().map(|r| r.product_id.0.as_str()).collect();
        assert_eq!(ids, vec!["p-high", "p-low"]);
    }

    #[test]
    fn min_score_drops_weak_candidates() {
        // Three popularity values normalize to 1.0 / 0.0 / 0.5; a 0.5
        // threshold keeps the top and the middle candidate only.
        let mut config = config_with_weights(popularity_only());
        config.min_score = 0.5;

        let ranked = ScoreBlender.blend(
            vec![candidate("a", 10.0), candidate("b", 0.0), candidate("c", 5.0)],
            &config,
            Utc::now(),
        );

        let ids: Vec<&str> = ranked.iter().map(|r| r.product_id.0.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
    }

    #[test]
    fn ties_break_by_ascending_product_id() {
        let config = config_with_weights(popularity_only());
        let ranked = ScoreBlender.blend(
            vec![candidate("zeta", 7.0), candidate("alpha", 7.0), candidate("mid", 7.0)],
            &config,
            Utc::now(),
        );

        let ids: Vec<&str> = ranked.iter().map(|r| r.product_id.0.as_str()).collect();
        assert_eq!(ids, vec!["alpha", "mid", "zeta"]);
    }

    #[test]
    fn result_is_truncated_to_max_results() {
        let mut config = config_with_weights(popularity_only());
        config.max_results = 2;

        let ranked = ScoreBlender.blend(
            vec![candidate("a", 1.0), candidate("b", 2.0), candidate("c", 3.0)],
            &config,
            Utc::now(),
        );

        assert_eq!(ranked.len(), 2);
    }

    #[test]
    fn raising_a_weighted_signal_never_lowers_the_score() {
        let config = config_with_weights(SignalWeights {
            price: 0.0,
            rating: 0.5,
            popularity: 0.5,
            recency: 0.0,
            category: 0.0,
            custom: 0.0,
        });

        let base = vec![
            Candidate {
                signals: SignalValues { rating: 3.0, popularity: 10.0, ..SignalValues::default() },
                ..candidate("a", 0.0)
            },
            Candidate {
                signals: SignalValues { rating: 4.0, popularity: 5.0, ..SignalValues::default() },
                ..candidate("b", 0.0)
            },
        ];
        let mut boosted = base.clone();
        boosted[0].signals.rating = 5.0;

        let now = Utc::now();
        let score_of = |ranked: &[crate::ranking::types::RankedProduct], id: &str| {
            ranked.iter().find(|r| r.product_id.0 == id).expect("ranked").score
        };

        let before = ScoreBlender.blend(base, &config, now);
        let after = ScoreBlender.blend(boosted, &config, now);

        assert!(score_of(&after, "a") >= score_of(&before, "a"));
    }

    #[test]
    fn recency_decays_with_age() {
        let now = Utc.with_ymd_and_hms(2026, 8, 4, 0, 0, 0).unwrap();
        let mut config = config_with_weights(SignalWeights {
            price: 0.0,
            rating: 0.0,
            popularity: 0.0,
            recency: 1.0,
            category: 0.0,
            custom: 0.0,
        });
        config.decay_factor = 0.5;

        let fresh = Candidate { last_activity: Some(now - Duration::days(1)), ..candidate("fresh", 0.0) };
        let stale = Candidate { last_activity: Some(now - Duration::days(10)), ..candidate("stale", 0.0) };

        let ranked = ScoreBlender.blend(vec![stale, fresh], &config, now);
        let ids: Vec<&str> = ranked.iter().map(|r| r.product_id.0.as_str()).collect();
        assert_eq!(ids, vec!["fresh", "stale"]);
    }

    #[test]
    fn filters_drop_excluded_and_out_of_category_candidates() {
        let mut config = config_with_weights(popularity_only());
        config.filters.exclude_products.push(ProductId("banned".to_string()));
        config.filters.include_categories.push(CategoryId("audio".to_string()));

        let mut foreign = candidate("foreign", 9.0);
        foreign.category = Some(CategoryId("garden".to_string()));

        let ranked = ScoreBlender.blend(
            vec![candidate("banned", 10.0), foreign, candidate("kept", 5.0)],
            &config,
            Utc::now(),
        );

        let ids: Vec<&str> = ranked.iter().map(|r| r.product_id.0.as_str()).collect();
        assert_eq!(ids, vec!["kept"]);
    }

    #[test]
    fn price_bounds_filter_candidates() {
        let mut config = config_with_weights(popularity_only());
        config.filters.min_price = Some(20.0);
        config.filters.max_price = Some(80.0);

        let priced = |id: &str, price: f64| Candidate {
            signals: SignalValues { price, popularity: 1.0, ..SignalValues::default() },
            ..candidate(id, 0.0)
        };

        let ranked = ScoreBlender.blend(
            vec![priced("cheap", 5.0), priced("fits", 50.0), priced("dear", 200.0)],
            &config,
            Utc::now(),
        );

        let ids: Vec<&str> = ranked.iter().map(|r| r.product_id.0.as_str()).collect();
        assert_eq!(ids, vec!["fits"]);
    }
}
