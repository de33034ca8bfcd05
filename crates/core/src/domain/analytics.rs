use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::behavior::UserId;
use super::block::BlockId;
use super::config::ConfigId;
use super::product::ProductId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalyticsAction {
    Impression,
    Click,
    Conversion,
}

impl AnalyticsAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalyticsAction::Impression => "impression",
            AnalyticsAction::Click => "click",
            AnalyticsAction::Conversion => "conversion",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "impression" => Some(AnalyticsAction::Impression),
            "click" => Some(AnalyticsAction::Click),
            "conversion" => Some(AnalyticsAction::Conversion),
            _ => None,
        }
    }
}

/// One observed outcome row. Append-only; aggregation is computed, never
/// stored back.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsEvent {
    pub id: String,
    pub block_id: BlockId,
    pub config_id: ConfigId,
    pub user_id: Option<UserId>,
    pub product_id: Option<ProductId>,
    pub action: AnalyticsAction,
    pub metrics: BTreeMap<String, f64>,
    pub event_date: NaiveDate,
    pub recorded_at: DateTime<Utc>,
}

/// Click-through rate as a percentage. Zero views means zero, not NaN.
pub fn ctr(clicks: u64, views: u64) -> f64 {
    if views == 0 {
        0.0
    } else {
        clicks as f64 / views as f64 * 100.0
    }
}

/// Conversion rate as a percentage of clicks.
pub fn conversion_rate(conversions: u64, clicks: u64) -> f64 {
    if clicks == 0 {
        0.0
    } else {
        conversions as f64 / clicks as f64 * 100.0
    }
}

/// One day of aggregated analytics for a block.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DailyBlockStats {
    pub date: NaiveDate,
    pub views: u64,
    pub clicks: u64,
    pub conversions: u64,
}

impl DailyBlockStats {
    pub fn ctr(&self) -> f64 {
        ctr(self.clicks, self.views)
    }

    pub fn conversion_rate(&self) -> f64 {
        conversion_rate(self.conversions, self.clicks)
    }
}

/// Display-level rollup over a reporting window: request volume and the
/// mean of the daily rates.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BlockPerformance {
    pub total_requests: u64,
    pub total_clicks: u64,
    pub total_conversions: u64,
    pub avg_ctr: f64,
    pub avg_conversion_rate: f64,
}

impl BlockPerformance {
    pub fn from_daily(days: &[DailyBlockStats]) -> Self {
        if days.is_empty() {
            return Self {
                total_requests: 0,
                total_clicks: 0,
                total_conversions: 0,
                avg_ctr: 0.0,
                avg_conversion_rate: 0.0,
            };
        }

        let total_requests = days.iter().map(|day| day.views).sum();
        let total_clicks = days.iter().map(|day| day.clicks).sum();
        let total_conversions = days.iter().map(|day| day.conversions).sum();
        let avg_ctr = days.iter().map(DailyBlockStats::ctr).sum::<f64>() / days.len() as f64;
        let avg_conversion_rate =
            days.iter().map(DailyBlockStats::conversion_rate).sum::<f64>() / days.len() as f64;

        Self { total_requests, total_clicks, total_conversions, avg_ctr, avg_conversion_rate }
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::{conversion_rate, ctr, BlockPerformance, DailyBlockStats};

    fn day(ordinal: u32, views: u64, clicks: u64, conversions: u64) -> DailyBlockStats {
        DailyBlockStats {
            date: NaiveDate::from_ymd_opt(2026, 8, ordinal).expect("valid date"),
            views,
            clicks,
            conversions,
        }
    }

    #[test]
    fn rates_are_zero_when_denominator_is_zero() {
        assert_eq!(ctr(5, 0), 0.0);
        assert_eq!(conversion_rate(3, 0), 0.0);
    }

    #[test]
    fn rates_stay_inside_percentage_bounds() {
        assert!((ctr(50, 200) - 25.0).abs() < 1e-9);
        assert!((conversion_rate(10, 40) - 25.0).abs() < 1e-9);
        assert_eq!(ctr(100, 100), 100.0);
        assert_eq!(conversion_rate(0, 10), 0.0);
    }

    #[test]
    fn performance_is_mean_of_daily_rates() {
        let days = vec![day(1, 100, 10, 2), day(2, 200, 10, 5)];
        let perf = BlockPerformance::from_daily(&days);

        assert_eq!(perf.total_requests, 300);
        assert_eq!(perf.total_clicks, 20);
        assert_eq!(perf.total_conversions, 7);
        // Daily CTRs are 10% and 5%; the rollup is their mean.
        assert!((perf.avg_ctr - 7.5).abs() < 1e-9);
        // Daily conversion rates are 20% and 50%.
        assert!((perf.avg_conversion_rate - 35.0).abs() < 1e-9);
    }

    #[test]
    fn empty_window_yields_zeroes() {
        let perf = BlockPerformance::from_daily(&[]);
        assert_eq!(perf.total_requests, 0);
        assert_eq!(perf.avg_ctr, 0.0);
    }
}
