//! Request DTOs with validation.

use std::collections::HashMap;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use tenantry_core::types::filter::{FilterValue, Filters};
use tenantry_entity::metrics::MetricsInterval;

/// Query keys consumed by pagination rather than treated as filters.
const PAGINATION_KEYS: [&str; 2] = ["skip", "take"];

/// Pagination for resource listings. Without `take` everything after `skip` is returned.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct ListQuery {
    #[serde(default)]
    #[validate(range(min = 0))]
    pub skip: i64,
    #[validate(range(min = 0, max = 1000))]
    pub take: Option<i64>,
}

/// Turns the remaining query parameters into equality filters.
///
/// `true`/`false` become booleans and `null` matches absent fields; everything
/// else is compared as a string.
pub fn filters_from_query(params: HashMap<String, String>) -> Filters {
    params
        .into_iter()
        .filter(|(key, _)| !PAGINATION_KEYS.contains(&key.as_str()))
        .map(|(key, raw)| {
            let value = match raw.as_str() {
                "true" => FilterValue::Bool(true),
                "false" => FilterValue::Bool(false),
                "null" => FilterValue::Null,
                _ => FilterValue::String(raw),
            };
            (key, value)
        })
        .collect()
}

/// Time window for metrics history. Defaults to the last 24 hours.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricsRangeQuery {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    /// Bucket width for aggregation. Defaults to hourly.
    pub interval: Option<MetricsInterval>,
}

impl MetricsRangeQuery {
    pub fn window(&self, now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
        let to = self.to.unwrap_or(now);
        let from = self.from.unwrap_or(to - TimeDelta::hours(24));
        (from, to)
    }

    pub fn interval(&self) -> MetricsInterval {
        self.interval.unwrap_or(MetricsInterval::Hour)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct LatestQuery {
    #[serde(default = "default_latest_limit")]
    #[validate(range(min = 1, max = 1000))]
    pub limit: u32,
}

fn default_latest_limit() -> u32 {
    10
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_take_bounds() {
        let ok = ListQuery {
            skip: 0,
            take: Some(1000),
        };
        assert!(ok.validate().is_ok());

        let too_many = ListQuery {
            skip: 0,
            take: Some(1001),
        };
        assert!(too_many.validate().is_err());

        let negative = ListQuery {
            skip: -1,
            take: None,
        };
        assert!(negative.validate().is_err());
    }

    #[test]
    fn test_filters_skip_pagination_keys() {
        let params = HashMap::from([
            ("skip".to_string(), "10".to_string()),
            ("name".to_string(), "Ana".to_string()),
            ("active".to_string(), "true".to_string()),
        ]);
        let filters = filters_from_query(params);
        assert_eq!(filters, Filters::new().with("name", "Ana").with("active", true));
    }

    #[test]
    fn test_metrics_window_defaults_to_last_day() {
        let now = Utc::now();
        let (from, to) = MetricsRangeQuery::default().window(now);
        assert_eq!(to, now);
        assert_eq!(to - from, TimeDelta::hours(24));
        assert_eq!(MetricsRangeQuery::default().interval(), MetricsInterval::Hour);
    }
}
