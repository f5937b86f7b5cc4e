pub mod api;
pub mod error;
pub mod metadata;
pub mod retry;

use chrono::prelude::*;
use std::collections::BTreeMap;

/// The domain prefix reserved for user-defined metrics.
pub const CUSTOM_METRIC_DOMAIN: &str = "custom.cloudmonitoring.googleapis.com";

/// The full name of the shirt inventory metric.
pub const CUSTOM_METRIC_NAME: &str = "custom.cloudmonitoring.googleapis.com/shirt_inventory";

/// The metric's label keys, in declaration order.
pub const LABEL_KEYS: [&str; 2] = ["color", "size"];

/// The current time formatted per RFC 3339 (UTC, seconds precision).
pub fn now_rfc3339() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

/// The label values identifying one time series of the custom metric.
///
/// The same set must be used for a write and the read that confirms it,
/// so it is constructed once per run and never mutated.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LabelSet {
    color: String,
    size: String,
}

impl LabelSet {
    pub fn new(color: &str, size: &str) -> Self {
        LabelSet {
            color: color.to_string(),
            size: size.to_string(),
        }
    }

    /// Label values keyed for a timeseries write.
    ///
    /// e.g. "custom.cloudmonitoring.googleapis.com/color" => "yellow"
    pub fn write_labels(&self) -> BTreeMap<String, String> {
        let mut labels = BTreeMap::new();
        labels.insert(
            format!("{}/color", CUSTOM_METRIC_DOMAIN),
            self.color.clone(),
        );
        labels.insert(format!("{}/size", CUSTOM_METRIC_DOMAIN), self.size.clone());
        labels
    }

    /// Equality filters selecting the same time series on a read.
    ///
    /// e.g. "custom.cloudmonitoring.googleapis.com/color==yellow"
    pub fn query_filters(&self) -> Vec<String> {
        vec![
            format!("{}/color=={}", CUSTOM_METRIC_DOMAIN, self.color),
            format!("{}/size=={}", CUSTOM_METRIC_DOMAIN, self.size),
        ]
    }
}
