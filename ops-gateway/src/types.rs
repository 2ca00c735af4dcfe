//! Canonical records handed to the dashboard.
//!
//! Every field is always present in the serialized form. Normalization fills
//! in `""`, `false`, `0` or an empty collection when the upstream omits a value.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Biller {
    pub biller_id: String,
    pub biller_name: String,
    pub status: String,
    /// Passed through as the upstream sent it (number or string).
    pub number: Value,
    /// Unstructured, passed through.
    pub parameters: Value,
    pub last_updated: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillerParameter {
    pub title: String,
    pub required: bool,
    pub regex: String,
    pub params_id: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub description: String,
    pub log: String,
}

/// Outcome counts for one day of cron executions.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayOutcome {
    pub success: u64,
    pub failed: u64,
}

/// CRIF/equifax hit rate for one day.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateBucket {
    pub success: u64,
    pub freq: u64,
}

/// Daily buckets keyed by `YYYY-MM-DD`.
pub type DailyBuckets<T> = BTreeMap<String, T>;

/// Average per hour label, e.g. `"14:00" -> 1.3`.
pub type HourlyBuckets = BTreeMap<String, f64>;

/// Failure count per error category, in vocabulary order.
pub type ErrorDistribution = IndexMap<String, u64>;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JobPerformance {
    pub job_name: String,
    pub execution: u64,
    /// Formatted percentage, e.g. `"96.4%"`.
    pub success_rate: String,
    pub error: u64,
    /// 3 = excellent, 2 = good, 1 = needs attention.
    pub performance: u64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CronPerformance {
    pub date: DailyBuckets<DayOutcome>,
    pub error: ErrorDistribution,
    pub performance: Vec<JobPerformance>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CronJob {
    pub name: String,
    /// 1 when the job is running, 0 when it failed.
    pub status: u64,
    pub rate: DayOutcome,
    pub schedule: String,
    pub last_run: String,
    pub next_run: String,
    pub duration: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EquifaxInfo {
    pub rate: DailyBuckets<RateBucket>,
    pub avg_response_time_today: HourlyBuckets,
}
