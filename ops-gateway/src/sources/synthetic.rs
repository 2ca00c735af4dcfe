//! Deterministic cron analytics generated from the requested dates.
//!
//! The same range always produces the same numbers, so dashboards built
//! against this source are stable across reloads.

use super::CronPerformanceSource;
use crate::dates::DateRange;
use crate::types::{CronPerformance, DailyBuckets, DayOutcome, ErrorDistribution, JobPerformance};
use crate::upstream::UpstreamError;
use async_trait::async_trait;

/// Error categories with their share of failures. `Other` takes the remainder.
const ERROR_WEIGHTS: &[(&str, f64)] = &[
    ("API Timeout", 0.35),
    ("Invalid Parameters", 0.28),
    ("Network Error", 0.20),
    ("Authentication", 0.12),
];
const OTHER_ERRORS: &str = "Other";

/// One row is generated per day, so the window is capped.
pub const MAX_DAYS: u64 = 366;

/// Job name, base success rate, wobble amplitude.
const JOBS: &[(&str, f64, f64)] = &[
    ("HDFC Bill Fetch", 0.965, 0.02),
    ("ICICI Bill Fetch", 0.952, 0.02),
    ("SBI Bill Fetch", 0.86, 0.04),
    ("Notification Sender", 1.0, 0.02),
    ("WhatsApp Campaign", 1.0, 0.02),
];

pub struct SyntheticCronPerformance;

#[async_trait]
impl CronPerformanceSource for SyntheticCronPerformance {
    async fn performance(&self, range: DateRange) -> Result<CronPerformance, UpstreamError> {
        Ok(generate(&range))
    }

    fn max_days(&self) -> Option<u64> {
        Some(MAX_DAYS)
    }
}

pub fn generate(range: &DateRange) -> CronPerformance {
    let days = range.days();
    let date = daily_series(&days);
    let total_failed = date.values().map(|day| day.failed).sum();

    CronPerformance {
        date,
        error: distribute_failures(total_failed),
        performance: job_table(&days),
    }
}

/// 32-bit FNV-1a over UTF-16 code units, mapped to `[0, 1)`.
fn seedish(input: &str) -> f64 {
    let hash = input.encode_utf16().fold(2_166_136_261u32, |hash, unit| {
        (hash ^ u32::from(unit)).wrapping_mul(16_777_619)
    });
    f64::from(hash) / 4_294_967_296.0
}

fn round(x: f64) -> u64 {
    if x > 0.0 { x.round() as u64 } else { 0 }
}

fn daily_series(days: &[String]) -> DailyBuckets<DayOutcome> {
    days.iter()
        .map(|day| {
            let cap = round(15.0 + seedish(day) * 25.0).max(5);
            let total = round(90.0 + seedish(&format!("{day}t")) * 40.0);
            let failed = round(seedish(&format!("{day}f")) * 0.18 * total as f64).min(cap);
            let outcome = DayOutcome {
                success: total - failed,
                failed,
            };
            (day.clone(), outcome)
        })
        .collect()
}

/// Splits `total` across the error vocabulary. The counts always sum to `total`.
pub fn distribute_failures(total: u64) -> ErrorDistribution {
    let mut distribution = ErrorDistribution::new();
    let mut assigned = 0;

    for (label, weight) in ERROR_WEIGHTS {
        let share = round(total as f64 * weight).min(total - assigned);
        assigned += share;
        distribution.insert((*label).to_string(), share);
    }
    distribution.insert(OTHER_ERRORS.to_string(), total - assigned);

    distribution
}

fn job_table(days: &[String]) -> Vec<JobPerformance> {
    let joined = days.join("|");

    JOBS.iter()
        .map(|(name, base, amplitude)| {
            let execution = round(12.0 + seedish(&format!("{joined}{name}")) * 40.0).max(5);
            let wobble = (seedish(name) - 0.5) * amplitude;
            let rate = (base + wobble).clamp(0.6, 1.0);
            let performance = if rate >= 0.95 {
                3
            } else if rate >= 0.90 {
                2
            } else {
                1
            };

            JobPerformance {
                job_name: (*name).to_string(),
                execution,
                success_rate: format!("{:.1}%", rate * 100.0),
                error: round(execution as f64 * (1.0 - rate)),
                performance,
            }
        })
        .collect()
}
