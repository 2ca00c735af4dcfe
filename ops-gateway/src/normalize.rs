//! Shape normalization for loosely structured upstream payloads.
//!
//! Each canonical field has an ordered alias table. The canonical name comes
//! first so normalizing an already-canonical record is a no-op. The first key
//! that is present and non-null wins. Missing values fall back to `""`,
//! `false`, `0` or an empty collection, never null.
//!
//! Field-level normalizers work on a flat object (or an array of them). Finding
//! the list or object inside an upstream envelope is done separately with
//! [`find_at`].

use crate::types::{
    Biller, BillerParameter, CronJob, CronPerformance, DailyBuckets, DayOutcome,
    ErrorDistribution, EquifaxInfo, HistoryEntry, HourlyBuckets, JobPerformance, RateBucket,
};
use serde_json::Value;

pub type Aliases = &'static [&'static str];

pub mod aliases {
    use super::Aliases;

    pub mod biller {
        use super::Aliases;
        pub const ID: Aliases = &["billerId", "biller_id", "id", "code"];
        pub const NAME: Aliases = &["billerName", "biller_name", "name", "title"];
        pub const STATUS: Aliases = &["status", "state"];
        pub const NUMBER: Aliases = &["number", "count", "total"];
        pub const PARAMETERS: Aliases = &["parameters", "params"];
        pub const LAST_UPDATED: Aliases = &[
            "lastUpdated",
            "late_updated",
            "last_updated",
            "updatedAt",
            "updated_at",
        ];
    }

    pub mod parameter {
        use super::Aliases;
        pub const TITLE: Aliases = &["title", "name"];
        pub const REQUIRED: Aliases = &["required", "is_required"];
        pub const REGEX: Aliases = &["regex", "pattern"];
        pub const PARAMS_ID: Aliases = &["paramsId", "id"];
    }

    pub mod history {
        use super::Aliases;
        pub const DESCRIPTION: Aliases = &["description", "message"];
        pub const LOG: Aliases = &["log", "details"];
    }

    pub mod rate {
        use super::Aliases;
        pub const DATE_KEY: Aliases = &["date", "date_str", "day", "d"];
        pub const SUCCESS: Aliases = &["success", "ok"];
        pub const FREQ: Aliases = &["freq", "count", "total"];
    }

    pub mod hourly {
        use super::Aliases;
        pub const HOUR_KEY: Aliases = &["hour", "h", "bucket"];
        pub const VALUE: Aliases = &["avg", "value", "ms", "seconds"];
    }

    pub mod cron {
        use super::Aliases;
        pub const DAYS: Aliases = &["date", "daily", "dates"];
        pub const ERRORS: Aliases = &["error", "errors", "error_distribution"];
        pub const PERFORMANCE: Aliases = &["performance", "jobs"];
        pub const SUCCESS: Aliases = &["success", "ok"];
        pub const FAILED: Aliases = &["failed", "fail", "errors", "error"];
        pub const ERROR_LABEL: Aliases = &["label", "name", "category", "type"];
        pub const ERROR_COUNT: Aliases = &["count", "value", "total"];
    }

    pub mod job {
        use super::Aliases;
        pub const NAME: Aliases = &["name", "job_name", "jobName"];
        pub const STATUS: Aliases = &["status", "state"];
        pub const RATE: Aliases = &["rate", "stats"];
        pub const SCHEDULE: Aliases = &["schedule", "cron"];
        pub const LAST_RUN: Aliases = &["last_run", "lastRun"];
        pub const NEXT_RUN: Aliases = &["next_run", "nextRun"];
        pub const DURATION: Aliases = &["duration"];
    }

    pub mod performance {
        use super::Aliases;
        pub const JOB_NAME: Aliases = &["job_name", "jobName", "name"];
        pub const EXECUTION: Aliases = &["execution", "executions", "total"];
        pub const SUCCESS_RATE: Aliases = &["success_rate", "successRate", "rate"];
        pub const ERROR: Aliases = &["error", "errors", "failed"];
        pub const SCORE: Aliases = &["performance", "score"];
    }

    pub mod equifax {
        use super::Aliases;
        pub const RATE: Aliases = &["rate"];
        pub const AVG_RESPONSE_TIME: Aliases = &["avgResponseTimeToday"];
    }
}

/// Returns the first alias that is present and not null.
pub fn pick<'a>(raw: &'a Value, aliases: &[&str]) -> Option<&'a Value> {
    let object = raw.as_object()?;
    aliases
        .iter()
        .filter_map(|key| object.get(*key))
        .find(|value| !value.is_null())
}

/// Returns the first value found at any of `paths` that satisfies `accept`.
///
/// An empty path refers to `raw` itself, so `&[&[], &["billers"]]` accepts
/// both a bare payload and one wrapped in `{ "billers": ... }`.
pub fn find_at<'a>(
    raw: &'a Value,
    paths: &[&[&str]],
    accept: fn(&Value) -> bool,
) -> Option<&'a Value> {
    paths.iter().find_map(|path| {
        let found = path
            .iter()
            .try_fold(raw, |current, key| current.as_object()?.get(*key))?;
        accept(found).then_some(found)
    })
}

pub fn coerce_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

pub fn coerce_f64(value: &Value) -> f64 {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    };
    parsed.filter(|f| f.is_finite()).unwrap_or(0.0)
}

/// Non-negative integer count. Fractions are rounded, negatives clamp to 0.
pub fn coerce_count(value: &Value) -> u64 {
    if let Some(n) = value.as_u64() {
        return n;
    }
    let f = coerce_f64(value);
    if f > 0.0 { f.round() as u64 } else { 0 }
}

pub fn string_field(raw: &Value, aliases: &[&str]) -> String {
    pick(raw, aliases).map(coerce_string).unwrap_or_default()
}

pub fn bool_field(raw: &Value, aliases: &[&str]) -> bool {
    pick(raw, aliases).is_some_and(truthy)
}

pub fn count_field(raw: &Value, aliases: &[&str]) -> u64 {
    pick(raw, aliases).map(coerce_count).unwrap_or(0)
}

pub fn f64_field(raw: &Value, aliases: &[&str]) -> f64 {
    pick(raw, aliases).map(coerce_f64).unwrap_or(0.0)
}

/// Converts one loosely shaped upstream record into its canonical form.
pub trait Normalize: Sized {
    fn normalize(raw: &Value) -> Self;
}

/// Normalizes every element of an array. Anything else yields an empty list.
pub fn normalize_list<T: Normalize>(raw: Option<&Value>) -> Vec<T> {
    match raw {
        Some(Value::Array(items)) => items.iter().map(T::normalize).collect(),
        _ => Vec::new(),
    }
}

/// Builds date/hour keyed buckets from either shape the upstream uses:
/// an object keyed by bucket, or an array of rows carrying their own key.
/// Rows without a key are skipped.
pub fn keyed_buckets<T>(
    raw: Option<&Value>,
    key_aliases: &[&str],
    from_entry: fn(&Value) -> T,
    from_row: fn(&Value) -> T,
) -> DailyBuckets<T> {
    match raw {
        Some(Value::Object(entries)) => entries
            .iter()
            .map(|(key, value)| (key.clone(), from_entry(value)))
            .collect(),
        Some(Value::Array(rows)) => rows
            .iter()
            .filter_map(|row| {
                let key = string_field(row, key_aliases);
                (!key.is_empty()).then(|| (key, from_row(row)))
            })
            .collect(),
        _ => DailyBuckets::new(),
    }
}

impl Biller {
    /// `now` stands in for a missing or empty `lastUpdated`.
    pub fn normalize_at(raw: &Value, now: &str) -> Self {
        use aliases::biller::*;

        let last_updated = string_field(raw, LAST_UPDATED);
        Biller {
            biller_id: string_field(raw, ID),
            biller_name: string_field(raw, NAME),
            status: string_field(raw, STATUS),
            number: pick(raw, NUMBER)
                .cloned()
                .unwrap_or_else(|| Value::String(String::new())),
            parameters: pick(raw, PARAMETERS)
                .cloned()
                .unwrap_or_else(|| Value::String(String::new())),
            last_updated: if last_updated.is_empty() {
                now.to_string()
            } else {
                last_updated
            },
        }
    }
}

impl Normalize for BillerParameter {
    fn normalize(raw: &Value) -> Self {
        use aliases::parameter::*;

        BillerParameter {
            title: string_field(raw, TITLE),
            required: bool_field(raw, REQUIRED),
            regex: string_field(raw, REGEX),
            params_id: string_field(raw, PARAMS_ID),
        }
    }
}

impl Normalize for HistoryEntry {
    fn normalize(raw: &Value) -> Self {
        use aliases::history::*;

        HistoryEntry {
            description: string_field(raw, DESCRIPTION),
            log: string_field(raw, LOG),
        }
    }
}

impl Normalize for RateBucket {
    fn normalize(raw: &Value) -> Self {
        use aliases::rate::*;

        RateBucket {
            success: count_field(raw, SUCCESS),
            freq: count_field(raw, FREQ),
        }
    }
}

impl Normalize for DayOutcome {
    fn normalize(raw: &Value) -> Self {
        use aliases::cron::*;

        DayOutcome {
            success: count_field(raw, SUCCESS),
            failed: count_field(raw, FAILED),
        }
    }
}

impl Normalize for JobPerformance {
    fn normalize(raw: &Value) -> Self {
        use aliases::performance::*;

        let success_rate = match pick(raw, SUCCESS_RATE) {
            Some(Value::Number(n)) => {
                let rate = n.as_f64().unwrap_or(0.0);
                let percent = if rate <= 1.0 { rate * 100.0 } else { rate };
                format!("{percent:.1}%")
            }
            Some(other) => coerce_string(other),
            None => String::new(),
        };

        JobPerformance {
            job_name: string_field(raw, JOB_NAME),
            execution: count_field(raw, EXECUTION),
            success_rate,
            error: count_field(raw, ERROR),
            performance: count_field(raw, SCORE),
        }
    }
}

fn job_status(value: &Value) -> u64 {
    let running = match value {
        Value::String(s) => {
            let s = s.trim();
            ["running", "active", "success"]
                .iter()
                .any(|word| s.eq_ignore_ascii_case(word))
                || coerce_count(value) > 0
        }
        other => truthy(other),
    };
    u64::from(running)
}

impl Normalize for CronJob {
    fn normalize(raw: &Value) -> Self {
        use aliases::job::*;

        CronJob {
            name: string_field(raw, NAME),
            status: pick(raw, STATUS).map(job_status).unwrap_or(0),
            rate: pick(raw, RATE).map(DayOutcome::normalize).unwrap_or_default(),
            schedule: string_field(raw, SCHEDULE),
            last_run: string_field(raw, LAST_RUN),
            next_run: string_field(raw, NEXT_RUN),
            duration: string_field(raw, DURATION),
        }
    }
}

fn error_distribution(raw: Option<&Value>) -> ErrorDistribution {
    use aliases::cron::*;

    match raw {
        Some(Value::Object(entries)) => entries
            .iter()
            .map(|(label, count)| (label.clone(), coerce_count(count)))
            .collect(),
        Some(Value::Array(rows)) => rows
            .iter()
            .filter_map(|row| {
                let label = string_field(row, ERROR_LABEL);
                (!label.is_empty()).then(|| (label, count_field(row, ERROR_COUNT)))
            })
            .collect(),
        _ => ErrorDistribution::new(),
    }
}

impl Normalize for CronPerformance {
    fn normalize(raw: &Value) -> Self {
        use aliases::cron::*;

        CronPerformance {
            date: keyed_buckets(
                pick(raw, DAYS),
                aliases::rate::DATE_KEY,
                DayOutcome::normalize,
                DayOutcome::normalize,
            ),
            error: error_distribution(pick(raw, ERRORS)),
            performance: normalize_list(pick(raw, PERFORMANCE)),
        }
    }
}

impl Normalize for EquifaxInfo {
    fn normalize(raw: &Value) -> Self {
        use aliases::equifax::*;

        let rate: DailyBuckets<RateBucket> = keyed_buckets(
            pick(raw, RATE),
            aliases::rate::DATE_KEY,
            RateBucket::normalize,
            RateBucket::normalize,
        );
        let avg_response_time_today: HourlyBuckets = keyed_buckets(
            pick(raw, AVG_RESPONSE_TIME),
            aliases::hourly::HOUR_KEY,
            coerce_f64,
            |row| f64_field(row, aliases::hourly::VALUE),
        );

        EquifaxInfo {
            rate,
            avg_response_time_today,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const NOW: &str = "2025-08-14T10:00:00.000Z";

    #[test]
    fn test_pick_prefers_first_present_non_null() {
        let raw = json!({"billerName": null, "biller_name": "Alias", "name": "Later"});
        assert_eq!(pick(&raw, aliases::biller::NAME), Some(&json!("Alias")));
        assert_eq!(pick(&json!([1, 2]), aliases::biller::NAME), None);
        assert_eq!(pick(&json!({}), aliases::biller::NAME), None);
    }

    #[test]
    fn test_find_at_envelopes() {
        let paths: &[&[&str]] = &[&[], &["billers"], &["response", "billers"]];

        let bare = json!([{"id": 1}]);
        let named = json!({"billers": [{"id": 2}]});
        let nested = json!({"response": {"billers": [{"id": 3}]}});
        let neither = json!({"response": {"items": []}});

        assert_eq!(find_at(&bare, paths, Value::is_array), Some(&bare));
        assert_eq!(
            find_at(&named, paths, Value::is_array),
            Some(&json!([{"id": 2}]))
        );
        assert_eq!(
            find_at(&nested, paths, Value::is_array),
            Some(&json!([{"id": 3}]))
        );
        assert_eq!(find_at(&neither, paths, Value::is_array), None);
    }

    #[test]
    fn test_biller_aliases() {
        let raw = json!({"biller_id": "B1", "name": "Test Bank", "state": "active"});
        let biller = Biller::normalize_at(&raw, NOW);

        assert_eq!(
            serde_json::to_value(&biller).unwrap(),
            json!({
                "billerId": "B1",
                "billerName": "Test Bank",
                "status": "active",
                "number": "",
                "parameters": "",
                "lastUpdated": NOW,
            })
        );
    }

    #[test]
    fn test_biller_coerces_numeric_ids() {
        let raw = json!({"id": 42, "title": "Power Co", "count": 7, "updated_at": ""});
        let biller = Biller::normalize_at(&raw, NOW);

        assert_eq!(biller.biller_id, "42");
        assert_eq!(biller.biller_name, "Power Co");
        assert_eq!(biller.number, json!(7));
        // An empty timestamp counts as missing
        assert_eq!(biller.last_updated, NOW);
    }

    #[test]
    fn test_canonical_records_are_unchanged() {
        let biller = json!({
            "billerId": "X",
            "billerName": "Y",
            "status": "inactive",
            "number": 12,
            "parameters": [{"title": "Consumer No"}],
            "lastUpdated": "2025-01-01T00:00:00.000Z",
        });
        assert_eq!(
            serde_json::to_value(Biller::normalize_at(&biller, NOW)).unwrap(),
            biller
        );

        let parameter =
            json!({"title": "Account", "required": true, "regex": "^[0-9]+$", "paramsId": "p1"});
        assert_eq!(
            serde_json::to_value(BillerParameter::normalize(&parameter)).unwrap(),
            parameter
        );

        let entry = json!({"description": "enabled", "log": "by ops"});
        assert_eq!(
            serde_json::to_value(HistoryEntry::normalize(&entry)).unwrap(),
            entry
        );

        let job = json!({
            "name": "SBI Bill Fetch",
            "status": 0,
            "rate": {"success": 1848, "failed": 156},
            "schedule": "Every 8 hours",
            "last_run": "",
            "next_run": "",
            "duration": "",
        });
        assert_eq!(serde_json::to_value(CronJob::normalize(&job)).unwrap(), job);

        let performance = json!({
            "date": {"2025-08-10": {"success": 8, "failed": 4}},
            "error": {"API Timeout": 3, "Other": 1},
            "performance": [{
                "job_name": "HDFC Bill Fetch",
                "execution": 28,
                "success_rate": "96.4%",
                "error": 1,
                "performance": 3,
            }],
        });
        assert_eq!(
            serde_json::to_value(CronPerformance::normalize(&performance)).unwrap(),
            performance
        );

        let equifax = json!({
            "rate": {"2025-08-14": {"success": 90, "freq": 100}},
            "avgResponseTimeToday": {"10:00": 1.5},
        });
        assert_eq!(
            serde_json::to_value(EquifaxInfo::normalize(&equifax)).unwrap(),
            equifax
        );
    }

    #[test]
    fn test_no_nulls_for_malformed_input() {
        for raw in [
            json!(null),
            json!(42),
            json!("text"),
            json!([]),
            json!({"billerId": null, "required": null, "title": null}),
        ] {
            let biller = serde_json::to_value(Biller::normalize_at(&raw, NOW)).unwrap();
            let parameter = serde_json::to_value(BillerParameter::normalize(&raw)).unwrap();
            let entry = serde_json::to_value(HistoryEntry::normalize(&raw)).unwrap();
            let job = serde_json::to_value(CronJob::normalize(&raw)).unwrap();

            for value in [&biller, &parameter, &entry, &job] {
                let object = value.as_object().unwrap();
                assert!(object.values().all(|v| !v.is_null()), "{value}");
            }
            assert_eq!(parameter["required"], json!(false));
            assert_eq!(parameter["title"], json!(""));
            assert_eq!(job["rate"], json!({"success": 0, "failed": 0}));
        }
    }

    #[test]
    fn test_parameter_aliases_and_truthiness() {
        let raw = json!({"name": "Mobile", "is_required": 1, "pattern": "^\\d{10}$", "id": 9});
        let parameter = BillerParameter::normalize(&raw);

        assert_eq!(parameter.title, "Mobile");
        assert!(parameter.required);
        assert_eq!(parameter.regex, "^\\d{10}$");
        assert_eq!(parameter.params_id, "9");

        assert!(!bool_field(&json!({"required": ""}), aliases::parameter::REQUIRED));
        assert!(bool_field(&json!({"required": "yes"}), aliases::parameter::REQUIRED));
    }

    #[test]
    fn test_normalize_list_ignores_non_arrays() {
        let entries: Vec<HistoryEntry> = normalize_list(Some(&json!({"message": "x"})));
        assert!(entries.is_empty());

        let entries: Vec<HistoryEntry> =
            normalize_list(Some(&json!([{"message": "created", "details": "seed"}])));
        assert_eq!(
            entries,
            vec![HistoryEntry {
                description: "created".into(),
                log: "seed".into(),
            }]
        );
    }

    #[test]
    fn test_counts() {
        assert_eq!(coerce_count(&json!(5)), 5);
        assert_eq!(coerce_count(&json!("12")), 12);
        assert_eq!(coerce_count(&json!(2.6)), 3);
        assert_eq!(coerce_count(&json!(-4)), 0);
        assert_eq!(coerce_count(&json!("n/a")), 0);
        assert_eq!(coerce_count(&json!(null)), 0);
    }

    #[test]
    fn test_equifax_rows() {
        let raw = json!({
            "rate": [
                {"date": "2025-08-13", "ok": "40", "count": 50},
                {"day": "2025-08-14", "success": 45, "total": 60},
                {"success": 1, "freq": 1},
            ],
            "avgResponseTimeToday": [
                {"hour": "09:00", "avg": 1.2},
                {"h": "10:00", "ms": "850"},
                {"value": 3},
            ],
        });
        let info = EquifaxInfo::normalize(&raw);

        assert_eq!(info.rate.len(), 2);
        assert_eq!(
            info.rate["2025-08-13"],
            RateBucket {
                success: 40,
                freq: 50
            }
        );
        assert_eq!(
            info.rate["2025-08-14"],
            RateBucket {
                success: 45,
                freq: 60
            }
        );
        assert_eq!(info.avg_response_time_today.len(), 2);
        assert_eq!(info.avg_response_time_today["09:00"], 1.2);
        assert_eq!(info.avg_response_time_today["10:00"], 850.0);
    }

    #[test]
    fn test_job_status_and_performance_rates() {
        let job = CronJob::normalize(&json!({"job_name": "Sync", "status": "running"}));
        assert_eq!(job.name, "Sync");
        assert_eq!(job.status, 1);
        assert_eq!(CronJob::normalize(&json!({"status": false})).status, 0);
        assert_eq!(CronJob::normalize(&json!({"status": "1"})).status, 1);

        let row = JobPerformance::normalize(&json!({"name": "Sync", "rate": 0.964, "errors": 2}));
        assert_eq!(row.job_name, "Sync");
        assert_eq!(row.success_rate, "96.4%");
        assert_eq!(row.error, 2);
    }
}
