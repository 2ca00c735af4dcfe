use super::CronJobSource;
use crate::types::{CronJob, DayOutcome};
use crate::upstream::UpstreamError;
use async_trait::async_trait;

/// Name, status, successes, failures, schedule.
const DEMO_JOBS: &[(&str, u64, u64, u64, &str)] = &[
    ("BAJA Bill Fetch", 1, 7, 1, "Daily at 04:00 AM"),
    ("Credit Card Bill Fetch", 1, 3, 3, "Daily at 01:00 AM"),
    ("SBI Bill Fetch", 0, 1848, 156, "Every 8 hours"),
];

/// Serves a fixed job list, for running the dashboard without an upstream.
pub struct DemoCronJobs;

#[async_trait]
impl CronJobSource for DemoCronJobs {
    async fn jobs(&self) -> Result<Vec<CronJob>, UpstreamError> {
        Ok(demo_jobs())
    }
}

pub fn demo_jobs() -> Vec<CronJob> {
    DEMO_JOBS
        .iter()
        .map(|(name, status, success, failed, schedule)| CronJob {
            name: (*name).to_string(),
            status: *status,
            rate: DayOutcome {
                success: *success,
                failed: *failed,
            },
            schedule: (*schedule).to_string(),
            last_run: String::new(),
            next_run: String::new(),
            duration: String::new(),
        })
        .collect()
}
