//! Where cron analytics and job listings come from.
//!
//! Route handlers only see the traits. Config decides whether the data comes
//! from the operations API or from the local synthetic/demo collaborators.

pub mod demo;
pub mod synthetic;

use crate::config::{CronJobSourceType, CronPerformanceSourceType};
use crate::dates::DateRange;
use crate::normalize::{Normalize, find_at, normalize_list};
use crate::types::{CronJob, CronPerformance};
use crate::upstream::{UpstreamClient, UpstreamError, UpstreamRequest};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

const CRONS_PERFORMANCE_PATH: &str = "/ops/crons-performance";
const CRONS_INFO_PATH: &str = "/ops/crons-info";

#[async_trait]
pub trait CronPerformanceSource: Send + Sync {
    async fn performance(&self, range: DateRange) -> Result<CronPerformance, UpstreamError>;

    /// Longest window this source answers for. `None` means unbounded.
    fn max_days(&self) -> Option<u64> {
        None
    }
}

#[async_trait]
pub trait CronJobSource: Send + Sync {
    async fn jobs(&self) -> Result<Vec<CronJob>, UpstreamError>;
}

pub fn cron_performance_source(
    kind: CronPerformanceSourceType,
    client: &UpstreamClient,
) -> Arc<dyn CronPerformanceSource> {
    match kind {
        CronPerformanceSourceType::Upstream => Arc::new(UpstreamCronPerformance {
            client: client.clone(),
        }),
        CronPerformanceSourceType::Synthetic => Arc::new(synthetic::SyntheticCronPerformance),
    }
}

pub fn cron_job_source(kind: CronJobSourceType, client: &UpstreamClient) -> Arc<dyn CronJobSource> {
    match kind {
        CronJobSourceType::Upstream => Arc::new(UpstreamCronJobs {
            client: client.clone(),
        }),
        CronJobSourceType::Demo => Arc::new(demo::DemoCronJobs),
    }
}

/// POSTs the range to the operations API and normalizes the analytics.
pub struct UpstreamCronPerformance {
    client: UpstreamClient,
}

#[async_trait]
impl CronPerformanceSource for UpstreamCronPerformance {
    async fn performance(&self, range: DateRange) -> Result<CronPerformance, UpstreamError> {
        let body = serde_json::to_value(range).unwrap_or_default();
        let json = self
            .client
            .call(UpstreamRequest::post(self.client.endpoint(CRONS_PERFORMANCE_PATH)).json(body))
            .await
            .into_json()?;

        let envelope = find_at(&json, &[&["response"], &["data"], &[]], Value::is_object);
        Ok(envelope.map(CronPerformance::normalize).unwrap_or_default())
    }
}

/// GETs the job list from the operations API.
pub struct UpstreamCronJobs {
    client: UpstreamClient,
}

#[async_trait]
impl CronJobSource for UpstreamCronJobs {
    async fn jobs(&self) -> Result<Vec<CronJob>, UpstreamError> {
        let json = self
            .client
            .call(UpstreamRequest::get(self.client.endpoint(CRONS_INFO_PATH)))
            .await
            .into_json()?;

        let jobs = find_at(
            &json,
            &[&[], &["jobs"], &["response", "jobs"], &["data", "jobs"]],
            Value::is_array,
        );
        Ok(normalize_list(jobs))
    }
}
