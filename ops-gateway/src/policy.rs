//! Fallback and degrade policies applied around upstream calls.

use crate::metrics_defs::UPSTREAM_FALLBACK;
use crate::upstream::{UpstreamError, UpstreamResult};
use http::StatusCode;
use serde::Deserialize;
use shared::counter;
use std::future::Future;

/// Runs `primary`, and `secondary` only if the primary result is not ok.
///
/// The secondary result is returned whatever its outcome. There is no
/// further level of fallback.
pub async fn with_fallback<P, PF, S, SF>(primary: P, secondary: S) -> UpstreamResult
where
    P: FnOnce() -> PF,
    PF: Future<Output = UpstreamResult>,
    S: FnOnce() -> SF,
    SF: Future<Output = UpstreamResult>,
{
    let first = primary().await;
    if first.ok() {
        return first;
    }

    tracing::info!(outcome = ?first.outcome, "primary upstream strategy failed, trying fallback");
    counter!(UPSTREAM_FALLBACK).increment(1);
    secondary().await
}

/// Status used when a route fails on an upstream error.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FailStatus {
    /// See [`UpstreamError::mirror_status`].
    Mirror,
    #[serde(untagged)]
    Code(u16),
}

impl FailStatus {
    fn resolve(&self, error: &UpstreamError) -> StatusCode {
        match self {
            FailStatus::Mirror => error.mirror_status(),
            FailStatus::Code(code) => StatusCode::from_u16(*code).unwrap_or(StatusCode::BAD_GATEWAY),
        }
    }

    fn is_valid(&self) -> bool {
        match self {
            FailStatus::Mirror => true,
            FailStatus::Code(code) => (400..=599).contains(code),
        }
    }
}

/// What a route does when its upstream call fails.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", tag = "mode")]
pub enum DegradePolicy {
    /// Answer 200 with an empty payload and an `error` sidecar.
    Absorb,
    /// Answer with an error envelope. `on_rejected` applies to upstream non-2xx
    /// responses, `on_unavailable` to timeouts, network errors and malformed payloads.
    Fail {
        on_rejected: FailStatus,
        on_unavailable: FailStatus,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Degrade {
    Absorb,
    Fail(StatusCode),
}

impl DegradePolicy {
    pub const fn fail_with(on_rejected: FailStatus, on_unavailable: FailStatus) -> Self {
        DegradePolicy::Fail {
            on_rejected,
            on_unavailable,
        }
    }

    pub fn decide(&self, error: &UpstreamError) -> Degrade {
        match self {
            DegradePolicy::Absorb => Degrade::Absorb,
            DegradePolicy::Fail {
                on_rejected,
                on_unavailable,
            } => match error {
                UpstreamError::Rejected { .. } => Degrade::Fail(on_rejected.resolve(error)),
                _ => Degrade::Fail(on_unavailable.resolve(error)),
            },
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            DegradePolicy::Absorb => "absorb",
            DegradePolicy::Fail { .. } => "fail",
        }
    }

    pub fn is_valid(&self) -> bool {
        match self {
            DegradePolicy::Absorb => true,
            DegradePolicy::Fail {
                on_rejected,
                on_unavailable,
            } => on_rejected.is_valid() && on_unavailable.is_valid(),
        }
    }
}

/// Per-route degrade policies. Unset routes keep their defaults.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct DegradePolicies {
    pub all_billers: DegradePolicy,
    pub biller_param: DegradePolicy,
    pub bbps_info: DegradePolicy,
    pub cron_performance: DegradePolicy,
    pub crons_info: DegradePolicy,
    pub equifax_info: DegradePolicy,
    pub sql_query: DegradePolicy,
}

impl Default for DegradePolicies {
    fn default() -> Self {
        use FailStatus::{Code, Mirror};

        DegradePolicies {
            all_billers: DegradePolicy::fail_with(Code(500), Code(500)),
            biller_param: DegradePolicy::fail_with(Code(502), Code(502)),
            bbps_info: DegradePolicy::fail_with(Code(502), Code(500)),
            cron_performance: DegradePolicy::fail_with(Mirror, Mirror),
            crons_info: DegradePolicy::fail_with(Mirror, Mirror),
            // The CRIF panel must never show an error state
            equifax_info: DegradePolicy::Absorb,
            sql_query: DegradePolicy::fail_with(Code(502), Code(500)),
        }
    }
}

impl DegradePolicies {
    /// Name of the first route whose policy carries an unusable status code.
    pub fn first_invalid(&self) -> Option<&'static str> {
        [
            ("all_billers", &self.all_billers),
            ("biller_param", &self.biller_param),
            ("bbps_info", &self.bbps_info),
            ("cron_performance", &self.cron_performance),
            ("crons_info", &self.crons_info),
            ("equifax_info", &self.equifax_info),
            ("sql_query", &self.sql_query),
        ]
        .into_iter()
        .find(|(_, policy)| !policy.is_valid())
        .map(|(route, _)| route)
    }
}
