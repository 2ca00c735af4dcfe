use crate::AppState;
use crate::api::utils::{Envelope, settle};
use crate::errors::ApiError;
use crate::types::CronJob;
use axum::extract::State;
use serde::Serialize;

const ROUTE: &str = "crons-info";

#[derive(Serialize, Debug, Default)]
pub struct JobList {
    jobs: Vec<CronJob>,
}

pub async fn handle(State(state): State<AppState>) -> Result<Envelope<(), JobList>, ApiError> {
    let result = state.cron_jobs.jobs().await.map(|jobs| JobList { jobs });
    let (response, error) = settle(ROUTE, &state.degrade.crons_info, result)?;
    Ok(Envelope::new(response).with_error(error))
}
