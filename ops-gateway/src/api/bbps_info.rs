use crate::AppState;
use crate::api::utils::{DateParams, Envelope, parse_object_or_empty, settle, str_field};
use crate::dates::DateRange;
use crate::errors::ApiError;
use crate::upstream::{UpstreamError, UpstreamRequest};
use axum::body::Bytes;
use axum::extract::{RawQuery, State};
use serde_json::Value;

const ROUTE: &str = "bbps-info";
const UPSTREAM_PATH: &str = "/bbps-info";

pub async fn handle_get(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
) -> Result<Envelope<DateRange, Value>, ApiError> {
    let params = DateParams::from_query(query.as_deref());
    let range = DateRange::resolve_now(params.start_date.as_deref(), params.end_date.as_deref());
    respond(&state, range).await
}

pub async fn handle_post(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Envelope<DateRange, Value>, ApiError> {
    let body = parse_object_or_empty(&body);
    let range = DateRange::resolve_now(str_field(&body, "startDate"), str_field(&body, "endDate"));
    respond(&state, range).await
}

async fn respond(state: &AppState, range: DateRange) -> Result<Envelope<DateRange, Value>, ApiError> {
    let result = fetch(state, range).await;
    let (response, error) = settle(ROUTE, &state.degrade.bbps_info, result)?;
    Ok(Envelope::echo(range, response).with_error(error))
}

/// The BBPS summary is passed through as the upstream shaped it.
async fn fetch(state: &AppState, range: DateRange) -> Result<Value, UpstreamError> {
    let body = serde_json::to_value(range).unwrap_or_default();
    state
        .bbps
        .call(UpstreamRequest::post(state.bbps.endpoint(UPSTREAM_PATH)).json(body))
        .await
        .into_json()
}
