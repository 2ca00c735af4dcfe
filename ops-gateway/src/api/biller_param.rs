use crate::AppState;
use crate::api::utils::{Envelope, parse_object_or_empty, reject, settle, str_field};
use crate::errors::ApiError;
use crate::normalize::{find_at, normalize_list, pick};
use crate::types::{BillerParameter, HistoryEntry};
use crate::upstream::{UpstreamError, UpstreamRequest};
use axum::body::Bytes;
use axum::extract::State;
use serde::Serialize;
use serde_json::{Value, json};

const ROUTE: &str = "biller-param";
const UPSTREAM_PATH: &str = "/ops/biller-param";

#[derive(Serialize, Debug)]
pub struct BillerRequest {
    biller_id: String,
}

#[derive(Serialize, Debug, Default)]
pub struct BillerDetails {
    parameters: Vec<BillerParameter>,
    history: Vec<HistoryEntry>,
}

pub async fn handle(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Envelope<BillerRequest, BillerDetails>, ApiError> {
    let body = parse_object_or_empty(&body);
    let biller_id = match str_field(&body, "biller_id").map(str::trim) {
        Some(id) if !id.is_empty() => id.to_string(),
        _ => {
            return Err(reject(
                ROUTE,
                ApiError::validation("biller_id is required and must be a non-empty string"),
            ));
        }
    };

    let result = fetch(&state, &biller_id).await;
    let (response, error) = settle(ROUTE, &state.degrade.biller_param, result)?;
    Ok(Envelope::echo(BillerRequest { biller_id }, response).with_error(error))
}

async fn fetch(state: &AppState, biller_id: &str) -> Result<BillerDetails, UpstreamError> {
    let request = UpstreamRequest::post(state.upstream.endpoint(UPSTREAM_PATH))
        .json(json!({ "biller_id": biller_id }));
    let json = state.upstream.call(request).await.into_json()?;

    let Some(envelope) = find_at(&json, &[&["response"], &[]], Value::is_object) else {
        return Ok(BillerDetails::default());
    };

    Ok(BillerDetails {
        parameters: normalize_list(pick(envelope, &["parameters"])),
        history: normalize_list(pick(envelope, &["history"])),
    })
}
