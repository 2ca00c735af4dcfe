use crate::AppState;
use crate::api::utils::{Envelope, parse_json, reject, settle};
use crate::errors::ApiError;
use crate::upstream::{UpstreamError, UpstreamRequest};
use axum::body::Bytes;
use axum::extract::State;
use serde::Serialize;
use serde_json::{Value, json};

const ROUTE: &str = "sql-query";
const UPSTREAM_PATH: &str = "/ops/sql-query";

#[derive(Serialize, Debug)]
pub struct SqlRequest {
    query: String,
}

pub async fn handle(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Envelope<SqlRequest, Value>, ApiError> {
    let Some(body) = parse_json(&body) else {
        return Err(reject(ROUTE, ApiError::invalid_input("Invalid JSON body")));
    };

    let query = match body.get("query").and_then(Value::as_str) {
        Some(query) if !query.trim().is_empty() => query.to_string(),
        _ => {
            return Err(reject(
                ROUTE,
                ApiError::invalid_input("Missing 'query' (non-empty string required)"),
            ));
        }
    };

    let result = fetch(&state, &query).await;
    let (response, error) = settle(ROUTE, &state.degrade.sql_query, result)?;
    Ok(Envelope::echo(SqlRequest { query }, response).with_error(error))
}

/// Results are passed through untouched, typically `{ "results": [[...]] }`.
async fn fetch(state: &AppState, query: &str) -> Result<Value, UpstreamError> {
    let request = UpstreamRequest::post(state.upstream.endpoint(UPSTREAM_PATH))
        .json(json!({ "query": query }))
        .timeout(state.sql_timeout);
    state.upstream.call(request).await.into_payload()
}
