use crate::AppState;
use crate::api::utils::{DateParams, Envelope, parse_object_or_empty, settle, str_field};
use crate::dates::DateRange;
use crate::errors::ApiError;
use crate::normalize::{Normalize, aliases, find_at, pick};
use crate::policy::with_fallback;
use crate::types::EquifaxInfo;
use crate::upstream::{UpstreamError, UpstreamRequest};
use axum::body::Bytes;
use axum::extract::{RawQuery, State};
use serde_json::Value;

const ROUTE: &str = "equifax-info";
const UPSTREAM_PATH: &str = "/ops/equifax-info";

pub async fn handle_get(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
) -> Result<Envelope<DateRange, EquifaxInfo>, ApiError> {
    let params = DateParams::from_query(query.as_deref());
    let range = DateRange::resolve_now(params.start_date.as_deref(), params.end_date.as_deref());
    respond(&state, range).await
}

pub async fn handle_post(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Envelope<DateRange, EquifaxInfo>, ApiError> {
    let body = parse_object_or_empty(&body);
    let range = DateRange::resolve_now(str_field(&body, "startDate"), str_field(&body, "endDate"));
    respond(&state, range).await
}

async fn respond(
    state: &AppState,
    range: DateRange,
) -> Result<Envelope<DateRange, EquifaxInfo>, ApiError> {
    let result = fetch(state, range).await;
    let (response, error) = settle(ROUTE, &state.degrade.equifax_info, result)?;
    Ok(Envelope::echo(range, response).with_error(error))
}

fn has_equifax_fields(value: &Value) -> bool {
    use aliases::equifax::*;

    pick(value, RATE).is_some() || pick(value, AVG_RESPONSE_TIME).is_some()
}

/// POSTs the range, falling back to GET with query parameters for upstream
/// deployments that only accept GET.
async fn fetch(state: &AppState, range: DateRange) -> Result<EquifaxInfo, UpstreamError> {
    let url = state.upstream.endpoint(UPSTREAM_PATH);
    let start = range.start_date().to_string();
    let end = range.end_date().to_string();

    let result = with_fallback(
        || {
            let body = serde_json::to_value(range).unwrap_or_default();
            state.upstream.call(UpstreamRequest::post(url.clone()).json(body))
        },
        || {
            let request = UpstreamRequest::get(url.clone())
                .query("startDate", start)
                .query("endDate", end);
            state.upstream.call(request)
        },
    )
    .await;

    let json = result.into_json()?;
    let envelope = find_at(
        &json,
        &[&[], &["data"], &["stats"], &["response"]],
        has_equifax_fields,
    );
    Ok(envelope.map(EquifaxInfo::normalize).unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use crate::dates::DateRange;
    use crate::testutils::{closed_port_url, get, post_json, send, spawn_upstream, test_app, test_config};
    use axum::extract::Query;
    use axum::routing::post;
    use axum::{Json, Router};
    use http::StatusCode;
    use serde_json::json;
    use std::collections::HashMap;

    #[tokio::test]
    async fn test_unreachable_upstream_is_absorbed() {
        let app = test_app(&test_config(closed_port_url().await));
        let (status, body) = send(
            app,
            post_json("/api/equifax-info", r#"{"startDate": "2025-08-10", "endDate": "2025-08-14"}"#),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body["request"],
            json!({"startDate": "2025-08-10", "endDate": "2025-08-14"})
        );
        assert_eq!(body["response"], json!({"rate": {}, "avgResponseTimeToday": {}}));
        assert_eq!(body["error"]["status"], 502);
        assert!(body["error"]["details"].is_string());
    }

    #[tokio::test]
    async fn test_falls_back_to_get_with_query() {
        let base = spawn_upstream(Router::new().route(
            "/v2/ops/equifax-info",
            post(|| async { StatusCode::METHOD_NOT_ALLOWED }).get(
                |Query(params): Query<HashMap<String, String>>| async move {
                    Json(json!({"data": {
                        "rate": [
                            {"date": params["startDate"], "ok": 4, "total": 5},
                            {"success": 1, "freq": 1},
                        ],
                        "avgResponseTimeToday": [{"h": "10:00", "ms": "1.5"}, {"hour": "11:00", "avg": 2}],
                    }}))
                },
            ),
        ))
        .await;

        let (status, body) = send(
            test_app(&test_config(base)),
            get("/api/equifax-info?startDate=2025-08-10&endDate=2025-08-14"),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({
                "request": {"startDate": "2025-08-10", "endDate": "2025-08-14"},
                "response": {
                    "rate": {"2025-08-10": {"success": 4, "freq": 5}},
                    "avgResponseTimeToday": {"10:00": 1.5, "11:00": 2.0},
                },
            })
        );
    }

    #[tokio::test]
    async fn test_repeated_query_keys_keep_first_value() {
        let app = test_app(&test_config(closed_port_url().await));

        let (status, body) = send(app.clone(), get("/api/equifax-info?startDate=a&startDate=b")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body["request"],
            serde_json::to_value(DateRange::resolve_now(None, None)).unwrap()
        );
        assert_eq!(body["response"], json!({"rate": {}, "avgResponseTimeToday": {}}));

        let (status, body) = send(
            app,
            get("/api/equifax-info?startDate=2025-08-01&startDate=2025-08-02&endDate=2025-08-14"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body["request"],
            json!({"startDate": "2025-08-01", "endDate": "2025-08-14"})
        );
    }

    #[tokio::test]
    async fn test_rejection_from_both_methods_is_absorbed() {
        let base = spawn_upstream(Router::new().route(
            "/v2/ops/equifax-info",
            post(|| async { StatusCode::METHOD_NOT_ALLOWED })
                .get(|| async { (StatusCode::FORBIDDEN, Json(json!({"message": "denied"}))) }),
        ))
        .await;

        let (status, body) = send(test_app(&test_config(base)), post_json("/api/equifax-info", "")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["response"], json!({"rate": {}, "avgResponseTimeToday": {}}));
        assert_eq!(
            body["error"],
            json!({"status": 403, "details": {"message": "denied"}})
        );
    }
}
