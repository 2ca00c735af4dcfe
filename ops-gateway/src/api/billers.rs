use crate::AppState;
use crate::api::utils::{Envelope, settle};
use crate::errors::ApiError;
use crate::normalize::find_at;
use crate::types::Biller;
use crate::upstream::{UpstreamError, UpstreamRequest};
use axum::extract::State;
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::Value;

const ROUTE: &str = "all-billers";
const UPSTREAM_PATH: &str = "/ops/all-billers";

#[derive(Serialize, Debug, Default)]
pub struct BillerList {
    billers: Vec<Biller>,
}

pub async fn handle(State(state): State<AppState>) -> Result<Envelope<(), BillerList>, ApiError> {
    let result = fetch(&state).await;
    let (response, error) = settle(ROUTE, &state.degrade.all_billers, result)?;
    Ok(Envelope::new(response).with_error(error))
}

async fn fetch(state: &AppState) -> Result<BillerList, UpstreamError> {
    let json = state
        .upstream
        .call(UpstreamRequest::get(state.upstream.endpoint(UPSTREAM_PATH)))
        .await
        .into_json()?;

    let now = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
    let billers = find_at(
        &json,
        &[&[], &["billers"], &["response", "billers"], &["data", "billers"]],
        Value::is_array,
    )
    .and_then(Value::as_array)
    .map(|items| items.iter().map(|raw| Biller::normalize_at(raw, &now)).collect())
    .unwrap_or_default();

    Ok(BillerList { billers })
}

#[cfg(test)]
mod tests {
    use crate::testutils::{closed_port_url, get, send, spawn_upstream, test_app, test_config};
    use axum::routing::get as get_route;
    use axum::{Json, Router};
    use chrono::DateTime;
    use http::StatusCode;
    use serde_json::json;

    #[tokio::test]
    async fn test_normalizes_aliased_billers() {
        let base = spawn_upstream(Router::new().route(
            "/v2/ops/all-billers",
            get_route(|| async {
                Json(json!({"billers": [{"biller_id": "B1", "name": "Test Bank", "state": "active"}]}))
            }),
        ))
        .await;

        let (status, body) = send(test_app(&test_config(base)), get("/api/all-billers")).await;
        assert_eq!(status, StatusCode::OK);

        let biller = &body["response"]["billers"][0];
        let last_updated = biller["lastUpdated"].as_str().unwrap();
        assert!(DateTime::parse_from_rfc3339(last_updated).is_ok());
        assert!(last_updated.ends_with('Z'));
        assert_eq!(
            body,
            json!({"response": {"billers": [{
                "billerId": "B1",
                "billerName": "Test Bank",
                "status": "active",
                "number": "",
                "parameters": "",
                "lastUpdated": last_updated,
            }]}})
        );
    }

    #[tokio::test]
    async fn test_accepts_bare_array_and_nested_envelope() {
        let base = spawn_upstream(
            Router::new()
                .route(
                    "/v2/bare/ops/all-billers",
                    get_route(|| async { Json(json!([{"billerId": "B1"}, {"code": "B2"}])) }),
                )
                .route(
                    "/v2/nested/ops/all-billers",
                    get_route(|| async {
                        Json(json!({"response": {"billers": [{"id": 7, "lastUpdated": "2025-08-01"}]}}))
                    }),
                ),
        )
        .await;

        let bare = crate::upstream::join_path(&base, "bare");
        let (_, body) = send(test_app(&test_config(bare)), get("/api/all-billers")).await;
        assert_eq!(body["response"]["billers"][1]["billerId"], "B2");

        let nested = crate::upstream::join_path(&base, "nested");
        let (_, body) = send(test_app(&test_config(nested)), get("/api/all-billers")).await;
        assert_eq!(body["response"]["billers"][0]["billerId"], "7");
        assert_eq!(body["response"]["billers"][0]["lastUpdated"], "2025-08-01");
    }

    #[tokio::test]
    async fn test_upstream_failure_is_500() {
        let base = spawn_upstream(Router::new().route(
            "/v2/ops/all-billers",
            get_route(|| async { (StatusCode::NOT_FOUND, "missing") }),
        ))
        .await;

        let (status, body) = send(test_app(&test_config(base)), get("/api/all-billers")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body,
            json!({"error": "Upstream error", "status": 404, "details": "missing"})
        );

        let (status, body) =
            send(test_app(&test_config(closed_port_url().await)), get("/api/all-billers")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Failed to reach upstream");
    }
}
