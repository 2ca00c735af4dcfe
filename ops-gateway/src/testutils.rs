use crate::AppState;
use crate::config::{Config, Listener, Sources, UpstreamConfig};
use crate::policy::DegradePolicies;
use axum::Router;
use axum::body::{Body, to_bytes};
use http::{Request, StatusCode};
use serde_json::Value;
use tokio::net::TcpListener;
use tower::ServiceExt;
use url::Url;

/// Serves `router` on an ephemeral local port. Returns the base URL,
/// which carries a `/v2` prefix like the real operations API.
pub async fn spawn_upstream(router: Router) -> Url {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    Url::parse(&format!("http://{addr}/v2")).unwrap()
}

/// A base URL on which nothing is listening.
pub async fn closed_port_url() -> Url {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    Url::parse(&format!("http://{addr}/v2")).unwrap()
}

pub fn test_config(base_url: Url) -> Config {
    Config {
        listener: Listener {
            host: "127.0.0.1".into(),
            port: 3000,
        },
        admin_listener: Listener {
            host: "127.0.0.1".into(),
            port: 3001,
        },
        upstream: UpstreamConfig {
            base_url,
            ..Default::default()
        },
        sources: Sources::default(),
        degrade: DegradePolicies::default(),
    }
}

pub fn test_app(config: &Config) -> Router {
    crate::api::router(AppState::from_config(config))
}

/// Sends one request through the router and decodes the JSON reply.
pub async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

pub fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

pub fn post_json(uri: &str, body: &str) -> Request<Body> {
    Request::post(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}
