use crate::errors::ApiError;
use crate::metrics_defs::{ROUTE_DEGRADED, ROUTE_REJECTED};
use crate::policy::{Degrade, DegradePolicy};
use crate::upstream::UpstreamError;
use axum::Json;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use serde_json::{Map, Value};
use shared::counter;

/// Success body: `{ request?, response, error? }`.
#[derive(Serialize, Debug)]
pub struct Envelope<Q, R> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request: Option<Q>,
    pub response: R,
    /// Set only when a failure was absorbed into an empty response.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorSidecar>,
}

impl<R> Envelope<(), R> {
    pub fn new(response: R) -> Self {
        Envelope {
            request: None,
            response,
            error: None,
        }
    }
}

impl<Q, R> Envelope<Q, R> {
    pub fn echo(request: Q, response: R) -> Self {
        Envelope {
            request: Some(request),
            response,
            error: None,
        }
    }

    pub fn with_error(mut self, error: Option<ErrorSidecar>) -> Self {
        self.error = error;
        self
    }
}

impl<Q: Serialize, R: Serialize> IntoResponse for Envelope<Q, R> {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ErrorSidecar {
    pub status: u16,
    pub details: Value,
}

/// Resolves an upstream result under the route's degrade policy.
///
/// Failures the policy absorbs come back as an empty payload plus a sidecar.
/// The rest become an [`ApiError`] carrying the chosen status.
pub fn settle<R: Default>(
    route: &'static str,
    policy: &DegradePolicy,
    result: Result<R, UpstreamError>,
) -> Result<(R, Option<ErrorSidecar>), ApiError> {
    let error = match result {
        Ok(response) => return Ok((response, None)),
        Err(error) => error,
    };

    counter!(ROUTE_DEGRADED, "route" => route, "policy" => policy.label()).increment(1);

    match policy.decide(&error) {
        Degrade::Absorb => {
            tracing::warn!(route, error = %error, "absorbing upstream failure");
            let details = match error.details() {
                Value::Null => Value::String(error.summary().into()),
                details => details,
            };
            let sidecar = ErrorSidecar {
                status: error.mirror_status().as_u16(),
                details,
            };
            Ok((R::default(), Some(sidecar)))
        }
        Degrade::Fail(status) => {
            tracing::warn!(route, error = %error, %status, "upstream call failed");
            Err(ApiError::Upstream {
                status,
                source: error,
            })
        }
    }
}

/// Counts and logs a request rejected before any upstream call.
pub fn reject(route: &'static str, error: ApiError) -> ApiError {
    counter!(ROUTE_REJECTED, "route" => route).increment(1);
    tracing::debug!(route, error = %error, "rejected request");
    error
}

/// Optional `?startDate=&endDate=` query parameters.
#[derive(Debug, Default, PartialEq)]
pub struct DateParams {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

impl DateParams {
    /// Never fails. A repeated key keeps its first value and undecodable
    /// escapes are replaced, leaving the date resolver to discard them.
    pub fn from_query(query: Option<&str>) -> Self {
        let mut params = DateParams::default();
        let query = query.unwrap_or_default();

        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            let slot = match key.as_ref() {
                "startDate" => &mut params.start_date,
                "endDate" => &mut params.end_date,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value.into_owned());
            }
        }

        params
    }
}

/// Parses a body that must be JSON. Empty bodies are not JSON.
pub fn parse_json(body: &[u8]) -> Option<Value> {
    serde_json::from_slice(body).ok()
}

/// Parses an optional JSON object body. Anything else reads as `{}`.
pub fn parse_object_or_empty(body: &[u8]) -> Map<String, Value> {
    match parse_json(body) {
        Some(Value::Object(map)) => map,
        _ => Map::new(),
    }
}

pub fn str_field<'a>(object: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    object.get(key).and_then(Value::as_str)
}
