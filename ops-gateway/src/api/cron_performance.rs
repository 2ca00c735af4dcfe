use crate::AppState;
use crate::api::utils::{Envelope, parse_json, reject, settle};
use crate::dates::DateRange;
use crate::errors::ApiError;
use crate::types::CronPerformance;
use axum::body::Bytes;
use axum::extract::State;
use serde_json::{Value, json};

const ROUTE: &str = "cron-performance";

pub async fn handle(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Envelope<DateRange, CronPerformance>, ApiError> {
    let Some(body) = parse_json(&body) else {
        return Err(reject(ROUTE, ApiError::invalid_input("Malformed JSON body.")));
    };

    let range = DateRange::parse_strict(date_field(&body, "startDate"), date_field(&body, "endDate"))
        .and_then(|range| match state.cron_performance.max_days() {
            Some(max_days) => range.limit(max_days),
            None => Ok(range),
        })
        .map_err(|e| reject(ROUTE, ApiError::invalid_input(e.to_string())))?;

    let result = state.cron_performance.performance(range).await;
    let (response, error) = settle(ROUTE, &state.degrade.cron_performance, result)?;
    Ok(Envelope::echo(range, response).with_error(error))
}

fn date_field<'a>(body: &'a Value, key: &str) -> Option<&'a str> {
    body.get(key).and_then(Value::as_str)
}

pub async fn usage() -> ApiError {
    ApiError::MethodNotAllowed {
        message: Some(
            "POST only. Send { startDate: 'YYYY-MM-DD', endDate: 'YYYY-MM-DD' } to receive cron analytics."
                .into(),
        ),
        example_request: Some(json!({"startDate": "2025-08-10", "endDate": "2025-08-14"})),
    }
}
