//! The `/api` routes consumed by the dashboard frontend.

mod bbps_info;
mod biller_param;
mod billers;
mod cron_performance;
mod crons_info;
mod equifax_info;
mod sql_query;
pub mod utils;

use crate::AppState;
use crate::errors::ApiError;
use axum::Router;
use axum::routing::{get, post};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/all-billers", get(billers::handle))
        .route("/api/biller-param", post(biller_param::handle))
        .route("/api/bbps-info", get(bbps_info::handle_get).post(bbps_info::handle_post))
        .route(
            "/api/cron-performance",
            post(cron_performance::handle).get(cron_performance::usage),
        )
        .route("/api/crons-info", get(crons_info::handle))
        .route(
            "/api/equifax-info",
            get(equifax_info::handle_get).post(equifax_info::handle_post),
        )
        .route("/api/sql-query", post(sql_query::handle))
        .fallback(not_found)
        .method_not_allowed_fallback(method_not_allowed)
        .with_state(state)
}

async fn not_found() -> ApiError {
    ApiError::NotFound
}

async fn method_not_allowed() -> ApiError {
    ApiError::method_not_allowed()
}
