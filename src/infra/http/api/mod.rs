pub mod error;
pub mod handlers;
pub mod models;
pub mod state;

pub use state::ApiState;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};

use crate::infra::http::middleware::{log_responses, set_request_context};

pub fn build_api_router(state: ApiState) -> Router {
    Router::new()
        .route(
            "/api/reports/cache",
            post(handlers::cache_action).put(handlers::smart_invalidate),
        )
        .route(
            "/api/reports/{report_type}",
            get(handlers::get_report)
                .post(handlers::post_report)
                .options(handlers::report_preflight),
        )
        .with_state(state)
        .layer(axum_middleware::from_fn(log_responses))
        .layer(axum_middleware::from_fn(set_request_context))
}
