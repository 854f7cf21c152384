pub mod api;
mod middleware;

pub use api::{ApiState, build_api_router};
pub use middleware::RequestContext;

use axum::{Router, http::StatusCode, routing::get};

/// Full application router: the reports API plus a health check.
pub fn build_router(state: ApiState) -> Router {
    Router::new()
        .route("/healthz", get(health))
        .merge(build_api_router(state))
}

async fn health() -> StatusCode {
    StatusCode::NO_CONTENT
}
