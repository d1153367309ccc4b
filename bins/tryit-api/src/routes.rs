// Route table for the Try It API

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;

use crate::handlers;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/code/run-cpp", post(handlers::run_cpp))
        .route("/api/code/run-python", post(handlers::run_python))
        .route(
            "/api/code/visualize-python",
            post(handlers::visualize_python),
        )
        .route("/status", get(handlers::health_check))
        .route("/metrics", get(handlers::metrics_exposition))
}
