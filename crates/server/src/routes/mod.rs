use axum::{Router, routing::get};
use tower_http::cors::CorsLayer;

use crate::Deployment;

pub mod boards;
pub mod health;
pub mod tasks;
pub mod webhooks;

pub fn router(deployment: Deployment) -> Router {
    let api = Router::new()
        .route("/health", get(health::health_check))
        .merge(boards::router())
        .merge(tasks::router())
        .merge(webhooks::router());

    Router::new()
        .nest("/api", api)
        .layer(CorsLayer::permissive())
        .with_state(deployment)
}
