//! HTTP request handlers

use axum::{extract::State, response::Html, Json};
use motion_common::PublishedSnapshot;
use serde::Serialize;

use crate::api::server::AppContext;

const VIEWER_HTML: &str = include_str!("viewer.html");

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: String,
    module: String,
    version: String,
    tags: usize,
    subscribers: usize,
}

/// GET /health
pub async fn health(State(ctx): State<AppContext>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        module: "motion-relay".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        tags: ctx.state.registry.len(),
        subscribers: ctx.state.subscriber_count(),
    })
}

/// GET /tags - last published state of every tag
pub async fn get_tags(State(ctx): State<AppContext>) -> Json<PublishedSnapshot> {
    Json(ctx.state.current_snapshot().await)
}

/// GET / - live viewer page
pub async fn viewer() -> Html<&'static str> {
    Html(VIEWER_HTML)
}
