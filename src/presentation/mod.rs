// Presentation layer - HTTP routes for the dashboard UI
pub mod app_state;
pub mod handlers;

use crate::presentation::app_state::AppState;
use crate::presentation::handlers::{
    chart_from_template, cooling_tower_tradeoff, health_check, list_templates, plant_performance_series,
    submit_chat,
};
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(health_check))
        .route("/sites/:site_id/plant-performance/series", get(plant_performance_series))
        .route("/sites/:site_id/cooling-tower/tradeoff", get(cooling_tower_tradeoff))
        .route("/sites/:site_id/chat", post(submit_chat))
        .route("/sites/:site_id/templates", get(list_templates))
        .route("/sites/:site_id/templates/:template_id/chart", post(chart_from_template))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
