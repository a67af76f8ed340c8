pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::evaluation::handlers;
use crate::generation::handlers as generation;
use crate::segmentation::handlers as segmentation;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .route("/api/v1/evaluate", post(handlers::handle_evaluate))
        .route(
            "/api/v1/skills-assessment",
            post(handlers::handle_skills_assessment),
        )
        .route("/api/v1/segment", post(segmentation::handle_segment))
        .route(
            "/api/v1/generate-report",
            post(segmentation::handle_generate_report),
        )
        .route(
            "/api/v1/generate-questions",
            post(generation::handle_generate_questions),
        )
        .with_state(state)
}
