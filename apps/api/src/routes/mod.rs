pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::export::handlers as export;
use crate::feedback::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    let body_limit = state.config.max_upload_bytes;

    Router::new()
        .route("/health", get(health::health_handler))
        // Session
        .route("/api/v1/session", get(handlers::handle_session))
        .route("/api/v1/session/reset", post(handlers::handle_reset))
        // Document track
        .route("/api/v1/document", post(handlers::handle_upload))
        .route("/api/v1/document/analyze", post(handlers::handle_analyze))
        .route("/api/v1/feedback/pdf", get(export::handle_feedback_pdf))
        .route("/api/v1/feedback/speech", post(export::handle_feedback_speech))
        .route("/api/v1/feedback/player", get(export::handle_feedback_player))
        // Interview track
        .route("/api/v1/interview", post(handlers::handle_interview))
        .route("/api/v1/interview/pdf", get(export::handle_interview_pdf))
        .route("/api/v1/interview/speech", post(export::handle_interview_speech))
        .route("/api/v1/interview/player", get(export::handle_interview_player))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}
