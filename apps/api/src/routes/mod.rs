pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::certificate::handlers as certificate;
use crate::chat::handlers as chat;
use crate::records::handlers as records;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    let body_limit = state.config.max_upload_bytes;

    Router::new()
        .route("/health", get(health::health_handler))
        // Certificate analysis
        .route("/api/analyze", post(certificate::handle_analyze))
        .route("/api/analyze/text", post(certificate::handle_extract_text))
        .route(
            "/api/analyze/narrative",
            post(certificate::handle_analyze_narrative),
        )
        // Follow-up chat
        .route("/api/chat", post(chat::handle_chat))
        // Persistence
        .route(
            "/api/certificates",
            get(records::handle_list_certificates).post(records::handle_create_certificate),
        )
        .route(
            "/api/analyses",
            get(records::handle_latest_analysis).post(records::handle_create_analysis),
        )
        .route("/api/chat-sessions", get(records::handle_get_session))
        .route(
            "/api/chat-sessions/messages",
            post(records::handle_append_message),
        )
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}
