use crate::app_state::AppState;
use crate::chat_relay;
use crate::document_routes::{new_chat, send_message, upload_pdf, MAX_UPLOAD_BYTES};
use anyhow::{Context, Result};
use axum::{
    extract::DefaultBodyLimit,
    http::HeaderValue,
    routing::post,
    Router,
};
use tower_http::cors::{Any, CorsLayer};

pub fn build_router(state: AppState) -> Result<Router> {
    let origin: HeaderValue = state
        .config
        .frontend_origin
        .parse()
        .with_context(|| format!("invalid FRONTEND_ORIGIN {:?}", state.config.frontend_origin))?;

    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/api/chat", post(chat_relay::chat))
        .route(
            "/upload_pdf",
            post(upload_pdf).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route("/send_message", post(send_message))
        .route("/new_chat", post(new_chat))
        .layer(cors)
        .with_state(state);

    Ok(app)
}
