use crate::api_error::ApiError;
use crate::app_state::AppState;
use axum::{
    body::Body,
    extract::{rejection::JsonRejection, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use futures::{Stream, StreamExt};
use genie::provider::ASSISTANT_PROMPT;
use genie::{ChatRequest, TextStream};
use std::convert::Infallible;
use tokio::time::{timeout_at, Instant};

/// Ends the relayed body at `deadline` or at the first upstream error.
/// Headers are already sent by then, so both cases are only logged.
pub fn with_deadline(upstream: TextStream, deadline: Instant) -> impl Stream<Item = Result<String, Infallible>> + Send {
    futures::stream::unfold(Some(upstream), move |state| async move {
        let mut upstream = state?;

        match timeout_at(deadline, upstream.next()).await {
            Ok(Some(Ok(text))) => Some((Ok::<String, Infallible>(text), Some(upstream))),
            Ok(Some(Err(e))) => {
                log::error!("Chat relay stream failed: {:#}", e);
                None
            }
            Ok(None) => None,
            Err(_) => {
                log::warn!("Chat relay reached its time limit, dropping the upstream stream");
                None
            }
        }
    })
}

/// `POST /api/chat`: forwards the history to the model and streams the
/// reply back as plain text.
pub async fn chat(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload.map_err(|e| ApiError::bad_request(e.body_text()))?;
    log::info!("Relaying chat with {} messages", request.messages.len());

    let deadline = Instant::now() + state.config.relay_max_duration;
    let upstream = match timeout_at(deadline, state.provider.stream(ASSISTANT_PROMPT, &request.messages)).await {
        Ok(Ok(upstream)) => upstream,
        Ok(Err(e)) => return Err(ApiError::Internal(e.context("chat completion relay failed"))),
        Err(_) => {
            return Err(ApiError::Internal(anyhow::anyhow!(
                "chat completion relay timed out before the model answered"
            )))
        }
    };

    let body = Body::from_stream(with_deadline(upstream, deadline));
    Ok(([(header::CONTENT_TYPE, "text/plain; charset=utf-8")], body).into_response())
}
