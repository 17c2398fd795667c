use crate::api_error::ApiError;
use crate::app_state::{AppState, DocumentSession};
use axum::{
    extract::{rejection::JsonRejection, Multipart, State},
    Json,
};
use genie::provider::document_prompt;
use genie::{ChatHistoryResponse, Message, NewChatResponse, SendMessageRequest, UploadPdfResponse, PDF_MIME_TYPE};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use uuid::Uuid;

pub const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;
const CLEANUP_INTERVAL: Duration = Duration::from_secs(60);
const NO_SESSION: &str = "No active session. Please upload a PDF first.";

struct UploadedPdf {
    name: String,
    content_type: String,
    data: Vec<u8>,
}

async fn read_file_field(multipart: &mut Multipart) -> Result<Option<UploadedPdf>, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Failed to read form data: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let name = field
            .file_name()
            .map(|s| s.to_string())
            .unwrap_or_else(|| "document.pdf".to_string());
        let content_type = field
            .content_type()
            .map(|s| s.to_string())
            .unwrap_or_default();
        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::bad_request(format!("Failed to read file data: {}", e)))?;

        return Ok(Some(UploadedPdf {
            name,
            content_type,
            data: data.to_vec(),
        }));
    }

    Ok(None)
}

/// `POST /upload_pdf`: replaces the current document with the uploaded one.
pub async fn upload_pdf(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadPdfResponse>, ApiError> {
    let upload = read_file_field(&mut multipart)
        .await?
        .ok_or_else(|| ApiError::bad_request("Missing form field 'file'."))?;

    if upload.content_type != PDF_MIME_TYPE {
        return Err(ApiError::bad_request("Only PDF files are allowed."));
    }
    if upload.data.is_empty() {
        return Err(ApiError::bad_request("Uploaded file is empty."));
    }

    if let Some(previous) = state.document.write().await.take() {
        log::info!("Dropping previous document {}", previous.display_name);
    }

    log::info!("Processing PDF: {} ({} bytes)", upload.name, upload.data.len());
    let data = upload.data;
    let text = tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&data))
        .await?
        .map_err(|e| anyhow::anyhow!("Failed to extract text from {}: {}", upload.name, e))?;

    if text.trim().is_empty() {
        log::warn!("{} contains no extractable text", upload.name);
    }

    let file_id = format!("files/{}", Uuid::new_v4());
    let session = DocumentSession::new(file_id.clone(), upload.name.clone(), text);
    *state.document.write().await = Some(session);

    log::info!("Session started for {} as {}", upload.name, file_id);
    Ok(Json(UploadPdfResponse {
        message: "PDF uploaded and session started.".to_string(),
        file_id,
        display_name: upload.name,
    }))
}

/// `POST /send_message`: answers from the document and returns the whole
/// conversation. The model call runs without the document lock, bounded by
/// the reply ceiling.
pub async fn send_message(
    State(state): State<AppState>,
    payload: Result<Json<SendMessageRequest>, JsonRejection>,
) -> Result<Json<ChatHistoryResponse>, ApiError> {
    let Json(request) = payload.map_err(|e| ApiError::bad_request(e.body_text()))?;
    if request.message.trim().is_empty() {
        return Err(ApiError::bad_request("Message must not be empty."));
    }

    let _turn = state.send_gate.lock().await;

    let (file_id, system, history) = {
        let mut guard = state.document.write().await;
        let session = guard.as_mut().ok_or_else(|| ApiError::bad_request(NO_SESSION))?;
        session.last_accessed = Instant::now();
        session.history.push(Message::user(request.message));
        (
            session.file_id.clone(),
            document_prompt(&session.display_name, &session.text),
            session.history.clone(),
        )
    };

    let ceiling = state.config.reply_max_duration;
    let reply = match tokio::time::timeout(ceiling, state.provider.generate(&system, &history)).await {
        Ok(reply) => reply,
        Err(_) => Err(anyhow::anyhow!("model gave no reply within {:?}", ceiling)),
    };

    let mut guard = state.document.write().await;
    // the document may have been replaced or cleared during the call
    let session = match guard.as_mut() {
        Some(session) if session.file_id == file_id => session,
        _ => {
            log::info!("Discarding reply for {}: session changed", file_id);
            return match reply {
                Ok(_) => Err(ApiError::bad_request(NO_SESSION)),
                Err(e) => Err(ApiError::Internal(e.context("send_message failed"))),
            };
        }
    };

    match reply {
        Ok(answer) => {
            session.last_accessed = Instant::now();
            session.history.push(Message::assistant(answer));
        }
        Err(e) => {
            // keep the stored conversation consistent with what the model saw
            session.history.pop();
            return Err(ApiError::Internal(e.context("send_message failed")));
        }
    }

    Ok(Json(ChatHistoryResponse {
        history: session.history.clone(),
        file_id: Some(session.file_id.clone()),
        display_name: Some(session.display_name.clone()),
    }))
}

/// `POST /new_chat`: forgets the document and its history.
pub async fn new_chat(State(state): State<AppState>) -> Json<NewChatResponse> {
    if let Some(previous) = state.document.write().await.take() {
        log::info!("Cleared session for {}", previous.display_name);
    }

    Json(NewChatResponse {
        message: "New chat session started. Previous PDF and history cleared.".to_string(),
    })
}

/// Drops the session if it has been idle past the configured timeout.
pub async fn evict_idle_session(state: &AppState, now: Instant) -> bool {
    let mut guard = state.document.write().await;
    let idle = guard
        .as_ref()
        .map(|s| now.saturating_duration_since(s.last_accessed) > state.config.session_idle_timeout)
        .unwrap_or(false);

    if idle {
        if let Some(session) = guard.take() {
            log::info!("Evicted idle session for {}", session.display_name);
        }
    }

    idle
}

pub fn spawn_idle_cleanup(state: AppState) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(CLEANUP_INTERVAL);
        loop {
            ticker.tick().await;
            evict_idle_session(&state, Instant::now()).await;
        }
    })
}
