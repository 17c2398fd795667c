use crate::config::ServerConfig;
use genie::{ChatProvider, Message};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Mutex, RwLock};

/// The uploaded PDF and its authoritative conversation.
#[derive(Debug)]
pub struct DocumentSession {
    pub file_id: String,
    pub display_name: String,
    pub text: String,
    pub history: Vec<Message>,
    pub last_accessed: Instant,
}

impl DocumentSession {
    pub fn new(file_id: String, display_name: String, text: String) -> Self {
        Self {
            file_id,
            display_name,
            text,
            history: Vec::new(),
            last_accessed: Instant::now(),
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub provider: Arc<dyn ChatProvider>,
    /// One session for the whole server, like a single-user desktop app.
    pub document: Arc<RwLock<Option<DocumentSession>>>,
    /// Serializes `send_message` so replies land in order. The document
    /// lock itself is never held across a model call.
    pub send_gate: Arc<Mutex<()>>,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(provider: Arc<dyn ChatProvider>, config: ServerConfig) -> Self {
        Self {
            provider,
            document: Arc::new(RwLock::new(None)),
            send_gate: Arc::new(Mutex::new(())),
            config: Arc::new(config),
        }
    }
}
