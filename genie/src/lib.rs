pub mod models;
pub mod error;
pub mod formatter;
pub mod session;
pub mod backend_client;
pub mod chat_flow;
pub mod upload_flow;
pub mod provider;
pub mod gemini_service;

pub use models::*;
pub use error::{ClientError, ClientResult};
pub use formatter::{format, render_plain, DisplayNode, Span};
pub use session::{init_session, teardown_session, MemorySessionStore, SessionStore};
pub use backend_client::{DocumentBackend, HttpDocumentBackend};
pub use chat_flow::{ChatFlow, ChatState, SubmitOutcome};
pub use upload_flow::{UploadFlow, UploadOutcome, UploadState};
pub use provider::{ChatProvider, TextStream};
pub use gemini_service::GeminiService;
