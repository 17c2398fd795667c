use crate::error::{ClientError, ClientResult};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    /// Gemini reports its own turns as `model`.
    #[serde(alias = "model")]
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Client-side state for one uploaded document and its conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub document_name: String,
    pub document_id: Option<String>,
    pub messages: Vec<Message>,
}

/// A file chosen by the user, before it has been validated.
#[derive(Debug, Clone)]
pub struct SelectedFile {
    pub name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

pub const PDF_MIME_TYPE: &str = "application/pdf";
pub const REJECTED_NOTICE: &str = "Please upload a PDF file only.";

impl SelectedFile {
    /// Only an exact `application/pdf` declaration is accepted.
    pub fn ensure_pdf(&self) -> ClientResult<()> {
        if self.content_type == PDF_MIME_TYPE {
            Ok(())
        } else {
            Err(ClientError::Validation(REJECTED_NOTICE.to_string()))
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadPdfResponse {
    #[serde(default)]
    pub message: String,
    pub file_id: String,
    pub display_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendMessageRequest {
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatHistoryResponse {
    pub history: Vec<Message>,
    #[serde(default)]
    pub file_id: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewChatResponse {
    pub message: String,
}

/// Body accepted by the chat completion relay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<Message>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GeminiRequest {
    pub contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<GeminiContent>,
    pub generation_config: Option<GeminiGenerationConfig>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct GeminiContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GeminiPart {
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GeminiGenerationConfig {
    pub temperature: f32,
    pub max_output_tokens: u32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GeminiResponse {
    #[serde(default)]
    pub candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GeminiCandidate {
    /// Absent when a candidate was blocked or only reports a finish reason.
    #[serde(default)]
    pub content: GeminiContent,
}

impl GeminiContent {
    pub fn text(role: Option<&str>, text: impl Into<String>) -> Self {
        Self {
            role: role.map(str::to_string),
            parts: vec![GeminiPart { text: text.into() }],
        }
    }
}

impl From<&Message> for GeminiContent {
    fn from(message: &Message) -> Self {
        let role = match message.role {
            Role::User => "user",
            Role::Assistant => "model",
        };
        GeminiContent::text(Some(role), message.content.clone())
    }
}

impl GeminiResponse {
    /// Concatenated text of the first candidate, if any.
    pub fn first_text(&self) -> Option<String> {
        let candidate = self.candidates.first()?;
        let text: String = candidate
            .content
            .parts
            .iter()
            .map(|p| p.text.as_str())
            .collect();
        Some(text)
    }
}
