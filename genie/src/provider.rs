use crate::models::Message;
use anyhow::Result;
use async_trait::async_trait;
use futures::stream::BoxStream;

/// Incremental text from the model, in arrival order.
pub type TextStream = BoxStream<'static, Result<String>>;

pub const ASSISTANT_PROMPT: &str = r#"You are Genie, a helpful AI assistant that specializes in analyzing and answering questions about PDF documents.

When users ask questions about the PDF they've uploaded, provide clear, accurate, and helpful responses based on the document's content.

Always be friendly and professional in your responses. If you cannot find specific information in the PDF, let the user know and suggest alternative ways to help them."#;

const MAX_DOCUMENT_CHARS: usize = 400_000;

/// The assistant prompt followed by the extracted document text.
pub fn document_prompt(display_name: &str, document_text: &str) -> String {
    let text = match document_text.char_indices().nth(MAX_DOCUMENT_CHARS) {
        Some((cut, _)) => {
            log::warn!(
                "{} is longer than {} characters; the rest is left out of the prompt",
                display_name,
                MAX_DOCUMENT_CHARS
            );
            &document_text[..cut]
        }
        None => document_text,
    };
    format!(
        "{ASSISTANT_PROMPT}\n\nUPLOADED DOCUMENT: {display_name}\n\nDOCUMENT CONTENT:\n{text}"
    )
}

#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// One complete reply to `history`.
    async fn generate(&self, system: &str, history: &[Message]) -> Result<String>;

    /// The reply to `history` as it is produced. Errors before the first
    /// chunk are returned directly; later ones arrive in the stream.
    async fn stream(&self, system: &str, history: &[Message]) -> Result<TextStream>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_prompt_contains_persona_and_text() {
        let prompt = document_prompt("policy.pdf", "Section 1. Coverage.");
        assert!(prompt.starts_with(ASSISTANT_PROMPT));
        assert!(prompt.contains("UPLOADED DOCUMENT: policy.pdf"));
        assert!(prompt.ends_with("Section 1. Coverage."));
    }

    #[test]
    fn document_prompt_is_bounded() {
        let long = "x".repeat(MAX_DOCUMENT_CHARS + 10);
        let prompt = document_prompt("big.pdf", &long);
        assert!(prompt.len() < ASSISTANT_PROMPT.len() + MAX_DOCUMENT_CHARS + 100);
        assert!(prompt.ends_with(&"x".repeat(MAX_DOCUMENT_CHARS)));
    }

    #[test]
    fn document_at_the_limit_is_kept_whole() {
        let exact = "é".repeat(MAX_DOCUMENT_CHARS);
        let prompt = document_prompt("exact.pdf", &exact);
        assert!(prompt.ends_with(&exact));

        let over = format!("{}tail", exact);
        let prompt = document_prompt("over.pdf", &over);
        assert!(prompt.ends_with(&exact));
        assert!(!prompt.contains("tail"));
    }
}
