use crate::error::{ClientError, ClientResult};
use crate::models::*;
use async_trait::async_trait;
use reqwest::{multipart, Client, Response};
use std::env;

pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8000";

/// The document-aware backend as seen by the client flows.
#[async_trait]
pub trait DocumentBackend: Send + Sync {
    async fn upload_pdf(&self, file: &SelectedFile) -> ClientResult<UploadPdfResponse>;

    /// Returns the full, authoritative conversation after `message`.
    async fn send_message(&self, message: &str) -> ClientResult<Vec<Message>>;

    async fn new_chat(&self) -> ClientResult<()>;
}

pub struct HttpDocumentBackend {
    client: Client,
    base_url: String,
}

impl HttpDocumentBackend {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Reads `GENIE_BACKEND_URL`, falling back to the local default.
    pub fn from_env() -> Self {
        let base_url = env::var("GENIE_BACKEND_URL").unwrap_or_else(|_| DEFAULT_BACKEND_URL.to_string());
        Self::new(base_url)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn check(response: Response) -> ClientResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(ClientError::Backend {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl DocumentBackend for HttpDocumentBackend {
    async fn upload_pdf(&self, file: &SelectedFile) -> ClientResult<UploadPdfResponse> {
        file.ensure_pdf()?;

        let part = multipart::Part::bytes(file.bytes.clone())
            .file_name(file.name.clone())
            .mime_str(&file.content_type)?;
        let form = multipart::Form::new().part("file", part);

        let response = self.client
            .post(self.url("upload_pdf"))
            .multipart(form)
            .send()
            .await?;

        let uploaded: UploadPdfResponse = Self::check(response).await?.json().await?;
        Ok(uploaded)
    }

    async fn send_message(&self, message: &str) -> ClientResult<Vec<Message>> {
        let request = SendMessageRequest {
            message: message.to_string(),
        };

        let response = self.client
            .post(self.url("send_message"))
            .json(&request)
            .send()
            .await?;

        let reply: ChatHistoryResponse = Self::check(response).await?.json().await?;
        Ok(reply.history)
    }

    async fn new_chat(&self) -> ClientResult<()> {
        let response = self.client
            .post(self.url("new_chat"))
            .send()
            .await?;

        Self::check(response).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_trailing_slash_is_dropped() {
        let backend = HttpDocumentBackend::new("http://example.test:8000/");
        assert_eq!(backend.base_url(), "http://example.test:8000");
        assert_eq!(backend.url("upload_pdf"), "http://example.test:8000/upload_pdf");
    }

    #[tokio::test]
    async fn unreachable_backend_is_a_network_error() {
        // port 9 (discard) is essentially never listening on loopback
        let backend = HttpDocumentBackend::new("http://127.0.0.1:9");
        let result = backend.send_message("hello").await;
        assert!(matches!(result, Err(ClientError::Network(_))));
    }

    #[tokio::test]
    async fn non_pdf_upload_fails_before_the_network() {
        let backend = HttpDocumentBackend::new("http://127.0.0.1:9");
        let file = SelectedFile {
            name: "notes.txt".to_string(),
            content_type: "text/plain".to_string(),
            bytes: b"hello".to_vec(),
        };

        let result = backend.upload_pdf(&file).await;
        assert!(matches!(result, Err(ClientError::Validation(_))));
    }
}
