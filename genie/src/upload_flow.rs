use crate::backend_client::DocumentBackend;
use crate::models::SelectedFile;
use crate::session::{persist_document, SessionStore};

pub use crate::models::REJECTED_NOTICE;
pub const FAILED_NOTICE: &str = "Failed to upload file.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadState {
    Idle,
    Uploading,
    Redirected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadEvent {
    Accept,
    Succeed,
    Fail,
}

impl UploadState {
    pub fn next(self, event: UploadEvent) -> Option<UploadState> {
        match (self, event) {
            (UploadState::Idle, UploadEvent::Accept) => Some(UploadState::Uploading),
            (UploadState::Uploading, UploadEvent::Succeed) => Some(UploadState::Redirected),
            (UploadState::Uploading, UploadEvent::Fail) => Some(UploadState::Idle),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    /// Nothing to do: no file, or the flow is busy or finished.
    Ignored,
    Rejected(String),
    Failed(String),
    Redirected { display_name: String, file_id: String },
}

pub struct UploadFlow {
    state: UploadState,
}

impl Default for UploadFlow {
    fn default() -> Self {
        Self::new()
    }
}

impl UploadFlow {
    pub fn new() -> Self {
        Self {
            state: UploadState::Idle,
        }
    }

    pub fn state(&self) -> UploadState {
        self.state
    }

    /// Drag-and-drop entry point; only the first file counts.
    pub async fn drop_files<B, S>(&mut self, files: Vec<SelectedFile>, backend: &B, store: &mut S) -> UploadOutcome
    where
        B: DocumentBackend + ?Sized,
        S: SessionStore + ?Sized,
    {
        match files.into_iter().next() {
            Some(file) => self.handle_file(file, backend, store).await,
            None => UploadOutcome::Ignored,
        }
    }

    /// File-picker entry point.
    pub async fn pick_file<B, S>(&mut self, file: Option<SelectedFile>, backend: &B, store: &mut S) -> UploadOutcome
    where
        B: DocumentBackend + ?Sized,
        S: SessionStore + ?Sized,
    {
        match file {
            Some(file) => self.handle_file(file, backend, store).await,
            None => UploadOutcome::Ignored,
        }
    }

    async fn handle_file<B, S>(&mut self, file: SelectedFile, backend: &B, store: &mut S) -> UploadOutcome
    where
        B: DocumentBackend + ?Sized,
        S: SessionStore + ?Sized,
    {
        if self.state != UploadState::Idle {
            log::warn!("Ignoring {} while upload is {:?}", file.name, self.state);
            return UploadOutcome::Ignored;
        }

        if let Err(e) = file.ensure_pdf() {
            log::info!("Rejected {} ({})", file.name, file.content_type);
            return UploadOutcome::Rejected(e.to_string());
        }

        if !self.apply(UploadEvent::Accept) {
            return UploadOutcome::Ignored;
        }
        log::info!("Uploading {} ({} bytes)", file.name, file.bytes.len());

        match backend.upload_pdf(&file).await {
            Ok(uploaded) => {
                persist_document(store, &uploaded.display_name, &uploaded.file_id);
                self.apply(UploadEvent::Succeed);
                UploadOutcome::Redirected {
                    display_name: uploaded.display_name,
                    file_id: uploaded.file_id,
                }
            }
            Err(e) => {
                log::error!("Upload of {} failed: {}", file.name, e);
                self.apply(UploadEvent::Fail);
                UploadOutcome::Failed(FAILED_NOTICE.to_string())
            }
        }
    }

    fn apply(&mut self, event: UploadEvent) -> bool {
        match self.state.next(event) {
            Some(next) => {
                self.state = next;
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ClientError, ClientResult};
    use crate::models::{Message, UploadPdfResponse, PDF_MIME_TYPE};
    use crate::session::{init_session, MemorySessionStore};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct StubBackend {
        uploads: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl DocumentBackend for StubBackend {
        async fn upload_pdf(&self, file: &SelectedFile) -> ClientResult<UploadPdfResponse> {
            self.uploads.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(ClientError::Backend {
                    status: 400,
                    body: "bad".to_string(),
                });
            }
            Ok(UploadPdfResponse {
                message: "PDF uploaded and session started.".to_string(),
                file_id: "files/42".to_string(),
                display_name: file.name.clone(),
            })
        }

        async fn send_message(&self, _message: &str) -> ClientResult<Vec<Message>> {
            unreachable!("upload flow never chats")
        }

        async fn new_chat(&self) -> ClientResult<()> {
            Ok(())
        }
    }

    fn file(name: &str, content_type: &str) -> SelectedFile {
        SelectedFile {
            name: name.to_string(),
            content_type: content_type.to_string(),
            bytes: b"%PDF-1.4".to_vec(),
        }
    }

    #[test]
    fn transition_table() {
        assert_eq!(UploadState::Idle.next(UploadEvent::Accept), Some(UploadState::Uploading));
        assert_eq!(UploadState::Uploading.next(UploadEvent::Succeed), Some(UploadState::Redirected));
        assert_eq!(UploadState::Uploading.next(UploadEvent::Fail), Some(UploadState::Idle));
        assert_eq!(UploadState::Redirected.next(UploadEvent::Accept), None);
        assert_eq!(UploadState::Idle.next(UploadEvent::Succeed), None);
    }

    #[tokio::test]
    async fn non_pdf_never_reaches_backend() {
        let backend = StubBackend::default();
        let mut store = MemorySessionStore::new();
        let mut flow = UploadFlow::new();

        let outcome = flow
            .pick_file(Some(file("notes.txt", "text/plain")), &backend, &mut store)
            .await;

        assert_eq!(outcome, UploadOutcome::Rejected(REJECTED_NOTICE.to_string()));
        assert_eq!(backend.uploads.load(Ordering::SeqCst), 0);
        assert!(store.is_empty());
        assert_eq!(flow.state(), UploadState::Idle);
    }

    #[tokio::test]
    async fn pdf_mime_must_match_exactly() {
        let backend = StubBackend::default();
        let mut store = MemorySessionStore::new();
        let mut flow = UploadFlow::new();

        let outcome = flow
            .pick_file(Some(file("a.pdf", "application/pdf; charset=binary")), &backend, &mut store)
            .await;
        assert!(matches!(outcome, UploadOutcome::Rejected(_)));
    }

    #[tokio::test]
    async fn success_persists_and_redirects() {
        let backend = StubBackend::default();
        let mut store = MemorySessionStore::new();
        let mut flow = UploadFlow::new();

        let outcome = flow
            .pick_file(Some(file("policy.pdf", PDF_MIME_TYPE)), &backend, &mut store)
            .await;

        assert_eq!(
            outcome,
            UploadOutcome::Redirected {
                display_name: "policy.pdf".to_string(),
                file_id: "files/42".to_string(),
            }
        );
        assert_eq!(flow.state(), UploadState::Redirected);

        let session = init_session(&store).unwrap();
        assert_eq!(session.document_name, "policy.pdf");
        assert_eq!(session.document_id.as_deref(), Some("files/42"));

        // finished flows take no more files
        let again = flow
            .pick_file(Some(file("other.pdf", PDF_MIME_TYPE)), &backend, &mut store)
            .await;
        assert_eq!(again, UploadOutcome::Ignored);
        assert_eq!(backend.uploads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failure_returns_to_idle_and_allows_retry() {
        let backend = StubBackend {
            fail: true,
            ..Default::default()
        };
        let mut store = MemorySessionStore::new();
        let mut flow = UploadFlow::new();

        let outcome = flow
            .pick_file(Some(file("policy.pdf", PDF_MIME_TYPE)), &backend, &mut store)
            .await;
        assert_eq!(outcome, UploadOutcome::Failed(FAILED_NOTICE.to_string()));
        assert_eq!(flow.state(), UploadState::Idle);
        assert!(store.is_empty());

        flow.pick_file(Some(file("policy.pdf", PDF_MIME_TYPE)), &backend, &mut store)
            .await;
        assert_eq!(backend.uploads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn drop_uses_first_file_only() {
        let backend = StubBackend::default();
        let mut store = MemorySessionStore::new();
        let mut flow = UploadFlow::new();

        let files = vec![file("first.pdf", PDF_MIME_TYPE), file("second.pdf", PDF_MIME_TYPE)];
        let outcome = flow.drop_files(files, &backend, &mut store).await;

        assert!(matches!(outcome, UploadOutcome::Redirected { ref display_name, .. } if display_name == "first.pdf"));
        assert_eq!(backend.uploads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn empty_drop_is_ignored() {
        let backend = StubBackend::default();
        let mut store = MemorySessionStore::new();
        let mut flow = UploadFlow::new();

        assert_eq!(flow.drop_files(Vec::new(), &backend, &mut store).await, UploadOutcome::Ignored);
        assert_eq!(flow.pick_file(None, &backend, &mut store).await, UploadOutcome::Ignored);
    }
}
