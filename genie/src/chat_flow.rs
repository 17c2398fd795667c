use crate::backend_client::DocumentBackend;
use crate::error::ClientResult;
use crate::formatter::{format, DisplayNode};
use crate::models::{Message, Role, Session};
use crate::session::{init_session, teardown_session, SessionStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatState {
    Idle,
    Sending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatEvent {
    Submit,
    Complete,
}

impl ChatState {
    /// The only allowed transitions; anything else is rejected.
    pub fn next(self, event: ChatEvent) -> Option<ChatState> {
        match (self, event) {
            (ChatState::Idle, ChatEvent::Submit) => Some(ChatState::Sending),
            (ChatState::Sending, ChatEvent::Complete) => Some(ChatState::Idle),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Empty input or a request already outstanding.
    Ignored,
    Answered,
    Failed(String),
}

pub struct ChatFlow {
    session: Session,
    input: String,
    state: ChatState,
}

impl ChatFlow {
    /// Enters the chat view; fails with `MissingDocument` when nothing was uploaded.
    pub fn enter<S: SessionStore + ?Sized>(store: &S) -> ClientResult<Self> {
        let session = init_session(store)?;
        log::info!("Chat session started for {}", session.document_name);

        Ok(Self {
            session,
            input: String::new(),
            state: ChatState::Idle,
        })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn messages(&self) -> &[Message] {
        &self.session.messages
    }

    pub fn state(&self) -> ChatState {
        self.state
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn set_input(&mut self, text: impl Into<String>) {
        if self.input_enabled() {
            self.input = text.into();
        }
    }

    pub fn input_enabled(&self) -> bool {
        self.state == ChatState::Idle
    }

    /// Accepts `text` if it is non-blank and nothing is in flight.
    pub fn begin_submit(&mut self, text: &str) -> Option<OutgoingMessage> {
        if text.trim().is_empty() {
            return None;
        }
        let next = self.state.next(ChatEvent::Submit)?;

        self.session.messages.push(Message::user(text));
        self.input.clear();
        self.state = next;

        Some(OutgoingMessage {
            text: text.to_string(),
        })
    }

    /// Ends the outstanding request. A successful reply replaces the whole
    /// history; on failure the user's message is kept as is.
    pub fn complete(&mut self, result: ClientResult<Vec<Message>>) -> SubmitOutcome {
        let Some(next) = self.state.next(ChatEvent::Complete) else {
            log::warn!("Ignoring completion while no request is outstanding");
            return SubmitOutcome::Ignored;
        };
        self.state = next;

        match result {
            Ok(history) => {
                self.session.messages = history;
                SubmitOutcome::Answered
            }
            Err(e) => {
                log::error!("Error sending message: {}", e);
                SubmitOutcome::Failed(e.to_string())
            }
        }
    }

    pub async fn submit<B: DocumentBackend + ?Sized>(&mut self, backend: &B, text: &str) -> SubmitOutcome {
        let Some(outgoing) = self.begin_submit(text) else {
            return SubmitOutcome::Ignored;
        };

        let result = backend.send_message(&outgoing.text).await;
        self.complete(result)
    }

    /// Submits whatever is in the input buffer.
    pub async fn submit_input<B: DocumentBackend + ?Sized>(&mut self, backend: &B) -> SubmitOutcome {
        let text = self.input.clone();
        self.submit(backend, &text).await
    }

    /// Back to upload: forget the document.
    pub fn leave<S: SessionStore + ?Sized>(self, store: &mut S) {
        teardown_session(store);
        log::info!("Left chat for {}", self.session.document_name);
    }

    pub fn render(&self) -> Vec<(Role, Vec<DisplayNode>)> {
        self.session
            .messages
            .iter()
            .map(|m| (m.role, format(&m.content)))
            .collect()
    }
}
