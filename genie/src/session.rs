use crate::error::{ClientError, ClientResult};
use crate::models::Session;
use std::collections::HashMap;

pub const DOCUMENT_NAME_KEY: &str = "pdfFileName";
pub const DOCUMENT_ID_KEY: &str = "uploadedFileId";

/// Session-scoped key/value storage for the active document.
pub trait SessionStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: &str);
    fn remove(&mut self, key: &str);
}

/// Lives as long as the process; nothing is written to disk.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    values: HashMap<String, String>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl SessionStore for MemorySessionStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) {
        self.values.insert(key.to_string(), value.to_string());
    }

    fn remove(&mut self, key: &str) {
        self.values.remove(key);
    }
}

pub fn persist_document<S: SessionStore + ?Sized>(store: &mut S, display_name: &str, file_id: &str) {
    store.set(DOCUMENT_NAME_KEY, display_name);
    store.set(DOCUMENT_ID_KEY, file_id);
}

pub fn init_session<S: SessionStore + ?Sized>(store: &S) -> ClientResult<Session> {
    let document_name = store
        .get(DOCUMENT_NAME_KEY)
        .filter(|name| !name.is_empty())
        .ok_or(ClientError::MissingDocument)?;

    let document_id = store.get(DOCUMENT_ID_KEY);
    if document_id.is_none() {
        log::warn!("Session for {} has no document id", document_name);
    }

    Ok(Session {
        document_name,
        document_id,
        messages: Vec::new(),
    })
}

pub fn teardown_session<S: SessionStore + ?Sized>(store: &mut S) {
    store.remove(DOCUMENT_NAME_KEY);
    store.remove(DOCUMENT_ID_KEY);
}
