//! Page agent - reads the text of the loaded email

use std::path::PathBuf;
use crate::protocol::{AgentRequest, EmailText};

/// A loaded document the agent can read from
pub trait Document: Send + Sync {
    /// Visible primary text, or `None` when the document has none
    fn primary_text(&self) -> Option<String>;
}

/// A document whose content is already in memory
#[derive(Debug, Clone, Default)]
pub struct TextDocument {
    body: Option<String>,
}

impl TextDocument {
    pub fn new(body: impl Into<String>) -> Self {
        Self { body: Some(body.into()) }
    }

    /// A page with no email open
    pub fn blank() -> Self {
        Self { body: None }
    }
}

impl Document for TextDocument {
    fn primary_text(&self) -> Option<String> {
        self.body.clone()
    }
}

/// A document backed by a file, re-read on every request
#[derive(Debug, Clone)]
pub struct FileDocument {
    path: PathBuf,
}

impl FileDocument {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Document for FileDocument {
    fn primary_text(&self) -> Option<String> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => Some(content),
            Err(e) => {
                tracing::debug!("Could not read {:?}: {}", self.path, e);
                None
            }
        }
    }
}

/// Stateless responder installed into a page
#[derive(Debug, Clone, Copy, Default)]
pub struct PageAgent;

impl PageAgent {
    pub fn handle(&self, request: AgentRequest, document: &dyn Document) -> EmailText {
        match request {
            AgentRequest::GetEmailText => EmailText {
                text: document.primary_text().unwrap_or_default(),
            },
        }
    }
}
