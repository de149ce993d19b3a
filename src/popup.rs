//! Popup launcher
//!
//! Entry surface that logs in when needed and then opens the panel. The panel may
//! only be opened from inside the user's click, so login has to finish (or be
//! skipped) before `open_panel` is called, within the same call chain.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::warn;

use crate::Result;
use crate::background::CoordinatorHandle;
use crate::platform::{Store, IS_LOGGED_IN};

/// Opens the side panel
#[async_trait]
pub trait PanelOpener: Send + Sync {
    async fn open_panel(&self) -> Result<()>;
}

/// The single button the popup offers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PopupAction {
    LoginThenOpen,
    Open,
}

impl PopupAction {
    pub fn label(&self) -> &'static str {
        match self {
            PopupAction::LoginThenOpen => "Login with Google",
            PopupAction::Open => "Open Email Summarizer",
        }
    }
}

/// What a click ended in
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PopupOutcome {
    Opened,
    LoginFailed(String),
}

pub struct Popup<O: PanelOpener> {
    store: Arc<dyn Store>,
    coordinator: CoordinatorHandle,
    opener: O,
}

impl<O: PanelOpener> Popup<O> {
    pub fn new(store: Arc<dyn Store>, coordinator: CoordinatorHandle, opener: O) -> Self {
        Self { store, coordinator, opener }
    }

    /// Which action to offer when the popup opens
    pub fn action(&self) -> PopupAction {
        if self.logged_in() {
            PopupAction::Open
        } else {
            PopupAction::LoginThenOpen
        }
    }

    /// Handle the button press
    pub async fn click(&self) -> Result<PopupOutcome> {
        // The flag may have changed since the popup opened; read it again
        if !self.logged_in() {
            let response = self.coordinator.login().await?;
            if !response.ok {
                let error = response.error.unwrap_or_else(|| "Unknown error".to_string());
                return Ok(PopupOutcome::LoginFailed(format!("Google login failed: {}", error)));
            }
        }

        self.opener.open_panel().await?;
        Ok(PopupOutcome::Opened)
    }

    fn logged_in(&self) -> bool {
        self.store.get_flag(IS_LOGGED_IN).unwrap_or_else(|e| {
            warn!("Could not read login flag: {}", e);
            false
        })
    }
}
