//! BrowserFlow - runs the Google implicit grant through the system browser
//!
//! Opens the authorization URL in the user's browser and captures the redirect on a
//! loopback listener. Silent flows are bounded by a timeout so a provider that wants
//! interaction can never leave a refresh hanging.

use async_trait::async_trait;
use std::time::Duration;
use url::Url;
use crate::Result;
use crate::error::Error;
use super::callback_server::{bind, provider_error, redirect_uri, wait_for_redirect};
use super::flow::IdentityFlow;

/// Browser-based identity flow for desktop hosts
#[derive(Debug, Clone)]
pub struct BrowserFlow {
    port: u16,
    silent_timeout: Duration,
}

impl BrowserFlow {
    pub fn new(port: u16, silent_timeout: Duration) -> Self {
        Self { port, silent_timeout }
    }
}

#[async_trait]
impl IdentityFlow for BrowserFlow {
    fn redirect_uri(&self) -> String {
        redirect_uri(self.port)
    }

    async fn launch(&self, url: &str, interactive: bool) -> Result<String> {
        let listener = bind(self.port).await?;

        if interactive {
            eprintln!("\n🔐 Opening browser for Google authentication...\n");
            eprintln!("If the browser doesn't open, visit this URL:\n{}\n", url);
        }

        // Open browser
        if let Err(e) = open::that(url) {
            tracing::warn!("Failed to open browser: {}", e);
            if !interactive {
                return Err(Error::OAuth(format!("Failed to open browser: {}", e)));
            }
        }

        let redirect = if interactive {
            eprintln!("⏳ Waiting for authorization...");
            wait_for_redirect(listener, self.port).await?
        } else {
            tokio::time::timeout(self.silent_timeout, wait_for_redirect(listener, self.port))
                .await
                .map_err(|_| Error::OAuth("Silent authorization timed out".to_string()))??
        };

        // Provider errors come back in the fragment, same as tokens
        let fragment = Url::parse(&redirect)
            .ok()
            .and_then(|u| u.fragment().map(str::to_string))
            .unwrap_or_default();
        if let Some(message) = provider_error(&fragment) {
            return Err(Error::OAuth(message));
        }

        Ok(redirect)
    }
}
