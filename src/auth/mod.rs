//! Authentication module for the Google implicit grant
//!
//! This module provides:
//! - Authorization URL building and redirect-fragment parsing
//! - The [`Session`] token and its persisted mirror
//! - A loopback callback server that captures the redirect fragment
//! - [`BrowserFlow`], the desktop [`IdentityFlow`]

mod callback_server;
mod flow;
mod provider;
mod session;

pub use callback_server::CALLBACK_PORT;
pub use flow::{
    build_auth_url, parse_fragment, parse_redirect, IdentityFlow, Prompt, TokenGrant,
    DEFAULT_EXPIRES_IN_SECS, GOOGLE_AUTH_URL, GOOGLE_SCOPES,
};
pub use provider::BrowserFlow;
pub use session::{refresh_time, Session, MIN_REFRESH_DELAY_MS, REFRESH_LEAD_MS};

#[cfg(test)]
pub use flow::FakeIdentityFlow;
