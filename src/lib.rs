//! Mailsense - categorize and summarize the email you are reading
//!
//! The crate is split along the lines of a browser extension: a page agent that
//! reads the email, a panel controller that drives the user action, a background
//! coordinator that owns the Google token and calls the summarize service, and a
//! popup launcher that logs in and opens the panel.

pub mod auth;
pub mod background;
pub mod config;
pub mod error;
pub mod host;
pub mod page;
pub mod panel;
pub mod platform;
pub mod popup;
pub mod protocol;
pub mod retry;
pub mod tabs;
pub mod ui;

pub use error::{Error, Result};
