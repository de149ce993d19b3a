//! In-memory session token mirrored into the persisted store

use serde_json::json;
use crate::Result;
use crate::platform::{Store, IS_LOGGED_IN, TOKEN, TOKEN_EXPIRY};

/// Refresh this long before the token expires
pub const REFRESH_LEAD_MS: i64 = 5 * 60 * 1000;

/// Never schedule a refresh sooner than this
pub const MIN_REFRESH_DELAY_MS: i64 = 5_000;

/// The bearer token held by the background coordinator
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    token: Option<String>,
    expiry_ms: i64,
}

impl Session {
    pub fn new(token: impl Into<String>, expiry_ms: i64) -> Self {
        Self {
            token: Some(token.into()),
            expiry_ms,
        }
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn expiry_ms(&self) -> i64 {
        self.expiry_ms
    }

    /// A token is trusted only strictly before its expiry instant
    pub fn is_valid(&self, now_ms: i64) -> bool {
        self.token.is_some() && now_ms < self.expiry_ms
    }

    /// When the refresh alarm for this session should fire
    pub fn refresh_at(&self, now_ms: i64) -> i64 {
        refresh_time(self.expiry_ms, now_ms)
    }

    /// Read the persisted token. Missing values read as no token and expiry 0.
    pub fn load(store: &dyn Store) -> Result<Self> {
        Ok(Self {
            token: store.get_str(TOKEN)?.filter(|t| !t.is_empty()),
            expiry_ms: store.get_i64(TOKEN_EXPIRY)?.unwrap_or(0),
        })
    }

    /// Persist token and expiry together, then raise the login flag
    pub fn save(&self, store: &dyn Store) -> Result<()> {
        store.set(&[
            (TOKEN, json!(self.token)),
            (TOKEN_EXPIRY, json!(self.expiry_ms)),
        ])?;
        store.set(&[(IS_LOGGED_IN, json!(self.token.is_some()))])
    }

    /// Drop token and expiry from the store, then lower the login flag
    pub fn clear(store: &dyn Store) -> Result<()> {
        store.remove(&[TOKEN, TOKEN_EXPIRY])?;
        store.set(&[(IS_LOGGED_IN, json!(false))])
    }
}

/// `max(expiry - 5min, now + 5s)`
pub fn refresh_time(expiry_ms: i64, now_ms: i64) -> i64 {
    (expiry_ms - REFRESH_LEAD_MS).max(now_ms + MIN_REFRESH_DELAY_MS)
}
