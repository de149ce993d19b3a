//! Persisted key-value storage
//!
//! Mirrors the extension's local storage area: a flat JSON object that survives
//! restarts, read and written by every component.

use serde_json::{Map, Value};
use std::path::PathBuf;
use std::sync::Mutex;
use crate::Result;
use crate::error::Error;

/// Access token string
pub const TOKEN: &str = "googleToken";

/// Token expiry, epoch milliseconds
pub const TOKEN_EXPIRY: &str = "googleTokenExpiry";

/// Whether a login has succeeded and not been revoked since
pub const IS_LOGGED_IN: &str = "isLoggedIn";

/// Process-wide key-value store
pub trait Store: Send + Sync {
    /// Read a single key
    fn get(&self, key: &str) -> Result<Option<Value>>;

    /// Write all entries in one operation
    fn set(&self, entries: &[(&str, Value)]) -> Result<()>;

    /// Remove all keys in one operation
    fn remove(&self, keys: &[&str]) -> Result<()>;

    fn get_str(&self, key: &str) -> Result<Option<String>> {
        Ok(self.get(key)?.and_then(|v| v.as_str().map(str::to_string)))
    }

    fn get_i64(&self, key: &str) -> Result<Option<i64>> {
        Ok(self.get(key)?.and_then(|v| v.as_i64()))
    }

    /// Missing or non-boolean values read as `false`
    fn get_flag(&self, key: &str) -> Result<bool> {
        Ok(self.get(key)?.and_then(|v| v.as_bool()).unwrap_or(false))
    }
}

/// In-memory store, used by tests and throwaway sessions
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<Map<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything currently stored
    pub fn snapshot(&self) -> Map<String, Value> {
        self.entries.lock().map(|m| m.clone()).unwrap_or_default()
    }
}

impl Store for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        let entries = self.entries.lock().map_err(|_| poisoned())?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, new_entries: &[(&str, Value)]) -> Result<()> {
        let mut entries = self.entries.lock().map_err(|_| poisoned())?;
        for (key, value) in new_entries {
            entries.insert((*key).to_string(), value.clone());
        }
        Ok(())
    }

    fn remove(&self, keys: &[&str]) -> Result<()> {
        let mut entries = self.entries.lock().map_err(|_| poisoned())?;
        for key in keys {
            entries.remove(*key);
        }
        Ok(())
    }
}

/// Store backed by a JSON file, rewritten in full on every change
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    entries: Mutex<Map<String, Value>>,
}

impl JsonFileStore {
    /// Open the store, starting empty if the file does not exist yet
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let entries = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            if content.trim().is_empty() {
                Map::new()
            } else {
                match serde_json::from_str::<Value>(&content)? {
                    Value::Object(map) => map,
                    _ => return Err(Error::Store(format!("{:?} does not hold a JSON object", path))),
                }
            }
        } else {
            Map::new()
        };

        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    fn persist(&self, entries: &Map<String, Value>) -> Result<()> {
        // Create parent directory
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        // Write then rename so a crash never leaves half a file behind
        let tmp = self.path.with_extension("json.tmp");
        let content = serde_json::to_string_pretty(entries)?;
        std::fs::write(&tmp, content)?;

        // Set restrictive permissions on Unix
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            std::fs::set_permissions(&tmp, perms)?;
        }

        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl Store for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        let entries = self.entries.lock().map_err(|_| poisoned())?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, new_entries: &[(&str, Value)]) -> Result<()> {
        let mut entries = self.entries.lock().map_err(|_| poisoned())?;
        let mut next = entries.clone();
        for (key, value) in new_entries {
            next.insert((*key).to_string(), value.clone());
        }
        self.persist(&next)?;
        *entries = next;
        Ok(())
    }

    fn remove(&self, keys: &[&str]) -> Result<()> {
        let mut entries = self.entries.lock().map_err(|_| poisoned())?;
        let mut next = entries.clone();
        for key in keys {
            next.remove(*key);
        }
        self.persist(&next)?;
        *entries = next;
        Ok(())
    }
}

fn poisoned() -> Error {
    Error::Store("storage lock poisoned".to_string())
}
