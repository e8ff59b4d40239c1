//! Durable key-value settings store.
//!
//! Each key is a JSON file in the platform-appropriate config directory:
//! - Linux: `~/.config/sharecircle/`
//! - macOS: `~/Library/Application Support/sharecircle/`
//! - Windows: `%APPDATA%\sharecircle\`
//!
//! Tests point a [`Storage`] at a temp dir instead.

use std::path::PathBuf;

use serde::{de::DeserializeOwned, Serialize};

const APP_DIR: &str = "sharecircle";

/// Handle to a directory of JSON key-value files.
#[derive(Debug, Clone)]
pub struct Storage {
    dir: PathBuf,
}

impl Storage {
    /// Open the platform config directory for the app.
    ///
    /// Returns `None` if no config directory exists on this platform or it
    /// cannot be created.
    pub fn open() -> Option<Self> {
        let dir = dirs::config_dir()?.join(APP_DIR);
        if !dir.exists() {
            std::fs::create_dir_all(&dir).ok()?;
        }
        Some(Self { dir })
    }

    /// Use an explicit directory (created if missing).
    pub fn with_dir(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        let _ = std::fs::create_dir_all(&dir);
        Self { dir }
    }

    /// Save a value under a key.
    ///
    /// Returns `true` if the operation succeeded.
    pub fn save<T: Serialize>(&self, key: &str, value: &T) -> bool {
        match serde_json::to_string(value) {
            Ok(json) => std::fs::write(self.file_path(key), json).is_ok(),
            Err(_) => false,
        }
    }

    /// Load a value by key.
    ///
    /// Returns `None` if the key doesn't exist or deserialization fails.
    pub fn load<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let json = std::fs::read_to_string(self.file_path(key)).ok()?;
        serde_json::from_str(&json).ok()
    }

    /// Remove a key.
    pub fn remove(&self, key: &str) {
        let _ = std::fs::remove_file(self.file_path(key));
    }

    /// Check if a key exists.
    pub fn exists(&self, key: &str) -> bool {
        self.file_path(key).exists()
    }

    fn file_path(&self, key: &str) -> PathBuf {
        // Sanitize key to be a valid filename
        let safe_key = key.replace(['/', '\\', ':', '*', '?', '"', '<', '>', '|'], "_");
        self.dir.join(format!("{safe_key}.json"))
    }
}
