// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::StorageError;

/// Fixed key the session token is persisted under
pub const TOKEN_KEY: &str = "token";

/// Durable storage for the session token, surviving process restarts
pub trait TokenStore {
    /// Load the persisted token, if any
    fn load(&self) -> Result<Option<String>, StorageError>;

    /// Persist a token, replacing any previous one
    fn save(&mut self, token: &str) -> Result<(), StorageError>;

    /// Remove the persisted token
    fn clear(&mut self) -> Result<(), StorageError>;
}

/// Token store backed by a small JSON file of key/value entries
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_entries(&self) -> Result<BTreeMap<String, String>, StorageError> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }

        let content =
            std::fs::read_to_string(&self.path).map_err(|e| StorageError::ReadFailed {
                path: self.path.clone(),
                source: e,
            })?;

        serde_json::from_str(&content).map_err(|e| StorageError::JsonParseFailed {
            path: self.path.clone(),
            source: e,
        })
    }

    fn write_entries(&self, entries: &BTreeMap<String, String>) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| StorageError::WriteFailed {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let json = serde_json::to_string_pretty(entries)?;
        let staging = self.staging_path();

        // The token only ever becomes visible at its final path once complete
        if let Err(e) = write_private(&staging, json.as_bytes()) {
            let _ = std::fs::remove_file(&staging);
            return Err(StorageError::WriteFailed {
                path: staging,
                source: e,
            });
        }

        std::fs::rename(&staging, &self.path).map_err(|e| {
            let _ = std::fs::remove_file(&staging);
            StorageError::WriteFailed {
                path: self.path.clone(),
                source: e,
            }
        })
    }

    fn staging_path(&self) -> PathBuf {
        let mut name = OsString::from(self.path.as_os_str());
        name.push(".tmp");
        PathBuf::from(name)
    }
}

/// Write a file readable by its owner only
fn write_private(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path)?;
    // mode() only applies on creation; a leftover staging file keeps its bits
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
    }
    file.write_all(contents)?;
    file.sync_all()
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> Result<Option<String>, StorageError> {
        let entries = self.read_entries()?;
        Ok(entries.get(TOKEN_KEY).filter(|t| !t.is_empty()).cloned())
    }

    fn save(&mut self, token: &str) -> Result<(), StorageError> {
        let mut entries = self.read_entries().unwrap_or_default();
        entries.insert(TOKEN_KEY.to_string(), token.to_string());
        self.write_entries(&entries)
    }

    fn clear(&mut self) -> Result<(), StorageError> {
        // A corrupt file holds nothing worth keeping
        let mut entries = self.read_entries().unwrap_or_default();
        entries.remove(TOKEN_KEY);

        if entries.is_empty() {
            if self.path.exists() {
                std::fs::remove_file(&self.path).map_err(|e| StorageError::RemoveFailed {
                    path: self.path.clone(),
                    source: e,
                })?;
            }
            return Ok(());
        }

        self.write_entries(&entries)
    }
}

/// Token store that lives only as long as the process
#[derive(Debug, Clone, Default)]
pub struct MemoryTokenStore {
    entries: BTreeMap<String, String>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that already holds a token
    pub fn with_token(token: impl Into<String>) -> Self {
        let mut entries = BTreeMap::new();
        entries.insert(TOKEN_KEY.to_string(), token.into());
        Self { entries }
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> Result<Option<String>, StorageError> {
        Ok(self.entries.get(TOKEN_KEY).cloned())
    }

    fn save(&mut self, token: &str) -> Result<(), StorageError> {
        self.entries.insert(TOKEN_KEY.to_string(), token.to_string());
        Ok(())
    }

    fn clear(&mut self) -> Result<(), StorageError> {
        self.entries.remove(TOKEN_KEY);
        Ok(())
    }
}
