//! Local persistence of the trial session token.
//!
//! The token is only a hint: the server decides what it refers to, and an
//! unknown token simply yields a fresh session.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::ClientError;

/// Somewhere to keep the session token between runs.
pub trait TokenStore: Send + Sync {
    fn load(&self) -> Result<Option<String>, ClientError>;
    fn save(&self, token: &str) -> Result<(), ClientError>;
    fn clear(&self) -> Result<(), ClientError>;
}

/// Token kept in a single file.
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
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> Result<Option<String>, ClientError> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) => {
                let token = contents.trim();
                Ok((!token.is_empty()).then(|| token.to_string()))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, token: &str) -> Result<(), ClientError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, token)?;
        Ok(())
    }

    fn clear(&self) -> Result<(), ClientError> {
        match std::fs::remove_file(&self.path) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}

/// Token kept for the lifetime of the process.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    token: Mutex<Option<String>>,
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> Result<Option<String>, ClientError> {
        Ok(self.token.lock().unwrap_or_else(|e| e.into_inner()).clone())
    }

    fn save(&self, token: &str) -> Result<(), ClientError> {
        *self.token.lock().unwrap_or_else(|e| e.into_inner()) = Some(token.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<(), ClientError> {
        *self.token.lock().unwrap_or_else(|e| e.into_inner()) = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_store_round_trips_and_clears() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTokenStore::new(dir.path().join("nested").join("trial_token"));

        assert_eq!(store.load().unwrap(), None);
        store.save("trial_1_abc").unwrap();
        assert_eq!(store.load().unwrap().as_deref(), Some("trial_1_abc"));

        store.clear().unwrap();
        assert_eq!(store.load().unwrap(), None);
        // Clearing twice is fine.
        store.clear().unwrap();
    }

    #[test]
    fn blank_file_reads_as_no_token() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trial_token");
        std::fs::write(&path, "  \n").unwrap();
        assert_eq!(FileTokenStore::new(path).load().unwrap(), None);
    }

    #[test]
    fn memory_store_overwrites() {
        let store = MemoryTokenStore::default();
        store.save("a").unwrap();
        store.save("b").unwrap();
        assert_eq!(store.load().unwrap().as_deref(), Some("b"));
    }
}
