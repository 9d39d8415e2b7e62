//! Session-scoped analyzer config path.
//!
//! Derived from the first known workspace folder and cached for the rest of
//! the session. Racing resolvers compute the same value, so assignment is
//! idempotent and the cache needs no lock of its own.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock, PoisonError};

pub struct ConfigPathCache {
    file_name: String,
    folders: Mutex<Vec<PathBuf>>,
    resolved: OnceLock<PathBuf>,
}

impl ConfigPathCache {
    pub fn new(file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            folders: Mutex::new(Vec::new()),
            resolved: OnceLock::new(),
        }
    }

    /// Record the workspace folders announced by the editor.
    ///
    /// Has no effect on a path that is already resolved.
    pub fn set_workspace_folders(&self, folders: Vec<PathBuf>) {
        *self.folders.lock().unwrap_or_else(PoisonError::into_inner) = folders;
    }

    /// The cached config path, deriving it on first use.
    ///
    /// `None` until a workspace folder is known; the analyzer then runs with
    /// its default configuration.
    pub fn resolve(&self) -> Option<&Path> {
        if let Some(path) = self.resolved.get() {
            return Some(path);
        }

        let derived = {
            let folders = self.folders.lock().unwrap_or_else(PoisonError::into_inner);
            folders
                .iter()
                .find(|folder| !folder.as_os_str().is_empty())?
                .join(&self.file_name)
        };

        tracing::info!(path = %derived.display(), "Resolved analyzer config path");
        Some(self.resolved.get_or_init(|| derived))
    }
}
