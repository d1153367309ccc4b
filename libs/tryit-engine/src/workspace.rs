//! Temporary file lifecycle for one execution request.
//!
//! Every request gets a uniquely named source file (and, for compiled
//! languages, a sibling binary path) inside one shared temp directory.
//! Uniqueness comes from a UUID in the file name, so concurrent requests
//! never contend on paths and no locking is needed.
//!
//! The cleanup invariant: every allocated workspace is deleted before the
//! request completes, on success and failure alike. Deletion failures are
//! logged and swallowed - a binary that was never produced must not abort
//! cleanup of the source file.

use std::path::{Path, PathBuf};

use tracing::warn;
use uuid::Uuid;

use crate::error::EngineError;

/// Allocates collision-free workspaces under a shared base directory.
#[derive(Debug, Clone)]
pub struct WorkspaceManager {
    base_dir: PathBuf,
}

impl WorkspaceManager {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Base directory from `TRYIT_TEMP_DIR`, defaulting to `<tmp>/tryit`.
    pub fn from_env() -> Self {
        let base_dir = std::env::var("TRYIT_TEMP_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| std::env::temp_dir().join("tryit"));
        Self::new(base_dir)
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Create the base directory. Idempotent and safe to call from
    /// concurrent requests; failure here is fatal for the request.
    pub async fn ensure_base_dir(&self) -> Result<(), EngineError> {
        tokio::fs::create_dir_all(&self.base_dir)
            .await
            .map_err(|e| EngineError::Workspace {
                path: self.base_dir.clone(),
                source: e,
            })
    }

    /// Allocate a workspace for one request.
    ///
    /// `with_binary` reserves a `.out` path next to the source for the
    /// compile step's output. Nothing is written to disk yet.
    pub async fn allocate(
        &self,
        extension: &str,
        with_binary: bool,
    ) -> Result<Workspace, EngineError> {
        self.ensure_base_dir().await?;

        let id = Uuid::new_v4();
        let source_path = self.base_dir.join(format!("{}.{}", id, extension));
        let binary_path = with_binary.then(|| self.base_dir.join(format!("{}.out", id)));

        Ok(Workspace {
            source_path,
            binary_path,
            released: false,
        })
    }
}

/// Filesystem paths owned by one request.
///
/// Call [`Workspace::release`] on every path out of a request. `Drop` is a
/// best-effort backstop for paths that escape via an early return or panic,
/// mirroring how container cleanup is guaranteed by a drop guard.
#[derive(Debug)]
pub struct Workspace {
    source_path: PathBuf,
    binary_path: Option<PathBuf>,
    released: bool,
}

impl Workspace {
    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    pub fn binary_path(&self) -> Option<&Path> {
        self.binary_path.as_deref()
    }

    /// Write the user's source code to the allocated path.
    pub async fn write_source(&self, code: &str) -> Result<(), EngineError> {
        tokio::fs::write(&self.source_path, code)
            .await
            .map_err(|e| EngineError::Workspace {
                path: self.source_path.clone(),
                source: e,
            })
    }

    /// Delete every allocated path. Each deletion is attempted
    /// independently; failures are logged, never raised.
    pub async fn release(mut self) {
        self.released = true;
        let mut paths = vec![self.source_path.clone()];
        if let Some(binary) = &self.binary_path {
            paths.push(binary.clone());
        }
        for path in paths {
            remove_quietly(&path).await;
        }
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        // Backstop only - release() is the normal path. Drop cannot be
        // async, so cleanup is handed to the runtime when one is available.
        let mut paths = vec![self.source_path.clone()];
        if let Some(binary) = &self.binary_path {
            paths.push(binary.clone());
        }
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                for path in paths {
                    remove_quietly(&path).await;
                }
            });
        } else {
            for path in paths {
                if let Err(e) = std::fs::remove_file(&path) {
                    if e.kind() != std::io::ErrorKind::NotFound {
                        warn!(path = %path.display(), error = %e, "Workspace cleanup failed");
                    }
                }
            }
        }
    }
}

async fn remove_quietly(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        // A missing file is the common case for binaries that were never
        // produced (compile failure).
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %path.display(), error = %e, "Workspace cleanup failed");
        }
    }
}
