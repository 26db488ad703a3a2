//! Scratch workspaces for execution requests
//!
//! Each request gets a uniquely named location under the scratch directory:
//! a single file, a source/binary pair, or a dedicated directory, depending
//! on what the language's toolchain needs.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::config::{FileExtension, LanguageId, WorkspaceLayout};

/// Errors that occur while managing a workspace
#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("language '{0}' does not run on the server")]
    NoLayout(LanguageId),

    #[error("failed to create workspace directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("workspace has no directory for named files")]
    NotADirectory,

    #[error("failed to remove workspace paths {failed:?}: {source}")]
    Release {
        failed: Vec<PathBuf>,
        #[source]
        source: io::Error,
    },
}

/// A scratch location owned by one session
///
/// # Cleanup
///
/// Call [`release()`](Self::release) on every exit path. It is idempotent,
/// so an extra call is harmless. If the workspace is dropped without being
/// released (for example because the owning future was cancelled), `Drop`
/// removes the tracked paths synchronously and logs a warning.
#[derive(Debug)]
pub struct Workspace {
    id: Uuid,
    language: LanguageId,
    layout: WorkspaceLayout,
    /// Dedicated directory (directory layout only)
    directory: Option<PathBuf>,
    /// Source file path, fixed at allocation for file layouts
    source: Option<PathBuf>,
    /// Compiled artifact path (source/binary layout only)
    binary: Option<PathBuf>,
    /// Files generated for this request, in creation order
    tracked: Vec<PathBuf>,
    released: bool,
}

impl Workspace {
    /// Allocate a fresh workspace under `scratch_dir`
    #[instrument(skip(scratch_dir, extension), fields(scratch_dir = %scratch_dir.display()))]
    pub async fn allocate(
        scratch_dir: &Path,
        language: LanguageId,
        extension: &FileExtension,
    ) -> Result<Self, WorkspaceError> {
        let layout = language.layout().ok_or(WorkspaceError::NoLayout(language))?;

        tokio::fs::create_dir_all(scratch_dir)
            .await
            .map_err(|source| WorkspaceError::CreateDir {
                path: scratch_dir.to_path_buf(),
                source,
            })?;

        let id = Uuid::new_v4();
        let stem = id.simple().to_string();
        let mut workspace = Self {
            id,
            language,
            layout,
            directory: None,
            source: None,
            binary: None,
            tracked: Vec::new(),
            released: false,
        };

        match layout {
            WorkspaceLayout::SingleFile => {
                workspace.source = Some(scratch_dir.join(format!("{stem}.{extension}")));
            }
            WorkspaceLayout::FileWithBinary => {
                workspace.source = Some(scratch_dir.join(format!("{stem}.{extension}")));
                let binary = scratch_dir.join(format!("{stem}_{language}_bin"));
                workspace.tracked.push(binary.clone());
                workspace.binary = Some(binary);
            }
            WorkspaceLayout::Directory => {
                let dir = scratch_dir.join(format!("{language}_{stem}"));
                tokio::fs::create_dir(&dir)
                    .await
                    .map_err(|source| WorkspaceError::CreateDir {
                        path: dir.clone(),
                        source,
                    })?;
                workspace.directory = Some(dir);
            }
        }

        debug!(id = %workspace.id, ?layout, "workspace allocated");
        Ok(workspace)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn language(&self) -> LanguageId {
        self.language
    }

    pub fn layout(&self) -> WorkspaceLayout {
        self.layout
    }

    /// The dedicated directory, for directory layouts
    pub fn directory(&self) -> Option<&Path> {
        self.directory.as_deref()
    }

    /// The preallocated source path, for file layouts
    pub fn source_path(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// The compiled artifact path, for source/binary layouts
    pub fn binary_path(&self) -> Option<&Path> {
        self.binary.as_deref()
    }

    /// Files tracked for removal, in creation order
    pub fn tracked_paths(&self) -> &[PathBuf] {
        &self.tracked
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Path of a named file inside the workspace directory
    ///
    /// Returns an error for file layouts and for names that would escape
    /// the directory.
    pub fn file_path(&self, name: &str) -> Result<PathBuf, WorkspaceError> {
        let dir = self.directory.as_ref().ok_or(WorkspaceError::NotADirectory)?;
        if name.is_empty() || name.contains("..") || name.contains('/') {
            return Err(WorkspaceError::InvalidPath(format!(
                "path traversal not allowed: {name}"
            )));
        }
        Ok(dir.join(name))
    }

    /// Write a file and track it for removal
    ///
    /// The path is tracked before writing so a partial write is still cleaned up.
    #[instrument(skip(self, contents), fields(id = %self.id))]
    pub async fn write_file(&mut self, path: &Path, contents: &[u8]) -> Result<(), WorkspaceError> {
        self.track(path);
        tokio::fs::write(path, contents)
            .await
            .map_err(|source| WorkspaceError::Write {
                path: path.to_path_buf(),
                source,
            })?;
        debug!(?path, len = contents.len(), "wrote workspace file");
        Ok(())
    }

    /// Track a path produced by a tool so it is removed on release
    pub fn track(&mut self, path: &Path) {
        if !self.tracked.iter().any(|p| p == path) {
            self.tracked.push(path.to_path_buf());
        }
    }

    /// Remove every tracked path and the workspace directory
    ///
    /// Paths that are already gone count as removed. Every path is attempted
    /// even if an earlier one fails. Calling this again is a no-op.
    #[instrument(skip(self), fields(id = %self.id))]
    pub async fn release(&mut self) -> Result<(), WorkspaceError> {
        if self.released {
            return Ok(());
        }
        self.released = true;

        let mut failed = Vec::new();
        let mut first_error = None;

        for path in &self.tracked {
            if let Err(e) = ignore_not_found(tokio::fs::remove_file(path).await) {
                failed.push(path.clone());
                first_error.get_or_insert(e);
            }
        }
        if let Some(ref dir) = self.directory
            && let Err(e) = ignore_not_found(tokio::fs::remove_dir_all(dir).await)
        {
            failed.push(dir.clone());
            first_error.get_or_insert(e);
        }

        match first_error {
            None => {
                debug!("workspace released");
                Ok(())
            }
            Some(source) => Err(WorkspaceError::Release { failed, source }),
        }
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if self.released {
            return;
        }

        warn!(
            id = %self.id,
            "Workspace dropped without release; removing files synchronously"
        );

        for path in &self.tracked {
            if let Err(e) = ignore_not_found(std::fs::remove_file(path)) {
                warn!(?path, error = %e, "failed to remove workspace file");
            }
        }
        if let Some(ref dir) = self.directory
            && let Err(e) = ignore_not_found(std::fs::remove_dir_all(dir))
        {
            warn!(?dir, error = %e, "failed to remove workspace directory");
        }
    }
}

fn ignore_not_found(result: io::Result<()>) -> io::Result<()> {
    match result {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}
