//! Storage collaborator
//!
//! The dispatcher never touches the filesystem directly; it goes through
//! this interface. `FsStorage` confines a session under a root directory
//! using virtual absolute paths: `/` maps to the root, `..` cannot climb
//! above it, and every session owns its own working directory (directory
//! state is deliberately not process-wide).

use std::path::{Path, PathBuf};

use crate::error::StorageError;

pub trait Storage: Send {
    fn list_entries(&self) -> Result<Vec<String>, StorageError>;
    fn read_file(&self, path: &str) -> Result<Vec<u8>, StorageError>;
    fn write_file(&self, path: &str, bytes: &[u8]) -> Result<(), StorageError>;
    fn change_directory(&mut self, path: &str) -> Result<(), StorageError>;
    fn current_directory(&self) -> String;
}

/// Filesystem-backed storage rooted at `root`, with a per-session virtual
/// working directory.
pub struct FsStorage {
    root: PathBuf,
    cwd: String,
}

impl FsStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            cwd: "/".to_string(),
        }
    }

    /// Normalizes `path` against the current working directory into a
    /// virtual absolute path. `..` segments pop; popping past the root
    /// clamps there instead of escaping it.
    fn resolve_virtual(&self, path: &str) -> String {
        let joined = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("{}/{}", self.cwd, path)
        };
        let mut segments: Vec<&str> = Vec::new();
        for segment in joined.split('/') {
            match segment {
                "" | "." => {}
                ".." => {
                    segments.pop();
                }
                other => segments.push(other),
            }
        }
        format!("/{}", segments.join("/"))
    }

    /// Maps a virtual absolute path to the real path under the root.
    fn real_path(&self, virtual_path: &str) -> PathBuf {
        self.root.join(virtual_path.trim_start_matches('/'))
    }

    fn real_cwd(&self) -> PathBuf {
        self.real_path(&self.cwd)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl Storage for FsStorage {
    fn list_entries(&self) -> Result<Vec<String>, StorageError> {
        let dir = self.real_cwd();
        let mut entries = Vec::new();
        for entry in std::fs::read_dir(&dir)? {
            entries.push(entry?.file_name().to_string_lossy().into_owned());
        }
        // Stable order; read_dir order is platform-dependent.
        entries.sort();
        Ok(entries)
    }

    fn read_file(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        let virtual_path = self.resolve_virtual(path);
        let real = self.real_path(&virtual_path);
        if !real.is_file() {
            return Err(StorageError::FileNotFound(virtual_path));
        }
        Ok(std::fs::read(real)?)
    }

    fn write_file(&self, path: &str, bytes: &[u8]) -> Result<(), StorageError> {
        let virtual_path = self.resolve_virtual(path);
        let real = self.real_path(&virtual_path);
        match real.parent() {
            Some(parent) if parent.is_dir() => {}
            _ => return Err(StorageError::DirectoryNotFound(virtual_path)),
        }
        std::fs::write(real, bytes)?;
        Ok(())
    }

    fn change_directory(&mut self, path: &str) -> Result<(), StorageError> {
        let virtual_path = self.resolve_virtual(path);
        let real = self.real_path(&virtual_path);
        if !real.exists() {
            return Err(StorageError::DirectoryNotFound(virtual_path));
        }
        if !real.is_dir() {
            return Err(StorageError::NotADirectory(virtual_path));
        }
        self.cwd = virtual_path;
        Ok(())
    }

    fn current_directory(&self) -> String {
        self.cwd.clone()
    }
}
