use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;

use crate::{ObjectStore, StoreError};

/// One file per key under a root directory.
///
/// Writes land in a hidden `.partial` sibling first and are renamed into
/// place, so a key never points at a half-written download.
pub struct LocalStore {
    root: PathBuf,
}

/// `$XDG_DATA_HOME/fileclip/attachments`, falling back to `~/.local/share`.
pub(crate) fn default_root() -> PathBuf {
    let base = match std::env::var_os("XDG_DATA_HOME") {
        Some(xdg) => PathBuf::from(xdg),
        None => std::env::var_os("HOME")
            .map(|home| PathBuf::from(home).join(".local/share"))
            .unwrap_or_else(|| PathBuf::from(".")),
    };
    base.join("fileclip").join("attachments")
}

fn io_error(action: &str, path: &Path, e: std::io::Error) -> StoreError {
    StoreError::Internal(format!("{action} {}: {e}", path.display()))
}

impl LocalStore {
    pub fn open(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StoreError> {
        let mut path = self.root.clone();
        for part in key.split('/') {
            if matches!(part, "" | "." | "..") || part.contains('\\') {
                return Err(StoreError::InvalidKey(key.to_string()));
            }
            path.push(part);
        }
        Ok(path)
    }

    /// Remove directories left empty by a delete, stopping at the root.
    async fn prune_empty_dirs(&self, from: &Path) {
        let mut dir = from.parent();
        while let Some(current) = dir {
            if current == self.root || !current.starts_with(&self.root) {
                break;
            }
            if tokio::fs::remove_dir(current).await.is_err() {
                break;
            }
            dir = current.parent();
        }
    }
}

#[async_trait]
impl ObjectStore for LocalStore {
    fn describe(&self) -> String {
        format!("local ({})", self.root.display())
    }

    async fn put(&self, key: &str, data: Bytes, _content_type: &str) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        let (Some(dir), Some(name)) = (path.parent(), path.file_name()) else {
            return Err(StoreError::InvalidKey(key.to_string()));
        };
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| io_error("create", dir, e))?;

        let partial = dir.join(format!(".{}.partial", name.to_string_lossy()));
        tokio::fs::write(&partial, &data)
            .await
            .map_err(|e| io_error("write", &partial, e))?;
        if let Err(e) = tokio::fs::rename(&partial, &path).await {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(io_error("rename", &path, e));
        }
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Bytes, StoreError> {
        let path = self.path_for(key)?;
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(data.into()),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StoreError::NotFound(key.to_string())),
            Err(e) => Err(io_error("read", &path, e)),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                self.prune_empty_dirs(&path).await;
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error("delete", &path, e)),
        }
    }
}
