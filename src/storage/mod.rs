use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::error::{ServiceError, ServiceResult};

/// Object storage as the catalog sees it: opaque put/remove plus public URL
/// derivation. The filesystem implementation below backs the `/media` route;
/// tests substitute a tempdir-rooted instance.
pub trait ObjectStore: Send + Sync {
    /// Writes the object and returns its public URL.
    fn put(&self, path: &str, bytes: &[u8]) -> ServiceResult<String>;

    /// Removes the object. Removing an already-missing object is not an
    /// error; the catalog record is the source of truth for existence.
    fn remove(&self, path: &str) -> ServiceResult<()>;

    fn public_url(&self, path: &str) -> String;

    /// Inverse of `public_url`: the storage path when the URL points into
    /// this store, None for pointer assets hosted elsewhere.
    fn object_path(&self, url: &str) -> Option<String>;
}

pub struct FsObjectStore {
    root: PathBuf,
    public_base: String,
}

impl FsObjectStore {
    pub fn new(root: impl Into<PathBuf>, public_base: impl Into<String>) -> Self {
        FsObjectStore {
            root: root.into(),
            public_base: public_base.into().trim_end_matches('/').to_string(),
        }
    }

    fn resolve(&self, path: &str) -> ServiceResult<PathBuf> {
        let relative = Path::new(path);
        let safe = relative.components().all(|c| matches!(c, Component::Normal(_)));
        if path.is_empty() || !safe {
            return Err(ServiceError::Storage(format!("invalid object path '{}'", path)));
        }
        Ok(self.root.join(relative))
    }
}

impl ObjectStore for FsObjectStore {
    fn put(&self, path: &str, bytes: &[u8]) -> ServiceResult<String> {
        let target = self.resolve(path)?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| ServiceError::Storage(format!("creating '{}': {}", parent.display(), e)))?;
        }
        fs::write(&target, bytes)
            .map_err(|e| ServiceError::Storage(format!("writing '{}': {}", target.display(), e)))?;
        Ok(self.public_url(path))
    }

    fn remove(&self, path: &str) -> ServiceResult<()> {
        let target = self.resolve(path)?;
        match fs::remove_file(&target) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::warn!("Object '{}' was already missing during deletion.", path);
                Ok(())
            }
            Err(e) => Err(ServiceError::Storage(format!("removing '{}': {}", target.display(), e))),
        }
    }

    fn public_url(&self, path: &str) -> String {
        format!("{}/media/{}", self.public_base, path)
    }

    fn object_path(&self, url: &str) -> Option<String> {
        let path = url.strip_prefix(&self.public_base)?.strip_prefix("/media/")?;
        if path.is_empty() {
            None
        } else {
            Some(path.to_string())
        }
    }
}
