//! File-store collaborator: persist a blob, get back an opaque reference.
//!
//! The core only ever stores and compares references; receipts and
//! screenshots are never interpreted.

use std::fs;
use std::path::PathBuf;

use uuid::Uuid;

use crate::error::{Error, Result};

pub trait FileStore {
    /// Persist `bytes` under a fresh name derived from `filename`;
    /// returns the reference to store on the owning record.
    fn store(&self, filename: &str, bytes: &[u8]) -> Result<String>;

    fn retrieve(&self, reference: &str) -> Result<Vec<u8>>;
}

/// Local-disk implementation used by the CLI and tests. References are
/// uuid-prefixed file names relative to the root directory.
pub struct DiskFileStore {
    root: PathBuf,
}

impl DiskFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(DiskFileStore { root })
    }
}

impl FileStore for DiskFileStore {
    fn store(&self, filename: &str, bytes: &[u8]) -> Result<String> {
        // Keep only the final path component of the client-supplied name.
        let base = filename
            .rsplit(['/', '\\'])
            .next()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| Error::Validation(format!("invalid filename {filename:?}")))?;
        let reference = format!("{}-{base}", Uuid::new_v4());
        fs::write(self.root.join(&reference), bytes)?;
        Ok(reference)
    }

    fn retrieve(&self, reference: &str) -> Result<Vec<u8>> {
        let path = self.root.join(reference);
        fs::read(&path).map_err(|_| Error::NotFound(format!("file {reference}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_and_retrieve() {
        let dir = tempfile::tempdir().unwrap();
        let store = DiskFileStore::new(dir.path()).unwrap();

        let reference = store.store("lease.pdf", b"contents").unwrap();
        assert!(reference.ends_with("-lease.pdf"));
        assert_eq!(store.retrieve(&reference).unwrap(), b"contents");
    }

    #[test]
    fn path_components_stripped() {
        let dir = tempfile::tempdir().unwrap();
        let store = DiskFileStore::new(dir.path()).unwrap();

        let reference = store.store("../../etc/passwd", b"x").unwrap();
        assert!(reference.ends_with("-passwd"));
        assert!(store.retrieve("missing").is_err());
    }
}
