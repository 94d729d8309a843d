use std::fs;
use std::io;

use camino::{Utf8Path, Utf8PathBuf};

use crate::config::Environment;
use crate::domain::BucketPrefix;
use crate::error::NaipError;
use crate::listing::is_relative_key;

pub const NAIP_DIR: &str = "naip";

#[derive(Debug, Clone)]
pub struct Store {
    imagery_root: Utf8PathBuf,
}

impl Store {
    pub fn new(env: &Environment) -> Result<Self, NaipError> {
        Ok(Self::new_with_root(env.imagery_root()?.clone()))
    }

    pub fn new_with_root(imagery_root: Utf8PathBuf) -> Self {
        Self { imagery_root }
    }

    pub fn imagery_root(&self) -> &Utf8Path {
        &self.imagery_root
    }

    pub fn naip_root(&self) -> Utf8PathBuf {
        self.imagery_root.join(NAIP_DIR)
    }

    /// Mirrors the bucket layout: `<root>/naip/<key-prefix><candidate>`.
    /// Candidates with `..`, root, or drive components are refused.
    pub fn local_path(
        &self,
        prefix: &BucketPrefix,
        candidate: &str,
    ) -> Result<Utf8PathBuf, NaipError> {
        if !is_relative_key(candidate) {
            return Err(NaipError::UnsafeKey(candidate.to_string()));
        }
        Ok(self.naip_root().join(prefix.object_key(candidate)))
    }

    pub fn ensure_naip_root(&self) -> Result<Utf8PathBuf, NaipError> {
        let root = self.naip_root();
        ensure_dir_tree(&root)?;
        Ok(root)
    }

    pub fn exists(&self, path: &Utf8Path) -> bool {
        path.as_std_path().exists()
    }
}

/// Creates every segment of `path` in order. A segment that already exists as
/// a directory is fine; any other failure is reported.
pub fn ensure_dir_tree(path: &Utf8Path) -> Result<(), NaipError> {
    let mut current = Utf8PathBuf::new();
    for component in path.components() {
        current.push(component);
        create_dir_tolerant(&current)?;
    }
    Ok(())
}

fn create_dir_tolerant(path: &Utf8Path) -> Result<(), NaipError> {
    match fs::create_dir(path.as_std_path()) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
            if path.as_std_path().is_dir() {
                Ok(())
            } else {
                Err(NaipError::Filesystem(format!(
                    "create {path}: exists and is not a directory"
                )))
            }
        }
        // Root and drive prefixes cannot be created but always exist.
        Err(_) if path.parent().is_none() && path.as_std_path().is_dir() => Ok(()),
        Err(err) => Err(NaipError::Filesystem(format!("create {path}: {err}"))),
    }
}
