#![forbid(unsafe_code)]

use std::fs::File;
use std::path::Path;

use crate::pak::error::PakResult;
use crate::pak::hash::hash_reader;
use crate::pak::path::normalize_rel_path;

/// One packaged file: its name inside the trailer, size and SHA-256.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Descriptor {
    name: Option<String>,
    size: u64,
    digest: String,
}

impl Descriptor {
    /// Describe a file already parsed out of a trailer. Nothing is verified here.
    pub fn new(name: impl Into<String>, size: u64, digest: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            size,
            digest: digest.into(),
        }
    }

    /// Describe a file on disk, named relative to `base_dir`.
    ///
    /// Never fails: a file that cannot be named, opened or hashed produces an
    /// invalid descriptor, which packing skips.
    pub fn from_file(path: &Path, base_dir: &Path) -> Self {
        match Self::try_from_file(path, base_dir) {
            Ok(d) => d,
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "cannot describe file");
                Self::invalid()
            }
        }
    }

    fn try_from_file(path: &Path, base_dir: &Path) -> PakResult<Self> {
        let name = normalize_rel_path(base_dir, path)?;
        let mut f = File::open(path)?;
        let size = f.metadata()?.len();
        let digest = hash_reader(&mut f, None)?;
        Ok(Self::new(name, size, digest))
    }

    fn invalid() -> Self {
        Self {
            name: None,
            size: 0,
            digest: String::new(),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.name.as_deref().is_some_and(|n| !n.is_empty())
    }

    /// Empty for an invalid descriptor.
    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or_default()
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn digest(&self) -> &str {
        &self.digest
    }
}
