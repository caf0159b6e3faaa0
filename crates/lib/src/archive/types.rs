//! Archive build types.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::assets::{AssetKind, SourceDigest};
use crate::util::hash::HashError;

use super::fingerprint::Fingerprint;

/// Errors raised while building one asset.
#[derive(Debug, Error)]
pub enum ArchiveError {
  #[error("I/O error on {path}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error(transparent)]
  Hash(#[from] HashError),

  #[error("zip error on {path}: {source}")]
  Zip {
    path: PathBuf,
    #[source]
    source: zip::result::ZipError,
  },

  #[error("generator '{name}' failed: {message}")]
  Generate { name: String, message: String },

  #[error("signing '{entry}' failed: {message}")]
  Sign { entry: String, message: String },

  #[error("cache entry {fingerprint} for '{file}' is corrupted: {message}")]
  CacheIntegrity {
    fingerprint: Fingerprint,
    file: String,
    message: String,
  },

  #[error("invalid cache metadata {path}: {message}")]
  Metadata { path: PathBuf, message: String },

  #[error("entry '{entry}' of '{asset}' escapes the target directory")]
  UnsafeEntry { asset: String, entry: String },

  #[error("build task for '{asset}' failed: {message}")]
  Task { asset: String, message: String },
}

impl ArchiveError {
  pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
    ArchiveError::Io {
      path: path.into(),
      source,
    }
  }

  pub(crate) fn zip(path: impl Into<PathBuf>, source: zip::result::ZipError) -> Self {
    ArchiveError::Zip {
      path: path.into(),
      source,
    }
  }
}

/// A failed asset build.
#[derive(Debug, Error)]
#[error("{asset}: {error}")]
pub struct AssetFailure {
  pub asset: String,
  #[source]
  pub error: ArchiveError,
}

/// Every asset build that failed in one build step.
///
/// `first` is the failure of the earliest planned asset; the rest are kept
/// so one run reports the full set.
#[derive(Debug)]
pub struct BuildFailure {
  pub first: AssetFailure,
  pub suppressed: Vec<AssetFailure>,
}

impl std::error::Error for BuildFailure {
  fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
    Some(&self.first)
  }
}

impl fmt::Display for BuildFailure {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "failed to build {}", self.first)?;
    if !self.suppressed.is_empty() {
      write!(f, " ({} more failure(s))", self.suppressed.len())?;
      for failure in &self.suppressed {
        write!(f, "\n  - {}", failure)?;
      }
    }
    Ok(())
  }
}

impl BuildFailure {
  pub fn len(&self) -> usize {
    1 + self.suppressed.len()
  }

  pub fn is_empty(&self) -> bool {
    false
  }

  pub fn failures(&self) -> impl Iterator<Item = &AssetFailure> {
    std::iter::once(&self.first).chain(self.suppressed.iter())
  }
}

/// Result of building one asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuiltAsset {
  /// Path relative to the distribution root.
  pub relative_path: String,
  pub kind: AssetKind,
  /// Where the bytes actually are. Differs from `<dist>/<relative_path>`
  /// when the cache file is used as the target.
  pub file: PathBuf,
  pub fingerprint: Option<Fingerprint>,
  pub cache_hit: bool,
  /// Digest per source, in source order.
  pub digests: Vec<SourceDigest>,
  /// Bytes each source contributed to the output, in source order.
  pub source_sizes: Vec<u64>,
  pub size: u64,
}
