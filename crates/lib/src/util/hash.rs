//! Hashing utilities for content fingerprints and cache validation.
//!
//! This module provides:
//! - `ContentHash`: A full 64-character hash for content verification
//! - `hash_directory()`: Deterministic directory hashing with a path filter
//! - `hash_file()`: Single file hashing
//! - `hash_bytes()`: Arbitrary byte hashing
//!
//! Every function also reports the number of content bytes it consumed, since
//! sources are identified by a `(size, hash)` pair.

use std::fs;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use walkdir::WalkDir;

/// A full 64-character SHA256 hash for content verification.
///
/// # Format
///
/// The hash is a lowercase hexadecimal string (64 characters).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ContentHash(pub String);

impl std::fmt::Display for ContentHash {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.0)
  }
}

/// Error during hashing.
#[derive(Debug, thiserror::Error)]
pub enum HashError {
  #[error("failed to walk directory {path}: {message}")]
  WalkDir { path: String, message: String },

  #[error("failed to read file {path}: {source}")]
  ReadFile {
    path: String,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to read symlink {path}: {source}")]
  ReadSymlink {
    path: String,
    #[source]
    source: std::io::Error,
  },
}

/// Compute a deterministic hash of a directory's contents.
///
/// The hash includes file contents, directory structure and symlink targets,
/// never metadata like timestamps or permissions. Entries are visited sorted by
/// file name. `include` receives each path relative to `path` (with `/`
/// separators); returning `false` skips the entry and, for directories, its
/// whole subtree.
///
/// Returns the total number of file bytes hashed along with the hash.
pub fn hash_directory(path: &Path, include: impl Fn(&str) -> bool) -> Result<(u64, ContentHash), HashError> {
  let mut hasher = Sha256::new();
  let mut size = 0u64;

  let walker = WalkDir::new(path).sort_by_file_name().into_iter().filter_entry(|e| {
    let rel = relative_name(path, e.path());
    rel.is_empty() || include(&rel)
  });

  for entry in walker {
    let entry = entry.map_err(|e| HashError::WalkDir {
      path: path.display().to_string(),
      message: e.to_string(),
    })?;
    let entry_path = entry.path();
    let rel_path = relative_name(path, entry_path);

    // Skip the root directory itself
    if rel_path.is_empty() {
      continue;
    }

    let file_type = entry.file_type();
    let line = if file_type.is_file() {
      let (file_size, content_hash) = hash_file(entry_path)?;
      size += file_size;
      format!("F:{}:{}", rel_path, content_hash.0)
    } else if file_type.is_dir() {
      format!("D:{}", rel_path)
    } else if file_type.is_symlink() {
      let target = fs::read_link(entry_path).map_err(|e| HashError::ReadSymlink {
        path: entry_path.display().to_string(),
        source: e,
      })?;
      format!("L:{}:{}", rel_path, hash_bytes(target.to_string_lossy().as_bytes()).0)
    } else {
      // Skip special files (sockets, devices, etc.)
      continue;
    };

    hasher.update(line.as_bytes());
    hasher.update(b"\n");
  }

  Ok((size, ContentHash(format!("{:x}", hasher.finalize()))))
}

/// Hash a file's contents.
///
/// Returns the file size and the full 64-character SHA256 hash of the file.
pub fn hash_file(path: &Path) -> Result<(u64, ContentHash), HashError> {
  let read_err = |e| HashError::ReadFile {
    path: path.display().to_string(),
    source: e,
  };
  let mut file = fs::File::open(path).map_err(read_err)?;

  let mut hasher = Sha256::new();
  let mut buffer = [0u8; 8192];
  let mut size = 0u64;

  loop {
    let bytes_read = file.read(&mut buffer).map_err(read_err)?;
    if bytes_read == 0 {
      break;
    }
    size += bytes_read as u64;
    hasher.update(&buffer[..bytes_read]);
  }

  Ok((size, ContentHash(format!("{:x}", hasher.finalize()))))
}

/// Hash arbitrary bytes.
///
/// Returns the full 64-character SHA256 hash.
pub fn hash_bytes(data: &[u8]) -> ContentHash {
  let mut hasher = Sha256::new();
  hasher.update(data);
  ContentHash(format!("{:x}", hasher.finalize()))
}

/// Path of `entry` relative to `root`, always with `/` separators.
pub fn relative_name(root: &Path, entry: &Path) -> String {
  let rel = entry.strip_prefix(root).unwrap_or(entry);
  let mut name = String::new();
  for (i, component) in rel.components().enumerate() {
    if i > 0 {
      name.push('/');
    }
    name.push_str(&component.as_os_str().to_string_lossy());
  }
  name
}
