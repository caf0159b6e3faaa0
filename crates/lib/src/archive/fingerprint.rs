//! Content fingerprints of assets.
//!
//! A fingerprint streams every source's `(size, hash)` pair in source order,
//! then the number of sources, through a seeded XXH3-64 hasher. It depends on
//! source content and order only, never on where the asset was declared.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use xxhash_rust::xxh3::{Xxh3, xxh3_64};

use crate::assets::{Source, SourceContent, SourceDigest};
use crate::util::hash::{ContentHash, hash_bytes, hash_directory, hash_file};

use super::types::ArchiveError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(pub u64);

impl fmt::Display for Fingerprint {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{:016x}", self.0)
  }
}

pub fn compute_fingerprint(digests: &[SourceDigest], seed: Option<u64>) -> Fingerprint {
  let mut hasher = Xxh3::with_seed(seed.unwrap_or(0));
  for digest in digests {
    hasher.update(&digest.size.to_le_bytes());
    hasher.update(digest.hash.0.as_bytes());
  }
  hasher.update(&(digests.len() as u64).to_le_bytes());
  // Keeps `Some(0)` apart from no seed.
  hasher.update(&[u8::from(seed.is_some())]);
  Fingerprint(hasher.digest())
}

/// Seed for assets of one plugin directory.
pub fn seed_for(name: &str) -> u64 {
  xxh3_64(name.as_bytes())
}

/// Materialize the `(size, hash)` identity of a source.
pub fn source_digest(source: &Source) -> Result<SourceDigest, ArchiveError> {
  match &source.content {
    SourceContent::Directory { root, prefix, excludes } => {
      let (size, hash) = hash_directory(root, |rel| !excludes.is_excluded(rel))?;
      let hash = if prefix.is_empty() {
        hash
      } else {
        hash_bytes(format!("{}\n{}", prefix, hash).as_bytes())
      };
      Ok(SourceDigest { size, hash })
    }
    SourceContent::Archive { file, excludes } => {
      let (size, hash) = hash_file(file)?;
      let hash = if excludes.is_empty() {
        hash
      } else {
        hash_bytes(format!("{}\n{}", hash, excludes.patterns().join("\n")).as_bytes())
      };
      Ok(SourceDigest { size, hash })
    }
    SourceContent::InMemory { name, data } => Ok(named_digest(name, data)),
    SourceContent::Lazy { name, generator } => {
      let data = generator.generate().map_err(|message| ArchiveError::Generate {
        name: generator.name().to_string(),
        message,
      })?;
      Ok(named_digest(name, &data))
    }
    SourceContent::RawFile { file } => {
      let (size, hash) = hash_file(file)?;
      Ok(SourceDigest { size, hash })
    }
  }
}

fn named_digest(name: &str, data: &[u8]) -> SourceDigest {
  let mut hasher = Sha256::new();
  hasher.update(name.as_bytes());
  hasher.update([0u8]);
  hasher.update(data);
  SourceDigest {
    size: data.len() as u64,
    hash: ContentHash(format!("{:x}", hasher.finalize())),
  }
}

#[cfg(test)]
mod tests {
  use std::fs;
  use std::path::PathBuf;
  use std::sync::Arc;

  use super::*;
  use crate::assets::SourceOwner;
  use crate::util::filter::ExcludeSet;
  use tempfile::TempDir;

  fn digest(size: u64, hash: &str) -> SourceDigest {
    SourceDigest {
      size,
      hash: ContentHash(hash.to_string()),
    }
  }

  fn source(content: SourceContent) -> Source {
    Source {
      content,
      owner: SourceOwner::Custom {
        reason: "test".to_string(),
      },
    }
  }

  #[test]
  fn fingerprint_is_deterministic() {
    let digests = vec![digest(1, "a"), digest(2, "b")];
    assert_eq!(compute_fingerprint(&digests, None), compute_fingerprint(&digests, None));
  }

  #[test]
  fn fingerprint_is_order_sensitive() {
    let forward = vec![digest(1, "a"), digest(2, "b")];
    let backward = vec![digest(2, "b"), digest(1, "a")];
    assert_ne!(compute_fingerprint(&forward, None), compute_fingerprint(&backward, None));
  }

  #[test]
  fn fingerprint_changes_with_content_and_seed() {
    let base = vec![digest(1, "a")];
    let changed = vec![digest(1, "c")];
    let fp = compute_fingerprint(&base, None);
    assert_ne!(fp, compute_fingerprint(&changed, None));
    assert_ne!(fp, compute_fingerprint(&base, Some(seed_for("git"))));
    assert_ne!(
      compute_fingerprint(&base, Some(seed_for("git"))),
      compute_fingerprint(&base, Some(seed_for("svn")))
    );
  }

  #[test]
  fn fingerprint_matches_one_shot_hash_of_the_stream() {
    let mut stream = Vec::new();
    stream.extend_from_slice(&3u64.to_le_bytes());
    stream.extend_from_slice(b"abc");
    stream.extend_from_slice(&1u64.to_le_bytes());
    stream.push(1);

    let fp = compute_fingerprint(&[digest(3, "abc")], Some(7));
    assert_eq!(fp, Fingerprint(xxhash_rust::xxh3::xxh3_64_with_seed(&stream, 7)));
    assert_ne!(fp, compute_fingerprint(&[digest(3, "abc")], None));
  }

  #[test]
  fn fingerprint_display_is_fixed_width() {
    assert_eq!(Fingerprint(0xab).to_string(), "00000000000000ab");
  }

  #[test]
  fn directory_digest_honors_excludes() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("keep.txt"), "keep").unwrap();
    fs::create_dir(temp.path().join("tmp")).unwrap();
    fs::write(temp.path().join("tmp/junk.txt"), "junk").unwrap();

    let all = source_digest(&source(SourceContent::Directory {
      root: temp.path().to_path_buf(),
      prefix: String::new(),
      excludes: ExcludeSet::default(),
    }))
    .unwrap();
    let filtered = source_digest(&source(SourceContent::Directory {
      root: temp.path().to_path_buf(),
      prefix: String::new(),
      excludes: ExcludeSet::new(&["tmp"]).unwrap(),
    }))
    .unwrap();

    assert_eq!(all.size, 8);
    assert_eq!(filtered.size, 4);
    assert_ne!(all.hash, filtered.hash);
  }

  #[test]
  fn in_memory_digest_includes_entry_name() {
    let data = Arc::new(b"same".to_vec());
    let a = source_digest(&source(SourceContent::InMemory {
      name: "a.txt".to_string(),
      data: data.clone(),
    }))
    .unwrap();
    let b = source_digest(&source(SourceContent::InMemory {
      name: "b.txt".to_string(),
      data,
    }))
    .unwrap();
    assert_eq!(a.size, 4);
    assert_ne!(a.hash, b.hash);
  }

  #[test]
  fn missing_file_is_an_error() {
    let result = source_digest(&source(SourceContent::RawFile {
      file: PathBuf::from("/nonexistent/file.jar"),
    }));
    assert!(matches!(result, Err(ArchiveError::Hash(_))));
  }
}
