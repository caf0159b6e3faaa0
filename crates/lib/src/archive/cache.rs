//! Content-addressed archive cache.
//!
//! A cache entry lives at `<root>/<fingerprint>/<file name>` next to a
//! metadata file recording the digests of the sources it was built from.
//! The metadata is written last, so an entry without it is never trusted.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::assets::SourceDigest;
use crate::consts::{CACHE_METADATA_FILENAME, CACHE_METADATA_VERSION};

use super::fingerprint::Fingerprint;
use super::types::ArchiveError;

/// Writes an asset to the given path and returns per-source byte counts.
pub type Producer<'a> = dyn FnMut(&Path) -> Result<Vec<u64>, ArchiveError> + 'a;

pub struct CacheRequest<'a> {
  pub fingerprint: Fingerprint,
  pub file_name: &'a str,
  /// Live digests of the asset's sources.
  pub digests: &'a [SourceDigest],
  /// Final location in the distribution.
  pub target: &'a Path,
  /// Skip the copy to `target` and hand out the cache file instead.
  pub use_cache_as_target: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheOutcome {
  /// Where the output bytes are.
  pub file: PathBuf,
  pub hit: bool,
  pub source_sizes: Vec<u64>,
}

/// Pluggable cache. Must be safe for concurrent calls; identical
/// fingerprints requested concurrently are produced at most once.
pub trait CacheManager: Send + Sync {
  fn compute_if_absent(&self, request: &CacheRequest<'_>, produce: &mut Producer<'_>) -> Result<CacheOutcome, ArchiveError>;
}

/// Always rebuilds straight into the target and never persists anything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCacheManager;

impl CacheManager for NoCacheManager {
  fn compute_if_absent(&self, request: &CacheRequest<'_>, produce: &mut Producer<'_>) -> Result<CacheOutcome, ArchiveError> {
    let source_sizes = produce(request.target)?;
    Ok(CacheOutcome {
      file: request.target.to_path_buf(),
      hit: false,
      source_sizes,
    })
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheMetadata {
  version: u32,
  file_name: String,
  size: u64,
  sources: Vec<SourceDigest>,
  source_sizes: Vec<u64>,
}

/// Filesystem-backed cache.
#[derive(Debug)]
pub struct FsCacheManager {
  root: PathBuf,
  /// In-flight fingerprints. An entry lives only while some caller holds it.
  locks: Mutex<HashMap<Fingerprint, Arc<Mutex<()>>>>,
}

impl FsCacheManager {
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self {
      root: root.into(),
      locks: Mutex::new(HashMap::new()),
    }
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  fn entry_dir(&self, fingerprint: Fingerprint) -> PathBuf {
    self.root.join(fingerprint.to_string())
  }

  fn key_lock(&self, fingerprint: Fingerprint) -> Arc<Mutex<()>> {
    let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
    locks.entry(fingerprint).or_default().clone()
  }

  /// Forget the lock of `fingerprint` once no other caller is waiting on it.
  fn release_key(&self, fingerprint: Fingerprint, lock: &Arc<Mutex<()>>) {
    let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
    // One reference in the map, one held by the caller.
    if Arc::strong_count(lock) <= 2 {
      locks.remove(&fingerprint);
    }
  }

  fn read_metadata(path: &Path) -> Result<Option<CacheMetadata>, ArchiveError> {
    if !path.exists() {
      return Ok(None);
    }
    let content = fs::read_to_string(path).map_err(|e| ArchiveError::io(path, e))?;
    let metadata: CacheMetadata = serde_json::from_str(&content).map_err(|e| ArchiveError::Metadata {
      path: path.to_path_buf(),
      message: e.to_string(),
    })?;
    Ok(Some(metadata))
  }

  /// Atomic write: temp file then rename.
  fn write_metadata(path: &Path, metadata: &CacheMetadata) -> Result<(), ArchiveError> {
    let content = serde_json::to_string_pretty(metadata).map_err(|e| ArchiveError::Metadata {
      path: path.to_path_buf(),
      message: e.to_string(),
    })?;
    let temp_path = path.with_extension("json.tmp");
    fs::write(&temp_path, content).map_err(|e| ArchiveError::io(&temp_path, e))?;
    fs::rename(&temp_path, path).map_err(|e| ArchiveError::io(path, e))
  }
}

/// A hit is only trusted when the stored digests match the live sources.
fn validate_hit(
  request: &CacheRequest<'_>,
  metadata: &CacheMetadata,
  cached_file: &Path,
) -> Result<(), ArchiveError> {
  let integrity = |message: String| ArchiveError::CacheIntegrity {
    fingerprint: request.fingerprint,
    file: request.file_name.to_string(),
    message,
  };

  if metadata.sources.len() != request.digests.len() {
    return Err(integrity(format!(
      "recorded {} sources, asset has {}",
      metadata.sources.len(),
      request.digests.len()
    )));
  }
  for (index, (stored, live)) in metadata.sources.iter().zip(request.digests).enumerate() {
    if stored.size != live.size {
      return Err(integrity(format!(
        "source #{} size changed: recorded {}, now {}",
        index, stored.size, live.size
      )));
    }
    if stored.hash != live.hash {
      return Err(integrity(format!(
        "source #{} hash changed: recorded {}, now {}",
        index, stored.hash, live.hash
      )));
    }
  }

  let actual = fs::metadata(cached_file).map_err(|e| ArchiveError::io(cached_file, e))?.len();
  if actual != metadata.size {
    return Err(integrity(format!(
      "cached file is {} bytes, recorded {}",
      actual, metadata.size
    )));
  }
  Ok(())
}

fn copy_to_target(from: &Path, target: &Path) -> Result<(), ArchiveError> {
  let parent = target.parent().unwrap_or_else(|| Path::new("."));
  fs::create_dir_all(parent).map_err(|e| ArchiveError::io(parent, e))?;
  let temp = NamedTempFile::new_in(parent).map_err(|e| ArchiveError::io(parent, e))?;
  fs::copy(from, temp.path()).map_err(|e| ArchiveError::io(from, e))?;
  temp.persist(target).map_err(|e| ArchiveError::io(target, e.error))?;
  Ok(())
}

impl CacheManager for FsCacheManager {
  fn compute_if_absent(&self, request: &CacheRequest<'_>, produce: &mut Producer<'_>) -> Result<CacheOutcome, ArchiveError> {
    let lock = self.key_lock(request.fingerprint);
    let result = {
      let _guard = lock.lock().unwrap_or_else(|e| e.into_inner());
      self.compute_locked(request, produce)
    };
    self.release_key(request.fingerprint, &lock);
    result
  }
}

impl FsCacheManager {
  fn compute_locked(&self, request: &CacheRequest<'_>, produce: &mut Producer<'_>) -> Result<CacheOutcome, ArchiveError> {
    let dir = self.entry_dir(request.fingerprint);
    let cached_file = dir.join(request.file_name);
    let metadata_path = dir.join(format!("{}.{}", request.file_name, CACHE_METADATA_FILENAME));

    if cached_file.exists() {
      match Self::read_metadata(&metadata_path)? {
        Some(metadata) if metadata.version == CACHE_METADATA_VERSION => {
          validate_hit(request, &metadata, &cached_file)?;
          debug!(file = request.file_name, fingerprint = %request.fingerprint, "cache hit");
          let file = if request.use_cache_as_target {
            cached_file
          } else {
            copy_to_target(&cached_file, request.target)?;
            request.target.to_path_buf()
          };
          return Ok(CacheOutcome {
            file,
            hit: true,
            source_sizes: metadata.source_sizes,
          });
        }
        Some(metadata) => {
          warn!(
            file = request.file_name,
            version = metadata.version,
            "cache entry has an unknown format, rebuilding"
          );
        }
        None => {
          warn!(file = request.file_name, fingerprint = %request.fingerprint, "incomplete cache entry, rebuilding");
        }
      }
    }

    debug!(file = request.file_name, fingerprint = %request.fingerprint, "cache miss");
    fs::create_dir_all(&dir).map_err(|e| ArchiveError::io(&dir, e))?;
    let source_sizes = produce(&cached_file)?;
    let size = fs::metadata(&cached_file)
      .map_err(|e| ArchiveError::io(&cached_file, e))?
      .len();
    Self::write_metadata(
      &metadata_path,
      &CacheMetadata {
        version: CACHE_METADATA_VERSION,
        file_name: request.file_name.to_string(),
        size,
        sources: request.digests.to_vec(),
        source_sizes: source_sizes.clone(),
      },
    )?;

    let file = if request.use_cache_as_target {
      cached_file
    } else {
      copy_to_target(&cached_file, request.target)?;
      request.target.to_path_buf()
    };
    Ok(CacheOutcome {
      file,
      hit: false,
      source_sizes,
    })
  }
}
