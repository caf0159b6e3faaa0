//! Content-addressed archive building.
//!
//! Independent assets are built concurrently on blocking worker threads,
//! bounded by a semaphore. Every task is joined before the step returns, and
//! one failing asset never cancels its siblings: all failures are collected
//! and reported together.

pub mod cache;
pub mod fingerprint;
pub mod sign;
pub mod types;
pub mod writer;

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info};

use crate::assets::{Asset, AssetKind};

pub use cache::{CacheManager, CacheOutcome, CacheRequest, FsCacheManager, NoCacheManager};
pub use fingerprint::{Fingerprint, compute_fingerprint, seed_for, source_digest};
pub use sign::{NativeFileSigner, is_native_entry};
pub use types::{ArchiveError, AssetFailure, BuildFailure, BuiltAsset};
pub use writer::{WriteOptions, write_asset};

/// Builds planned assets into a distribution directory.
#[derive(Clone)]
pub struct ArchiveBuilder {
  cache: Arc<dyn CacheManager>,
  signer: Option<Arc<dyn NativeFileSigner>>,
  entry_order: Arc<Vec<String>>,
  parallelism: usize,
}

impl ArchiveBuilder {
  pub fn new(cache: Arc<dyn CacheManager>) -> Self {
    Self {
      cache,
      signer: None,
      entry_order: Arc::new(Vec::new()),
      parallelism: std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1),
    }
  }

  pub fn with_signer(mut self, signer: Arc<dyn NativeFileSigner>) -> Self {
    self.signer = Some(signer);
    self
  }

  pub fn with_entry_order(mut self, order: Vec<String>) -> Self {
    self.entry_order = Arc::new(order);
    self
  }

  pub fn with_parallelism(mut self, parallelism: usize) -> Self {
    self.parallelism = parallelism.max(1);
    self
  }

  /// Build every asset under `dist_root`.
  ///
  /// Results are returned in asset order. On failure, the failure of the
  /// earliest asset is `first` and every other failure is attached.
  pub async fn build(&self, assets: Arc<Vec<Asset>>, dist_root: &Path) -> Result<Vec<BuiltAsset>, BuildFailure> {
    info!(assets = assets.len(), parallelism = self.parallelism, "building assets");
    let semaphore = Arc::new(Semaphore::new(self.parallelism));
    let order_salt = (!self.entry_order.is_empty()).then(|| seed_for(&self.entry_order.join("\n")));

    let mut join_set = JoinSet::new();
    let mut task_index = HashMap::new();

    for index in 0..assets.len() {
      let assets = assets.clone();
      let semaphore = semaphore.clone();
      let cache = self.cache.clone();
      let signer = self.signer.clone();
      let entry_order = self.entry_order.clone();
      let dist_root = dist_root.to_path_buf();

      let handle = join_set.spawn(async move {
        let asset_path = assets[index].relative_path.clone();
        let _permit = match semaphore.acquire().await {
          Ok(permit) => permit,
          Err(e) => {
            let error = ArchiveError::Task {
              asset: asset_path,
              message: e.to_string(),
            };
            return (index, Err(error));
          }
        };

        let result = tokio::task::spawn_blocking(move || {
          let options = WriteOptions {
            signer: signer.as_deref(),
            entry_order: &entry_order,
          };
          build_one(&assets[index], &dist_root, cache.as_ref(), options, order_salt)
        })
        .await;

        let result = result.unwrap_or_else(|e| {
          Err(ArchiveError::Task {
            asset: asset_path,
            message: e.to_string(),
          })
        });
        (index, result)
      });
      task_index.insert(handle.id(), index);
    }

    let mut built: Vec<Option<BuiltAsset>> = (0..assets.len()).map(|_| None).collect();
    let mut failures: Vec<(usize, AssetFailure)> = Vec::new();

    while let Some(joined) = join_set.join_next_with_id().await {
      match joined {
        Ok((_, (index, Ok(asset)))) => built[index] = Some(asset),
        Ok((_, (index, Err(e)))) => {
          let asset = assets[index].relative_path.clone();
          error!(asset = %asset, error = %e, "asset build failed");
          failures.push((index, AssetFailure { asset, error: e }));
        }
        Err(e) => {
          let index = task_index.get(&e.id()).copied().unwrap_or(0);
          let asset = assets.get(index).map(|a| a.relative_path.clone()).unwrap_or_default();
          error!(asset = %asset, error = %e, "asset build task panicked");
          let error = ArchiveError::Task {
            asset: asset.clone(),
            message: e.to_string(),
          };
          failures.push((index, AssetFailure { asset, error }));
        }
      }
    }

    if !failures.is_empty() {
      failures.sort_by_key(|(index, _)| *index);
      let mut failures = failures.into_iter().map(|(_, f)| f);
      if let Some(first) = failures.next() {
        return Err(BuildFailure {
          first,
          suppressed: failures.collect(),
        });
      }
    }

    let built: Vec<BuiltAsset> = built.into_iter().flatten().collect();
    let hits = built.iter().filter(|b| b.cache_hit).count();
    info!(built = built.len() - hits, cached = hits, "assets built");
    Ok(built)
  }
}

fn combine_seeds(seed: Option<u64>, salt: Option<u64>) -> Option<u64> {
  match (seed, salt) {
    (None, None) => None,
    (seed, salt) => Some(seed.unwrap_or(0) ^ salt.unwrap_or(0).rotate_left(17)),
  }
}

fn build_one(
  asset: &Asset,
  dist_root: &Path,
  cache: &dyn CacheManager,
  options: WriteOptions<'_>,
  order_salt: Option<u64>,
) -> Result<BuiltAsset, ArchiveError> {
  let target = dist_root.join(&asset.relative_path);
  let digests = asset.sources.iter().map(source_digest).collect::<Result<Vec<_>, _>>()?;

  if asset.kind == AssetKind::Directory {
    let source_sizes = write_asset(asset, &target, options)?;
    return Ok(BuiltAsset {
      relative_path: asset.relative_path.clone(),
      kind: asset.kind,
      size: source_sizes.iter().sum(),
      file: target,
      fingerprint: None,
      cache_hit: false,
      digests,
      source_sizes,
    });
  }

  let fingerprint = compute_fingerprint(&digests, combine_seeds(asset.fingerprint_seed, order_salt));
  let request = CacheRequest {
    fingerprint,
    file_name: asset.file_name(),
    digests: &digests,
    target: &target,
    use_cache_as_target: asset.use_cache_as_target,
  };
  let outcome = cache.compute_if_absent(&request, &mut |path: &Path| write_asset(asset, path, options))?;
  debug!(asset = %asset.relative_path, fingerprint = %fingerprint, hit = outcome.hit, "asset ready");

  let file: PathBuf = outcome.file;
  let size = fs::metadata(&file).map_err(|e| ArchiveError::io(&file, e))?.len();
  Ok(BuiltAsset {
    relative_path: asset.relative_path.clone(),
    kind: asset.kind,
    file,
    fingerprint: Some(fingerprint),
    cache_hit: outcome.hit,
    digests,
    source_sizes: outcome.source_sizes,
    size,
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::assets::{Source, SourceContent, SourceOwner};
  use crate::util::testutil::zip_entry_names;
  use tempfile::TempDir;

  fn in_memory_asset(path: &str, entry: &str) -> Asset {
    let mut asset = Asset::new(path, AssetKind::Archive, "platform");
    asset.sources.push(Source {
      content: SourceContent::InMemory {
        name: entry.to_string(),
        data: Arc::new(entry.as_bytes().to_vec()),
      },
      owner: SourceOwner::Custom {
        reason: "test".to_string(),
      },
    });
    asset
  }

  fn raw_file_asset(path: &str, file: PathBuf) -> Asset {
    let mut asset = Asset::new(path, AssetKind::File, "platform");
    asset.sources.push(Source {
      content: SourceContent::RawFile { file },
      owner: SourceOwner::Custom {
        reason: "test".to_string(),
      },
    });
    asset
  }

  #[tokio::test]
  async fn builds_all_assets_in_order() {
    let temp = TempDir::new().unwrap();
    let dist = temp.path().join("dist");
    let assets = Arc::new(vec![in_memory_asset("lib/a.jar", "a.txt"), in_memory_asset("lib/b.jar", "b.txt")]);
    let builder = ArchiveBuilder::new(Arc::new(NoCacheManager)).with_parallelism(2);

    let built = builder.build(assets, &dist).await.unwrap();

    assert_eq!(built.len(), 2);
    assert_eq!(built[0].relative_path, "lib/a.jar");
    assert_eq!(zip_entry_names(&dist.join("lib/b.jar")), vec!["b.txt"]);
  }

  #[tokio::test]
  async fn failures_are_collected_without_cancelling_siblings() {
    let temp = TempDir::new().unwrap();
    let dist = temp.path().join("dist");
    let assets = Arc::new(vec![
      raw_file_asset("lib/missing-1.jar", temp.path().join("nope-1.jar")),
      in_memory_asset("lib/ok.jar", "ok.txt"),
      raw_file_asset("lib/missing-2.jar", temp.path().join("nope-2.jar")),
    ]);
    let builder = ArchiveBuilder::new(Arc::new(NoCacheManager));

    let failure = builder.build(assets, &dist).await.unwrap_err();

    assert_eq!(failure.first.asset, "lib/missing-1.jar");
    assert_eq!(failure.suppressed.len(), 1);
    assert_eq!(failure.suppressed[0].asset, "lib/missing-2.jar");
    assert!(dist.join("lib/ok.jar").exists());
  }

  #[tokio::test]
  async fn identical_content_is_built_once_per_fingerprint() {
    let temp = TempDir::new().unwrap();
    let cache_dir = temp.path().join("cache");
    let assets = Arc::new(vec![in_memory_asset("lib/a.jar", "same.txt")]);
    let builder = ArchiveBuilder::new(Arc::new(FsCacheManager::new(&cache_dir)));

    let first = builder.build(assets.clone(), &temp.path().join("one")).await.unwrap();
    let second = builder.build(assets, &temp.path().join("two")).await.unwrap();

    assert!(!first[0].cache_hit);
    assert!(second[0].cache_hit);
    assert_eq!(first[0].fingerprint, second[0].fingerprint);
    assert!(temp.path().join("two/lib/a.jar").exists());
  }

  #[test]
  fn seeds_combine_only_when_present() {
    assert_eq!(combine_seeds(None, None), None);
    assert_eq!(combine_seeds(Some(5), None), Some(5));
    assert_ne!(combine_seeds(Some(5), Some(1)), Some(5));
  }
}
