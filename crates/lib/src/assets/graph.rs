//! Target-path registry for planned assets.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::layout::LayoutError;

use super::types::{Asset, AssetKind};

/// Result of claiming a library file for a target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Claim {
  /// First claim; queue the file.
  New,
  /// Already queued into the same target.
  AlreadyInTarget,
  /// Already queued into another target, which keeps it.
  Elsewhere(String),
}

/// Every asset of a build, keyed by target path.
///
/// Two assets may never claim the same target path with different sources.
/// Library file claims are tracked per layout: each layout ships its own copy.
#[derive(Debug, Default)]
pub struct AssetGraph {
  assets: Vec<Asset>,
  index: BTreeMap<String, usize>,
  claims: BTreeMap<(String, PathBuf), String>,
}

impl AssetGraph {
  pub fn new() -> Self {
    Self::default()
  }

  /// The archive at `relative_path`, created on first use.
  pub fn archive_mut(&mut self, relative_path: &str, layout: &str) -> Result<&mut Asset, LayoutError> {
    if let Some(&at) = self.index.get(relative_path) {
      let existing = &self.assets[at];
      if existing.kind != AssetKind::Archive || existing.layout != layout {
        return Err(LayoutError::AssetCollision {
          path: relative_path.to_string(),
          first: existing.describe_sources(),
          second: vec![format!("archive of layout '{}'", layout)],
        });
      }
      return Ok(&mut self.assets[at]);
    }
    self.index.insert(relative_path.to_string(), self.assets.len());
    self.assets.push(Asset::new(relative_path, AssetKind::Archive, layout));
    let last = self.assets.len() - 1;
    Ok(&mut self.assets[last])
  }

  /// Add a complete asset. An identical asset at the same path is ignored;
  /// anything else at that path is a collision.
  pub fn insert_unique(&mut self, asset: Asset) -> Result<(), LayoutError> {
    if let Some(&at) = self.index.get(&asset.relative_path) {
      let existing = &self.assets[at];
      let first = existing.describe_sources();
      let second = asset.describe_sources();
      if existing.kind == asset.kind && first == second {
        debug!(path = %asset.relative_path, "identical asset declared twice");
        return Ok(());
      }
      return Err(LayoutError::AssetCollision {
        path: asset.relative_path,
        first,
        second,
      });
    }
    self.index.insert(asset.relative_path.clone(), self.assets.len());
    self.assets.push(asset);
    Ok(())
  }

  /// Register `file` as queued into `target` of `layout`. Within a layout the
  /// first claim wins.
  pub fn claim_file(&mut self, layout: &str, file: &Path, target: &str) -> Claim {
    let key = (layout.to_string(), file.to_path_buf());
    match self.claims.get(&key) {
      None => {
        self.claims.insert(key, target.to_string());
        Claim::New
      }
      Some(existing) if existing == target => Claim::AlreadyInTarget,
      Some(existing) => {
        debug!(layout, file = %file.display(), kept = %existing, dropped = target, "library file already packed");
        Claim::Elsewhere(existing.clone())
      }
    }
  }

  pub fn get(&self, relative_path: &str) -> Option<&Asset> {
    self.index.get(relative_path).map(|&at| &self.assets[at])
  }

  pub fn len(&self) -> usize {
    self.assets.len()
  }

  pub fn is_empty(&self) -> bool {
    self.assets.is_empty()
  }

  /// Assets in planning order, dropping archives nothing was queued into.
  pub fn into_assets(self) -> Vec<Asset> {
    self.assets.into_iter().filter(|a| !a.sources.is_empty()).collect()
  }
}
