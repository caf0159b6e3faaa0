//! Per-build context.
//!
//! Everything a build needs from its environment is resolved once here and
//! passed by reference to every phase.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;

use crate::archive::{ArchiveBuilder, CacheManager, FsCacheManager, NativeFileSigner, NoCacheManager};
use crate::assets::PlanOptions;
use crate::config::{BuildOptions, ConfigError};
use crate::resolve::PackModeRules;

pub struct BuildContext {
  pub options: BuildOptions,
  pub parallelism: usize,
  /// `None` when caching is disabled.
  pub cache_dir: Option<PathBuf>,
  pub cache: Arc<dyn CacheManager>,
  pub signer: Option<Arc<dyn NativeFileSigner>>,
  pub entry_order: Vec<String>,
  pub pack_rules: PackModeRules,
}

impl BuildContext {
  pub fn new(options: BuildOptions) -> Result<Self, ConfigError> {
    let entry_order = match &options.entry_order {
      Some(path) => fs::read_to_string(path)
        .map_err(|source| ConfigError::Read {
          path: path.clone(),
          source,
        })?
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(String::from)
        .collect(),
      None => Vec::new(),
    };

    let (cache_dir, cache): (Option<PathBuf>, Arc<dyn CacheManager>) = if options.no_cache {
      (None, Arc::new(NoCacheManager))
    } else {
      let dir = options.effective_cache_dir();
      (Some(dir.clone()), Arc::new(FsCacheManager::new(dir)))
    };

    let parallelism = options.effective_parallelism();
    info!(
      parallelism,
      cache = ?cache_dir,
      unpacked = options.unpacked,
      frontend = options.frontend,
      ordered_entries = entry_order.len(),
      "build context ready"
    );

    Ok(Self {
      options,
      parallelism,
      cache_dir,
      cache,
      signer: None,
      entry_order,
      pack_rules: PackModeRules::default(),
    })
  }

  pub fn with_signer(mut self, signer: Arc<dyn NativeFileSigner>) -> Self {
    self.signer = Some(signer);
    self
  }

  pub fn with_pack_rules(mut self, rules: PackModeRules) -> Self {
    self.pack_rules = rules;
    self
  }

  pub fn plan_options(&self) -> PlanOptions {
    PlanOptions {
      unpacked: self.options.unpacked,
      use_cache_as_target: self.options.use_cache_as_target && !self.options.no_cache,
    }
  }

  pub fn archive_builder(&self) -> ArchiveBuilder {
    let builder = ArchiveBuilder::new(self.cache.clone())
      .with_parallelism(self.parallelism)
      .with_entry_order(self.entry_order.clone());
    match &self.signer {
      Some(signer) => builder.with_signer(signer.clone()),
      None => builder,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::TempDir;

  #[test]
  fn entry_order_skips_blank_and_comment_lines() {
    let temp = TempDir::new().unwrap();
    let order = temp.path().join("order.txt");
    fs::write(&order, "# hot classes\ncom/a/Main.class\n\n  com/a/Util.class \n").unwrap();

    let context = BuildContext::new(BuildOptions {
      entry_order: Some(order),
      no_cache: true,
      ..Default::default()
    })
    .unwrap();

    assert_eq!(context.entry_order, vec!["com/a/Main.class", "com/a/Util.class"]);
    assert!(context.cache_dir.is_none());
  }

  #[test]
  fn cache_as_target_requires_a_cache() {
    let context = BuildContext::new(BuildOptions {
      use_cache_as_target: true,
      no_cache: true,
      ..Default::default()
    })
    .unwrap();
    assert!(!context.plan_options().use_cache_as_target);
  }

  #[test]
  fn missing_entry_order_file_is_an_error() {
    let result = BuildContext::new(BuildOptions {
      entry_order: Some(PathBuf::from("/nonexistent/order.txt")),
      ..Default::default()
    });
    assert!(matches!(result, Err(ConfigError::Read { .. })));
  }
}
