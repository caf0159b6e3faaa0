//! Build options.
//!
//! Options come from an optional `distpack.toml` and are then overridden by
//! environment variables. They are read once at startup into a
//! [`BuildContext`](crate::context::BuildContext); nothing reads the
//! environment afterwards.

use std::fs;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::consts::{APP_NAME, CACHE_DIR_ENV, CONFIG_FILENAME, PARALLELISM_ENV};

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("failed to read build options {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to parse build options {path}: {source}")]
  Parse {
    path: PathBuf,
    #[source]
    source: toml::de::Error,
  },

  #[error("invalid {name} value '{value}': expected a positive integer")]
  InvalidParallelism { name: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BuildOptions {
  /// Maximum number of concurrent asset builds. Defaults to available parallelism.
  pub parallelism: Option<usize>,
  /// Development build: modules may be laid out as directories.
  pub unpacked: bool,
  /// Report modules that are secretly plugins as errors instead of warnings.
  pub strict: bool,
  /// Let cache files serve as outputs instead of copying them.
  pub use_cache_as_target: bool,
  /// Pack for the client/frontend flavor.
  pub frontend: bool,
  /// Entry names to move to the front of every archive, one per line.
  pub entry_order: Option<PathBuf>,
  pub cache_dir: Option<PathBuf>,
  /// Always rebuild and never persist into the cache.
  pub no_cache: bool,
  /// OS/architecture tag of the distribution, e.g. `linux-x64`.
  pub distribution: Option<String>,
}

impl Default for BuildOptions {
  fn default() -> Self {
    Self {
      parallelism: None,
      unpacked: false,
      strict: true,
      use_cache_as_target: false,
      frontend: false,
      entry_order: None,
      cache_dir: None,
      no_cache: false,
      distribution: None,
    }
  }
}

impl BuildOptions {
  pub fn load(path: &Path) -> Result<Self, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
      path: path.to_path_buf(),
      source,
    })?;
    let mut options: Self = toml::from_str(&content).map_err(|source| ConfigError::Parse {
      path: path.to_path_buf(),
      source,
    })?;
    // Relative paths in the file are relative to the file.
    let base = path.parent().unwrap_or(Path::new("."));
    options.entry_order = options.entry_order.map(|p| base.join(p));
    options.cache_dir = options.cache_dir.map(|p| base.join(p));
    debug!(path = %path.display(), "loaded build options");
    Ok(options)
  }

  /// Load `distpack.toml` from `dir`, or return defaults when it does not exist.
  pub fn load_from_dir(dir: &Path) -> Result<Self, ConfigError> {
    let path = dir.join(CONFIG_FILENAME);
    if path.is_file() { Self::load(&path) } else { Ok(Self::default()) }
  }

  /// Apply `DISTPACK_CACHE_DIR` and `DISTPACK_PARALLELISM`.
  pub fn with_env_overrides(mut self) -> Result<Self, ConfigError> {
    if let Ok(dir) = std::env::var(CACHE_DIR_ENV)
      && !dir.is_empty()
    {
      self.cache_dir = Some(PathBuf::from(dir));
    }
    if let Ok(value) = std::env::var(PARALLELISM_ENV) {
      let parsed = value
        .trim()
        .parse::<NonZeroUsize>()
        .map_err(|_| ConfigError::InvalidParallelism {
          name: PARALLELISM_ENV,
          value: value.clone(),
        })?;
      self.parallelism = Some(parsed.get());
    }
    Ok(self)
  }

  /// Effective parallelism, never zero.
  pub fn effective_parallelism(&self) -> usize {
    self
      .parallelism
      .filter(|p| *p > 0)
      .unwrap_or_else(|| std::thread::available_parallelism().map_or(1, NonZeroUsize::get))
  }

  /// Effective cache directory.
  pub fn effective_cache_dir(&self) -> PathBuf {
    self.cache_dir.clone().unwrap_or_else(default_cache_dir)
  }
}

/// Returns the directory for cache files for the application
#[cfg(windows)]
pub fn default_cache_dir() -> PathBuf {
  std::env::var("LOCALAPPDATA")
    .map(PathBuf::from)
    .unwrap_or_else(|_| std::env::temp_dir())
    .join(APP_NAME)
    .join("Cache")
}

/// Returns the directory for cache files for the application
#[cfg(not(windows))]
pub fn default_cache_dir() -> PathBuf {
  let cache_home = std::env::var("XDG_CACHE_HOME")
    .map(PathBuf::from)
    .or_else(|_| std::env::var("HOME").map(|home| PathBuf::from(home).join(".cache")))
    .unwrap_or_else(|_| std::env::temp_dir());
  cache_home.join(APP_NAME)
}

#[cfg(test)]
mod tests {
  use super::*;
  use serial_test::serial;
  use tempfile::TempDir;

  #[test]
  fn missing_file_yields_defaults() {
    let temp = TempDir::new().unwrap();
    let options = BuildOptions::load_from_dir(temp.path()).unwrap();
    assert_eq!(options, BuildOptions::default());
    assert!(options.strict);
  }

  #[test]
  fn file_paths_are_relative_to_the_file() {
    let temp = TempDir::new().unwrap();
    fs::write(
      temp.path().join(CONFIG_FILENAME),
      "parallelism = 3\nunpacked = true\nentry_order = \"order.txt\"\ndistribution = \"linux-x64\"\n",
    )
    .unwrap();

    let options = BuildOptions::load_from_dir(temp.path()).unwrap();

    assert_eq!(options.effective_parallelism(), 3);
    assert!(options.unpacked);
    assert_eq!(options.entry_order, Some(temp.path().join("order.txt")));
    assert_eq!(options.distribution.as_deref(), Some("linux-x64"));
  }

  #[test]
  fn unknown_keys_are_rejected() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join(CONFIG_FILENAME);
    fs::write(&path, "paralelism = 3\n").unwrap();
    assert!(matches!(BuildOptions::load(&path), Err(ConfigError::Parse { .. })));
  }

  #[test]
  #[serial]
  fn env_overrides_file_values() {
    temp_env::with_vars(
      [(CACHE_DIR_ENV, Some("/tmp/distpack-cache")), (PARALLELISM_ENV, Some("2"))],
      || {
        let options = BuildOptions {
          parallelism: Some(8),
          ..Default::default()
        }
        .with_env_overrides()
        .unwrap();
        assert_eq!(options.parallelism, Some(2));
        assert_eq!(options.effective_cache_dir(), PathBuf::from("/tmp/distpack-cache"));
      },
    );
  }

  #[test]
  #[serial]
  fn zero_parallelism_is_rejected() {
    temp_env::with_var(PARALLELISM_ENV, Some("0"), || {
      let err = BuildOptions::default().with_env_overrides().unwrap_err();
      assert!(err.to_string().contains(PARALLELISM_ENV));
    });
  }

  #[test]
  #[serial]
  #[cfg(not(windows))]
  fn cache_dir_follows_xdg_then_home() {
    temp_env::with_vars(
      [
        (CACHE_DIR_ENV, None::<&str>),
        ("XDG_CACHE_HOME", Some("/custom/cache")),
        ("HOME", Some("/home/user")),
      ],
      || {
        assert_eq!(default_cache_dir(), PathBuf::from("/custom/cache").join(APP_NAME));
      },
    );
    temp_env::with_vars(
      [("XDG_CACHE_HOME", None::<&str>), ("HOME", Some("/home/user"))],
      || {
        assert_eq!(default_cache_dir(), PathBuf::from("/home/user/.cache").join(APP_NAME));
      },
    );
  }
}
