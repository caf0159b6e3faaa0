//! Assets and their sources.

use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::layout::{ContentGenerator, LibraryPackMode};
use crate::model::ArtifactElement;
use crate::util::filter::ExcludeSet;
use crate::util::hash::ContentHash;

/// Where the bytes of a source come from.
#[derive(Clone)]
pub enum SourceContent {
  /// Files under `root`, placed under `prefix` in the target.
  Directory {
    root: PathBuf,
    prefix: String,
    excludes: ExcludeSet,
  },
  /// Entries of an existing archive.
  Archive { file: PathBuf, excludes: ExcludeSet },
  /// A single generated entry.
  InMemory { name: String, data: Arc<Vec<u8>> },
  /// A single entry produced on demand.
  Lazy {
    name: String,
    generator: Arc<dyn ContentGenerator>,
  },
  /// A file copied unchanged.
  RawFile { file: PathBuf },
}

impl fmt::Debug for SourceContent {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.describe())
  }
}

impl SourceContent {
  /// Human-readable description used in collision reports.
  pub fn describe(&self) -> String {
    match self {
      SourceContent::Directory { root, prefix, excludes } => {
        let mut text = format!("directory {}", root.display());
        if !prefix.is_empty() {
          text.push_str(&format!(" -> {}", prefix));
        }
        if !excludes.is_empty() {
          text.push_str(&format!(" (excludes: {})", excludes.patterns().join(", ")));
        }
        text
      }
      SourceContent::Archive { file, excludes } => {
        if excludes.is_empty() {
          format!("archive {}", file.display())
        } else {
          format!("archive {} (excludes: {})", file.display(), excludes.patterns().join(", "))
        }
      }
      SourceContent::InMemory { name, data } => format!("in-memory {} ({} bytes)", name, data.len()),
      SourceContent::Lazy { name, generator } => format!("generated {} by {}", name, generator.name()),
      SourceContent::RawFile { file } => format!("file {}", file.display()),
    }
  }
}

/// Who contributed a source. Carried through to distribution entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceOwner {
  Module {
    module: String,
    reason: Option<String>,
  },
  ModuleLibrary {
    module: String,
    library: String,
    file: PathBuf,
  },
  ProjectLibrary {
    library: String,
    mode: LibraryPackMode,
    file: PathBuf,
    reason: String,
    dependents: Vec<String>,
  },
  Artifact {
    name: String,
    elements: Vec<ArtifactElement>,
  },
  Custom {
    reason: String,
  },
}

/// One input of an asset.
#[derive(Debug, Clone)]
pub struct Source {
  pub content: SourceContent,
  pub owner: SourceOwner,
}

impl Source {
  pub fn describe(&self) -> String {
    self.content.describe()
  }
}

/// Identity of a source once materialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDigest {
  pub size: u64,
  pub hash: ContentHash,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetKind {
  Archive,
  /// Unpacked tree; never cached.
  Directory,
  /// A single plain file.
  File,
}

/// A target file or directory in the distribution.
#[derive(Debug, Clone)]
pub struct Asset {
  /// Path relative to the distribution root.
  pub relative_path: String,
  pub kind: AssetKind,
  /// Ordered; the order feeds the fingerprint and the entry order.
  pub sources: Vec<Source>,
  pub layout: String,
  /// Entry names routed through the native signer.
  pub native_files: BTreeSet<String>,
  /// Mixed into the fingerprint so identical content of unrelated plugins
  /// never shares a cache entry.
  pub fingerprint_seed: Option<u64>,
  /// Use the cached file itself as the output instead of copying it.
  pub use_cache_as_target: bool,
}

impl Asset {
  pub fn new(relative_path: &str, kind: AssetKind, layout: &str) -> Self {
    Self {
      relative_path: relative_path.to_string(),
      kind,
      sources: Vec::new(),
      layout: layout.to_string(),
      native_files: BTreeSet::new(),
      fingerprint_seed: None,
      use_cache_as_target: false,
    }
  }

  pub fn describe_sources(&self) -> Vec<String> {
    self.sources.iter().map(Source::describe).collect()
  }

  /// File name of the target.
  pub fn file_name(&self) -> &str {
    self
      .relative_path
      .rsplit_once('/')
      .map(|(_, name)| name)
      .unwrap_or(&self.relative_path)
  }
}
