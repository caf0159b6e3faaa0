//! Distribution file entries.

use std::cmp::Ordering;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::layout::LibraryPackMode;
use crate::util::hash::ContentHash;
use crate::util::naming::normalize_relative;

/// Who contributed bytes to a built file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EntryOwner {
  ModuleOutput {
    module: String,
  },
  ModuleTestOutput {
    module: String,
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
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    dependents: Vec<String>,
  },
  Custom,
}

impl EntryOwner {
  /// Sort rank of the owner kind.
  pub fn rank(&self) -> u8 {
    match self {
      EntryOwner::ModuleOutput { .. } => 0,
      EntryOwner::ModuleTestOutput { .. } => 1,
      EntryOwner::ModuleLibrary { .. } => 2,
      EntryOwner::ProjectLibrary { .. } => 3,
      EntryOwner::Custom => 4,
    }
  }

  pub fn kind_name(&self) -> &'static str {
    match self {
      EntryOwner::ModuleOutput { .. } => "module_output",
      EntryOwner::ModuleTestOutput { .. } => "module_test_output",
      EntryOwner::ModuleLibrary { .. } => "module_library",
      EntryOwner::ProjectLibrary { .. } => "project_library",
      EntryOwner::Custom => "custom",
    }
  }

  /// Name used for ordering and reports.
  pub fn name(&self) -> String {
    match self {
      EntryOwner::ModuleOutput { module } | EntryOwner::ModuleTestOutput { module } => module.clone(),
      EntryOwner::ModuleLibrary { module, library, .. } => format!("{}/{}", module, library),
      EntryOwner::ProjectLibrary { library, .. } => library.clone(),
      EntryOwner::Custom => String::new(),
    }
  }

  /// Module the bytes logically belong to, if any.
  pub fn module(&self) -> Option<&str> {
    match self {
      EntryOwner::ModuleOutput { module }
      | EntryOwner::ModuleTestOutput { module }
      | EntryOwner::ModuleLibrary { module, .. } => Some(module),
      _ => None,
    }
  }
}

/// Provenance record: which owner put how many bytes into which file.
/// Never mutated once recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributionFileEntry {
  /// Path relative to the distribution root, `/`-separated.
  pub path: String,
  pub owner: EntryOwner,
  pub size: u64,
  pub hash: ContentHash,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub reason: Option<String>,
  pub layout: String,
}

impl DistributionFileEntry {
  pub fn compare(&self, other: &Self) -> Ordering {
    normalize_relative(&self.path)
      .cmp(&normalize_relative(&other.path))
      .then_with(|| self.owner.rank().cmp(&other.owner.rank()))
      .then_with(|| self.owner.name().cmp(&other.owner.name()))
  }
}

/// Sort entries by normalized path, owner kind, then owner name.
pub fn sort_entries(entries: &mut [DistributionFileEntry]) {
  entries.sort_by(|a, b| a.compare(b));
}
