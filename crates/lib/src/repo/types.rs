//! Runtime module repository types.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::consts::{MODULE_REPOSITORY_FILENAME, REPOSITORY_FORMAT_VERSION};
use crate::entries::{DistributionFileEntry, EntryOwner};
use crate::util::json::write_json_atomic;

#[derive(Debug, Error)]
pub enum RepositoryError {
  #[error("failed to write module repository {path}: {source}")]
  Write {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to read module repository {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to parse module repository {path}: {source}")]
  Parse {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },

  #[error("module repository {path} has unsupported format version {version}")]
  UnsupportedVersion { path: PathBuf, version: u32 },

  #[error("runtime module '{0}' is described more than once")]
  DuplicateId(String),

  #[error(
    "runtime module '{id}' has different dependencies in '{first_distribution}' ({first:?}) and \
     '{second_distribution}' ({second:?})"
  )]
  DependencyMismatch {
    id: String,
    first_distribution: String,
    first: Vec<String>,
    second_distribution: String,
    second: Vec<String>,
  },

  #[error("no module repositories to merge")]
  NothingToMerge,
}

/// Logical id of a module.
pub fn module_id(module: &str) -> String {
  module.to_string()
}

/// Logical id of a project-level library.
pub fn project_library_id(library: &str) -> String {
  format!("lib.{}", library)
}

/// Logical id of a library private to `module`.
pub fn module_library_id(module: &str, library: &str) -> String {
  format!("lib.{}/{}", module, library)
}

/// Logical id of the owner of an entry. Test output and custom content have none.
pub fn id_of(owner: &EntryOwner) -> Option<String> {
  match owner {
    EntryOwner::ModuleOutput { module } => Some(module_id(module)),
    EntryOwner::ModuleLibrary { module, library, .. } => Some(module_library_id(module, library)),
    EntryOwner::ProjectLibrary { library, .. } => Some(project_library_id(library)),
    EntryOwner::ModuleTestOutput { .. } | EntryOwner::Custom => None,
  }
}

/// One physical copy of a logical module inside a distribution tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryEntry<'a> {
  pub distribution: Option<&'a str>,
  pub relative_path: &'a str,
  pub entry: &'a DistributionFileEntry,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeModuleDescriptor {
  pub id: String,
  /// Paths relative to the distribution root, sorted.
  pub resource_paths: Vec<String>,
  /// Ids of runtime dependencies, sorted.
  #[serde(default)]
  pub dependencies: Vec<String>,
}

/// Descriptor set of one distribution tree, or of the merged cross-platform
/// variant when `distribution` is `None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeModuleRepository {
  pub version: u32,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub distribution: Option<String>,
  descriptors: BTreeMap<String, RuntimeModuleDescriptor>,
}

impl RuntimeModuleRepository {
  /// Build a repository, rejecting duplicate ids.
  pub fn new(
    distribution: Option<String>,
    descriptors: impl IntoIterator<Item = RuntimeModuleDescriptor>,
  ) -> Result<Self, RepositoryError> {
    let mut map = BTreeMap::new();
    for descriptor in descriptors {
      if map.contains_key(&descriptor.id) {
        return Err(RepositoryError::DuplicateId(descriptor.id));
      }
      map.insert(descriptor.id.clone(), descriptor);
    }
    Ok(Self {
      version: REPOSITORY_FORMAT_VERSION,
      distribution,
      descriptors: map,
    })
  }

  pub fn ids(&self) -> impl Iterator<Item = &str> {
    self.descriptors.keys().map(String::as_str)
  }

  pub fn descriptors(&self) -> impl Iterator<Item = &RuntimeModuleDescriptor> {
    self.descriptors.values()
  }

  pub fn find(&self, id: &str) -> Option<&RuntimeModuleDescriptor> {
    self.descriptors.get(id)
  }

  pub fn dependencies(&self, id: &str) -> Option<&[String]> {
    self.find(id).map(|d| d.dependencies.as_slice())
  }

  pub fn len(&self) -> usize {
    self.descriptors.len()
  }

  pub fn is_empty(&self) -> bool {
    self.descriptors.is_empty()
  }

  /// Display name of the distribution for messages.
  pub fn distribution_name(&self) -> &str {
    self.distribution.as_deref().unwrap_or("common")
  }

  /// Persist into `dir` under the standard file name. Returns the file path.
  pub fn save(&self, dir: &Path) -> Result<PathBuf, RepositoryError> {
    let path = dir.join(MODULE_REPOSITORY_FILENAME);
    self.write(&path)?;
    Ok(path)
  }

  /// Persist to an explicit file path.
  pub fn write(&self, path: &Path) -> Result<(), RepositoryError> {
    write_json_atomic(path, self).map_err(|e| RepositoryError::Write {
      path: path.to_path_buf(),
      source: e,
    })?;
    debug!(path = %path.display(), modules = self.len(), "saved module repository");
    Ok(())
  }

  /// Load a repository from a file, or from the standard file inside a directory.
  pub fn load(path: &Path) -> Result<Self, RepositoryError> {
    let path = if path.is_dir() {
      path.join(MODULE_REPOSITORY_FILENAME)
    } else {
      path.to_path_buf()
    };
    let content = fs::read_to_string(&path).map_err(|e| RepositoryError::Read {
      path: path.clone(),
      source: e,
    })?;
    let repository: Self = serde_json::from_str(&content).map_err(|e| RepositoryError::Parse {
      path: path.clone(),
      source: e,
    })?;
    if repository.version != REPOSITORY_FORMAT_VERSION {
      return Err(RepositoryError::UnsupportedVersion {
        path,
        version: repository.version,
      });
    }
    Ok(repository)
  }
}
