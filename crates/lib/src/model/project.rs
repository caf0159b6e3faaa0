//! JSON-backed project model.
//!
//! # File format
//!
//! ```json
//! {
//!   "modules": [
//!     { "name": "core", "output": "out/core",
//!       "dependencies": [{ "kind": "library", "name": "guava" }] }
//!   ],
//!   "libraries": [{ "name": "guava", "files": ["libs/guava-33.0.jar"] }],
//!   "artifacts": []
//! }
//! ```
//!
//! Relative paths are resolved against the directory containing the file.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use super::ProjectModel;
use super::types::{Artifact, Library, LibraryLevel, Module};

#[derive(Debug, Error)]
pub enum ModelError {
  #[error("failed to read project model {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to parse project model {path}: {source}")]
  Parse {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },

  #[error("module '{0}' is declared more than once")]
  DuplicateModule(String),

  #[error("library '{0}' is declared more than once")]
  DuplicateLibrary(String),

  #[error("artifact '{0}' is declared more than once")]
  DuplicateArtifact(String),

  #[error("unknown module '{0}'")]
  UnknownModule(String),
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ProjectFile {
  #[serde(default)]
  modules: Vec<Module>,
  #[serde(default)]
  libraries: Vec<Library>,
  #[serde(default)]
  artifacts: Vec<Artifact>,
}

/// An in-memory project model indexed by name.
#[derive(Debug, Clone, Default)]
pub struct Project {
  modules: BTreeMap<String, Module>,
  libraries: BTreeMap<String, Library>,
  artifacts: BTreeMap<String, Artifact>,
}

impl Project {
  pub fn new(modules: Vec<Module>, libraries: Vec<Library>, artifacts: Vec<Artifact>) -> Result<Self, ModelError> {
    let mut project = Project::default();

    for module in modules {
      if project.modules.contains_key(&module.name) {
        return Err(ModelError::DuplicateModule(module.name));
      }
      project.modules.insert(module.name.clone(), module);
    }

    for mut library in libraries {
      if project.libraries.contains_key(&library.name) {
        return Err(ModelError::DuplicateLibrary(library.name));
      }
      library.level = LibraryLevel::Project;
      project.libraries.insert(library.name.clone(), library);
    }

    for artifact in artifacts {
      if project.artifacts.contains_key(&artifact.name) {
        return Err(ModelError::DuplicateArtifact(artifact.name));
      }
      project.artifacts.insert(artifact.name.clone(), artifact);
    }

    Ok(project)
  }

  /// Load a project model from a JSON file.
  pub fn load(path: &Path) -> Result<Self, ModelError> {
    let content = fs::read_to_string(path).map_err(|e| ModelError::Read {
      path: path.to_path_buf(),
      source: e,
    })?;
    let file: ProjectFile = serde_json::from_str(&content).map_err(|e| ModelError::Parse {
      path: path.to_path_buf(),
      source: e,
    })?;

    let base = path.parent().unwrap_or(Path::new("."));
    let modules = file.modules.into_iter().map(|m| rebase_module(base, m)).collect();
    let libraries = file.libraries.into_iter().map(|l| rebase_library(base, l)).collect();
    let artifacts = file
      .artifacts
      .into_iter()
      .map(|mut a| {
        a.output = base.join(&a.output);
        a
      })
      .collect();

    let project = Self::new(modules, libraries, artifacts)?;
    debug!(
      path = %path.display(),
      modules = project.modules.len(),
      libraries = project.libraries.len(),
      "loaded project model"
    );
    Ok(project)
  }

  pub fn modules(&self) -> impl Iterator<Item = &Module> {
    self.modules.values()
  }

  pub fn libraries(&self) -> impl Iterator<Item = &Library> {
    self.libraries.values()
  }
}

fn rebase_module(base: &Path, mut module: Module) -> Module {
  module.output = base.join(&module.output);
  module.test_output = module.test_output.map(|p| base.join(p));
  module.content_root = module.content_root.map(|p| base.join(p));
  module.source_roots = module.source_roots.iter().map(|p| base.join(p)).collect();
  module.libraries = module
    .libraries
    .into_iter()
    .map(|l| {
      let mut l = rebase_library(base, l);
      l.level = LibraryLevel::Module;
      l
    })
    .collect();
  module
}

fn rebase_library(base: &Path, mut library: Library) -> Library {
  library.files = library.files.iter().map(|f| base.join(f)).collect();
  library
}

impl ProjectModel for Project {
  fn find_module(&self, name: &str) -> Option<&Module> {
    self.modules.get(name)
  }

  fn find_library(&self, name: &str) -> Option<&Library> {
    self.libraries.get(name)
  }

  fn find_artifact(&self, name: &str) -> Option<&Artifact> {
    self.artifacts.get(name)
  }

  fn module_names(&self) -> Vec<&str> {
    self.modules.keys().map(|k| k.as_str()).collect()
  }
}
