//! Read-only view over compiled module outputs and library file sets.
//!
//! The packaging engine never compiles anything: it consumes a project model
//! through the [`ProjectModel`] trait. [`Project`] is the JSON-backed
//! implementation used by the CLI and the tests.

pub mod project;
pub mod types;

pub use project::{ModelError, Project};
pub use types::{
  Artifact, ArtifactElement, DependencyScope, Library, LibraryDependency, LibraryLevel, Module, ModuleDependency,
};

/// Query interface over the compiled project.
pub trait ProjectModel: Send + Sync {
  fn find_module(&self, name: &str) -> Option<&Module>;

  /// Look up a project-level library.
  fn find_library(&self, name: &str) -> Option<&Library>;

  fn find_artifact(&self, name: &str) -> Option<&Artifact>;

  /// All module names, sorted.
  fn module_names(&self) -> Vec<&str>;

  fn require_module(&self, name: &str) -> Result<&Module, ModelError> {
    self
      .find_module(name)
      .ok_or_else(|| ModelError::UnknownModule(name.to_string()))
  }

  /// Resolve a library dependency of `module`, looking in the module's private
  /// libraries for module-level edges.
  fn resolve_library<'a>(&'a self, module: &'a Module, dependency: &LibraryDependency<'_>) -> Option<&'a Library> {
    match dependency.level {
      LibraryLevel::Project => self.find_library(dependency.name),
      LibraryLevel::Module => module.find_library(dependency.name),
    }
  }
}
