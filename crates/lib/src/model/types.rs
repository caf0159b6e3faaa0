//! Module, library and artifact types of the compiled project model.
//!
//! These values are loaded once per build and never mutated afterwards.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Scope of a dependency edge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyScope {
  #[default]
  Compile,
  Runtime,
  Test,
  Provided,
}

impl DependencyScope {
  /// Whether the edge is part of the production runtime classpath.
  pub fn is_production_runtime(self) -> bool {
    matches!(self, DependencyScope::Compile | DependencyScope::Runtime)
  }

  /// Whether the edge is part of the runtime classpath, optionally including test edges.
  pub fn is_runtime(self, include_tests: bool) -> bool {
    self.is_production_runtime() || (include_tests && self == DependencyScope::Test)
  }
}

/// Where a library is declared.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LibraryLevel {
  #[default]
  Project,
  /// Private to the module that declares the dependency.
  Module,
}

/// A dependency edge declared by a module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModuleDependency {
  Module {
    name: String,
    #[serde(default)]
    scope: DependencyScope,
    #[serde(default)]
    exported: bool,
  },
  Library {
    name: String,
    #[serde(default)]
    level: LibraryLevel,
    #[serde(default)]
    scope: DependencyScope,
    #[serde(default)]
    exported: bool,
  },
  /// The language runtime; never packaged.
  Sdk { name: String },
}

/// A library dependency as seen from a module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LibraryDependency<'a> {
  pub name: &'a str,
  pub level: LibraryLevel,
  pub scope: DependencyScope,
  pub exported: bool,
}

/// A compiled module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Module {
  pub name: String,
  /// Production output directory.
  pub output: PathBuf,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub test_output: Option<PathBuf>,
  /// Content root, the base for resource-copy directives.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub content_root: Option<PathBuf>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub source_roots: Vec<PathBuf>,
  #[serde(default)]
  pub dependencies: Vec<ModuleDependency>,
  /// Libraries private to this module.
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub libraries: Vec<Library>,
  /// Entry names inside the module output that are platform binaries.
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub native_files: Vec<String>,
}

impl Module {
  pub fn output_directory(&self, for_tests: bool) -> Option<&Path> {
    if for_tests {
      self.test_output.as_deref()
    } else {
      Some(self.output.as_path())
    }
  }

  /// Library edges on the runtime classpath, in declaration order.
  pub fn runtime_library_dependencies(&self, include_tests: bool) -> Vec<LibraryDependency<'_>> {
    self
      .dependencies
      .iter()
      .filter_map(|dep| match dep {
        ModuleDependency::Library {
          name,
          level,
          scope,
          exported,
        } if scope.is_runtime(include_tests) => Some(LibraryDependency {
          name,
          level: *level,
          scope: *scope,
          exported: *exported,
        }),
        _ => None,
      })
      .collect()
  }

  /// Names of modules this module needs at production runtime, in declaration order.
  pub fn runtime_module_dependencies(&self) -> Vec<&str> {
    self
      .dependencies
      .iter()
      .filter_map(|dep| match dep {
        ModuleDependency::Module { name, scope, .. } if scope.is_production_runtime() => Some(name.as_str()),
        _ => None,
      })
      .collect()
  }

  pub fn find_library(&self, name: &str) -> Option<&Library> {
    self.libraries.iter().find(|l| l.name == name)
  }

  /// Whether the compiled output contains `relative_path`.
  pub fn output_contains(&self, relative_path: &str) -> bool {
    self.output.join(relative_path).is_file()
  }
}

/// A library: one or more archive files on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Library {
  pub name: String,
  pub files: Vec<PathBuf>,
  #[serde(default)]
  pub level: LibraryLevel,
}

impl Library {
  pub fn files(&self) -> &[PathBuf] {
    &self.files
  }

  pub fn is_project_level(&self) -> bool {
    self.level == LibraryLevel::Project
  }
}

/// An element packed into a prebuilt project artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ArtifactElement {
  ModuleOutput { module: String },
  ModuleTestOutput { module: String },
  LibraryFiles {
    library: String,
    /// Set for module-private libraries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    module: Option<String>,
  },
}

/// A prebuilt project artifact: a single file or a directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
  pub name: String,
  pub output: PathBuf,
  #[serde(default)]
  pub elements: Vec<ArtifactElement>,
}

#[cfg(test)]
mod tests {
  use super::*;

  fn module_with(dependencies: Vec<ModuleDependency>) -> Module {
    Module {
      name: "core".to_string(),
      output: PathBuf::from("/out/core"),
      test_output: Some(PathBuf::from("/out/test/core")),
      content_root: None,
      source_roots: vec![],
      dependencies,
      libraries: vec![],
      native_files: vec![],
    }
  }

  fn lib_dep(name: &str, scope: DependencyScope) -> ModuleDependency {
    ModuleDependency::Library {
      name: name.to_string(),
      level: LibraryLevel::Project,
      scope,
      exported: false,
    }
  }

  #[test]
  fn output_directory_selects_test_output() {
    let module = module_with(vec![]);
    assert_eq!(module.output_directory(false), Some(Path::new("/out/core")));
    assert_eq!(module.output_directory(true), Some(Path::new("/out/test/core")));
  }

  #[test]
  fn runtime_library_dependencies_respect_scope() {
    let module = module_with(vec![
      lib_dep("guava", DependencyScope::Compile),
      lib_dep("junit", DependencyScope::Test),
      lib_dep("servlet-api", DependencyScope::Provided),
      lib_dep("jna", DependencyScope::Runtime),
    ]);

    let production: Vec<_> = module.runtime_library_dependencies(false).iter().map(|d| d.name).collect();
    assert_eq!(production, vec!["guava", "jna"]);

    let with_tests: Vec<_> = module.runtime_library_dependencies(true).iter().map(|d| d.name).collect();
    assert_eq!(with_tests, vec!["guava", "junit", "jna"]);
  }

  #[test]
  fn runtime_module_dependencies_skip_sdk_libraries_and_tests() {
    let module = module_with(vec![
      ModuleDependency::Sdk { name: "jdk".to_string() },
      ModuleDependency::Module {
        name: "util".to_string(),
        scope: DependencyScope::Compile,
        exported: true,
      },
      ModuleDependency::Module {
        name: "test-framework".to_string(),
        scope: DependencyScope::Test,
        exported: false,
      },
      lib_dep("guava", DependencyScope::Compile),
    ]);

    assert_eq!(module.runtime_module_dependencies(), vec!["util"]);
  }

  #[test]
  fn dependency_json_uses_defaults() {
    let dep: ModuleDependency = serde_json::from_str(r#"{"kind": "library", "name": "guava"}"#).unwrap();
    assert_eq!(dep, lib_dep("guava", DependencyScope::Compile));
  }
}
