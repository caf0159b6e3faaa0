//! Layout types.
//!
//! A [`Layout`] is a named output group: the platform itself or one plugin.
//! It lists which modules go into which archive, which libraries are included
//! or excluded, and which extra resources, artifacts and generated content
//! belong to the group. Layouts are plain values: they are built once at
//! configuration time and threaded explicitly through resolution, which only
//! ever returns new layouts with additional module items.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::consts::{LIB_DIR, PLUGINS_DIR};
use crate::diagnostics::Diagnostics;
use crate::model::ModelError;
use crate::util::naming::join_relative;

use super::patch::OutputPatcher;

/// Fatal configuration errors.
#[derive(Debug, Error)]
pub enum LayoutError {
  #[error(transparent)]
  Model(#[from] ModelError),

  #[error("{0}")]
  Validation(#[from] Diagnostics),

  #[error("library '{library}' must always be separate from the platform, but layout '{layout}' packs it")]
  AlwaysSeparateLibrary { library: String, layout: String },

  #[error(
    "two assets target '{path}' with different sources:\n  first: [{}]\n  second: [{}]",
    first.join(", "),
    second.join(", ")
  )]
  AssetCollision {
    path: String,
    first: Vec<String>,
    second: Vec<String>,
  },

  #[error("invalid exclude pattern for '{owner}': {source}")]
  Pattern {
    owner: String,
    #[source]
    source: glob::PatternError,
  },

  #[error("failed to read layout file {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to parse layout file {path}: {source}")]
  Parse {
    path: PathBuf,
    #[source]
    source: toml::de::Error,
  },

  #[error("patcher '{patcher}' failed: {message}")]
  Patcher { patcher: String, message: String },
}

/// Placement of one module into a target archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleItem {
  pub module_name: String,
  /// Archive path relative to the layout's `lib` directory.
  pub relative_output_file: String,
  /// Why the module is included, for diagnostics and entry provenance.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub reason: Option<String>,
  /// Logical module set this item came from.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub module_set: Option<String>,
  /// Pull in the module's runtime dependencies even when the layout doesn't
  /// infer modules on its own.
  #[serde(default)]
  pub include_dependencies: bool,
}

impl ModuleItem {
  pub fn new(module_name: &str, relative_output_file: &str) -> Self {
    Self {
      module_name: module_name.to_string(),
      relative_output_file: relative_output_file.to_string(),
      reason: None,
      module_set: None,
      include_dependencies: false,
    }
  }

  pub fn with_reason(mut self, reason: &str) -> Self {
    self.reason = Some(reason.to_string());
    self
  }
}

/// How the files of a library end up in the distribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LibraryPackMode {
  /// Merged into the layout's shared library archive (or a named bundle).
  Merged,
  /// Merged into one archive named after the library.
  StandaloneMerged,
  /// Every library file becomes its own archive.
  StandaloneSeparate,
  /// Like `StandaloneSeparate`, with the version stripped from file names.
  StandaloneSeparateWithoutVersionName,
}

impl fmt::Display for LibraryPackMode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      LibraryPackMode::Merged => "merged",
      LibraryPackMode::StandaloneMerged => "standalone_merged",
      LibraryPackMode::StandaloneSeparate => "standalone_separate",
      LibraryPackMode::StandaloneSeparateWithoutVersionName => "standalone_separate_without_version_name",
    };
    f.write_str(name)
  }
}

/// An explicitly included project library.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectLibraryData {
  pub library_name: String,
  /// Overrides the resolved pack mode.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub pack_mode: Option<LibraryPackMode>,
  /// Directory relative to the layout's `lib` directory.
  #[serde(default)]
  pub relative_output_path: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub reason: Option<String>,
}

impl ProjectLibraryData {
  pub fn new(library_name: &str) -> Self {
    Self {
      library_name: library_name.to_string(),
      pack_mode: None,
      relative_output_path: String::new(),
      reason: None,
    }
  }

  pub fn with_pack_mode(mut self, mode: LibraryPackMode) -> Self {
    self.pack_mode = Some(mode);
    self
  }
}

/// An explicitly included module-private library.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleLibraryInclusion {
  pub module_name: String,
  pub library_name: String,
  /// Directory relative to the layout's `lib` directory.
  #[serde(default)]
  pub relative_output_path: String,
}

/// Copy a module-relative file or directory into the distribution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceCopy {
  pub module_name: String,
  /// Path relative to the module's content root.
  pub resource_path: String,
  /// Target directory relative to the layout root.
  pub relative_output_path: String,
  #[serde(default)]
  pub pack_to_zip: bool,
}

/// Include a prebuilt project artifact under the layout's `lib` directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactInclusion {
  pub artifact_name: String,
  #[serde(default)]
  pub relative_path: String,
}

/// Produces generated bytes on demand. Must be deterministic.
pub trait ContentGenerator: Send + Sync {
  fn name(&self) -> &str;
  fn generate(&self) -> Result<Vec<u8>, String>;
}

/// Content of one entry of a custom asset.
#[derive(Clone)]
pub enum CustomContent {
  Bytes(Arc<Vec<u8>>),
  Generated(Arc<dyn ContentGenerator>),
}

impl fmt::Debug for CustomContent {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      CustomContent::Bytes(data) => write!(f, "Bytes({} bytes)", data.len()),
      CustomContent::Generated(generator) => write!(f, "Generated({})", generator.name()),
    }
  }
}

#[derive(Debug, Clone)]
pub struct CustomEntry {
  pub name: String,
  pub content: CustomContent,
}

/// Generated, non-module content with its own target path.
#[derive(Debug, Clone)]
pub struct CustomAsset {
  /// Target path relative to the layout root.
  pub relative_path: String,
  /// Pack the entries into an archive; otherwise the single entry is written as a plain file.
  pub archive: bool,
  pub entries: Vec<CustomEntry>,
  pub reason: String,
}

/// Settings specific to the platform layout.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlatformSettings {
  pub main_archive: String,
  /// Shared archive receiving merged project libraries.
  pub library_archive: String,
  /// Module-name prefixes owned by other products; never inferred.
  pub foreign_prefixes: Vec<String>,
  /// Modules declared as content of bundled plugin sets.
  pub content_plugin_modules: BTreeSet<String>,
  /// Libraries that must never be packed into the platform.
  pub always_separate_libraries: BTreeSet<String>,
  /// Modules that may only live in the (scrambled) main archive.
  pub scrambled_modules: BTreeSet<String>,
}

/// Settings specific to a plugin layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginSettings {
  pub main_module: String,
  pub main_archive: String,
  pub directory: String,
  /// Infer runtime dependencies of the plugin's modules.
  pub auto: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayoutKind {
  Platform(PlatformSettings),
  Plugin(PluginSettings),
}

/// A named output group.
#[derive(Clone)]
pub struct Layout {
  pub name: String,
  pub kind: LayoutKind,
  pub module_items: Vec<ModuleItem>,
  pub included_libraries: Vec<ProjectLibraryData>,
  pub excluded_libraries: BTreeSet<String>,
  pub excluded_modules: BTreeSet<String>,
  pub module_libraries: Vec<ModuleLibraryInclusion>,
  /// Glob excludes applied to a module's output, keyed by module name.
  pub module_excludes: BTreeMap<String, Vec<String>>,
  pub resources: Vec<ResourceCopy>,
  pub artifacts: Vec<ArtifactInclusion>,
  pub custom_assets: Vec<CustomAsset>,
  pub patchers: Vec<Arc<dyn OutputPatcher>>,
  /// The layout is packed for the client/frontend flavor.
  pub frontend: bool,
}

impl fmt::Debug for Layout {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Layout")
      .field("name", &self.name)
      .field("kind", &self.kind)
      .field("module_items", &self.module_items)
      .field("included_libraries", &self.included_libraries)
      .field("excluded_libraries", &self.excluded_libraries)
      .field("patchers", &self.patchers.iter().map(|p| p.name()).collect::<Vec<_>>())
      .finish_non_exhaustive()
  }
}

impl Layout {
  pub fn is_plugin(&self) -> bool {
    matches!(self.kind, LayoutKind::Plugin(_))
  }

  pub fn platform_settings(&self) -> Option<&PlatformSettings> {
    match &self.kind {
      LayoutKind::Platform(settings) => Some(settings),
      LayoutKind::Plugin(_) => None,
    }
  }

  pub fn plugin_settings(&self) -> Option<&PluginSettings> {
    match &self.kind {
      LayoutKind::Plugin(settings) => Some(settings),
      LayoutKind::Platform(_) => None,
    }
  }

  /// Layout root relative to the distribution root.
  pub fn root_dir(&self) -> String {
    match &self.kind {
      LayoutKind::Platform(_) => String::new(),
      LayoutKind::Plugin(settings) => join_relative(&[PLUGINS_DIR, &settings.directory]),
    }
  }

  /// The layout's `lib` directory relative to the distribution root.
  pub fn lib_dir(&self) -> String {
    join_relative(&[&self.root_dir(), LIB_DIR])
  }

  pub fn main_archive(&self) -> &str {
    match &self.kind {
      LayoutKind::Platform(settings) => &settings.main_archive,
      LayoutKind::Plugin(settings) => &settings.main_archive,
    }
  }

  /// Archive receiving merged project libraries.
  pub fn library_archive(&self) -> &str {
    match &self.kind {
      LayoutKind::Platform(settings) => &settings.library_archive,
      LayoutKind::Plugin(settings) => &settings.main_archive,
    }
  }

  /// Whether runtime dependencies of every module item are inferred.
  pub fn infers_dependencies(&self) -> bool {
    match &self.kind {
      LayoutKind::Platform(_) => true,
      LayoutKind::Plugin(settings) => settings.auto,
    }
  }

  pub fn included_module_names(&self) -> BTreeSet<&str> {
    self.module_items.iter().map(|i| i.module_name.as_str()).collect()
  }

  pub fn contains_module(&self, name: &str) -> bool {
    self.module_items.iter().any(|i| i.module_name == name)
  }

  /// Names of explicitly included project libraries.
  pub fn explicit_library_names(&self) -> BTreeSet<&str> {
    self.included_libraries.iter().map(|l| l.library_name.as_str()).collect()
  }

  /// Return a copy of this layout with `items` appended.
  pub fn with_module_items(mut self, items: impl IntoIterator<Item = ModuleItem>) -> Self {
    self.module_items.extend(items);
    self
  }
}
