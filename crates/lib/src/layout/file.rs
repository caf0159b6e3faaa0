//! Layout files.
//!
//! A layout file is TOML with one `[platform]` table and any number of
//! `[[plugin]]` tables:
//!
//! ```toml
//! [platform]
//! modules = ["core", "core-ext"]
//! foreign_prefixes = ["other."]
//!
//! [[platform.library]]
//! name = "kotlin-stdlib"
//! pack_mode = "standalone_merged"
//!
//! [[plugin]]
//! main_module = "vcs.git"
//! directory = "git"
//! auto = true
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;
use tracing::debug;

use crate::consts::{DEFAULT_LIBRARY_ARCHIVE, DEFAULT_MAIN_ARCHIVE};
use crate::diagnostics::{Diagnostics, ValidationIssue};

use super::builder::LayoutBuilder;
use super::patch::{ReplaceTextPatch, StaticPatch};
use super::types::{
  CustomAsset, CustomContent, CustomEntry, Layout, LayoutError, LibraryPackMode, ModuleItem, ProjectLibraryData,
  ResourceCopy,
};

#[derive(Debug, Default, Deserialize)]
struct LayoutFile {
  platform: Option<PlatformSection>,
  #[serde(default)]
  plugin: Vec<PluginSection>,
}

#[derive(Debug, Default, Deserialize)]
struct PlatformSection {
  #[serde(default = "default_platform_name")]
  name: String,
  #[serde(default = "default_main_archive")]
  main_archive: String,
  #[serde(default = "default_library_archive")]
  library_archive: String,
  #[serde(default)]
  foreign_prefixes: Vec<String>,
  #[serde(default)]
  content_modules: Vec<String>,
  #[serde(default)]
  always_separate_libraries: Vec<String>,
  #[serde(default)]
  scrambled_modules: Vec<String>,
  #[serde(flatten)]
  common: CommonSection,
}

#[derive(Debug, Deserialize)]
struct PluginSection {
  main_module: String,
  directory: String,
  main_archive: Option<String>,
  #[serde(default)]
  auto: bool,
  #[serde(flatten)]
  common: CommonSection,
}

#[derive(Debug, Default, Deserialize)]
struct CommonSection {
  /// Modules packed into the main archive.
  #[serde(default)]
  modules: Vec<String>,
  #[serde(default, rename = "module")]
  module_items: Vec<ModuleSection>,
  #[serde(default, rename = "library")]
  libraries: Vec<LibrarySection>,
  #[serde(default)]
  excluded_libraries: Vec<String>,
  #[serde(default)]
  excluded_modules: Vec<String>,
  #[serde(default, rename = "module_library")]
  module_libraries: Vec<ModuleLibrarySection>,
  #[serde(default)]
  module_excludes: BTreeMap<String, Vec<String>>,
  #[serde(default, rename = "resource")]
  resources: Vec<ResourceSection>,
  #[serde(default, rename = "artifact")]
  artifacts: Vec<ArtifactSection>,
  #[serde(default, rename = "custom")]
  custom_assets: Vec<CustomSection>,
  #[serde(default, rename = "patch")]
  patches: Vec<PatchSection>,
  #[serde(default)]
  frontend: bool,
}

#[derive(Debug, Deserialize)]
struct ModuleSection {
  name: String,
  /// Target archive under `lib/`; defaults to the main archive.
  archive: Option<String>,
  reason: Option<String>,
  module_set: Option<String>,
  #[serde(default)]
  include_dependencies: bool,
}

#[derive(Debug, Deserialize)]
struct LibrarySection {
  name: String,
  pack_mode: Option<LibraryPackMode>,
  #[serde(default)]
  path: String,
  reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ModuleLibrarySection {
  module: String,
  library: String,
  #[serde(default)]
  path: String,
}

#[derive(Debug, Deserialize)]
struct ResourceSection {
  module: String,
  path: String,
  #[serde(default)]
  target: String,
  #[serde(default)]
  zip: bool,
}

#[derive(Debug, Deserialize)]
struct ArtifactSection {
  name: String,
  #[serde(default)]
  path: String,
}

#[derive(Debug, Deserialize)]
struct CustomSection {
  path: String,
  #[serde(default)]
  archive: bool,
  #[serde(default = "default_custom_reason")]
  reason: String,
  entries: Vec<CustomEntrySection>,
}

#[derive(Debug, Deserialize)]
struct CustomEntrySection {
  name: String,
  content: String,
}

#[derive(Debug, Deserialize)]
struct PatchSection {
  module: String,
  path: String,
  content: Option<String>,
  replace: Option<String>,
  with: Option<String>,
}

fn default_platform_name() -> String {
  "platform".to_string()
}

fn default_main_archive() -> String {
  DEFAULT_MAIN_ARCHIVE.to_string()
}

fn default_library_archive() -> String {
  DEFAULT_LIBRARY_ARCHIVE.to_string()
}

fn default_custom_reason() -> String {
  "custom".to_string()
}

/// The platform layout plus every plugin layout of one product.
#[derive(Debug, Clone)]
pub struct LayoutSet {
  pub platform: Layout,
  pub plugins: Vec<Layout>,
}

impl LayoutSet {
  /// Combine layouts, rejecting plugins that share a main module or a directory.
  pub fn new(platform: Layout, plugins: Vec<Layout>) -> Result<Self, LayoutError> {
    let mut diagnostics = Diagnostics::new();
    let mut main_modules = BTreeSet::new();
    let mut directories = BTreeSet::new();
    for plugin in &plugins {
      let Some(settings) = plugin.plugin_settings() else {
        continue;
      };
      if !main_modules.insert(settings.main_module.as_str()) {
        diagnostics.push(ValidationIssue::DuplicatePluginMainModule {
          module: settings.main_module.clone(),
        });
      }
      if !directories.insert(settings.directory.as_str()) {
        diagnostics.push(ValidationIssue::DuplicatePluginDirectory {
          directory: settings.directory.clone(),
        });
      }
    }
    diagnostics.into_result()?;
    Ok(Self { platform, plugins })
  }

  pub fn load(path: &Path) -> Result<Self, LayoutError> {
    let content = fs::read_to_string(path).map_err(|source| LayoutError::Read {
      path: path.to_path_buf(),
      source,
    })?;
    let file: LayoutFile = toml::from_str(&content).map_err(|source| LayoutError::Parse {
      path: path.to_path_buf(),
      source,
    })?;
    let set = Self::from_file(file)?;
    debug!(path = %path.display(), plugins = set.plugins.len(), "loaded layouts");
    Ok(set)
  }

  /// Parse layout TOML that is not backed by a file.
  pub fn parse(content: &str) -> Result<Self, LayoutError> {
    let file: LayoutFile = toml::from_str(content).map_err(|source| LayoutError::Parse {
      path: Path::new("<inline>").to_path_buf(),
      source,
    })?;
    Self::from_file(file)
  }

  fn from_file(file: LayoutFile) -> Result<Self, LayoutError> {
    let platform = platform_layout(file.platform.unwrap_or_else(|| PlatformSection {
      name: default_platform_name(),
      main_archive: default_main_archive(),
      library_archive: default_library_archive(),
      ..Default::default()
    }));
    let plugins = file.plugin.into_iter().map(plugin_layout).collect();
    Self::new(platform, plugins)
  }

  /// All layouts, platform first.
  pub fn all(&self) -> impl Iterator<Item = &Layout> {
    std::iter::once(&self.platform).chain(self.plugins.iter())
  }

  /// Apply `f` to every layout, platform first.
  pub fn map(self, mut f: impl FnMut(Layout) -> Layout) -> Self {
    Self {
      platform: f(self.platform),
      plugins: self.plugins.into_iter().map(f).collect(),
    }
  }
}

fn platform_layout(section: PlatformSection) -> Layout {
  let mut builder = LayoutBuilder::platform(&section.name)
    .main_archive(&section.main_archive)
    .library_archive(&section.library_archive);
  for prefix in &section.foreign_prefixes {
    builder = builder.foreign_prefix(prefix);
  }
  for module in &section.content_modules {
    builder = builder.content_plugin_module(module);
  }
  for library in &section.always_separate_libraries {
    builder = builder.always_separate_library(library);
  }
  for module in &section.scrambled_modules {
    builder = builder.scrambled_module(module);
  }
  apply_common(builder, section.common).build()
}

fn plugin_layout(section: PluginSection) -> Layout {
  let mut builder = LayoutBuilder::plugin(&section.main_module, &section.directory).auto(section.auto);
  if let Some(archive) = &section.main_archive {
    builder = builder.main_archive(archive);
  }
  apply_common(builder, section.common).build()
}

fn apply_common(mut builder: LayoutBuilder, common: CommonSection) -> LayoutBuilder {
  builder = builder.frontend(common.frontend);
  for module in &common.modules {
    builder = builder.with_module(module);
  }
  for section in common.module_items {
    let archive = section
      .archive
      .clone()
      .unwrap_or_else(|| builder.main_archive_name().to_string());
    let item = ModuleItem::new(&section.name, &archive);
    builder = builder.with_module_item(ModuleItem {
      reason: section.reason,
      module_set: section.module_set,
      include_dependencies: section.include_dependencies,
      ..item
    });
  }
  for library in common.libraries {
    builder = builder.with_project_library(ProjectLibraryData {
      library_name: library.name,
      pack_mode: library.pack_mode,
      relative_output_path: library.path,
      reason: library.reason,
    });
  }
  for library in &common.excluded_libraries {
    builder = builder.exclude_library(library);
  }
  for module in &common.excluded_modules {
    builder = builder.exclude_module(module);
  }
  for inclusion in &common.module_libraries {
    builder = builder.with_module_library(&inclusion.module, &inclusion.library, &inclusion.path);
  }
  for (module, patterns) in &common.module_excludes {
    for pattern in patterns {
      builder = builder.exclude_from_module(module, pattern);
    }
  }
  for resource in common.resources {
    builder = builder.with_resource(ResourceCopy {
      module_name: resource.module,
      resource_path: resource.path,
      relative_output_path: resource.target,
      pack_to_zip: resource.zip,
    });
  }
  for artifact in &common.artifacts {
    builder = builder.with_artifact(&artifact.name, &artifact.path);
  }
  for custom in common.custom_assets {
    builder = builder.with_custom_asset(CustomAsset {
      relative_path: custom.path,
      archive: custom.archive,
      entries: custom
        .entries
        .into_iter()
        .map(|e| CustomEntry {
          name: e.name,
          content: CustomContent::Bytes(Arc::new(e.content.into_bytes())),
        })
        .collect(),
      reason: custom.reason,
    });
  }
  for patch in common.patches {
    builder = match (patch.content, patch.replace, patch.with) {
      (_, Some(from), to) => builder.with_patcher(Arc::new(ReplaceTextPatch {
        module: patch.module,
        path: patch.path,
        from,
        to: to.unwrap_or_default(),
      })),
      (content, None, _) => builder.with_patcher(Arc::new(StaticPatch {
        module: patch.module,
        path: patch.path,
        content: content.unwrap_or_default().into_bytes(),
      })),
    };
  }
  builder
}
