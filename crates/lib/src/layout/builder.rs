//! Construction of [`Layout`] values.
//!
//! Layouts are assembled once at configuration time, either from a layout file
//! or programmatically, and are not mutated afterwards.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::consts::{ARCHIVE_EXTENSION, DEFAULT_LIBRARY_ARCHIVE, DEFAULT_MAIN_ARCHIVE};
use crate::util::naming::module_file_name;

use super::patch::OutputPatcher;
use super::types::{
  ArtifactInclusion, CustomAsset, Layout, LayoutKind, ModuleItem, ModuleLibraryInclusion, PlatformSettings,
  PluginSettings, ProjectLibraryData, ResourceCopy,
};

pub struct LayoutBuilder {
  layout: Layout,
}

impl LayoutBuilder {
  /// Start a platform layout packing into `app.jar` and `3rd-party.jar`.
  pub fn platform(name: &str) -> Self {
    Self::with_kind(
      name,
      LayoutKind::Platform(PlatformSettings {
        main_archive: DEFAULT_MAIN_ARCHIVE.to_string(),
        library_archive: DEFAULT_LIBRARY_ARCHIVE.to_string(),
        ..Default::default()
      }),
    )
  }

  /// Start a plugin layout. The main archive is named after the main module.
  pub fn plugin(main_module: &str, directory: &str) -> Self {
    Self::with_kind(
      main_module,
      LayoutKind::Plugin(PluginSettings {
        main_module: main_module.to_string(),
        main_archive: format!("{}.{}", module_file_name(main_module), ARCHIVE_EXTENSION),
        directory: directory.to_string(),
        auto: false,
      }),
    )
  }

  fn with_kind(name: &str, kind: LayoutKind) -> Self {
    Self {
      layout: Layout {
        name: name.to_string(),
        kind,
        module_items: Vec::new(),
        included_libraries: Vec::new(),
        excluded_libraries: BTreeSet::new(),
        excluded_modules: BTreeSet::new(),
        module_libraries: Vec::new(),
        module_excludes: BTreeMap::new(),
        resources: Vec::new(),
        artifacts: Vec::new(),
        custom_assets: Vec::new(),
        patchers: Vec::new(),
        frontend: false,
      },
    }
  }

  pub fn main_archive(mut self, archive: &str) -> Self {
    match &mut self.layout.kind {
      LayoutKind::Platform(settings) => settings.main_archive = archive.to_string(),
      LayoutKind::Plugin(settings) => settings.main_archive = archive.to_string(),
    }
    self
  }

  pub fn main_archive_name(&self) -> &str {
    self.layout.main_archive()
  }

  /// Shared archive for merged libraries. Plugins always merge into their main archive.
  pub fn library_archive(mut self, archive: &str) -> Self {
    if let LayoutKind::Platform(settings) = &mut self.layout.kind {
      settings.library_archive = archive.to_string();
    }
    self
  }

  pub fn auto(mut self, auto: bool) -> Self {
    if let LayoutKind::Plugin(settings) = &mut self.layout.kind {
      settings.auto = auto;
    }
    self
  }

  pub fn frontend(mut self, frontend: bool) -> Self {
    self.layout.frontend = frontend;
    self
  }

  /// Pack a module into the main archive.
  pub fn with_module(self, module: &str) -> Self {
    let archive = self.layout.main_archive().to_string();
    self.with_module_item(ModuleItem::new(module, &archive))
  }

  /// Pack a module into `relative_output_file` under the layout's `lib` directory.
  pub fn with_module_in(self, module: &str, relative_output_file: &str) -> Self {
    self.with_module_item(ModuleItem::new(module, relative_output_file))
  }

  pub fn with_module_item(mut self, item: ModuleItem) -> Self {
    self.layout.module_items.push(item);
    self
  }

  pub fn with_project_library(mut self, library: ProjectLibraryData) -> Self {
    self.layout.included_libraries.push(library);
    self
  }

  pub fn exclude_library(mut self, library: &str) -> Self {
    self.layout.excluded_libraries.insert(library.to_string());
    self
  }

  pub fn exclude_module(mut self, module: &str) -> Self {
    self.layout.excluded_modules.insert(module.to_string());
    self
  }

  pub fn with_module_library(mut self, module: &str, library: &str, relative_output_path: &str) -> Self {
    self.layout.module_libraries.push(ModuleLibraryInclusion {
      module_name: module.to_string(),
      library_name: library.to_string(),
      relative_output_path: relative_output_path.to_string(),
    });
    self
  }

  pub fn exclude_from_module(mut self, module: &str, pattern: &str) -> Self {
    self
      .layout
      .module_excludes
      .entry(module.to_string())
      .or_default()
      .push(pattern.to_string());
    self
  }

  pub fn with_resource(mut self, resource: ResourceCopy) -> Self {
    self.layout.resources.push(resource);
    self
  }

  pub fn with_artifact(mut self, artifact: &str, relative_path: &str) -> Self {
    self.layout.artifacts.push(ArtifactInclusion {
      artifact_name: artifact.to_string(),
      relative_path: relative_path.to_string(),
    });
    self
  }

  pub fn with_custom_asset(mut self, asset: CustomAsset) -> Self {
    self.layout.custom_assets.push(asset);
    self
  }

  pub fn with_patcher(mut self, patcher: Arc<dyn OutputPatcher>) -> Self {
    self.layout.patchers.push(patcher);
    self
  }

  pub fn foreign_prefix(mut self, prefix: &str) -> Self {
    if let LayoutKind::Platform(settings) = &mut self.layout.kind {
      settings.foreign_prefixes.push(prefix.to_string());
    }
    self
  }

  pub fn content_plugin_module(mut self, module: &str) -> Self {
    if let LayoutKind::Platform(settings) = &mut self.layout.kind {
      settings.content_plugin_modules.insert(module.to_string());
    }
    self
  }

  pub fn always_separate_library(mut self, library: &str) -> Self {
    if let LayoutKind::Platform(settings) = &mut self.layout.kind {
      settings.always_separate_libraries.insert(library.to_string());
    }
    self
  }

  pub fn scrambled_module(mut self, module: &str) -> Self {
    if let LayoutKind::Platform(settings) = &mut self.layout.kind {
      settings.scrambled_modules.insert(module.to_string());
    }
    self
  }

  pub fn build(self) -> Layout {
    self.layout
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn plugin_archive_is_named_after_main_module() {
    let layout = LayoutBuilder::plugin("vcs.git", "git").with_module("vcs.git").build();

    assert_eq!(layout.main_archive(), "vcs-git.jar");
    assert_eq!(layout.library_archive(), "vcs-git.jar");
    assert_eq!(layout.lib_dir(), "plugins/git/lib");
    assert_eq!(layout.module_items[0].relative_output_file, "vcs-git.jar");
  }

  #[test]
  fn platform_settings_are_ignored_for_plugins() {
    let layout = LayoutBuilder::plugin("p", "p").foreign_prefix("other.").build();
    assert!(layout.platform_settings().is_none());

    let platform = LayoutBuilder::platform("platform")
      .foreign_prefix("other.")
      .library_archive("libs.jar")
      .build();
    let settings = platform.platform_settings().unwrap();
    assert_eq!(settings.foreign_prefixes, vec!["other.".to_string()]);
    assert_eq!(platform.library_archive(), "libs.jar");
    assert_eq!(platform.lib_dir(), "lib");
  }
}
