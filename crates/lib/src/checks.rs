//! Structural checks over resolved layouts, run before any asset is planned.
//!
//! Every check pushes into one [`Diagnostics`] collector so a single run
//! reports all problems at once.

use std::collections::BTreeMap;

use tracing::debug;

use crate::consts::PLUGIN_DESCRIPTOR;
use crate::diagnostics::{Diagnostics, ValidationIssue};
use crate::layout::{Layout, LayoutError, LayoutSet, ModuleOutputPatcher};
use crate::model::ProjectModel;

/// Run every layout check.
pub fn check_layouts(
  project: &dyn ProjectModel,
  layouts: &LayoutSet,
  patches: &ModuleOutputPatcher,
) -> Result<(), LayoutError> {
  let mut diagnostics = Diagnostics::new();
  for layout in layouts.all() {
    check_unknown_modules(project, layout, &mut diagnostics);
    check_duplicate_module_items(layout, &mut diagnostics);
    check_module_excludes(project, layout, &mut diagnostics);
  }
  for plugin in &layouts.plugins {
    check_plugin_descriptor(project, plugin, patches, &mut diagnostics);
  }
  check_scrambled_modules(layouts, &mut diagnostics);
  debug!(issues = diagnostics.len(), "layout checks finished");
  diagnostics.into_result().map_err(LayoutError::from)
}

/// Every placed module must exist in the project model.
pub fn check_unknown_modules(project: &dyn ProjectModel, layout: &Layout, diagnostics: &mut Diagnostics) {
  for module in layout.included_module_names() {
    if project.find_module(module).is_none() {
      diagnostics.push(ValidationIssue::UnknownModule {
        layout: layout.name.clone(),
        module: module.to_string(),
      });
    }
  }
}

/// A module may be placed into only one archive per layout.
pub fn check_duplicate_module_items(layout: &Layout, diagnostics: &mut Diagnostics) {
  let mut targets: BTreeMap<&str, &str> = BTreeMap::new();
  for item in &layout.module_items {
    match targets.get(item.module_name.as_str()) {
      Some(first) if *first != item.relative_output_file => diagnostics.push(ValidationIssue::DuplicateModuleItem {
        layout: layout.name.clone(),
        module: item.module_name.clone(),
        first: first.to_string(),
        second: item.relative_output_file.clone(),
      }),
      Some(_) => {}
      None => {
        targets.insert(&item.module_name, &item.relative_output_file);
      }
    }
  }
}

/// Excludes for a module that was never compiled are stale.
pub fn check_module_excludes(project: &dyn ProjectModel, layout: &Layout, diagnostics: &mut Diagnostics) {
  for module in layout.module_excludes.keys() {
    let compiled = project.find_module(module).is_some_and(|m| m.output.is_dir());
    if !compiled {
      diagnostics.push(ValidationIssue::StaleModuleExclude { module: module.clone() });
    }
  }
}

/// Exactly one module packed directly into the plugin's `lib` directory must
/// carry the plugin descriptor.
pub fn check_plugin_descriptor(
  project: &dyn ProjectModel,
  plugin: &Layout,
  patches: &ModuleOutputPatcher,
  diagnostics: &mut Diagnostics,
) {
  let mut carriers: Vec<&str> = plugin
    .module_items
    .iter()
    .filter(|item| !item.relative_output_file.contains('/'))
    .map(|item| item.module_name.as_str())
    .filter(|module| {
      let patched = patches
        .patches_for(module)
        .is_some_and(|p| p.contains_key(PLUGIN_DESCRIPTOR));
      patched || project.find_module(module).is_some_and(|m| m.output_contains(PLUGIN_DESCRIPTOR))
    })
    .collect();
  carriers.sort_unstable();
  carriers.dedup();

  match carriers.len() {
    1 => {}
    0 => diagnostics.push(ValidationIssue::PluginDescriptorMissing {
      plugin: plugin.name.clone(),
      descriptor: PLUGIN_DESCRIPTOR.to_string(),
    }),
    _ => diagnostics.push(ValidationIssue::MultiplePluginDescriptors {
      plugin: plugin.name.clone(),
      modules: carriers.join(", "),
      descriptor: PLUGIN_DESCRIPTOR.to_string(),
    }),
  }
}

/// Modules that must be scrambled may only live in the platform main archive.
pub fn check_scrambled_modules(layouts: &LayoutSet, diagnostics: &mut Diagnostics) {
  let Some(settings) = layouts.platform.platform_settings() else {
    return;
  };
  if settings.scrambled_modules.is_empty() {
    return;
  }
  for layout in layouts.all() {
    let lib_dir = layout.lib_dir();
    for item in &layout.module_items {
      if !settings.scrambled_modules.contains(&item.module_name) {
        continue;
      }
      if layout.is_plugin() || item.relative_output_file != settings.main_archive {
        diagnostics.push(ValidationIssue::NotScrambled {
          module: item.module_name.clone(),
          archive: format!("{}/{}", lib_dir, item.relative_output_file),
        });
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::layout::LayoutBuilder;
  use crate::util::testutil::{ModuleFixture, project_of};
  use tempfile::TempDir;

  fn plugin_fixture(temp: &TempDir) -> crate::model::Project {
    project_of(
      temp,
      vec![
        ModuleFixture::new("vcs").with_file(PLUGIN_DESCRIPTOR, "<idea-plugin/>"),
        ModuleFixture::new("vcs.impl"),
        ModuleFixture::new("other").with_file(PLUGIN_DESCRIPTOR, "<idea-plugin/>"),
      ],
    )
  }

  #[test]
  fn plugin_with_one_descriptor_passes() {
    let temp = TempDir::new().unwrap();
    let project = plugin_fixture(&temp);
    let plugin = LayoutBuilder::plugin("vcs", "vcs").with_module("vcs").with_module("vcs.impl").build();

    let mut diagnostics = Diagnostics::new();
    check_plugin_descriptor(&project, &plugin, &ModuleOutputPatcher::new(), &mut diagnostics);
    assert!(diagnostics.is_empty());
  }

  #[test]
  fn plugin_descriptor_count_must_be_one() {
    let temp = TempDir::new().unwrap();
    let project = plugin_fixture(&temp);
    let none = LayoutBuilder::plugin("vcs.impl", "impl").with_module("vcs.impl").build();
    let many = LayoutBuilder::plugin("vcs", "vcs").with_module("vcs").with_module("other").build();

    let mut diagnostics = Diagnostics::new();
    check_plugin_descriptor(&project, &none, &ModuleOutputPatcher::new(), &mut diagnostics);
    check_plugin_descriptor(&project, &many, &ModuleOutputPatcher::new(), &mut diagnostics);

    assert!(matches!(diagnostics.issues()[0], ValidationIssue::PluginDescriptorMissing { .. }));
    assert!(matches!(
      &diagnostics.issues()[1],
      ValidationIssue::MultiplePluginDescriptors { modules, .. } if modules == "other, vcs"
    ));
  }

  #[test]
  fn patched_descriptor_counts() {
    let temp = TempDir::new().unwrap();
    let project = plugin_fixture(&temp);
    let plugin = LayoutBuilder::plugin("vcs.impl", "impl").with_module("vcs.impl").build();
    let mut patches = ModuleOutputPatcher::new();
    patches.patch("vcs.impl", PLUGIN_DESCRIPTOR, b"<idea-plugin/>".to_vec());

    let mut diagnostics = Diagnostics::new();
    check_plugin_descriptor(&project, &plugin, &patches, &mut diagnostics);
    assert!(diagnostics.is_empty());
  }

  #[test]
  fn excludes_for_uncompiled_modules_are_stale() {
    let temp = TempDir::new().unwrap();
    let project = project_of(&temp, vec![ModuleFixture::new("core")]);
    let layout = LayoutBuilder::platform("platform")
      .exclude_from_module("core", "**/*.txt")
      .exclude_from_module("ghost", "**/*.txt")
      .build();

    let mut diagnostics = Diagnostics::new();
    check_module_excludes(&project, &layout, &mut diagnostics);

    assert_eq!(
      diagnostics.issues(),
      &[ValidationIssue::StaleModuleExclude {
        module: "ghost".to_string()
      }]
    );
  }

  #[test]
  fn scrambled_module_outside_main_archive_is_reported() {
    let platform = LayoutBuilder::platform("platform")
      .scrambled_module("secret")
      .scrambled_module("licensing")
      .with_module("secret")
      .with_module_in("licensing", "licensing.jar")
      .build();
    let plugin = LayoutBuilder::plugin("p", "p").with_module("secret").build();
    let layouts = LayoutSet::new(platform, vec![plugin]).unwrap();

    let mut diagnostics = Diagnostics::new();
    check_scrambled_modules(&layouts, &mut diagnostics);

    let archives: Vec<&str> = diagnostics
      .issues()
      .iter()
      .map(|issue| match issue {
        ValidationIssue::NotScrambled { archive, .. } => archive.as_str(),
        other => panic!("unexpected issue {other:?}"),
      })
      .collect();
    assert_eq!(archives, vec!["lib/licensing.jar", "plugins/p/lib/p.jar"]);
  }

  #[test]
  fn unknown_modules_are_all_reported() {
    let temp = TempDir::new().unwrap();
    let project = project_of(&temp, vec![ModuleFixture::new("core")]);
    let layout = LayoutBuilder::platform("platform")
      .with_module("core")
      .with_module("missing-one")
      .with_module("missing-two")
      .build();

    let mut diagnostics = Diagnostics::new();
    check_unknown_modules(&project, &layout, &mut diagnostics);

    assert_eq!(diagnostics.len(), 2);
  }

  #[test]
  fn module_in_two_archives_of_one_layout_is_reported() {
    let layout = LayoutBuilder::platform("platform")
      .with_module("core")
      .with_module_in("core", "core.jar")
      .with_module("core")
      .build();

    let mut diagnostics = Diagnostics::new();
    check_duplicate_module_items(&layout, &mut diagnostics);

    assert_eq!(diagnostics.len(), 1);
  }
}
