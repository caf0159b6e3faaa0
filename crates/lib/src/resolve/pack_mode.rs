//! Library pack-mode resolution.
//!
//! Every project library reachable from a layout gets a [`LibraryPackMode`].
//! Named merge rules redirect specific libraries into dedicated shared
//! archives; everything else is merged into the layout's library archive
//! unless its name marks it as unsafe to merge.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, info};

use crate::diagnostics::{Diagnostics, ValidationIssue};
use crate::layout::{Layout, LayoutError, LayoutSet, LibraryPackMode};
use crate::model::{LibraryLevel, ProjectModel};

/// Redirects matching libraries into a dedicated shared archive.
#[derive(Debug, Clone, Copy)]
pub struct MergeRule {
  pub name: &'static str,
  /// Library name and whether the consuming layout is the frontend flavor.
  pub predicate: fn(&str, bool) -> bool,
  pub archive: &'static str,
}

fn is_telemetry(name: &str, _frontend: bool) -> bool {
  name.starts_with("opentelemetry")
}

fn is_compression(name: &str, _frontend: bool) -> bool {
  matches!(name, "commons-compress" | "zstd-jni" | "brotli-dec" | "xz" | "lz4-java" | "snappy-java")
}

fn is_rpc_frontend(name: &str, frontend: bool) -> bool {
  frontend && is_rpc(name)
}

fn is_rpc_backend(name: &str, frontend: bool) -> bool {
  !frontend && is_rpc(name)
}

fn is_rpc(name: &str) -> bool {
  name.starts_with("rd-") || name.starts_with("grpc-") || name.starts_with("protobuf")
}

/// Built-in merge rules, evaluated top to bottom.
pub const DEFAULT_MERGE_RULES: &[MergeRule] = &[
  MergeRule {
    name: "telemetry",
    predicate: is_telemetry,
    archive: "opentelemetry.jar",
  },
  MergeRule {
    name: "compression",
    predicate: is_compression,
    archive: "compression.jar",
  },
  MergeRule {
    name: "rpc-frontend",
    predicate: is_rpc_frontend,
    archive: "rpc-frontend.jar",
  },
  MergeRule {
    name: "rpc",
    predicate: is_rpc_backend,
    archive: "rpc.jar",
  },
];

/// Libraries that may be merged even though their names hit the denylist.
pub const KNOWN_MERGEABLE: &[&str] = &["jetbrains-annotations", "kotlin-metadata", "kotlinx-collections-immutable"];

/// Names that are never merged into a shared archive.
pub fn is_never_merged(name: &str) -> bool {
  name == "kotlin"
    || name.starts_with("kotlin-")
    || name.ends_with("-rt")
    || name.ends_with("-agent")
    || name.contains("annotations")
    || matches!(
      name.split('-').next().unwrap_or(name),
      "junit" | "testng" | "hamcrest" | "opentest4j" | "assertj"
    )
}

/// Outcome of the pack-mode decision for one library.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackDecision {
  pub mode: LibraryPackMode,
  /// Dedicated shared archive chosen by a merge rule.
  pub archive: Option<&'static str>,
}

/// Decides pack modes. Pure: the answer depends only on the library name and
/// the frontend flag.
#[derive(Debug, Clone)]
pub struct PackModeRules {
  merge_rules: Vec<MergeRule>,
  known_mergeable: BTreeSet<String>,
}

impl Default for PackModeRules {
  fn default() -> Self {
    Self::new(DEFAULT_MERGE_RULES.to_vec(), KNOWN_MERGEABLE.iter().map(|s| s.to_string()))
  }
}

impl PackModeRules {
  pub fn new(merge_rules: Vec<MergeRule>, known_mergeable: impl IntoIterator<Item = String>) -> Self {
    Self {
      merge_rules,
      known_mergeable: known_mergeable.into_iter().collect(),
    }
  }

  pub fn decide(&self, library: &str, frontend: bool) -> PackDecision {
    if let Some(rule) = self.merge_rules.iter().find(|r| (r.predicate)(library, frontend)) {
      return PackDecision {
        mode: LibraryPackMode::Merged,
        archive: Some(rule.archive),
      };
    }
    let mode = if !self.known_mergeable.contains(library) && is_never_merged(library) {
      LibraryPackMode::StandaloneMerged
    } else {
      LibraryPackMode::Merged
    };
    PackDecision { mode, archive: None }
  }
}

/// A project library placed into a layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedLibrary {
  pub library_name: String,
  pub mode: LibraryPackMode,
  /// Target archive override for merged libraries.
  pub archive: Option<String>,
  /// Directory relative to the layout's `lib` directory.
  pub relative_output_path: String,
  pub reason: String,
  /// Included modules that depend on the library, in discovery order.
  pub dependents: Vec<String>,
}

/// A module-private library placed into a layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedModuleLibrary {
  pub module_name: String,
  pub library_name: String,
  pub target: ModuleLibraryTarget,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleLibraryTarget {
  /// Merge entries into the module's archive (relative to `lib`).
  MergeInto(String),
  /// Copy every file unchanged into a directory (relative to `lib`).
  CopyTo(String),
}

/// Resolve the project libraries of one layout.
///
/// `claimed` holds libraries already packed by a more specific layout. Unknown
/// explicit libraries are reported to `diagnostics`; packing a library that
/// must stay separate from the platform fails immediately.
pub fn resolve_project_libraries(
  project: &dyn ProjectModel,
  layout: &Layout,
  rules: &PackModeRules,
  claimed: &BTreeSet<String>,
  diagnostics: &mut Diagnostics,
) -> Result<Vec<ResolvedLibrary>, LayoutError> {
  let mut result: Vec<ResolvedLibrary> = Vec::new();
  let mut index: BTreeMap<String, usize> = BTreeMap::new();

  for explicit in &layout.included_libraries {
    if project.find_library(&explicit.library_name).is_none() {
      diagnostics.push(ValidationIssue::UnknownLibrary {
        layout: layout.name.clone(),
        library: explicit.library_name.clone(),
      });
      continue;
    }
    if index.contains_key(&explicit.library_name) {
      continue;
    }
    let decision = rules.decide(&explicit.library_name, layout.frontend);
    index.insert(explicit.library_name.clone(), result.len());
    result.push(ResolvedLibrary {
      library_name: explicit.library_name.clone(),
      mode: explicit.pack_mode.unwrap_or(decision.mode),
      archive: decision.archive.map(String::from),
      relative_output_path: explicit.relative_output_path.clone(),
      reason: explicit.reason.clone().unwrap_or_else(|| "explicit".to_string()),
      dependents: Vec::new(),
    });
  }

  for item in &layout.module_items {
    let Some(module) = project.find_module(&item.module_name) else {
      continue;
    };
    for dependency in module.runtime_library_dependencies(false) {
      if dependency.level != LibraryLevel::Project {
        continue;
      }
      let name = dependency.name;
      if layout.excluded_libraries.contains(name) || claimed.contains(name) {
        continue;
      }
      if let Some(&at) = index.get(name) {
        let entry = &mut result[at];
        if !entry.dependents.iter().any(|d| d == &module.name) {
          entry.dependents.push(module.name.clone());
        }
        continue;
      }
      if project.find_library(name).is_none() {
        diagnostics.push(ValidationIssue::UnknownLibrary {
          layout: layout.name.clone(),
          library: name.to_string(),
        });
        continue;
      }
      let decision = rules.decide(name, layout.frontend);
      debug!(library = name, mode = %decision.mode, layout = %layout.name, "library pack mode");
      index.insert(name.to_string(), result.len());
      result.push(ResolvedLibrary {
        library_name: name.to_string(),
        mode: decision.mode,
        archive: decision.archive.map(String::from),
        relative_output_path: String::new(),
        reason: format!("<- {}", module.name),
        dependents: vec![module.name.clone()],
      });
    }
  }

  if let Some(settings) = layout.platform_settings()
    && let Some(library) = result
      .iter()
      .find(|l| settings.always_separate_libraries.contains(&l.library_name))
  {
    return Err(LayoutError::AlwaysSeparateLibrary {
      library: library.library_name.clone(),
      layout: layout.name.clone(),
    });
  }

  Ok(result)
}

/// Resolve the module-private libraries of one layout.
///
/// Explicit inclusions are copied unchanged; every other module-level library
/// of an included module is merged into that module's archive.
pub fn resolve_module_libraries(
  project: &dyn ProjectModel,
  layout: &Layout,
  diagnostics: &mut Diagnostics,
) -> Vec<ResolvedModuleLibrary> {
  let mut result = Vec::new();
  let mut seen: BTreeSet<(String, String)> = BTreeSet::new();

  for inclusion in &layout.module_libraries {
    let known = project
      .find_module(&inclusion.module_name)
      .and_then(|m| m.find_library(&inclusion.library_name))
      .is_some();
    if !known {
      diagnostics.push(ValidationIssue::UnknownLibrary {
        layout: layout.name.clone(),
        library: format!("{}/{}", inclusion.module_name, inclusion.library_name),
      });
      continue;
    }
    if seen.insert((inclusion.module_name.clone(), inclusion.library_name.clone())) {
      result.push(ResolvedModuleLibrary {
        module_name: inclusion.module_name.clone(),
        library_name: inclusion.library_name.clone(),
        target: ModuleLibraryTarget::CopyTo(inclusion.relative_output_path.clone()),
      });
    }
  }

  for item in &layout.module_items {
    let Some(module) = project.find_module(&item.module_name) else {
      continue;
    };
    for dependency in module.runtime_library_dependencies(false) {
      if dependency.level != LibraryLevel::Module || layout.excluded_libraries.contains(dependency.name) {
        continue;
      }
      if module.find_library(dependency.name).is_none() {
        diagnostics.push(ValidationIssue::UnknownLibrary {
          layout: layout.name.clone(),
          library: format!("{}/{}", module.name, dependency.name),
        });
        continue;
      }
      if seen.insert((module.name.clone(), dependency.name.to_string())) {
        result.push(ResolvedModuleLibrary {
          module_name: module.name.clone(),
          library_name: dependency.name.to_string(),
          target: ModuleLibraryTarget::MergeInto(item.relative_output_file.clone()),
        });
      }
    }
  }

  result
}

/// Libraries of every layout.
#[derive(Debug, Clone, Default)]
pub struct ResolvedLibraries {
  pub project: BTreeMap<String, Vec<ResolvedLibrary>>,
  pub module: BTreeMap<String, Vec<ResolvedModuleLibrary>>,
}

impl ResolvedLibraries {
  pub fn project_for(&self, layout: &str) -> &[ResolvedLibrary] {
    self.project.get(layout).map(Vec::as_slice).unwrap_or(&[])
  }

  pub fn module_for(&self, layout: &str) -> &[ResolvedModuleLibrary] {
    self.module.get(layout).map(Vec::as_slice).unwrap_or(&[])
  }
}

/// Resolve libraries for every layout.
///
/// Plugins are resolved first: a library a plugin packs explicitly is skipped
/// by the platform. Plugins then skip libraries the platform already packs.
pub fn resolve_libraries(
  project: &dyn ProjectModel,
  layouts: &LayoutSet,
  rules: &PackModeRules,
) -> Result<ResolvedLibraries, LayoutError> {
  let mut diagnostics = Diagnostics::new();
  let mut resolved = ResolvedLibraries::default();

  let plugin_explicit: BTreeSet<String> = layouts
    .plugins
    .iter()
    .flat_map(|p| p.included_libraries.iter().map(|l| l.library_name.clone()))
    .collect();

  let platform = &layouts.platform;
  let platform_libraries = resolve_project_libraries(project, platform, rules, &plugin_explicit, &mut diagnostics)?;
  let platform_names: BTreeSet<String> = platform_libraries.iter().map(|l| l.library_name.clone()).collect();
  resolved.project.insert(platform.name.clone(), platform_libraries);
  resolved.module.insert(
    platform.name.clone(),
    resolve_module_libraries(project, platform, &mut diagnostics),
  );

  for plugin in &layouts.plugins {
    let libraries = resolve_project_libraries(project, plugin, rules, &platform_names, &mut diagnostics)?;
    resolved.project.insert(plugin.name.clone(), libraries);
    resolved
      .module
      .insert(plugin.name.clone(), resolve_module_libraries(project, plugin, &mut diagnostics));
  }

  diagnostics.into_result()?;

  let total: usize = resolved.project.values().map(Vec::len).sum();
  info!(libraries = total, "library pack modes resolved");
  Ok(resolved)
}
