//! Implicit module inclusion.
//!
//! Modules reachable from a layout's roots through production runtime module
//! edges are pulled into the layout unless they are excluded, already placed
//! somewhere, owned by another product or declared as plugin content.
//! The traversal is a breadth-first fixed point over a `visited` set, so every
//! module is enqueued at most once and cycles terminate.

use std::collections::BTreeSet;

use tracing::{debug, info, warn};

use crate::consts::{AUTO_INFERRED_REASON, PLUGIN_DESCRIPTOR};
use crate::diagnostics::{Diagnostics, ValidationIssue};
use crate::layout::{Layout, LayoutError, LayoutSet, ModuleItem};
use crate::model::ProjectModel;

/// A module included because something already in the layout needs it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImplicitModule {
  pub name: String,
  /// Root first, this module last.
  pub chain: Vec<String>,
}

impl ImplicitModule {
  pub fn chain_display(&self) -> String {
    self.chain.join(" → ")
  }
}

/// Compute the modules `layout` must implicitly include.
///
/// `claimed` holds modules placed by other layouts. Problems are pushed into
/// `diagnostics` rather than returned, so callers can aggregate several layouts.
pub fn compute_implicit_modules(
  project: &dyn ProjectModel,
  layout: &Layout,
  claimed: &BTreeSet<String>,
  strict: bool,
  diagnostics: &mut Diagnostics,
) -> Vec<ImplicitModule> {
  let infer_all = layout.infers_dependencies();
  let roots: Vec<&str> = layout
    .module_items
    .iter()
    .filter(|item| infer_all || item.include_dependencies)
    .map(|item| item.module_name.as_str())
    .collect();
  if roots.is_empty() {
    return Vec::new();
  }

  let (foreign_prefixes, content_modules) = match layout.platform_settings() {
    Some(settings) => (settings.foreign_prefixes.as_slice(), Some(&settings.content_plugin_modules)),
    None => (&[][..], None),
  };

  let mut visited: BTreeSet<&str> = layout.included_module_names();
  visited.extend(layout.excluded_modules.iter().map(String::as_str));
  visited.extend(claimed.iter().map(String::as_str));
  if let Some(content) = content_modules {
    visited.extend(content.iter().map(String::as_str));
  }

  let mut frontier: Vec<(&str, Vec<String>)> = roots.into_iter().map(|r| (r, vec![r.to_string()])).collect();
  let mut result = Vec::new();

  while !frontier.is_empty() {
    let mut next = Vec::new();
    for (name, chain) in frontier {
      let Some(module) = project.find_module(name) else {
        continue;
      };
      for dependency in module.runtime_module_dependencies() {
        if visited.contains(dependency) {
          continue;
        }
        visited.insert(dependency);

        if foreign_prefixes.iter().any(|p| dependency.starts_with(p.as_str())) {
          debug!(module = dependency, layout = %layout.name, "skipping module of another product");
          continue;
        }
        let Some(found) = project.find_module(dependency) else {
          warn!(module = dependency, dependent = name, "dependency on unknown module ignored");
          continue;
        };

        let mut extended = chain.clone();
        extended.push(dependency.to_string());
        let implicit = ImplicitModule {
          name: dependency.to_string(),
          chain: extended.clone(),
        };

        if found.output_contains(PLUGIN_DESCRIPTOR) {
          let issue = ValidationIssue::SecretPlugin {
            layout: layout.name.clone(),
            module: dependency.to_string(),
            chain: implicit.chain_display(),
          };
          if strict {
            diagnostics.push(issue);
            continue;
          }
          warn!(issue = %issue, "module looks like a plugin");
        }

        debug!(module = dependency, layout = %layout.name, chain = %implicit.chain_display(), "implicitly included");
        result.push(implicit);
        next.push((found.name.as_str(), extended));
      }
    }
    frontier = next;
  }

  result
}

/// Layouts with every implicit module appended, plus how each one got there.
#[derive(Debug, Clone)]
pub struct ResolvedModules {
  pub layouts: LayoutSet,
  /// Implicit modules per layout name, in discovery order.
  pub implicit: Vec<(String, Vec<ImplicitModule>)>,
}

impl ResolvedModules {
  pub fn implicit_for(&self, layout: &str) -> &[ImplicitModule] {
    self
      .implicit
      .iter()
      .find(|(name, _)| name == layout)
      .map(|(_, modules)| modules.as_slice())
      .unwrap_or(&[])
  }
}

/// Run the closure for the platform and every plugin.
///
/// The platform never pulls in modules placed explicitly by plugins, and a
/// plugin never pulls in modules already in the platform or placed by another
/// plugin. All issues are raised once, after every layout was processed.
pub fn resolve_modules(project: &dyn ProjectModel, layouts: LayoutSet, strict: bool) -> Result<ResolvedModules, LayoutError> {
  let mut diagnostics = Diagnostics::new();
  let mut implicit = Vec::new();

  let plugin_modules: BTreeSet<String> = layouts
    .plugins
    .iter()
    .flat_map(|p| p.module_items.iter().map(|i| i.module_name.clone()))
    .collect();

  let LayoutSet { platform, plugins } = layouts;
  let found = compute_implicit_modules(project, &platform, &plugin_modules, strict, &mut diagnostics);
  let platform = with_implicit(platform, &found);
  implicit.push((platform.name.clone(), found));

  let platform_modules: BTreeSet<String> = platform.module_items.iter().map(|i| i.module_name.clone()).collect();
  let mut resolved_plugins = Vec::with_capacity(plugins.len());
  for plugin in plugins {
    let own = plugin.included_module_names();
    let mut claimed = platform_modules.clone();
    claimed.extend(plugin_modules.iter().filter(|m| !own.contains(m.as_str())).cloned());
    let found = compute_implicit_modules(project, &plugin, &claimed, strict, &mut diagnostics);
    let plugin = with_implicit(plugin, &found);
    implicit.push((plugin.name.clone(), found));
    resolved_plugins.push(plugin);
  }

  diagnostics.into_result()?;

  let total: usize = implicit.iter().map(|(_, m)| m.len()).sum();
  info!(layouts = implicit.len(), implicit = total, "module closure resolved");

  Ok(ResolvedModules {
    layouts: LayoutSet {
      platform,
      plugins: resolved_plugins,
    },
    implicit,
  })
}

fn with_implicit(layout: Layout, found: &[ImplicitModule]) -> Layout {
  let archive = layout.main_archive().to_string();
  let items: Vec<ModuleItem> = found
    .iter()
    .map(|m| ModuleItem::new(&m.name, &archive).with_reason(AUTO_INFERRED_REASON))
    .collect();
  layout.with_module_items(items)
}
