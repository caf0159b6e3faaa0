//! Module repository generation from distribution entries.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use tracing::info;

use crate::entries::{DistributionFileEntry, EntryOwner};
use crate::model::{LibraryLevel, ProjectModel};

use super::dedup::{AmbiguousPlacement, PlacementContext, PlacementRule, choose_canonical_path};
use super::types::{
  RepositoryEntry, RepositoryError, RuntimeModuleDescriptor, RuntimeModuleRepository, id_of, module_id,
  module_library_id, project_library_id,
};

/// Result of generating one distribution's repository.
#[derive(Debug)]
pub struct GeneratedRepository {
  pub repository: RuntimeModuleRepository,
  pub ambiguous: Vec<AmbiguousPlacement>,
}

pub struct RepositoryGenerator<'a> {
  project: &'a dyn ProjectModel,
  context: PlacementContext,
}

impl<'a> RepositoryGenerator<'a> {
  pub fn new(project: &'a dyn ProjectModel, context: PlacementContext) -> Self {
    Self { project, context }
  }

  /// Build the descriptor set of one distribution tree.
  pub fn generate(
    &self,
    distribution: Option<&str>,
    entries: &[DistributionFileEntry],
  ) -> Result<GeneratedRepository, RepositoryError> {
    let repository_entries: Vec<RepositoryEntry<'_>> = entries
      .iter()
      .map(|entry| RepositoryEntry {
        distribution,
        relative_path: &entry.path,
        entry,
      })
      .collect();

    let mut path_owners: BTreeMap<&str, BTreeSet<String>> = BTreeMap::new();
    // One group per (id, physical source): library files are placed independently.
    let mut groups: BTreeMap<(String, Option<&Path>), (Option<&str>, BTreeSet<&str>)> = BTreeMap::new();

    for item in &repository_entries {
      let Some(id) = id_of(&item.entry.owner) else {
        continue;
      };
      path_owners.entry(item.relative_path).or_default().insert(id.clone());
      let (module, file) = match &item.entry.owner {
        EntryOwner::ModuleOutput { module } => (Some(module.as_str()), None),
        EntryOwner::ModuleLibrary { module, file, .. } => (Some(module.as_str()), Some(file.as_path())),
        EntryOwner::ProjectLibrary { file, .. } => (None, Some(file.as_path())),
        EntryOwner::ModuleTestOutput { .. } | EntryOwner::Custom => continue,
      };
      let group = groups.entry((id, file)).or_insert_with(|| (module, BTreeSet::new()));
      group.1.insert(item.relative_path);
    }

    let mut resource_paths: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    let mut ambiguous = Vec::new();
    for ((id, _), (module, candidates)) in &groups {
      let Some(chosen) = choose_canonical_path(id, *module, candidates, &path_owners, &self.context) else {
        continue;
      };
      if chosen.rule == PlacementRule::Lexicographic {
        ambiguous.push(AmbiguousPlacement {
          distribution: distribution.map(String::from),
          id: id.clone(),
          candidates: candidates.iter().map(|c| c.to_string()).collect(),
          chosen: chosen.path.clone(),
        });
      }
      resource_paths.entry(id.clone()).or_default().insert(chosen.path);
    }

    let present: BTreeSet<&str> = resource_paths.keys().map(String::as_str).collect();
    let descriptors: Vec<RuntimeModuleDescriptor> = resource_paths
      .iter()
      .map(|(id, paths)| RuntimeModuleDescriptor {
        id: id.clone(),
        resource_paths: paths.iter().cloned().collect(),
        dependencies: self.dependencies_of(id, &present),
      })
      .collect();

    let repository = RuntimeModuleRepository::new(distribution.map(String::from), descriptors)?;
    info!(
      distribution = repository.distribution_name(),
      modules = repository.len(),
      ambiguous = ambiguous.len(),
      "module repository generated"
    );
    Ok(GeneratedRepository { repository, ambiguous })
  }

  /// Runtime dependencies of a module id, restricted to ids in the repository.
  /// Library ids have none.
  fn dependencies_of(&self, id: &str, present: &BTreeSet<&str>) -> Vec<String> {
    let Some(module) = self.project.find_module(id) else {
      return Vec::new();
    };
    let mut dependencies = BTreeSet::new();
    for dependency in module.runtime_module_dependencies() {
      dependencies.insert(module_id(dependency));
    }
    for library in module.runtime_library_dependencies(false) {
      dependencies.insert(match library.level {
        LibraryLevel::Project => project_library_id(library.name),
        LibraryLevel::Module => module_library_id(&module.name, library.name),
      });
    }
    dependencies
      .into_iter()
      .filter(|d| d != id && present.contains(d.as_str()))
      .collect()
  }
}
