//! Turns resolved layouts into assets.
//!
//! Layouts are planned platform first, then plugins in declaration order.
//! Within a layout the order is: module items, module libraries, project
//! libraries, resources, artifacts, custom assets. That order is the source
//! order of every archive and therefore part of its fingerprint.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use tracing::{debug, info};

use crate::archive::fingerprint::seed_for;
use crate::consts::{ARCHIVE_EXTENSION, PACKAGING_CONFLICT_MARKER};
use crate::diagnostics::{Diagnostics, ValidationIssue};
use crate::layout::{CustomContent, Layout, LayoutError, LayoutSet, LibraryPackMode, ModuleItem, ModuleOutputPatcher};
use crate::model::{Module, ProjectModel};
use crate::resolve::{ModuleLibraryTarget, ResolvedLibraries, ResolvedLibrary};
use crate::util::filter::ExcludeSet;
use crate::util::naming::{file_name_without_version, join_relative, library_archive_name, module_file_name};

use super::graph::{AssetGraph, Claim};
use super::types::{Asset, AssetKind, Source, SourceContent, SourceOwner};

const RESOURCE_REASON: &str = "resource";

/// Planning switches taken from the build options.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlanOptions {
  /// Development build: modules may be laid out as directories.
  pub unpacked: bool,
  pub use_cache_as_target: bool,
}

/// Whether a module must get its own archive instead of the main one.
pub fn requires_separate_archive(module: &Module) -> bool {
  const SUFFIXES: &[&str] = &["-rt", ".rt", "-agent", ".agent"];
  SUFFIXES.iter().any(|s| module.name.ends_with(s)) || module.output_contains(PACKAGING_CONFLICT_MARKER)
}

struct LayoutContext<'l> {
  layout: &'l Layout,
  root_dir: String,
  lib_dir: String,
  seed: Option<u64>,
  /// Modules with private libraries merged into their archive; never unpacked.
  merged_libraries: BTreeSet<&'l str>,
}

impl<'l> LayoutContext<'l> {
  fn new(layout: &'l Layout, libraries: &'l ResolvedLibraries) -> Self {
    let merged_libraries = libraries
      .module_for(&layout.name)
      .iter()
      .filter(|l| matches!(l.target, ModuleLibraryTarget::MergeInto(_)))
      .map(|l| l.module_name.as_str())
      .collect();
    Self {
      layout,
      root_dir: layout.root_dir(),
      lib_dir: layout.lib_dir(),
      seed: layout.plugin_settings().map(|s| seed_for(&s.directory)),
      merged_libraries,
    }
  }
}

pub struct AssetPlanner<'a> {
  project: &'a dyn ProjectModel,
  patches: &'a ModuleOutputPatcher,
  options: PlanOptions,
  graph: AssetGraph,
  diagnostics: Diagnostics,
  /// Archive each module ended up in, per layout.
  module_targets: BTreeMap<(String, String), String>,
}

impl<'a> AssetPlanner<'a> {
  pub fn new(project: &'a dyn ProjectModel, patches: &'a ModuleOutputPatcher, options: PlanOptions) -> Self {
    Self {
      project,
      patches,
      options,
      graph: AssetGraph::new(),
      diagnostics: Diagnostics::new(),
      module_targets: BTreeMap::new(),
    }
  }

  /// Plan every layout. Configuration problems are raised together once
  /// planning is complete; collisions fail immediately.
  pub fn plan(mut self, layouts: &LayoutSet, libraries: &ResolvedLibraries) -> Result<Vec<Asset>, LayoutError> {
    for layout in layouts.all() {
      let cx = LayoutContext::new(layout, libraries);
      for item in &layout.module_items {
        self.plan_module_item(&cx, item)?;
      }
      self.plan_module_libraries(&cx, libraries)?;
      for library in libraries.project_for(&layout.name) {
        self.plan_project_library(&cx, library)?;
      }
      self.plan_resources(&cx)?;
      self.plan_artifacts(&cx)?;
      self.plan_custom_assets(&cx)?;
    }

    self.diagnostics.into_result()?;
    let assets = self.graph.into_assets();
    info!(assets = assets.len(), "assets planned");
    Ok(assets)
  }

  fn finish(&self, cx: &LayoutContext<'_>, mut asset: Asset) -> Asset {
    asset.fingerprint_seed = cx.seed;
    asset.use_cache_as_target = self.options.use_cache_as_target && asset.kind != AssetKind::Directory;
    asset
  }

  fn archive(&mut self, cx: &LayoutContext<'_>, path: &str) -> Result<&mut Asset, LayoutError> {
    let use_cache_as_target = self.options.use_cache_as_target;
    let asset = self.graph.archive_mut(path, &cx.layout.name)?;
    asset.fingerprint_seed = cx.seed;
    asset.use_cache_as_target = use_cache_as_target;
    Ok(asset)
  }

  fn plan_module_item(&mut self, cx: &LayoutContext<'_>, item: &ModuleItem) -> Result<(), LayoutError> {
    let project = self.project;
    let Some(module) = project.find_module(&item.module_name) else {
      self.diagnostics.push(ValidationIssue::UnknownModule {
        layout: cx.layout.name.clone(),
        module: item.module_name.clone(),
      });
      return Ok(());
    };

    let mut excludes = match cx.layout.module_excludes.get(&module.name) {
      Some(patterns) => ExcludeSet::new(patterns).map_err(|source| LayoutError::Pattern {
        owner: module.name.clone(),
        source,
      })?,
      None => ExcludeSet::default(),
    };
    let patcher = self.patches;
    let patches = patcher.patches_for(&module.name);
    let owner = SourceOwner::Module {
      module: module.name.clone(),
      reason: item.reason.clone(),
    };

    let unpacked = self.options.unpacked
      && patches.is_none()
      && excludes.is_empty()
      && !cx.merged_libraries.contains(module.name.as_str());
    if unpacked {
      let path = join_relative(&[&cx.lib_dir, &module_file_name(&module.name)]);
      let mut asset = Asset::new(&path, AssetKind::Directory, &cx.layout.name);
      asset.sources.push(Source {
        content: SourceContent::Directory {
          root: module.output.clone(),
          prefix: String::new(),
          excludes,
        },
        owner,
      });
      asset.native_files.extend(module.native_files.iter().cloned());
      let asset = self.finish(cx, asset);
      self.module_targets.insert((cx.layout.name.clone(), module.name.clone()), path);
      return self.graph.insert_unique(asset);
    }

    let file = if item.relative_output_file == cx.layout.main_archive() && requires_separate_archive(module) {
      debug!(module = %module.name, "module needs its own archive");
      format!("{}.{}", module_file_name(&module.name), ARCHIVE_EXTENSION)
    } else {
      item.relative_output_file.clone()
    };
    let path = join_relative(&[&cx.lib_dir, &file]);
    self
      .module_targets
      .insert((cx.layout.name.clone(), module.name.clone()), path.clone());

    let asset = self.archive(cx, &path)?;
    if let Some(patches) = patches {
      for (name, data) in patches {
        asset.sources.push(Source {
          content: SourceContent::InMemory {
            name: name.clone(),
            data: data.clone(),
          },
          owner: owner.clone(),
        });
        excludes.push_literal(name);
      }
    }
    asset.sources.push(Source {
      content: SourceContent::Directory {
        root: module.output.clone(),
        prefix: String::new(),
        excludes,
      },
      owner,
    });
    asset.native_files.extend(module.native_files.iter().cloned());
    Ok(())
  }

  fn plan_module_libraries(&mut self, cx: &LayoutContext<'_>, libraries: &ResolvedLibraries) -> Result<(), LayoutError> {
    let project = self.project;
    for resolved in libraries.module_for(&cx.layout.name) {
      let Some(module) = project.find_module(&resolved.module_name) else {
        continue;
      };
      let Some(library) = module.find_library(&resolved.library_name) else {
        continue;
      };
      let owner = |file: &Path| SourceOwner::ModuleLibrary {
        module: module.name.clone(),
        library: library.name.clone(),
        file: file.to_path_buf(),
      };

      match &resolved.target {
        ModuleLibraryTarget::MergeInto(file) => {
          let path = self
            .module_targets
            .get(&(cx.layout.name.clone(), module.name.clone()))
            .filter(|p| !p.is_empty())
            .cloned()
            .unwrap_or_else(|| join_relative(&[&cx.lib_dir, file]));
          for source in library.files() {
            if self.graph.claim_file(&cx.layout.name, source, &path) != Claim::New {
              continue;
            }
            let asset = self.archive(cx, &path)?;
            asset.sources.push(Source {
              content: SourceContent::Archive {
                file: source.clone(),
                excludes: ExcludeSet::default(),
              },
              owner: owner(source),
            });
          }
        }
        ModuleLibraryTarget::CopyTo(dir) => {
          for source in library.files() {
            let path = join_relative(&[&cx.lib_dir, dir, &file_name(source)]);
            if self.graph.claim_file(&cx.layout.name, source, &path) != Claim::New {
              continue;
            }
            let mut asset = Asset::new(&path, AssetKind::File, &cx.layout.name);
            asset.sources.push(Source {
              content: SourceContent::RawFile { file: source.clone() },
              owner: owner(source),
            });
            let asset = self.finish(cx, asset);
            self.graph.insert_unique(asset)?;
          }
        }
      }
    }
    Ok(())
  }

  fn plan_project_library(&mut self, cx: &LayoutContext<'_>, resolved: &ResolvedLibrary) -> Result<(), LayoutError> {
    let project = self.project;
    let Some(library) = project.find_library(&resolved.library_name) else {
      return Ok(());
    };
    let dir = join_relative(&[&cx.lib_dir, &resolved.relative_output_path]);
    let owner = |file: &Path| SourceOwner::ProjectLibrary {
      library: library.name.clone(),
      mode: resolved.mode,
      file: file.to_path_buf(),
      reason: resolved.reason.clone(),
      dependents: resolved.dependents.clone(),
    };

    match resolved.mode {
      LibraryPackMode::Merged | LibraryPackMode::StandaloneMerged => {
        let archive = match resolved.mode {
          LibraryPackMode::Merged => resolved
            .archive
            .clone()
            .unwrap_or_else(|| cx.layout.library_archive().to_string()),
          _ => library_archive_name(&library.name),
        };
        let path = join_relative(&[&dir, &archive]);
        for source in library.files() {
          if self.graph.claim_file(&cx.layout.name, source, &path) != Claim::New {
            continue;
          }
          let asset = self.archive(cx, &path)?;
          asset.sources.push(Source {
            content: SourceContent::Archive {
              file: source.clone(),
              excludes: ExcludeSet::default(),
            },
            owner: owner(source),
          });
        }
      }
      LibraryPackMode::StandaloneSeparate | LibraryPackMode::StandaloneSeparateWithoutVersionName => {
        for source in library.files() {
          let mut name = file_name(source);
          if resolved.mode == LibraryPackMode::StandaloneSeparateWithoutVersionName {
            name = file_name_without_version(&name);
          }
          let path = join_relative(&[&dir, &name]);
          if self.graph.claim_file(&cx.layout.name, source, &path) != Claim::New {
            continue;
          }
          let mut asset = Asset::new(&path, AssetKind::File, &cx.layout.name);
          asset.sources.push(Source {
            content: SourceContent::RawFile { file: source.clone() },
            owner: owner(source),
          });
          let asset = self.finish(cx, asset);
          self.graph.insert_unique(asset)?;
        }
      }
    }
    Ok(())
  }

  fn plan_resources(&mut self, cx: &LayoutContext<'_>) -> Result<(), LayoutError> {
    let project = self.project;
    for resource in &cx.layout.resources {
      let Some(module) = project.find_module(&resource.module_name) else {
        self.diagnostics.push(ValidationIssue::UnknownModule {
          layout: cx.layout.name.clone(),
          module: resource.module_name.clone(),
        });
        continue;
      };
      let base = module.content_root.as_deref().unwrap_or(module.output.as_path());
      let source_path = base.join(&resource.resource_path);
      if !source_path.exists() {
        self.diagnostics.push(ValidationIssue::MissingResource {
          module: module.name.clone(),
          path: resource.resource_path.clone(),
        });
        continue;
      }

      let name = file_name(&source_path);
      let owner = SourceOwner::Module {
        module: module.name.clone(),
        reason: Some(RESOURCE_REASON.to_string()),
      };
      let (kind, target, content) = if source_path.is_dir() {
        let content = SourceContent::Directory {
          root: source_path.clone(),
          prefix: String::new(),
          excludes: ExcludeSet::default(),
        };
        if resource.pack_to_zip {
          let target = join_relative(&[&cx.root_dir, &resource.relative_output_path, &format!("{}.zip", name)]);
          (AssetKind::Archive, target, content)
        } else {
          let target = join_relative(&[&cx.root_dir, &resource.relative_output_path, &name]);
          (AssetKind::Directory, target, content)
        }
      } else {
        let target = join_relative(&[&cx.root_dir, &resource.relative_output_path, &name]);
        (AssetKind::File, target, SourceContent::RawFile { file: source_path.clone() })
      };

      let mut asset = Asset::new(&target, kind, &cx.layout.name);
      asset.sources.push(Source { content, owner });
      let asset = self.finish(cx, asset);
      self.graph.insert_unique(asset)?;
    }
    Ok(())
  }

  fn plan_artifacts(&mut self, cx: &LayoutContext<'_>) -> Result<(), LayoutError> {
    let project = self.project;
    for inclusion in &cx.layout.artifacts {
      let Some(artifact) = project.find_artifact(&inclusion.artifact_name) else {
        self.diagnostics.push(ValidationIssue::UnknownArtifact {
          layout: cx.layout.name.clone(),
          artifact: inclusion.artifact_name.clone(),
        });
        continue;
      };
      let target = join_relative(&[&cx.lib_dir, &inclusion.relative_path, &file_name(&artifact.output)]);
      let (kind, content) = if artifact.output.is_dir() {
        (
          AssetKind::Directory,
          SourceContent::Directory {
            root: artifact.output.clone(),
            prefix: String::new(),
            excludes: ExcludeSet::default(),
          },
        )
      } else {
        (
          AssetKind::File,
          SourceContent::RawFile {
            file: artifact.output.clone(),
          },
        )
      };
      let mut asset = Asset::new(&target, kind, &cx.layout.name);
      asset.sources.push(Source {
        content,
        owner: SourceOwner::Artifact {
          name: artifact.name.clone(),
          elements: artifact.elements.clone(),
        },
      });
      let asset = self.finish(cx, asset);
      self.graph.insert_unique(asset)?;
    }
    Ok(())
  }

  fn plan_custom_assets(&mut self, cx: &LayoutContext<'_>) -> Result<(), LayoutError> {
    for custom in &cx.layout.custom_assets {
      let target = join_relative(&[&cx.root_dir, &custom.relative_path]);
      let kind = if custom.archive {
        AssetKind::Archive
      } else if custom.entries.len() == 1 {
        AssetKind::File
      } else {
        AssetKind::Directory
      };
      let mut asset = Asset::new(&target, kind, &cx.layout.name);
      for entry in &custom.entries {
        let content = match &entry.content {
          CustomContent::Bytes(data) => SourceContent::InMemory {
            name: entry.name.clone(),
            data: data.clone(),
          },
          CustomContent::Generated(generator) => SourceContent::Lazy {
            name: entry.name.clone(),
            generator: generator.clone(),
          },
        };
        asset.sources.push(Source {
          content,
          owner: SourceOwner::Custom {
            reason: custom.reason.clone(),
          },
        });
      }
      let asset = self.finish(cx, asset);
      self.graph.insert_unique(asset)?;
    }
    Ok(())
  }
}

fn file_name(path: &Path) -> String {
  path
    .file_name()
    .map(|n| n.to_string_lossy().into_owned())
    .unwrap_or_default()
}
