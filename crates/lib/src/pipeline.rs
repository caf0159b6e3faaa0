//! The packaging pipeline, phase by phase.
//!
//! Resolution and planning run single-threaded so that source order, and with
//! it every fingerprint, is deterministic. Only the archive build step runs
//! concurrently, and it is fully joined before entries are recorded.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info};

use crate::archive::{BuildFailure, BuiltAsset};
use crate::assets::AssetPlanner;
use crate::checks::check_layouts;
use crate::context::BuildContext;
use crate::entries::{DistributionFileEntry, record_entries, write_reports};
use crate::layout::{LayoutError, LayoutSet, apply_patchers};
use crate::model::ProjectModel;
use crate::repo::{
  AmbiguousPlacement, PlacementContext, RepositoryError, RepositoryGenerator, RuntimeModuleRepository,
};
use crate::resolve::{ImplicitModule, resolve_libraries, resolve_modules};

#[derive(Debug, Error)]
pub enum PipelineError {
  #[error(transparent)]
  Layout(#[from] LayoutError),

  #[error(transparent)]
  Build(#[from] BuildFailure),

  #[error("failed to write reports into {path}: {source}")]
  Report {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error(transparent)]
  Repository(#[from] RepositoryError),
}

/// Where a build writes its results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputDirs {
  /// Root of the distribution tree.
  pub dist: PathBuf,
  pub reports: PathBuf,
}

impl OutputDirs {
  /// `<out>/dist` and `<out>/reports`.
  pub fn under(out: &Path) -> Self {
    Self {
      dist: out.join("dist"),
      reports: out.join("reports"),
    }
  }
}

#[derive(Debug)]
pub struct BuildOutcome {
  pub built: Vec<BuiltAsset>,
  pub entries: Vec<DistributionFileEntry>,
  pub implicit: Vec<(String, Vec<ImplicitModule>)>,
  pub repository: RuntimeModuleRepository,
  pub repository_path: PathBuf,
  pub ambiguous: Vec<AmbiguousPlacement>,
}

impl BuildOutcome {
  pub fn cache_hits(&self) -> usize {
    self.built.iter().filter(|b| b.cache_hit).count()
  }
}

/// Resolve, plan, build and record one distribution.
pub async fn build_distribution(
  context: &BuildContext,
  project: &dyn ProjectModel,
  layouts: LayoutSet,
  output: &OutputDirs,
) -> Result<BuildOutcome, PipelineError> {
  let layouts = if context.options.frontend {
    layouts.map(|mut layout| {
      layout.frontend = true;
      layout
    })
  } else {
    layouts
  };

  let patches = apply_patchers(project, layouts.all().flat_map(|l| l.patchers.iter()))?;

  info!("resolving modules");
  let resolved = resolve_modules(project, layouts, context.options.strict)?;
  for (layout, modules) in &resolved.implicit {
    for module in modules {
      debug!(layout = %layout, module = %module.name, chain = %module.chain_display(), "implicit module");
    }
  }
  let layouts = resolved.layouts;

  let libraries = resolve_libraries(project, &layouts, &context.pack_rules)?;
  check_layouts(project, &layouts, &patches)?;

  let assets = AssetPlanner::new(project, &patches, context.plan_options()).plan(&layouts, &libraries)?;
  let assets = Arc::new(assets);

  let built = context.archive_builder().build(assets.clone(), &output.dist).await?;

  let entries = record_entries(project, &assets, &built);
  write_reports(&output.reports, &entries).map_err(|source| PipelineError::Report {
    path: output.reports.clone(),
    source,
  })?;

  let generator = RepositoryGenerator::new(project, placement_context(&layouts, &entries));
  let generated = generator.generate(context.options.distribution.as_deref(), &entries)?;
  let repository_path = generated.repository.save(&output.dist)?;

  let outcome = BuildOutcome {
    built,
    entries,
    implicit: resolved.implicit,
    repository: generated.repository,
    repository_path,
    ambiguous: generated.ambiguous,
  };
  info!(
    assets = outcome.built.len(),
    cache_hits = outcome.cache_hits(),
    entries = outcome.entries.len(),
    modules = outcome.repository.len(),
    "distribution built"
  );
  Ok(outcome)
}

/// Frontend facts for the placement heuristic.
fn placement_context(layouts: &LayoutSet, entries: &[DistributionFileEntry]) -> PlacementContext {
  let frontend_layouts: BTreeSet<&str> = layouts
    .all()
    .filter(|l| l.frontend)
    .map(|l| l.name.as_str())
    .collect();

  let scrambled = layouts
    .platform
    .platform_settings()
    .map(|s| &s.scrambled_modules);
  let scrambled_frontend_modules = layouts
    .all()
    .filter(|l| l.frontend)
    .flat_map(|l| l.module_items.iter())
    .filter(|item| scrambled.is_some_and(|s| s.contains(&item.module_name)))
    .map(|item| item.module_name.clone())
    .collect();

  let embedded_frontend_paths = entries
    .iter()
    .filter(|e| frontend_layouts.contains(e.layout.as_str()))
    .map(|e| e.path.clone())
    .collect();

  PlacementContext {
    scrambled_frontend_modules,
    embedded_frontend_paths,
    ..Default::default()
  }
}
