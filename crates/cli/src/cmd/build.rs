//! Implementation of the `distpack build` command.
//!
//! Loads the project model and the layout file, runs the packaging pipeline
//! and prints a summary of what was built.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use distpack_lib::config::BuildOptions;
use distpack_lib::context::BuildContext;
use distpack_lib::layout::LayoutSet;
use distpack_lib::model::Project;
use distpack_lib::pipeline::{OutputDirs, build_distribution};

use crate::output::{BuildSummary, OutputFormat, print_build_summary};

#[derive(Debug, Args)]
pub struct BuildArgs {
  /// Project model (JSON)
  #[arg(long)]
  pub project: PathBuf,

  /// Layout file (TOML)
  #[arg(long)]
  pub layout: PathBuf,

  /// Output directory; the distribution goes to `<out>/dist`, reports to `<out>/reports`
  #[arg(long)]
  pub out: PathBuf,

  /// Build options file (default: distpack.toml next to the project model)
  #[arg(long)]
  pub config: Option<PathBuf>,

  /// Cache directory
  #[arg(long)]
  pub cache: Option<PathBuf>,

  /// Always rebuild and never persist into the cache
  #[arg(long)]
  pub no_cache: bool,

  /// Lay out modules as directories where possible (development builds)
  #[arg(long)]
  pub unpacked: bool,

  /// Pack for the client/frontend flavor
  #[arg(long)]
  pub frontend: bool,

  /// OS/architecture tag of the distribution, e.g. linux-x64
  #[arg(long)]
  pub tag: Option<String>,

  /// Maximum number of concurrent archive builds
  #[arg(short = 'j', long)]
  pub parallelism: Option<usize>,
}

/// Build options: file, then environment, then command-line flags.
fn build_options(args: &BuildArgs) -> Result<BuildOptions> {
  let options = match &args.config {
    Some(path) => BuildOptions::load(path)?,
    None => {
      let dir = args.project.parent().unwrap_or(Path::new("."));
      BuildOptions::load_from_dir(dir)?
    }
  };
  let mut options = options.with_env_overrides()?;

  if let Some(cache) = &args.cache {
    options.cache_dir = Some(cache.clone());
  }
  if let Some(parallelism) = args.parallelism {
    options.parallelism = Some(parallelism);
  }
  if let Some(tag) = &args.tag {
    options.distribution = Some(tag.clone());
  }
  options.no_cache |= args.no_cache;
  options.unpacked |= args.unpacked;
  options.frontend |= args.frontend;
  Ok(options)
}

/// Execute the build command.
pub fn cmd_build(args: &BuildArgs, format: OutputFormat) -> Result<()> {
  let started = Instant::now();
  let options = build_options(args).context("Failed to load build options")?;
  let context = BuildContext::new(options).context("Failed to prepare build")?;

  let project = Project::load(&args.project).context("Failed to load project model")?;
  let layouts = LayoutSet::load(&args.layout).context("Failed to load layouts")?;

  fs::create_dir_all(&args.out).with_context(|| format!("Failed to create {}", args.out.display()))?;
  let out = dunce::canonicalize(&args.out).unwrap_or_else(|_| args.out.clone());
  let output = OutputDirs::under(&out);

  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
  let outcome = rt
    .block_on(build_distribution(&context, &project, layouts, &output))
    .context("Build failed")?;
  info!(elapsed = ?started.elapsed(), "build finished");

  print_build_summary(&BuildSummary::new(&outcome, &output, started.elapsed()), format)
}
