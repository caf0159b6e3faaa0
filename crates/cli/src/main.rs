mod cmd;
mod output;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use cmd::{BuildArgs, cmd_build, cmd_inspect, cmd_merge_repos};
use output::{OutputFormat, print_error};

/// distpack - layout resolution and archive packaging for modular distributions
#[derive(Parser)]
#[command(name = "distpack")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Enable debug logging
  #[arg(short, long, global = true)]
  verbose: bool,

  /// Output format
  #[arg(long, global = true, value_enum, default_value_t)]
  format: OutputFormat,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Resolve layouts, build archives and write the module repository
  Build(BuildArgs),

  /// Merge OS-specific module repositories into a cross-platform one
  MergeRepos {
    /// Repository files or distribution directories
    #[arg(required = true)]
    repos: Vec<PathBuf>,

    /// Merged repository file
    #[arg(long)]
    out: PathBuf,
  },

  /// List module ids of a repository, or show one descriptor
  Inspect {
    /// Repository file or distribution directory
    repo: PathBuf,

    /// Logical module id to show
    #[arg(long)]
    id: Option<String>,
  },
}

fn main() {
  let cli = Cli::parse();

  let default_level = if cli.verbose { "debug" } else { "info" };
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  let result: Result<()> = match cli.command {
    Commands::Build(args) => cmd_build(&args, cli.format),
    Commands::MergeRepos { repos, out } => cmd_merge_repos(&repos, &out, cli.format),
    Commands::Inspect { repo, id } => cmd_inspect(&repo, id.as_deref(), cli.format),
  };

  if let Err(e) = result {
    print_error(&format!("{:#}", e));
    std::process::exit(1);
  }
}
