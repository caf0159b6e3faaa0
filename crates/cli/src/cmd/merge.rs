//! Implementation of the `distpack merge-repos` command.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use distpack_lib::repo::{RuntimeModuleRepository, merge_repositories};

use crate::output::{OutputFormat, print_merged_repository};

pub fn cmd_merge_repos(repos: &[PathBuf], out: &Path, format: OutputFormat) -> Result<()> {
  let repositories = repos
    .iter()
    .map(|path| {
      RuntimeModuleRepository::load(path).with_context(|| format!("Failed to load {}", path.display()))
    })
    .collect::<Result<Vec<_>>>()?;

  let merged = merge_repositories(&repositories).context("Merge failed")?;
  merged
    .write(out)
    .with_context(|| format!("Failed to write {}", out.display()))?;

  print_merged_repository(&merged, repositories.len(), out, format)
}
