//! Implementation of the `distpack inspect` command.

use std::path::Path;

use anyhow::{Context, Result, bail};

use distpack_lib::repo::RuntimeModuleRepository;

use crate::output::{OutputFormat, print_descriptor, print_repository};

pub fn cmd_inspect(repo: &Path, id: Option<&str>, format: OutputFormat) -> Result<()> {
  let repository =
    RuntimeModuleRepository::load(repo).with_context(|| format!("Failed to load {}", repo.display()))?;

  let Some(id) = id else {
    return print_repository(&repository, format);
  };
  let Some(descriptor) = repository.find(id) else {
    bail!("module '{}' is not in {}", id, repo.display());
  };
  print_descriptor(descriptor, format)
}
