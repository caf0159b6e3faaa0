//! Collected validation diagnostics.
//!
//! Structural problems in layouts are not raised one at a time: each phase
//! pushes [`ValidationIssue`]s into a [`Diagnostics`] collector and drains it
//! once at the end, so a single run reports every problem it found. Errors
//! that must stop the build immediately are returned directly instead.

use std::fmt;

use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// A single structural problem found while resolving layouts.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValidationIssue {
  #[error("layout '{layout}' references unknown module '{module}'")]
  UnknownModule { layout: String, module: String },

  #[error("layout '{layout}' references unknown library '{library}'")]
  UnknownLibrary { layout: String, library: String },

  #[error("layout '{layout}' references unknown artifact '{artifact}'")]
  UnknownArtifact { layout: String, artifact: String },

  #[error("module '{module}' included into '{layout}' is secretly a plugin (included because {chain})")]
  SecretPlugin {
    layout: String,
    module: String,
    chain: String,
  },

  #[error(
    "there are excludes defined for module '{module}', but the module wasn't compiled; it is most probably not \
     part of the distribution"
  )]
  StaleModuleExclude { module: String },

  #[error("no module of plugin '{plugin}' contains {descriptor}")]
  PluginDescriptorMissing { plugin: String, descriptor: String },

  #[error("multiple modules ({modules}) of plugin '{plugin}' contain {descriptor}, the plugin won't work properly")]
  MultiplePluginDescriptors {
    plugin: String,
    modules: String,
    descriptor: String,
  },

  #[error("plugin layout for main module '{module}' is declared more than once")]
  DuplicatePluginMainModule { module: String },

  #[error("plugin directory '{directory}' is used by more than one plugin layout")]
  DuplicatePluginDirectory { directory: String },

  #[error("module '{module}' is included into '{archive}' which is not scrambled")]
  NotScrambled { module: String, archive: String },

  #[error("module '{module}' is placed into both '{first}' and '{second}' of layout '{layout}'")]
  DuplicateModuleItem {
    layout: String,
    module: String,
    first: String,
    second: String,
  },

  #[error("resource '{path}' of module '{module}' does not exist")]
  MissingResource { module: String, path: String },
}

/// Collector for validation issues of one phase.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Diagnostics {
  issues: Vec<ValidationIssue>,
}

impl Diagnostics {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn push(&mut self, issue: ValidationIssue) {
    error!(issue = %issue, "validation error");
    self.issues.push(issue);
  }

  pub fn extend(&mut self, other: Diagnostics) {
    self.issues.extend(other.issues);
  }

  pub fn is_empty(&self) -> bool {
    self.issues.is_empty()
  }

  pub fn len(&self) -> usize {
    self.issues.len()
  }

  pub fn issues(&self) -> &[ValidationIssue] {
    &self.issues
  }

  /// Drain the collector: `Ok` when nothing was reported, otherwise all issues at once.
  pub fn into_result(self) -> Result<(), Diagnostics> {
    if self.issues.is_empty() { Ok(()) } else { Err(self) }
  }
}

impl std::error::Error for Diagnostics {}

impl fmt::Display for Diagnostics {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} validation error(s)", self.issues.len())?;
    for issue in &self.issues {
      write!(f, "\n  - {}", issue)?;
    }
    Ok(())
  }
}
