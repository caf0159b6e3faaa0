//! Canonical path selection for logical modules copied more than once into a
//! distribution tree.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use tracing::{debug, warn};

use crate::consts::{DEFAULT_FRONTEND_DIR, LIB_DIR};

/// Facts about the distribution that the heuristic consults.
#[derive(Debug, Clone)]
pub struct PlacementContext {
  /// Modules scrambled separately into the split-frontend archive.
  pub scrambled_frontend_modules: BTreeSet<String>,
  /// Paths that belong to the embedded frontend.
  pub embedded_frontend_paths: BTreeSet<String>,
  /// Directory name of the client/frontend variant.
  pub frontend_dir: String,
}

impl Default for PlacementContext {
  fn default() -> Self {
    Self {
      scrambled_frontend_modules: BTreeSet::new(),
      embedded_frontend_paths: BTreeSet::new(),
      frontend_dir: DEFAULT_FRONTEND_DIR.to_string(),
    }
  }
}

/// Which step of the heuristic picked the path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlacementRule {
  Only,
  SharedLibrary,
  SinglyOwned,
  EmbeddedFrontend,
  FrontendDirectory,
  Lexicographic,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalPath {
  pub path: String,
  pub rule: PlacementRule,
}

/// A fallback decision worth auditing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AmbiguousPlacement {
  pub distribution: Option<String>,
  pub id: String,
  pub candidates: Vec<String>,
  pub chosen: String,
}

fn is_shared_library_path(path: &str) -> bool {
  path.split('/').next() == Some(LIB_DIR) && path.contains('/')
}

fn exactly_one<'a>(mut matching: impl Iterator<Item = &'a str>) -> Option<&'a str> {
  let first = matching.next()?;
  if matching.next().is_some() { None } else { Some(first) }
}

/// Pick the canonical path of `id` among `candidates` (sorted, distinct).
///
/// `path_owners` maps each path to the ids that have content in it.
pub fn choose_canonical_path(
  id: &str,
  module: Option<&str>,
  candidates: &BTreeSet<&str>,
  path_owners: &BTreeMap<&str, BTreeSet<String>>,
  context: &PlacementContext,
) -> Option<CanonicalPath> {
  let pick = |path: &str, rule| {
    debug!(id, path, rule = ?rule, "canonical path chosen");
    CanonicalPath {
      path: path.to_string(),
      rule,
    }
  };

  if candidates.len() <= 1 {
    return candidates.iter().next().map(|p| CanonicalPath {
      path: p.to_string(),
      rule: PlacementRule::Only,
    });
  }

  let scrambled = module.is_some_and(|m| context.scrambled_frontend_modules.contains(m));
  if !scrambled && let Some(path) = exactly_one(candidates.iter().copied().filter(|p| is_shared_library_path(p))) {
    return Some(pick(path, PlacementRule::SharedLibrary));
  }

  let singly_owned = candidates
    .iter()
    .copied()
    .filter(|p| path_owners.get(p).is_some_and(|owners| owners.len() == 1));
  if let Some(path) = exactly_one(singly_owned) {
    return Some(pick(path, PlacementRule::SinglyOwned));
  }

  if let Some(path) = exactly_one(
    candidates
      .iter()
      .copied()
      .filter(|p| context.embedded_frontend_paths.contains(*p)),
  ) {
    return Some(pick(path, PlacementRule::EmbeddedFrontend));
  }

  if let Some(path) = exactly_one(
    candidates
      .iter()
      .copied()
      .filter(|p| p.split('/').rev().skip(1).any(|dir| dir == context.frontend_dir)),
  ) {
    return Some(pick(path, PlacementRule::FrontendDirectory));
  }

  let first = candidates.iter().next()?;
  warn!(
    id,
    chosen = first,
    candidates = ?candidates,
    "ambiguous placement, using the lexicographically first path"
  );
  Some(CanonicalPath {
    path: first.to_string(),
    rule: PlacementRule::Lexicographic,
  })
}
