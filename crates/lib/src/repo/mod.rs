//! Runtime module repository: one canonical resource path per logical module.
//!
//! The generator reads the entries of a distribution tree, resolves modules
//! copied to several places through the placement heuristic in [`dedup`], and
//! emits a descriptor set. OS-specific descriptor sets are merged into a
//! cross-platform one by [`merge_repositories`].

pub mod dedup;
pub mod generator;
pub mod merge;
pub mod types;

pub use dedup::{AmbiguousPlacement, CanonicalPath, PlacementContext, PlacementRule, choose_canonical_path};
pub use generator::{GeneratedRepository, RepositoryGenerator};
pub use merge::merge_repositories;
pub use types::{
  RepositoryEntry, RepositoryError, RuntimeModuleDescriptor, RuntimeModuleRepository, id_of, module_id,
  module_library_id, project_library_id,
};
