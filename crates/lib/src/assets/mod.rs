//! Asset planning: resolved layouts become target files with ordered sources.

pub mod graph;
pub mod planner;
pub mod types;

pub use graph::{AssetGraph, Claim};
pub use planner::{AssetPlanner, PlanOptions, requires_separate_archive};
pub use types::{Asset, AssetKind, Source, SourceContent, SourceDigest, SourceOwner};
