//! Resolution phases: implicit modules, then library pack modes.
//!
//! Both phases run single-threaded per layout so their output order is
//! stable; that order feeds archive fingerprints.

pub mod closure;
pub mod pack_mode;

pub use closure::{ImplicitModule, ResolvedModules, compute_implicit_modules, resolve_modules};
pub use pack_mode::{
  DEFAULT_MERGE_RULES, MergeRule, ModuleLibraryTarget, PackDecision, PackModeRules, ResolvedLibraries,
  ResolvedLibrary, ResolvedModuleLibrary, resolve_libraries, resolve_module_libraries, resolve_project_libraries,
};
