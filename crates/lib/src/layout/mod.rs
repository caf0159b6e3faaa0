//! Declarative layouts: which modules and libraries go into which archive.

pub mod builder;
pub mod file;
pub mod patch;
pub mod types;

pub use builder::LayoutBuilder;
pub use file::LayoutSet;
pub use patch::{ModuleOutputPatcher, OutputPatcher, ReplaceTextPatch, StaticPatch, apply_patchers};
pub use types::{
  ArtifactInclusion, ContentGenerator, CustomAsset, CustomContent, CustomEntry, Layout, LayoutError, LayoutKind,
  LibraryPackMode, ModuleItem, ModuleLibraryInclusion, PlatformSettings, PluginSettings, ProjectLibraryData,
  ResourceCopy,
};
