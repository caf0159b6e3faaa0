//! Patcher hooks that rewrite module output before packaging.
//!
//! Patchers run once per build, before any asset is planned. They never touch
//! the compiled output on disk: patched bytes are registered in a
//! [`ModuleOutputPatcher`] and shadow the original entry when the module is
//! packed.

use std::collections::BTreeMap;
use std::fs;
use std::sync::Arc;

use tracing::debug;

use crate::model::ProjectModel;
use crate::util::naming::normalize_relative;

use super::types::LayoutError;

/// Per-build registry of patched module entries.
#[derive(Debug, Default, Clone)]
pub struct ModuleOutputPatcher {
  patches: BTreeMap<String, BTreeMap<String, Arc<Vec<u8>>>>,
}

impl ModuleOutputPatcher {
  pub fn new() -> Self {
    Self::default()
  }

  /// Register replacement content for `path` inside `module`'s output.
  /// A later patch of the same entry replaces the earlier one.
  pub fn patch(&mut self, module: &str, path: &str, content: Vec<u8>) {
    let path = normalize_relative(path);
    debug!(module, path = %path, size = content.len(), "patching module output");
    self
      .patches
      .entry(module.to_string())
      .or_default()
      .insert(path, Arc::new(content));
  }

  /// Patched entries of `module`, sorted by path.
  pub fn patches_for(&self, module: &str) -> Option<&BTreeMap<String, Arc<Vec<u8>>>> {
    self.patches.get(module).filter(|p| !p.is_empty())
  }

  pub fn is_patched(&self, module: &str) -> bool {
    self.patches_for(module).is_some()
  }

  pub fn is_empty(&self) -> bool {
    self.patches.values().all(|p| p.is_empty())
  }
}

/// A hook registered on a layout.
pub trait OutputPatcher: Send + Sync {
  fn name(&self) -> &str;

  fn patch(&self, project: &dyn ProjectModel, patcher: &mut ModuleOutputPatcher) -> Result<(), String>;
}

/// Run every patcher of every layout, in declaration order.
pub fn apply_patchers<'a>(
  project: &dyn ProjectModel,
  patchers: impl IntoIterator<Item = &'a Arc<dyn OutputPatcher>>,
) -> Result<ModuleOutputPatcher, LayoutError> {
  let mut registry = ModuleOutputPatcher::new();
  for hook in patchers {
    hook
      .patch(project, &mut registry)
      .map_err(|message| LayoutError::Patcher {
        patcher: hook.name().to_string(),
        message,
      })?;
  }
  Ok(registry)
}

/// Replace an entry with fixed content.
#[derive(Debug, Clone)]
pub struct StaticPatch {
  pub module: String,
  pub path: String,
  pub content: Vec<u8>,
}

impl OutputPatcher for StaticPatch {
  fn name(&self) -> &str {
    "static"
  }

  fn patch(&self, project: &dyn ProjectModel, patcher: &mut ModuleOutputPatcher) -> Result<(), String> {
    if project.find_module(&self.module).is_none() {
      return Err(format!("unknown module '{}'", self.module));
    }
    patcher.patch(&self.module, &self.path, self.content.clone());
    Ok(())
  }
}

/// Replace every occurrence of `from` with `to` in a text entry of the module output.
#[derive(Debug, Clone)]
pub struct ReplaceTextPatch {
  pub module: String,
  pub path: String,
  pub from: String,
  pub to: String,
}

impl OutputPatcher for ReplaceTextPatch {
  fn name(&self) -> &str {
    "replace-text"
  }

  fn patch(&self, project: &dyn ProjectModel, patcher: &mut ModuleOutputPatcher) -> Result<(), String> {
    let module = project
      .find_module(&self.module)
      .ok_or_else(|| format!("unknown module '{}'", self.module))?;
    let file = module.output.join(&self.path);
    let text = fs::read_to_string(&file).map_err(|e| format!("cannot read {}: {}", file.display(), e))?;
    if !text.contains(&self.from) {
      return Err(format!("'{}' not found in {}", self.from, file.display()));
    }
    patcher.patch(&self.module, &self.path, text.replace(&self.from, &self.to).into_bytes());
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::model::{Module, Project};
  use tempfile::TempDir;

  fn project_with_output(temp: &TempDir) -> Project {
    let output = temp.path().join("core");
    fs::create_dir_all(output.join("META-INF")).unwrap();
    fs::write(output.join("META-INF/version.txt"), "version=@VERSION@\n").unwrap();
    let module = Module {
      name: "core".to_string(),
      output,
      test_output: None,
      content_root: None,
      source_roots: vec![],
      dependencies: vec![],
      libraries: vec![],
      native_files: vec![],
    };
    Project::new(vec![module], vec![], vec![]).unwrap()
  }

  #[test]
  fn later_patch_wins() {
    let mut patcher = ModuleOutputPatcher::new();
    patcher.patch("core", "a.txt", b"one".to_vec());
    patcher.patch("core", "./a.txt", b"two".to_vec());

    let patches = patcher.patches_for("core").unwrap();
    assert_eq!(patches.len(), 1);
    assert_eq!(patches["a.txt"].as_slice(), b"two");
    assert!(!patcher.is_patched("other"));
  }

  #[test]
  fn replace_text_reads_compiled_output() {
    let temp = TempDir::new().unwrap();
    let project = project_with_output(&temp);
    let hook: Arc<dyn OutputPatcher> = Arc::new(ReplaceTextPatch {
      module: "core".to_string(),
      path: "META-INF/version.txt".to_string(),
      from: "@VERSION@".to_string(),
      to: "1.2.3".to_string(),
    });

    let registry = apply_patchers(&project, [&hook]).unwrap();
    let patches = registry.patches_for("core").unwrap();
    assert_eq!(patches["META-INF/version.txt"].as_slice(), b"version=1.2.3\n");
    // The file on disk is untouched.
    let on_disk = fs::read_to_string(temp.path().join("core/META-INF/version.txt")).unwrap();
    assert!(on_disk.contains("@VERSION@"));
  }

  #[test]
  fn failing_patcher_is_named() {
    let temp = TempDir::new().unwrap();
    let project = project_with_output(&temp);
    let hook: Arc<dyn OutputPatcher> = Arc::new(StaticPatch {
      module: "missing".to_string(),
      path: "a.txt".to_string(),
      content: vec![],
    });

    let err = apply_patchers(&project, [&hook]).unwrap_err();
    assert!(matches!(err, LayoutError::Patcher { ref patcher, .. } if patcher == "static"));
  }
}
