//! Native file signing side channel.

use std::collections::BTreeSet;
use std::path::PathBuf;

use crate::consts::NATIVE_EXTENSIONS;

/// Signs platform binaries found inside archives.
///
/// Returning `Ok(Some(path))` substitutes the bytes of `path` for the entry;
/// `Ok(None)` keeps the entry as is.
pub trait NativeFileSigner: Send + Sync {
  fn sign(&self, entry_name: &str, content: &[u8]) -> Result<Option<PathBuf>, String>;
}

/// Whether an entry is a platform binary, by extension or explicit listing.
pub fn is_native_entry(name: &str, explicit: &BTreeSet<String>) -> bool {
  if explicit.contains(name) {
    return true;
  }
  let file = name.rsplit('/').next().unwrap_or(name);
  match file.rsplit_once('.') {
    Some((_, ext)) => NATIVE_EXTENSIONS.iter().any(|e| ext.eq_ignore_ascii_case(e)),
    None => false,
  }
}
