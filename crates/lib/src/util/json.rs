//! JSON persistence helpers.

use std::fs;
use std::io;
use std::path::Path;

use serde::Serialize;
use serde::de::DeserializeOwned;

/// Write `value` as pretty JSON. Uses atomic write (write to temp, then
/// rename) so readers never observe a partial file.
pub fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> io::Result<()> {
  if let Some(parent) = path.parent() {
    fs::create_dir_all(parent)?;
  }
  let content = serde_json::to_string_pretty(value)?;
  let temp_path = path.with_extension("json.tmp");
  fs::write(&temp_path, format!("{}\n", content))?;
  fs::rename(&temp_path, path)
}

pub fn read_json<T: DeserializeOwned>(path: &Path) -> io::Result<T> {
  let content = fs::read_to_string(path)?;
  Ok(serde_json::from_str(&content)?)
}
