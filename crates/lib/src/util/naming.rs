//! File-name conventions for archives in a distribution tree.

use crate::consts::ARCHIVE_EXTENSION;

/// Archive base name for a module: dots become dashes.
pub fn module_file_name(module: &str) -> String {
  module.replace('.', "-")
}

/// Strip a trailing version suffix from a file stem.
///
/// The version starts at the first `-` that is immediately followed by a digit,
/// so `kotlin-stdlib-1.9` becomes `kotlin-stdlib` and `kotlin-stdlib-jdk8-1.9`
/// becomes `kotlin-stdlib-jdk8`. Stems without such a suffix are returned as is.
pub fn strip_version(stem: &str) -> &str {
  let bytes = stem.as_bytes();
  for i in 1..bytes.len().saturating_sub(1) {
    if bytes[i] == b'-' && bytes[i + 1].is_ascii_digit() {
      return &stem[..i];
    }
  }
  stem
}

/// Archive name for a library packed as a standalone archive.
pub fn library_archive_name(library: &str) -> String {
  let sanitized: String = library
    .chars()
    .map(|c| {
      if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
        c
      } else {
        '-'
      }
    })
    .collect();
  format!("{}.{}", strip_version(&sanitized), ARCHIVE_EXTENSION)
}

/// File name with the version suffix stripped, keeping the extension.
pub fn file_name_without_version(file_name: &str) -> String {
  match file_name.rsplit_once('.') {
    Some((stem, ext)) => format!("{}.{}", strip_version(stem), ext),
    None => strip_version(file_name).to_string(),
  }
}

/// Join relative path segments with `/`, skipping empty segments.
pub fn join_relative(parts: &[&str]) -> String {
  parts
    .iter()
    .flat_map(|p| p.split('/'))
    .filter(|p| !p.is_empty() && *p != ".")
    .collect::<Vec<_>>()
    .join("/")
}

/// Normalize a relative path: `\` becomes `/`, empty and `.` segments are dropped.
pub fn normalize_relative(path: &str) -> String {
  join_relative(&[&path.replace('\\', "/")])
}

/// Parent directory of a `/`-separated relative path (empty for top-level names).
pub fn parent_of(path: &str) -> &str {
  path.rsplit_once('/').map(|(parent, _)| parent).unwrap_or("")
}
