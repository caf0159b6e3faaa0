//! Reports derived from the entry list.
//!
//! - `content-mapping.json`: the sorted entry list itself
//! - `content.json`: per-file summary of contributing owners and sizes
//! - `third-party-libraries.json`: distinct project libraries with their pack
//!   mode and the files that contain them

use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::consts::{CONTENT_MAPPING_FILENAME, CONTENT_REPORT_FILENAME, THIRD_PARTY_LIBRARIES_FILENAME};
use crate::layout::LibraryPackMode;
use crate::util::json::write_json_atomic;

use super::recorder::entries_by_path;
use super::types::{DistributionFileEntry, EntryOwner};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerSummary {
  pub kind: String,
  pub name: String,
  pub size: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSummary {
  pub size: u64,
  pub owners: Vec<OwnerSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThirdPartyLibrary {
  pub name: String,
  pub mode: LibraryPackMode,
  pub files: Vec<String>,
  pub sources: Vec<PathBuf>,
}

pub fn content_report(entries: &[DistributionFileEntry]) -> BTreeMap<String, FileSummary> {
  entries_by_path(entries)
    .into_iter()
    .map(|(path, group)| {
      let owners: Vec<OwnerSummary> = group
        .iter()
        .map(|e| OwnerSummary {
          kind: e.owner.kind_name().to_string(),
          name: e.owner.name(),
          size: e.size,
        })
        .collect();
      let size = owners.iter().map(|o| o.size).sum();
      (path.to_string(), FileSummary { size, owners })
    })
    .collect()
}

pub fn third_party_libraries(entries: &[DistributionFileEntry]) -> Vec<ThirdPartyLibrary> {
  let mut libraries: BTreeMap<&str, (LibraryPackMode, BTreeSet<&str>, BTreeSet<&Path>)> = BTreeMap::new();
  for entry in entries {
    if let EntryOwner::ProjectLibrary { library, mode, file, .. } = &entry.owner {
      let slot = libraries
        .entry(library.as_str())
        .or_insert_with(|| (*mode, BTreeSet::new(), BTreeSet::new()));
      slot.1.insert(entry.path.as_str());
      slot.2.insert(file.as_path());
    }
  }
  libraries
    .into_iter()
    .map(|(name, (mode, files, sources))| ThirdPartyLibrary {
      name: name.to_string(),
      mode,
      files: files.into_iter().map(String::from).collect(),
      sources: sources.into_iter().map(Path::to_path_buf).collect(),
    })
    .collect()
}

/// Write every report into `dir`.
pub fn write_reports(dir: &Path, entries: &[DistributionFileEntry]) -> io::Result<()> {
  write_json_atomic(&dir.join(CONTENT_MAPPING_FILENAME), entries)?;
  write_json_atomic(&dir.join(CONTENT_REPORT_FILENAME), &content_report(entries))?;
  let libraries = third_party_libraries(entries);
  write_json_atomic(&dir.join(THIRD_PARTY_LIBRARIES_FILENAME), &libraries)?;
  info!(dir = %dir.display(), entries = entries.len(), libraries = libraries.len(), "reports written");
  Ok(())
}
