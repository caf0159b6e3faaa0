//! Provenance of built distribution files.

pub mod recorder;
pub mod report;
pub mod types;

pub use recorder::{entries_by_path, record_entries};
pub use report::{
  FileSummary, OwnerSummary, ThirdPartyLibrary, content_report, third_party_libraries, write_reports,
};
pub use types::{DistributionFileEntry, EntryOwner, sort_entries};

#[cfg(test)]
mod tests {
  use std::path::PathBuf;

  use super::*;
  use crate::layout::LibraryPackMode;
  use crate::util::hash::ContentHash;

  fn entry(path: &str, owner: EntryOwner, size: u64) -> DistributionFileEntry {
    DistributionFileEntry {
      path: path.to_string(),
      owner,
      size,
      hash: ContentHash("h".to_string()),
      reason: None,
      layout: "platform".to_string(),
    }
  }

  fn library(name: &str) -> EntryOwner {
    EntryOwner::ProjectLibrary {
      library: name.to_string(),
      mode: LibraryPackMode::Merged,
      file: PathBuf::from(format!("/libs/{name}.jar")),
      dependents: vec![],
    }
  }

  fn module(name: &str) -> EntryOwner {
    EntryOwner::ModuleOutput {
      module: name.to_string(),
    }
  }

  #[test]
  fn entries_sort_by_path_kind_and_name() {
    let mut entries = vec![
      entry("lib/b.jar", module("z"), 1),
      entry("lib/a.jar", library("alpha"), 1),
      entry("lib/a.jar", module("core"), 1),
      entry("lib/a.jar", module("api"), 1),
    ];
    sort_entries(&mut entries);

    let order: Vec<(String, String)> = entries.iter().map(|e| (e.path.clone(), e.owner.name())).collect();
    assert_eq!(
      order,
      vec![
        ("lib/a.jar".to_string(), "api".to_string()),
        ("lib/a.jar".to_string(), "core".to_string()),
        ("lib/a.jar".to_string(), "alpha".to_string()),
        ("lib/b.jar".to_string(), "z".to_string()),
      ]
    );
  }

  #[test]
  fn content_report_sums_owner_sizes() {
    let entries = vec![entry("lib/a.jar", module("core"), 10), entry("lib/a.jar", library("alpha"), 5)];
    let report = content_report(&entries);
    assert_eq!(report["lib/a.jar"].size, 15);
    assert_eq!(report["lib/a.jar"].owners.len(), 2);
  }

  #[test]
  fn third_party_list_is_distinct() {
    let entries = vec![
      entry("lib/3rd-party.jar", library("alpha"), 1),
      entry("plugins/p/lib/p.jar", library("alpha"), 1),
      entry("lib/app.jar", module("core"), 1),
    ];
    let libraries = third_party_libraries(&entries);
    assert_eq!(libraries.len(), 1);
    assert_eq!(libraries[0].files, vec!["lib/3rd-party.jar", "plugins/p/lib/p.jar"]);
  }
}
