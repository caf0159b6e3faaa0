//! Turns built assets into distribution file entries.

use std::collections::BTreeMap;

use tracing::info;

use crate::archive::BuiltAsset;
use crate::assets::{Asset, SourceOwner};
use crate::layout::LibraryPackMode;
use crate::model::{ArtifactElement, ProjectModel};
use crate::util::hash::{ContentHash, hash_bytes};

use super::types::{DistributionFileEntry, EntryOwner, sort_entries};

/// Record one entry per (file, owner). Sources of the same owner inside one
/// asset are folded together.
pub fn record_entries(project: &dyn ProjectModel, assets: &[Asset], built: &[BuiltAsset]) -> Vec<DistributionFileEntry> {
  let mut entries = Vec::new();

  for (asset, result) in assets.iter().zip(built) {
    let mut folded: Vec<(EntryOwner, Option<String>, u64, Vec<&ContentHash>)> = Vec::new();
    for (index, source) in asset.sources.iter().enumerate() {
      let size = result.source_sizes.get(index).copied().unwrap_or(0);
      let Some(digest) = result.digests.get(index) else {
        continue;
      };
      for (owner, reason) in owners_of(project, &source.owner) {
        if let Some(at) = folded.iter().position(|(o, r, _, _)| *o == owner && *r == reason) {
          folded[at].2 += size;
          folded[at].3.push(&digest.hash);
        } else {
          folded.push((owner, reason, size, vec![&digest.hash]));
        }
      }
    }

    for (owner, reason, size, hashes) in folded {
      let hash = match hashes.as_slice() {
        [single] => (*single).clone(),
        many => hash_bytes(
          many
            .iter()
            .map(|h| h.0.as_str())
            .collect::<Vec<_>>()
            .join("\n")
            .as_bytes(),
        ),
      };
      entries.push(DistributionFileEntry {
        path: result.relative_path.clone(),
        owner,
        size,
        hash,
        reason,
        layout: asset.layout.clone(),
      });
    }
  }

  sort_entries(&mut entries);
  info!(entries = entries.len(), "distribution entries recorded");
  entries
}

fn owners_of(project: &dyn ProjectModel, owner: &SourceOwner) -> Vec<(EntryOwner, Option<String>)> {
  match owner {
    SourceOwner::Module { module, reason } => vec![(EntryOwner::ModuleOutput { module: module.clone() }, reason.clone())],
    SourceOwner::ModuleLibrary { module, library, file } => vec![(
      EntryOwner::ModuleLibrary {
        module: module.clone(),
        library: library.clone(),
        file: file.clone(),
      },
      None,
    )],
    SourceOwner::ProjectLibrary {
      library,
      mode,
      file,
      reason,
      dependents,
    } => vec![(
      EntryOwner::ProjectLibrary {
        library: library.clone(),
        mode: *mode,
        file: file.clone(),
        dependents: dependents.clone(),
      },
      Some(reason.clone()),
    )],
    SourceOwner::Artifact { name, elements } => {
      let reason = Some(format!("artifact: {}", name));
      if elements.is_empty() {
        return vec![(EntryOwner::Custom, reason)];
      }
      artifact_owners(project, elements)
        .into_iter()
        .map(|owner| (owner, reason.clone()))
        .collect()
    }
    SourceOwner::Custom { reason } => vec![(EntryOwner::Custom, Some(reason.clone()))],
  }
}

fn artifact_owners(project: &dyn ProjectModel, elements: &[ArtifactElement]) -> Vec<EntryOwner> {
  let mut owners = Vec::new();
  for element in elements {
    match element {
      ArtifactElement::ModuleOutput { module } => owners.push(EntryOwner::ModuleOutput { module: module.clone() }),
      ArtifactElement::ModuleTestOutput { module } => {
        owners.push(EntryOwner::ModuleTestOutput { module: module.clone() })
      }
      ArtifactElement::LibraryFiles {
        library,
        module: Some(module),
      } => {
        let files = project
          .find_module(module)
          .and_then(|m| m.find_library(library))
          .map(|l| l.files().to_vec())
          .unwrap_or_default();
        for file in files {
          owners.push(EntryOwner::ModuleLibrary {
            module: module.clone(),
            library: library.clone(),
            file,
          });
        }
      }
      ArtifactElement::LibraryFiles { library, module: None } => {
        let files = project.find_library(library).map(|l| l.files().to_vec()).unwrap_or_default();
        for file in files {
          owners.push(EntryOwner::ProjectLibrary {
            library: library.clone(),
            mode: LibraryPackMode::StandaloneSeparate,
            file,
            dependents: Vec::new(),
          });
        }
      }
    }
  }
  owners
}

/// Entries grouped by file path, in entry order.
pub fn entries_by_path(entries: &[DistributionFileEntry]) -> BTreeMap<&str, Vec<&DistributionFileEntry>> {
  let mut grouped: BTreeMap<&str, Vec<&DistributionFileEntry>> = BTreeMap::new();
  for entry in entries {
    grouped.entry(entry.path.as_str()).or_default().push(entry);
  }
  grouped
}
