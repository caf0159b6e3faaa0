//! Materializes assets on disk.
//!
//! Sources are consumed in order; the first entry with a given name wins.
//! Output is written to a scratch location and renamed into place only after
//! every source was consumed, so a crash never leaves a partial file at the
//! target path.

use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::io::{Read, Write};
use std::path::Path;

use tempfile::NamedTempFile;
use tracing::{debug, trace};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipArchive, ZipWriter};

use crate::assets::{Asset, AssetKind, SourceContent};
use crate::util::filter::is_signature_file;
use crate::util::hash::relative_name;
use crate::util::naming::join_relative;

use super::sign::{NativeFileSigner, is_native_entry};
use super::types::ArchiveError;

/// Settings shared by every archive of a build.
#[derive(Clone, Copy, Default)]
pub struct WriteOptions<'a> {
  pub signer: Option<&'a dyn NativeFileSigner>,
  /// Entry names moved to the front of every archive, in this order.
  pub entry_order: &'a [String],
}

struct PendingEntry {
  name: String,
  data: Vec<u8>,
  source: usize,
  native: bool,
}

/// Write `asset` to `target`. Returns the bytes each source contributed.
pub fn write_asset(asset: &Asset, target: &Path, options: WriteOptions<'_>) -> Result<Vec<u64>, ArchiveError> {
  if let Some(parent) = target.parent() {
    fs::create_dir_all(parent).map_err(|e| ArchiveError::io(parent, e))?;
  }
  match asset.kind {
    AssetKind::Archive => write_archive(asset, target, options),
    AssetKind::Directory => write_directory(asset, target, options),
    AssetKind::File => write_file(asset, target),
  }
}

fn write_archive(asset: &Asset, target: &Path, options: WriteOptions<'_>) -> Result<Vec<u64>, ArchiveError> {
  let entries = prepare_entries(asset, options)?;
  let parent = target.parent().unwrap_or_else(|| Path::new("."));
  let mut temp = NamedTempFile::new_in(parent).map_err(|e| ArchiveError::io(parent, e))?;

  {
    let mut zip = ZipWriter::new(temp.as_file_mut());
    let base = SimpleFileOptions::default()
      .compression_method(CompressionMethod::Deflated)
      .last_modified_time(DateTime::default());
    for entry in &entries {
      let mode = if entry.native { 0o755 } else { 0o644 };
      zip
        .start_file(entry.name.as_str(), base.unix_permissions(mode))
        .map_err(|e| ArchiveError::zip(target, e))?;
      zip.write_all(&entry.data).map_err(|e| ArchiveError::io(target, e))?;
    }
    zip.finish().map_err(|e| ArchiveError::zip(target, e))?;
  }

  temp.persist(target).map_err(|e| ArchiveError::io(target, e.error))?;
  debug!(archive = %target.display(), entries = entries.len(), "archive written");
  Ok(source_sizes(asset, &entries))
}

fn write_directory(asset: &Asset, target: &Path, options: WriteOptions<'_>) -> Result<Vec<u64>, ArchiveError> {
  let entries = prepare_entries(asset, options)?;
  let name = target
    .file_name()
    .map(|n| n.to_string_lossy().into_owned())
    .unwrap_or_default();
  let scratch = target.with_file_name(format!(".{}.partial", name));
  if scratch.exists() {
    fs::remove_dir_all(&scratch).map_err(|e| ArchiveError::io(&scratch, e))?;
  }

  if let Some(entry) = entries.iter().find(|e| !is_contained_name(&e.name)) {
    return Err(ArchiveError::UnsafeEntry {
      asset: asset.relative_path.clone(),
      entry: entry.name.clone(),
    });
  }

  for entry in &entries {
    let path = scratch.join(&entry.name);
    if let Some(parent) = path.parent() {
      fs::create_dir_all(parent).map_err(|e| ArchiveError::io(parent, e))?;
    }
    fs::write(&path, &entry.data).map_err(|e| ArchiveError::io(&path, e))?;
    #[cfg(unix)]
    if entry.native {
      use std::os::unix::fs::PermissionsExt;
      fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).map_err(|e| ArchiveError::io(&path, e))?;
    }
  }
  fs::create_dir_all(&scratch).map_err(|e| ArchiveError::io(&scratch, e))?;

  if target.exists() {
    fs::remove_dir_all(target).map_err(|e| ArchiveError::io(target, e))?;
  }
  fs::rename(&scratch, target).map_err(|e| ArchiveError::io(target, e))?;
  debug!(directory = %target.display(), entries = entries.len(), "directory written");
  Ok(source_sizes(asset, &entries))
}

/// A relative `/`-separated name that stays below the directory it is joined to.
fn is_contained_name(name: &str) -> bool {
  !name.is_empty()
    && !name.starts_with('/')
    && name.split('/').all(|segment| segment != "..")
}

fn write_file(asset: &Asset, target: &Path) -> Result<Vec<u64>, ArchiveError> {
  let [source] = asset.sources.as_slice() else {
    return Err(ArchiveError::Task {
      asset: asset.relative_path.clone(),
      message: format!("a file needs exactly one source, got {}", asset.sources.len()),
    });
  };
  let data = match &source.content {
    SourceContent::RawFile { file } => fs::read(file).map_err(|e| ArchiveError::io(file, e))?,
    SourceContent::InMemory { data, .. } => data.as_ref().clone(),
    SourceContent::Lazy { generator, .. } => generator.generate().map_err(|message| ArchiveError::Generate {
      name: generator.name().to_string(),
      message,
    })?,
    SourceContent::Directory { root, .. } | SourceContent::Archive { file: root, .. } => {
      return Err(ArchiveError::Task {
        asset: asset.relative_path.clone(),
        message: format!("cannot write {} as a single file", root.display()),
      });
    }
  };

  let parent = target.parent().unwrap_or_else(|| Path::new("."));
  let mut temp = NamedTempFile::new_in(parent).map_err(|e| ArchiveError::io(parent, e))?;
  temp.write_all(&data).map_err(|e| ArchiveError::io(target, e))?;
  temp.persist(target).map_err(|e| ArchiveError::io(target, e.error))?;
  Ok(vec![data.len() as u64])
}

fn prepare_entries(asset: &Asset, options: WriteOptions<'_>) -> Result<Vec<PendingEntry>, ArchiveError> {
  let mut entries = collect_entries(asset)?;
  reorder(&mut entries, options.entry_order);

  for entry in &mut entries {
    if !is_native_entry(&entry.name, &asset.native_files) {
      continue;
    }
    entry.native = true;
    let Some(signer) = options.signer else {
      continue;
    };
    let replacement = signer.sign(&entry.name, &entry.data).map_err(|message| ArchiveError::Sign {
      entry: entry.name.clone(),
      message,
    })?;
    if let Some(path) = replacement {
      debug!(entry = %entry.name, signed = %path.display(), "native entry replaced");
      entry.data = fs::read(&path).map_err(|e| ArchiveError::io(&path, e))?;
    }
  }
  Ok(entries)
}

fn collect_entries(asset: &Asset) -> Result<Vec<PendingEntry>, ArchiveError> {
  let mut entries = Vec::new();
  let mut seen = BTreeSet::new();
  let mut push = |name: String, data: Vec<u8>, source: usize| {
    if seen.insert(name.clone()) {
      entries.push(PendingEntry {
        name,
        data,
        source,
        native: false,
      });
    } else {
      trace!(entry = %name, asset = %asset.relative_path, "duplicate entry skipped");
    }
  };

  for (index, source) in asset.sources.iter().enumerate() {
    match &source.content {
      SourceContent::Directory { root, prefix, excludes } => {
        let walker = WalkDir::new(root).sort_by_file_name().into_iter().filter_entry(|e| {
          let rel = relative_name(root, e.path());
          rel.is_empty() || !excludes.is_excluded(&rel)
        });
        for entry in walker {
          let entry = entry.map_err(|e| ArchiveError::Io {
            path: root.clone(),
            source: e.into(),
          })?;
          if !entry.file_type().is_file() {
            continue;
          }
          let rel = relative_name(root, entry.path());
          let data = fs::read(entry.path()).map_err(|e| ArchiveError::io(entry.path(), e))?;
          push(join_relative(&[prefix, &rel]), data, index);
        }
      }
      SourceContent::Archive { file, excludes } => {
        let reader = fs::File::open(file).map_err(|e| ArchiveError::io(file, e))?;
        let mut archive = ZipArchive::new(reader).map_err(|e| ArchiveError::zip(file, e))?;
        for i in 0..archive.len() {
          let mut entry = archive.by_index(i).map_err(|e| ArchiveError::zip(file, e))?;
          if entry.is_dir() {
            continue;
          }
          let name = entry.name().replace('\\', "/");
          if is_signature_file(&name) || excludes.is_excluded(&name) {
            continue;
          }
          let mut data = Vec::with_capacity(entry.size() as usize);
          entry.read_to_end(&mut data).map_err(|e| ArchiveError::io(file, e))?;
          push(name, data, index);
        }
      }
      SourceContent::InMemory { name, data } => push(name.clone(), data.as_ref().clone(), index),
      SourceContent::Lazy { name, generator } => {
        let data = generator.generate().map_err(|message| ArchiveError::Generate {
          name: generator.name().to_string(),
          message,
        })?;
        push(name.clone(), data, index);
      }
      SourceContent::RawFile { file } => {
        let data = fs::read(file).map_err(|e| ArchiveError::io(file, e))?;
        let name = file
          .file_name()
          .map(|n| n.to_string_lossy().into_owned())
          .unwrap_or_default();
        push(name, data, index);
      }
    }
  }

  Ok(entries)
}

/// Move listed entries to the front in list order; the rest keep their order.
fn reorder(entries: &mut [PendingEntry], order: &[String]) {
  if order.is_empty() {
    return;
  }
  let rank: HashMap<&str, usize> = order.iter().enumerate().map(|(i, name)| (name.as_str(), i)).collect();
  entries.sort_by_key(|e| rank.get(e.name.as_str()).copied().unwrap_or(usize::MAX));
}

fn source_sizes(asset: &Asset, entries: &[PendingEntry]) -> Vec<u64> {
  let mut sizes = vec![0u64; asset.sources.len()];
  for entry in entries {
    sizes[entry.source] += entry.data.len() as u64;
  }
  sizes
}
