//! Test fixtures for distpack-lib.
//!
//! Builds small projects on disk: module outputs are directories under
//! `<temp>/out`, library files are real zip archives under `<temp>/libs`.

use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

use crate::model::{DependencyScope, Library, LibraryLevel, Module, ModuleDependency, Project};

pub struct ModuleFixture {
  name: String,
  dependencies: Vec<ModuleDependency>,
  files: Vec<(String, Vec<u8>)>,
  libraries: Vec<LibraryFixture>,
  native_files: Vec<String>,
}

impl ModuleFixture {
  /// A module whose output holds a single class file named after it.
  pub fn new(name: &str) -> Self {
    Self {
      name: name.to_string(),
      dependencies: Vec::new(),
      files: vec![(format!("{}/Main.class", name.replace('.', "/")), name.as_bytes().to_vec())],
      libraries: Vec::new(),
      native_files: Vec::new(),
    }
  }

  pub fn depends_on(mut self, module: &str) -> Self {
    self.dependencies.push(ModuleDependency::Module {
      name: module.to_string(),
      scope: DependencyScope::Compile,
      exported: false,
    });
    self
  }

  pub fn depends_on_in_tests(mut self, module: &str) -> Self {
    self.dependencies.push(ModuleDependency::Module {
      name: module.to_string(),
      scope: DependencyScope::Test,
      exported: false,
    });
    self
  }

  pub fn uses_library(mut self, library: &str) -> Self {
    self.dependencies.push(ModuleDependency::Library {
      name: library.to_string(),
      level: LibraryLevel::Project,
      scope: DependencyScope::Compile,
      exported: false,
    });
    self
  }

  pub fn uses_module_library(mut self, library: LibraryFixture) -> Self {
    self.dependencies.push(ModuleDependency::Library {
      name: library.name.clone(),
      level: LibraryLevel::Module,
      scope: DependencyScope::Compile,
      exported: false,
    });
    self.libraries.push(library);
    self
  }

  pub fn with_file(mut self, path: &str, content: &str) -> Self {
    self.files.push((path.to_string(), content.as_bytes().to_vec()));
    self
  }

  pub fn with_native(mut self, path: &str, content: &[u8]) -> Self {
    self.files.push((path.to_string(), content.to_vec()));
    self.native_files.push(path.to_string());
    self
  }
}

pub struct LibraryFixture {
  name: String,
  jars: Vec<(String, Vec<(String, Vec<u8>)>)>,
}

impl LibraryFixture {
  pub fn new(name: &str) -> Self {
    Self {
      name: name.to_string(),
      jars: Vec::new(),
    }
  }

  pub fn with_jar(mut self, file_name: &str, entries: &[(&str, &str)]) -> Self {
    self.jars.push((
      file_name.to_string(),
      entries
        .iter()
        .map(|(name, content)| (name.to_string(), content.as_bytes().to_vec()))
        .collect(),
    ));
    self
  }

  fn materialize(self, dir: &Path, level: LibraryLevel) -> Library {
    let files = self
      .jars
      .into_iter()
      .map(|(file_name, entries)| {
        let path = dir.join(&file_name);
        let refs: Vec<(&str, &[u8])> = entries.iter().map(|(n, c)| (n.as_str(), c.as_slice())).collect();
        write_zip(&path, &refs);
        path
      })
      .collect();
    Library {
      name: self.name,
      files,
      level,
    }
  }
}

pub fn project_of(temp: &TempDir, modules: Vec<ModuleFixture>) -> Project {
  project_with(temp, modules, vec![])
}

pub fn project_with(temp: &TempDir, modules: Vec<ModuleFixture>, libraries: Vec<LibraryFixture>) -> Project {
  let out = temp.path().join("out");
  let libs = temp.path().join("libs");
  fs::create_dir_all(&libs).unwrap();

  let modules = modules
    .into_iter()
    .map(|fixture| {
      let output = out.join(&fixture.name);
      for (path, content) in &fixture.files {
        let file = output.join(path);
        fs::create_dir_all(file.parent().unwrap()).unwrap();
        fs::write(file, content).unwrap();
      }
      let module_libs = libs.join(&fixture.name);
      fs::create_dir_all(&module_libs).unwrap();
      Module {
        name: fixture.name,
        output,
        test_output: None,
        content_root: None,
        source_roots: vec![],
        dependencies: fixture.dependencies,
        libraries: fixture
          .libraries
          .into_iter()
          .map(|l| l.materialize(&module_libs, LibraryLevel::Module))
          .collect(),
        native_files: fixture.native_files,
      }
    })
    .collect();
  let libraries = libraries
    .into_iter()
    .map(|l| l.materialize(&libs, LibraryLevel::Project))
    .collect();

  Project::new(modules, libraries, vec![]).unwrap()
}

pub fn write_zip(path: &Path, entries: &[(&str, &[u8])]) {
  fs::create_dir_all(path.parent().unwrap()).unwrap();
  let mut writer = ZipWriter::new(fs::File::create(path).unwrap());
  for (name, content) in entries {
    writer.start_file(*name, SimpleFileOptions::default()).unwrap();
    writer.write_all(content).unwrap();
  }
  writer.finish().unwrap();
}

/// Entry names of an archive, in archive order.
pub fn zip_entry_names(path: &Path) -> Vec<String> {
  let mut archive = ZipArchive::new(fs::File::open(path).unwrap()).unwrap();
  (0..archive.len())
    .map(|i| archive.by_index(i).unwrap().name().to_string())
    .collect()
}

pub fn zip_entry(path: &Path, name: &str) -> Vec<u8> {
  let mut archive = ZipArchive::new(fs::File::open(path).unwrap()).unwrap();
  let mut entry = archive.by_name(name).unwrap();
  let mut content = Vec::new();
  entry.read_to_end(&mut content).unwrap();
  content
}

pub fn out_dir(temp: &TempDir) -> PathBuf {
  temp.path().join("dist")
}
