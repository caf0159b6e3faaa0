//! Shared fixtures for pipeline integration tests.
//!
//! A fixture project lives in a temp directory: module outputs under `out/`,
//! library jars under `libs/`, the model in `project.json`.

#![allow(dead_code)]

use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use distpack_lib::config::BuildOptions;
use distpack_lib::context::BuildContext;
use distpack_lib::model::Project;
use serde_json::{Value, json};
use tempfile::TempDir;
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

pub struct ProjectFixture {
  pub temp: TempDir,
  modules: Vec<Value>,
  libraries: Vec<Value>,
}

impl ProjectFixture {
  pub fn new() -> Self {
    Self {
      temp: TempDir::new().unwrap(),
      modules: Vec::new(),
      libraries: Vec::new(),
    }
  }

  pub fn root(&self) -> &Path {
    self.temp.path()
  }

  /// Add a module whose output holds `<name>/Main.class`.
  pub fn module(&mut self, name: &str, modules: &[&str], libraries: &[&str]) -> &mut Self {
    self.write_output(name, &format!("{}/Main.class", name.replace('.', "/")), name);
    let mut dependencies: Vec<Value> = modules.iter().map(|m| json!({"kind": "module", "name": m})).collect();
    dependencies.extend(libraries.iter().map(|l| json!({"kind": "library", "name": l})));
    self.modules.push(json!({
      "name": name,
      "output": format!("out/{}", name),
      "dependencies": dependencies,
    }));
    self
  }

  pub fn write_output(&self, module: &str, path: &str, content: &str) {
    let file = self.root().join("out").join(module).join(path);
    fs::create_dir_all(file.parent().unwrap()).unwrap();
    fs::write(file, content).unwrap();
  }

  pub fn library(&mut self, name: &str, file_name: &str, entries: &[(&str, &str)]) -> &mut Self {
    let relative = format!("libs/{}", file_name);
    write_zip(&self.root().join(&relative), entries);
    self.libraries.push(json!({"name": name, "files": [relative]}));
    self
  }

  /// Write `project.json` and load it back.
  pub fn load(&self) -> Project {
    let path = self.root().join("project.json");
    let model = json!({"modules": self.modules, "libraries": self.libraries});
    fs::write(&path, serde_json::to_string_pretty(&model).unwrap()).unwrap();
    Project::load(&path).unwrap()
  }

  pub fn out(&self) -> PathBuf {
    self.root().join("build")
  }

  pub fn cache(&self) -> PathBuf {
    self.root().join("cache")
  }

  pub fn context(&self) -> BuildContext {
    BuildContext::new(BuildOptions {
      parallelism: Some(2),
      cache_dir: Some(self.cache()),
      distribution: Some("linux-x64".to_string()),
      ..Default::default()
    })
    .unwrap()
  }
}

pub fn write_zip(path: &Path, entries: &[(&str, &str)]) {
  fs::create_dir_all(path.parent().unwrap()).unwrap();
  let mut writer = ZipWriter::new(fs::File::create(path).unwrap());
  for (name, content) in entries {
    writer.start_file(*name, SimpleFileOptions::default()).unwrap();
    writer.write_all(content.as_bytes()).unwrap();
  }
  writer.finish().unwrap();
}

pub fn zip_entry_names(path: &Path) -> Vec<String> {
  let archive = ZipArchive::new(fs::File::open(path).unwrap()).unwrap();
  archive.file_names().map(String::from).collect()
}

pub fn zip_entry(path: &Path, name: &str) -> String {
  let mut archive = ZipArchive::new(fs::File::open(path).unwrap()).unwrap();
  let mut file = archive.by_name(name).unwrap();
  let mut content = String::new();
  file.read_to_string(&mut content).unwrap();
  content
}

/// Every cache metadata file under `cache`.
pub fn cache_metadata_files(cache: &Path) -> Vec<PathBuf> {
  let mut files = Vec::new();
  for entry in fs::read_dir(cache).unwrap() {
    let dir = entry.unwrap().path();
    if !dir.is_dir() {
      continue;
    }
    for file in fs::read_dir(&dir).unwrap() {
      let file = file.unwrap().path();
      if file.to_string_lossy().ends_with(".metadata.json") {
        files.push(file);
      }
    }
  }
  files.sort();
  files
}
