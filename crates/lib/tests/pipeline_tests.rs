//! End-to-end packaging scenarios.

mod common;

use std::fs;
use std::path::PathBuf;

use distpack_lib::archive::ArchiveError;
use distpack_lib::diagnostics::ValidationIssue;
use distpack_lib::entries::{DistributionFileEntry, EntryOwner};
use distpack_lib::layout::{LayoutError, LayoutSet, LibraryPackMode};
use distpack_lib::pipeline::{OutputDirs, PipelineError, build_distribution};
use distpack_lib::repo::{
  PlacementContext, RepositoryError, RepositoryGenerator, RuntimeModuleDescriptor, RuntimeModuleRepository,
  merge_repositories,
};
use distpack_lib::util::hash::ContentHash;

use common::{ProjectFixture, cache_metadata_files, zip_entry, zip_entry_names};

const PLATFORM_LAYOUT: &str = r#"
[platform]
modules = ["core", "core-ext"]
"#;

fn core_project() -> ProjectFixture {
  let mut fixture = ProjectFixture::new();
  fixture
    .module("core", &[], &["alpha", "kotlin-stdlib"])
    .module("core-ext", &["helper"], &["alpha"])
    .module("helper", &[], &[])
    .library("alpha", "alpha-1.0.jar", &[("alpha/A.class", "alpha")])
    .library("kotlin-stdlib", "kotlin-stdlib-1.9.jar", &[("kotlin/K.class", "kotlin")]);
  fixture
}

fn entries_for<'a>(entries: &'a [DistributionFileEntry], owner_name: &str) -> Vec<&'a DistributionFileEntry> {
  entries.iter().filter(|e| e.owner.name() == owner_name).collect()
}

#[tokio::test]
async fn runtime_dependency_is_included_implicitly() {
  let fixture = core_project();
  let project = fixture.load();
  let output = OutputDirs::under(&fixture.out());

  let outcome = build_distribution(
    &fixture.context(),
    &project,
    LayoutSet::parse(PLATFORM_LAYOUT).unwrap(),
    &output,
  )
  .await
  .unwrap();

  let (_, implicit) = outcome.implicit.iter().find(|(layout, _)| layout == "platform").unwrap();
  assert_eq!(implicit.len(), 1);
  assert_eq!(implicit[0].name, "helper");
  assert_eq!(implicit[0].chain_display(), "core-ext → helper");

  let app = output.dist.join("lib/app.jar");
  assert_eq!(zip_entry(&app, "helper/Main.class"), "helper");
  let helper = entries_for(&outcome.entries, "helper");
  assert_eq!(helper.len(), 1);
  assert_eq!(helper[0].reason.as_deref(), Some("auto-inferred"));
}

#[tokio::test]
async fn shared_library_is_merged_once() {
  let fixture = core_project();
  let project = fixture.load();
  let output = OutputDirs::under(&fixture.out());

  let outcome = build_distribution(
    &fixture.context(),
    &project,
    LayoutSet::parse(PLATFORM_LAYOUT).unwrap(),
    &output,
  )
  .await
  .unwrap();

  let alpha = entries_for(&outcome.entries, "alpha");
  assert_eq!(alpha.len(), 1);
  assert_eq!(alpha[0].path, "lib/3rd-party.jar");
  assert!(matches!(
    alpha[0].owner,
    EntryOwner::ProjectLibrary {
      mode: LibraryPackMode::Merged,
      ..
    }
  ));
  let names = zip_entry_names(&output.dist.join("lib/3rd-party.jar"));
  assert_eq!(names.iter().filter(|n| *n == "alpha/A.class").count(), 1);
}

#[tokio::test]
async fn denylisted_library_gets_its_own_unversioned_archive() {
  let fixture = core_project();
  let project = fixture.load();
  let output = OutputDirs::under(&fixture.out());

  let outcome = build_distribution(
    &fixture.context(),
    &project,
    LayoutSet::parse(PLATFORM_LAYOUT).unwrap(),
    &output,
  )
  .await
  .unwrap();

  let kotlin = entries_for(&outcome.entries, "kotlin-stdlib");
  assert_eq!(kotlin.len(), 1);
  assert_eq!(kotlin[0].path, "lib/kotlin-stdlib.jar");
  assert_eq!(zip_entry(&output.dist.join("lib/kotlin-stdlib.jar"), "kotlin/K.class"), "kotlin");
  assert!(!zip_entry_names(&output.dist.join("lib/3rd-party.jar")).contains(&"kotlin/K.class".to_string()));

  let libraries: serde_json::Value =
    serde_json::from_str(&fs::read_to_string(output.reports.join("third-party-libraries.json")).unwrap()).unwrap();
  let kotlin = libraries
    .as_array()
    .unwrap()
    .iter()
    .find(|l| l["name"] == "kotlin-stdlib")
    .unwrap();
  assert_eq!(kotlin["mode"], "standalone_merged");
}

#[tokio::test]
async fn rebuild_hits_the_cache_with_identical_fingerprints() {
  let fixture = core_project();
  let project = fixture.load();
  let context = fixture.context();

  let first = build_distribution(
    &context,
    &project,
    LayoutSet::parse(PLATFORM_LAYOUT).unwrap(),
    &OutputDirs::under(&fixture.root().join("first")),
  )
  .await
  .unwrap();
  let second = build_distribution(
    &context,
    &project,
    LayoutSet::parse(PLATFORM_LAYOUT).unwrap(),
    &OutputDirs::under(&fixture.root().join("second")),
  )
  .await
  .unwrap();

  assert_eq!(first.cache_hits(), 0);
  assert_eq!(second.cache_hits(), second.built.len());
  let fingerprints = |outcome: &distpack_lib::pipeline::BuildOutcome| {
    outcome
      .built
      .iter()
      .map(|b| (b.relative_path.clone(), b.fingerprint))
      .collect::<Vec<_>>()
  };
  assert_eq!(fingerprints(&first), fingerprints(&second));
  assert_eq!(first.entries, second.entries);
}

#[tokio::test]
async fn changed_source_changes_only_its_archive_fingerprint() {
  let fixture = core_project();
  let project = fixture.load();
  let context = fixture.context();

  let before = build_distribution(
    &context,
    &project,
    LayoutSet::parse(PLATFORM_LAYOUT).unwrap(),
    &OutputDirs::under(&fixture.root().join("before")),
  )
  .await
  .unwrap();
  fixture.write_output("helper", "helper/Main.class", "helper v2");
  let after = build_distribution(
    &context,
    &project,
    LayoutSet::parse(PLATFORM_LAYOUT).unwrap(),
    &OutputDirs::under(&fixture.root().join("after")),
  )
  .await
  .unwrap();

  let fingerprint = |outcome: &distpack_lib::pipeline::BuildOutcome, path: &str| {
    outcome.built.iter().find(|b| b.relative_path == path).unwrap().fingerprint
  };
  assert_ne!(fingerprint(&before, "lib/app.jar"), fingerprint(&after, "lib/app.jar"));
  assert_eq!(
    fingerprint(&before, "lib/3rd-party.jar"),
    fingerprint(&after, "lib/3rd-party.jar")
  );
}

#[tokio::test]
async fn stale_cache_entry_fails_the_build() {
  let fixture = core_project();
  let project = fixture.load();
  let context = fixture.context();

  build_distribution(
    &context,
    &project,
    LayoutSet::parse(PLATFORM_LAYOUT).unwrap(),
    &OutputDirs::under(&fixture.root().join("first")),
  )
  .await
  .unwrap();

  for path in cache_metadata_files(&fixture.cache()) {
    let mut metadata: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    if metadata["file_name"] == "app.jar" {
      let size = metadata["sources"][0]["size"].as_u64().unwrap();
      metadata["sources"][0]["size"] = serde_json::json!(size + 1);
      fs::write(&path, serde_json::to_string(&metadata).unwrap()).unwrap();
    }
  }

  let err = build_distribution(
    &context,
    &project,
    LayoutSet::parse(PLATFORM_LAYOUT).unwrap(),
    &OutputDirs::under(&fixture.root().join("second")),
  )
  .await
  .unwrap_err();

  let failure = match err {
    PipelineError::Build(failure) => failure,
    other => panic!("expected a build failure, got {other}"),
  };
  assert_eq!(failure.first.asset, "lib/app.jar");
  assert!(matches!(failure.first.error, ArchiveError::CacheIntegrity { .. }));
}

#[tokio::test]
async fn plugin_is_packed_under_its_directory() {
  let mut fixture = core_project();
  fixture.module("vcs", &["core"], &[]);
  fixture.write_output("vcs", "META-INF/plugin.xml", "<idea-plugin/>");
  let project = fixture.load();
  let output = OutputDirs::under(&fixture.out());
  let layouts = LayoutSet::parse(
    r#"
[platform]
modules = ["core", "core-ext"]

[[plugin]]
main_module = "vcs"
directory = "vcs"
modules = ["vcs"]
"#,
  )
  .unwrap();

  let outcome = build_distribution(&fixture.context(), &project, layouts, &output)
    .await
    .unwrap();

  let plugin_jar = output.dist.join("plugins/vcs/lib/vcs.jar");
  assert_eq!(zip_entry(&plugin_jar, "META-INF/plugin.xml"), "<idea-plugin/>");
  assert!(!zip_entry_names(&output.dist.join("lib/app.jar")).contains(&"vcs/Main.class".to_string()));
  assert_eq!(
    outcome.repository.find("vcs").unwrap().resource_paths,
    vec!["plugins/vcs/lib/vcs.jar"]
  );
  assert_eq!(outcome.repository.dependencies("vcs"), Some(&["core".to_string()][..]));
  assert!(outcome.repository_path.is_file());
}

#[tokio::test]
async fn configuration_errors_are_reported_together() {
  let fixture = core_project();
  let project = fixture.load();
  let layouts = LayoutSet::parse(
    r#"
[platform]
modules = ["core", "missing-one", "missing-two"]

[platform.module_excludes]
ghost = ["**/*.txt"]
"#,
  )
  .unwrap();

  let err = build_distribution(&fixture.context(), &project, layouts, &OutputDirs::under(&fixture.out()))
    .await
    .unwrap_err();

  let diagnostics = match err {
    PipelineError::Layout(LayoutError::Validation(diagnostics)) => diagnostics,
    other => panic!("expected validation errors, got {other}"),
  };
  assert_eq!(diagnostics.len(), 3);
  assert!(diagnostics.issues().iter().any(|i| matches!(
    i,
    ValidationIssue::StaleModuleExclude { module } if module == "ghost"
  )));
  assert!(diagnostics.issues().iter().any(|i| matches!(
    i,
    ValidationIssue::UnknownModule { module, .. } if module == "missing-two"
  )));
  assert!(!fixture.out().join("dist/lib/app.jar").exists());
}

fn module_entry(path: &str, module: &str) -> DistributionFileEntry {
  DistributionFileEntry {
    path: path.to_string(),
    owner: EntryOwner::ModuleOutput {
      module: module.to_string(),
    },
    size: 10,
    hash: ContentHash("0".repeat(64)),
    reason: None,
    layout: "platform".to_string(),
  }
}

#[test]
fn duplicated_module_prefers_the_shared_lib_copy() {
  let mut fixture = ProjectFixture::new();
  fixture.module("x", &[], &[]);
  let project = fixture.load();
  let entries = vec![module_entry("client/x.jar", "x"), module_entry("lib/x.jar", "x")];

  let generated = RepositoryGenerator::new(&project, PlacementContext::default())
    .generate(Some("linux-x64"), &entries)
    .unwrap();

  assert_eq!(generated.repository.find("x").unwrap().resource_paths, vec!["lib/x.jar"]);
  assert!(generated.ambiguous.is_empty());
}

#[test]
fn merged_repository_rejects_disagreeing_dependencies() {
  let descriptor = |deps: &[&str]| RuntimeModuleDescriptor {
    id: "X".to_string(),
    resource_paths: vec!["lib/x.jar".to_string()],
    dependencies: deps.iter().map(|d| d.to_string()).collect(),
  };
  let repository = |os: &str, deps: &[&str]| RuntimeModuleRepository::new(Some(os.to_string()), [descriptor(deps)]).unwrap();

  let agreeing = [
    repository("linux", &["core"]),
    repository("mac", &["core"]),
    repository("windows", &["core"]),
  ];
  let merged = merge_repositories(&agreeing).unwrap();
  assert_eq!(merged.dependencies("X"), Some(&["core".to_string()][..]));

  let disagreeing = [
    repository("linux", &["core"]),
    repository("mac", &["core", "mac-only"]),
    repository("windows", &["core"]),
  ];
  let err = merge_repositories(&disagreeing).unwrap_err();
  assert!(matches!(&err, RepositoryError::DependencyMismatch { id, .. } if id == "X"));
}

#[test]
fn saved_repository_round_trips_through_disk() {
  let fixture = ProjectFixture::new();
  let repository = RuntimeModuleRepository::new(
    None,
    [RuntimeModuleDescriptor {
      id: "core".to_string(),
      resource_paths: vec!["lib/app.jar".to_string()],
      dependencies: vec![],
    }],
  )
  .unwrap();

  let path: PathBuf = repository.save(fixture.root()).unwrap();
  assert_eq!(RuntimeModuleRepository::load(&path).unwrap(), repository);
}
