//! Merging OS-specific repositories into a cross-platform one.

use std::collections::BTreeSet;

use tracing::{debug, info, warn};

use super::types::{RepositoryError, RuntimeModuleDescriptor, RuntimeModuleRepository};

/// Intersect the descriptor sets of all `repositories`.
///
/// Only ids present in every repository survive, with the intersection of
/// their resource paths. Differing dependencies for a surviving id fail the
/// merge.
pub fn merge_repositories(repositories: &[RuntimeModuleRepository]) -> Result<RuntimeModuleRepository, RepositoryError> {
  let (first, rest) = repositories.split_first().ok_or(RepositoryError::NothingToMerge)?;

  let mut merged = Vec::new();
  for descriptor in first.descriptors() {
    let Some(candidates) = rest
      .iter()
      .map(|other| other.find(&descriptor.id).map(|candidate| (other, candidate)))
      .collect::<Option<Vec<_>>>()
    else {
      debug!(id = %descriptor.id, "module missing from some distribution, dropped");
      continue;
    };

    let mut paths: BTreeSet<&str> = descriptor.resource_paths.iter().map(String::as_str).collect();
    for (other, candidate) in candidates {
      if candidate.dependencies != descriptor.dependencies {
        return Err(RepositoryError::DependencyMismatch {
          id: descriptor.id.clone(),
          first_distribution: first.distribution_name().to_string(),
          first: descriptor.dependencies.clone(),
          second_distribution: other.distribution_name().to_string(),
          second: candidate.dependencies.clone(),
        });
      }
      let other_paths: BTreeSet<&str> = candidate.resource_paths.iter().map(String::as_str).collect();
      paths = paths.intersection(&other_paths).copied().collect();
    }
    if paths.is_empty() {
      warn!(id = %descriptor.id, "module has no resource path common to all distributions");
    }
    merged.push(RuntimeModuleDescriptor {
      id: descriptor.id.clone(),
      resource_paths: paths.into_iter().map(String::from).collect(),
      dependencies: descriptor.dependencies.clone(),
    });
  }

  let repository = RuntimeModuleRepository::new(None, merged)?;
  info!(
    inputs = repositories.len(),
    modules = repository.len(),
    "module repositories merged"
  );
  Ok(repository)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn descriptor(id: &str, paths: &[&str], deps: &[&str]) -> RuntimeModuleDescriptor {
    RuntimeModuleDescriptor {
      id: id.to_string(),
      resource_paths: paths.iter().map(|p| p.to_string()).collect(),
      dependencies: deps.iter().map(|d| d.to_string()).collect(),
    }
  }

  fn repository(distribution: &str, descriptors: Vec<RuntimeModuleDescriptor>) -> RuntimeModuleRepository {
    RuntimeModuleRepository::new(Some(distribution.to_string()), descriptors).unwrap()
  }

  #[test]
  fn common_ids_survive_with_intersected_paths() {
    let linux = repository(
      "linux",
      vec![
        descriptor("x", &["lib/x.jar", "lib/x-linux.jar"], &["y"]),
        descriptor("y", &["lib/y.jar"], &[]),
        descriptor("only-linux", &["lib/l.jar"], &[]),
      ],
    );
    let mac = repository(
      "mac",
      vec![descriptor("x", &["lib/x.jar"], &["y"]), descriptor("y", &["lib/y.jar"], &[])],
    );
    let windows = repository(
      "windows",
      vec![descriptor("x", &["lib/x.jar"], &["y"]), descriptor("y", &["lib/y.jar"], &[])],
    );

    let merged = merge_repositories(&[linux, mac, windows]).unwrap();

    assert_eq!(merged.ids().collect::<Vec<_>>(), vec!["x", "y"]);
    assert_eq!(merged.find("x").unwrap().resource_paths, vec!["lib/x.jar"]);
    assert_eq!(merged.dependencies("x"), Some(&["y".to_string()][..]));
    assert!(merged.distribution.is_none());
  }

  #[test]
  fn dependency_disagreement_names_the_module() {
    let linux = repository("linux", vec![descriptor("X", &["lib/x.jar"], &["y"])]);
    let mac = repository("mac", vec![descriptor("X", &["lib/x.jar"], &["y"])]);
    let windows = repository("windows", vec![descriptor("X", &["lib/x.jar"], &["y", "z"])]);

    let err = merge_repositories(&[linux, mac, windows]).unwrap_err();

    assert!(matches!(&err, RepositoryError::DependencyMismatch { id, .. } if id == "X"));
    let message = err.to_string();
    assert!(message.contains("'X'"));
    assert!(message.contains("windows"));
  }

  #[test]
  fn ids_missing_anywhere_are_dropped_before_dependencies_are_compared() {
    let linux = || repository("linux", vec![descriptor("X", &["lib/x.jar"], &["y"])]);
    let mac = || repository("mac", vec![descriptor("X", &["lib/x.jar"], &["y", "z"])]);
    let windows = || repository("windows", vec![]);

    let merged = merge_repositories(&[linux(), mac(), windows()]).unwrap();
    assert!(merged.is_empty());

    let merged = merge_repositories(&[linux(), windows(), mac()]).unwrap();
    assert!(merged.is_empty());
  }

  #[test]
  fn nothing_to_merge_is_an_error() {
    assert!(matches!(merge_repositories(&[]), Err(RepositoryError::NothingToMerge)));
  }
}
