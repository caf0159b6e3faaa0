//! Terminal rendering of distpack results.
//!
//! Every command hands its result to one of the `print_*` functions here,
//! which either renders it for a human or dumps it as JSON on stdout. Logs
//! never go through this module; they stay on stderr via `tracing`.

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use clap::ValueEnum;
use owo_colors::{OwoColorize, Stream};
use serde::Serialize;

use distpack_lib::pipeline::{BuildOutcome, OutputDirs};
use distpack_lib::repo::{AmbiguousPlacement, RuntimeModuleDescriptor, RuntimeModuleRepository};

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
  #[default]
  Text,
  Json,
}

impl OutputFormat {
  pub fn is_json(self) -> bool {
    matches!(self, OutputFormat::Json)
  }
}

pub mod symbols {
  pub const SUCCESS: &str = "✓";
  pub const ERROR: &str = "✗";
  pub const WARNING: &str = "⚠";
  pub const ARROW: &str = "→";
}

/// Size of a distribution, e.g. `12.3 MB`.
pub fn format_bytes(bytes: u64) -> String {
  const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
  let mut value = bytes as f64;
  let mut unit = 0;
  while value >= 1024.0 && unit + 1 < UNITS.len() {
    value /= 1024.0;
    unit += 1;
  }
  if unit == 0 {
    format!("{} B", bytes)
  } else {
    format!("{:.1} {}", value, UNITS[unit])
  }
}

/// Build time, e.g. `850ms`, `4.20s` or `2m 5s`.
pub fn format_duration(duration: Duration) -> String {
  let secs = duration.as_secs();
  match secs {
    0 => format!("{}ms", duration.subsec_millis()),
    1..60 => format!("{}.{:02}s", secs, duration.subsec_millis() / 10),
    _ => format!("{}m {}s", secs / 60, secs % 60),
  }
}

pub fn print_error(message: &str) {
  eprintln!(
    "{} {}",
    symbols::ERROR.if_supports_color(Stream::Stderr, |s| s.red()),
    message.if_supports_color(Stream::Stderr, |s| s.red())
  );
}

fn print_warning(message: &str) {
  eprintln!(
    "{} {}",
    symbols::WARNING.if_supports_color(Stream::Stderr, |s| s.yellow()),
    message.if_supports_color(Stream::Stderr, |s| s.yellow())
  );
}

fn print_headline(message: &str) {
  println!(
    "{} {}",
    symbols::SUCCESS.if_supports_color(Stream::Stdout, |s| s.green()),
    message
  );
}

fn print_field(label: &str, value: impl std::fmt::Display) {
  println!("  {}: {}", label.if_supports_color(Stream::Stdout, |s| s.dimmed()), value);
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
  let json = serde_json::to_string_pretty(value).context("Failed to serialize to JSON")?;
  println!("{}", json);
  Ok(())
}

fn join_or_none(items: &[String]) -> String {
  if items.is_empty() { "(none)".to_string() } else { items.join(", ") }
}

/// What `distpack build` reports.
#[derive(Debug, Serialize)]
pub struct BuildSummary<'a> {
  pub dist: &'a Path,
  pub reports: &'a Path,
  pub repository: &'a Path,
  pub assets: usize,
  pub cache_hits: usize,
  pub bytes: u64,
  pub entries: usize,
  pub modules: usize,
  pub implicit: Vec<ImplicitInclusion<'a>>,
  pub ambiguous: &'a [AmbiguousPlacement],
  #[serde(skip)]
  pub elapsed: Duration,
}

#[derive(Debug, Serialize)]
pub struct ImplicitInclusion<'a> {
  pub layout: &'a str,
  pub module: &'a str,
  pub chain: String,
}

impl<'a> BuildSummary<'a> {
  pub fn new(outcome: &'a BuildOutcome, output: &'a OutputDirs, elapsed: Duration) -> Self {
    let implicit = outcome
      .implicit
      .iter()
      .flat_map(|(layout, modules)| {
        modules.iter().map(move |m| ImplicitInclusion {
          layout,
          module: &m.name,
          chain: m.chain_display(),
        })
      })
      .collect();
    Self {
      dist: &output.dist,
      reports: &output.reports,
      repository: &outcome.repository_path,
      assets: outcome.built.len(),
      cache_hits: outcome.cache_hits(),
      bytes: outcome.built.iter().map(|b| b.size).sum(),
      entries: outcome.entries.len(),
      modules: outcome.repository.len(),
      implicit,
      ambiguous: &outcome.ambiguous,
      elapsed,
    }
  }
}

pub fn print_build_summary(summary: &BuildSummary<'_>, format: OutputFormat) -> anyhow::Result<()> {
  if format.is_json() {
    return print_json(summary);
  }

  print_headline(&format!(
    "Built {} asset(s) in {}",
    summary.assets,
    format_duration(summary.elapsed)
  ));
  print_field("Distribution", summary.dist.display());
  print_field("Reports", summary.reports.display());
  print_field("Repository", summary.repository.display());
  print_field("Cache hits", format!("{}/{}", summary.cache_hits, summary.assets));
  print_field("Size", format_bytes(summary.bytes));
  print_field("Entries", summary.entries);
  print_field("Modules", summary.modules);

  for inclusion in &summary.implicit {
    println!(
      "  {} {} included into {} because {}",
      symbols::ARROW.if_supports_color(Stream::Stdout, |s| s.blue()),
      inclusion.module,
      inclusion.layout,
      inclusion.chain
    );
  }
  for placement in summary.ambiguous {
    print_warning(&format!(
      "ambiguous placement of '{}': chose {} among {}",
      placement.id,
      placement.chosen,
      placement.candidates.join(", ")
    ));
  }
  Ok(())
}

/// Result of `distpack merge-repos`.
pub fn print_merged_repository(
  merged: &RuntimeModuleRepository,
  inputs: usize,
  out: &Path,
  format: OutputFormat,
) -> anyhow::Result<()> {
  if format.is_json() {
    return print_json(merged);
  }
  print_headline(&format!("Merged {} repositories", inputs));
  print_field("Output", out.display());
  print_field("Modules", merged.len());
  Ok(())
}

/// Module ids of a repository with their resource paths.
pub fn print_repository(repository: &RuntimeModuleRepository, format: OutputFormat) -> anyhow::Result<()> {
  if format.is_json() {
    return print_json(&repository.ids().collect::<Vec<_>>());
  }
  println!(
    "{} ({} modules)",
    repository.distribution_name().if_supports_color(Stream::Stdout, |s| s.bold()),
    repository.len()
  );
  for descriptor in repository.descriptors() {
    println!("  {} {}", descriptor.id, descriptor.resource_paths.join(", "));
  }
  Ok(())
}

pub fn print_descriptor(descriptor: &RuntimeModuleDescriptor, format: OutputFormat) -> anyhow::Result<()> {
  if format.is_json() {
    return print_json(descriptor);
  }
  println!("{}", descriptor.id.if_supports_color(Stream::Stdout, |s| s.bold()));
  print_field("Resources", join_or_none(&descriptor.resource_paths));
  print_field("Dependencies", join_or_none(&descriptor.dependencies));
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn bytes_use_binary_units() {
    assert_eq!(format_bytes(500), "500 B");
    assert_eq!(format_bytes(1536), "1.5 KB");
    assert_eq!(format_bytes(5 * 1024 * 1024), "5.0 MB");
    assert_eq!(format_bytes(3 * 1024 * 1024 * 1024), "3.0 GB");
    assert_eq!(format_bytes(2048 * 1024 * 1024 * 1024), "2048.0 GB");
  }

  #[test]
  fn durations_pick_a_readable_unit() {
    assert_eq!(format_duration(Duration::from_millis(50)), "50ms");
    assert_eq!(format_duration(Duration::from_millis(4200)), "4.20s");
    assert_eq!(format_duration(Duration::from_secs(125)), "2m 5s");
  }

  #[test]
  fn empty_lists_render_as_none() {
    assert_eq!(join_or_none(&[]), "(none)");
    assert_eq!(join_or_none(&["core".to_string(), "lib.alpha".to_string()]), "core, lib.alpha");
  }
}
