//! Glob-style exclude filters applied to archive entry names and directory walks.

use glob::{MatchOptions, Pattern, PatternError};

const MATCH_OPTIONS: MatchOptions = MatchOptions {
  case_sensitive: true,
  require_literal_separator: false,
  require_literal_leading_dot: false,
};

/// A set of glob patterns matched against `/`-separated relative names.
///
/// A name is excluded when a pattern matches the name itself or any of its
/// parent directories, so `tmp` excludes `tmp/a/b.txt`.
#[derive(Debug, Clone, Default)]
pub struct ExcludeSet {
  patterns: Vec<Pattern>,
}

impl ExcludeSet {
  pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self, PatternError> {
    let patterns = patterns
      .iter()
      .map(|p| Pattern::new(p.as_ref()))
      .collect::<Result<Vec<_>, _>>()?;
    Ok(Self { patterns })
  }

  /// Add a literal path (no glob interpretation).
  pub fn push_literal(&mut self, name: &str) {
    self.patterns.push(Pattern::new(&Pattern::escape(name)).unwrap_or_default());
  }

  pub fn is_empty(&self) -> bool {
    self.patterns.is_empty()
  }

  pub fn is_excluded(&self, name: &str) -> bool {
    if self.patterns.is_empty() {
      return false;
    }
    let mut prefix_end = Some(name.len());
    while let Some(end) = prefix_end {
      let candidate = &name[..end];
      if self.patterns.iter().any(|p| p.matches_with(candidate, MATCH_OPTIONS)) {
        return true;
      }
      prefix_end = candidate.rfind('/');
    }
    false
  }

  /// Pattern strings, in declaration order. Used for fingerprints and diagnostics.
  pub fn patterns(&self) -> Vec<&str> {
    self.patterns.iter().map(|p| p.as_str()).collect()
  }
}

/// Signature files that become invalid once an archive is repacked.
pub fn is_signature_file(name: &str) -> bool {
  let Some(file) = name.strip_prefix("META-INF/") else {
    return false;
  };
  !file.contains('/') && (file.ends_with(".SF") || file.ends_with(".DSA") || file.ends_with(".RSA"))
}
