//! Utility functions for source entries, paths and shell quoting

use std::path::Path;

/// Check if a PKGBUILD source entry is fetched from somewhere else
///
/// Returns true for:
/// - URLs with a scheme: https://example.org/foo.tar.gz
/// - VCS sources: git+https://example.org/foo.git#tag=v1
/// - Renamed downloads: foo.tar.gz::https://example.org/v1.tar.gz
///
/// Returns false for:
/// - Plain file names: fix-build.patch
/// - Relative paths: patches/fix.patch
pub fn is_remote_source(entry: &str) -> bool {
  let target = match entry.split_once("::") {
    Some((_, target)) => target,
    None => entry,
  };

  match target.split_once("://") {
    Some((scheme, _)) => {
      !scheme.is_empty() && scheme.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
    }
    None => false,
  }
}

/// Convert a path to Git format (always forward slashes)
pub fn path_to_git_format(path: &Path) -> String {
  #[cfg(target_os = "windows")]
  {
    path.to_string_lossy().replace('\\', "/")
  }
  #[cfg(not(target_os = "windows"))]
  {
    path.to_string_lossy().to_string()
  }
}

/// Quote a string for a POSIX shell using single quotes
///
/// Embedded single quotes become `'\''`, so the result is always one word.
pub fn shell_quote(value: &str) -> String {
  let mut quoted = String::with_capacity(value.len() + 2);
  quoted.push('\'');
  for c in value.chars() {
    if c == '\'' {
      quoted.push_str("'\\''");
    } else {
      quoted.push(c);
    }
  }
  quoted.push('\'');
  quoted
}
