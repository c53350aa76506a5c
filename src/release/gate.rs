//! Branch and tracked-file checks that run before anything is mutated

use crate::core::error::{ReleaseError, ReleaseResult};
use crate::core::vcs::SystemGit;
use crate::pkgbuild::{DESCRIPTOR_FILE, PackageDescriptor};
use crate::utils::path_to_git_format;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Fail unless HEAD is on the release branch; returns the branch name
pub fn check_branch(git: &SystemGit, expected: &str) -> ReleaseResult<String> {
  let current = git.current_branch()?.ok_or(ReleaseError::DetachedHead)?;
  if current != expected {
    return Err(ReleaseError::WrongBranch {
      current,
      expected: expected.to_string(),
    });
  }
  Ok(current)
}

/// Exported public key file for a fingerprint
pub fn key_file(key_dir: &str, fingerprint: &str) -> PathBuf {
  Path::new(key_dir).join(format!("{}.asc", fingerprint))
}

/// Files a reproducible release needs in git, in the order they are checked
///
/// PKGBUILD, local sources, changelog, install script, then key files.
/// Paths are relative to the package directory; duplicates keep their first
/// position.
pub fn required_files(descriptor: &PackageDescriptor, key_dir: &str) -> Vec<PathBuf> {
  let mut files: Vec<PathBuf> = Vec::new();
  let mut push = |path: PathBuf| {
    if !files.contains(&path) {
      files.push(path);
    }
  };

  push(PathBuf::from(DESCRIPTOR_FILE));
  for source in descriptor.local_sources() {
    push(PathBuf::from(source));
  }
  if let Some(changelog) = &descriptor.changelog {
    push(PathBuf::from(changelog));
  }
  if let Some(install) = &descriptor.install {
    push(PathBuf::from(install));
  }
  for fingerprint in &descriptor.validpgpkeys {
    push(key_file(key_dir, fingerprint));
  }

  files
}

/// Fail on the first required file that exists on disk but is not tracked
pub fn check_tracked(git: &SystemGit, root: &Path, files: &[PathBuf]) -> ReleaseResult<()> {
  for file in files {
    if !root.join(file).exists() {
      debug!(path = %file.display(), "Required file not on disk, skipping");
      continue;
    }
    if !git.is_tracked(&path_to_git_format(file))? {
      return Err(ReleaseError::UntrackedRequiredFile { path: file.clone() });
    }
  }
  Ok(())
}
