//! Locating built packages in PKGDEST

use crate::core::error::{Advisory, ReleaseResult};
use crate::core::tools::{CommandRunner, Invocation};
use crate::pkgbuild::PackageDescriptor;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Suffix makepkg gives debug packages
pub const DEBUG_SUFFIX: &str = "-debug";

/// A built package found in the cache
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
  pub pkgname: String,
  pub version: String,
  pub arch: String,
  pub path: PathBuf,
  /// Detached debug symbols package
  pub debug: bool,
}

/// Finds `<pkgname>-<version>-<arch><PKGEXT>` files in a cache directory
pub struct ArtifactLocator<'a> {
  cache_dir: &'a Path,
  pkgext: &'a str,
  bsdtar: &'a str,
  runner: &'a dyn CommandRunner,
}

impl<'a> ArtifactLocator<'a> {
  pub fn new(cache_dir: &'a Path, pkgext: &'a str, bsdtar: &'a str, runner: &'a dyn CommandRunner) -> Self {
    Self {
      cache_dir,
      pkgext,
      bsdtar,
      runner,
    }
  }

  /// Path of the built package, if any
  ///
  /// The configured extension wins; otherwise the first `.pkg.tar*` file
  /// (sorted by name) that is not a signature.
  pub fn locate(&self, pkgname: &str, version: &str, arch: &str) -> Option<PathBuf> {
    let stem = format!("{}-{}-{}", pkgname, version, arch);

    let exact = self.cache_dir.join(format!("{}{}", stem, self.pkgext));
    if exact.is_file() {
      return Some(exact);
    }

    let prefix = format!("{}.pkg.tar", stem);
    let mut candidates: Vec<PathBuf> = fs::read_dir(self.cache_dir)
      .ok()?
      .filter_map(|entry| entry.ok())
      .map(|entry| entry.path())
      .filter(|path| {
        path.is_file()
          && path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|name| name.starts_with(&prefix) && !name.ends_with(".sig"))
      })
      .collect();
    candidates.sort();
    candidates.into_iter().next()
  }

  /// Whether the archive's `.PKGINFO` marks it as a debug package
  pub fn is_debug_package(&self, path: &Path) -> ReleaseResult<bool> {
    let output = self.runner.run(
      &Invocation::new(self.bsdtar)
        .arg("-xOqf")
        .arg(path)
        .arg(".PKGINFO"),
    )?;
    if !output.success {
      debug!(path = %path.display(), stderr = %output.stderr, "Could not read .PKGINFO");
      return Ok(false);
    }
    Ok(pkginfo_is_debug(&output.stdout_text()))
  }

  /// Every built package of the descriptor, arch-major in declaration order
  ///
  /// Debug packages follow the package they belong to. Missing base packages
  /// are reported as advisories; missing debug packages are not.
  pub fn collect(&self, descriptor: &PackageDescriptor) -> ReleaseResult<(Vec<Artifact>, Vec<Advisory>)> {
    let version = descriptor.full_version();
    let mut artifacts: Vec<Artifact> = Vec::new();
    let mut advisories = Vec::new();

    for arch in &descriptor.arch {
      for pkgname in &descriptor.pkgnames {
        match self.locate(pkgname, &version, arch) {
          Some(path) => artifacts.push(Artifact {
            pkgname: pkgname.clone(),
            version: version.clone(),
            arch: arch.clone(),
            path,
            debug: false,
          }),
          None => {
            advisories.push(Advisory::ArtifactNotFound {
              pkgname: pkgname.clone(),
              version: version.clone(),
              arch: arch.clone(),
            });
            continue;
          }
        }
        self.push_debug(&mut artifacts, pkgname, &version, arch)?;
      }

      // split packages get one debug package named after pkgbase
      if !descriptor.pkgnames.contains(&descriptor.pkgbase) {
        self.push_debug(&mut artifacts, &descriptor.pkgbase, &version, arch)?;
      }
    }

    Ok((artifacts, advisories))
  }

  fn push_debug(&self, artifacts: &mut Vec<Artifact>, base: &str, version: &str, arch: &str) -> ReleaseResult<()> {
    let name = format!("{}{}", base, DEBUG_SUFFIX);
    let Some(path) = self.locate(&name, version, arch) else {
      return Ok(());
    };
    if artifacts.iter().any(|a| a.path == path) {
      return Ok(());
    }
    if !self.is_debug_package(&path)? {
      debug!(path = %path.display(), "Not a debug package, skipping");
      return Ok(());
    }
    artifacts.push(Artifact {
      pkgname: name,
      version: version.to_string(),
      arch: arch.to_string(),
      path,
      debug: true,
    });
    Ok(())
  }
}

/// `pkgtype = debug`, or the description older pacman gave debug packages
fn pkginfo_is_debug(pkginfo: &str) -> bool {
  pkginfo.lines().any(|line| {
    let Some((key, value)) = line.split_once('=') else {
      return false;
    };
    match key.trim() {
      "pkgtype" => value.trim() == "debug",
      "pkgdesc" => value.trim().starts_with("Detached debugging symbols"),
      _ => false,
    }
  })
}
