//! Package descriptor extracted from a PKGBUILD

use super::parser::{self, Mode, Value, Variables};
use crate::core::error::{ReleaseError, ReleaseResult};
use crate::utils::is_remote_source;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Name of the build descriptor in a package directory
pub const DESCRIPTOR_FILE: &str = "PKGBUILD";

/// Checksum algorithms makepkg knows, in makepkg's order
pub const CHECKSUM_ALGORITHMS: &[&str] = &["ck", "md5", "sha1", "sha224", "sha256", "sha384", "sha512", "b2"];

/// One entry of `source` or `source_<arch>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceEntry {
  pub raw: String,
  pub arch: Option<String>,
}

impl SourceEntry {
  pub fn is_remote(&self) -> bool {
    is_remote_source(&self.raw)
  }

  /// File name in the package directory for a local entry
  ///
  /// `name::file` entries refer to `file`; remote entries have no local file
  /// and return `None`.
  pub fn local_path(&self) -> Option<&str> {
    if self.is_remote() {
      return None;
    }
    let path = match self.raw.split_once("::") {
      Some((_, target)) => target,
      None => self.raw.as_str(),
    };
    Some(path).filter(|p| !p.is_empty())
  }
}

/// A `<alg>sums` or `<alg>sums_<arch>` declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChecksumField {
  pub algorithm: String,
  pub arch: Option<String>,
  pub values: Vec<String>,
}

impl ChecksumField {
  /// Variable name as written in the PKGBUILD
  pub fn field_name(&self) -> String {
    match &self.arch {
      Some(arch) => format!("{}sums_{}", self.algorithm, arch),
      None => format!("{}sums", self.algorithm),
    }
  }
}

/// Fields the release pipeline consumes from a PKGBUILD
#[derive(Debug, Clone)]
pub struct PackageDescriptor {
  pub path: PathBuf,
  pub pkgbase: String,
  pub pkgnames: Vec<String>,
  pub pkgver: String,
  pub pkgrel: String,
  pub epoch: Option<String>,
  pub arch: Vec<String>,
  /// Generic sources first, then `source_<arch>` in `arch` order
  pub sources: Vec<SourceEntry>,
  pub validpgpkeys: Vec<String>,
  pub checksums: Vec<ChecksumField>,
  pub changelog: Option<String>,
  pub install: Option<String>,
  variables: Variables,
}

impl PackageDescriptor {
  /// Read `PKGBUILD` from `dir`
  pub fn load(dir: &Path) -> ReleaseResult<Self> {
    let path = dir.join(DESCRIPTOR_FILE);
    if !path.is_file() {
      return Err(ReleaseError::DescriptorMissing { dir: dir.to_path_buf() });
    }

    let text = std::fs::read_to_string(&path).map_err(|e| ReleaseError::DescriptorUnreadable {
      path: path.clone(),
      reason: e.to_string(),
    })?;

    let mut seed = Variables::default();
    seed.insert("startdir", Value::Scalar(dir.display().to_string()));

    let variables =
      parser::parse_with(&text, Mode::Strict, seed).map_err(|e| ReleaseError::DescriptorUnreadable {
        path: path.clone(),
        reason: e.to_string(),
      })?;

    let descriptor = Self::from_variables(path, variables)?;
    debug!(
      pkgbase = %descriptor.pkgbase,
      version = %descriptor.full_version(),
      packages = descriptor.pkgnames.len(),
      "Read PKGBUILD"
    );
    Ok(descriptor)
  }

  /// Build a descriptor from already-parsed variables
  pub fn from_variables(path: PathBuf, variables: Variables) -> ReleaseResult<Self> {
    let missing = |field: &str| ReleaseError::DescriptorUnreadable {
      path: path.clone(),
      reason: format!("missing required field '{}'", field),
    };

    let pkgnames = variables.list("pkgname");
    if pkgnames.is_empty() {
      return Err(missing("pkgname"));
    }
    let pkgver = variables.scalar("pkgver").ok_or_else(|| missing("pkgver"))?.to_string();
    let pkgrel = variables.scalar("pkgrel").ok_or_else(|| missing("pkgrel"))?.to_string();
    let arch = variables.list("arch");
    if arch.is_empty() {
      return Err(missing("arch"));
    }

    let pkgbase = variables
      .scalar("pkgbase")
      .map(str::to_string)
      .unwrap_or_else(|| pkgnames[0].clone());

    let mut sources: Vec<SourceEntry> = variables
      .list("source")
      .into_iter()
      .map(|raw| SourceEntry { raw, arch: None })
      .collect();
    for a in &arch {
      sources.extend(variables.list(&format!("source_{}", a)).into_iter().map(|raw| SourceEntry {
        raw,
        arch: Some(a.clone()),
      }));
    }

    let mut checksums = Vec::new();
    for alg in CHECKSUM_ALGORITHMS {
      let generic = format!("{}sums", alg);
      if variables.get(&generic).is_some() {
        checksums.push(ChecksumField {
          algorithm: alg.to_string(),
          arch: None,
          values: variables.list(&generic),
        });
      }
      for a in &arch {
        let name = format!("{}sums_{}", alg, a);
        if variables.get(&name).is_some() {
          checksums.push(ChecksumField {
            algorithm: alg.to_string(),
            arch: Some(a.clone()),
            values: variables.list(&name),
          });
        }
      }
    }

    Ok(Self {
      pkgbase,
      pkgnames,
      pkgver,
      pkgrel,
      epoch: variables.scalar("epoch").map(str::to_string),
      arch,
      sources,
      validpgpkeys: variables.list("validpgpkeys"),
      checksums,
      changelog: variables.scalar("changelog").map(str::to_string),
      install: variables.scalar("install").map(str::to_string),
      path,
      variables,
    })
  }

  /// `[epoch:]pkgver-pkgrel`; a zero epoch is omitted
  pub fn full_version(&self) -> String {
    match self.epoch.as_deref() {
      Some(epoch) if epoch != "0" => format!("{}:{}-{}", epoch, self.pkgver, self.pkgrel),
      _ => format!("{}-{}", self.pkgver, self.pkgrel),
    }
  }

  /// Sources that live in the package directory, in declaration order
  pub fn local_sources(&self) -> impl Iterator<Item = &str> {
    self.sources.iter().filter_map(SourceEntry::local_path)
  }

  /// Any other PKGBUILD field as a list (used for `.SRCINFO`)
  pub fn field(&self, name: &str) -> Vec<String> {
    self.variables.list(name)
  }
}
