//! Release context - build once, pass everywhere
//!
//! ```text
//! main.rs:
//!   ReleaseContext::build() -> &ReleaseContext
//!   |
//!   v
//! commands/release.rs -> release::pipeline
//! ```

use crate::core::config::{Environment, Settings};
use crate::core::error::{ReleaseError, ReleaseResult};
use crate::pkgbuild::PackageDescriptor;
use std::path::{Path, PathBuf};

/// Settings and descriptor for the package being released
#[derive(Debug, Clone)]
pub struct ReleaseContext {
  /// Package directory (absolute path)
  pub root: PathBuf,

  pub settings: Settings,

  /// Parsed PKGBUILD, read once per run
  pub descriptor: PackageDescriptor,
}

impl ReleaseContext {
  /// Load configuration and read the PKGBUILD in `dir`
  pub fn build(dir: &Path, env: &Environment) -> ReleaseResult<Self> {
    let root = dir
      .canonicalize()
      .map_err(|_| ReleaseError::DescriptorMissing { dir: dir.to_path_buf() })?;
    let descriptor = PackageDescriptor::load(&root)?;
    let settings = Settings::load(&root, env)?;

    Ok(Self {
      root,
      settings,
      descriptor,
    })
  }
}
