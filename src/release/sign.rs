//! Detached signatures: create when absent, always verify

use crate::core::error::{ReleaseError, ReleaseResult};
use crate::core::tools::{CommandRunner, Invocation};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Suffix of detached signature files
pub const SIGNATURE_SUFFIX: &str = ".sig";

/// Signature path for an artifact (`foo.pkg.tar.zst` → `foo.pkg.tar.zst.sig`)
pub fn signature_path(artifact: &Path) -> PathBuf {
  let mut name = OsString::from(artifact.as_os_str());
  name.push(SIGNATURE_SUFFIX);
  PathBuf::from(name)
}

/// An artifact whose signature verified
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedArtifact {
  pub artifact: PathBuf,
  pub signature: PathBuf,
  /// Signature was created during this run
  pub created: bool,
}

/// Ordered artifact and signature paths selected for transfer
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadSet {
  paths: Vec<PathBuf>,
}

impl UploadSet {
  pub fn push(&mut self, signed: &SignedArtifact) {
    self.paths.push(signed.artifact.clone());
    self.paths.push(signed.signature.clone());
  }

  pub fn paths(&self) -> &[PathBuf] {
    &self.paths
  }

  /// Package files only; signatures travel next to them
  pub fn packages(&self) -> impl Iterator<Item = &PathBuf> {
    self
      .paths
      .iter()
      .filter(|p| !p.to_string_lossy().ends_with(SIGNATURE_SUFFIX))
  }

  pub fn is_empty(&self) -> bool {
    self.paths.is_empty()
  }

  pub fn len(&self) -> usize {
    self.paths.len()
  }
}

/// Signs and verifies with gpg
pub struct Signer<'a> {
  gpg: &'a str,
  /// `--local-user` value; gpg's default key otherwise
  key: Option<&'a str>,
  runner: &'a dyn CommandRunner,
}

impl<'a> Signer<'a> {
  pub fn new(gpg: &'a str, key: Option<&'a str>, runner: &'a dyn CommandRunner) -> Self {
    Self { gpg, key, runner }
  }

  /// Sign `artifact` unless a signature exists, then verify it either way
  pub fn sign_and_verify(&self, artifact: &Path) -> ReleaseResult<SignedArtifact> {
    let signature = signature_path(artifact);
    let created = !signature.exists();

    if created {
      self.sign(artifact, &signature)?;
    } else {
      debug!(signature = %signature.display(), "Signature exists, verifying only");
    }
    self.verify(artifact, &signature)?;

    Ok(SignedArtifact {
      artifact: artifact.to_path_buf(),
      signature,
      created,
    })
  }

  fn sign(&self, artifact: &Path, signature: &Path) -> ReleaseResult<()> {
    let mut invocation = Invocation::new(self.gpg).args(["--detach-sign", "--no-armor", "--use-agent"]);
    if let Some(key) = self.key {
      invocation = invocation.arg("--local-user").arg(key);
    }
    let invocation = invocation.arg("--output").arg(signature).arg("--").arg(artifact);

    let output = self.runner.run(&invocation)?;
    if !output.success {
      return Err(ReleaseError::SigningFailed {
        artifact: artifact.to_path_buf(),
        stderr: output.stderr,
      });
    }
    Ok(())
  }

  fn verify(&self, artifact: &Path, signature: &Path) -> ReleaseResult<()> {
    let invocation = Invocation::new(self.gpg)
      .args(["--verify", "--"])
      .arg(signature)
      .arg(artifact);

    let output = self.runner.run(&invocation)?;
    if !output.success {
      debug!(stderr = %output.stderr, "Signature verification failed");
      return Err(ReleaseError::InvalidSignature {
        artifact: artifact.to_path_buf(),
        signature: signature.to_path_buf(),
      });
    }
    Ok(())
  }
}
