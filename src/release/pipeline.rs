//! Release pipeline
//!
//! Phases run strictly in order and stop at the first fatal error:
//!
//! ```text
//! branch gate -> tracked-file gate -> preflight -> key check
//!   -> stage & commit -> push -> locate -> sign & verify -> upload
//! ```
//!
//! Nothing is written before both gates and the preflight pass.

use super::artifacts::{Artifact, ArtifactLocator};
use super::sign::{SignedArtifact, Signer, UploadSet};
use super::stage::CommitOutcome;
use super::{gate, push, stage, upload};
use crate::core::config::UploadTarget;
use crate::core::context::ReleaseContext;
use crate::core::error::{Advisory, ReleaseResult};
use crate::core::tools::{CommandRunner, Invocation, require_tool};
use crate::core::vcs::{SystemGit, Upstream};
use crate::ui::progress::PackageProgress;
use tracing::{info, warn};

/// What the caller asked for
#[derive(Debug, Clone, Default)]
pub struct ReleaseOptions {
  /// Stage and create the release commit
  pub commit: bool,
  pub push: bool,
  pub upload: bool,
  /// Free-form commit note; the editor is opened when absent
  pub note: Option<String>,
}

/// What a successful run did
#[derive(Debug, Clone, Default)]
pub struct ReleaseReport {
  pub branch: String,
  /// `None` when committing was disabled
  pub commit: Option<CommitOutcome>,
  pub pushed_to: Option<Upstream>,
  pub artifacts: Vec<Artifact>,
  pub signed: Vec<SignedArtifact>,
  pub upload_set: UploadSet,
  pub uploaded: bool,
  pub advisories: Vec<Advisory>,
}

impl ReleaseReport {
  fn advise(&mut self, advisory: Advisory) {
    warn!("{}", advisory);
    self.advisories.push(advisory);
  }
}

/// One release run over a package directory
pub struct Pipeline<'a> {
  ctx: &'a ReleaseContext,
  git: &'a SystemGit,
  runner: &'a dyn CommandRunner,
  options: &'a ReleaseOptions,
}

impl<'a> Pipeline<'a> {
  pub fn new(
    ctx: &'a ReleaseContext,
    git: &'a SystemGit,
    runner: &'a dyn CommandRunner,
    options: &'a ReleaseOptions,
  ) -> Self {
    Self {
      ctx,
      git,
      runner,
      options,
    }
  }

  pub fn run(&self) -> ReleaseResult<ReleaseReport> {
    let settings = &self.ctx.settings;
    let descriptor = &self.ctx.descriptor;
    let mut report = ReleaseReport::default();

    println!("🔍 Checking {} {}...", descriptor.pkgbase, descriptor.full_version());
    report.branch = gate::check_branch(self.git, &settings.release.branch)?;
    let required = gate::required_files(descriptor, &settings.release.key_dir);
    gate::check_tracked(self.git, &self.ctx.root, &required)?;

    let target = self.preflight()?;

    if settings.release.check_keys {
      for advisory in self.unknown_keys()? {
        report.advise(advisory);
      }
    }

    if self.options.commit {
      println!("📝 Staging release...");
      let outcome = stage::stage_and_commit(self.ctx, self.git, self.runner, self.options.note.as_deref())?;
      match &outcome {
        CommitOutcome::Created { message } => {
          println!("   ✅ Committed: {}", message.lines().next().unwrap_or_default())
        }
        CommitOutcome::NothingToCommit => println!("   Nothing to commit"),
      }
      report.commit = Some(outcome);

      if self.options.push {
        println!("🚀 Pushing {}...", report.branch);
        let upstream = push::push_release(self.git, &report.branch)?;
        println!("   ✅ Pushed to {}", upstream.short_name());
        report.pushed_to = Some(upstream);
      }
    } else if self.options.push {
      report.advise(Advisory::PushWithoutCommit);
    }

    let locator = ArtifactLocator::new(&settings.pkgdest, &settings.pkgext, &settings.tools.bsdtar, self.runner);
    let (artifacts, missing) = locator.collect(descriptor)?;
    for advisory in missing {
      report.advise(advisory);
    }

    if !artifacts.is_empty() {
      println!("🔏 Signing {} package(s)...", artifacts.len());
      self.sign_all(&artifacts, &mut report)?;
    }
    report.artifacts = artifacts;

    match target {
      Some(target) if !report.upload_set.is_empty() => {
        println!("📤 Uploading to {}...", target.host);
        upload::upload(&report.upload_set, &settings.upload, &target, &settings.tools, self.runner)?;
        println!("   ✅ Registered {} package(s) in {}", report.signed.len(), target.database);
        report.uploaded = true;
      }
      Some(_) => report.advise(Advisory::NothingToUpload),
      None if !report.upload_set.is_empty() => report.advise(Advisory::UploadNotRequested),
      None => {}
    }

    info!(
      signed = report.signed.len(),
      uploaded = report.uploaded,
      "Release pipeline finished"
    );
    Ok(report)
  }

  /// Config fields and tools the requested phases need, checked before any mutation
  fn preflight(&self) -> ReleaseResult<Option<UploadTarget>> {
    let settings = &self.ctx.settings;
    let target = if self.options.upload {
      Some(settings.upload.target()?)
    } else {
      None
    };

    require_tool(&settings.tools.gpg)?;
    if self.options.upload {
      require_tool(&settings.tools.rsync)?;
      require_tool(&settings.tools.ssh)?;
    }
    Ok(target)
  }

  /// Declared fingerprints the local keyring doesn't know
  fn unknown_keys(&self) -> ReleaseResult<Vec<Advisory>> {
    let mut advisories = Vec::new();
    for fingerprint in &self.ctx.descriptor.validpgpkeys {
      let output = self.runner.run(
        &Invocation::new(&self.ctx.settings.tools.gpg)
          .arg("--list-keys")
          .arg(fingerprint),
      )?;
      if !output.success {
        advisories.push(Advisory::UnknownSigningKey {
          fingerprint: fingerprint.clone(),
        });
      }
    }
    Ok(advisories)
  }

  fn sign_all(&self, artifacts: &[Artifact], report: &mut ReleaseReport) -> ReleaseResult<()> {
    let settings = &self.ctx.settings;
    let signer = Signer::new(&settings.tools.gpg, settings.signing_key.as_deref(), self.runner);

    let mut progress = PackageProgress::on_terminal(artifacts.len(), "Signing");

    for artifact in artifacts {
      let signed = signer.sign_and_verify(&artifact.path)?;
      if let Some(progress) = progress.as_mut() {
        progress.advance();
      }
      report.upload_set.push(&signed);
      report.signed.push(signed);
    }
    Ok(())
  }
}
