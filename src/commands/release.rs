//! Release command implementation

use crate::core::context::ReleaseContext;
use crate::core::error::{Advisory, ReleaseResult};
use crate::core::tools::SystemRunner;
use crate::core::vcs::SystemGit;
use crate::release::{CommitOutcome, Pipeline, ReleaseOptions, ReleaseReport};
use tracing::debug;

/// Run the release pipeline for the package in `ctx`
pub fn run_release(ctx: &ReleaseContext, options: &ReleaseOptions) -> ReleaseResult<()> {
  debug!(
    pkgbuild = %ctx.descriptor.path.display(),
    config = ?ctx.settings.config_path,
    pkgdest = %ctx.settings.pkgdest.display(),
    "Release context loaded"
  );
  let git = SystemGit::open(&ctx.root, &ctx.settings.git_env)?;
  let report = Pipeline::new(ctx, &git, &SystemRunner, options).run()?;
  print_summary(ctx, &report);
  Ok(())
}

fn print_summary(ctx: &ReleaseContext, report: &ReleaseReport) {
  println!();
  println!(
    "✅ Released {} {}",
    ctx.descriptor.pkgbase,
    ctx.descriptor.full_version()
  );

  match &report.commit {
    Some(CommitOutcome::Created { .. }) => println!("   Commit:   created on {}", report.branch),
    Some(CommitOutcome::NothingToCommit) => println!("   Commit:   nothing to commit"),
    None => println!("   Commit:   skipped (--no-commit)"),
  }
  if let Some(upstream) = &report.pushed_to {
    println!("   Pushed:   {}", upstream.short_name());
  }

  for artifact in &report.artifacts {
    let kind = if artifact.debug { " [debug]" } else { "" };
    println!(
      "   📦 {} {} ({}){}",
      artifact.pkgname, artifact.version, artifact.arch, kind
    );
  }
  let created = report.signed.iter().filter(|s| s.created).count();
  println!(
    "   Signed:   {} package(s), {} new signature(s)",
    report.signed.len(),
    created
  );
  if report.uploaded {
    println!("   Uploaded: {} file(s)", report.upload_set.len());
  }

  if !report.advisories.is_empty() {
    println!();
    for advisory in &report.advisories {
      print_advisory(advisory);
    }
  }
}

fn print_advisory(advisory: &Advisory) {
  println!("⚠️  {}", advisory);
}
