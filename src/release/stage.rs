//! Staging and the release commit

use super::editor;
use super::gate::key_file;
use crate::core::context::ReleaseContext;
use crate::core::error::{ReleaseError, ReleaseResult, ResultExt};
use crate::core::tools::{CommandRunner, Invocation};
use crate::core::vcs::{ChangeKind, PendingChange, SystemGit};
use crate::pkgbuild::{SRCINFO_FILE, srcinfo};
use std::fs;
use tracing::{debug, info};

/// What the commit step did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
  Created { message: String },
  /// No tracked file differs from `HEAD`
  NothingToCommit,
}

/// `"<prefix>: <fullver>"`, with `": <note>"` appended when a note is given
pub fn commit_subject(prefix: &str, full_version: &str, note: Option<&str>) -> String {
  match note.map(str::trim).filter(|n| !n.is_empty()) {
    Some(note) => format!("{}: {}: {}", prefix, full_version, note),
    None => format!("{}: {}", prefix, full_version),
  }
}

/// Regenerate `.SRCINFO` and stage it even if it is ignored
pub fn write_srcinfo(ctx: &ReleaseContext, git: &SystemGit) -> ReleaseResult<()> {
  let path = ctx.root.join(SRCINFO_FILE);
  fs::write(&path, srcinfo::render(&ctx.descriptor)).with_context(|| format!("Failed to write {}", path.display()))?;
  git.force_add(&[SRCINFO_FILE])
}

/// Export every declared key that has no `.asc` file yet, then stage the key directory
///
/// Returns the fingerprints that were exported.
pub fn export_keys(ctx: &ReleaseContext, git: &SystemGit, runner: &dyn CommandRunner) -> ReleaseResult<Vec<String>> {
  let fingerprints = &ctx.descriptor.validpgpkeys;
  if fingerprints.is_empty() {
    return Ok(Vec::new());
  }

  let key_dir = &ctx.settings.release.key_dir;
  let mut exported = Vec::new();
  for fingerprint in fingerprints {
    let path = ctx.root.join(key_file(key_dir, fingerprint));
    if path.exists() {
      continue;
    }

    let output = runner.run(
      &Invocation::new(&ctx.settings.tools.gpg)
        .args(["--export", "--armor"])
        .arg(fingerprint),
    )?;
    if !output.success {
      return Err(ReleaseError::KeyExportFailed {
        fingerprint: fingerprint.clone(),
        reason: output.stderr,
      });
    }
    if output.stdout.iter().all(u8::is_ascii_whitespace) {
      return Err(ReleaseError::KeyExportFailed {
        fingerprint: fingerprint.clone(),
        reason: "key not found in the local keyring".to_string(),
      });
    }

    if let Some(parent) = path.parent() {
      fs::create_dir_all(parent).with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    fs::write(&path, &output.stdout).with_context(|| format!("Failed to write {}", path.display()))?;
    debug!(fingerprint = %fingerprint, "Exported public key");
    exported.push(fingerprint.clone());
  }

  git.force_add(&[key_dir.as_str()])?;
  Ok(exported)
}

/// Pending changes minus configured exclusions
pub fn releasable_changes(git: &SystemGit, exclude: &[String]) -> ReleaseResult<Vec<PendingChange>> {
  let changes = git.pending_changes()?;
  Ok(changes.into_iter().filter(|c| !is_excluded(&c.path, exclude)).collect())
}

fn is_excluded(path: &str, exclude: &[String]) -> bool {
  exclude.iter().any(|ex| {
    let ex = ex.trim_end_matches('/');
    path == ex || path.strip_prefix(ex).is_some_and(|rest| rest.starts_with('/'))
  })
}

/// Stage metadata, then commit every releasable change
///
/// A clean tree short-circuits before any message is composed, so a note on
/// a clean tree creates nothing.
pub fn stage_and_commit(
  ctx: &ReleaseContext,
  git: &SystemGit,
  runner: &dyn CommandRunner,
  note: Option<&str>,
) -> ReleaseResult<CommitOutcome> {
  write_srcinfo(ctx, git)?;
  export_keys(ctx, git, runner)?;

  let changes = releasable_changes(git, &ctx.settings.release.exclude)?;
  if changes.is_empty() {
    info!("No pending changes, skipping commit");
    return Ok(CommitOutcome::NothingToCommit);
  }

  let (deleted, updated): (Vec<_>, Vec<_>) = changes.iter().partition(|c| c.kind == ChangeKind::Deleted);
  let updated: Vec<&str> = updated.iter().map(|c| c.path.as_str()).collect();
  let deleted: Vec<&str> = deleted.iter().map(|c| c.path.as_str()).collect();
  git.add(&updated)?;
  git.remove_cached(&deleted)?;

  let subject = commit_subject(
    &ctx.settings.release.commit_prefix,
    &ctx.descriptor.full_version(),
    note,
  );

  if note.is_some_and(|n| !n.trim().is_empty()) {
    git.commit_with_message(&subject)?;
    return Ok(CommitOutcome::Created { message: subject });
  }

  let editor = editor::resolve_editor(&ctx.settings.editor, git)?;
  let listing: Vec<String> = changes.iter().map(describe_change).collect();
  let composed = editor::compose(git, runner, &editor, &editor::template(&subject, &listing))?;
  git.commit_with_file(composed.path())?;
  Ok(CommitOutcome::Created {
    message: composed.message.clone(),
  })
}

fn describe_change(change: &PendingChange) -> String {
  let status = match change.kind {
    ChangeKind::Added => "new file:",
    ChangeKind::Modified => "modified:",
    ChangeKind::Deleted => "deleted:",
    ChangeKind::TypeChanged => "typechange:",
    ChangeKind::Other(_) => "changed:",
  };
  format!("{:<12}{}", status, change.path)
}
