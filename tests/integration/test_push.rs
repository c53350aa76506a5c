//! Pushing the release commit

use crate::helpers::{TestWorkspace, add_bare_remote, git, stderr, stdout, write_script};
use anyhow::Result;
use std::path::Path;

fn remote_head(remote: &Path) -> Result<String> {
  let output = git(remote, &["rev-parse", "refs/heads/master"])?;
  Ok(stdout(&output).trim().to_string())
}

#[test]
fn test_push_fast_forwards_upstream() -> Result<()> {
  let ws = TestWorkspace::new()?;
  let remote = add_bare_remote(&ws)?;

  let output = ws.run_ok(&["--push", "rebuild"])?;

  assert_eq!(remote_head(&remote)?, ws.head()?);
  assert!(stdout(&output).contains("Pushed:   origin/master"));
  Ok(())
}

#[test]
fn test_diverged_upstream_is_not_pushed() -> Result<()> {
  let ws = TestWorkspace::new()?;
  let remote = add_bare_remote(&ws)?;

  // someone else pushes first
  let other = ws.path.with_file_name("other");
  git(
    ws.path.parent().unwrap(),
    &["clone", "-q", &remote.to_string_lossy(), "other"],
  )?;
  git(&other, &["config", "user.name", "Other User"])?;
  git(&other, &["config", "user.email", "other@example.com"])?;
  std::fs::write(other.join("foo.conf"), "answer=43\n")?;
  git(&other, &["commit", "-qam", "Change answer"])?;
  git(&other, &["push", "-q", "origin", "master"])?;
  let theirs = remote_head(&remote)?;

  let output = ws.run(&["--push", "rebuild"])?;

  assert_eq!(output.status.code(), Some(3));
  assert!(stderr(&output).contains("'origin/master' has commits that 'master' does not contain"));
  assert_eq!(remote_head(&remote)?, theirs);
  // the commit stays local
  assert_eq!(ws.commit_count()?, 2);
  Ok(())
}

#[test]
fn test_push_without_upstream_fails() -> Result<()> {
  let ws = TestWorkspace::new()?;

  let output = ws.run(&["--push", "rebuild"])?;

  assert_eq!(output.status.code(), Some(1));
  assert!(stderr(&output).contains("Branch 'master' has no upstream branch configured"));
  Ok(())
}

#[test]
fn test_push_without_commit_is_skipped_with_warning() -> Result<()> {
  let ws = TestWorkspace::new()?;
  let remote = add_bare_remote(&ws)?;
  let before = remote_head(&remote)?;

  let output = ws.run_ok(&["--no-commit", "--push"])?;

  assert!(stdout(&output).contains("--push requires commit creation; skipping push"));
  assert_eq!(remote_head(&remote)?, before);
  Ok(())
}

#[test]
fn test_unreachable_remote_fails_fetch() -> Result<()> {
  let ws = TestWorkspace::new()?;
  let remote = add_bare_remote(&ws)?;
  std::fs::rename(&remote, remote.with_file_name("gone.git"))?;

  let output = ws.run(&["--push", "rebuild"])?;

  assert_eq!(output.status.code(), Some(2));
  assert!(stderr(&output).contains("Failed to fetch from 'origin'"));
  assert_eq!(ws.commit_count()?, 2);
  Ok(())
}

#[test]
fn test_rejected_push_fails() -> Result<()> {
  let ws = TestWorkspace::new()?;
  let remote = add_bare_remote(&ws)?;
  let before = remote_head(&remote)?;
  write_script(
    &remote.join("hooks/pre-receive"),
    "#!/bin/sh\necho 'pushes are frozen' >&2\nexit 1\n",
  )?;

  let output = ws.run(&["--push", "rebuild"])?;

  assert_eq!(output.status.code(), Some(2));
  let err = stderr(&output);
  assert!(err.contains("Push to origin/master failed"));
  assert!(err.contains("pushes are frozen"));
  assert_eq!(remote_head(&remote)?, before);
  Ok(())
}
