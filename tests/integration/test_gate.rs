//! Branch and tracked-file gates

use crate::helpers::{PKGBUILD, TestWorkspace, stderr};
use anyhow::Result;

#[test]
fn test_untracked_required_file_stops_before_side_effects() -> Result<()> {
  let ws = TestWorkspace::new()?;
  ws.write_file("PKGBUILD", &PKGBUILD.replace("license=(MIT)", "license=(MIT)\ninstall=foo.install"))?;
  ws.git(&["commit", "-qam", "Add install script"])?;
  ws.write_file("foo.install", "post_install() { :; }\n")?;
  ws.add_artifact("foo-1.0-1-x86_64.pkg.tar.zst")?;
  let head = ws.head()?;

  let output = ws.run(&["rebuild"])?;

  assert_eq!(output.status.code(), Some(1));
  assert!(stderr(&output).contains("foo.install exists but is not tracked by git"));
  assert_eq!(ws.head()?, head);
  assert!(!ws.file_exists(".SRCINFO"));
  assert!(!ws.pkgdest.join("foo-1.0-1-x86_64.pkg.tar.zst.sig").exists());
  assert!(ws.tool_calls()?.is_empty());
  Ok(())
}

#[test]
fn test_declared_file_missing_from_disk_is_not_an_error() -> Result<()> {
  let ws = TestWorkspace::new()?;
  ws.write_file("PKGBUILD", &PKGBUILD.replace("license=(MIT)", "license=(MIT)\nchangelog=foo.changelog"))?;
  ws.git(&["commit", "-qam", "Declare changelog"])?;

  ws.run_ok(&["--no-commit"])?;
  Ok(())
}

#[test]
fn test_wrong_branch_is_rejected() -> Result<()> {
  let ws = TestWorkspace::new()?;
  ws.git(&["checkout", "-q", "-b", "feature"])?;

  let output = ws.run(&["rebuild"])?;

  assert_eq!(output.status.code(), Some(1));
  assert!(stderr(&output).contains("On branch 'feature', but releases are made from 'master'"));
  assert_eq!(ws.commit_count()?, 1);
  Ok(())
}

#[test]
fn test_release_branch_from_config() -> Result<()> {
  let ws = TestWorkspace::new()?;
  ws.git(&["checkout", "-q", "-b", "testing"])?;
  ws.write_config("[release]\nbranch = \"testing\"\n")?;

  ws.run_ok(&["bump"])?;
  assert_eq!(ws.commit_count()?, 2);
  Ok(())
}

#[test]
fn test_detached_head_is_rejected() -> Result<()> {
  let ws = TestWorkspace::new()?;
  let head = ws.head()?;
  ws.git(&["checkout", "-q", "--detach", &head])?;

  let output = ws.run(&["--no-commit"])?;

  assert_eq!(output.status.code(), Some(1));
  assert!(stderr(&output).contains("HEAD is detached"));
  Ok(())
}

#[test]
fn test_upload_without_target_fails_preflight() -> Result<()> {
  let ws = TestWorkspace::new()?;
  ws.add_artifact("foo-1.0-1-x86_64.pkg.tar.zst")?;

  let output = ws.run(&["--upload", "rebuild"])?;

  assert_eq!(output.status.code(), Some(1));
  assert!(stderr(&output).contains("upload.host"));
  assert_eq!(ws.commit_count()?, 1);
  assert!(ws.tool_calls()?.is_empty());
  Ok(())
}

#[test]
fn test_missing_pkgbuild() -> Result<()> {
  let ws = TestWorkspace::new()?;
  std::fs::remove_file(ws.path.join("PKGBUILD"))?;

  let output = ws.run(&["--no-commit"])?;

  assert_eq!(output.status.code(), Some(1));
  assert!(stderr(&output).contains("No PKGBUILD found"));
  Ok(())
}
