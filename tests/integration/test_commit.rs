//! Staging and the release commit

use crate::helpers::{PKGBUILD, TestWorkspace, stderr, stdout, write_script};
use anyhow::Result;

#[test]
fn test_second_run_is_a_noop() -> Result<()> {
  let ws = TestWorkspace::new()?;

  ws.run_ok(&["rebuild"])?;
  assert_eq!(ws.commit_count()?, 2);
  assert_eq!(ws.last_subject()?, "upgpkg: 1.0-1: rebuild");
  let head = ws.head()?;

  let output = ws.run_ok(&["rebuild"])?;
  assert_eq!(ws.head()?, head);
  assert!(stdout(&output).contains("nothing to commit"));
  Ok(())
}

#[test]
fn test_note_on_clean_tree_creates_no_commit() -> Result<()> {
  let ws = TestWorkspace::new()?;
  ws.run_ok(&["first"])?;
  let head = ws.head()?;

  ws.run_ok(&["a note nobody will read"])?;

  assert_eq!(ws.head()?, head);
  assert_eq!(ws.last_subject()?, "upgpkg: 1.0-1: first");
  Ok(())
}

#[test]
fn test_srcinfo_is_committed() -> Result<()> {
  let ws = TestWorkspace::new()?;

  ws.run_ok(&["rebuild"])?;

  let output = ws.git(&["show", "HEAD:.SRCINFO"])?;
  let srcinfo = stdout(&output);
  assert!(srcinfo.starts_with("pkgbase = foo\n"));
  assert!(srcinfo.contains("\tpkgver = 1.0\n"));
  assert!(srcinfo.contains("\tsource = foo.conf\n"));
  assert!(srcinfo.ends_with("\npkgname = foo\n"));
  Ok(())
}

#[test]
fn test_modifications_and_deletions_are_committed() -> Result<()> {
  let ws = TestWorkspace::new()?;
  ws.write_file("PKGBUILD", &PKGBUILD.replace("pkgver=1.0", "pkgver=1.1").replace("source=(foo.conf)", "source=()"))?;
  std::fs::remove_file(ws.path.join("foo.conf"))?;

  ws.run_ok(&["update"])?;

  assert_eq!(ws.last_subject()?, "upgpkg: 1.1-1: update");
  let status = stdout(&ws.git(&["status", "--porcelain"])?);
  assert!(status.trim().is_empty(), "unexpected status: {}", status);
  let files = stdout(&ws.git(&["ls-files"])?);
  assert!(!files.contains("foo.conf"));
  Ok(())
}

#[test]
fn test_excluded_paths_are_not_staged() -> Result<()> {
  let ws = TestWorkspace::new()?;
  ws.write_file("notes.txt", "draft\n")?;
  ws.git(&["add", "notes.txt"])?;
  ws.git(&["commit", "-qm", "Add notes"])?;
  ws.write_config("[release]\nexclude = [\"notes.txt\"]\n")?;
  ws.write_file("notes.txt", "edited\n")?;

  ws.run_ok(&["rebuild"])?;

  let committed = stdout(&ws.git(&["show", "--name-only", "--format=", "HEAD"])?);
  assert!(committed.contains(".SRCINFO"));
  assert!(!committed.contains("notes.txt"));
  let status = stdout(&ws.git(&["status", "--porcelain"])?);
  assert!(status.contains(" M notes.txt"));
  Ok(())
}

#[test]
fn test_declared_keys_are_exported_and_committed() -> Result<()> {
  let ws = TestWorkspace::new()?;
  ws.write_file(
    "PKGBUILD",
    &PKGBUILD.replace("license=(MIT)", "license=(MIT)\nvalidpgpkeys=(0123456789ABCDEF0123456789ABCDEF01234567)"),
  )?;

  ws.run_ok(&["add key"])?;

  let key = "keys/pgp/0123456789ABCDEF0123456789ABCDEF01234567.asc";
  assert!(ws.file_exists(key));
  let files = stdout(&ws.git(&["ls-files"])?);
  assert!(files.contains(key));
  let gpg = ws.calls_to("gpg")?;
  assert!(gpg.iter().any(|c| c.starts_with("gpg --list-keys 0123456789ABCDEF")));
  assert!(gpg.iter().any(|c| c.starts_with("gpg --export --armor 0123456789ABCDEF")));
  Ok(())
}

#[test]
fn test_editor_composes_message() -> Result<()> {
  let mut ws = TestWorkspace::new()?;
  let editor = ws.home.join("editor.sh");
  write_script(&editor, "#!/bin/sh\nprintf 'upgpkg: 1.0-1: written in editor\\n\\n# comment\\n' > \"$1\"\n")?;
  ws.set_env("PKG_RELEASE_EDITOR", &editor.to_string_lossy());

  ws.run_ok(&[])?;

  assert_eq!(ws.last_subject()?, "upgpkg: 1.0-1: written in editor");
  let body = stdout(&ws.git(&["log", "-1", "--format=%B"])?);
  assert!(!body.contains("# comment"));
  assert_eq!(ws.editmsg_leftovers()?, 0);
  Ok(())
}

#[test]
fn test_empty_editor_message_aborts() -> Result<()> {
  let mut ws = TestWorkspace::new()?;
  let editor = ws.home.join("editor.sh");
  write_script(&editor, "#!/bin/sh\n: > \"$1\"\n")?;
  ws.set_env("PKG_RELEASE_EDITOR", &editor.to_string_lossy());

  let output = ws.run(&[])?;

  assert_eq!(output.status.code(), Some(1));
  assert!(stderr(&output).contains("Aborting commit due to empty commit message"));
  assert_eq!(ws.commit_count()?, 1);
  assert_eq!(ws.editmsg_leftovers()?, 0);
  Ok(())
}

#[test]
fn test_failing_editor_aborts() -> Result<()> {
  let mut ws = TestWorkspace::new()?;
  let editor = ws.home.join("editor.sh");
  write_script(&editor, "#!/bin/sh\necho 'upgpkg: 1.0-1: half written' > \"$1\"\nexit 3\n")?;
  ws.set_env("PKG_RELEASE_EDITOR", &editor.to_string_lossy());

  let output = ws.run(&[])?;

  assert_eq!(output.status.code(), Some(1));
  assert!(stderr(&output).contains("exited with"));
  assert_eq!(ws.commit_count()?, 1);
  assert_eq!(ws.editmsg_leftovers()?, 0);
  Ok(())
}

#[test]
fn test_no_editor_available() -> Result<()> {
  let ws = TestWorkspace::new()?;

  // no note, and no PKG_RELEASE_EDITOR, core.editor, VISUAL or EDITOR
  let output = ws.run(&[])?;

  assert_eq!(output.status.code(), Some(1));
  assert!(stderr(&output).contains("No editor available to compose the commit message"));
  assert_eq!(ws.commit_count()?, 1);
  assert_eq!(ws.editmsg_leftovers()?, 0);
  Ok(())
}

#[test]
fn test_key_export_failure_stops_before_commit() -> Result<()> {
  for (mode, reason) in [("fail", "No public key"), ("empty", "key not found in the local keyring")] {
    let mut ws = TestWorkspace::new()?;
    ws.write_file(
      "PKGBUILD",
      &PKGBUILD.replace("license=(MIT)", "license=(MIT)\nvalidpgpkeys=(0123456789ABCDEF0123456789ABCDEF01234567)"),
    )?;
    ws.set_env("FAKE_GPG_EXPORT", mode);

    let output = ws.run(&["add key"])?;

    assert_eq!(output.status.code(), Some(2), "export mode {}", mode);
    let err = stderr(&output);
    assert!(err.contains("Failed to export public key 0123456789ABCDEF0123456789ABCDEF01234567"));
    assert!(err.contains(reason), "export mode {}: {}", mode, err);
    assert!(!ws.file_exists("keys/pgp/0123456789ABCDEF0123456789ABCDEF01234567.asc"));
    assert_eq!(ws.commit_count()?, 1);
  }
  Ok(())
}

#[test]
fn test_rejected_commit_fails() -> Result<()> {
  let ws = TestWorkspace::new()?;
  write_script(
    &ws.path.join(".git/hooks/pre-commit"),
    "#!/bin/sh\necho 'pre-commit: refusing' >&2\nexit 1\n",
  )?;

  let output = ws.run(&["rebuild"])?;

  assert_eq!(output.status.code(), Some(2));
  let err = stderr(&output);
  assert!(err.contains("git commit failed"));
  assert!(err.contains("pre-commit: refusing"));
  assert_eq!(ws.commit_count()?, 1);
  assert!(ws.calls_to("gpg")?.iter().all(|c| !c.contains("--detach-sign")));
  Ok(())
}

#[test]
fn test_no_commit_leaves_tree_untouched() -> Result<()> {
  let ws = TestWorkspace::new()?;

  ws.run_ok(&["--no-commit"])?;

  assert_eq!(ws.commit_count()?, 1);
  assert!(!ws.file_exists(".SRCINFO"));
  Ok(())
}
