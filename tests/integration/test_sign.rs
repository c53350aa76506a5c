//! Signing and verification of cached packages

use crate::helpers::{TestWorkspace, stderr, stdout};
use anyhow::Result;

#[test]
fn test_unsigned_package_is_signed_and_verified() -> Result<()> {
  let ws = TestWorkspace::new()?;
  let pkg = ws.add_artifact("foo-1.0-1-x86_64.pkg.tar.zst")?;

  let output = ws.run_ok(&["--no-commit"])?;

  let sig = ws.pkgdest.join("foo-1.0-1-x86_64.pkg.tar.zst.sig");
  assert_eq!(std::fs::read_to_string(&sig)?, "fake-signature\n");
  let gpg = ws.calls_to("gpg")?;
  assert_eq!(gpg.len(), 2);
  assert!(gpg[0].starts_with("gpg --detach-sign --no-armor --use-agent --output"));
  assert!(!gpg[0].contains("--local-user"));
  assert_eq!(gpg[1], format!("gpg --verify -- {} {}", sig.display(), pkg.display()));
  assert!(stdout(&output).contains("packages were signed but --upload was not requested"));
  Ok(())
}

#[test]
fn test_signing_key_from_makepkg_conf() -> Result<()> {
  let ws = TestWorkspace::new()?;
  std::fs::write(
    ws.home.join("makepkg.conf"),
    "PKGEXT='.pkg.tar.zst'\nGPGKEY=\"DEADBEEF\"\n",
  )?;
  ws.add_artifact("foo-1.0-1-x86_64.pkg.tar.zst")?;

  ws.run_ok(&["--no-commit"])?;

  let gpg = ws.calls_to("gpg")?;
  assert!(gpg[0].contains("--local-user DEADBEEF"));
  Ok(())
}

#[test]
fn test_existing_signature_is_verified_only() -> Result<()> {
  let ws = TestWorkspace::new()?;
  ws.add_artifact("foo-1.0-1-x86_64.pkg.tar.zst")?;
  std::fs::write(ws.pkgdest.join("foo-1.0-1-x86_64.pkg.tar.zst.sig"), "fake-signature\n")?;

  let output = ws.run_ok(&["--no-commit"])?;

  let gpg = ws.calls_to("gpg")?;
  assert_eq!(gpg.len(), 1);
  assert!(gpg[0].starts_with("gpg --verify"));
  assert!(stdout(&output).contains("1 package(s), 0 new signature(s)"));
  Ok(())
}

#[test]
fn test_invalid_existing_signature_fails() -> Result<()> {
  let mut ws = TestWorkspace::new()?;
  ws.write_upload_config()?;
  ws.add_artifact("foo-1.0-1-x86_64.pkg.tar.zst")?;
  std::fs::write(ws.pkgdest.join("foo-1.0-1-x86_64.pkg.tar.zst.sig"), "tampered\n")?;
  ws.set_env("PKG_RELEASE_LOG", "off");

  let output = ws.run(&["--no-commit", "--upload"])?;

  assert_eq!(output.status.code(), Some(3));
  assert!(stderr(&output).contains("does not verify against"));
  assert!(ws.calls_to("gpg")?.iter().all(|c| !c.contains("--detach-sign")));
  assert!(ws.calls_to("rsync")?.is_empty());
  assert!(ws.calls_to("ssh")?.is_empty());
  Ok(())
}

#[test]
fn test_debug_package_follows_its_base() -> Result<()> {
  let ws = TestWorkspace::new()?;
  ws.add_artifact("foo-1.0-1-x86_64.pkg.tar.zst")?;
  ws.add_artifact("foo-debug-1.0-1-x86_64.pkg.tar.zst")?;

  let output = ws.run_ok(&["--no-commit"])?;

  let out = stdout(&output);
  let base = out.find("📦 foo 1.0-1 (x86_64)\n").unwrap();
  let debug = out.find("📦 foo-debug 1.0-1 (x86_64) [debug]").unwrap();
  assert!(base < debug);
  assert!(ws.pkgdest.join("foo-debug-1.0-1-x86_64.pkg.tar.zst.sig").exists());
  assert!(ws.calls_to("bsdtar")?.iter().any(|c| c.contains("foo-debug-1.0-1")));
  Ok(())
}
