//! Test helpers for integration tests

use anyhow::{Context, Result, bail};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

pub const PKGBUILD: &str = r#"# Maintainer: Test User <test@example.com>
pkgname=foo
pkgver=1.0
pkgrel=1
pkgdesc='Foo test package'
arch=(x86_64)
license=(MIT)
source=(foo.conf)
sha256sums=(SKIP)

package() {
  install -Dm644 foo.conf "$pkgdir/etc/foo.conf"
}
"#;

const FAKE_GPG: &str = r#"#!/bin/sh
echo "gpg $*" >> "$FAKE_TOOL_LOG"
case "$1" in
  --list-keys) exit 0 ;;
  --export)
    case "$FAKE_GPG_EXPORT" in
      fail) echo "gpg: error reading key: No public key" >&2; exit 2 ;;
      empty) echo "gpg: WARNING: nothing exported" >&2; exit 0 ;;
    esac
    echo "-----BEGIN PGP PUBLIC KEY BLOCK-----"
    exit 0
    ;;
  --verify) grep -qx 'fake-signature' "$3" || { echo "BAD signature" >&2; exit 1; } ;;
  --detach-sign)
    while [ $# -gt 0 ]; do
      if [ "$1" = "--output" ]; then echo 'fake-signature' > "$2"; fi
      shift
    done
    ;;
esac
exit 0
"#;

const FAKE_RSYNC: &str = r#"#!/bin/sh
echo "rsync $*" >> "$FAKE_TOOL_LOG"
exit "${FAKE_RSYNC_EXIT:-0}"
"#;

const FAKE_SSH: &str = r#"#!/bin/sh
echo "ssh $*" >> "$FAKE_TOOL_LOG"
exit 0
"#;

const FAKE_BSDTAR: &str = r#"#!/bin/sh
echo "bsdtar $*" >> "$FAKE_TOOL_LOG"
case "$2" in
  *-debug-*) printf 'pkgname = foo-debug\npkgtype = debug\n' ;;
  *) printf 'pkgname = foo\npkgtype = pkg\n' ;;
esac
"#;

/// A package repository with isolated HOME, makepkg.conf, package cache and fake tools
pub struct TestWorkspace {
  _root: TempDir,
  pub path: PathBuf,
  pub home: PathBuf,
  pub pkgdest: PathBuf,
  bin: PathBuf,
  log: PathBuf,
  extra_env: Vec<(String, String)>,
}

impl TestWorkspace {
  /// Create a git repository on `master` with the PKGBUILD committed
  pub fn new() -> Result<Self> {
    let root = TempDir::new()?;
    let path = root.path().join("foo");
    let home = root.path().join("home");
    let pkgdest = root.path().join("pkgdest");
    let bin = root.path().join("bin");
    for dir in [&path, &home, &pkgdest, &bin] {
      std::fs::create_dir_all(dir)?;
    }

    write_script(&bin.join("gpg"), FAKE_GPG)?;
    write_script(&bin.join("rsync"), FAKE_RSYNC)?;
    write_script(&bin.join("ssh"), FAKE_SSH)?;
    write_script(&bin.join("bsdtar"), FAKE_BSDTAR)?;
    std::fs::write(home.join("makepkg.conf"), "PKGEXT='.pkg.tar.zst'\n")?;

    git(&path, &["init", "--initial-branch=master"])?;
    git(&path, &["config", "user.name", "Test User"])?;
    git(&path, &["config", "user.email", "test@example.com"])?;

    std::fs::write(path.join("PKGBUILD"), PKGBUILD)?;
    std::fs::write(path.join("foo.conf"), "answer=42\n")?;
    git(&path, &["add", "."])?;
    git(&path, &["commit", "-m", "Initial import"])?;

    Ok(Self {
      log: root.path().join("tools.log"),
      _root: root,
      path,
      home,
      pkgdest,
      bin,
      extra_env: Vec::new(),
    })
  }

  /// Set an environment variable for every later run
  pub fn set_env(&mut self, key: &str, value: &str) {
    self.extra_env.push((key.to_string(), value.to_string()));
  }

  /// Write the user-level release config
  pub fn write_config(&self, content: &str) -> Result<()> {
    let dir = self.home.join(".config/pkg-release");
    std::fs::create_dir_all(&dir)?;
    std::fs::write(dir.join("config.toml"), content)?;
    Ok(())
  }

  /// Upload section pointing at a fake host
  pub fn write_upload_config(&self) -> Result<()> {
    self.write_config(
      r#"[upload]
host = "repo.example.org"
path = "/srv/repo/x86_64"
database = "custom.db.tar.gz"
update_command = ""
"#,
    )
  }

  /// Put a fake built package into the cache
  pub fn add_artifact(&self, name: &str) -> Result<PathBuf> {
    let path = self.pkgdest.join(name);
    std::fs::write(&path, b"package payload")?;
    Ok(path)
  }

  /// Write a file in the package directory
  pub fn write_file(&self, path: &str, content: &str) -> Result<()> {
    let full = self.path.join(path);
    if let Some(parent) = full.parent() {
      std::fs::create_dir_all(parent)?;
    }
    std::fs::write(full, content)?;
    Ok(())
  }

  pub fn file_exists(&self, path: &str) -> bool {
    self.path.join(path).exists()
  }

  /// Commit message scratch files left in `.git`
  pub fn editmsg_leftovers(&self) -> Result<usize> {
    Ok(
      std::fs::read_dir(self.path.join(".git"))?
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().starts_with("PKG_RELEASE_EDITMSG"))
        .count(),
    )
  }

  /// Run `git` in the package directory
  pub fn git(&self, args: &[&str]) -> Result<Output> {
    git(&self.path, args)
  }

  pub fn head(&self) -> Result<String> {
    let output = self.git(&["rev-parse", "HEAD"])?;
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
  }

  pub fn commit_count(&self) -> Result<usize> {
    let output = self.git(&["rev-list", "--count", "HEAD"])?;
    Ok(String::from_utf8_lossy(&output.stdout).trim().parse()?)
  }

  pub fn last_subject(&self) -> Result<String> {
    let output = self.git(&["log", "-1", "--format=%s"])?;
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
  }

  /// Lines the fake tools logged, in call order
  pub fn tool_calls(&self) -> Result<Vec<String>> {
    if !self.log.exists() {
      return Ok(Vec::new());
    }
    Ok(std::fs::read_to_string(&self.log)?.lines().map(String::from).collect())
  }

  /// Logged calls of one tool
  pub fn calls_to(&self, tool: &str) -> Result<Vec<String>> {
    let prefix = format!("{} ", tool);
    Ok(
      self
        .tool_calls()?
        .into_iter()
        .filter(|line| line.starts_with(&prefix))
        .collect(),
    )
  }

  /// Run pkg-release in the package directory with an isolated environment
  pub fn run(&self, args: &[&str]) -> Result<Output> {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_pkg-release"));
    cmd
      .current_dir(&self.path)
      .args(args)
      .env_clear()
      .env("PATH", std::env::var_os("PATH").unwrap_or_default())
      .env("HOME", &self.home)
      .env("XDG_CONFIG_HOME", self.home.join(".config"))
      .env("MAKEPKG_CONF", self.home.join("makepkg.conf"))
      .env("PKGDEST", &self.pkgdest)
      .env("GPG_BIN", self.bin.join("gpg"))
      .env("RSYNC_BIN", self.bin.join("rsync"))
      .env("SSH_BIN", self.bin.join("ssh"))
      .env("BSDTAR_BIN", self.bin.join("bsdtar"))
      .env("FAKE_TOOL_LOG", &self.log)
      .env("PKG_RELEASE_LOG", "warn");
    for (key, value) in &self.extra_env {
      cmd.env(key, value);
    }
    cmd.output().context("Failed to run pkg-release")
  }

  /// Run and require success
  pub fn run_ok(&self, args: &[&str]) -> Result<Output> {
    let output = self.run(args)?;
    if !output.status.success() {
      bail!(
        "pkg-release {:?} failed: {}\nstdout: {}",
        args,
        String::from_utf8_lossy(&output.stderr),
        String::from_utf8_lossy(&output.stdout)
      );
    }
    Ok(output)
  }
}

/// A bare repository next to the workspace, set as `origin` with `master` pushed
pub fn add_bare_remote(ws: &TestWorkspace) -> Result<PathBuf> {
  let remote = ws.path.with_file_name("remote.git");
  git(
    ws.path.parent().context("workspace has no parent")?,
    &["init", "--bare", "--initial-branch=master", "remote.git"],
  )?;
  ws.git(&["remote", "add", "origin", &remote.to_string_lossy()])?;
  ws.git(&["push", "-q", "-u", "origin", "master"])?;
  Ok(remote)
}

/// Write an executable shell script
pub fn write_script(path: &Path, content: &str) -> Result<()> {
  std::fs::write(path, content)?;
  let mut perms = std::fs::metadata(path)?.permissions();
  perms.set_mode(0o755);
  std::fs::set_permissions(path, perms)?;
  Ok(())
}

/// Run git command in a directory
pub fn git(cwd: &Path, args: &[&str]) -> Result<Output> {
  let output = Command::new("git")
    .current_dir(cwd)
    .args(args)
    .output()
    .context("Failed to run git command")?;

  if !output.status.success() {
    bail!(
      "git {:?} failed: {}",
      args,
      String::from_utf8_lossy(&output.stderr)
    );
  }

  Ok(output)
}

pub fn stdout(output: &Output) -> String {
  String::from_utf8_lossy(&output.stdout).into_owned()
}

pub fn stderr(output: &Output) -> String {
  String::from_utf8_lossy(&output.stderr).into_owned()
}
