//! System git backend
//!
//! Every call is a `git -C <package dir>` subprocess with an isolated
//! environment. Only the variables git needs for transport, identity and user
//! config are passed through.

use crate::core::error::{ReleaseError, ReleaseResult};
use std::ffi::OsStr;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tracing::debug;

/// Git backend using system git
pub struct SystemGit {
  /// Package directory all commands run in
  pub(crate) work_dir: PathBuf,

  /// Environment passed to git
  pub(crate) env: Vec<(String, String)>,
}

impl SystemGit {
  /// Open the repository containing `path`
  pub fn open(path: &Path, env: &[(String, String)]) -> ReleaseResult<Self> {
    let git = Self {
      work_dir: path.to_path_buf(),
      env: env.to_vec(),
    };

    let output = git.run(["rev-parse", "--show-toplevel"])?;
    if !output.status.success() {
      let stderr = String::from_utf8_lossy(&output.stderr);
      if stderr.contains("not a git repository") {
        return Err(ReleaseError::message(format!(
          "{} is not inside a git repository",
          path.display()
        )));
      }
      return Err(ReleaseError::Git {
        command: "git rev-parse --show-toplevel".to_string(),
        stderr: stderr.trim().to_string(),
      });
    }

    Ok(git)
  }

  /// Current branch name, or `None` on a detached HEAD
  pub fn current_branch(&self) -> ReleaseResult<Option<String>> {
    let output = self.run(["symbolic-ref", "--short", "-q", "HEAD"])?;
    if !output.status.success() {
      return Ok(None);
    }
    let branch = String::from_utf8_lossy(&output.stdout).trim().to_string();
    Ok(Some(branch).filter(|b| !b.is_empty()))
  }

  /// Whether the repository has at least one commit
  pub fn has_head(&self) -> ReleaseResult<bool> {
    Ok(self.run(["rev-parse", "--verify", "-q", "HEAD"])?.status.success())
  }

  /// Absolute path of the `.git` directory
  pub fn git_dir(&self) -> ReleaseResult<PathBuf> {
    let out = self.run_checked(["rev-parse", "--absolute-git-dir"])?;
    Ok(PathBuf::from(out.trim()))
  }

  /// Whether `path` (relative to the package directory) is in the index
  pub fn is_tracked(&self, path: &str) -> ReleaseResult<bool> {
    let out = self.run_checked(["ls-files", "--", path])?;
    Ok(!out.trim().is_empty())
  }

  /// Read a git config value, `None` when unset
  pub fn config_get(&self, key: &str) -> ReleaseResult<Option<String>> {
    let output = self.run(["config", "--get", key])?;
    if !output.status.success() {
      return Ok(None);
    }
    let value = String::from_utf8_lossy(&output.stdout).trim().to_string();
    Ok(Some(value).filter(|v| !v.is_empty()))
  }

  /// Run git and return raw output; only spawn failures are errors
  pub(crate) fn run<I, S>(&self, args: I) -> ReleaseResult<Output>
  where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
  {
    let mut cmd = self.git_cmd();
    cmd.args(args);
    debug!(command = ?cmd, "Running git");
    cmd.output().map_err(|e| match e.kind() {
      io::ErrorKind::NotFound => ReleaseError::ToolNotFound { tool: "git".to_string() },
      _ => ReleaseError::Io(e),
    })
  }

  /// Run git and return stdout; non-zero exit becomes [`ReleaseError::Git`]
  pub(crate) fn run_checked<I, S>(&self, args: I) -> ReleaseResult<String>
  where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
  {
    let args: Vec<_> = args.into_iter().map(|a| a.as_ref().to_os_string()).collect();
    let output = self.run(&args)?;
    if !output.status.success() {
      return Err(ReleaseError::Git {
        command: describe(&args),
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
      });
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
  }

  /// Create a git command with isolated environment
  ///
  /// - Sets working directory to the package directory
  /// - Clears environment variables, then restores the whitelisted ones
  /// - Adds configuration overrides for stable output
  pub(crate) fn git_cmd(&self) -> Command {
    let mut cmd = Command::new("git");

    cmd.arg("-C").arg(&self.work_dir);
    cmd.arg("--literal-pathspecs");

    cmd.env_clear();
    cmd.envs(self.env.iter().map(|(k, v)| (k, v)));
    cmd.env("LC_ALL", "C");

    cmd.arg("-c").arg("core.quotePath=false");
    cmd.arg("-c").arg("advice.detachedHead=false");

    cmd
  }
}

pub(crate) fn describe<S: AsRef<OsStr>>(args: &[S]) -> String {
  let mut line = String::from("git");
  for arg in args {
    line.push(' ');
    line.push_str(&arg.as_ref().to_string_lossy());
  }
  line
}
