//! Index, commit and remote operations on top of [`SystemGit`]

use super::system_git::{SystemGit, describe};
use super::{ChangeKind, PendingChange, Upstream};
use crate::core::error::{ReleaseError, ReleaseResult};
use std::path::Path;
use tracing::debug;

/// Tree object of an empty repository
const EMPTY_TREE: &str = "4b825dc642cb6eb9a060e54bf8d69288fbee4904";

impl SystemGit {
  /// Tracked paths under the package directory that differ from `HEAD`
  pub fn pending_changes(&self) -> ReleaseResult<Vec<PendingChange>> {
    // stat-only differences would otherwise show up as modifications
    self.run(["update-index", "-q", "--refresh"])?;

    let base = if self.has_head()? { "HEAD" } else { EMPTY_TREE };
    let out = self.run_checked(["diff-index", "--relative", "--name-status", "-z", base])?;
    Ok(parse_name_status(&out))
  }

  /// `git add --force`, staging ignored files too
  pub fn force_add(&self, paths: &[&str]) -> ReleaseResult<()> {
    if paths.is_empty() {
      return Ok(());
    }
    let mut args = vec!["add", "--force", "--"];
    args.extend_from_slice(paths);
    self.run_checked(&args).map(drop)
  }

  /// Stage modifications and additions
  pub fn add(&self, paths: &[&str]) -> ReleaseResult<()> {
    if paths.is_empty() {
      return Ok(());
    }
    let mut args = vec!["add", "--"];
    args.extend_from_slice(paths);
    self.run_checked(&args).map(drop)
  }

  /// Remove deleted files from the index
  pub fn remove_cached(&self, paths: &[&str]) -> ReleaseResult<()> {
    if paths.is_empty() {
      return Ok(());
    }
    let mut args = vec!["rm", "--cached", "-q", "--"];
    args.extend_from_slice(paths);
    self.run_checked(&args).map(drop)
  }

  /// Commit the index with a one-line message
  pub fn commit_with_message(&self, message: &str) -> ReleaseResult<()> {
    self.commit(&["commit", "-q", "-m", message])
  }

  /// Commit the index with a message file, dropping `#` comment lines
  pub fn commit_with_file(&self, path: &Path) -> ReleaseResult<()> {
    let path = path.to_string_lossy();
    self.commit(&["commit", "-q", "--cleanup=strip", "-F", &path])
  }

  fn commit(&self, args: &[&str]) -> ReleaseResult<()> {
    let output = self.run(args)?;
    if !output.status.success() {
      let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
      let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
      return Err(ReleaseError::CommitFailed {
        stderr: if stderr.is_empty() { stdout } else { stderr },
      });
    }
    Ok(())
  }

  /// Upstream of `branch`, `None` when not configured
  pub fn upstream(&self, branch: &str) -> ReleaseResult<Option<Upstream>> {
    let output = self.run(["rev-parse", "--symbolic-full-name", &format!("{}@{{upstream}}", branch)])?;
    if !output.status.success() {
      return Ok(None);
    }
    let tracking_ref = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if tracking_ref.is_empty() {
      return Ok(None);
    }

    let Some(remote) = self.config_get(&format!("branch.{}.remote", branch))? else {
      return Ok(None);
    };
    let remote_branch = self
      .config_get(&format!("branch.{}.merge", branch))?
      .map(|merge| merge.trim_start_matches("refs/heads/").to_string())
      .unwrap_or_else(|| branch.to_string());

    Ok(Some(Upstream {
      remote,
      branch: remote_branch,
      tracking_ref,
    }))
  }

  /// Fetch a remote, pruning stale branches and tags
  pub fn fetch_prune(&self, remote: &str) -> ReleaseResult<()> {
    let output = self.run(["fetch", "--prune", "--prune-tags", remote])?;
    if !output.status.success() {
      return Err(ReleaseError::FetchFailed {
        remote: remote.to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
      });
    }
    Ok(())
  }

  /// Whether `reference` names a commit in the local repository
  pub fn resolves(&self, reference: &str) -> ReleaseResult<bool> {
    let rev = format!("{}^{{commit}}", reference);
    Ok(self.run(["rev-parse", "--verify", "-q", &rev])?.status.success())
  }

  /// Whether `ancestor` is reachable from `HEAD`
  pub fn is_ancestor_of_head(&self, ancestor: &str) -> ReleaseResult<bool> {
    let args = ["merge-base", "--is-ancestor", ancestor, "HEAD"];
    let output = self.run(args)?;
    match output.status.code() {
      Some(0) => Ok(true),
      Some(1) => Ok(false),
      _ => Err(ReleaseError::Git {
        command: describe(&args),
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
      }),
    }
  }

  /// Push the branch and its tags in one atomic transaction
  pub fn push_atomic(&self, remote: &str, branch: &str, remote_branch: &str) -> ReleaseResult<()> {
    let refspec = if branch == remote_branch {
      branch.to_string()
    } else {
      format!("{}:{}", branch, remote_branch)
    };
    debug!(remote, refspec = %refspec, "Pushing");
    let output = self.run(["push", "--atomic", "--follow-tags", "--set-upstream", remote, &refspec])?;
    if !output.status.success() {
      return Err(ReleaseError::PushFailed {
        remote: remote.to_string(),
        branch: branch.to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
      });
    }
    Ok(())
  }
}

/// Parse `-z` name-status output: `<status>\0<path>\0`, with two paths for copies and renames
fn parse_name_status(out: &str) -> Vec<PendingChange> {
  let mut fields = out.split('\0').filter(|f| !f.is_empty());
  let mut changes = Vec::new();

  while let Some(status) = fields.next() {
    let kind = ChangeKind::from_status(status);
    if matches!(kind, ChangeKind::Other('R' | 'C')) {
      // source path, then destination
      fields.next();
    }
    let Some(path) = fields.next() else {
      break;
    };
    changes.push(PendingChange {
      kind,
      path: path.to_string(),
    });
  }

  changes
}
