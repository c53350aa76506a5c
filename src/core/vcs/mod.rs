pub mod system_git;
mod system_git_ops;

pub use system_git::SystemGit;

/// How a tracked path differs from `HEAD`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
  Added,
  Modified,
  Deleted,
  TypeChanged,
  Other(char),
}

impl ChangeKind {
  pub fn from_status(status: &str) -> Self {
    match status.chars().next() {
      Some('A') => ChangeKind::Added,
      Some('M') => ChangeKind::Modified,
      Some('D') => ChangeKind::Deleted,
      Some('T') => ChangeKind::TypeChanged,
      Some(c) => ChangeKind::Other(c),
      None => ChangeKind::Other('?'),
    }
  }
}

/// One entry of `git diff-index --name-status`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingChange {
  pub kind: ChangeKind,
  /// Relative to the package directory
  pub path: String,
}

/// The remote branch the current branch tracks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upstream {
  pub remote: String,
  /// Branch name on the remote
  pub branch: String,
  /// Full remote-tracking ref (`refs/remotes/origin/master`)
  pub tracking_ref: String,
}

impl Upstream {
  /// `origin/master` form for messages
  pub fn short_name(&self) -> &str {
    self.tracking_ref.strip_prefix("refs/remotes/").unwrap_or(&self.tracking_ref)
  }
}
