//! Push with a fast-forward guard

use crate::core::error::{ReleaseError, ReleaseResult};
use crate::core::vcs::{SystemGit, Upstream};
use tracing::{debug, info};

/// Fetch the upstream, refuse to push over commits we don't have, then push
pub fn push_release(git: &SystemGit, branch: &str) -> ReleaseResult<Upstream> {
  let upstream = git.upstream(branch)?.ok_or_else(|| ReleaseError::NoUpstream {
    branch: branch.to_string(),
  })?;

  info!(remote = %upstream.remote, "Fetching upstream");
  git.fetch_prune(&upstream.remote)?;

  if git.resolves(&upstream.tracking_ref)? {
    if !git.is_ancestor_of_head(&upstream.tracking_ref)? {
      return Err(ReleaseError::DivergedHistory {
        branch: branch.to_string(),
        upstream: upstream.short_name().to_string(),
      });
    }
  } else {
    // first push of this branch
    debug!(tracking_ref = %upstream.tracking_ref, "Upstream ref not present locally");
  }

  git.push_atomic(&upstream.remote, branch, &upstream.branch)?;
  Ok(upstream)
}
