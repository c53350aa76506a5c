//! Upload to the repository host and registration in its database

use super::sign::UploadSet;
use crate::core::config::{Tools, UploadSection, UploadTarget};
use crate::core::error::{ReleaseError, ReleaseResult, ResultExt};
use crate::core::tools::{CommandRunner, Invocation};
use crate::utils::shell_quote;
use std::path::PathBuf;
use tracing::info;

/// Absolute form of every path; epoch colons would otherwise read as `host:`
pub fn canonicalize_all(set: &UploadSet) -> ReleaseResult<Vec<PathBuf>> {
  set
    .paths()
    .iter()
    .map(|p| p.canonicalize().with_context(|| format!("Failed to resolve {}", p.display())))
    .collect()
}

/// `rsync --perms --chmod=<mask> [options] <files...> <host>:<path>/`
pub fn rsync_invocation(rsync: &str, section: &UploadSection, target: &UploadTarget, files: &[PathBuf]) -> Invocation {
  Invocation::new(rsync)
    .arg("--perms")
    .arg(format!("--chmod={}", section.chmod))
    .args(&section.rsync_options)
    .args(files)
    .arg(destination(target))
}

fn destination(target: &UploadTarget) -> String {
  format!("{}:{}/", target.host, target.path.trim_end_matches('/'))
}

/// Remote path of each uploaded package, signatures excluded
pub fn remote_packages(set: &UploadSet, target: &UploadTarget) -> Vec<String> {
  let dir = target.path.trim_end_matches('/');
  set
    .packages()
    .filter_map(|p| p.file_name())
    .map(|name| format!("{}/{}", dir, name.to_string_lossy()))
    .collect()
}

/// `repo-add <flags> '<db>' '<pkg>'... && <update command>`, every word quoted
pub fn remote_command(section: &UploadSection, target: &UploadTarget, packages: &[String]) -> String {
  let mut words = vec!["repo-add".to_string()];
  words.extend(section.repo_add_flags.iter().map(|f| shell_quote(f)));
  words.push(shell_quote(&format!(
    "{}/{}",
    target.path.trim_end_matches('/'),
    target.database
  )));
  words.extend(packages.iter().map(|p| shell_quote(p)));

  let mut command = words.join(" ");
  let update = section.update_command.trim();
  if !update.is_empty() {
    command.push_str(" && ");
    command.push_str(update);
  }
  command
}

/// Transfer the whole set, then run one database update on the host
///
/// A failed transfer stops before the remote command. A failed remote command
/// leaves the uploaded files in place.
pub fn upload(
  set: &UploadSet,
  section: &UploadSection,
  target: &UploadTarget,
  tools: &Tools,
  runner: &dyn CommandRunner,
) -> ReleaseResult<()> {
  let files = canonicalize_all(set)?;

  info!(files = files.len(), destination = %destination(target), "Uploading");
  let output = runner.run(&rsync_invocation(&tools.rsync, section, target, &files))?;
  if !output.success {
    return Err(ReleaseError::UploadFailed {
      destination: destination(target),
      stderr: output.stderr,
    });
  }

  let command = remote_command(section, target, &remote_packages(set, target));
  info!(host = %target.host, "Updating remote database");
  let output = runner.run(&Invocation::new(&tools.ssh).arg(&target.host).arg(&command))?;
  if !output.success {
    return Err(ReleaseError::RemoteDatabaseUpdateFailed {
      host: target.host.clone(),
      stderr: output.stderr,
    });
  }
  Ok(())
}
