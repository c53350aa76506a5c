//! Interactive commit message composition

use crate::core::config::EditorSettings;
use crate::core::error::{ReleaseError, ReleaseResult};
use crate::core::tools::{CommandRunner, Invocation};
use crate::core::vcs::SystemGit;
use std::fs;
use std::io::Write;
use tempfile::NamedTempFile;
use tracing::debug;

/// Prefix of the scratch message file inside the git directory
pub const SCRATCH_PREFIX: &str = "PKG_RELEASE_EDITMSG";

/// First editor set in `PKG_RELEASE_EDITOR`, `core.editor`, `VISUAL`, `EDITOR`
pub fn pick_editor(settings: &EditorSettings, core_editor: Option<String>) -> Option<String> {
  settings
    .release_override
    .clone()
    .or(core_editor)
    .or_else(|| settings.visual.clone())
    .or_else(|| settings.editor.clone())
    .filter(|e| !e.trim().is_empty())
}

/// Resolve the editor, asking git for `core.editor` only when needed
pub fn resolve_editor(settings: &EditorSettings, git: &SystemGit) -> ReleaseResult<String> {
  let core_editor = match settings.release_override {
    Some(_) => None,
    None => git.config_get("core.editor")?,
  };
  pick_editor(settings, core_editor).ok_or(ReleaseError::NoEditorAvailable)
}

/// Drop `#` comment lines and surrounding blank lines
pub fn strip_comments(text: &str) -> String {
  let kept: Vec<&str> = text
    .lines()
    .filter(|line| !line.starts_with('#'))
    .map(str::trim_end)
    .collect();
  kept.join("\n").trim().to_string()
}

/// A message file the editor has filled in
///
/// The file is removed when this value is dropped, on every exit path.
pub struct ComposedMessage {
  file: NamedTempFile,
  pub message: String,
}

impl ComposedMessage {
  pub fn path(&self) -> &std::path::Path {
    self.file.path()
  }
}

/// Write `template` to a scratch file in the git directory and open it in the editor
pub fn compose(
  git: &SystemGit,
  runner: &dyn CommandRunner,
  editor: &str,
  template: &str,
) -> ReleaseResult<ComposedMessage> {
  let git_dir = git.git_dir()?;
  let mut file = tempfile::Builder::new().prefix(SCRATCH_PREFIX).tempfile_in(&git_dir)?;
  file.write_all(template.as_bytes())?;
  file.flush()?;

  let path = file.path().to_path_buf();
  debug!(editor, path = %path.display(), "Opening editor");

  let invocation = Invocation::new("sh")
    .arg("-c")
    .arg(format!("{} \"$@\"", editor))
    .arg(editor)
    .arg(&path)
    .interactive();
  let output = runner.run(&invocation)?;
  if !output.success {
    return Err(ReleaseError::EditorFailed {
      editor: editor.to_string(),
      status: output.status,
    });
  }

  let message = strip_comments(&fs::read_to_string(&path)?);
  if message.is_empty() {
    return Err(ReleaseError::EmptyCommitMessage);
  }

  Ok(ComposedMessage { file, message })
}

/// Editor template: the subject line followed by commented-out context
pub fn template(subject: &str, changes: &[String]) -> String {
  let mut text = format!("{}\n\n", subject);
  text.push_str("# Please enter the commit message for the release. Lines starting\n");
  text.push_str("# with '#' will be ignored, and an empty message aborts the commit.\n");
  if !changes.is_empty() {
    text.push_str("#\n# Changes to be committed:\n");
    for change in changes {
      text.push_str(&format!("#\t{}\n", change));
    }
  }
  text
}
