//! External tool invocation
//!
//! gpg, rsync, ssh and bsdtar are reached through the [`CommandRunner`] seam so
//! the release phases can be exercised with a recording stub. Tool paths come
//! from the `{TOOL}_BIN` overrides captured in [`Environment`] and fall back to
//! PATH lookup.
//!
//! [`Environment`]: crate::core::config::Environment

use crate::core::error::{ReleaseError, ReleaseResult};
use std::ffi::{OsStr, OsString};
use std::io;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use tracing::debug;

/// A single external command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
  pub program: String,
  pub args: Vec<OsString>,
  /// Inherit the terminal instead of capturing output
  pub interactive: bool,
}

impl Invocation {
  pub fn new(program: impl Into<String>) -> Self {
    Self {
      program: program.into(),
      args: Vec::new(),
      interactive: false,
    }
  }

  pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
    self.args.push(arg.as_ref().to_os_string());
    self
  }

  pub fn args<I, S>(mut self, args: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
  {
    self.args.extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
    self
  }

  pub fn interactive(mut self) -> Self {
    self.interactive = true;
    self
  }

  /// Human-readable command line for logs and errors
  pub fn display(&self) -> String {
    let mut line = self.program.clone();
    for arg in &self.args {
      line.push(' ');
      line.push_str(&arg.to_string_lossy());
    }
    line
  }

  #[cfg(test)]
  pub fn arg_strings(&self) -> Vec<String> {
    self.args.iter().map(|a| a.to_string_lossy().into_owned()).collect()
  }
}

/// Result of running an [`Invocation`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
  pub success: bool,
  pub status: String,
  pub stdout: Vec<u8>,
  pub stderr: String,
}

impl ToolOutput {
  pub fn stdout_text(&self) -> String {
    String::from_utf8_lossy(&self.stdout).into_owned()
  }
}

/// Abstraction for running external commands
pub trait CommandRunner {
  /// Run to completion; a non-zero exit is reported in the output, not as an error
  fn run(&self, invocation: &Invocation) -> ReleaseResult<ToolOutput>;
}

/// Runs commands on the host system
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
  fn run(&self, invocation: &Invocation) -> ReleaseResult<ToolOutput> {
    debug!(command = %invocation.display(), "Running external tool");

    let mut cmd = Command::new(&invocation.program);
    cmd.args(&invocation.args);

    let spawn_error = |e: io::Error| match e.kind() {
      io::ErrorKind::NotFound => ReleaseError::ToolNotFound {
        tool: invocation.program.clone(),
      },
      _ => ReleaseError::message(format!("Failed to run {}: {}", invocation.program, e)),
    };

    if invocation.interactive {
      let status = cmd
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .status()
        .map_err(spawn_error)?;
      return Ok(ToolOutput {
        success: status.success(),
        status: status.to_string(),
        ..ToolOutput::default()
      });
    }

    let output = cmd.stdin(Stdio::null()).output().map_err(spawn_error)?;
    let result = ToolOutput {
      success: output.status.success(),
      status: output.status.to_string(),
      stdout: output.stdout,
      stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
    };
    if !result.success {
      debug!(command = %invocation.display(), status = %result.status, stderr = %result.stderr, "Tool failed");
    }
    Ok(result)
  }
}

/// Resolve a tool from its `{TOOL}_BIN` override, falling back to the bare name
pub fn get_tool_path(tool: &str, override_value: Option<&str>) -> String {
  match override_value {
    Some(path) if !path.trim().is_empty() => path.to_string(),
    _ => tool.to_string(),
  }
}

/// Name of the override variable for a tool (`gpg` → `GPG_BIN`)
pub fn tool_env_var(tool: &str) -> String {
  format!("{}_BIN", tool.to_uppercase())
}

/// Fail with [`ReleaseError::ToolNotFound`] unless `program` is executable
pub fn require_tool(program: &str) -> ReleaseResult<PathBuf> {
  which::which(program).map_err(|_| ReleaseError::ToolNotFound {
    tool: program.to_string(),
  })
}
