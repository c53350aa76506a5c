//! Error types for pkg-release with contextual messages and exit codes
//!
//! Fatal conditions are [`ReleaseError`] variants; every variant belongs to one
//! [`ErrorClass`] which decides the process exit code. Non-fatal conditions are
//! [`Advisory`] values that the pipeline collects and reports as warnings.

use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Exit codes for pkg-release
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
  /// User error (missing descriptor, wrong branch, config, editor)
  User = 1,
  /// System error (git, gpg, rsync, ssh returning non-zero, I/O)
  System = 2,
  /// Consistency guard tripped (diverged history, invalid signature)
  Validation = 3,
}

impl ExitCode {
  /// Convert to i32 for process exit
  pub fn as_i32(self) -> i32 {
    self as i32
  }
}

/// Category of a fatal error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
  /// Reported before any mutation; cheapest to fix
  Precondition,
  /// Editor resolution or composed message problems
  Interactive,
  /// An external tool exited non-zero
  ExternalTool,
  /// A guard that prevents history loss or unverifiable artifacts
  ConsistencyGuard,
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
  #[error("Missing required configuration field: {field}")]
  MissingField { field: String },

  #[error("Failed to parse config {}: {message}", path.display())]
  Parse { path: PathBuf, message: String },
}

/// Main error type for pkg-release
#[derive(Error, Debug)]
pub enum ReleaseError {
  #[error("No PKGBUILD found in {}", dir.display())]
  DescriptorMissing { dir: PathBuf },

  #[error("Failed to read {}: {reason}", path.display())]
  DescriptorUnreadable { path: PathBuf, reason: String },

  #[error("HEAD is detached; releases must be made from a named branch")]
  DetachedHead,

  #[error("On branch '{current}', but releases are made from '{expected}'")]
  WrongBranch { current: String, expected: String },

  #[error("{} exists but is not tracked by git", path.display())]
  UntrackedRequiredFile { path: PathBuf },

  #[error("Failed to export public key {fingerprint}: {reason}")]
  KeyExportFailed { fingerprint: String, reason: String },

  #[error("git commit failed: {stderr}")]
  CommitFailed { stderr: String },

  #[error("No editor available to compose the commit message")]
  NoEditorAvailable,

  #[error("Editor '{editor}' exited with {status}")]
  EditorFailed { editor: String, status: String },

  #[error("Aborting commit due to empty commit message")]
  EmptyCommitMessage,

  #[error("Branch '{branch}' has no upstream branch configured")]
  NoUpstream { branch: String },

  #[error("Failed to fetch from '{remote}': {stderr}")]
  FetchFailed { remote: String, stderr: String },

  #[error("'{upstream}' has commits that '{branch}' does not contain")]
  DivergedHistory { branch: String, upstream: String },

  #[error("Push to {remote}/{branch} failed: {stderr}")]
  PushFailed {
    remote: String,
    branch: String,
    stderr: String,
  },

  #[error("Failed to sign {}: {stderr}", artifact.display())]
  SigningFailed { artifact: PathBuf, stderr: String },

  #[error("Signature {} does not verify against {}", signature.display(), artifact.display())]
  InvalidSignature { artifact: PathBuf, signature: PathBuf },

  #[error("Upload to {destination} failed: {stderr}")]
  UploadFailed { destination: String, stderr: String },

  #[error("Remote database update on {host} failed: {stderr}")]
  RemoteDatabaseUpdateFailed { host: String, stderr: String },

  #[error("Required tool '{tool}' was not found on PATH")]
  ToolNotFound { tool: String },

  #[error("Configuration error: {0}")]
  Config(#[from] ConfigError),

  #[error("Git command failed: {command}\n{stderr}")]
  Git { command: String, stderr: String },

  #[error("I/O error: {0}")]
  Io(#[from] io::Error),

  #[error("{context}: {source}")]
  IoContext { context: String, source: io::Error },

  #[error("{message}")]
  Message { message: String },
}

impl ReleaseError {
  /// Create a simple error message
  pub fn message(msg: impl Into<String>) -> Self {
    ReleaseError::Message { message: msg.into() }
  }

  /// Which taxonomy bucket this error belongs to
  pub fn class(&self) -> ErrorClass {
    match self {
      ReleaseError::DescriptorMissing { .. }
      | ReleaseError::DescriptorUnreadable { .. }
      | ReleaseError::DetachedHead
      | ReleaseError::WrongBranch { .. }
      | ReleaseError::UntrackedRequiredFile { .. }
      | ReleaseError::NoUpstream { .. }
      | ReleaseError::ToolNotFound { .. }
      | ReleaseError::Config(_)
      | ReleaseError::Message { .. } => ErrorClass::Precondition,
      ReleaseError::NoEditorAvailable | ReleaseError::EditorFailed { .. } | ReleaseError::EmptyCommitMessage => {
        ErrorClass::Interactive
      }
      ReleaseError::DivergedHistory { .. } | ReleaseError::InvalidSignature { .. } => ErrorClass::ConsistencyGuard,
      ReleaseError::KeyExportFailed { .. }
      | ReleaseError::CommitFailed { .. }
      | ReleaseError::FetchFailed { .. }
      | ReleaseError::PushFailed { .. }
      | ReleaseError::SigningFailed { .. }
      | ReleaseError::UploadFailed { .. }
      | ReleaseError::RemoteDatabaseUpdateFailed { .. }
      | ReleaseError::Git { .. }
      | ReleaseError::Io(_)
      | ReleaseError::IoContext { .. } => ErrorClass::ExternalTool,
    }
  }

  /// Get the appropriate exit code for this error
  pub fn exit_code(&self) -> ExitCode {
    match self.class() {
      ErrorClass::Precondition | ErrorClass::Interactive => ExitCode::User,
      ErrorClass::ExternalTool => ExitCode::System,
      ErrorClass::ConsistencyGuard => ExitCode::Validation,
    }
  }

  /// Get contextual help message for this error
  pub fn help_message(&self) -> Option<String> {
    match self {
      ReleaseError::DescriptorMissing { .. } => Some("Run pkg-release from a package directory or pass -C <dir>.".to_string()),
      ReleaseError::WrongBranch { expected, .. } => Some(format!("Check out '{}' before releasing.", expected)),
      ReleaseError::DetachedHead => Some("Check out the release branch first.".to_string()),
      ReleaseError::UntrackedRequiredFile { path } => Some(format!(
        "Track it with `git add {}` so the release is reproducible.",
        path.display()
      )),
      ReleaseError::NoEditorAvailable => {
        Some("Pass a commit note, or set PKG_RELEASE_EDITOR, core.editor, VISUAL or EDITOR.".to_string())
      }
      ReleaseError::NoUpstream { branch } => Some(format!(
        "Set one with `git branch --set-upstream-to=<remote>/{} {}`.",
        branch, branch
      )),
      ReleaseError::DivergedHistory { upstream, .. } => {
        Some(format!("Rebase onto '{}' first, then run the release again.", upstream))
      }
      ReleaseError::InvalidSignature { signature, .. } => Some(format!(
        "Remove {} to have it recreated, or check the signing key.",
        signature.display()
      )),
      ReleaseError::PushFailed { stderr, .. } if stderr.contains("non-fast-forward") => {
        Some("The remote has commits you don't have. Rebase before pushing.".to_string())
      }
      ReleaseError::RemoteDatabaseUpdateFailed { .. } => {
        Some("The packages were uploaded but not registered; rerun the database command on the host.".to_string())
      }
      ReleaseError::ToolNotFound { tool } => Some(format!(
        "Install {} or point {}_BIN at it.",
        tool,
        tool.to_uppercase()
      )),
      _ => None,
    }
  }

  /// Add context to an existing error
  pub fn context(self, ctx: impl Into<String>) -> Self {
    match self {
      ReleaseError::Message { message } => ReleaseError::Message {
        message: format!("{}\n{}", ctx.into(), message),
      },
      ReleaseError::Io(source) => ReleaseError::IoContext {
        context: ctx.into(),
        source,
      },
      other => other,
    }
  }
}

/// Result type alias for pkg-release
pub type ReleaseResult<T> = Result<T, ReleaseError>;

/// Helper trait to add context to Results
pub trait ResultExt<T> {
  /// Add context to an error result
  fn context(self, ctx: impl Into<String>) -> ReleaseResult<T>;

  /// Add context using a closure (lazy evaluation)
  fn with_context<F>(self, f: F) -> ReleaseResult<T>
  where
    F: FnOnce() -> String;
}

impl<T, E> ResultExt<T> for Result<T, E>
where
  E: Into<ReleaseError>,
{
  fn context(self, ctx: impl Into<String>) -> ReleaseResult<T> {
    self.map_err(|e| e.into().context(ctx))
  }

  fn with_context<F>(self, f: F) -> ReleaseResult<T>
  where
    F: FnOnce() -> String,
  {
    self.map_err(|e| e.into().context(f()))
  }
}

/// Non-fatal conditions; the pipeline logs them and keeps going
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Advisory {
  /// `--push` without commit creation
  PushWithoutCommit,
  /// `--upload` was not requested, signed packages stay local
  UploadNotRequested,
  /// A declared package has no built artifact in the cache
  ArtifactNotFound { pkgname: String, version: String, arch: String },
  /// A declared signing key is not in the local keyring
  UnknownSigningKey { fingerprint: String },
  /// Upload requested but nothing was found to upload
  NothingToUpload,
}

impl fmt::Display for Advisory {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Advisory::PushWithoutCommit => write!(f, "--push requires commit creation; skipping push"),
      Advisory::UploadNotRequested => write!(f, "packages were signed but --upload was not requested"),
      Advisory::ArtifactNotFound { pkgname, version, arch } => {
        write!(f, "no built package for {} {} ({}); skipping", pkgname, version, arch)
      }
      Advisory::UnknownSigningKey { fingerprint } => {
        write!(f, "validpgpkeys entry {} is not in the local keyring", fingerprint)
      }
      Advisory::NothingToUpload => write!(f, "no packages found to upload"),
    }
  }
}

/// Pretty-print an error to stderr with help text
pub fn print_error(error: &ReleaseError) {
  eprintln!("\n❌ {}\n", error);

  if let Some(help) = error.help_message() {
    eprintln!("💡 Help: {}\n", help);
  }
}
