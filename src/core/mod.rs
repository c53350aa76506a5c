//! Core building blocks shared by the release phases
//!
//! - **config**: `pkg-release.toml`, makepkg.conf and environment loading
//! - **context**: Settings and descriptor built once per run
//! - **error**: Error types with contextual help messages
//! - **tools**: External tool invocation (gpg, rsync, ssh, bsdtar)
//! - **vcs**: Git operations (SystemGit)

pub mod config;
pub mod context;
pub mod error;
pub mod tools;
pub mod vcs;
