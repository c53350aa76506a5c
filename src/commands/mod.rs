//! CLI commands for pkg-release
//!
//! - **release**: Run the release pipeline for one package directory
//!
//! Commands accept `&ReleaseContext` so configuration and the PKGBUILD are
//! loaded once.

pub mod release;

pub use release::run_release;
