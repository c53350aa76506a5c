//! Progress bar for the per-package phases

use linya::{Bar, Progress};
use std::io::IsTerminal;

/// Bar on stderr counting packages through a phase
pub struct PackageProgress {
  progress: Progress,
  bar: Bar,
}

impl PackageProgress {
  /// A bar for `total` packages, or `None` when it would only add noise
  /// (a single package, or stderr is not a terminal)
  pub fn on_terminal(total: usize, phase: &str) -> Option<Self> {
    if total < 2 || !std::io::stderr().is_terminal() {
      return None;
    }
    let mut progress = Progress::new();
    let bar = progress.bar(total, format!("{} {} packages", phase, total));
    Some(Self { progress, bar })
  }

  pub fn advance(&mut self) {
    self.progress.inc_and_draw(&self.bar, 1);
  }
}
