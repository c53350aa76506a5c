//! Release phases and the pipeline that runs them

pub mod artifacts;
pub mod editor;
pub mod gate;
pub mod pipeline;
pub mod push;
pub mod sign;
pub mod stage;
pub mod upload;

pub use pipeline::{Pipeline, ReleaseOptions, ReleaseReport};
pub use stage::CommitOutcome;
