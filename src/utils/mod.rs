pub mod constants;
pub mod filename;
pub mod periods;
pub mod progress;
pub mod reporter;

pub use constants::*;
pub use filename::{aggregate_filename, workspace_path};
pub use progress::ProgressReporter;
pub use reporter::{LogLevel, MemoryReporter, RunReporter, TracingReporter};
