pub mod pipeline;
pub mod settings;

pub use pipeline::{AggregateConfig, ExtractConfig, ImportConfig, ImportMode};
pub use settings::{CdsSettings, Dhis2Settings, Settings, ToolboxSettings, WorkspaceSettings};
