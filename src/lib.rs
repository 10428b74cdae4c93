pub mod cli;
pub mod config;
pub mod dhis2;
pub mod error;
pub mod models;
pub mod pipelines;
pub mod processors;
pub mod readers;
pub mod toolbox;
pub mod utils;
pub mod writers;

pub use error::{PipelineError, Result};
