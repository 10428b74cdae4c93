use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::utils::progress::ProgressReporter;

/// Sink for run-level messages and produced files.
///
/// Pipelines receive a reporter by reference instead of logging to a global
/// run object, so callers decide where messages and outputs end up.
pub trait RunReporter {
    fn info(&self, message: &str);
    fn warning(&self, message: &str);
    fn error(&self, message: &str);
    fn add_file_output(&self, path: &Path);

    /// Called once per processed variable.
    fn variable_done(&self, _variable: &str) {}
}

/// Reporter forwarding messages to `tracing` and keeping a list of outputs.
#[derive(Default)]
pub struct TracingReporter {
    outputs: Mutex<Vec<PathBuf>>,
    progress: Option<ProgressReporter>,
}

impl TracingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_progress(mut self, progress: ProgressReporter) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn outputs(&self) -> Vec<PathBuf> {
        self.outputs
            .lock()
            .map(|outputs| outputs.clone())
            .unwrap_or_default()
    }

    pub fn finish(&self, message: &str) {
        if let Some(ref progress) = self.progress {
            progress.finish_with_message(message);
        }
    }
}

impl RunReporter for TracingReporter {
    fn info(&self, message: &str) {
        tracing::info!("{}", message);
        if let Some(ref progress) = self.progress {
            progress.set_message(message);
        }
    }

    fn warning(&self, message: &str) {
        tracing::warn!("{}", message);
    }

    fn error(&self, message: &str) {
        tracing::error!("{}", message);
    }

    fn add_file_output(&self, path: &Path) {
        tracing::debug!(path = %path.display(), "registered output");
        if let Ok(mut outputs) = self.outputs.lock() {
            outputs.push(path.to_path_buf());
        }
    }

    fn variable_done(&self, _variable: &str) {
        if let Some(ref progress) = self.progress {
            progress.increment(1);
        }
    }
}

/// Reporter that keeps every message in memory.
#[derive(Debug, Default)]
pub struct MemoryReporter {
    entries: Mutex<Vec<(LogLevel, String)>>,
    outputs: Mutex<Vec<PathBuf>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warning,
    Error,
}

impl MemoryReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self, level: LogLevel) -> Vec<String> {
        self.entries
            .lock()
            .map(|entries| {
                entries
                    .iter()
                    .filter(|(l, _)| *l == level)
                    .map(|(_, m)| m.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn outputs(&self) -> Vec<PathBuf> {
        self.outputs
            .lock()
            .map(|outputs| outputs.clone())
            .unwrap_or_default()
    }

    fn push(&self, level: LogLevel, message: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.push((level, message.to_string()));
        }
    }
}

impl RunReporter for MemoryReporter {
    fn info(&self, message: &str) {
        self.push(LogLevel::Info, message);
    }

    fn warning(&self, message: &str) {
        self.push(LogLevel::Warning, message);
    }

    fn error(&self, message: &str) {
        self.push(LogLevel::Error, message);
    }

    fn add_file_output(&self, path: &Path) {
        if let Ok(mut outputs) = self.outputs.lock() {
            outputs.push(path.to_path_buf());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_reporter_separates_levels() {
        let reporter = MemoryReporter::new();
        reporter.info("started");
        reporter.error("boom");
        reporter.add_file_output(Path::new("out/a.parquet"));

        assert_eq!(reporter.messages(LogLevel::Info), vec!["started"]);
        assert_eq!(reporter.messages(LogLevel::Error), vec!["boom"]);
        assert!(reporter.messages(LogLevel::Warning).is_empty());
        assert_eq!(reporter.outputs(), vec![PathBuf::from("out/a.parquet")]);
    }

    #[test]
    fn test_tracing_reporter_collects_outputs() {
        let reporter = TracingReporter::new();
        reporter.info("no subscriber installed");
        reporter.add_file_output(Path::new("x.parquet"));
        assert_eq!(reporter.outputs().len(), 1);
    }
}
