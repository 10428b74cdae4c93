use std::path::PathBuf;

use crate::config::ExtractConfig;
use crate::error::{PipelineError, Result};
use crate::models::{BoundingBox, VariableDescriptor, VariableRegistry};
use crate::pipelines::reported;
use crate::readers::{BoundaryReader, Dataset};
use crate::toolbox::{ClimateDataStore, DownloadRequest};
use crate::utils::reporter::RunReporter;

/// Downloads raw ERA5 extracts covering a boundaries collection.
pub struct ExtractionDriver<'a, C: ClimateDataStore> {
    store: &'a C,
    registry: &'a VariableRegistry,
    reporter: &'a dyn RunReporter,
    boundary_reader: BoundaryReader,
}

impl<'a, C: ClimateDataStore> ExtractionDriver<'a, C> {
    pub fn new(store: &'a C, registry: &'a VariableRegistry, reporter: &'a dyn RunReporter) -> Self {
        Self {
            store,
            registry,
            reporter,
            boundary_reader: BoundaryReader::new(),
        }
    }

    /// Variables named explicitly (label or key) followed by toggled ones,
    /// without duplicates.
    pub fn resolve_variables(&self, config: &ExtractConfig) -> Result<Vec<&'a VariableDescriptor>> {
        let mut selected: Vec<&'a VariableDescriptor> = Vec::new();

        for name in &config.variables {
            let variable = reported(self.reporter, self.registry.resolve(name))?;
            if !selected.iter().any(|v| v.key == variable.key) {
                selected.push(variable);
            }
        }

        if !config.toggles.enabled_keys().is_empty() {
            for variable in reported(self.reporter, self.registry.from_toggles(&config.toggles))? {
                if !selected.iter().any(|v| v.key == variable.key) {
                    selected.push(variable);
                }
            }
        }

        if selected.is_empty() {
            return reported(
                self.reporter,
                Err(PipelineError::Config(
                    "No variable selected for download".to_string(),
                )),
            );
        }

        Ok(selected)
    }

    /// Download every selected variable into `<output_dir>/<key>`.
    ///
    /// Returns the per-variable directories in download order.
    pub async fn run<D: Dataset>(&self, config: &ExtractConfig, dataset: &D) -> Result<Vec<PathBuf>> {
        reported(self.reporter, config.check())?;

        let variables = self.resolve_variables(config)?;

        let boundaries = reported(
            self.reporter,
            self.boundary_reader
                .read_boundaries(dataset, config.boundaries_file.as_deref()),
        )?;
        let area = reported(self.reporter, BoundingBox::from_boundaries(&boundaries))?;
        self.reporter.info(&format!(
            "Bounding box of {} boundaries from {}: {}",
            boundaries.len(),
            boundaries.source(),
            area
        ));

        let end = match config.end_date {
            Some(end) => end,
            None => {
                let today = config.end_date_or_today();
                self.reporter
                    .info(&format!("No end date given, using today ({})", today));
                today
            }
        };

        reported(
            self.reporter,
            std::fs::create_dir_all(&config.output_dir).map_err(PipelineError::from),
        )?;

        let mut directories = Vec::with_capacity(variables.len());
        for variable in variables {
            let dst_dir = config.output_dir.join(variable.key);
            reported(
                self.reporter,
                std::fs::create_dir_all(&dst_dir).map_err(PipelineError::from),
            )?;

            self.reporter.info(&format!(
                "Downloading {} ({}) from {} to {}",
                variable.label, variable.key, config.start_date, end
            ));

            let request = DownloadRequest {
                variable: variable.key.to_string(),
                start: config.start_date,
                end,
                dst_dir: dst_dir.clone(),
                area,
                hours: config.hours.clone(),
            };
            reported(self.reporter, self.store.download_between(&request).await)?;

            self.reporter
                .info(&format!("Finished {} into {}", variable.key, dst_dir.display()));
            self.reporter.variable_done(variable.key);
            directories.push(dst_dir);
        }

        Ok(directories)
    }
}
