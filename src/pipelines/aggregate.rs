use std::path::{Path, PathBuf};

use crate::config::AggregateConfig;
use crate::error::{PipelineError, Result};
use crate::models::{Boundaries, Frequency, VariableDescriptor, VariableRegistry};
use crate::pipelines::reported;
use crate::processors::{TemporalAggregator, ZonalAggregator};
use crate::readers::{BoundaryReader, Dataset, RawExtractTree};
use crate::toolbox::RasterToolbox;
use crate::utils::filename::aggregate_filename;
use crate::utils::reporter::RunReporter;
use crate::writers::ParquetWriter;

/// Turns raw extracts into daily, weekly, epi-weekly and monthly tables
/// per boundary.
pub struct AggregationDriver<'a, T: RasterToolbox> {
    toolbox: &'a T,
    registry: &'a VariableRegistry,
    reporter: &'a dyn RunReporter,
    boundary_reader: BoundaryReader,
    zonal: ZonalAggregator,
}

impl<'a, T: RasterToolbox> AggregationDriver<'a, T> {
    pub fn new(toolbox: &'a T, registry: &'a VariableRegistry, reporter: &'a dyn RunReporter) -> Self {
        Self {
            toolbox,
            registry,
            reporter,
            boundary_reader: BoundaryReader::new(),
            zonal: ZonalAggregator::new(),
        }
    }

    /// Aggregate every registry variable found under the input directory.
    ///
    /// Variables run one after the other in name order. The first failure
    /// stops the run unless `continue_on_error` is set, in which case the
    /// failures are collected into [`PipelineError::PartialFailure`].
    pub async fn run<D: Dataset>(&self, config: &AggregateConfig, dataset: &D) -> Result<Vec<PathBuf>> {
        reported(self.reporter, config.check())?;
        let writer = reported(
            self.reporter,
            ParquetWriter::new().with_compression(&config.compression),
        )?;

        let boundaries = reported(
            self.reporter,
            self.boundary_reader
                .read_boundaries(dataset, config.boundaries_file.as_deref()),
        )?;
        let ids = reported(self.reporter, boundaries.ids(&config.boundaries_column_uid))?;
        let skipped = ids.iter().filter(|id| id.is_empty()).count();
        if skipped > 0 {
            self.reporter.warning(&format!(
                "{} boundaries have no {} and are skipped",
                skipped, config.boundaries_column_uid
            ));
        }

        let tree = RawExtractTree::new(&config.input_dir);
        let variables = reported(self.reporter, tree.variables(self.registry))?;
        self.reporter.info(&format!(
            "Aggregating {} variable(s) over {} boundaries",
            variables.len(),
            boundaries.len()
        ));

        let mut outputs = Vec::new();
        let mut failures = Vec::new();
        for key in &variables {
            let variable = reported(self.reporter, self.registry.by_key(key))?;
            let result = self
                .aggregate_variable(variable, &boundaries, &ids, &tree, &writer, &config.output_dir)
                .await;

            match result {
                Ok(paths) => {
                    outputs.extend(paths);
                    self.reporter.variable_done(variable.key);
                }
                Err(e) => {
                    self.reporter
                        .error(&format!("Failed to aggregate {}: {}", variable.key, e));
                    if !config.continue_on_error {
                        return Err(e);
                    }
                    failures.push((variable.key.to_string(), e.to_string()));
                }
            }
        }

        if failures.is_empty() {
            Ok(outputs)
        } else {
            Err(PipelineError::PartialFailure { failures })
        }
    }

    /// Aggregate a single variable and write its four tables.
    pub async fn aggregate_variable(
        &self,
        variable: &VariableDescriptor,
        boundaries: &Boundaries,
        ids: &[String],
        tree: &RawExtractTree,
        writer: &ParquetWriter,
        output_root: &Path,
    ) -> Result<Vec<PathBuf>> {
        self.reporter
            .info(&format!("Processing {} ({})", variable.label, variable.key));

        let raw_file = tree.first_raw_file(variable.key)?;
        let grid = self.toolbox.grid_metadata(&raw_file).await?;
        tracing::debug!(
            variable = variable.key,
            ncols = grid.ncols,
            nrows = grid.nrows,
            "grid metadata"
        );

        let stack = self.toolbox.merge(&tree.variable_dir(variable.key)).await?;
        if stack.ncols != grid.ncols || stack.nrows != grid.nrows {
            return Err(PipelineError::InvalidFormat(format!(
                "merged {} grid is {}x{}, raw file is {}x{}",
                variable.key, stack.nrows, stack.ncols, grid.nrows, grid.ncols
            )));
        }

        let masks = self.toolbox.build_masks(boundaries, &grid).await?;
        let mut daily = self.zonal.aggregate(&stack, &masks, ids)?;

        if let Some(conversion) = variable.conversion {
            for record in &mut daily {
                record.convert(conversion);
            }
            tracing::debug!(
                variable = variable.key,
                units = conversion.target_units(),
                "converted daily statistics"
            );
        }

        let mut written = Vec::with_capacity(Frequency::ALL.len());

        let path = aggregate_filename(output_root, variable.key, Frequency::Daily);
        writer.write_daily(&daily, &path)?;
        self.register(&path, &mut written);

        let temporal = TemporalAggregator::new(variable.aggregation);
        for frequency in [Frequency::Weekly, Frequency::EpiWeekly, Frequency::Monthly] {
            let periods = temporal.resample(&daily, frequency)?;
            let path = aggregate_filename(output_root, variable.key, frequency);
            writer.write_periods(&periods, frequency, &path)?;
            self.register(&path, &mut written);
        }

        self.reporter.info(&format!(
            "{}: {} daily rows written",
            variable.key,
            daily.len()
        ));
        Ok(written)
    }

    fn register(&self, path: &Path, written: &mut Vec<PathBuf>) {
        self.reporter.add_file_output(path);
        written.push(path.to_path_buf());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BoundaryMask, GridFrame, GridMetadata, GridStack};
    use crate::readers::MemoryDataset;
    use crate::utils::reporter::{LogLevel, MemoryReporter};
    use chrono::{TimeZone, Utc};
    use std::fs;
    use tempfile::TempDir;

    /// Two-cell grid holding the same value at two hours of one day.
    struct FixedToolbox {
        value: f64,
    }

    impl RasterToolbox for FixedToolbox {
        async fn grid_metadata(&self, _raw_file: &Path) -> Result<GridMetadata> {
            Ok(GridMetadata {
                ncols: 2,
                nrows: 1,
                transform: [1.0, 0.0, 0.0, 0.0, -1.0, 1.0],
            })
        }

        async fn merge(&self, _input_dir: &Path) -> Result<GridStack> {
            let frame = |hour| GridFrame {
                time: Utc.with_ymd_and_hms(2024, 1, 3, hour, 0, 0).unwrap(),
                values: vec![Some(self.value), None],
            };
            Ok(GridStack {
                ncols: 2,
                nrows: 1,
                frames: vec![frame(0), frame(12)],
            })
        }

        async fn build_masks(
            &self,
            boundaries: &Boundaries,
            _grid: &GridMetadata,
        ) -> Result<Vec<BoundaryMask>> {
            Ok(vec![BoundaryMask(vec![0, 1]); boundaries.len()])
        }
    }

    const DISTRICTS: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {"type": "Feature", "properties": {"district_id": "D1"},
             "geometry": {"type": "Polygon", "coordinates": [[[0, 0], [2, 0], [2, 1], [0, 1], [0, 0]]]}}
        ]
    }"#;

    fn dataset() -> MemoryDataset {
        MemoryDataset::new("districts").with_file("districts.geojson", DISTRICTS)
    }

    fn setup(variables: &[(&str, bool)]) -> (TempDir, AggregateConfig) {
        let dir = TempDir::new().unwrap();
        for (key, populated) in variables {
            let var_dir = dir.path().join("raw").join(key);
            fs::create_dir_all(&var_dir).unwrap();
            if *populated {
                fs::write(var_dir.join("2024_01.grib"), b"GRIB").unwrap();
            }
        }

        let mut config = AggregateConfig::new("district_id");
        config.input_dir = dir.path().join("raw");
        config.output_dir = dir.path().join("aggregate");
        config.boundaries_file = Some("districts.geojson".to_string());
        (dir, config)
    }

    #[tokio::test]
    async fn test_kelvin_persisted_as_celsius() {
        let (_dir, config) = setup(&[("2m_temperature", true)]);
        let toolbox = FixedToolbox { value: 300.0 };
        let registry = VariableRegistry::era5_land();
        let reporter = MemoryReporter::new();

        let outputs = AggregationDriver::new(&toolbox, &registry, &reporter)
            .run(&config, &dataset())
            .await
            .unwrap();
        assert_eq!(outputs.len(), 4);
        assert_eq!(reporter.outputs(), outputs);

        let daily_path = config
            .output_dir
            .join("2m_temperature")
            .join("2m_temperature_daily.parquet");
        let daily = ParquetWriter::new().read_daily(&daily_path).unwrap();
        assert_eq!(daily.len(), 1);
        assert_eq!(daily[0].boundary_id, "D1");
        assert!((daily[0].mean.unwrap() - 26.85).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_metres_persisted_as_millimetres() {
        let (_dir, config) = setup(&[("total_precipitation", true)]);
        let toolbox = FixedToolbox { value: 0.002 };
        let registry = VariableRegistry::era5_land();
        let reporter = MemoryReporter::new();

        AggregationDriver::new(&toolbox, &registry, &reporter)
            .run(&config, &dataset())
            .await
            .unwrap();

        let monthly_path = config
            .output_dir
            .join("total_precipitation")
            .join("total_precipitation_monthly.parquet");
        let monthly = ParquetWriter::new().read_periods(&monthly_path).unwrap();
        assert_eq!(monthly.len(), 1);
        assert_eq!(monthly[0].period, "202401");
        assert!((monthly[0].max.unwrap() - 2.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_empty_variable_directory_is_not_found() {
        let (_dir, config) = setup(&[("2m_temperature", true), ("total_precipitation", false)]);
        let toolbox = FixedToolbox { value: 280.0 };
        let registry = VariableRegistry::era5_land();
        let reporter = MemoryReporter::new();

        let err = AggregationDriver::new(&toolbox, &registry, &reporter)
            .run(&config, &dataset())
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(reporter.outputs().len(), 4);
        assert!(!reporter.messages(LogLevel::Error).is_empty());
    }

    #[tokio::test]
    async fn test_continue_on_error_collects_failures() {
        let (_dir, mut config) = setup(&[("runoff", false), ("total_precipitation", true)]);
        config.continue_on_error = true;
        let toolbox = FixedToolbox { value: 0.001 };
        let registry = VariableRegistry::era5_land();
        let reporter = MemoryReporter::new();

        let err = AggregationDriver::new(&toolbox, &registry, &reporter)
            .run(&config, &dataset())
            .await
            .unwrap_err();
        match err {
            PipelineError::PartialFailure { failures } => {
                assert_eq!(failures.len(), 1);
                assert_eq!(failures[0].0, "runoff");
            }
            other => panic!("unexpected error: {}", other),
        }
        assert!(config
            .output_dir
            .join("total_precipitation")
            .join("total_precipitation_weekly.parquet")
            .exists());
    }

    #[tokio::test]
    async fn test_no_registry_directory() {
        let (_dir, config) = setup(&[("snow_depth", true)]);
        let toolbox = FixedToolbox { value: 1.0 };
        let registry = VariableRegistry::era5_land();
        let reporter = MemoryReporter::new();

        let err = AggregationDriver::new(&toolbox, &registry, &reporter)
            .run(&config, &dataset())
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_missing_uid_column() {
        let (_dir, mut config) = setup(&[("2m_temperature", true)]);
        config.boundaries_column_uid = "code".to_string();
        let toolbox = FixedToolbox { value: 1.0 };
        let registry = VariableRegistry::era5_land();
        let reporter = MemoryReporter::new();

        assert!(AggregationDriver::new(&toolbox, &registry, &reporter)
            .run(&config, &dataset())
            .await
            .is_err());
    }
}
