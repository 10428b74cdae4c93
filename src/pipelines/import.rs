use chrono::{NaiveDate, Utc};
use std::collections::{BTreeSet, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::{ImportConfig, ImportMode};
use crate::dhis2::{dhis2_day, dhis2_period, DataValue, DataValueQuery, DataValueStore, ImportSummary};
use crate::error::{PipelineError, Result};
use crate::models::Frequency;
use crate::pipelines::reported;
use crate::utils::constants::{
    DEFAULT_START_DATE, IMPORT_TIMESTAMP_FORMAT, PAYLOAD_FILENAME, REPORT_FILENAME,
};
use crate::utils::filename::aggregate_filename;
use crate::utils::reporter::RunReporter;
use crate::writers::ParquetWriter;

/// One aggregated value keyed the way DHIS2 keys it.
#[derive(Debug, Clone, PartialEq)]
struct StatRow {
    org_unit: String,
    period: String,
    value: Option<f64>,
}

/// Pushes aggregated boundary statistics into a DHIS2 data set.
pub struct ImportDriver<'a, S: DataValueStore> {
    store: &'a S,
    reporter: &'a dyn RunReporter,
    reader: ParquetWriter,
}

impl<'a, S: DataValueStore> ImportDriver<'a, S> {
    pub fn new(store: &'a S, reporter: &'a dyn RunReporter) -> Self {
        Self {
            store,
            reporter,
            reader: ParquetWriter::new(),
        }
    }

    /// Import every variable that has a data element and return the
    /// payload and report files written.
    ///
    /// Variables without a data element are skipped with a warning. The
    /// first failure stops the run.
    pub async fn run(&self, config: &ImportConfig) -> Result<Vec<PathBuf>> {
        reported(self.reporter, config.check())?;

        let mut outputs = Vec::new();
        for (variable, dx) in config.targets() {
            let Some(dx) = dx else {
                self.reporter.warning(&format!(
                    "Skipping import of variable {}: no DHIS2 data element provided",
                    variable
                ));
                continue;
            };

            self.reporter.info(&format!(
                "Starting import of variable {} into DHIS2 data element {}",
                variable, dx
            ));
            let files = reported(self.reporter, self.import_variable(config, variable, dx).await)?;
            outputs.extend(files);
            self.reporter.variable_done(variable);
        }

        Ok(outputs)
    }

    async fn import_variable(&self, config: &ImportConfig, variable: &str, dx: &str) -> Result<Vec<PathBuf>> {
        let rows = self.read_rows(&config.input_dir, variable, config.frequency)?;
        self.reporter.info(&format!(
            "Loaded {} data values for variable {}",
            rows.len(),
            variable
        ));

        let rows = match config.mode {
            ImportMode::Append => self.drop_existing(&config.data_set, dx, rows).await?,
            ImportMode::Overwrite => rows,
        };

        let payload = to_data_values(&rows, dx, &config.category_option_combo);
        let dropped = rows.len() - payload.len();
        if dropped > 0 {
            self.reporter
                .warning(&format!("{} rows of {} have no value and are left out", dropped, variable));
        }

        let summary = self.store.post_values(&payload, config.dry_run).await?;
        self.reporter.info(&format!(
            "{} {} data values to DHIS2",
            if config.dry_run { "Validated" } else { "Imported" },
            payload.len()
        ));

        self.write_report(&config.output_dir.join(variable), &payload, &summary)
    }

    fn read_rows(&self, input_dir: &Path, variable: &str, frequency: Frequency) -> Result<Vec<StatRow>> {
        let path = aggregate_filename(input_dir, variable, frequency);
        if !path.exists() {
            return Err(PipelineError::NotFound(format!(
                "File not found: {}",
                path.display()
            )));
        }

        let rows = if frequency == Frequency::Daily {
            self.reader
                .read_daily(&path)?
                .into_iter()
                .map(|r| StatRow {
                    org_unit: r.boundary_id,
                    period: dhis2_day(r.date),
                    value: r.mean,
                })
                .collect()
        } else {
            self.reader
                .read_periods(&path)?
                .into_iter()
                .map(|r| StatRow {
                    period: dhis2_period(frequency, &r.period),
                    org_unit: r.boundary_id,
                    value: r.mean,
                })
                .collect()
        };
        Ok(rows)
    }

    /// Remove rows whose org unit and period already hold a value for `dx`.
    async fn drop_existing(&self, data_set: &str, dx: &str, rows: Vec<StatRow>) -> Result<Vec<StatRow>> {
        let org_units: BTreeSet<&str> = rows.iter().map(|r| r.org_unit.as_str()).collect();
        if org_units.is_empty() {
            return Ok(rows);
        }

        let query = DataValueQuery {
            data_set: data_set.to_string(),
            org_units: org_units.into_iter().map(str::to_string).collect(),
            start: NaiveDate::parse_from_str(DEFAULT_START_DATE, "%Y-%m-%d")?,
            end: Utc::now().date_naive(),
        };
        let existing: HashSet<(String, String)> = self
            .store
            .existing_values(&query)
            .await?
            .into_iter()
            .filter(|v| v.data_element == dx)
            .map(|v| (v.org_unit, v.period))
            .collect();

        if existing.is_empty() {
            self.reporter.info(&format!(
                "Did not find any existing data values for data element {}",
                dx
            ));
            return Ok(rows);
        }

        let periods: HashSet<&str> = existing.iter().map(|(_, period)| period.as_str()).collect();
        self.reporter.info(&format!(
            "Found {} existing periods for data element {}. Filtering payload...",
            periods.len(),
            dx
        ));

        Ok(rows
            .into_iter()
            .filter(|r| !existing.contains(&(r.org_unit.clone(), r.period.clone())))
            .collect())
    }

    fn write_report(&self, output_dir: &Path, payload: &[DataValue], summary: &ImportSummary) -> Result<Vec<PathBuf>> {
        let dir = output_dir.join(Utc::now().format(IMPORT_TIMESTAMP_FORMAT).to_string());
        fs::create_dir_all(&dir)?;

        let payload_path = dir.join(PAYLOAD_FILENAME);
        fs::write(&payload_path, serde_json::to_string_pretty(payload)?)?;
        let report_path = dir.join(REPORT_FILENAME);
        fs::write(&report_path, serde_json::to_string_pretty(summary)?)?;

        self.reporter
            .info(&format!("Import report written to {}", dir.display()));
        self.reporter.add_file_output(&payload_path);
        self.reporter.add_file_output(&report_path);

        Ok(vec![payload_path, report_path])
    }
}

fn to_data_values(rows: &[StatRow], dx: &str, coc: &str) -> Vec<DataValue> {
    rows.iter()
        .filter_map(|r| {
            let value = r.value.filter(|v| v.is_finite())?;
            Some(DataValue {
                data_element: dx.to_string(),
                category_option_combo: coc.to_string(),
                attribute_option_combo: coc.to_string(),
                org_unit: r.org_unit.clone(),
                period: r.period.clone(),
                value: format_value(value),
            })
        })
        .collect()
}

/// Two decimals, without trailing zeros or a negative zero.
fn format_value(value: f64) -> String {
    let rounded = (value * 100.0).round() / 100.0;
    if rounded == 0.0 {
        "0".to_string()
    } else {
        rounded.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dhis2::{ImportCount, OfflineStore};
    use crate::models::{DailyRecord, PeriodRecord};
    use crate::utils::{LogLevel, MemoryReporter};
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Store answering with fixed existing values and recording posts.
    #[derive(Default)]
    struct RecordingStore {
        existing: Vec<DataValue>,
        queries: Mutex<Vec<DataValueQuery>>,
        posts: Mutex<Vec<(Vec<DataValue>, bool)>>,
    }

    impl DataValueStore for RecordingStore {
        async fn existing_values(&self, query: &DataValueQuery) -> Result<Vec<DataValue>> {
            self.queries.lock().unwrap().push(query.clone());
            Ok(self.existing.clone())
        }

        async fn post_values(&self, values: &[DataValue], dry_run: bool) -> Result<ImportSummary> {
            self.posts.lock().unwrap().push((values.to_vec(), dry_run));
            Ok(ImportSummary {
                status: "SUCCESS".to_string(),
                import_count: ImportCount {
                    imported: values.len() as u64,
                    ..Default::default()
                },
                ..Default::default()
            })
        }
    }

    fn period(boundary_id: &str, period: &str, mean: Option<f64>) -> PeriodRecord {
        PeriodRecord {
            boundary_id: boundary_id.to_string(),
            period: period.to_string(),
            mean,
            min: mean,
            max: mean,
        }
    }

    fn existing(dx: &str, org_unit: &str, period: &str) -> DataValue {
        DataValue {
            data_element: dx.to_string(),
            category_option_combo: "HllvX50cXC0".to_string(),
            attribute_option_combo: "HllvX50cXC0".to_string(),
            org_unit: org_unit.to_string(),
            period: period.to_string(),
            value: "1".to_string(),
        }
    }

    fn write_weekly(root: &Path, variable: &str, records: &[PeriodRecord]) {
        ParquetWriter::new()
            .write_periods(
                records,
                Frequency::Weekly,
                &aggregate_filename(root, variable, Frequency::Weekly),
            )
            .unwrap();
    }

    fn config(temp_dir: &TempDir, frequency: Frequency) -> ImportConfig {
        let mut config = ImportConfig::new("ds1", frequency);
        config.input_dir = temp_dir.path().join("aggregate");
        config.output_dir = temp_dir.path().join("import");
        config
    }

    fn keys(values: &[DataValue]) -> Vec<(&str, &str)> {
        values
            .iter()
            .map(|v| (v.org_unit.as_str(), v.period.as_str()))
            .collect()
    }

    #[tokio::test]
    async fn test_dry_run_writes_payload_and_report() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = config(&temp_dir, Frequency::Weekly);
        config.dx_temperature = Some("dxTemp".to_string());
        config.mode = ImportMode::Overwrite;
        config.dry_run = true;
        write_weekly(
            &config.input_dir,
            "2m_temperature",
            &[
                period("ou1", "2024W1", Some(26.8512)),
                period("ou1", "2024W2", None),
                period("ou2", "2024W1", Some(-0.004)),
            ],
        );

        let store = RecordingStore::default();
        let reporter = MemoryReporter::new();
        let outputs = ImportDriver::new(&store, &reporter).run(&config).await.unwrap();

        assert_eq!(outputs.len(), 2);
        assert_eq!(outputs[0].file_name().unwrap(), "payload.json");
        assert_eq!(outputs[1].file_name().unwrap(), "report.json");
        assert_eq!(
            outputs[0].parent().unwrap().parent().unwrap(),
            config.output_dir.join("2m_temperature")
        );
        assert_eq!(reporter.outputs(), outputs);

        let payload: Vec<DataValue> =
            serde_json::from_str(&fs::read_to_string(&outputs[0]).unwrap()).unwrap();
        assert_eq!(keys(&payload), vec![("ou1", "2024W1"), ("ou2", "2024W1")]);
        let values: Vec<&str> = payload.iter().map(|v| v.value.as_str()).collect();
        assert_eq!(values, vec!["26.85", "0"]);
        assert!(payload.iter().all(|v| v.data_element == "dxTemp"
            && v.category_option_combo == "HllvX50cXC0"
            && v.attribute_option_combo == "HllvX50cXC0"));

        let report: ImportSummary =
            serde_json::from_str(&fs::read_to_string(&outputs[1]).unwrap()).unwrap();
        assert_eq!(report.import_count.imported, 2);

        // Overwrite never asks DHIS2 for existing values
        assert!(store.queries.lock().unwrap().is_empty());
        assert!(store.posts.lock().unwrap()[0].1);
        assert_eq!(reporter.messages(LogLevel::Warning).len(), 3);
    }

    #[tokio::test]
    async fn test_append_skips_existing_values() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = config(&temp_dir, Frequency::Weekly);
        config.dx_precipitation = Some("dxPrecip".to_string());
        write_weekly(
            &config.input_dir,
            "total_precipitation",
            &[
                period("ou1", "2024W1", Some(3.0)),
                period("ou1", "2024W2", Some(4.0)),
                period("ou2", "2024W1", Some(5.0)),
            ],
        );

        let store = RecordingStore {
            existing: vec![
                existing("dxPrecip", "ou1", "2024W1"),
                existing("dxOther", "ou2", "2024W1"),
            ],
            ..Default::default()
        };
        let reporter = MemoryReporter::new();
        ImportDriver::new(&store, &reporter).run(&config).await.unwrap();

        let queries = store.queries.lock().unwrap();
        assert_eq!(queries[0].data_set, "ds1");
        assert_eq!(queries[0].org_units, vec!["ou1", "ou2"]);
        assert_eq!(queries[0].start, NaiveDate::from_ymd_opt(2018, 1, 1).unwrap());

        let posts = store.posts.lock().unwrap();
        assert_eq!(keys(&posts[0].0), vec![("ou1", "2024W2"), ("ou2", "2024W1")]);
        assert!(!posts[0].1);
        assert!(reporter
            .messages(LogLevel::Info)
            .iter()
            .any(|m| m.contains("Found 1 existing periods for data element dxPrecip")));
    }

    #[tokio::test]
    async fn test_epi_weekly_and_daily_periods() {
        let temp_dir = TempDir::new().unwrap();
        let writer = ParquetWriter::new();

        let mut epi = config(&temp_dir, Frequency::EpiWeekly);
        epi.dx_humidity = Some("dxSoil".to_string());
        epi.dry_run = true;
        writer
            .write_periods(
                &[period("ou1", "2024W1", Some(0.31))],
                Frequency::EpiWeekly,
                &aggregate_filename(&epi.input_dir, "volumetric_soil_water_layer_1", Frequency::EpiWeekly),
            )
            .unwrap();

        let mut daily = config(&temp_dir, Frequency::Daily);
        daily.dx_humidity = Some("dxSoil".to_string());
        daily.dry_run = true;
        writer
            .write_daily(
                &[DailyRecord {
                    boundary_id: "ou1".to_string(),
                    date: NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
                    mean: Some(0.3),
                    min: None,
                    max: None,
                }],
                &aggregate_filename(&daily.input_dir, "volumetric_soil_water_layer_1", Frequency::Daily),
            )
            .unwrap();

        let reporter = MemoryReporter::new();
        let driver = ImportDriver::new(&OfflineStore, &reporter);
        for (config, expected) in [(epi, "2024SunW1"), (daily, "20240131")] {
            let outputs = driver.run(&config).await.unwrap();
            let payload: Vec<DataValue> =
                serde_json::from_str(&fs::read_to_string(&outputs[0]).unwrap()).unwrap();
            assert_eq!(payload[0].period, expected);
        }
    }

    #[tokio::test]
    async fn test_missing_table_is_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = config(&temp_dir, Frequency::Monthly);
        config.dx_temperature = Some("dxTemp".to_string());

        let store = RecordingStore::default();
        let reporter = MemoryReporter::new();
        let err = ImportDriver::new(&store, &reporter).run(&config).await.unwrap_err();

        assert!(err.is_not_found());
        assert_eq!(reporter.messages(LogLevel::Error).len(), 1);
        assert!(store.posts.lock().unwrap().is_empty());
        assert!(!config.output_dir.exists());
    }

    #[tokio::test]
    async fn test_no_data_element_imports_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let config = config(&temp_dir, Frequency::Weekly);

        let reporter = MemoryReporter::new();
        let outputs = ImportDriver::new(&OfflineStore, &reporter).run(&config).await.unwrap();

        assert!(outputs.is_empty());
        assert_eq!(reporter.messages(LogLevel::Warning).len(), 3);
    }

    #[test]
    fn test_format_value() {
        assert_eq!(format_value(26.8512), "26.85");
        assert_eq!(format_value(2.0), "2");
        assert_eq!(format_value(-0.004), "0");
        assert_eq!(format_value(-3.456), "-3.46");
    }
}
