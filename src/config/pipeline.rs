use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use validator::Validate;

use crate::error::{PipelineError, Result};
use crate::models::{Frequency, VariableToggles};
use crate::utils::constants::{
    COMPRESSION_SNAPPY, DEFAULT_AGGREGATE_DIR, DEFAULT_CATEGORY_OPTION_COMBO, DEFAULT_IMPORT_DIR,
    DEFAULT_RAW_DIR,
};

/// Parameters of one extraction run.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ExtractConfig {
    pub start_date: NaiveDate,

    /// Defaults to today (UTC) when unset.
    pub end_date: Option<NaiveDate>,

    pub boundaries_file: Option<String>,

    /// Variable labels or registry keys.
    pub variables: Vec<String>,

    pub toggles: VariableToggles,

    pub output_dir: PathBuf,

    /// Hours of day to download; empty means all hours.
    pub hours: Vec<u32>,
}

impl ExtractConfig {
    pub fn new(start_date: NaiveDate) -> Self {
        Self {
            start_date,
            end_date: None,
            boundaries_file: None,
            variables: Vec::new(),
            toggles: VariableToggles::default(),
            output_dir: PathBuf::from(DEFAULT_RAW_DIR),
            hours: Vec::new(),
        }
    }

    pub fn end_date_or_today(&self) -> NaiveDate {
        self.end_date.unwrap_or_else(|| Utc::now().date_naive())
    }

    pub fn check(&self) -> Result<()> {
        self.validate()?;

        if let Some(hour) = self.hours.iter().find(|&&h| h > 23) {
            return Err(PipelineError::Config(format!(
                "Hour {} outside 0-23",
                hour
            )));
        }

        let end = self.end_date_or_today();
        if self.start_date > end {
            return Err(PipelineError::Config(format!(
                "Start date {} is after end date {}",
                self.start_date, end
            )));
        }

        Ok(())
    }
}

/// Parameters of one aggregation run.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AggregateConfig {
    pub input_dir: PathBuf,

    pub output_dir: PathBuf,

    pub boundaries_file: Option<String>,

    /// Column holding the boundary identifier; there is no default.
    #[validate(length(min = 1))]
    pub boundaries_column_uid: String,

    #[validate(length(min = 1))]
    pub compression: String,

    /// Keep processing other variables after one fails.
    pub continue_on_error: bool,
}

impl AggregateConfig {
    pub fn new(boundaries_column_uid: &str) -> Self {
        Self {
            input_dir: PathBuf::from(DEFAULT_RAW_DIR),
            output_dir: PathBuf::from(DEFAULT_AGGREGATE_DIR),
            boundaries_file: None,
            boundaries_column_uid: boundaries_column_uid.to_string(),
            compression: COMPRESSION_SNAPPY.to_string(),
            continue_on_error: false,
        }
    }

    pub fn check(&self) -> Result<()> {
        self.validate()?;
        Ok(())
    }
}

/// Whether periods DHIS2 already holds are imported again.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImportMode {
    /// Skip org unit and period pairs that already have a value.
    #[default]
    Append,
    Overwrite,
}

impl std::str::FromStr for ImportMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "append" => Ok(ImportMode::Append),
            "overwrite" => Ok(ImportMode::Overwrite),
            _ => Err(format!("unknown import mode '{}', expected append or overwrite", s)),
        }
    }
}

/// Parameters of one DHIS2 import run.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ImportConfig {
    pub input_dir: PathBuf,

    /// Payloads and import reports land under `<output_dir>/<variable>/<timestamp>/`.
    pub output_dir: PathBuf,

    pub frequency: Frequency,

    #[validate(length(min = 1))]
    pub data_set: String,

    pub dx_temperature: Option<String>,
    pub dx_precipitation: Option<String>,
    pub dx_humidity: Option<String>,

    /// Used as both category and attribute option combo.
    #[validate(length(min = 1))]
    pub category_option_combo: String,

    pub mode: ImportMode,

    pub dry_run: bool,
}

impl ImportConfig {
    pub fn new(data_set: &str, frequency: Frequency) -> Self {
        Self {
            input_dir: PathBuf::from(DEFAULT_AGGREGATE_DIR),
            output_dir: PathBuf::from(DEFAULT_IMPORT_DIR),
            frequency,
            data_set: data_set.to_string(),
            dx_temperature: None,
            dx_precipitation: None,
            dx_humidity: None,
            category_option_combo: DEFAULT_CATEGORY_OPTION_COMBO.to_string(),
            mode: ImportMode::Append,
            dry_run: false,
        }
    }

    /// Importable variables paired with their target data element, if any.
    pub fn targets(&self) -> [(&'static str, Option<&str>); 3] {
        [
            ("2m_temperature", self.dx_temperature.as_deref()),
            ("total_precipitation", self.dx_precipitation.as_deref()),
            ("volumetric_soil_water_layer_1", self.dx_humidity.as_deref()),
        ]
    }

    pub fn check(&self) -> Result<()> {
        self.validate()?;

        if let Some((variable, _)) = self
            .targets()
            .into_iter()
            .find(|(_, dx)| dx.is_some_and(str::is_empty))
        {
            return Err(PipelineError::Config(format!(
                "Empty DHIS2 data element for {}",
                variable
            )));
        }

        Ok(())
    }
}
