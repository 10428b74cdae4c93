use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::ImportMode;
use crate::models::{Frequency, VariableToggles};
use crate::utils::constants::{
    DEFAULT_AGGREGATE_DIR, DEFAULT_CATEGORY_OPTION_COMBO, DEFAULT_IMPORT_DIR, DEFAULT_RAW_DIR,
    DEFAULT_START_DATE,
};

#[derive(Parser)]
#[command(name = "era5")]
#[command(about = "Extract ERA5-Land data and aggregate it over boundaries")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(short, long, global = true, help = "Enable verbose logging")]
    pub verbose: bool,

    #[arg(long, global = true, help = "Log file path")]
    pub log_file: Option<PathBuf>,

    #[arg(long, global = true, help = "TOML settings file")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Download raw ERA5-Land extracts covering the boundaries
    Extract {
        #[arg(long, default_value = DEFAULT_START_DATE)]
        start_date: NaiveDate,

        #[arg(long, help = "Last day to download [default: today]")]
        end_date: Option<NaiveDate>,

        #[arg(long, help = "Directory holding the boundaries dataset versions")]
        boundaries_dataset: PathBuf,

        #[arg(long, help = "Boundaries file name inside the dataset")]
        boundaries_file: Option<String>,

        #[arg(long = "variable", help = "Variable label or key (repeatable)")]
        variables: Vec<String>,

        #[command(flatten)]
        toggles: ToggleArgs,

        #[arg(short, long, default_value = DEFAULT_RAW_DIR)]
        output_dir: PathBuf,

        #[arg(long = "time", help = "Hour of day to download, 0-23 (repeatable)")]
        hours: Vec<u32>,
    },

    /// Aggregate raw extracts into daily, weekly and monthly tables
    Aggregate {
        #[arg(short, long, default_value = DEFAULT_RAW_DIR)]
        input_dir: PathBuf,

        #[arg(short, long, default_value = DEFAULT_AGGREGATE_DIR)]
        output_dir: PathBuf,

        #[arg(long, help = "Directory holding the boundaries dataset versions")]
        boundaries_dataset: PathBuf,

        #[arg(long, help = "Boundaries file name inside the dataset")]
        boundaries_file: Option<String>,

        #[arg(long, help = "Column holding the boundary identifier")]
        boundaries_column_uid: String,

        #[arg(short, long, default_value = "snappy")]
        compression: String,

        #[arg(long, help = "Keep going when a variable fails")]
        continue_on_error: bool,
    },

    /// Import aggregated statistics into a DHIS2 data set
    ImportDhis2 {
        #[arg(short, long, default_value = DEFAULT_AGGREGATE_DIR)]
        input_dir: PathBuf,

        #[arg(short, long, default_value = DEFAULT_IMPORT_DIR)]
        output_dir: PathBuf,

        #[arg(long, help = "daily, weekly, epi_weekly or monthly")]
        frequency: Frequency,

        #[arg(long, help = "Target DHIS2 data set UID")]
        dataset: String,

        #[arg(long, help = "Data element UID for 2 metre temperature")]
        dx_temperature: Option<String>,

        #[arg(long, help = "Data element UID for total precipitation")]
        dx_precipitation: Option<String>,

        #[arg(long, help = "Data element UID for soil humidity")]
        dx_humidity: Option<String>,

        #[arg(long, default_value = DEFAULT_CATEGORY_OPTION_COMBO, help = "Category option combo UID")]
        coc: String,

        #[arg(long, default_value = "append", help = "append or overwrite")]
        mode: ImportMode,

        #[arg(long, help = "Validate the import without saving values")]
        dry_run: bool,
    },

    /// Display information about an aggregated Parquet file
    Info {
        #[arg(short, long)]
        file: PathBuf,

        #[arg(short, long, default_value = "10")]
        sample: usize,
    },
}

#[derive(Args, Debug, Clone, Copy, Default)]
pub struct ToggleArgs {
    #[arg(long, help = "2 metre temperature")]
    pub temperature: bool,

    #[arg(long, help = "2 metre dewpoint temperature")]
    pub dewpoint: bool,

    #[arg(long, help = "Total precipitation")]
    pub precipitation: bool,

    #[arg(long, help = "Total evaporation")]
    pub evaporation: bool,

    #[arg(long, help = "Runoff")]
    pub runoff: bool,

    #[arg(long, help = "Soil temperature level 1")]
    pub soil_temperature: bool,

    #[arg(long, help = "Volumetric soil water layer 1")]
    pub soil_water: bool,

    #[arg(long, help = "Volumetric soil water layer 2")]
    pub soil_water_2: bool,

    #[arg(long, help = "10 metre U wind component")]
    pub wind_u: bool,

    #[arg(long, help = "10 metre V wind component")]
    pub wind_v: bool,
}

impl From<ToggleArgs> for VariableToggles {
    fn from(args: ToggleArgs) -> Self {
        VariableToggles {
            temperature: args.temperature,
            dewpoint: args.dewpoint,
            precipitation: args.precipitation,
            evaporation: args.evaporation,
            runoff: args.runoff,
            soil_temperature: args.soil_temperature,
            soil_water: args.soil_water,
            soil_water_2: args.soil_water_2,
            wind_u: args.wind_u,
            wind_v: args.wind_v,
        }
    }
}
