use std::path::{Path, PathBuf};

use crate::cli::args::{Cli, Commands};
use crate::config::{AggregateConfig, ExtractConfig, ImportConfig, Settings};
use crate::dhis2::{DataValueStore, OfflineStore};
use crate::error::{PipelineError, Result};
use crate::models::{VariableRegistry, VariableToggles};
use crate::pipelines::{AggregationDriver, ExtractionDriver, ImportDriver};
use crate::readers::LocalDataset;
use crate::utils::filename::workspace_path;
use crate::utils::progress::ProgressReporter;
use crate::utils::reporter::{RunReporter, TracingReporter};
use crate::writers::ParquetWriter;

pub async fn run(cli: Cli) -> Result<()> {
    let settings = Settings::load(cli.config.as_deref())?;
    let files_root = settings.workspace.files_root.clone();
    let registry = VariableRegistry::era5_land();

    match cli.command {
        Commands::Extract {
            start_date,
            end_date,
            boundaries_dataset,
            boundaries_file,
            variables,
            toggles,
            output_dir,
            hours,
        } => {
            let mut config = ExtractConfig::new(start_date);
            config.end_date = end_date;
            config.boundaries_file = boundaries_file;
            config.variables = variables;
            config.toggles = VariableToggles::from(toggles);
            config.output_dir = workspace_path(&files_root, &output_dir);
            config.hours = hours;

            println!("Extracting ERA5-Land data...");
            println!("Output directory: {}", config.output_dir.display());

            let dataset = LocalDataset::open(&workspace_path(&files_root, &boundaries_dataset))?;
            let reporter = TracingReporter::new()
                .with_progress(ProgressReporter::new_spinner("Downloading...", cli.verbose));
            let toolbox = settings.toolbox();

            let directories = ExtractionDriver::new(&toolbox, &registry, &reporter)
                .run(&config, &dataset)
                .await?;

            reporter.finish(&format!("Downloaded {} variable(s)", directories.len()));
            for dir in &directories {
                println!("  {}", dir.display());
            }
            println!("Extraction complete!");
        }

        Commands::Aggregate {
            input_dir,
            output_dir,
            boundaries_dataset,
            boundaries_file,
            boundaries_column_uid,
            compression,
            continue_on_error,
        } => {
            let mut config = AggregateConfig::new(&boundaries_column_uid);
            config.input_dir = workspace_path(&files_root, &input_dir);
            config.output_dir = workspace_path(&files_root, &output_dir);
            config.boundaries_file = boundaries_file;
            config.compression = compression;
            config.continue_on_error = continue_on_error;

            println!("Aggregating ERA5-Land data...");
            println!("Input directory: {}", config.input_dir.display());
            println!("Output directory: {}", config.output_dir.display());

            let dataset = LocalDataset::open(&workspace_path(&files_root, &boundaries_dataset))?;
            let reporter = TracingReporter::new()
                .with_progress(ProgressReporter::new_spinner("Aggregating...", cli.verbose));
            let toolbox = settings.toolbox();

            let result = AggregationDriver::new(&toolbox, &registry, &reporter)
                .run(&config, &dataset)
                .await;

            reporter.finish("Aggregation finished");
            print_outputs(&reporter);
            result?;
            println!("Aggregation complete!");
        }

        Commands::ImportDhis2 {
            input_dir,
            output_dir,
            frequency,
            dataset,
            dx_temperature,
            dx_precipitation,
            dx_humidity,
            coc,
            mode,
            dry_run,
        } => {
            let mut config = ImportConfig::new(&dataset, frequency);
            config.input_dir = workspace_path(&files_root, &input_dir);
            config.output_dir = workspace_path(&files_root, &output_dir);
            config.dx_temperature = dx_temperature;
            config.dx_precipitation = dx_precipitation;
            config.dx_humidity = dx_humidity;
            config.category_option_combo = coc;
            config.mode = mode;
            config.dry_run = dry_run;

            println!("Importing ERA5 aggregates into DHIS2...");
            println!("Input directory: {}", config.input_dir.display());
            if config.dry_run {
                println!("Dry run: no data values will be saved");
            }

            let reporter = TracingReporter::new()
                .with_progress(ProgressReporter::new_spinner("Importing...", cli.verbose));
            let result = match settings.dhis2_client() {
                Some(client) => import(&client, &reporter, &config).await,
                None if config.dry_run => {
                    reporter.warning("No DHIS2 instance configured, existing values are not checked");
                    import(&OfflineStore, &reporter, &config).await
                }
                None => Err(PipelineError::Config(
                    "No DHIS2 instance configured: set dhis2.url or use --dry-run".to_string(),
                )),
            };

            reporter.finish("Import finished");
            print_outputs(&reporter);
            result?;
            println!("Import complete!");
        }

        Commands::Info { file, sample } => {
            println!("Analyzing Parquet file: {}", file.display());
            print_info(&file, sample)?;
        }
    }

    Ok(())
}

async fn import<S: DataValueStore>(
    store: &S,
    reporter: &TracingReporter,
    config: &ImportConfig,
) -> Result<Vec<PathBuf>> {
    ImportDriver::new(store, reporter).run(config).await
}

fn print_outputs(reporter: &TracingReporter) {
    let outputs = reporter.outputs();
    if outputs.is_empty() {
        return;
    }
    println!("\nWritten files:");
    for path in outputs {
        println!("  {}", path.display());
    }
}

fn print_info(file: &Path, sample: usize) -> Result<()> {
    let writer = ParquetWriter::new();
    let file_info = writer.get_file_info(file)?;

    println!("\nFile Details:");
    println!("{}", file_info.summary());

    if sample == 0 {
        return Ok(());
    }

    println!("\nSample Records (showing up to {} records):", sample);
    let is_daily = file_info.columns.get(1).map(String::as_str) == Some("date");
    if is_daily {
        for (i, record) in writer.read_daily(file)?.iter().take(sample).enumerate() {
            println!(
                "{}. {} on {}: mean={}, min={}, max={}",
                i + 1,
                record.boundary_id,
                record.date,
                fmt_value(record.mean),
                fmt_value(record.min),
                fmt_value(record.max)
            );
        }
    } else {
        for (i, record) in writer.read_periods(file)?.iter().take(sample).enumerate() {
            println!(
                "{}. {} in {}: mean={}, min={}, max={}",
                i + 1,
                record.boundary_id,
                record.period,
                fmt_value(record.mean),
                fmt_value(record.min),
                fmt_value(record.max)
            );
        }
    }

    Ok(())
}

fn fmt_value(value: Option<f64>) -> String {
    value.map_or_else(|| "null".to_string(), |v| format!("{:.3}", v))
}
