use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::error::{PipelineError, Result};
use crate::models::{Boundaries, BoundaryMask, GridMetadata, GridStack};
use crate::toolbox::{ClimateDataStore, DownloadRequest, RasterToolbox};

#[derive(Debug, Deserialize)]
struct MaskResponse {
    masks: Vec<BoundaryMask>,
}

/// Runs the toolbox executable, exchanging JSON over stdin/stdout.
///
/// Subcommands: `download`, `grid-info`, `merge` and `masks`. CDS
/// credentials are handed over through `CDSAPI_KEY` and `CDSAPI_URL`.
#[derive(Debug, Clone)]
pub struct CommandToolbox {
    program: PathBuf,
    base_args: Vec<String>,
    cds_key: Option<String>,
    cds_url: Option<String>,
}

impl CommandToolbox {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            base_args: Vec::new(),
            cds_key: None,
            cds_url: None,
        }
    }

    /// Arguments placed before every subcommand, e.g. `-m era5_toolbox`.
    pub fn with_base_args(mut self, args: Vec<String>) -> Self {
        self.base_args = args;
        self
    }

    pub fn with_cds_credentials(mut self, key: Option<String>, url: Option<String>) -> Self {
        self.cds_key = key;
        self.cds_url = url;
        self
    }

    pub fn download_args(request: &DownloadRequest) -> Vec<String> {
        let mut args = vec![
            "download".to_string(),
            "--variable".to_string(),
            request.variable.clone(),
            "--start".to_string(),
            request.start.format("%Y-%m-%d").to_string(),
            "--end".to_string(),
            request.end.format("%Y-%m-%d").to_string(),
            "--area".to_string(),
            request.area.to_string(),
            "--output-dir".to_string(),
            request.dst_dir.display().to_string(),
        ];
        for hour in &request.hours {
            args.push("--time".to_string());
            args.push(hour.to_string());
        }
        args
    }

    pub fn mask_args(grid: &GridMetadata) -> Vec<String> {
        vec![
            "masks".to_string(),
            "--nrows".to_string(),
            grid.nrows.to_string(),
            "--ncols".to_string(),
            grid.ncols.to_string(),
            "--transform".to_string(),
            grid.transform_arg(),
        ]
    }

    async fn run(&self, args: Vec<String>, input: Option<Vec<u8>>) -> Result<Vec<u8>> {
        let subcommand = args.first().cloned().unwrap_or_default();

        let mut command = Command::new(&self.program);
        command
            .args(&self.base_args)
            .args(&args)
            .stdin(if input.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(ref key) = self.cds_key {
            command.env("CDSAPI_KEY", key);
        }
        if let Some(ref url) = self.cds_url {
            command.env("CDSAPI_URL", url);
        }

        tracing::debug!(program = %self.program.display(), ?args, "running toolbox");

        let mut child = command.spawn().map_err(|e| {
            PipelineError::Toolbox(format!(
                "Failed to execute {}: {}",
                self.program.display(),
                e
            ))
        })?;

        // Feed stdin from a task so a chatty child cannot block on a full stdout pipe
        let writer = match (input, child.stdin.take()) {
            (Some(data), Some(mut stdin)) => Some(tokio::spawn(async move {
                stdin.write_all(&data).await?;
                stdin.shutdown().await
            })),
            _ => None,
        };

        let output = child.wait_with_output().await?;
        if let Some(writer) = writer {
            // A child that exits without reading its input reports its own error below
            if let Ok(Err(e)) = writer.await {
                tracing::debug!(error = %e, "toolbox stdin closed early");
            }
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(PipelineError::Toolbox(format!(
                "{} {} failed ({}): {}",
                self.program.display(),
                subcommand,
                output.status,
                stderr.trim()
            )));
        }

        Ok(output.stdout)
    }
}

impl ClimateDataStore for CommandToolbox {
    async fn download_between(&self, request: &DownloadRequest) -> Result<()> {
        self.run(Self::download_args(request), None).await?;
        Ok(())
    }
}

impl RasterToolbox for CommandToolbox {
    async fn grid_metadata(&self, raw_file: &Path) -> Result<GridMetadata> {
        let args = vec![
            "grid-info".to_string(),
            "--file".to_string(),
            raw_file.display().to_string(),
        ];
        let stdout = self.run(args, None).await?;
        Ok(serde_json::from_slice(&stdout)?)
    }

    async fn merge(&self, input_dir: &Path) -> Result<GridStack> {
        let args = vec![
            "merge".to_string(),
            "--input-dir".to_string(),
            input_dir.display().to_string(),
        ];
        let stdout = self.run(args, None).await?;
        let stack: GridStack = serde_json::from_slice(&stdout)?;
        stack.validate_shape()?;
        Ok(stack)
    }

    async fn build_masks(
        &self,
        boundaries: &Boundaries,
        grid: &GridMetadata,
    ) -> Result<Vec<BoundaryMask>> {
        let input = serde_json::to_vec(&boundaries_to_geojson(boundaries))?;
        let stdout = self.run(Self::mask_args(grid), Some(input)).await?;
        let response: MaskResponse = serde_json::from_slice(&stdout)?;

        if response.masks.len() != boundaries.len() {
            return Err(PipelineError::Toolbox(format!(
                "toolbox returned {} masks for {} boundaries",
                response.masks.len(),
                boundaries.len()
            )));
        }
        Ok(response.masks)
    }
}

fn boundaries_to_geojson(boundaries: &Boundaries) -> geojson::FeatureCollection {
    let features = boundaries
        .records()
        .iter()
        .map(|record| {
            let properties = record
                .attributes
                .iter()
                .map(|(key, value)| {
                    let value = value
                        .as_ref()
                        .map_or(serde_json::Value::Null, |v| serde_json::Value::String(v.clone()));
                    (key.clone(), value)
                })
                .collect();

            geojson::Feature {
                bbox: None,
                geometry: Some(geojson::Geometry::new(geojson::Value::from(&record.geometry))),
                id: None,
                properties: Some(properties),
                foreign_members: None,
            }
        })
        .collect();

    geojson::FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }
}
