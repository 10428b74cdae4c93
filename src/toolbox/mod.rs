//! Seams to the external ERA5 toolbox.
//!
//! GRIB decoding, mask rasterization and the Climate Data Store protocol
//! live outside this crate. Pipelines talk to them through the traits
//! below; [`CommandToolbox`] implements them by running the toolbox
//! executable.
#![allow(async_fn_in_trait)]

pub mod command;

use chrono::NaiveDate;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::models::{Boundaries, BoundaryMask, BoundingBox, GridMetadata, GridStack};

pub use command::CommandToolbox;

/// Parameters of one CDS download.
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadRequest {
    pub variable: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub dst_dir: PathBuf,
    pub area: BoundingBox,
    /// Hours of day to request; empty means every hour.
    pub hours: Vec<u32>,
}

pub trait ClimateDataStore {
    /// Download every product between `start` and `end` into `dst_dir`.
    ///
    /// Chunking, retries and rate limiting are the implementation's concern.
    async fn download_between(&self, request: &DownloadRequest) -> Result<()>;
}

pub trait RasterToolbox {
    async fn grid_metadata(&self, raw_file: &Path) -> Result<GridMetadata>;

    /// Merge every raw file in `input_dir` along the time dimension.
    async fn merge(&self, input_dir: &Path) -> Result<GridStack>;

    /// One mask per boundary, in boundary order.
    async fn build_masks(
        &self,
        boundaries: &Boundaries,
        grid: &GridMetadata,
    ) -> Result<Vec<BoundaryMask>>;
}
