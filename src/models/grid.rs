use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

/// Raster shape and affine geotransform of a raw extract.
///
/// The transform follows the `(a, b, c, d, e, f)` convention, where
/// `x = a * col + b * row + c` and `y = d * col + e * row + f`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridMetadata {
    pub ncols: usize,
    pub nrows: usize,
    pub transform: [f64; 6],
}

impl GridMetadata {
    pub fn transform_arg(&self) -> String {
        self.transform
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// One raster band for a single timestamp, row-major, `None` for missing cells.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridFrame {
    pub time: DateTime<Utc>,
    pub values: Vec<Option<f64>>,
}

/// Time-indexed raster produced by merging every raw file of a variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridStack {
    pub ncols: usize,
    pub nrows: usize,
    pub frames: Vec<GridFrame>,
}

impl GridStack {
    pub fn validate_shape(&self) -> Result<()> {
        let expected = self.ncols * self.nrows;
        for frame in &self.frames {
            if frame.values.len() != expected {
                return Err(PipelineError::InvalidFormat(format!(
                    "frame at {} has {} cells, expected {}",
                    frame.time,
                    frame.values.len(),
                    expected
                )));
            }
        }
        Ok(())
    }
}

/// Flat cell indices covered by one boundary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BoundaryMask(pub Vec<usize>);

impl BoundaryMask {
    pub fn cells(&self) -> &[usize] {
        &self.0
    }
}
