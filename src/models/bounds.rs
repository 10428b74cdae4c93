use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};
use crate::models::Boundaries;
use crate::utils::constants::BOUNDS_PADDING;

/// Integer area of interest for CDS requests.
///
/// CDS expects the area as north/west/south/east, which is also the order
/// of [`BoundingBox::as_area`] and the `Display` output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub north: i32,
    pub west: i32,
    pub south: i32,
    pub east: i32,
}

impl BoundingBox {
    pub fn new(north: i32, west: i32, south: i32, east: i32) -> Result<Self> {
        if west >= east || south >= north {
            return Err(PipelineError::InvalidBounds(format!(
                "{}/{}/{}/{}",
                north, west, south, east
            )));
        }
        Ok(Self {
            north,
            west,
            south,
            east,
        })
    }

    /// Pad an extent by half a degree on every side and round up to integers.
    pub fn from_extent(xmin: f64, ymin: f64, xmax: f64, ymax: f64) -> Result<Self> {
        if [xmin, ymin, xmax, ymax].iter().any(|v| !v.is_finite()) {
            return Err(PipelineError::InvalidBounds(format!(
                "non-finite extent ({}, {}, {}, {})",
                xmin, ymin, xmax, ymax
            )));
        }

        let north = (ymax + BOUNDS_PADDING).ceil() as i32;
        let west = (xmin - BOUNDS_PADDING).ceil() as i32;
        let south = (ymin - BOUNDS_PADDING).ceil() as i32;
        let east = (xmax + BOUNDS_PADDING).ceil() as i32;

        Self::new(north, west, south, east)
    }

    /// Bounding box of a whole boundaries collection.
    pub fn from_boundaries(boundaries: &Boundaries) -> Result<Self> {
        let extent = boundaries.total_bounds()?;
        Self::from_extent(
            extent.min().x,
            extent.min().y,
            extent.max().x,
            extent.max().y,
        )
    }

    pub fn as_area(&self) -> [i32; 4] {
        [self.north, self.west, self.south, self.east]
    }
}

impl std::fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}/{}", self.north, self.west, self.south, self.east)
    }
}
