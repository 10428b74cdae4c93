use chrono::NaiveDate;
use std::collections::BTreeMap;

use crate::error::{PipelineError, Result};
use crate::models::{BoundaryMask, DailyRecord, GridFrame, GridStack};

/// Running mean/min/max over valid cell values.
#[derive(Debug, Clone, Copy, Default)]
struct CellStats {
    sum: f64,
    count: usize,
    min: Option<f64>,
    max: Option<f64>,
}

impl CellStats {
    fn push(&mut self, value: f64) {
        if !value.is_finite() {
            return;
        }
        self.sum += value;
        self.count += 1;
        self.min = Some(self.min.map_or(value, |m| m.min(value)));
        self.max = Some(self.max.map_or(value, |m| m.max(value)));
    }

    fn mean(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }
}

/// Reduces a merged raster stack to one row per boundary and day.
pub struct ZonalAggregator;

impl ZonalAggregator {
    pub fn new() -> Self {
        Self
    }

    /// Daily mean/min/max of every boundary.
    ///
    /// `masks` and `boundary_ids` are parallel: mask `i` belongs to boundary
    /// `i`. Boundaries with an empty identifier are skipped. Days are UTC
    /// calendar days and every frame of a day contributes.
    pub fn aggregate(
        &self,
        stack: &GridStack,
        masks: &[BoundaryMask],
        boundary_ids: &[String],
    ) -> Result<Vec<DailyRecord>> {
        if masks.len() != boundary_ids.len() {
            return Err(PipelineError::InvalidFormat(format!(
                "{} masks for {} boundaries",
                masks.len(),
                boundary_ids.len()
            )));
        }
        stack.validate_shape()?;

        let cell_count = stack.ncols * stack.nrows;
        if let Some(cell) = masks
            .iter()
            .flat_map(|m| m.cells())
            .find(|&&cell| cell >= cell_count)
        {
            return Err(PipelineError::InvalidFormat(format!(
                "mask cell {} outside a {}x{} grid",
                cell, stack.nrows, stack.ncols
            )));
        }

        let mut days: BTreeMap<NaiveDate, Vec<&GridFrame>> = BTreeMap::new();
        for frame in &stack.frames {
            days.entry(frame.time.date_naive()).or_default().push(frame);
        }

        let mut records = Vec::with_capacity(days.len() * boundary_ids.len());
        for (boundary_id, mask) in boundary_ids.iter().zip(masks) {
            if boundary_id.is_empty() {
                continue;
            }

            for (date, frames) in &days {
                let mut stats = CellStats::default();
                for frame in frames {
                    for &cell in mask.cells() {
                        if let Some(value) = frame.values[cell] {
                            stats.push(value);
                        }
                    }
                }

                records.push(DailyRecord {
                    boundary_id: boundary_id.clone(),
                    date: *date,
                    mean: stats.mean(),
                    min: stats.min,
                    max: stats.max,
                });
            }
        }

        records.sort_by(|a, b| {
            a.boundary_id
                .cmp(&b.boundary_id)
                .then_with(|| a.date.cmp(&b.date))
        });
        Ok(records)
    }
}

impl Default for ZonalAggregator {
    fn default() -> Self {
        Self::new()
    }
}
