use geo::{BoundingRect, Geometry, Rect};
use std::collections::BTreeMap;

use crate::error::{PipelineError, Result};

/// One boundary polygon with its attribute columns rendered as strings.
#[derive(Debug, Clone, PartialEq)]
pub struct Boundary {
    pub attributes: BTreeMap<String, Option<String>>,
    pub geometry: Geometry<f64>,
}

impl Boundary {
    pub fn new(geometry: Geometry<f64>) -> Self {
        Self {
            attributes: BTreeMap::new(),
            geometry,
        }
    }

    pub fn with_attribute(mut self, column: &str, value: Option<&str>) -> Self {
        self.attributes
            .insert(column.to_string(), value.map(str::to_string));
        self
    }

    pub fn attribute(&self, column: &str) -> Option<&str> {
        self.attributes.get(column).and_then(|v| v.as_deref())
    }
}

/// Ordered geometry collection loaded from a boundaries file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Boundaries {
    source: String,
    records: Vec<Boundary>,
}

impl Boundaries {
    pub fn new(source: impl Into<String>, records: Vec<Boundary>) -> Self {
        Self {
            source: source.into(),
            records,
        }
    }

    /// Name of the file the collection was read from.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn records(&self) -> &[Boundary] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.records.iter().any(|r| r.attributes.contains_key(column))
    }

    /// Unique identifiers in record order.
    ///
    /// Fails when the column is absent, or when no record carries a value.
    /// Records with a null identifier keep an empty string so that masks
    /// built from the same collection stay aligned with the returned list.
    pub fn ids(&self, column: &str) -> Result<Vec<String>> {
        if self.is_empty() {
            return Err(PipelineError::EmptyBoundaries(self.source.clone()));
        }
        if !self.has_column(column) {
            return Err(PipelineError::Config(format!(
                "Column {} not found in boundaries {}",
                column, self.source
            )));
        }

        let ids: Vec<Option<&str>> = self.records.iter().map(|r| r.attribute(column)).collect();
        if ids.iter().all(Option::is_none) {
            return Err(PipelineError::EmptyBoundaries(format!(
                "{} has no non-null values in column {}",
                self.source, column
            )));
        }

        Ok(ids
            .into_iter()
            .map(|id| id.unwrap_or_default().to_string())
            .collect())
    }

    /// Tight extent of every geometry in the collection.
    pub fn total_bounds(&self) -> Result<Rect<f64>> {
        let mut extent: Option<Rect<f64>> = None;

        for record in &self.records {
            let Some(rect) = record.geometry.bounding_rect() else {
                continue;
            };
            extent = Some(match extent {
                None => rect,
                Some(acc) => Rect::new(
                    (acc.min().x.min(rect.min().x), acc.min().y.min(rect.min().y)),
                    (acc.max().x.max(rect.max().x), acc.max().y.max(rect.max().y)),
                ),
            });
        }

        extent.ok_or_else(|| PipelineError::EmptyBoundaries(self.source.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{point, polygon};

    fn square(x: f64, y: f64, size: f64) -> Geometry<f64> {
        Geometry::Polygon(polygon![
            (x: x, y: y),
            (x: x + size, y: y),
            (x: x + size, y: y + size),
            (x: x, y: y + size),
            (x: x, y: y),
        ])
    }

    #[test]
    fn test_total_bounds_spans_all_records() {
        let boundaries = Boundaries::new(
            "district.parquet",
            vec![
                Boundary::new(square(2.3, -1.7, 1.0)),
                Boundary::new(square(4.1, 3.9, 1.0)),
            ],
        );

        let rect = boundaries.total_bounds().unwrap();
        assert_eq!(rect.min().x, 2.3);
        assert_eq!(rect.min().y, -1.7);
        assert!((rect.max().x - 5.1).abs() < 1e-9);
        assert!((rect.max().y - 4.9).abs() < 1e-9);
    }

    #[test]
    fn test_total_bounds_empty_collection() {
        let boundaries = Boundaries::new("empty.geojson", vec![]);
        assert!(matches!(
            boundaries.total_bounds(),
            Err(PipelineError::EmptyBoundaries(_))
        ));
    }

    #[test]
    fn test_total_bounds_single_point() {
        let boundaries = Boundaries::new(
            "points.geojson",
            vec![Boundary::new(Geometry::Point(point!(x: 1.0, y: 2.0)))],
        );
        let rect = boundaries.total_bounds().unwrap();
        assert_eq!(rect.min(), rect.max());
    }

    #[test]
    fn test_ids_keep_record_order() {
        let boundaries = Boundaries::new(
            "district.parquet",
            vec![
                Boundary::new(square(0.0, 0.0, 1.0)).with_attribute("id", Some("b")),
                Boundary::new(square(1.0, 0.0, 1.0)).with_attribute("id", None),
                Boundary::new(square(2.0, 0.0, 1.0)).with_attribute("id", Some("a")),
            ],
        );

        assert_eq!(boundaries.ids("id").unwrap(), vec!["b", "", "a"]);
    }

    #[test]
    fn test_ids_require_column_and_values() {
        let boundaries = Boundaries::new(
            "district.parquet",
            vec![Boundary::new(square(0.0, 0.0, 1.0)).with_attribute("id", None)],
        );

        assert!(matches!(
            boundaries.ids("district_id"),
            Err(PipelineError::Config(_))
        ));
        assert!(matches!(
            boundaries.ids("id"),
            Err(PipelineError::EmptyBoundaries(_))
        ));
    }
}
