use arrow::array::{Array, BinaryArray, LargeBinaryArray};
use arrow::record_batch::RecordBatch;
use arrow::util::display::array_value_to_string;
use bytes::Bytes;
use geo::{Geometry, GeometryCollection};
use geojson::GeoJson;
use geozero::wkb::{GpkgWkb, Wkb};
use geozero::ToGeo;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use rusqlite::types::ValueRef;
use rusqlite::{Connection, DatabaseName};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::io::Cursor;

use crate::error::{PipelineError, Result};
use crate::models::{Boundaries, Boundary};
use crate::readers::dataset::{Dataset, DatasetFile};
use crate::utils::constants::{
    BOUNDARIES_MARKER, BOUNDARY_EXTENSIONS, DEFAULT_GEOMETRY_COLUMN, EXT_GEOJSON, EXT_GEOPACKAGE,
    EXT_GEOPARQUET,
};
use crate::utils::filename::extension_of;

/// Boundaries file formats understood by [`BoundaryReader`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundaryFormat {
    GeoParquet,
    GeoJson,
    GeoPackage,
}

impl BoundaryFormat {
    pub fn from_filename(filename: &str) -> Option<Self> {
        match extension_of(filename)?.as_str() {
            EXT_GEOPARQUET => Some(BoundaryFormat::GeoParquet),
            EXT_GEOJSON => Some(BoundaryFormat::GeoJson),
            EXT_GEOPACKAGE => Some(BoundaryFormat::GeoPackage),
            _ => None,
        }
    }
}

/// GeoParquet `geo` file metadata, reduced to what the reader needs.
#[derive(Debug, Deserialize)]
struct GeoParquetMetadata {
    primary_column: Option<String>,
    #[serde(default)]
    columns: HashMap<String, GeoParquetColumn>,
}

#[derive(Debug, Deserialize)]
struct GeoParquetColumn {
    encoding: Option<String>,
}

pub struct BoundaryReader;

impl BoundaryReader {
    pub fn new() -> Self {
        Self
    }

    /// Locate and parse the boundaries file in the latest dataset version.
    ///
    /// With a filename, the first file of that exact name and a supported
    /// extension is used. Without one, the first GeoParquet file whose name
    /// contains `district` is used.
    pub fn read_boundaries<D: Dataset>(
        &self,
        dataset: &D,
        filename: Option<&str>,
    ) -> Result<Boundaries> {
        let version = dataset.latest_version()?;

        let selected = match filename {
            Some(name) => version.files.iter().find(|f| {
                f.filename() == name
                    && extension_of(f.filename())
                        .map_or(false, |ext| BOUNDARY_EXTENSIONS.contains(&ext.as_str()))
            }),
            None => version.files.iter().find(|f| {
                f.filename().contains(BOUNDARIES_MARKER)
                    && BoundaryFormat::from_filename(f.filename()) == Some(BoundaryFormat::GeoParquet)
            }),
        };

        let Some(file) = selected else {
            let wanted = filename
                .map(str::to_string)
                .unwrap_or_else(|| format!("*{}*.{}", BOUNDARIES_MARKER, EXT_GEOPARQUET));
            return Err(PipelineError::NotFound(format!(
                "File {} not found in dataset {}",
                wanted,
                dataset.name()
            )));
        };

        let data = file.read()?;
        let format = BoundaryFormat::from_filename(file.filename()).ok_or_else(|| {
            PipelineError::InvalidFormat(format!("Unsupported boundaries file {}", file.filename()))
        })?;

        tracing::debug!(file = file.filename(), version = %version.name, "reading boundaries");
        self.parse(file.filename(), format, data)
    }

    pub fn parse(&self, source: &str, format: BoundaryFormat, data: Vec<u8>) -> Result<Boundaries> {
        let records = match format {
            BoundaryFormat::GeoParquet => self.parse_geoparquet(data)?,
            BoundaryFormat::GeoJson => self.parse_geojson(&data)?,
            BoundaryFormat::GeoPackage => self.parse_geopackage(&data)?,
        };
        Ok(Boundaries::new(source, records))
    }

    fn parse_geoparquet(&self, data: Vec<u8>) -> Result<Vec<Boundary>> {
        let builder = ParquetRecordBatchReaderBuilder::try_new(Bytes::from(data))?;

        let geo_metadata = builder
            .metadata()
            .file_metadata()
            .key_value_metadata()
            .and_then(|kv| kv.iter().find(|entry| entry.key == "geo"))
            .and_then(|entry| entry.value.as_deref())
            .map(serde_json::from_str::<GeoParquetMetadata>)
            .transpose()?;

        let geometry_column = geo_metadata
            .as_ref()
            .and_then(|m| m.primary_column.clone())
            .unwrap_or_else(|| DEFAULT_GEOMETRY_COLUMN.to_string());

        if let Some(encoding) = geo_metadata
            .as_ref()
            .and_then(|m| m.columns.get(&geometry_column))
            .and_then(|c| c.encoding.as_deref())
        {
            if !encoding.eq_ignore_ascii_case("wkb") {
                return Err(PipelineError::InvalidFormat(format!(
                    "Unsupported GeoParquet geometry encoding {}",
                    encoding
                )));
            }
        }

        let reader = builder.build()?;
        let mut records = Vec::new();
        for batch in reader {
            let batch = batch?;
            self.geoparquet_batch(&batch, &geometry_column, &mut records)?;
        }

        Ok(records)
    }

    fn geoparquet_batch(
        &self,
        batch: &RecordBatch,
        geometry_column: &str,
        records: &mut Vec<Boundary>,
    ) -> Result<()> {
        let schema = batch.schema();
        let geometry_index = schema.index_of(geometry_column)?;
        let geometries = batch.column(geometry_index);

        let binary = geometries.as_any().downcast_ref::<BinaryArray>();
        let large_binary = geometries.as_any().downcast_ref::<LargeBinaryArray>();
        if binary.is_none() && large_binary.is_none() {
            return Err(PipelineError::InvalidFormat(format!(
                "Geometry column {} is not WKB binary",
                geometry_column
            )));
        }

        for row in 0..batch.num_rows() {
            let wkb: Option<&[u8]> = if geometries.is_null(row) {
                None
            } else if let Some(array) = binary {
                Some(array.value(row))
            } else {
                large_binary.map(|array| array.value(row))
            };
            let geometry = match wkb {
                Some(bytes) => Wkb(bytes.to_vec()).to_geo()?,
                None => empty_geometry(),
            };

            let mut attributes = BTreeMap::new();
            for (index, field) in schema.fields().iter().enumerate() {
                if index == geometry_index {
                    continue;
                }
                let column = batch.column(index);
                let value = if column.is_null(row) {
                    None
                } else {
                    Some(array_value_to_string(column, row)?)
                };
                attributes.insert(field.name().clone(), value);
            }

            records.push(Boundary {
                attributes,
                geometry,
            });
        }

        Ok(())
    }

    fn parse_geojson(&self, data: &[u8]) -> Result<Vec<Boundary>> {
        let text = std::str::from_utf8(data)
            .map_err(|e| PipelineError::InvalidFormat(format!("GeoJSON is not UTF-8: {}", e)))?;

        let features = match text.parse::<GeoJson>()? {
            GeoJson::FeatureCollection(collection) => collection.features,
            GeoJson::Feature(feature) => vec![feature],
            GeoJson::Geometry(geometry) => vec![geojson::Feature {
                bbox: None,
                geometry: Some(geometry),
                id: None,
                properties: None,
                foreign_members: None,
            }],
        };

        let mut records = Vec::with_capacity(features.len());
        for feature in features {
            let geometry = match feature.geometry {
                Some(geometry) => Geometry::<f64>::try_from(geometry.value)?,
                None => empty_geometry(),
            };

            let mut attributes: BTreeMap<String, Option<String>> = feature
                .properties
                .unwrap_or_default()
                .into_iter()
                .map(|(key, value)| (key, json_to_string(value)))
                .collect();

            // Feature ids stand in for an `id` property when none is given
            if let Some(id) = feature.id {
                let id = match id {
                    geojson::feature::Id::String(s) => s,
                    geojson::feature::Id::Number(n) => n.to_string(),
                };
                attributes.entry("id".to_string()).or_insert(Some(id));
            }

            records.push(Boundary {
                attributes,
                geometry,
            });
        }

        Ok(records)
    }

    fn parse_geopackage(&self, data: &[u8]) -> Result<Vec<Boundary>> {
        let mut conn = Connection::open_in_memory()?;
        conn.deserialize_read_exact(DatabaseName::Main, Cursor::new(data), data.len(), true)?;

        let (table, geometry_column): (String, String) = conn
            .query_row(
                "SELECT table_name, column_name FROM gpkg_geometry_columns ORDER BY rowid LIMIT 1",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => PipelineError::NotFound(
                    "No feature table found in GeoPackage".to_string(),
                ),
                other => PipelineError::Sqlite(other),
            })?;

        let mut stmt = conn.prepare(&format!("SELECT * FROM \"{}\"", table.replace('"', "\"\"")))?;
        let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();

        let mut rows = stmt.query([])?;
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            let mut attributes = BTreeMap::new();
            let mut geometry = empty_geometry();

            for (index, column) in columns.iter().enumerate() {
                let value = row.get_ref(index)?;
                if column.eq_ignore_ascii_case(&geometry_column) {
                    if let ValueRef::Blob(blob) = value {
                        geometry = GpkgWkb(blob.to_vec()).to_geo()?;
                    }
                    continue;
                }
                attributes.insert(column.clone(), sql_to_string(value));
            }

            records.push(Boundary {
                attributes,
                geometry,
            });
        }

        Ok(records)
    }
}

impl Default for BoundaryReader {
    fn default() -> Self {
        Self::new()
    }
}

fn empty_geometry() -> Geometry<f64> {
    Geometry::GeometryCollection(GeometryCollection::default())
}

fn json_to_string(value: serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

fn sql_to_string(value: ValueRef<'_>) -> Option<String> {
    match value {
        ValueRef::Null => None,
        ValueRef::Integer(i) => Some(i.to_string()),
        ValueRef::Real(f) => Some(f.to_string()),
        ValueRef::Text(t) => Some(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Some(format!("<{} bytes>", b.len())),
    }
}
