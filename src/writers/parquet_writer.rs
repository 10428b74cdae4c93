use arrow::array::*;
use arrow::datatypes::{DataType, Date32Type, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::basic::{Compression, GzipLevel, ZstdLevel};
use parquet::file::properties::WriterProperties;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use crate::error::{PipelineError, Result};
use crate::models::{DailyRecord, Frequency, PeriodRecord};
use crate::utils::constants::{
    BOUNDARY_ID_COLUMN, COMPRESSION_GZIP, COMPRESSION_LZ4, COMPRESSION_NONE, COMPRESSION_SNAPPY,
    COMPRESSION_ZSTD, DEFAULT_ROW_GROUP_SIZE,
};

pub struct ParquetWriter {
    compression: Compression,
    row_group_size: usize,
}

impl ParquetWriter {
    pub fn new() -> Self {
        Self {
            compression: Compression::SNAPPY,
            row_group_size: DEFAULT_ROW_GROUP_SIZE,
        }
    }

    pub fn with_compression(mut self, compression: &str) -> Result<Self> {
        self.compression = match compression.to_lowercase().as_str() {
            COMPRESSION_SNAPPY => Compression::SNAPPY,
            COMPRESSION_GZIP => Compression::GZIP(GzipLevel::default()),
            COMPRESSION_LZ4 => Compression::LZ4,
            COMPRESSION_ZSTD => Compression::ZSTD(ZstdLevel::default()),
            COMPRESSION_NONE => Compression::UNCOMPRESSED,
            _ => {
                return Err(PipelineError::Config(format!(
                    "Unsupported compression: {}",
                    compression
                )))
            }
        };
        Ok(self)
    }

    /// Write daily statistics, keyed by boundary id and date.
    pub fn write_daily(&self, records: &[DailyRecord], path: &Path) -> Result<()> {
        let schema = Self::daily_schema();

        let boundary_ids: Vec<&str> = records.iter().map(|r| r.boundary_id.as_str()).collect();
        let dates: Vec<i32> = records
            .iter()
            .map(|r| Date32Type::from_naive_date(r.date))
            .collect();

        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![
                Arc::new(StringArray::from(boundary_ids)),
                Arc::new(Date32Array::from(dates)),
                Arc::new(Float64Array::from(
                    records.iter().map(|r| r.mean).collect::<Vec<_>>(),
                )),
                Arc::new(Float64Array::from(
                    records.iter().map(|r| r.min).collect::<Vec<_>>(),
                )),
                Arc::new(Float64Array::from(
                    records.iter().map(|r| r.max).collect::<Vec<_>>(),
                )),
            ],
        )?;

        self.write_batch(schema, &batch, path)
    }

    /// Write weekly, epi-weekly or monthly statistics.
    pub fn write_periods(
        &self,
        records: &[PeriodRecord],
        frequency: Frequency,
        path: &Path,
    ) -> Result<()> {
        if frequency == Frequency::Daily {
            return Err(PipelineError::Config(
                "Daily tables are written with write_daily".to_string(),
            ));
        }

        let schema = Self::period_schema(frequency);

        let boundary_ids: Vec<&str> = records.iter().map(|r| r.boundary_id.as_str()).collect();
        let periods: Vec<&str> = records.iter().map(|r| r.period.as_str()).collect();

        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![
                Arc::new(StringArray::from(boundary_ids)),
                Arc::new(StringArray::from(periods)),
                Arc::new(Float64Array::from(
                    records.iter().map(|r| r.mean).collect::<Vec<_>>(),
                )),
                Arc::new(Float64Array::from(
                    records.iter().map(|r| r.min).collect::<Vec<_>>(),
                )),
                Arc::new(Float64Array::from(
                    records.iter().map(|r| r.max).collect::<Vec<_>>(),
                )),
            ],
        )?;

        self.write_batch(schema, &batch, path)
    }

    fn write_batch(&self, schema: Arc<Schema>, batch: &RecordBatch, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = File::create(path)?;
        let props = WriterProperties::builder()
            .set_compression(self.compression)
            .set_max_row_group_size(self.row_group_size)
            .build();

        let mut writer = ArrowWriter::try_new(file, schema, Some(props))?;
        writer.write(batch)?;
        writer.close()?;

        Ok(())
    }

    fn daily_schema() -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            Field::new(BOUNDARY_ID_COLUMN, DataType::Utf8, false),
            Field::new(Frequency::Daily.period_column(), DataType::Date32, false),
            Field::new("mean", DataType::Float64, true),
            Field::new("min", DataType::Float64, true),
            Field::new("max", DataType::Float64, true),
        ]))
    }

    fn period_schema(frequency: Frequency) -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            Field::new(BOUNDARY_ID_COLUMN, DataType::Utf8, false),
            Field::new(frequency.period_column(), DataType::Utf8, false),
            Field::new("mean", DataType::Float64, true),
            Field::new("min", DataType::Float64, true),
            Field::new("max", DataType::Float64, true),
        ]))
    }

    /// Read back a daily table written by [`ParquetWriter::write_daily`].
    pub fn read_daily(&self, path: &Path) -> Result<Vec<DailyRecord>> {
        let mut records = Vec::new();
        for batch in Self::read_batches(path)? {
            let ids = string_column(&batch, 0)?;
            let dates = batch
                .column(1)
                .as_any()
                .downcast_ref::<Date32Array>()
                .ok_or_else(|| PipelineError::InvalidFormat("Invalid date column type".to_string()))?;
            let (means, mins, maxs) = stat_columns(&batch)?;

            for i in 0..batch.num_rows() {
                records.push(DailyRecord {
                    boundary_id: ids.value(i).to_string(),
                    date: Date32Type::to_naive_date(dates.value(i)),
                    mean: optional(means, i),
                    min: optional(mins, i),
                    max: optional(maxs, i),
                });
            }
        }
        Ok(records)
    }

    /// Read back a weekly or monthly table written by [`ParquetWriter::write_periods`].
    pub fn read_periods(&self, path: &Path) -> Result<Vec<PeriodRecord>> {
        let mut records = Vec::new();
        for batch in Self::read_batches(path)? {
            let ids = string_column(&batch, 0)?;
            let periods = string_column(&batch, 1)?;
            let (means, mins, maxs) = stat_columns(&batch)?;

            for i in 0..batch.num_rows() {
                records.push(PeriodRecord {
                    boundary_id: ids.value(i).to_string(),
                    period: periods.value(i).to_string(),
                    mean: optional(means, i),
                    min: optional(mins, i),
                    max: optional(maxs, i),
                });
            }
        }
        Ok(records)
    }

    fn read_batches(path: &Path) -> Result<Vec<RecordBatch>> {
        let file = File::open(path)?;
        let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;
        let mut batches = Vec::new();
        for batch in reader {
            batches.push(batch?);
        }
        Ok(batches)
    }

    /// Get file statistics
    pub fn get_file_info(&self, path: &Path) -> Result<ParquetFileInfo> {
        use parquet::file::reader::{FileReader, SerializedFileReader};

        let file = File::open(path)?;
        let reader = SerializedFileReader::new(file)?;
        let metadata = reader.metadata();

        let file_metadata = metadata.file_metadata();
        let row_groups = metadata.num_row_groups();
        let total_rows = file_metadata.num_rows();
        let file_size = std::fs::metadata(path)?.len();

        let columns = file_metadata
            .schema_descr()
            .columns()
            .iter()
            .map(|c| c.name().to_string())
            .collect();

        let compression = if row_groups > 0 && metadata.row_group(0).num_columns() > 0 {
            metadata.row_group(0).column(0).compression()
        } else {
            self.compression
        };

        Ok(ParquetFileInfo {
            total_rows,
            row_groups: row_groups as i32,
            file_size,
            compression,
            columns,
        })
    }
}

impl Default for ParquetWriter {
    fn default() -> Self {
        Self::new()
    }
}

fn string_column(batch: &RecordBatch, index: usize) -> Result<&StringArray> {
    batch
        .column(index)
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| {
            PipelineError::InvalidFormat(format!(
                "Invalid {} column type",
                batch.schema().field(index).name()
            ))
        })
}

fn stat_columns(batch: &RecordBatch) -> Result<(&Float64Array, &Float64Array, &Float64Array)> {
    let column = move |index: usize| {
        batch
            .column(index)
            .as_any()
            .downcast_ref::<Float64Array>()
            .ok_or_else(|| {
                PipelineError::InvalidFormat(format!(
                    "Invalid {} column type",
                    batch.schema().field(index).name()
                ))
            })
    };
    Ok((column(2)?, column(3)?, column(4)?))
}

fn optional(array: &Float64Array, index: usize) -> Option<f64> {
    (!array.is_null(index)).then(|| array.value(index))
}

#[derive(Debug)]
pub struct ParquetFileInfo {
    pub total_rows: i64,
    pub row_groups: i32,
    pub file_size: u64,
    pub compression: Compression,
    pub columns: Vec<String>,
}

impl ParquetFileInfo {
    pub fn summary(&self) -> String {
        format!(
            "Rows: {}, Row groups: {}, Size: {:.2} KB, Compression: {:?}, Columns: {}",
            self.total_rows,
            self.row_groups,
            self.file_size as f64 / 1024.0,
            self.compression,
            self.columns.join(", ")
        )
    }
}
