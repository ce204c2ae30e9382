use anyhow::{Context, Result};
use arrow::array::{
    Array, ArrayRef, Float64Array, Int64Array, StringArray, TimestampMillisecondArray,
};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Field, Schema, TimeUnit};
use arrow::record_batch::RecordBatch;
use chrono::DateTime;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::file::properties::WriterProperties;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use crate::frame::{Column, ColumnData, Frame};
use crate::models::{quotes_to_frame, QuoteRecord};

const UTC: &str = "UTC";

pub struct ParquetStorage;

impl ParquetStorage {
    /// Writes quote records with the snapshot column layout.
    ///
    /// # Errors
    /// Returns an error if the file cannot be created or written.
    pub fn write_quotes(path: impl AsRef<Path>, quotes: &[QuoteRecord]) -> Result<()> {
        Self::write_frame(path, &quotes_to_frame(quotes))
    }

    /// Reads every column of a parquet file into a [`Frame`].
    ///
    /// Integer and boolean columns become `Int`, floating point and decimal
    /// columns `Float`, temporal columns UTC `Timestamp` (millisecond
    /// precision) and everything else is cast to `Text`. Columns that
    /// cannot be represented are skipped with a warning.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened or decoded.
    pub fn read_frame(path: impl AsRef<Path>) -> Result<Frame> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("Failed to open parquet file: {}", path.display()))?;
        let reader = ParquetRecordBatchReaderBuilder::try_new(file)
            .with_context(|| format!("Failed to read parquet metadata: {}", path.display()))?
            .build()?;

        let mut columns: Vec<Column> = Vec::new();
        let mut skipped: Vec<String> = Vec::new();

        for batch in reader {
            let batch = batch?;
            let schema = batch.schema();

            for (field, array) in schema.fields().iter().zip(batch.columns()) {
                if skipped.contains(field.name()) {
                    continue;
                }
                let Some(data) = to_column_data(field.data_type(), array)? else {
                    tracing::warn!(
                        "Skipping column '{}' with unsupported type {}",
                        field.name(),
                        field.data_type()
                    );
                    skipped.push(field.name().clone());
                    continue;
                };

                match columns.iter_mut().find(|c| &c.name == field.name()) {
                    Some(existing) => append(&mut existing.data, data),
                    None => columns.push(Column {
                        name: field.name().clone(),
                        data,
                    }),
                }
            }
        }

        let frame = columns
            .into_iter()
            .fold(Frame::new(), |frame, c| frame.with_column(c.name, c.data));
        frame.check_shape()?;
        Ok(frame)
    }

    /// Writes a [`Frame`] to a snappy-compressed parquet file.
    ///
    /// # Errors
    /// Returns an error if the frame is ragged or the file cannot be written.
    pub fn write_frame(path: impl AsRef<Path>, frame: &Frame) -> Result<()> {
        frame.check_shape()?;
        let path = path.as_ref();

        let fields: Vec<Field> = frame
            .columns()
            .iter()
            .map(|c| Field::new(&c.name, arrow_type(&c.data), true))
            .collect();
        let schema = Arc::new(Schema::new(fields));

        let arrays: Vec<ArrayRef> = frame
            .columns()
            .iter()
            .map(|c| to_arrow_array(&c.data))
            .collect();

        let batch = RecordBatch::try_new(schema.clone(), arrays)?;

        let file = File::create(path)
            .with_context(|| format!("Failed to create parquet file: {}", path.display()))?;
        let props = WriterProperties::builder()
            .set_compression(parquet::basic::Compression::SNAPPY)
            .build();
        let mut writer = ArrowWriter::try_new(file, schema, Some(props))?;

        writer.write(&batch)?;
        writer.close()?;

        Ok(())
    }
}

fn arrow_type(data: &ColumnData) -> DataType {
    match data {
        ColumnData::Int(_) => DataType::Int64,
        ColumnData::Float(_) => DataType::Float64,
        ColumnData::Text(_) => DataType::Utf8,
        ColumnData::Timestamp(_) => DataType::Timestamp(TimeUnit::Millisecond, Some(UTC.into())),
    }
}

fn to_arrow_array(data: &ColumnData) -> ArrayRef {
    match data {
        ColumnData::Int(v) => Arc::new(Int64Array::from(v.clone())),
        ColumnData::Float(v) => Arc::new(Float64Array::from(v.clone())),
        ColumnData::Text(v) => Arc::new(StringArray::from(v.clone())),
        ColumnData::Timestamp(v) => Arc::new(
            TimestampMillisecondArray::from(
                v.iter()
                    .map(|ts| ts.map(|t| t.timestamp_millis()))
                    .collect::<Vec<_>>(),
            )
            .with_timezone(UTC),
        ),
    }
}

fn to_column_data(data_type: &DataType, array: &ArrayRef) -> Result<Option<ColumnData>> {
    let data = match data_type {
        DataType::Boolean
        | DataType::Int8
        | DataType::Int16
        | DataType::Int32
        | DataType::Int64
        | DataType::UInt8
        | DataType::UInt16
        | DataType::UInt32
        | DataType::UInt64 => {
            let values = cast(array, &DataType::Int64)?;
            let values = downcast::<Int64Array>(&values)?;
            ColumnData::Int(values.iter().collect())
        }
        DataType::Float16
        | DataType::Float32
        | DataType::Float64
        | DataType::Decimal128(_, _)
        | DataType::Decimal256(_, _) => {
            let values = cast(array, &DataType::Float64)?;
            let values = downcast::<Float64Array>(&values)?;
            ColumnData::Float(values.iter().collect())
        }
        DataType::Timestamp(_, _) | DataType::Date32 | DataType::Date64 => {
            let values = cast(array, &DataType::Timestamp(TimeUnit::Millisecond, None))?;
            let values = downcast::<TimestampMillisecondArray>(&values)?;
            ColumnData::Timestamp(
                values
                    .iter()
                    .map(|ms| ms.and_then(DateTime::from_timestamp_millis))
                    .collect(),
            )
        }
        _ => match cast(array, &DataType::Utf8) {
            Ok(values) => {
                let values = downcast::<StringArray>(&values)?;
                ColumnData::Text(values.iter().map(|s| s.map(str::to_string)).collect())
            }
            Err(_) => return Ok(None),
        },
    };
    Ok(Some(data))
}

fn downcast<T: Array + 'static>(array: &ArrayRef) -> Result<&T> {
    array
        .as_any()
        .downcast_ref::<T>()
        .with_context(|| format!("Unexpected arrow array type {}", array.data_type()))
}

fn append(target: &mut ColumnData, more: ColumnData) {
    match (target, more) {
        (ColumnData::Int(a), ColumnData::Int(b)) => a.extend(b),
        (ColumnData::Float(a), ColumnData::Float(b)) => a.extend(b),
        (ColumnData::Text(a), ColumnData::Text(b)) => a.extend(b),
        (ColumnData::Timestamp(a), ColumnData::Timestamp(b)) => a.extend(b),
        // A parquet schema is fixed across row groups, so kinds always agree.
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn frame_survives_parquet_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame.parquet");
        let ts = Utc.with_ymd_and_hms(2025, 10, 23, 1, 30, 0).unwrap();

        let frame = Frame::new()
            .with_text("price_bin", vec![Some("(90, 99]".to_string()), None])
            .with_int("count", vec![Some(12), Some(3)])
            .with_float("tstat", vec![Some(1.25), None])
            .with_timestamp("as_of", vec![Some(ts), None]);

        ParquetStorage::write_frame(&path, &frame).unwrap();
        let back = ParquetStorage::read_frame(&path).unwrap();

        assert_eq!(back, frame);
    }

    #[test]
    fn read_frame_reports_missing_file() {
        let err = ParquetStorage::read_frame("no/such/file.parquet").unwrap_err();
        assert!(err.to_string().contains("no/such/file.parquet"));
    }
}
