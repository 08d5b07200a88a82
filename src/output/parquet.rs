//! Parquet frame writer
//!
//! Compiled in with the `parquet` cargo feature. Every column is written as a
//! nullable UTF-8 string using the same cell rendering as the CSV writer, so the
//! two formats hold identical text. Without the feature the writer reports
//! [`OutputError::ParquetError`] and [`engine_available`] returns `false`.

use crate::Record;
use std::io::Write;

use super::{FrameWriter, OutputError, OutputResult};

/// Whether the columnar engine was compiled in
pub fn engine_available() -> bool {
    cfg!(feature = "parquet")
}

/// Buffers rows and writes them as a single row group on close
pub struct ParquetFrameWriter<W: Write + Send> {
    inner: W,
    rows: Vec<Record>,
}

impl<W: Write + Send> ParquetFrameWriter<W> {
    /// Create a writer over any byte sink
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            rows: Vec::new(),
        }
    }
}

impl<W: Write + Send> FrameWriter for ParquetFrameWriter<W> {
    fn write_rows(&mut self, rows: &[Record]) -> OutputResult<()> {
        self.rows.extend_from_slice(rows);
        Ok(())
    }

    fn close(self) -> OutputResult<()> {
        encode(&self.rows, self.inner)
    }
}

#[cfg(feature = "parquet")]
fn encode<W: Write + Send>(rows: &[Record], inner: W) -> OutputResult<()> {
    use super::{cell_text, collect_columns};
    use arrow::array::{ArrayRef, StringArray};
    use arrow::datatypes::{DataType, Field, Schema};
    use arrow::record_batch::{RecordBatch, RecordBatchOptions};
    use ::parquet::arrow::ArrowWriter;
    use std::sync::Arc;

    let columns = collect_columns(rows);
    let fields: Vec<Field> = columns
        .iter()
        .map(|name| Field::new(name.as_str(), DataType::Utf8, true))
        .collect();
    let schema = Arc::new(Schema::new(fields));

    let arrays: Vec<ArrayRef> = columns
        .iter()
        .map(|name| {
            let values: StringArray = rows.iter().map(|row| cell_text(row.get(name))).collect();
            Arc::new(values) as ArrayRef
        })
        .collect();

    let options = RecordBatchOptions::new().with_row_count(Some(rows.len()));
    let batch = RecordBatch::try_new_with_options(schema.clone(), arrays, &options)
        .map_err(|e| OutputError::ParquetError(format!("Failed to build record batch: {e}")))?;

    let mut writer = ArrowWriter::try_new(inner, schema, None)
        .map_err(|e| OutputError::ParquetError(format!("Failed to create writer: {e}")))?;
    writer
        .write(&batch)
        .map_err(|e| OutputError::ParquetError(format!("Failed to write batch: {e}")))?;
    writer
        .close()
        .map_err(|e| OutputError::ParquetError(format!("Failed to close writer: {e}")))?;

    tracing::debug!("Parquet writer closed: {} rows, {} columns", rows.len(), columns.len());
    Ok(())
}

#[cfg(not(feature = "parquet"))]
fn encode<W: Write + Send>(_rows: &[Record], _inner: W) -> OutputResult<()> {
    Err(OutputError::ParquetError(
        "parquet support not compiled in (enable the `parquet` feature)".to_string(),
    ))
}
