//! CSV frame writer

use crate::Record;
use csv::Writer;
use std::io::{BufWriter, Write};
use tracing::debug;

use super::{cell_text, collect_columns, FrameWriter, OutputError, OutputResult};

const DEFAULT_BUFFER_SIZE: usize = 8192; // 8KB buffer

/// Writes loosely-typed rows as CSV.
///
/// The header is the union of keys across the rows in first-seen order. String
/// values are written raw, null or missing values as empty cells, and nested
/// values as compact JSON text.
pub struct CsvFrameWriter<W: Write> {
    writer: Writer<BufWriter<W>>,
    rows_written: u64,
}

impl<W: Write> CsvFrameWriter<W> {
    /// Create a writer over any byte sink
    pub fn new(inner: W) -> Self {
        Self::new_with_buffer_size(inner, DEFAULT_BUFFER_SIZE)
    }

    /// Create a writer with a custom buffer size
    pub fn new_with_buffer_size(inner: W, buffer_size: usize) -> Self {
        let buf_writer = BufWriter::with_capacity(buffer_size, inner);
        Self {
            writer: Writer::from_writer(buf_writer),
            rows_written: 0,
        }
    }

    /// Get number of rows written so far
    pub fn rows_written(&self) -> u64 {
        self.rows_written
    }
}

impl<W: Write> FrameWriter for CsvFrameWriter<W> {
    fn write_rows(&mut self, rows: &[Record]) -> OutputResult<()> {
        let columns = collect_columns(rows);
        if columns.is_empty() {
            debug!("No columns to write; CSV output left empty");
            return Ok(());
        }

        self.writer
            .write_record(&columns)
            .map_err(|e| OutputError::CsvError(format!("Failed to write header: {e}")))?;

        for row in rows {
            let cells = columns
                .iter()
                .map(|column| cell_text(row.get(column)).unwrap_or_default());
            self.writer
                .write_record(cells)
                .map_err(|e| OutputError::CsvError(format!("Failed to write row: {e}")))?;
            self.rows_written += 1;
        }

        Ok(())
    }

    fn close(mut self) -> OutputResult<()> {
        self.writer
            .flush()
            .map_err(|e| OutputError::IoError(format!("Failed to flush: {e}")))?;

        let buf_writer = self
            .writer
            .into_inner()
            .map_err(|e| OutputError::IoError(format!("Failed to get inner writer: {e}")))?;
        buf_writer
            .into_inner()
            .map_err(|e| OutputError::IoError(format!("Failed to flush buffer: {e}")))?;

        debug!("CSV writer closed: {} rows written", self.rows_written);
        Ok(())
    }
}
