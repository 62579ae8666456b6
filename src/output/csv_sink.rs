//! CSV record sink
//!
//! Rows are written through a single mutex-guarded `csv::Writer`, so each
//! record lands as one complete row regardless of how many tasks append.

use crate::crawler::PageRecord;
use crate::output::traits::{OutputError, OutputResult, RecordSink};
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Column names written when a header row is requested
pub const CSV_HEADERS: [&str; 4] = ["url", "title", "author", "date"];

/// Mutex-guarded CSV writer over any byte sink
pub struct CsvSink<W: Write + Send> {
    writer: Mutex<csv::Writer<W>>,
}

impl CsvSink<File> {
    /// Creates (or truncates) the output file
    ///
    /// # Arguments
    ///
    /// * `path` - Destination file
    /// * `write_header` - Emit a `url,title,author,date` header row first
    ///
    /// # Returns
    ///
    /// * `Ok(CsvSink)` - File created and ready for rows
    /// * `Err(OutputError::Create)` - The file could not be created
    pub fn create(path: &Path, write_header: bool) -> OutputResult<Self> {
        let file = File::create(path).map_err(|source| OutputError::Create {
            path: path.display().to_string(),
            source,
        })?;

        let sink = Self::new(file);
        if write_header {
            sink.write_header()?;
        }

        Ok(sink)
    }
}

impl<W: Write + Send> CsvSink<W> {
    /// Wraps an existing writer; no header is written
    pub fn new(inner: W) -> Self {
        Self {
            writer: Mutex::new(csv::Writer::from_writer(inner)),
        }
    }

    fn write_header(&self) -> OutputResult<()> {
        self.lock()
            .write_record(CSV_HEADERS)
            .map_err(|source| OutputError::Write {
                url: "<header>".to_string(),
                source,
            })
    }

    fn lock(&self) -> MutexGuard<'_, csv::Writer<W>> {
        self.writer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Flushes and returns the underlying writer
    pub fn into_inner(self) -> OutputResult<W> {
        self.writer
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
            .into_inner()
            .map_err(|e| {
                OutputError::Flush(std::io::Error::new(e.error().kind(), e.error().to_string()))
            })
    }
}

impl<W: Write + Send> RecordSink for CsvSink<W> {
    fn append(&self, record: &PageRecord) -> OutputResult<()> {
        self.lock()
            .write_record(record.as_row())
            .map_err(|source| OutputError::Write {
                url: record.url.clone(),
                source,
            })
    }

    fn flush(&self) -> OutputResult<()> {
        self.lock().flush().map_err(OutputError::Flush)
    }
}
