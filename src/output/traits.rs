//! Output sink trait and error types

use crate::crawler::PageRecord;
use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Failed to create output file {path}: {source}")]
    Create {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to write record for {url}: {source}")]
    Write { url: String, source: csv::Error },

    #[error("Failed to flush output: {0}")]
    Flush(#[source] std::io::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Durable destination for crawl records
///
/// Both methods take `&self`: a sink is shared between the coordinator and
/// whoever reports on it, and implementations serialize writes internally so
/// a row is never interleaved with another.
pub trait RecordSink: Send + Sync {
    /// Records one row
    fn append(&self, record: &PageRecord) -> OutputResult<()>;

    /// Hands every previously appended row to the underlying writer
    ///
    /// For a file this means the operating system has the bytes and any other
    /// reader sees them; it does not force them to stable storage.
    fn flush(&self) -> OutputResult<()>;
}
