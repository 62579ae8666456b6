//! Output module for crawl records and run reports
//!
//! This module handles:
//! - The [`RecordSink`] seam the coordinator writes records through
//! - The CSV implementation of that sink
//! - Crawl statistics and their console summary

mod csv_sink;
pub mod stats;
mod traits;

pub use csv_sink::{CsvSink, CSV_HEADERS};
pub use stats::{print_statistics, CrawlStatistics};
pub use traits::{OutputError, OutputResult, RecordSink};
