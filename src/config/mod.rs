//! Configuration module for Ripple-Harvest
//!
//! This module handles loading, parsing, and validating TOML configuration
//! files. Every key is optional; command-line flags are applied on top of the
//! loaded values by the binary.
//!
//! # Example
//!
//! ```no_run
//! use ripple_harvest::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("harvest.toml")).unwrap();
//! println!("Writing records to {}", config.output.csv_path);
//! ```

mod parser;
mod types;
mod validation;

pub use types::{Config, CrawlerConfig, OutputConfig, SelectorConfig, UserAgentConfig};

pub use parser::{compute_config_hash, load_config, parse_config};
pub use validation::{validate, MAX_CONCURRENT_FETCHES};

pub(crate) use validation::compile_selector;
