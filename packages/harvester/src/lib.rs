//! Lotto Harvester - Collect lottery draw results into a CSV dataset.
//!
//! This crate fetches one result page per draw number from the lottery
//! website, extracts the draw record from it and appends it to a local CSV
//! dataset ordered by draw number. Runs are idempotent: draws already in the
//! dataset are skipped.
//!
//! # Example
//!
//! ```
//! use lotto_harvester::config::FetchConfig;
//! use lotto_harvester::stats::format_amount;
//!
//! let config = FetchConfig::default();
//! assert!(config.validate().is_ok());
//! assert_eq!(format_amount(2_067_000_000), "2,067,000,000");
//! ```
//!
//! # Architecture
//!
//! The harvester is organized into several modules:
//!
//! - [`config`]: Configuration constants, environment settings and validation
//! - [`types`]: Core data types (DrawRecord, RunSummary, etc.)
//! - [`error`]: Error types and Result alias
//! - [`http`]: Rate-limited, retrying page fetcher
//! - [`parser`]: Result page parsing
//! - [`range`]: Draw range resolution and latest draw discovery
//! - [`writer`]: CSV dataset store
//! - [`harvester`]: Main harvester service
//! - [`stats`]: Dataset statistics and gap report
//! - [`cli`]: Command-line interface

pub mod cli;
pub mod config;
pub mod error;
pub mod harvester;
pub mod http;
pub mod parser;
pub mod range;
pub mod stats;
pub mod types;
pub mod writer;

// Re-export commonly used items
pub use config::FetchConfig;
pub use error::{FetchError, HarvesterError, ParseError, Result, WriteError};
pub use harvester::Harvester;
pub use http::{DrawSource, Fetcher, HttpSource};
pub use types::{DrawOutcome, DrawRecord, FetchOutcome, RunEnd, RunSummary};
pub use writer::{CsvDataset, DrawStore};
