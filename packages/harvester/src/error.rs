//! Error types for the harvester.
//!
//! `HarvesterError` is the run-fatal error returned to library consumers
//! (bad configuration, unresolvable range, unusable dataset). The per-draw
//! error types (`FetchError`, `ParseError`, `WriteError`) never escape the
//! orchestrator; they end up as entries in the run summary.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Main error type for the harvester library.
#[derive(Debug, Error)]
pub enum HarvesterError {
    /// Invalid configuration value.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Explicit start/end pair that does not form a range.
    #[error("Invalid draw range: start {start} is after end {end}")]
    InvalidRange { start: u32, end: u32 },

    /// Draw numbers start at 1.
    #[error("Invalid draw number: {0}. Draw numbers start at 1")]
    InvalidDrawNumber(u32),

    /// Auto-discovery found no existing draw at the lower bound.
    #[error("No existing draw found at or after draw {lower_bound}")]
    NoDrawsFound { lower_bound: u32 },

    /// Auto-discovery could not decide whether a draw exists.
    #[error("Failed to discover latest draw while probing draw {draw_number}: {source}")]
    Discovery {
        draw_number: u32,
        #[source]
        source: FetchError,
    },

    /// HTTP client could not be constructed.
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    /// The output dataset could not be opened or read.
    #[error("Dataset error: {0}")]
    Dataset(#[from] WriteError),
}

/// Result type alias for harvester operations.
pub type Result<T> = std::result::Result<T, HarvesterError>;

/// Failure to obtain a draw page, after the fetcher's own retry loop.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// Transient failures (network, 5xx) on every allowed attempt.
    #[error("Gave up after {attempts} attempts: {reason}")]
    RetriesExhausted { attempts: u32, reason: String },

    /// Non-retryable HTTP status.
    #[error("Server rejected request with status {status}")]
    FatalHttp { status: u16 },

    /// Request could not be built or sent for a non-transient reason.
    #[error("Request failed: {0}")]
    Request(String),

    /// The upstream source has no page for this draw yet.
    #[error("Draw {draw_number} has not been drawn yet")]
    NotYetDrawn { draw_number: u32 },

    /// The run was interrupted while waiting or fetching.
    #[error("Interrupted")]
    Cancelled,
}

/// Structural anchors the parser relies on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    WinningNumbers,
    BonusNumber,
    DrawDate,
    FirstPrize,
}

impl fmt::Display for Anchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::WinningNumbers => "winning numbers",
            Self::BonusNumber => "bonus number",
            Self::DrawDate => "draw date",
            Self::FirstPrize => "first prize row",
        };
        f.write_str(name)
    }
}

/// Reasons a fetched page does not yield a valid draw record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// Page shape no longer matches expectations (upstream format drift).
    #[error("Missing structural anchor: {0}")]
    MissingAnchor(Anchor),

    /// Draw numbers start at 1.
    #[error("Invalid draw number {0}")]
    InvalidDrawNumber(u32),

    #[error("Expected 6 winning numbers, found {found}")]
    WrongNumberCount { found: usize },

    #[error("Number {value} is outside 1-45")]
    NumberOutOfRange { value: u32 },

    #[error("Unreadable ball value: '{0}'")]
    InvalidBall(String),

    #[error("Winning number {0} appears more than once")]
    DuplicateNumber(u8),

    #[error("Unparseable draw date: '{0}'")]
    InvalidDate(String),

    #[error("Unparseable winner count: '{0}'")]
    InvalidWinnerCount(String),

    #[error("Unparseable prize amount: '{0}'")]
    InvalidPrizeAmount(String),

    /// The page describes another draw than the one requested.
    #[error("Page shows draw {found}, expected draw {expected}")]
    DrawNumberMismatch { expected: u32, found: u32 },
}

/// Storage-level failures of the dataset writer.
#[derive(Debug, Error)]
pub enum WriteError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Staged file could not be renamed over the dataset.
    #[error("Failed to publish staged dataset to {path}: {source}")]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Existing dataset has different columns.
    #[error("Unexpected dataset header in {path}: {found}")]
    SchemaMismatch { path: PathBuf, found: String },

    /// Existing dataset holds a row that is not a valid draw record.
    #[error("Invalid row for draw {draw_number} in {path}: {reason}")]
    CorruptRow {
        path: PathBuf,
        draw_number: u32,
        reason: ParseError,
    },

    /// Existing dataset lists the same draw twice.
    #[error("Draw {draw_number} appears more than once in {path}")]
    DuplicateRow { path: PathBuf, draw_number: u32 },
}
