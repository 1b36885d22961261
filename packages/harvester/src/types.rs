//! Core data types for the harvester.

use std::collections::HashSet;
use std::fmt;

use chrono::NaiveDate;

use crate::config::{MAX_NUMBER, MIN_NUMBER, WINNING_NUMBERS_COUNT};
use crate::error::{FetchError, ParseError};

/// One row of the dataset.
///
/// Only constructible through [`DrawRecord::new`], so every value in
/// circulation satisfies the field constraints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrawRecord {
    draw_number: u32,
    draw_date: NaiveDate,
    winning_numbers: [u8; WINNING_NUMBERS_COUNT],
    bonus_number: u8,
    first_prize_winner_count: u32,
    first_prize_amount: u64,
}

impl DrawRecord {
    /// Validate and build a record.
    ///
    /// # Examples
    /// ```
    /// use chrono::NaiveDate;
    /// use lotto_harvester::types::DrawRecord;
    ///
    /// let date = NaiveDate::from_ymd_opt(2002, 12, 7).unwrap();
    /// let record = DrawRecord::new(1, date, &[10, 23, 29, 33, 37, 40], 16, 0, 0).unwrap();
    /// assert_eq!(record.winning_numbers(), &[10, 23, 29, 33, 37, 40]);
    ///
    /// assert!(DrawRecord::new(1, date, &[10, 23, 29, 33, 37], 16, 0, 0).is_err());
    /// ```
    pub fn new(
        draw_number: u32,
        draw_date: NaiveDate,
        winning_numbers: &[u8],
        bonus_number: u8,
        first_prize_winner_count: u32,
        first_prize_amount: u64,
    ) -> Result<Self, ParseError> {
        if draw_number == 0 {
            return Err(ParseError::InvalidDrawNumber(draw_number));
        }
        let winning_numbers = validate_winning_numbers(winning_numbers)?;
        validate_number(bonus_number)?;

        Ok(Self {
            draw_number,
            draw_date,
            winning_numbers,
            bonus_number,
            first_prize_winner_count,
            first_prize_amount,
        })
    }

    pub fn draw_number(&self) -> u32 {
        self.draw_number
    }

    pub fn draw_date(&self) -> NaiveDate {
        self.draw_date
    }

    pub fn winning_numbers(&self) -> &[u8; WINNING_NUMBERS_COUNT] {
        &self.winning_numbers
    }

    pub fn bonus_number(&self) -> u8 {
        self.bonus_number
    }

    pub fn first_prize_winner_count(&self) -> u32 {
        self.first_prize_winner_count
    }

    pub fn first_prize_amount(&self) -> u64 {
        self.first_prize_amount
    }
}

/// Check count, range and uniqueness of the six winning numbers.
pub fn validate_winning_numbers(numbers: &[u8]) -> Result<[u8; WINNING_NUMBERS_COUNT], ParseError> {
    let fixed: [u8; WINNING_NUMBERS_COUNT] = numbers
        .try_into()
        .map_err(|_| ParseError::WrongNumberCount {
            found: numbers.len(),
        })?;

    let mut seen = HashSet::with_capacity(WINNING_NUMBERS_COUNT);
    for &n in &fixed {
        validate_number(n)?;
        if !seen.insert(n) {
            return Err(ParseError::DuplicateNumber(n));
        }
    }
    Ok(fixed)
}

/// Check a single ball is within 1-45.
pub fn validate_number(n: u8) -> Result<(), ParseError> {
    if (MIN_NUMBER..=MAX_NUMBER).contains(&n) {
        Ok(())
    } else {
        Err(ParseError::NumberOutOfRange { value: u32::from(n) })
    }
}

/// Result of a single request attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Success(String),
    RetryableFailure(String),
    FatalFailure(FatalFailure),
}

/// Non-retryable attempt failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FatalFailure {
    /// 4xx status other than the "no such draw" signal.
    Http { status: u16 },
    /// Request could not be constructed or sent.
    Request(String),
    /// No page exists for this draw yet; nothing beyond it exists either.
    NotYetDrawn,
}

/// Terminal state of one draw number within a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrawOutcome {
    Succeeded,
    Skipped,
    Failed(FailureReason),
}

impl DrawOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Succeeded => "succeeded",
            Self::Skipped => "skipped",
            Self::Failed(_) => "failed",
        }
    }
}

/// Why a draw ended up `Failed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    Fetch(FetchError),
    Parse(ParseError),
    Write(String),
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fetch(e) => write!(f, "fetch: {e}"),
            Self::Parse(e) => write!(f, "parse: {e}"),
            Self::Write(e) => write!(f, "write: {e}"),
        }
    }
}

/// A failed draw kept for operator follow-up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrawFailure {
    pub draw_number: u32,
    pub reason: FailureReason,
}

/// How a run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunEnd {
    /// Every draw number in the range reached a terminal state.
    #[default]
    Completed,
    /// The source reported `draw_number` as not drawn yet; later draws were not tried.
    ReachedLatest { draw_number: u32 },
    /// Interrupted while processing `draw_number`.
    Interrupted { draw_number: u32 },
    /// Consecutive write failures ended the run after `draw_number`.
    WriteFailures { draw_number: u32 },
}

/// Counters and failures for one invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub attempted: usize,
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: usize,
    pub failures: Vec<DrawFailure>,
    pub end: RunEnd,
}

impl RunSummary {
    /// Account for one draw reaching a terminal state.
    pub fn record(&mut self, draw_number: u32, outcome: &DrawOutcome) {
        self.attempted += 1;
        match outcome {
            DrawOutcome::Succeeded => self.succeeded += 1,
            DrawOutcome::Skipped => self.skipped += 1,
            DrawOutcome::Failed(reason) => {
                self.failed += 1;
                self.failures.push(DrawFailure {
                    draw_number,
                    reason: reason.clone(),
                });
            }
        }
    }

    /// Draw numbers to retry with a narrowed range.
    pub fn failed_draws(&self) -> Vec<u32> {
        self.failures.iter().map(|f| f.draw_number).collect()
    }

    /// No failures and no early stop.
    pub fn is_clean(&self) -> bool {
        self.failed == 0
            && matches!(self.end, RunEnd::Completed | RunEnd::ReachedLatest { .. })
    }
}

/// Observation emitted after each terminal transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Progress {
    pub draw_number: u32,
    pub outcome: &'static str,
    pub attempted: usize,
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: usize,
    pub total: usize,
}
