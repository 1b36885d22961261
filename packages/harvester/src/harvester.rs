//! Main harvester service that ties all components together.
//!
//! Draws are processed one at a time in ascending order. Each draw number
//! moves through `Pending → Fetching → Parsing → Writing` and ends in exactly
//! one [`DrawOutcome`]; a failed draw is recorded and the run moves on.

use std::ops::RangeInclusive;

use crate::error::FetchError;
use crate::http::{DrawSource, Fetcher};
use crate::parser;
use crate::types::{DrawOutcome, FailureReason, Progress, RunEnd, RunSummary};
use crate::writer::DrawStore;

/// Consecutive write failures after which the run is abandoned.
pub const MAX_CONSECUTIVE_WRITE_FAILURES: u32 = 3;

/// Non-terminal stage of a draw number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawStage {
    Pending,
    Fetching,
    Parsing,
    Writing,
}

/// How processing one draw number ended.
enum Step {
    Done(DrawOutcome),
    NotYetDrawn,
    Cancelled,
}

/// Sequential pipeline over a range of draw numbers.
pub struct Harvester<S, W> {
    fetcher: Fetcher<S>,
    store: W,
}

impl<S: DrawSource, W: DrawStore> Harvester<S, W> {
    pub fn new(fetcher: Fetcher<S>, store: W) -> Self {
        Self { fetcher, store }
    }

    pub fn store(&self) -> &W {
        &self.store
    }

    pub fn into_store(self) -> W {
        self.store
    }

    /// Process every draw number in `range`, returning the run summary.
    ///
    /// `on_progress` is called after each draw reaches a terminal state. The
    /// run stops early when the source reports a draw as not drawn yet, when
    /// it is cancelled, or after [`MAX_CONSECUTIVE_WRITE_FAILURES`] write
    /// failures in a row. Per-draw failures never end the run on their own.
    pub async fn run<F>(&mut self, range: RangeInclusive<u32>, mut on_progress: F) -> RunSummary
    where
        F: FnMut(&Progress),
    {
        let total = range.clone().count();
        let mut summary = RunSummary::default();
        let mut write_failures = 0;

        tracing::info!(
            start = range.start(),
            end = range.end(),
            total,
            "Starting harvest"
        );

        for draw_number in range {
            if self.fetcher.cancel_token().is_cancelled() {
                summary.end = RunEnd::Interrupted { draw_number };
                break;
            }

            let outcome = match self.process(draw_number).await {
                Step::Done(outcome) => outcome,
                Step::NotYetDrawn => {
                    tracing::info!(draw_number, "Draw not held yet, stopping");
                    summary.end = RunEnd::ReachedLatest { draw_number };
                    break;
                }
                Step::Cancelled => {
                    tracing::info!(draw_number, "Interrupted");
                    summary.end = RunEnd::Interrupted { draw_number };
                    break;
                }
            };

            match &outcome {
                DrawOutcome::Failed(FailureReason::Write(_)) => write_failures += 1,
                DrawOutcome::Succeeded => write_failures = 0,
                _ => {}
            }
            if let DrawOutcome::Failed(reason) = &outcome {
                tracing::warn!(draw_number, reason = %reason, "Draw failed");
            }

            summary.record(draw_number, &outcome);
            on_progress(&Progress {
                draw_number,
                outcome: outcome.label(),
                attempted: summary.attempted,
                succeeded: summary.succeeded,
                skipped: summary.skipped,
                failed: summary.failed,
                total,
            });

            if write_failures >= MAX_CONSECUTIVE_WRITE_FAILURES {
                tracing::error!(
                    draw_number,
                    failures = write_failures,
                    "Repeated write failures, aborting run"
                );
                summary.end = RunEnd::WriteFailures { draw_number };
                break;
            }
        }

        tracing::info!(
            attempted = summary.attempted,
            succeeded = summary.succeeded,
            skipped = summary.skipped,
            failed = summary.failed,
            end = ?summary.end,
            "Harvest finished"
        );
        summary
    }

    async fn process(&mut self, draw_number: u32) -> Step {
        log_stage(draw_number, DrawStage::Pending);
        if self.store.already_present(draw_number) {
            tracing::debug!(draw_number, "Already present, skipping");
            return Step::Done(DrawOutcome::Skipped);
        }

        log_stage(draw_number, DrawStage::Fetching);
        let content = match self.fetcher.fetch(draw_number).await {
            Ok(content) => content,
            Err(FetchError::NotYetDrawn { .. }) => return Step::NotYetDrawn,
            Err(FetchError::Cancelled) => return Step::Cancelled,
            Err(e) => return failed(FailureReason::Fetch(e)),
        };

        log_stage(draw_number, DrawStage::Parsing);
        let record = match parser::parse(&content, draw_number) {
            Ok(record) => record,
            Err(e) => return failed(FailureReason::Parse(e)),
        };

        log_stage(draw_number, DrawStage::Writing);
        match self.store.write(record) {
            Ok(()) => Step::Done(DrawOutcome::Succeeded),
            Err(e) => failed(FailureReason::Write(e.to_string())),
        }
    }
}

fn log_stage(draw_number: u32, stage: DrawStage) {
    tracing::debug!(draw_number, stage = ?stage, "Stage");
}

fn failed(reason: FailureReason) -> Step {
    Step::Done(DrawOutcome::Failed(reason))
}
