//! Resolution of the draw numbers a run should process.

use std::ops::RangeInclusive;

use crate::error::{FetchError, HarvesterError, Result};
use crate::http::{DrawSource, Fetcher};

/// First draw number of the lottery.
pub const FIRST_DRAW: u32 = 1;

/// Resolve the inclusive, ascending range of draw numbers to process.
///
/// A missing start defaults to the first draw. A missing end triggers
/// [`discover_latest`]; when the discovered latest draw lies before `start`
/// the returned range is empty.
pub async fn resolve<S: DrawSource>(
    start: Option<u32>,
    end: Option<u32>,
    fetcher: &Fetcher<S>,
) -> Result<RangeInclusive<u32>> {
    let start = start.unwrap_or(FIRST_DRAW);
    if start < FIRST_DRAW {
        return Err(HarvesterError::InvalidDrawNumber(start));
    }

    match end {
        Some(end) if end < FIRST_DRAW => Err(HarvesterError::InvalidDrawNumber(end)),
        Some(end) if start > end => Err(HarvesterError::InvalidRange { start, end }),
        Some(end) => Ok(start..=end),
        None => {
            let latest = discover_latest(fetcher, FIRST_DRAW).await?;
            if latest < start {
                tracing::info!(start, latest, "Nothing to fetch beyond latest draw");
            }
            Ok(start..=latest)
        }
    }
}

/// Find the most recent existing draw in O(log n) fetches.
///
/// Checks `lower_bound`, then gallops upwards with doubling steps until a
/// draw reports "not drawn yet", then binary-searches between the last
/// existing and the first missing draw.
///
/// Precondition: draw existence is monotonic (every draw up to the latest
/// exists, none after it). A gap in the middle of the sequence is not
/// detected and makes the result land before the real latest draw.
pub async fn discover_latest<S: DrawSource>(fetcher: &Fetcher<S>, lower_bound: u32) -> Result<u32> {
    if !draw_exists(fetcher, lower_bound).await? {
        return Err(HarvesterError::NoDrawsFound { lower_bound });
    }

    let mut known = lower_bound;
    let mut step: u32 = 1;
    let mut missing = loop {
        let candidate = known.saturating_add(step);
        if candidate == known {
            return Ok(known);
        }
        if draw_exists(fetcher, candidate).await? {
            known = candidate;
            step = step.saturating_mul(2);
        } else {
            break candidate;
        }
    };

    while missing - known > 1 {
        let mid = known + (missing - known) / 2;
        if draw_exists(fetcher, mid).await? {
            known = mid;
        } else {
            missing = mid;
        }
    }

    tracing::info!(latest = known, "Discovered latest draw");
    Ok(known)
}

async fn draw_exists<S: DrawSource>(fetcher: &Fetcher<S>, draw_number: u32) -> Result<bool> {
    match fetcher.fetch(draw_number).await {
        Ok(_) => {
            tracing::debug!(draw_number, "Draw exists");
            Ok(true)
        }
        Err(FetchError::NotYetDrawn { .. }) => {
            tracing::debug!(draw_number, "Draw not drawn yet");
            Ok(false)
        }
        Err(source) => Err(HarvesterError::Discovery {
            draw_number,
            source,
        }),
    }
}
