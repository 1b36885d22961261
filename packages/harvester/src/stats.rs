//! Summary statistics over a stored dataset.

use std::ops::RangeInclusive;

use chrono::NaiveDate;

use crate::types::DrawRecord;

/// Aggregates reported after a run and by the `stats` command.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetStats {
    pub total: usize,
    pub first_draw: u32,
    pub last_draw: u32,
    pub first_date: NaiveDate,
    pub last_date: NaiveDate,
    pub mean_winner_count: f64,
    pub mean_prize_amount: f64,
    pub max_prize_amount: u64,
    pub min_prize_amount: u64,
    /// Runs of draw numbers in `1..=last_draw` with no record.
    pub missing: Vec<RangeInclusive<u32>>,
}

impl DatasetStats {
    /// Compute statistics; `None` for an empty dataset.
    pub fn from_records(records: &[DrawRecord]) -> Option<Self> {
        let first = records.first()?;
        let total = records.len();

        let mut stats = Self {
            total,
            first_draw: first.draw_number(),
            last_draw: first.draw_number(),
            first_date: first.draw_date(),
            last_date: first.draw_date(),
            mean_winner_count: 0.0,
            mean_prize_amount: 0.0,
            max_prize_amount: first.first_prize_amount(),
            min_prize_amount: first.first_prize_amount(),
            missing: Vec::new(),
        };

        let mut winners_sum: u64 = 0;
        let mut amount_sum: u128 = 0;
        for record in records {
            stats.first_draw = stats.first_draw.min(record.draw_number());
            stats.last_draw = stats.last_draw.max(record.draw_number());
            stats.first_date = stats.first_date.min(record.draw_date());
            stats.last_date = stats.last_date.max(record.draw_date());
            stats.max_prize_amount = stats.max_prize_amount.max(record.first_prize_amount());
            stats.min_prize_amount = stats.min_prize_amount.min(record.first_prize_amount());
            winners_sum += u64::from(record.first_prize_winner_count());
            amount_sum += u128::from(record.first_prize_amount());
        }

        stats.mean_winner_count = winners_sum as f64 / total as f64;
        stats.mean_prize_amount = amount_sum as f64 / total as f64;
        stats.missing = missing_draws(records);
        Some(stats)
    }

    /// True when the dataset is the gap-free run `1..=last_draw`.
    pub fn is_contiguous(&self) -> bool {
        self.missing.is_empty()
    }

    /// Number of draw numbers absent from the dataset.
    pub fn missing_count(&self) -> u64 {
        self.missing
            .iter()
            .map(|gap| u64::from(gap.end() - gap.start()) + 1)
            .sum()
    }
}

/// Gaps between 1 and the highest stored draw, as inclusive runs.
pub fn missing_draws(records: &[DrawRecord]) -> Vec<RangeInclusive<u32>> {
    let mut present: Vec<u32> = records.iter().map(DrawRecord::draw_number).collect();
    present.sort_unstable();
    present.dedup();

    let mut gaps = Vec::new();
    let mut next_expected: u32 = 1;
    for n in present {
        if n > next_expected {
            gaps.push(next_expected..=n - 1);
        }
        next_expected = n.saturating_add(1);
    }
    gaps
}

/// Render gaps as `2,5-9`.
pub fn format_gaps(gaps: &[RangeInclusive<u32>]) -> String {
    gaps.iter()
        .map(|gap| {
            if gap.start() == gap.end() {
                gap.start().to_string()
            } else {
                format!("{}-{}", gap.start(), gap.end())
            }
        })
        .collect::<Vec<_>>()
        .join(",")
}

/// Format an amount with thousands separators, e.g. `2,002,006,800`.
pub fn format_amount(amount: u64) -> String {
    let digits = amount.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}
