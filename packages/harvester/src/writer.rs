//! CSV dataset store.
//!
//! The dataset is held in memory ordered by draw number. Every write stages
//! the complete file next to the target and renames it over the target, so
//! a reader only ever sees the previous or the new complete file.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::error::{ParseError, WriteError};
use crate::types::DrawRecord;

/// Column names of the dataset, in order.
pub const HEADER: [&str; 11] = [
    "draw_number",
    "draw_date",
    "n1",
    "n2",
    "n3",
    "n4",
    "n5",
    "n6",
    "bonus",
    "winner_count",
    "prize_amount",
];

/// Storage for validated draw records.
pub trait DrawStore {
    /// Whether a record for this draw is already stored.
    fn already_present(&self, draw_number: u32) -> bool;

    /// Store one complete record; on error nothing of it is visible.
    fn write(&mut self, record: DrawRecord) -> Result<(), WriteError>;
}

#[derive(Debug, Serialize, Deserialize)]
struct CsvRow {
    draw_number: u32,
    draw_date: NaiveDate,
    n1: u8,
    n2: u8,
    n3: u8,
    n4: u8,
    n5: u8,
    n6: u8,
    bonus: u8,
    winner_count: u32,
    prize_amount: u64,
}

impl From<&DrawRecord> for CsvRow {
    fn from(record: &DrawRecord) -> Self {
        let [n1, n2, n3, n4, n5, n6] = *record.winning_numbers();
        Self {
            draw_number: record.draw_number(),
            draw_date: record.draw_date(),
            n1,
            n2,
            n3,
            n4,
            n5,
            n6,
            bonus: record.bonus_number(),
            winner_count: record.first_prize_winner_count(),
            prize_amount: record.first_prize_amount(),
        }
    }
}

impl TryFrom<CsvRow> for DrawRecord {
    type Error = ParseError;

    fn try_from(row: CsvRow) -> Result<Self, Self::Error> {
        DrawRecord::new(
            row.draw_number,
            row.draw_date,
            &[row.n1, row.n2, row.n3, row.n4, row.n5, row.n6],
            row.bonus,
            row.winner_count,
            row.prize_amount,
        )
    }
}

/// CSV file holding the dataset.
#[derive(Debug)]
pub struct CsvDataset {
    path: PathBuf,
    records: BTreeMap<u32, DrawRecord>,
}

impl CsvDataset {
    /// Open the dataset at `path`, loading any rows already there.
    ///
    /// Missing parent directories are created; a missing file is an empty
    /// dataset.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, WriteError> {
        let path = path.into();
        if let Some(parent) = parent_dir(&path) {
            fs::create_dir_all(parent).map_err(|source| WriteError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let records = read_records(&path)?
            .into_iter()
            .map(|record| (record.draw_number(), record))
            .collect();

        Ok(Self { path, records })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records in ascending draw number order.
    pub fn records(&self) -> impl Iterator<Item = &DrawRecord> {
        self.records.values()
    }

    /// Stage the full dataset and rename it over the target.
    fn publish(&self) -> Result<(), WriteError> {
        let dir = parent_dir(&self.path).unwrap_or(Path::new("."));
        let io_err = |source| WriteError::Io {
            path: dir.to_path_buf(),
            source,
        };

        let mut staged = NamedTempFile::new_in(dir).map_err(io_err)?;
        {
            let mut writer = csv::WriterBuilder::new()
                .has_headers(false)
                .terminator(csv::Terminator::Any(b'\n'))
                .from_writer(staged.as_file_mut());
            writer.write_record(HEADER)?;
            for record in self.records.values() {
                writer.serialize(CsvRow::from(record))?;
            }
            writer.flush().map_err(io_err)?;
        }
        staged.as_file_mut().flush().map_err(io_err)?;
        staged.as_file().sync_all().map_err(io_err)?;

        staged
            .persist(&self.path)
            .map_err(|e| WriteError::Persist {
                path: self.path.clone(),
                source: e.error,
            })?;
        Ok(())
    }
}

impl DrawStore for CsvDataset {
    fn already_present(&self, draw_number: u32) -> bool {
        self.records.contains_key(&draw_number)
    }

    fn write(&mut self, record: DrawRecord) -> Result<(), WriteError> {
        let draw_number = record.draw_number();
        let previous = self.records.insert(draw_number, record);

        if let Err(e) = self.publish() {
            match previous {
                Some(previous) => self.records.insert(draw_number, previous),
                None => self.records.remove(&draw_number),
            };
            return Err(e);
        }

        tracing::debug!(draw_number, path = %self.path.display(), "Record written");
        Ok(())
    }
}

/// Read and validate a dataset file, in ascending draw number order.
///
/// A missing or empty file yields an empty dataset.
pub fn load_dataset(path: &Path) -> Result<Vec<DrawRecord>, WriteError> {
    let mut records = read_records(path)?;
    records.sort_by_key(DrawRecord::draw_number);
    Ok(records)
}

fn read_records(path: &Path) -> Result<Vec<DrawRecord>, WriteError> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)?;

    let headers = reader.headers()?.clone();
    if headers.is_empty() {
        return Ok(Vec::new());
    }
    if !headers.iter().eq(HEADER.iter().copied()) {
        return Err(WriteError::SchemaMismatch {
            path: path.to_path_buf(),
            found: headers.iter().collect::<Vec<_>>().join(","),
        });
    }

    let mut seen = std::collections::HashSet::new();
    let mut records = Vec::new();
    for row in reader.deserialize::<CsvRow>() {
        let row = row?;
        let draw_number = row.draw_number;
        if !seen.insert(draw_number) {
            return Err(WriteError::DuplicateRow {
                path: path.to_path_buf(),
                draw_number,
            });
        }
        let record = DrawRecord::try_from(row).map_err(|reason| WriteError::CorruptRow {
            path: path.to_path_buf(),
            draw_number,
            reason,
        })?;
        records.push(record);
    }
    Ok(records)
}

fn parent_dir(path: &Path) -> Option<&Path> {
    path.parent().filter(|p| !p.as_os_str().is_empty())
}
