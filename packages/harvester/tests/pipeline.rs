//! End-to-end tests of the harvest pipeline against a scripted upstream.

mod common;

use std::fs;

use chrono::NaiveDate;
use pretty_assertions::assert_eq;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use lotto_harvester::error::{Anchor, FetchError, ParseError};
use lotto_harvester::harvester::Harvester;
use lotto_harvester::http::Fetcher;
use lotto_harvester::range;
use lotto_harvester::stats::DatasetStats;
use lotto_harvester::types::{FailureReason, RunEnd};
use lotto_harvester::writer::{load_dataset, CsvDataset, DrawStore};

use common::{fast_config, fetcher, transient, DrawPage, MockSite};

const HEADER_LINE: &str = "draw_number,draw_date,n1,n2,n3,n4,n5,n6,bonus,winner_count,prize_amount";

fn site_with_draws(draws: impl IntoIterator<Item = u32>) -> std::sync::Arc<MockSite> {
    let site = MockSite::new();
    for n in draws {
        site.page(&DrawPage::numbered(n));
    }
    site
}

#[tokio::test]
async fn test_first_draw_only_with_discovery() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("data").join("lotto_numbers.csv");
    let site = MockSite::new();
    site.page(&DrawPage::first());
    let fetcher = fetcher(&site, 3);

    let range = range::resolve(None, None, &fetcher).await.unwrap();
    assert_eq!(range, 1..=1);

    let mut harvester = Harvester::new(fetcher, CsvDataset::open(&path).unwrap());
    let summary = harvester.run(range, |_| {}).await;

    assert_eq!(
        (summary.attempted, summary.succeeded, summary.skipped, summary.failed),
        (1, 1, 0, 0)
    );
    assert_eq!(summary.end, RunEnd::Completed);

    let content = fs::read_to_string(&path).unwrap();
    assert_eq!(
        content,
        format!("{HEADER_LINE}\n1,2002-12-07,10,23,29,33,37,40,16,4,2067000000\n")
    );

    let records = load_dataset(&path).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(
        records[0].draw_date(),
        NaiveDate::from_ymd_opt(2002, 12, 7).unwrap()
    );
}

#[tokio::test]
async fn test_malformed_page_fails_only_that_draw() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("lotto.csv");
    let site = site_with_draws([4, 6]);
    site.page(&DrawPage::numbered(5).without_bonus());

    let mut harvester = Harvester::new(fetcher(&site, 3), CsvDataset::open(&path).unwrap());
    let summary = harvester.run(4..=6, |_| {}).await;

    assert_eq!(summary.succeeded, 2);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.failed_draws(), vec![5]);
    assert_eq!(
        summary.failures[0].reason,
        FailureReason::Parse(ParseError::MissingAnchor(Anchor::BonusNumber))
    );
    assert_eq!(site.calls_for(6), 1);

    let stored: Vec<u32> = load_dataset(&path)
        .unwrap()
        .iter()
        .map(|r| r.draw_number())
        .collect();
    assert_eq!(stored, vec![4, 6]);
}

#[tokio::test]
async fn test_second_run_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("lotto.csv");
    let site = site_with_draws(1..=3);

    let mut first = Harvester::new(fetcher(&site, 3), CsvDataset::open(&path).unwrap());
    let summary = first.run(1..=3, |_| {}).await;
    assert_eq!(summary.succeeded, 3);
    let after_first = fs::read_to_string(&path).unwrap();
    let calls_after_first = site.calls().len();

    let mut second = Harvester::new(fetcher(&site, 3), CsvDataset::open(&path).unwrap());
    let summary = second.run(1..=3, |_| {}).await;

    assert_eq!(summary.attempted, 3);
    assert_eq!(summary.skipped, 3);
    assert_eq!(summary.succeeded, 0);
    assert_eq!(site.calls().len(), calls_after_first);
    assert_eq!(fs::read_to_string(&path).unwrap(), after_first);
}

#[tokio::test]
async fn test_gap_fill_keeps_file_ordered() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("lotto.csv");
    let site = site_with_draws(1..=4);
    site.script(2, vec![transient()]);

    // Draw 2 fails on the first run (single attempt), then gets filled in.
    let mut harvester = Harvester::new(fetcher(&site, 1), CsvDataset::open(&path).unwrap());
    let summary = harvester.run(1..=4, |_| {}).await;
    assert_eq!(summary.failed_draws(), vec![2]);

    let mut harvester = Harvester::new(fetcher(&site, 1), CsvDataset::open(&path).unwrap());
    let summary = harvester.run(2..=2, |_| {}).await;
    assert_eq!(summary.succeeded, 1);

    let records = load_dataset(&path).unwrap();
    let stats = DatasetStats::from_records(&records).unwrap();
    assert_eq!(stats.total, 4);
    assert!(stats.is_contiguous());

    let content = fs::read_to_string(&path).unwrap();
    let order: Vec<&str> = content
        .lines()
        .skip(1)
        .map(|l| l.split(',').next().unwrap())
        .collect();
    assert_eq!(order, vec!["1", "2", "3", "4"]);
}

#[tokio::test]
async fn test_transient_failures_below_budget_succeed() {
    let dir = TempDir::new().unwrap();
    let site = site_with_draws([1]);
    site.script(1, vec![transient(), transient()]);

    let dataset = CsvDataset::open(dir.path().join("lotto.csv")).unwrap();
    let mut harvester = Harvester::new(fetcher(&site, 3), dataset);
    let summary = harvester.run(1..=1, |_| {}).await;

    assert_eq!(summary.succeeded, 1);
    assert_eq!(site.calls_for(1), 3);
}

#[tokio::test]
async fn test_transient_failures_exhaust_budget() {
    let dir = TempDir::new().unwrap();
    let site = site_with_draws([1, 2]);
    site.script(1, vec![transient(), transient(), transient()]);

    let dataset = CsvDataset::open(dir.path().join("lotto.csv")).unwrap();
    let mut harvester = Harvester::new(fetcher(&site, 3), dataset);
    let summary = harvester.run(1..=2, |_| {}).await;

    assert_eq!(summary.failed_draws(), vec![1]);
    assert_eq!(
        summary.failures[0].reason,
        FailureReason::Fetch(FetchError::RetriesExhausted {
            attempts: 3,
            reason: "Server error: 503 Service Unavailable".into(),
        })
    );
    assert_eq!(site.calls_for(1), 3);
    assert_eq!(summary.succeeded, 1);
}

#[tokio::test]
async fn test_not_yet_drawn_inside_range_ends_run() {
    let dir = TempDir::new().unwrap();
    let site = site_with_draws(1..=2);

    let dataset = CsvDataset::open(dir.path().join("lotto.csv")).unwrap();
    let mut harvester = Harvester::new(fetcher(&site, 3), dataset);
    let summary = harvester.run(1..=10, |_| {}).await;

    assert_eq!(summary.attempted, 2);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.end, RunEnd::ReachedLatest { draw_number: 3 });
    assert!(summary.is_clean());
    assert_eq!(site.calls(), vec![1, 2, 3]);
}

#[tokio::test]
async fn test_repeated_write_failures_abort_run() {
    let dir = TempDir::new().unwrap();
    let data_dir = dir.path().join("data");
    let site = site_with_draws(1..=10);

    let dataset = CsvDataset::open(data_dir.join("lotto.csv")).unwrap();
    fs::remove_dir_all(&data_dir).unwrap();

    let mut harvester = Harvester::new(fetcher(&site, 3), dataset);
    let summary = harvester.run(1..=10, |_| {}).await;

    assert_eq!(summary.attempted, 3);
    assert_eq!(summary.failed, 3);
    assert!(summary
        .failures
        .iter()
        .all(|f| matches!(f.reason, FailureReason::Write(_))));
    assert_eq!(summary.end, RunEnd::WriteFailures { draw_number: 3 });
    assert!(!harvester.store().already_present(1));
}

#[tokio::test]
async fn test_cancelled_run_returns_empty_summary() {
    let dir = TempDir::new().unwrap();
    let site = site_with_draws(1..=3);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let fetcher = Fetcher::new(site.clone(), &fast_config(3), cancel);
    let dataset = CsvDataset::open(dir.path().join("lotto.csv")).unwrap();
    let mut harvester = Harvester::new(fetcher, dataset);
    let summary = harvester.run(1..=3, |_| {}).await;

    assert_eq!(summary.attempted, 0);
    assert_eq!(summary.end, RunEnd::Interrupted { draw_number: 1 });
    assert!(site.calls().is_empty());
}

#[tokio::test]
async fn test_progress_reports_running_counts() {
    let dir = TempDir::new().unwrap();
    let site = site_with_draws([1, 3]);
    site.script(
        2,
        vec![lotto_harvester::types::FetchOutcome::FatalFailure(
            lotto_harvester::types::FatalFailure::Http { status: 403 },
        )],
    );

    let dataset = CsvDataset::open(dir.path().join("lotto.csv")).unwrap();
    let mut harvester = Harvester::new(fetcher(&site, 3), dataset);
    let mut seen = Vec::new();
    harvester
        .run(1..=3, |p| {
            seen.push((p.draw_number, p.outcome, p.attempted, p.failed, p.total))
        })
        .await;

    assert_eq!(
        seen,
        vec![
            (1, "succeeded", 1, 0, 3),
            (2, "failed", 2, 1, 3),
            (3, "succeeded", 3, 1, 3),
        ]
    );
}
