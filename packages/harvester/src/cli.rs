//! Command-line interface for the harvester.

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tokio_util::sync::CancellationToken;

use crate::config::{output_path, FetchConfig};
use crate::error::Result;
use crate::harvester::Harvester;
use crate::http::{Fetcher, HttpSource};
use crate::range;
use crate::stats::{format_amount, format_gaps, DatasetStats};
use crate::types::{Progress, RunEnd, RunSummary};
use crate::writer::{load_dataset, CsvDataset};

/// Lotto Harvester - Collect lottery draw results into a CSV dataset.
#[derive(Parser)]
#[command(name = "lotto-harvester")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Show debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Fetch draws into the dataset, skipping those already present.
    Scrape {
        /// First draw number (default: 1)
        #[arg(long)]
        start: Option<u32>,

        /// Last draw number (default: latest, discovered automatically)
        #[arg(long)]
        end: Option<u32>,

        /// Dataset file (default: data/lotto_numbers.csv)
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        fetch: FetchArgs,
    },

    /// Print the most recent draw number available upstream.
    Latest {
        #[command(flatten)]
        fetch: FetchArgs,
    },

    /// Summarize an existing dataset.
    Stats {
        /// Dataset file (default: data/lotto_numbers.csv)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

/// Overrides for the `LOTTO_*` environment settings.
#[derive(Args, Debug, Clone, Default)]
pub struct FetchArgs {
    /// Minimum delay between requests in milliseconds
    #[arg(long)]
    pub delay_ms: Option<u64>,

    /// Attempts per draw before giving up on transient failures
    #[arg(long)]
    pub max_retries: Option<u32>,

    /// Request timeout in seconds
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// Result page URL, without query string
    #[arg(long)]
    pub base_url: Option<String>,
}

impl FetchArgs {
    /// Environment configuration with the command-line overrides applied.
    pub fn config(&self) -> Result<FetchConfig> {
        let mut config = FetchConfig::from_env()?;
        if let Some(ms) = self.delay_ms {
            config.request_delay = Duration::from_millis(ms);
        }
        if let Some(attempts) = self.max_retries {
            config.max_attempts = attempts;
        }
        if let Some(secs) = self.timeout_secs {
            config.timeout = Duration::from_secs(secs);
        }
        if let Some(url) = &self.base_url {
            config.base_url.clone_from(url);
        }
        config.validate()?;
        Ok(config)
    }
}

/// Run a parsed command line.
pub async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Scrape {
            start,
            end,
            output,
            fetch,
        } => scrape_command(start, end, &output_path(output), &fetch).await,
        Commands::Latest { fetch } => latest_command(&fetch).await,
        Commands::Stats { output } => stats_command(&output_path(output)),
    }
}

/// Cancellation token tripped by Ctrl-C.
fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Received Ctrl-C, finishing current draw");
            token.cancel();
        }
    });
    cancel
}

/// Execute the scrape command.
async fn scrape_command(
    start: Option<u32>,
    end: Option<u32>,
    output: &Path,
    fetch: &FetchArgs,
) -> Result<()> {
    let config = fetch.config()?;
    let cancel = cancel_on_ctrl_c();
    let fetcher = Fetcher::new(HttpSource::new(&config)?, &config, cancel);

    // Bad ranges are rejected here, before the dataset is touched.
    let spinner = spinner("Resolving draw range...");
    let resolved = range::resolve(start, end, &fetcher).await;
    spinner.finish_and_clear();
    let range = resolved?;

    if range.is_empty() {
        println!(
            "{} start draw {} is after the latest draw {}",
            style("Nothing to fetch:").yellow().bold(),
            range.start(),
            range.end()
        );
        return Ok(());
    }

    let dataset = CsvDataset::open(output)?;

    println!(
        "{} draws {}..={} into {}",
        style("Harvesting").bold(),
        style(range.start()).cyan(),
        style(range.end()).cyan(),
        style(output.display()).green()
    );

    let pb = ProgressBar::new(range.clone().count() as u64);
    #[allow(clippy::expect_used)] // Static template string that is guaranteed to be valid
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{bar:40.cyan/blue} {pos}/{len} {msg}")
            .expect("valid template"),
    );

    let mut harvester = Harvester::new(fetcher, dataset);
    let summary = harvester
        .run(range, |p: &Progress| {
            pb.set_position(p.attempted as u64);
            pb.set_message(format!(
                "draw {} {} (ok {}, skipped {}, failed {})",
                p.draw_number, p.outcome, p.succeeded, p.skipped, p.failed
            ));
        })
        .await;
    pb.finish_and_clear();

    print_summary(&summary);

    let dataset = harvester.into_store();
    let records: Vec<_> = dataset.records().cloned().collect();
    if let Some(stats) = DatasetStats::from_records(&records) {
        println!();
        print_stats(&stats);
    }

    Ok(())
}

/// Execute the latest command.
async fn latest_command(fetch: &FetchArgs) -> Result<()> {
    let config = fetch.config()?;
    let fetcher = Fetcher::new(HttpSource::new(&config)?, &config, cancel_on_ctrl_c());

    let spinner = spinner("Discovering latest draw...");
    let latest = range::discover_latest(&fetcher, range::FIRST_DRAW).await;
    spinner.finish_and_clear();

    println!("{} {}", style("Latest draw:").bold(), style(latest?).cyan());
    Ok(())
}

/// Execute the stats command.
fn stats_command(path: &Path) -> Result<()> {
    let records = load_dataset(path)?;
    match DatasetStats::from_records(&records) {
        Some(stats) => print_stats(&stats),
        None => println!("{} {}", style("Empty dataset:").yellow(), path.display()),
    }
    Ok(())
}

fn spinner(message: &'static str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    #[allow(clippy::expect_used)] // Static template string that is guaranteed to be valid
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .expect("valid template"),
    );
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

fn print_summary(summary: &RunSummary) {
    println!("{}", style("Run summary").bold());
    println!("  Attempted: {}", summary.attempted);
    println!("  Succeeded: {}", style(summary.succeeded).green());
    println!("  Skipped:   {}", summary.skipped);
    if summary.failed > 0 {
        println!("  Failed:    {}", style(summary.failed).red().bold());
        for failure in &summary.failures {
            println!("    #{}: {}", failure.draw_number, failure.reason);
        }
        let draws: Vec<String> = summary
            .failed_draws()
            .iter()
            .map(u32::to_string)
            .collect();
        println!("  Failed draws: {}", style(draws.join(",")).yellow());
    } else {
        println!("  Failed:    0");
    }

    match summary.end {
        RunEnd::Completed => {}
        RunEnd::ReachedLatest { draw_number } => {
            println!("  Stopped: draw {draw_number} has not been drawn yet");
        }
        RunEnd::Interrupted { draw_number } => {
            println!(
                "  {} at draw {draw_number}",
                style("Interrupted").yellow().bold()
            );
        }
        RunEnd::WriteFailures { draw_number } => {
            println!(
                "  {} after draw {draw_number}: repeated write failures",
                style("Aborted").red().bold()
            );
        }
    }
}

fn print_stats(stats: &DatasetStats) {
    println!("{}", style("Dataset").bold());
    println!("  Draws: {} (#{} to #{})", stats.total, stats.first_draw, stats.last_draw);
    println!("  Dates: {} to {}", stats.first_date, stats.last_date);
    println!("  Mean 1st prize winners: {:.2}", stats.mean_winner_count);
    println!(
        "  1st prize amount: mean {}, max {}, min {}",
        format_amount(stats.mean_prize_amount.round() as u64),
        format_amount(stats.max_prize_amount),
        format_amount(stats.min_prize_amount)
    );
    if stats.is_contiguous() {
        println!("  Missing draws: {}", style("none").green());
    } else {
        println!(
            "  Missing draws ({}): {}",
            style(stats.missing_count()).yellow(),
            format_gaps(&stats.missing)
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_scrape_defaults() {
        let cli = Cli::parse_from(["lotto-harvester", "scrape"]);

        assert!(!cli.verbose);
        let Commands::Scrape {
            start,
            end,
            output,
            fetch,
        } = cli.command
        else {
            panic!("expected scrape");
        };
        assert!(start.is_none());
        assert!(end.is_none());
        assert!(output.is_none());
        assert!(fetch.delay_ms.is_none());
    }

    #[test]
    fn test_cli_parse_scrape_with_options() {
        let cli = Cli::parse_from([
            "lotto-harvester",
            "scrape",
            "--start",
            "5",
            "--end",
            "9",
            "-o",
            "out.csv",
            "--delay-ms",
            "250",
            "--max-retries",
            "5",
            "-v",
        ]);

        assert!(cli.verbose);
        let Commands::Scrape {
            start,
            end,
            output,
            fetch,
        } = cli.command
        else {
            panic!("expected scrape");
        };
        assert_eq!(start, Some(5));
        assert_eq!(end, Some(9));
        assert_eq!(output, Some(PathBuf::from("out.csv")));
        assert_eq!(fetch.delay_ms, Some(250));
        assert_eq!(fetch.max_retries, Some(5));
    }

    #[test]
    fn test_cli_parse_stats() {
        let cli = Cli::parse_from(["lotto-harvester", "stats", "--output", "x.csv"]);
        let Commands::Stats { output } = cli.command else {
            panic!("expected stats");
        };
        assert_eq!(output, Some(PathBuf::from("x.csv")));
    }

    #[test]
    fn test_cli_rejects_negative_draw_number() {
        assert!(Cli::try_parse_from(["lotto-harvester", "scrape", "--start", "-1"]).is_err());
    }

    #[test]
    fn test_fetch_args_override_config() {
        let args = FetchArgs {
            delay_ms: Some(0),
            max_retries: Some(7),
            timeout_secs: Some(2),
            base_url: Some("http://127.0.0.1:9/result".into()),
        };

        let config = args.config().unwrap();

        assert_eq!(config.request_delay, Duration::ZERO);
        assert_eq!(config.max_attempts, 7);
        assert_eq!(config.timeout, Duration::from_secs(2));
        assert_eq!(config.base_url, "http://127.0.0.1:9/result");
    }

    #[test]
    fn test_fetch_args_reject_zero_attempts() {
        let args = FetchArgs {
            max_retries: Some(0),
            ..FetchArgs::default()
        };
        assert!(args.config().is_err());
    }
}
