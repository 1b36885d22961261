//! Rate-limited, retrying access to draw pages.
//!
//! [`DrawSource`] performs a single classified attempt; [`Fetcher`] wraps a
//! source with the process-wide [`RateLimiter`] and the [`RetryPolicy`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::config::FetchConfig;
use crate::error::{FetchError, Result};
use crate::parser::page_draw_number;
use crate::types::{FatalFailure, FetchOutcome};

/// One request attempt for one draw page.
#[async_trait]
pub trait DrawSource: Send + Sync {
    async fn fetch_once(&self, draw_number: u32) -> FetchOutcome;
}

#[async_trait]
impl<T: DrawSource + ?Sized> DrawSource for Arc<T> {
    async fn fetch_once(&self, draw_number: u32) -> FetchOutcome {
        (**self).fetch_once(draw_number).await
    }
}

/// Draw pages served by the lottery website.
pub struct HttpSource {
    client: reqwest::Client,
    config: FetchConfig,
}

impl HttpSource {
    /// Create a source with the configured timeout and user agent.
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.as_str())
            .build()?;

        Ok(Self {
            client,
            config: config.clone(),
        })
    }
}

#[async_trait]
impl DrawSource for HttpSource {
    async fn fetch_once(&self, draw_number: u32) -> FetchOutcome {
        let url = self.config.draw_url(draw_number);

        let response = match self.client.get(&url).send().await {
            Ok(response) => response,
            Err(e) => return classify_request_error(&e),
        };

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return FetchOutcome::FatalFailure(FatalFailure::NotYetDrawn);
        }
        if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            return FetchOutcome::RetryableFailure(format!("Server error: {status}"));
        }
        if !status.is_success() {
            return FetchOutcome::FatalFailure(FatalFailure::Http {
                status: status.as_u16(),
            });
        }

        match response.text().await {
            Ok(body) => classify_body(draw_number, body),
            Err(e) => FetchOutcome::RetryableFailure(format!("Failed to read body: {e}")),
        }
    }
}

fn classify_request_error(e: &reqwest::Error) -> FetchOutcome {
    if e.is_timeout() || e.is_connect() || e.is_request() || e.is_body() {
        FetchOutcome::RetryableFailure(e.to_string())
    } else {
        FetchOutcome::FatalFailure(FatalFailure::Request(e.to_string()))
    }
}

/// Decide whether a successful response actually holds the requested draw.
///
/// The site serves an empty body or the latest result page for draw numbers
/// that have not been drawn yet.
pub fn classify_body(draw_number: u32, body: String) -> FetchOutcome {
    if body.trim().is_empty() {
        return FetchOutcome::FatalFailure(FatalFailure::NotYetDrawn);
    }
    match page_draw_number(&body) {
        Some(shown) if shown < draw_number => {
            tracing::debug!(draw_number, shown, "Source served an earlier draw");
            FetchOutcome::FatalFailure(FatalFailure::NotYetDrawn)
        }
        _ => FetchOutcome::Success(body),
    }
}

/// Minimum spacing between the starts of consecutive requests.
///
/// Shared by reference (`Arc`) between everything that talks to the same
/// source; the lock makes it safe to share across tasks.
#[derive(Debug)]
pub struct RateLimiter {
    min_interval: Duration,
    last_start: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_start: Mutex::new(None),
        }
    }

    /// Wait until a request may start, then claim the slot.
    pub async fn acquire(&self, cancel: &CancellationToken) -> std::result::Result<(), FetchError> {
        let mut last_start = self.last_start.lock().await;
        if let Some(previous) = *last_start {
            let ready_at = previous + self.min_interval;
            if ready_at > Instant::now() {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(FetchError::Cancelled),
                    _ = tokio::time::sleep_until(ready_at) => {}
                }
            }
        }
        *last_start = Some(Instant::now());
        Ok(())
    }
}

/// Bounded exponential backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &FetchConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            base_delay: config.backoff_base,
            max_delay: config.backoff_max,
        }
    }

    /// Delay after the failed attempt with zero-based index `attempt`:
    /// `base * 2^attempt`, capped at `max_delay`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Fetches draw pages through a rate limiter with retries.
pub struct Fetcher<S> {
    source: S,
    limiter: Arc<RateLimiter>,
    policy: RetryPolicy,
    cancel: CancellationToken,
}

impl<S: DrawSource> Fetcher<S> {
    /// Create a fetcher with its own rate limiter.
    pub fn new(source: S, config: &FetchConfig, cancel: CancellationToken) -> Self {
        let limiter = Arc::new(RateLimiter::new(config.request_delay));
        Self::with_limiter(source, limiter, RetryPolicy::from_config(config), cancel)
    }

    /// Create a fetcher sharing an existing rate limiter.
    pub fn with_limiter(
        source: S,
        limiter: Arc<RateLimiter>,
        policy: RetryPolicy,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            source,
            limiter,
            policy,
            cancel,
        }
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Fetch one draw page, retrying transient failures.
    ///
    /// Every attempt, retries included, goes through the rate limiter.
    pub async fn fetch(&self, draw_number: u32) -> std::result::Result<String, FetchError> {
        let mut last_reason = String::new();

        for attempt in 0..self.policy.max_attempts {
            if attempt > 0 {
                let delay = self.policy.backoff(attempt - 1);
                tracing::debug!(draw_number, attempt, delay = ?delay, "Retrying after delay");
                self.sleep(delay).await?;
            }

            self.limiter.acquire(&self.cancel).await?;

            let outcome = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(FetchError::Cancelled),
                outcome = self.source.fetch_once(draw_number) => outcome,
            };

            match outcome {
                FetchOutcome::Success(body) => return Ok(body),
                FetchOutcome::RetryableFailure(reason) => {
                    tracing::warn!(
                        draw_number,
                        reason = %reason,
                        attempt = attempt + 1,
                        max_attempts = self.policy.max_attempts,
                        "Transient failure, will retry"
                    );
                    last_reason = reason;
                }
                FetchOutcome::FatalFailure(FatalFailure::NotYetDrawn) => {
                    return Err(FetchError::NotYetDrawn { draw_number });
                }
                FetchOutcome::FatalFailure(FatalFailure::Http { status }) => {
                    return Err(FetchError::FatalHttp { status });
                }
                FetchOutcome::FatalFailure(FatalFailure::Request(message)) => {
                    return Err(FetchError::Request(message));
                }
            }
        }

        Err(FetchError::RetriesExhausted {
            attempts: self.policy.max_attempts,
            reason: last_reason,
        })
    }

    async fn sleep(&self, delay: Duration) -> std::result::Result<(), FetchError> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(FetchError::Cancelled),
            _ = tokio::time::sleep(delay) => Ok(()),
        }
    }
}
