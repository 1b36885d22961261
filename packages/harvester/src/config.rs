//! Configuration constants and fetch settings for the harvester.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{HarvesterError, Result};

/// Draw result page of the public lottery site.
pub const DEFAULT_BASE_URL: &str = "https://dhlottery.co.kr/gameResult.do";

/// User agent string identifying this harvester.
pub const USER_AGENT: &str = concat!("lotto-harvester/", env!("CARGO_PKG_VERSION"));

/// Minimum delay between the start of two requests (milliseconds).
pub const DEFAULT_REQUEST_DELAY_MS: u64 = 1000;

/// Attempts per draw page, the first one included.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// HTTP timeout in seconds.
pub const HTTP_TIMEOUT_SECS: u64 = 10;

/// Base delay for exponential backoff (milliseconds).
pub const RETRY_BASE_DELAY_MS: u64 = 500;

/// Upper bound for a single backoff delay (milliseconds).
pub const RETRY_MAX_DELAY_MS: u64 = 8000;

/// Dataset location used when no output path is given.
pub const DEFAULT_OUTPUT_FILE: &str = "data/lotto_numbers.csv";

/// Lowest valid ball number.
pub const MIN_NUMBER: u8 = 1;

/// Highest valid ball number.
pub const MAX_NUMBER: u8 = 45;

/// Winning numbers per draw, bonus excluded.
pub const WINNING_NUMBERS_COUNT: usize = 6;

/// Settings consumed by the fetcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchConfig {
    pub base_url: String,
    pub request_delay: Duration,
    pub max_attempts: u32,
    pub timeout: Duration,
    pub user_agent: String,
    pub backoff_base: Duration,
    pub backoff_max: Duration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_delay: Duration::from_millis(DEFAULT_REQUEST_DELAY_MS),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            timeout: Duration::from_secs(HTTP_TIMEOUT_SECS),
            user_agent: USER_AGENT.to_string(),
            backoff_base: Duration::from_millis(RETRY_BASE_DELAY_MS),
            backoff_max: Duration::from_millis(RETRY_MAX_DELAY_MS),
        }
    }
}

impl FetchConfig {
    /// Load configuration from `LOTTO_*` environment variables.
    ///
    /// Unset variables fall back to the defaults; set but unparseable
    /// values are rejected.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let config = Self {
            base_url: lookup("LOTTO_BASE_URL").unwrap_or(defaults.base_url),
            request_delay: parse_var(&lookup, "LOTTO_REQUEST_DELAY_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.request_delay),
            max_attempts: parse_var(&lookup, "LOTTO_MAX_RETRIES")?
                .unwrap_or(defaults.max_attempts),
            timeout: parse_var(&lookup, "LOTTO_TIMEOUT_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            user_agent: lookup("LOTTO_USER_AGENT").unwrap_or(defaults.user_agent),
            backoff_base: parse_var(&lookup, "LOTTO_BACKOFF_BASE_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.backoff_base),
            backoff_max: parse_var(&lookup, "LOTTO_BACKOFF_MAX_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.backoff_max),
        };

        config.validate()?;
        Ok(config)
    }

    /// Create a config builder starting from the defaults.
    pub fn builder() -> FetchConfigBuilder {
        FetchConfigBuilder {
            config: Self::default(),
        }
    }

    /// Reject settings the fetcher cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(HarvesterError::Config(
                "max attempts must be at least 1".into(),
            ));
        }
        if self.timeout.is_zero() {
            return Err(HarvesterError::Config("timeout must be positive".into()));
        }
        if self.backoff_max < self.backoff_base {
            return Err(HarvesterError::Config(format!(
                "backoff cap {:?} is below backoff base {:?}",
                self.backoff_max, self.backoff_base
            )));
        }
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(HarvesterError::Config(format!(
                "base URL must be http(s): '{}'",
                self.base_url
            )));
        }
        Ok(())
    }

    /// Build the page URL for one draw.
    ///
    /// # Examples
    /// ```
    /// use lotto_harvester::config::FetchConfig;
    ///
    /// let config = FetchConfig::default();
    /// assert_eq!(
    ///     config.draw_url(1),
    ///     "https://dhlottery.co.kr/gameResult.do?method=byWin&drwNo=1"
    /// );
    /// ```
    pub fn draw_url(&self, draw_number: u32) -> String {
        format!("{}?method=byWin&drwNo={draw_number}", self.base_url)
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| HarvesterError::Config(format!("{key} has invalid value '{raw}'"))),
    }
}

/// Builder for `FetchConfig`, used by the CLI overrides and tests.
#[derive(Debug, Clone)]
pub struct FetchConfigBuilder {
    config: FetchConfig,
}

impl FetchConfigBuilder {
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.config.base_url = base_url.into();
        self
    }

    pub fn request_delay(mut self, delay: Duration) -> Self {
        self.config.request_delay = delay;
        self
    }

    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.config.max_attempts = max_attempts;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    pub fn backoff(mut self, base: Duration, max: Duration) -> Self {
        self.config.backoff_base = base;
        self.config.backoff_max = max;
        self
    }

    pub fn build(self) -> FetchConfig {
        self.config
    }
}

/// Resolve the dataset path, falling back to the default location.
pub fn output_path(output: Option<PathBuf>) -> PathBuf {
    output.unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_FILE))
}
