//! Session policy: timeout, retry budget and backoff schedule.

use std::collections::BTreeSet;
use std::time::Duration;

use super::session::HttpMethod;

/// Default per-attempt timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 5;

/// Default number of retries after the first attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Status codes that are retried by default.
pub const DEFAULT_RETRYABLE_STATUS_CODES: [u16; 7] = [403, 413, 429, 500, 502, 503, 504];

/// Methods that are retried by default.
pub const DEFAULT_RETRYABLE_METHODS: [HttpMethod; 5] = [
    HttpMethod::Get,
    HttpMethod::Post,
    HttpMethod::Put,
    HttpMethod::Delete,
    HttpMethod::Head,
];

/// Base delay for exponential backoff, in milliseconds.
pub const BACKOFF_FACTOR_MS: u64 = 100;

/// Upper bound on a single backoff delay, in milliseconds.
pub const BACKOFF_MAX_MS: u64 = 120_000;

/// Invalid session configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Timeout must be strictly positive
    NonPositiveTimeout,
    /// Retry count must not be negative
    NegativeRetries(i64),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::NonPositiveTimeout => {
                write!(f, "Invalid session policy: timeout must be positive")
            }
            ConfigError::NegativeRetries(n) => {
                write!(
                    f,
                    "Invalid session policy: retries must be zero or more, got {}",
                    n
                )
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Immutable retry/timeout policy owned by a single session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionPolicy {
    timeout: Duration,
    max_retries: u32,
    retryable_status_codes: BTreeSet<u16>,
    retryable_methods: BTreeSet<HttpMethod>,
}

impl SessionPolicy {
    /// Validates and builds a policy. Retry count is taken as signed so that
    /// negative values coming from user input are rejected rather than wrapped.
    pub fn new(
        timeout: Duration,
        max_retries: i64,
        retryable_status_codes: Option<BTreeSet<u16>>,
        retryable_methods: Option<BTreeSet<HttpMethod>>,
    ) -> Result<Self, ConfigError> {
        if timeout.is_zero() {
            return Err(ConfigError::NonPositiveTimeout);
        }
        let max_retries =
            u32::try_from(max_retries).map_err(|_| ConfigError::NegativeRetries(max_retries))?;

        Ok(Self {
            timeout,
            max_retries,
            retryable_status_codes: retryable_status_codes
                .unwrap_or_else(|| DEFAULT_RETRYABLE_STATUS_CODES.into_iter().collect()),
            retryable_methods: retryable_methods
                .unwrap_or_else(|| DEFAULT_RETRYABLE_METHODS.into_iter().collect()),
        })
    }

    /// Builds a policy from a timeout in whole seconds, as taken from the command line.
    pub fn from_secs(timeout_secs: i64, max_retries: i64) -> Result<Self, ConfigError> {
        let secs = u64::try_from(timeout_secs).map_err(|_| ConfigError::NonPositiveTimeout)?;
        Self::new(Duration::from_secs(secs), max_retries, None, None)
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn retryable_status_codes(&self) -> &BTreeSet<u16> {
        &self.retryable_status_codes
    }

    pub fn retryable_methods(&self) -> &BTreeSet<HttpMethod> {
        &self.retryable_methods
    }

    /// Whether a response with `status` to a `method` request may be retried.
    pub fn should_retry_status(&self, method: HttpMethod, status: u16) -> bool {
        self.retryable_methods.contains(&method) && self.retryable_status_codes.contains(&status)
    }

    /// Whether a transport failure for `method` may be retried.
    pub fn should_retry_transport(&self, method: HttpMethod) -> bool {
        self.retryable_methods.contains(&method)
    }

    /// Delay before retry number `retry` (1-based): 0.1s, 0.2s, 0.4s, ...
    pub fn backoff(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(32);
        let ms = BACKOFF_FACTOR_MS.saturating_mul(1u64 << exponent);
        Duration::from_millis(ms.min(BACKOFF_MAX_MS))
    }
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_retries: DEFAULT_MAX_RETRIES,
            retryable_status_codes: DEFAULT_RETRYABLE_STATUS_CODES.into_iter().collect(),
            retryable_methods: DEFAULT_RETRYABLE_METHODS.into_iter().collect(),
        }
    }
}
