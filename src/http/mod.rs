//! HTTP session with timeout, retry and status-check policy.

mod policy;
mod session;

pub use policy::{
    BACKOFF_FACTOR_MS, BACKOFF_MAX_MS, ConfigError, DEFAULT_MAX_RETRIES,
    DEFAULT_RETRYABLE_METHODS, DEFAULT_RETRYABLE_STATUS_CODES, DEFAULT_TIMEOUT_SECS,
    SessionPolicy,
};
pub use session::{HttpMethod, HttpStatusError, RawResponse, ResilientSession, TransportError};
