//! Runtime abstraction for the few system facts the client depends on.
//!
//! Environment lookups and the clock go through [`Runtime`] so configuration
//! and default year windows can be tested with a mock.

use chrono::Datelike;
use std::env;

#[cfg_attr(test, mockall::automock)]
pub trait Runtime: Send + Sync {
    // Environment
    fn env_var(&self, key: &str) -> Result<String, env::VarError>;

    // Clock
    fn current_year(&self) -> i32;
}

pub struct RealRuntime;

impl Runtime for RealRuntime {
    #[tracing::instrument(skip(self))]
    fn env_var(&self, key: &str) -> Result<String, env::VarError> {
        env::var(key)
    }

    #[tracing::instrument(skip(self))]
    fn current_year(&self) -> i32 {
        chrono::Local::now().year()
    }
}
