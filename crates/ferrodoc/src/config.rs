//! Client configuration.
//!
//! [`Settings`] is consumed once when a [`Database`](crate::Database) is
//! built. The attempt budget and concurrency ceiling defaults come from
//! [`ferrodoc_core::types`]; they are not renegotiated at runtime.

use crate::logger::Logger;
use core::time::Duration;
use ferrodoc_core::{
    Error, Result,
    types::{
        DEFAULT_DATABASE_ID, DEFAULT_MAX_TRANSACTION_ATTEMPTS, DEFAULT_RETRY_DELAY,
        MAX_CONCURRENT_REQUESTS_PER_CLIENT,
    },
};

/// Default endpoint, a local emulator.
pub const DEFAULT_ENDPOINT: &str = "http://localhost:8080";

#[derive(Clone, Debug)]
pub struct Settings {
    /// Project to address. When absent it is detected through the first
    /// client handle.
    pub project_id: Option<String>,
    pub database_id: String,
    /// gRPC endpoint URI.
    pub endpoint: String,
    /// Operations multiplexed over one client handle before another handle
    /// is created.
    pub max_concurrency: usize,
    /// Delay before every retried attempt.
    pub retry_delay: Duration,
    pub logger: Logger,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            project_id: None,
            database_id: DEFAULT_DATABASE_ID.to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            max_concurrency: MAX_CONCURRENT_REQUESTS_PER_CLIENT,
            retry_delay: DEFAULT_RETRY_DELAY,
            logger: Logger::default(),
        }
    }
}

impl Settings {
    pub fn with_project_id(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }

    pub fn with_database_id(mut self, database_id: impl Into<String>) -> Self {
        self.database_id = database_id.into();
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency;
        self
    }

    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    pub fn with_logger(mut self, logger: Logger) -> Self {
        self.logger = logger;
        self
    }

    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for a zero concurrency ceiling or
    /// empty ids.
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrency == 0 {
            return Err(Error::invalid_argument(
                "max_concurrency must be greater than 0",
            ));
        }
        if self.database_id.is_empty() {
            return Err(Error::invalid_argument("database_id must not be empty"));
        }
        if self.project_id.as_deref() == Some("") {
            return Err(Error::invalid_argument("project_id must not be empty"));
        }
        Ok(())
    }
}

/// Options for [`Database::run_transaction_with`](crate::Database::run_transaction_with).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TransactionOptions {
    /// Total number of begin/commit cycles, including the first.
    pub max_attempts: usize,
}

impl Default for TransactionOptions {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_TRANSACTION_ATTEMPTS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_backend_limits() {
        let settings = Settings::default();
        assert_eq!(settings.max_concurrency, 100);
        assert_eq!(settings.retry_delay, Duration::from_millis(100));
        assert_eq!(settings.database_id, "(default)");
        assert!(settings.validate().is_ok());
        assert_eq!(TransactionOptions::default().max_attempts, 5);
    }

    #[test]
    fn rejects_degenerate_settings() {
        assert!(Settings::default().with_max_concurrency(0).validate().is_err());
        assert!(Settings::default().with_database_id("").validate().is_err());
        assert!(Settings::default().with_project_id("").validate().is_err());
    }
}
