//! Error types for the load driver.
//!
//! Errors fall into two categories. Construction-time
//! errors (`ConfigError`, `GeneratorError`, `TemplateError`) are fatal and
//! bubble up to `main`. Worker-time failures are classified by
//! [`Classification`] so the run loop can decide whether to count-and-continue,
//! retry-with-backoff, or exit the worker — never to crash the whole run.

use std::fmt;

/// Startup / construction errors. Any of these aborts the process with a
/// non-zero exit code before a single worker starts.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required option: {0}")]
    MissingRequired(&'static str),

    #[error("unknown option: {0}")]
    UnknownOption(String),

    #[error("could not read config file {path}: {source}")]
    ConfigFileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid value for {name}: {value} ({reason})")]
    InvalidValue {
        name: &'static str,
        value: String,
        reason: &'static str,
    },

    #[error("rate must be > 0 and rate*time >= 2*threads (got rate={rate}, time={time}, threads={threads})")]
    RateTooLow { rate: f64, time: u64, threads: u32 },

    #[error("load must be in [1,100], got {0}")]
    LoadOutOfRange(u32),
}

#[derive(Debug, thiserror::Error)]
pub enum GeneratorError {
    #[error("unknown parameter type: {0}")]
    UnknownType(String),

    #[error("malformed generator spec: {0}")]
    Malformed(String),

    #[error("value generator requires a non-empty data table")]
    EmptyDataTable,

    #[error("could not parse bound {value:?} as {kind}")]
    BadBound { value: String, kind: &'static str },

    #[error("could not parse date {value:?} with format {format:?}")]
    BadDate { value: String, format: String },
}

#[derive(Debug, thiserror::Error)]
pub enum DataTableError {
    #[error("could not read data file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("unterminated quoted field in CSV row {0}")]
    UnterminatedQuote(usize),
}

#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    #[error("parameter site {index} has neither an inline spec nor a params override")]
    MissingSpec { index: usize },

    #[error("unrecognised SQL verb (must be one of SELECT, INSERT, UPDATE, DELETE, EXECUTE): {0:?}")]
    UnknownVerb(String),

    #[error(transparent)]
    Generator(#[from] GeneratorError),
}

/// Fatal errors raised while assembling the engine before any worker runs.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error(transparent)]
    DataTable(#[from] DataTableError),

    #[error("could not build datasource: {0}")]
    Datasource(#[from] sqlx::Error),

    #[error("monitor task did not complete: {0}")]
    MonitorJoin(String),
}

/// The outcome of classifying a [`sqlx::Error`] encountered mid-transaction.
///
/// Mirrors a retryable/non-retryable error split, adapted to the four
/// dispositions a worker can act on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Transaction-rollback condition (serialization failure or deadlock).
    /// Roll back, bump the matching abort counter, continue the outer loop.
    Rollback { deadlock: bool },
    /// Connection dropped mid-statement but the pool can hand back a fresh
    /// one next iteration. Log and continue.
    TransientConnection,
    /// Connection-level failure that is not expected to self-heal on the
    /// very next acquire. Counts toward the worker's retry budget.
    NonTransientConnection,
    /// Anything else SQL-related. Fatal to the worker.
    OtherSql,
}

impl Classification {
    /// Classify a `sqlx::Error` by its SQLSTATE code.
    ///
    /// PostgreSQL SQLSTATE `40001` (serialization_failure) and `40P01`
    /// (deadlock_detected) are rollback conditions; `40P01` or a message
    /// containing the literal substring "deadlock" counts as a deadlock.
    /// SQLSTATE class `08` (connection_exception) and pool timeouts are
    /// connection failures; everything else SQL-shaped is `OtherSql`.
    pub fn classify(err: &sqlx::Error) -> Classification {
        match err {
            sqlx::Error::Database(db_err) => {
                let code = db_err.code().map(|c| c.to_string()).unwrap_or_default();
                let message = db_err.message();
                let is_deadlock = code == "40P01" || message.to_lowercase().contains("deadlock");
                if code == "40001" || code == "40P01" {
                    Classification::Rollback { deadlock: is_deadlock }
                } else if code.starts_with("08") {
                    Classification::NonTransientConnection
                } else {
                    Classification::OtherSql
                }
            }
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                Classification::TransientConnection
            }
            _ => Classification::OtherSql,
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Classification::Rollback { deadlock: true } => write!(f, "rollback (deadlock)"),
            Classification::Rollback { deadlock: false } => write!(f, "rollback (conflict)"),
            Classification::TransientConnection => write!(f, "transient connection loss"),
            Classification::NonTransientConnection => write!(f, "non-transient connection failure"),
            Classification::OtherSql => write!(f, "other SQL failure"),
        }
    }
}

/// Linear backoff policy for non-transient connection failures: sleep
/// `300ms * attempt`, give up after 3 attempts and exit the worker.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub base_delay_ms: u64,
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { base_delay_ms: 300, max_attempts: 3 }
    }
}

impl RetryPolicy {
    pub fn backoff_ms(&self, attempt: u32) -> u64 {
        self.base_delay_ms * attempt as u64
    }

    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt <= self.max_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn db_err(code: &str, message: &str) -> sqlx::Error {
        #[derive(Debug)]
        struct Fake {
            code: String,
            message: String,
        }
        impl fmt::Display for Fake {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.message)
            }
        }
        impl std::error::Error for Fake {}
        impl sqlx::error::DatabaseError for Fake {
            fn message(&self) -> &str {
                &self.message
            }
            fn code(&self) -> Option<std::borrow::Cow<'_, str>> {
                Some(std::borrow::Cow::Owned(self.code.clone()))
            }
            fn as_error(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
                self
            }
            fn as_error_mut(&mut self) -> &mut (dyn std::error::Error + Send + Sync + 'static) {
                self
            }
            fn into_error(self: Box<Self>) -> Box<dyn std::error::Error + Send + Sync + 'static> {
                self
            }
            fn kind(&self) -> sqlx::error::ErrorKind {
                sqlx::error::ErrorKind::Other
            }
        }
        sqlx::Error::Database(Box::new(Fake {
            code: code.to_string(),
            message: message.to_string(),
        }))
    }

    #[test]
    fn classifies_deadlock() {
        let e = db_err("40P01", "deadlock detected");
        assert_eq!(Classification::classify(&e), Classification::Rollback { deadlock: true });
    }

    #[test]
    fn classifies_serialization_conflict() {
        let e = db_err("40001", "could not serialize access");
        assert_eq!(Classification::classify(&e), Classification::Rollback { deadlock: false });
    }

    #[test]
    fn classifies_connection_exception() {
        let e = db_err("08006", "connection reset");
        assert_eq!(Classification::classify(&e), Classification::NonTransientConnection);
    }

    #[test]
    fn classifies_other() {
        let e = db_err("42601", "syntax error");
        assert_eq!(Classification::classify(&e), Classification::OtherSql);
    }

    #[test]
    fn retry_policy_backoff() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff_ms(1), 300);
        assert_eq!(policy.backoff_ms(3), 900);
        assert!(policy.should_retry(3));
        assert!(!policy.should_retry(4));
    }
}
