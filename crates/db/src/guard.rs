//! Deadline and cancellation for store calls.

use std::future::Future;
use std::time::Duration;

use sea_orm::{ConnAcquireErr, DbErr, SqlErr};
use social_common::{AppError, AppResult};
use tokio_util::sync::CancellationToken;

/// Default ceiling for a single store call.
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(5);

/// Runs store calls under a deadline, racing them against cancellation.
///
/// Whichever finishes first wins: the call's own result, the deadline
/// ([`AppError::Timeout`]), or the caller's token ([`AppError::Cancelled`]).
/// The losing future is dropped, which releases its pooled connection.
#[derive(Debug, Clone, Copy)]
pub struct QueryGuard {
    timeout: Duration,
}

impl Default for QueryGuard {
    fn default() -> Self {
        Self::new(DEFAULT_QUERY_TIMEOUT)
    }
}

impl QueryGuard {
    #[must_use]
    pub const fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run `fut` to completion, the deadline, or cancellation.
    pub async fn run<T, F>(&self, cancel: &CancellationToken, fut: F) -> AppResult<T>
    where
        F: Future<Output = AppResult<T>>,
    {
        if cancel.is_cancelled() {
            return Err(AppError::Cancelled);
        }

        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                tracing::debug!("store call cancelled by caller");
                Err(AppError::Cancelled)
            }
            result = tokio::time::timeout(self.timeout, fut) => match result {
                Ok(inner) => inner,
                Err(_) => {
                    tracing::warn!(
                        timeout_ms = u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
                        "store call timed out"
                    );
                    Err(AppError::Timeout(self.timeout))
                }
            },
        }
    }

    /// Map a driver error onto the application taxonomy.
    ///
    /// Unique-key violations surface as [`AppError::Conflict`] and a pool
    /// that cannot hand out a connection in time as [`AppError::Timeout`];
    /// anything the caller cannot act on becomes an opaque
    /// [`AppError::Storage`].
    #[must_use]
    pub fn classify(&self, err: DbErr) -> AppError {
        if let Some(SqlErr::UniqueConstraintViolation(detail)) = err.sql_err() {
            return AppError::Conflict(detail);
        }
        match err {
            DbErr::RecordNotFound(what) => AppError::NotFound(what),
            DbErr::ConnectionAcquire(ConnAcquireErr::Timeout) => {
                tracing::warn!("timed out waiting for a pooled connection");
                AppError::Timeout(self.timeout)
            }
            other => {
                tracing::warn!(error = %other, "store call failed");
                AppError::Storage(other.to_string())
            }
        }
    }
}
