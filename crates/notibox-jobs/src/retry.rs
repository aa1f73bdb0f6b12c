//! Bounded retry for SQLite busy/locked errors.
//!
//! Queue operations are hot paths under concurrent workers, and SQLite
//! serializes writers: a statement can fail with SQLITE_BUSY while another
//! connection holds the write lock. Those failures are transient, so they are
//! retried with exponential backoff before surfacing to the caller.

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;

/// Default maximum number of attempts for a busy operation.
pub(crate) const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Default initial backoff between attempts (50ms).
pub(crate) const DEFAULT_INITIAL_BACKOFF_MS: u64 = 50;

/// Default maximum backoff between attempts (1 second).
pub(crate) const DEFAULT_MAX_BACKOFF_MS: u64 = 1000;

/// Configuration for busy-retry behavior.
#[derive(Clone, Debug)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first.
    pub max_attempts: u32,
    /// Initial backoff between attempts.
    pub initial_backoff: Duration,
    /// Maximum backoff between attempts.
    pub max_backoff: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            initial_backoff: Duration::from_millis(DEFAULT_INITIAL_BACKOFF_MS),
            max_backoff: Duration::from_millis(DEFAULT_MAX_BACKOFF_MS),
        }
    }
}

impl RetryConfig {
    /// Calculates the backoff before retry attempt `attempt` (0-indexed):
    /// initial * 2^attempt, capped at `max_backoff`.
    pub fn calculate_backoff(&self, attempt: u32) -> Duration {
        let initial_ms = self.initial_backoff.as_millis() as u64;
        let max_ms = self.max_backoff.as_millis() as u64;
        let backoff_ms = initial_ms.saturating_mul(1u64 << attempt.min(32));
        Duration::from_millis(backoff_ms.min(max_ms))
    }
}

/// Returns true for transient SQLite contention errors worth retrying.
pub(crate) fn is_busy_error(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => {
            let message = db_err.message();
            message.contains("database is locked")
                || message.contains("database table is locked")
                || message.contains("SQLITE_BUSY")
        }
        _ => false,
    }
}

/// Runs `op`, retrying on busy errors up to the configured attempt budget.
/// Non-busy errors and exhausted budgets surface the underlying error.
pub(crate) async fn retry_on_busy<T, F, Fut>(config: &RetryConfig, mut op: F) -> Result<T, sqlx::Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, sqlx::Error>>,
{
    let mut attempt = 0u32;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if is_busy_error(&err) && attempt + 1 < config.max_attempts => {
                let backoff = config.calculate_backoff(attempt);
                tracing::debug!(attempt, ?backoff, "database busy, retrying");
                sleep(backoff).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}
