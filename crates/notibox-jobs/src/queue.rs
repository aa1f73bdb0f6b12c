//! Persistent, SQLite-backed job queue.
//!
//! Durable FIFO-per-queue storage with atomic claim/ack/nack and
//! visibility-timeout recovery. Every mutating operation is a single SQL
//! statement, so claim exclusivity, retry counting and dead-lettering need no
//! in-process locks and stay correct even with multiple processes sharing one
//! database file.

use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use thiserror::Error;

use crate::retry::{retry_on_busy, RetryConfig};

/// Queue for the heavy, retryable notification-processing job type. This is
/// the only job type that flows through the persistent store.
pub const QUEUE_PROCESS_NOTIFICATION: &str = "process_notification";
/// Queue name for rule application jobs.
pub const QUEUE_APPLY_RULE: &str = "apply_rule";
/// Queue name for older-notification backfill jobs.
pub const QUEUE_SYNC_OLDER: &str = "sync_older";
/// Queue name for re-running all rules against one notification.
pub const QUEUE_APPLY_RULES_TO_NOTIFICATION: &str = "apply_rules_to_notification";

/// Default retry budget for a job.
pub const DEFAULT_MAX_ATTEMPTS: i64 = 5;

/// Default visibility timeout: a `processing` job older than this is
/// considered abandoned and reclaimed by [`JobQueue::reset_stale`].
pub const DEFAULT_VISIBILITY_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Backoff cap between job retries (5 minutes).
const MAX_BACKOFF_SECS: u64 = 300;

const STATUS_PENDING: &str = "pending";
const STATUS_PROCESSING: &str = "processing";
const STATUS_FAILED: &str = "failed";

/// Stored timestamps are RFC3339 TEXT with millisecond precision. The fixed
/// width keeps string comparison chronological, and the sub-second precision
/// keeps retry backoff accurate (a second-granular format would let a nack
/// near a second boundary round a one-second backoff down to nothing).
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

/// Errors from queue operations.
#[derive(Debug, Error)]
pub enum QueueError {
    /// Dequeue found no eligible job.
    #[error("no job available")]
    NoJobAvailable,

    /// The referenced job does not exist (already acked?).
    #[error("job {0} not found")]
    NotFound(i64),

    /// A stored timestamp failed to parse.
    #[error("invalid timestamp in job row: {0}")]
    Timestamp(#[from] chrono::ParseError),

    /// The storage engine failed (after bounded busy-retries).
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// A claimed or enqueued job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    /// Storage-assigned id.
    pub id: i64,
    /// The queue (namespace) the job belongs to.
    pub queue: String,
    /// Opaque payload; callers own the serialization format.
    pub payload: Vec<u8>,
    /// 1-based attempt counter, incremented on each claim.
    pub attempts: i64,
    /// Retry budget; at this many attempts a failure dead-letters the job.
    pub max_attempts: i64,
    /// Insertion time.
    pub created_at: DateTime<Utc>,
    /// Earliest eligible execution time.
    pub scheduled_at: DateTime<Utc>,
}

/// Parameters for [`JobQueue::enqueue`].
#[derive(Debug, Clone)]
pub struct EnqueueParams<'a> {
    /// Target queue.
    pub queue: &'a str,
    /// Opaque payload bytes.
    pub payload: &'a [u8],
    /// Retry budget; zero or negative falls back to [`DEFAULT_MAX_ATTEMPTS`].
    pub max_attempts: i64,
    /// Delay before the job becomes eligible; zero means immediately.
    pub delay: Duration,
}

impl<'a> EnqueueParams<'a> {
    /// Creates params with the default retry budget and no delay.
    pub fn new(queue: &'a str, payload: &'a [u8]) -> Self {
        EnqueueParams {
            queue,
            payload,
            max_attempts: 0,
            delay: Duration::ZERO,
        }
    }
}

/// Read-only queue depth counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    /// Jobs waiting to be claimed.
    pub pending: i64,
    /// Jobs currently claimed by a worker.
    pub processing: i64,
    /// Dead-lettered jobs, retained for inspection.
    pub failed: i64,
}

#[derive(Debug, sqlx::FromRow)]
struct JobRow {
    id: i64,
    queue: String,
    payload: String,
    attempts: i64,
    max_attempts: i64,
    created_at: String,
    scheduled_at: String,
}

impl JobRow {
    fn into_job(self) -> Result<Job, QueueError> {
        Ok(Job {
            id: self.id,
            queue: self.queue,
            payload: self.payload.into_bytes(),
            attempts: self.attempts,
            max_attempts: self.max_attempts,
            created_at: parse_timestamp(&self.created_at)?,
            scheduled_at: parse_timestamp(&self.scheduled_at)?,
        })
    }
}

pub(crate) fn format_timestamp(t: DateTime<Utc>) -> String {
    t.format(TIMESTAMP_FORMAT).to_string()
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    Ok(DateTime::parse_from_rfc3339(s)?.with_timezone(&Utc))
}

/// SQLite-backed persistent job queue.
#[derive(Clone)]
pub struct JobQueue {
    pool: SqlitePool,
    retry: RetryConfig,
}

impl JobQueue {
    /// Creates a queue over an existing connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        JobQueue {
            pool,
            retry: RetryConfig::default(),
        }
    }

    /// Overrides the busy-retry configuration.
    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Returns the underlying pool, for callers that need direct access in
    /// tests.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Creates the jobs table and its poll index if they do not exist.
    pub async fn migrate(&self) -> Result<(), QueueError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS jobs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                queue TEXT NOT NULL,
                payload TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'pending',
                attempts INTEGER NOT NULL DEFAULT 0,
                max_attempts INTEGER NOT NULL DEFAULT 5,
                created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now')),
                updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now')),
                scheduled_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now')),
                started_at TEXT,
                completed_at TEXT,
                last_error TEXT
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_jobs_poll ON jobs(queue, status, scheduled_at)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Inserts a `pending` job. With a delay the job only becomes eligible at
    /// `now + delay`.
    pub async fn enqueue(&self, params: EnqueueParams<'_>) -> Result<i64, QueueError> {
        let max_attempts = if params.max_attempts > 0 {
            params.max_attempts
        } else {
            DEFAULT_MAX_ATTEMPTS
        };

        let queue = params.queue;
        let now = Utc::now();
        let scheduled_at =
            format_timestamp(now + chrono::Duration::from_std(params.delay).unwrap_or_default());
        let created_at = format_timestamp(now);
        let payload = String::from_utf8_lossy(params.payload).into_owned();

        let id = retry_on_busy(&self.retry, || {
            let payload = payload.clone();
            let scheduled_at = scheduled_at.clone();
            let created_at = created_at.clone();
            async move {
                sqlx::query_scalar::<_, i64>(
                    "INSERT INTO jobs (queue, payload, status, max_attempts, created_at, updated_at, scheduled_at)
                     VALUES (?, ?, 'pending', ?, ?, ?, ?)
                     RETURNING id",
                )
                .bind(queue)
                .bind(payload)
                .bind(max_attempts)
                .bind(&created_at)
                .bind(&created_at)
                .bind(scheduled_at)
                .fetch_one(&self.pool)
                .await
            }
        })
        .await?;

        Ok(id)
    }

    /// Atomically claims the oldest eligible job in `queue`.
    ///
    /// The claim is one mutating statement: the selected row flips to
    /// `processing`, its attempt counter increments and `started_at` is
    /// stamped, so two workers can never claim the same row.
    pub async fn dequeue(&self, queue: &str) -> Result<Job, QueueError> {
        let now = format_timestamp(Utc::now());

        let row = retry_on_busy(&self.retry, || {
            let now = now.clone();
            async move {
                sqlx::query_as::<_, JobRow>(
                    "UPDATE jobs
                     SET status = 'processing', attempts = attempts + 1, started_at = ?, updated_at = ?
                     WHERE id = (
                         SELECT id FROM jobs
                         WHERE queue = ? AND status = 'pending' AND scheduled_at <= ?
                         ORDER BY scheduled_at ASC, id ASC
                         LIMIT 1
                     )
                     RETURNING id, queue, payload, attempts, max_attempts, created_at, scheduled_at",
                )
                .bind(&now)
                .bind(&now)
                .bind(queue)
                .bind(&now)
                .fetch_optional(&self.pool)
                .await
            }
        })
        .await?;

        match row {
            Some(row) => row.into_job(),
            None => Err(QueueError::NoJobAvailable),
        }
    }

    /// Marks a job as successfully completed by deleting it. Success is
    /// defined as "the job no longer exists".
    pub async fn ack(&self, job_id: i64) -> Result<(), QueueError> {
        retry_on_busy(&self.retry, || async move {
            sqlx::query("DELETE FROM jobs WHERE id = ?")
                .bind(job_id)
                .execute(&self.pool)
                .await
        })
        .await?;
        Ok(())
    }

    /// Records a failed attempt.
    ///
    /// With attempts remaining the job returns to `pending` with an
    /// exponential, attempt-indexed backoff (1s, 2s, 4s, ... capped at five
    /// minutes). Once the budget is exhausted the job is dead-lettered:
    /// status `failed`, `last_error` kept, row retained for inspection and
    /// never retried again.
    pub async fn nack(&self, job_id: i64, error: &str) -> Result<(), QueueError> {
        let (attempts, max_attempts) = retry_on_busy(&self.retry, || async move {
            sqlx::query_as::<_, (i64, i64)>(
                "SELECT attempts, max_attempts FROM jobs WHERE id = ?",
            )
            .bind(job_id)
            .fetch_optional(&self.pool)
            .await
        })
        .await?
        .ok_or(QueueError::NotFound(job_id))?;

        let now = format_timestamp(Utc::now());

        if attempts >= max_attempts {
            retry_on_busy(&self.retry, || {
                let now = now.clone();
                async move {
                    sqlx::query(
                        "UPDATE jobs
                         SET status = 'failed', completed_at = ?, updated_at = ?, last_error = ?
                         WHERE id = ?",
                    )
                    .bind(&now)
                    .bind(&now)
                    .bind(error)
                    .bind(job_id)
                    .execute(&self.pool)
                    .await
                }
            })
            .await?;
            return Ok(());
        }

        let next_schedule = format_timestamp(Utc::now() + chrono::Duration::seconds(retry_backoff_secs(attempts) as i64));

        retry_on_busy(&self.retry, || {
            let now = now.clone();
            let next_schedule = next_schedule.clone();
            async move {
                sqlx::query(
                    "UPDATE jobs
                     SET status = 'pending', scheduled_at = ?, updated_at = ?, last_error = ?
                     WHERE id = ?",
                )
                .bind(next_schedule)
                .bind(&now)
                .bind(error)
                .bind(job_id)
                .execute(&self.pool)
                .await
            }
        })
        .await?;

        Ok(())
    }

    /// Reclaims jobs stuck in `processing` whose claim is older than
    /// `timeout`, flipping them back to `pending`. This is the crash-recovery
    /// path: a worker that died mid-job never acked, so its job becomes
    /// eligible again once the visibility timeout elapses.
    ///
    /// Returns the number of jobs reclaimed.
    pub async fn reset_stale(&self, timeout: Duration) -> Result<u64, QueueError> {
        let cutoff = format_timestamp(
            Utc::now() - chrono::Duration::from_std(timeout).unwrap_or_default(),
        );
        let now = format_timestamp(Utc::now());

        let result = retry_on_busy(&self.retry, || {
            let cutoff = cutoff.clone();
            let now = now.clone();
            async move {
                sqlx::query(
                    "UPDATE jobs
                     SET status = 'pending', started_at = NULL, updated_at = ?
                     WHERE status = 'processing' AND started_at IS NOT NULL AND started_at < ?",
                )
                .bind(&now)
                .bind(&cutoff)
                .execute(&self.pool)
                .await
            }
        })
        .await?;

        Ok(result.rows_affected())
    }

    /// Returns counters for one queue.
    pub async fn stats(&self, queue: &str) -> Result<QueueStats, QueueError> {
        let (pending, processing, failed) = sqlx::query_as::<_, (i64, i64, i64)>(
            "SELECT
                COALESCE(SUM(CASE WHEN status = ? THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN status = ? THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN status = ? THEN 1 ELSE 0 END), 0)
             FROM jobs WHERE queue = ?",
        )
        .bind(STATUS_PENDING)
        .bind(STATUS_PROCESSING)
        .bind(STATUS_FAILED)
        .bind(queue)
        .fetch_one(&self.pool)
        .await?;

        Ok(QueueStats {
            pending,
            processing,
            failed,
        })
    }

    /// Returns counters across all queues.
    pub async fn all_stats(&self) -> Result<QueueStats, QueueError> {
        let (pending, processing, failed) = sqlx::query_as::<_, (i64, i64, i64)>(
            "SELECT
                COALESCE(SUM(CASE WHEN status = ? THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN status = ? THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN status = ? THEN 1 ELSE 0 END), 0)
             FROM jobs",
        )
        .bind(STATUS_PENDING)
        .bind(STATUS_PROCESSING)
        .bind(STATUS_FAILED)
        .fetch_one(&self.pool)
        .await?;

        Ok(QueueStats {
            pending,
            processing,
            failed,
        })
    }
}

/// Retry backoff in seconds after a failed attempt: 2^(attempts-1), capped at
/// five minutes. Indexed by the job's own attempt counter, so concurrent jobs
/// in one queue back off independently.
fn retry_backoff_secs(attempts: i64) -> u64 {
    let exponent = attempts.saturating_sub(1).clamp(0, 32) as u32;
    (1u64 << exponent).min(MAX_BACKOFF_SECS)
}
