//! Persistent job queue and background scheduler for notibox.
//!
//! Two layers:
//!
//! - [`JobQueue`]: a SQLite-backed queue with atomic claims, exponential
//!   retry, dead-lettering and visibility-timeout crash recovery. All
//!   coordination lives in single-statement SQL, so any number of workers or
//!   processes can share one database safely.
//! - [`Scheduler`]: a tokio worker pool over the queue, plus bounded
//!   non-durable trigger channels and periodic sync/cleanup/update loops.
//!   Business logic is injected through the [`JobHandler`] trait.
//!
//! Delivery is at-least-once: a job is either acked (deleted) or remains in a
//! state the stale sweep recovers. Handlers must tolerate reprocessing.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use anyhow::Result;
//! use futures_util::future::BoxFuture;
//! use futures_util::FutureExt;
//! use notibox_jobs_rs::{JobHandler, JobQueue, Scheduler, SchedulerConfig, SyncOlderArgs};
//!
//! struct Handler;
//!
//! impl JobHandler for Handler {
//!     fn current_user_id(&self) -> BoxFuture<'_, Result<String>> {
//!         async { Ok("1".to_string()) }.boxed()
//!     }
//!     fn sync_notifications<'a>(&'a self, _user_id: &'a str) -> BoxFuture<'a, Result<()>> {
//!         async { Ok(()) }.boxed()
//!     }
//!     fn process_notification<'a>(
//!         &'a self,
//!         _user_id: &'a str,
//!         _payload: &'a [u8],
//!     ) -> BoxFuture<'a, Result<()>> {
//!         async { Ok(()) }.boxed()
//!     }
//!     fn apply_rule<'a>(&'a self, _user_id: &'a str, _rule_id: &'a str) -> BoxFuture<'a, Result<()>> {
//!         async { Ok(()) }.boxed()
//!     }
//!     fn sync_older<'a>(&'a self, _user_id: &'a str, _args: SyncOlderArgs) -> BoxFuture<'a, Result<()>> {
//!         async { Ok(()) }.boxed()
//!     }
//! }
//!
//! # async fn run() -> Result<()> {
//! let pool = sqlx::SqlitePool::connect("sqlite://notibox.db").await?;
//! let queue = JobQueue::new(pool);
//! queue.migrate().await?;
//!
//! let scheduler = Scheduler::new(queue, Arc::new(Handler), SchedulerConfig::default());
//! scheduler.start().await?;
//! // ...
//! scheduler.stop().await;
//! # Ok(())
//! # }
//! ```

pub mod args;
pub mod handler;
pub mod queue;
pub mod retry;
pub mod scheduler;

pub use args::{ApplyRuleArgs, ProcessNotificationArgs, SyncOlderArgs};
pub use handler::JobHandler;
pub use queue::{
    EnqueueParams, Job, JobQueue, QueueError, QueueStats, DEFAULT_MAX_ATTEMPTS,
    DEFAULT_VISIBILITY_TIMEOUT, QUEUE_APPLY_RULE, QUEUE_APPLY_RULES_TO_NOTIFICATION,
    QUEUE_PROCESS_NOTIFICATION, QUEUE_SYNC_OLDER,
};
pub use retry::RetryConfig;
pub use scheduler::{Scheduler, SchedulerConfig};
