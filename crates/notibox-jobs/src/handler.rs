//! The external collaborator surface of the scheduler.
//!
//! The scheduler owns delivery (claiming, retrying, dead-lettering) and
//! delegates all business work through [`JobHandler`]. Implementations live
//! outside this crate; failures are opaque `anyhow` errors that feed the
//! job's retry bookkeeping.

use anyhow::Result;
use futures_util::future::BoxFuture;
use futures_util::FutureExt;

use crate::args::SyncOlderArgs;

/// Handles the per-job-type work the scheduler dispatches.
///
/// Methods return boxed futures so implementations stay object-safe and the
/// scheduler can hold one handler behind an `Arc`. `cleanup` and
/// `check_updates` have no-op defaults for deployments without those
/// features.
pub trait JobHandler: Send + Sync + 'static {
    /// Resolves the identity work is attributed to. A worker that cannot
    /// resolve it fails the job back to the queue, since the job cannot be
    /// processed without attribution.
    fn current_user_id(&self) -> BoxFuture<'_, Result<String>>;

    /// Runs a full notification sync.
    fn sync_notifications<'a>(&'a self, user_id: &'a str) -> BoxFuture<'a, Result<()>>;

    /// Processes one notification payload from the persistent queue.
    fn process_notification<'a>(
        &'a self,
        user_id: &'a str,
        payload: &'a [u8],
    ) -> BoxFuture<'a, Result<()>>;

    /// Applies one rule to the user's notifications.
    fn apply_rule<'a>(&'a self, user_id: &'a str, rule_id: &'a str) -> BoxFuture<'a, Result<()>>;

    /// Backfills older notifications.
    fn sync_older<'a>(
        &'a self,
        user_id: &'a str,
        args: SyncOlderArgs,
    ) -> BoxFuture<'a, Result<()>>;

    /// Daily retention cleanup. Defaults to a no-op.
    fn cleanup<'a>(&'a self, user_id: &'a str) -> BoxFuture<'a, Result<()>> {
        let _ = user_id;
        async { Ok(()) }.boxed()
    }

    /// Checks whether an application update is available. Defaults to "no".
    fn check_updates(&self) -> BoxFuture<'_, Result<bool>> {
        async { Ok(false) }.boxed()
    }
}
