//! Background job scheduler.
//!
//! Orchestrates a worker pool over the persistent queue plus the periodic
//! sync/cleanup/update loops. Delivery is at-least-once: a job is either
//! acked (deleted) or left in a state the stale sweep will recover, so no job
//! is lost across crashes or restarts. The scheduler itself holds no
//! persistent state: losing it only delays work, never loses it.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::args::{ApplyRuleArgs, SyncOlderArgs};
use crate::handler::JobHandler;
use crate::queue::{EnqueueParams, JobQueue, QueueError, QUEUE_PROCESS_NOTIFICATION};

/// Default number of workers processing notifications concurrently.
const DEFAULT_NOTIFICATION_WORKERS: usize = 4;

/// Capacity of the non-durable trigger channels.
const TRIGGER_CHANNEL_CAPACITY: usize = 10;

/// Configuration for the scheduler's loops and worker pool.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Period of the full-sync ticker.
    pub sync_interval: Duration,
    /// Number of concurrent notification workers.
    pub notification_workers: usize,
    /// Sleep between dequeue polls when the queue is empty.
    pub poll_interval: Duration,
    /// Flat sleep after a transient dequeue error.
    pub error_backoff: Duration,
    /// Age after which a `processing` job is considered abandoned.
    pub visibility_timeout: Duration,
    /// Period of the stale-job sweep.
    pub stale_check_interval: Duration,
    /// Delay after startup before the first cleanup run.
    pub cleanup_startup_delay: Duration,
    /// Period of the cleanup loop.
    pub cleanup_interval: Duration,
    /// Whether to run the update-check loop at all.
    pub update_check: bool,
    /// Delay after startup before the first update check.
    pub update_check_startup_delay: Duration,
    /// Period of the update-check loop.
    pub update_check_interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            sync_interval: Duration::from_secs(30),
            notification_workers: DEFAULT_NOTIFICATION_WORKERS,
            poll_interval: Duration::from_millis(100),
            error_backoff: Duration::from_secs(1),
            visibility_timeout: crate::queue::DEFAULT_VISIBILITY_TIMEOUT,
            stale_check_interval: Duration::from_secs(60),
            cleanup_startup_delay: Duration::from_secs(30),
            cleanup_interval: Duration::from_secs(24 * 60 * 60),
            update_check: false,
            update_check_startup_delay: Duration::from_secs(60),
            update_check_interval: Duration::from_secs(60 * 60),
        }
    }
}

struct SchedulerState {
    running: bool,
    stop_tx: Option<watch::Sender<bool>>,
    tasks: Vec<JoinHandle<()>>,
}

/// Background job scheduler: worker pool, trigger channels and periodic
/// loops, over a persistent [`JobQueue`].
///
/// `start`/`stop` are idempotent. Stopping signals every task and waits for
/// them to drain; in-flight handler invocations finish, and any job still
/// claimed when the process dies is recovered by the next stale sweep.
pub struct Scheduler<H: JobHandler> {
    queue: JobQueue,
    handler: Arc<H>,
    config: SchedulerConfig,

    // Non-durable trigger channels. The receivers live behind mutexes so the
    // coordinator can take them for the duration of a run and a restarted
    // scheduler can take them again.
    sync_tx: mpsc::Sender<()>,
    sync_rx: Arc<Mutex<mpsc::Receiver<()>>>,
    apply_rule_tx: mpsc::Sender<ApplyRuleArgs>,
    apply_rule_rx: Arc<Mutex<mpsc::Receiver<ApplyRuleArgs>>>,
    sync_older_tx: mpsc::Sender<SyncOlderArgs>,
    sync_older_rx: Arc<Mutex<mpsc::Receiver<SyncOlderArgs>>>,

    state: Mutex<SchedulerState>,
}

impl<H: JobHandler> Scheduler<H> {
    /// Creates a stopped scheduler.
    pub fn new(queue: JobQueue, handler: Arc<H>, config: SchedulerConfig) -> Self {
        let (sync_tx, sync_rx) = mpsc::channel(TRIGGER_CHANNEL_CAPACITY);
        let (apply_rule_tx, apply_rule_rx) = mpsc::channel(TRIGGER_CHANNEL_CAPACITY);
        let (sync_older_tx, sync_older_rx) = mpsc::channel(TRIGGER_CHANNEL_CAPACITY);

        Scheduler {
            queue,
            handler,
            config,
            sync_tx,
            sync_rx: Arc::new(Mutex::new(sync_rx)),
            apply_rule_tx,
            apply_rule_rx: Arc::new(Mutex::new(apply_rule_rx)),
            sync_older_tx,
            sync_older_rx: Arc::new(Mutex::new(sync_older_rx)),
            state: Mutex::new(SchedulerState {
                running: false,
                stop_tx: None,
                tasks: Vec::new(),
            }),
        }
    }

    /// Returns true while the scheduler is running.
    pub async fn is_running(&self) -> bool {
        self.state.lock().await.running
    }

    /// Starts the worker pool and the periodic loops. A no-op when already
    /// running.
    pub async fn start(&self) -> Result<(), QueueError> {
        let mut state = self.state.lock().await;
        if state.running {
            return Ok(());
        }

        // Reclaim jobs abandoned by a previous run before workers start.
        match self.queue.reset_stale(self.config.visibility_timeout).await {
            Ok(count) if count > 0 => info!(count, "reset stale jobs from previous run"),
            Ok(_) => {}
            Err(err) => warn!(%err, "failed to reset stale jobs on startup"),
        }

        if let Ok(stats) = self.queue.all_stats().await {
            info!(
                pending = stats.pending,
                processing = stats.processing,
                failed = stats.failed,
                "job queue status on startup"
            );
        }

        let (stop_tx, stop_rx) = watch::channel(false);
        let mut tasks = Vec::new();

        info!(count = self.config.notification_workers, "starting notification workers");
        for worker_id in 0..self.config.notification_workers {
            tasks.push(tokio::spawn(notification_worker(
                self.queue.clone(),
                Arc::clone(&self.handler),
                self.config.clone(),
                stop_rx.clone(),
                worker_id,
            )));
        }

        tasks.push(tokio::spawn(stale_sweep_loop(
            self.queue.clone(),
            self.config.clone(),
            stop_rx.clone(),
        )));

        tasks.push(tokio::spawn(cleanup_loop(
            Arc::clone(&self.handler),
            self.config.clone(),
            stop_rx.clone(),
        )));

        if self.config.update_check {
            tasks.push(tokio::spawn(update_check_loop(
                Arc::clone(&self.handler),
                self.config.clone(),
                stop_rx.clone(),
            )));
        }

        tasks.push(tokio::spawn(coordinator_loop(
            Arc::clone(&self.handler),
            self.config.clone(),
            Arc::clone(&self.sync_rx),
            Arc::clone(&self.apply_rule_rx),
            Arc::clone(&self.sync_older_rx),
            stop_rx,
        )));

        state.running = true;
        state.stop_tx = Some(stop_tx);
        state.tasks = tasks;
        Ok(())
    }

    /// Signals every task to stop and waits for them to drain. A no-op when
    /// already stopped. Callers wanting a bounded wait wrap this in
    /// `tokio::time::timeout`.
    pub async fn stop(&self) {
        let mut state = self.state.lock().await;
        if !state.running {
            return;
        }

        info!("scheduler stopping");
        if let Some(stop_tx) = state.stop_tx.take() {
            // Receivers also observe the sender dropping; send is best-effort.
            let _ = stop_tx.send(true);
        }

        let tasks = std::mem::take(&mut state.tasks);
        for result in join_all(tasks).await {
            if let Err(err) = result {
                warn!(%err, "scheduler task panicked during shutdown");
            }
        }

        state.running = false;
        info!("all workers finished");
    }

    /// Persists a notification-processing job. This is the durable path:
    /// the job survives restarts and is retried with backoff on failure.
    pub async fn enqueue_process_notification(
        &self,
        user_id: &str,
        payload: &[u8],
    ) -> Result<(), QueueError> {
        let job_id = self
            .queue
            .enqueue(EnqueueParams::new(QUEUE_PROCESS_NOTIFICATION, payload))
            .await?;
        debug!(job_id, user_id, "notification job enqueued");
        Ok(())
    }

    /// Requests a sync soon. Best-effort: when the trigger channel is full
    /// the request is dropped, since the periodic ticker will sync anyway.
    pub fn enqueue_sync_notifications(&self, user_id: &str) {
        match self.sync_tx.try_send(()) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                debug!(user_id, "sync trigger queue full, dropping request");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!("sync trigger channel closed");
            }
        }
    }

    /// Requests a rule application. When the trigger channel is full the
    /// work runs on an ad-hoc background task instead of blocking the caller.
    pub fn enqueue_apply_rule(&self, user_id: &str, rule_id: &str) {
        let args = ApplyRuleArgs {
            user_id: user_id.to_string(),
            rule_id: rule_id.to_string(),
        };
        match self.apply_rule_tx.try_send(args) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(args)) => {
                debug!(rule_id = %args.rule_id, "apply-rule queue full, running in background task");
                let handler = Arc::clone(&self.handler);
                tokio::spawn(async move {
                    apply_rule(handler.as_ref(), args).await;
                });
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!("apply-rule trigger channel closed");
            }
        }
    }

    /// Requests an older-notification backfill. When the trigger channel is
    /// full the work runs on an ad-hoc background task instead of blocking
    /// the caller.
    pub fn enqueue_sync_older(&self, args: SyncOlderArgs) {
        match self.sync_older_tx.try_send(args) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(args)) => {
                debug!("sync-older queue full, running in background task");
                let handler = Arc::clone(&self.handler);
                tokio::spawn(async move {
                    sync_older(handler.as_ref(), args).await;
                });
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!("sync-older trigger channel closed");
            }
        }
    }
}

/// One notification worker: poll, claim, attribute, handle, ack or nack.
async fn notification_worker<H: JobHandler>(
    queue: JobQueue,
    handler: Arc<H>,
    config: SchedulerConfig,
    mut stop_rx: watch::Receiver<bool>,
    worker_id: usize,
) {
    debug!(worker_id, "notification worker started");

    loop {
        if *stop_rx.borrow() {
            break;
        }

        let job = match queue.dequeue(QUEUE_PROCESS_NOTIFICATION).await {
            Ok(job) => job,
            Err(QueueError::NoJobAvailable) => {
                tokio::select! {
                    _ = stop_rx.changed() => break,
                    _ = sleep(config.poll_interval) => continue,
                }
            }
            Err(err) => {
                warn!(worker_id, %err, "failed to dequeue job");
                tokio::select! {
                    _ = stop_rx.changed() => break,
                    _ = sleep(config.error_backoff) => continue,
                }
            }
        };

        // Work must be attributable; without an identity the job goes back
        // to the queue and retries once one is configured.
        let user_id = match handler.current_user_id().await {
            Ok(user_id) => user_id,
            Err(err) => {
                warn!(job_id = job.id, %err, "cannot process notification without an identity");
                if let Err(nack_err) = queue.nack(job.id, &err.to_string()).await {
                    error!(job_id = job.id, %nack_err, "failed to nack job");
                }
                continue;
            }
        };

        debug!(
            worker_id,
            job_id = job.id,
            attempt = job.attempts,
            max_attempts = job.max_attempts,
            "processing notification job"
        );

        match handler.process_notification(&user_id, &job.payload).await {
            Ok(()) => {
                debug!(job_id = job.id, attempt = job.attempts, "notification job completed");
                if let Err(err) = queue.ack(job.id).await {
                    error!(job_id = job.id, %err, "failed to ack job");
                }
            }
            Err(handler_err) => {
                warn!(job_id = job.id, attempt = job.attempts, %handler_err, "notification job failed");
                if let Err(err) = queue.nack(job.id, &handler_err.to_string()).await {
                    error!(job_id = job.id, %err, "failed to nack job");
                }
            }
        }
    }

    debug!(worker_id, "notification worker stopping");
}

/// Periodically reclaims jobs stuck in `processing`.
async fn stale_sweep_loop(
    queue: JobQueue,
    config: SchedulerConfig,
    mut stop_rx: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = stop_rx.changed() => return,
            _ = sleep(config.stale_check_interval) => {}
        }

        match queue.reset_stale(config.visibility_timeout).await {
            Ok(count) if count > 0 => info!(count, "reset stale jobs"),
            Ok(_) => {}
            Err(err) => warn!(%err, "failed to reset stale jobs"),
        }
    }
}

/// Runs retention cleanup shortly after startup, then daily.
async fn cleanup_loop<H: JobHandler>(
    handler: Arc<H>,
    config: SchedulerConfig,
    mut stop_rx: watch::Receiver<bool>,
) {
    tokio::select! {
        _ = stop_rx.changed() => return,
        _ = sleep(config.cleanup_startup_delay) => {}
    }
    run_cleanup(handler.as_ref()).await;

    loop {
        tokio::select! {
            _ = stop_rx.changed() => return,
            _ = sleep(config.cleanup_interval) => {}
        }
        run_cleanup(handler.as_ref()).await;
    }
}

async fn run_cleanup<H: JobHandler>(handler: &H) {
    debug!("starting daily cleanup");

    let user_id = match handler.current_user_id().await {
        Ok(user_id) => user_id,
        Err(err) => {
            debug!(%err, "skipping cleanup - no identity configured");
            return;
        }
    };

    if let Err(err) = handler.cleanup(&user_id).await {
        warn!(%err, "failed to run cleanup");
    }
}

/// Checks for updates shortly after startup, then hourly.
async fn update_check_loop<H: JobHandler>(
    handler: Arc<H>,
    config: SchedulerConfig,
    mut stop_rx: watch::Receiver<bool>,
) {
    tokio::select! {
        _ = stop_rx.changed() => return,
        _ = sleep(config.update_check_startup_delay) => {}
    }
    run_update_check(handler.as_ref()).await;

    loop {
        tokio::select! {
            _ = stop_rx.changed() => return,
            _ = sleep(config.update_check_interval) => {}
        }
        run_update_check(handler.as_ref()).await;
    }
}

async fn run_update_check<H: JobHandler>(handler: &H) {
    debug!("checking for updates");
    match handler.check_updates().await {
        Ok(true) => info!("update check found new version available"),
        Ok(false) => {}
        Err(err) => warn!(%err, "failed to check for updates"),
    }
}

/// The coordinator: one task multiplexing the sync ticker, the three trigger
/// channels and the stop signal. It owns no persistent state, so losing it
/// only delays a sync.
async fn coordinator_loop<H: JobHandler>(
    handler: Arc<H>,
    config: SchedulerConfig,
    sync_rx: Arc<Mutex<mpsc::Receiver<()>>>,
    apply_rule_rx: Arc<Mutex<mpsc::Receiver<ApplyRuleArgs>>>,
    sync_older_rx: Arc<Mutex<mpsc::Receiver<SyncOlderArgs>>>,
    mut stop_rx: watch::Receiver<bool>,
) {
    let mut sync_rx = sync_rx.lock().await;
    let mut apply_rule_rx = apply_rule_rx.lock().await;
    let mut sync_older_rx = sync_older_rx.lock().await;

    let mut ticker = tokio::time::interval(config.sync_interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = stop_rx.changed() => {
                debug!("coordinator stopping");
                return;
            }
            // The first tick fires immediately, which doubles as the
            // startup sync.
            _ = ticker.tick() => run_sync(handler.as_ref()).await,
            Some(()) = sync_rx.recv() => run_sync(handler.as_ref()).await,
            Some(args) = apply_rule_rx.recv() => apply_rule(handler.as_ref(), args).await,
            Some(args) = sync_older_rx.recv() => sync_older(handler.as_ref(), args).await,
        }
    }
}

async fn run_sync<H: JobHandler>(handler: &H) {
    debug!("starting notification sync");

    let user_id = match handler.current_user_id().await {
        Ok(user_id) => user_id,
        Err(err) => {
            debug!(%err, "skipping sync - no identity configured");
            return;
        }
    };

    if let Err(err) = handler.sync_notifications(&user_id).await {
        warn!(%err, "failed to sync notifications");
    }
}

async fn apply_rule<H: JobHandler>(handler: &H, args: ApplyRuleArgs) {
    if let Err(err) = handler.apply_rule(&args.user_id, &args.rule_id).await {
        warn!(rule_id = %args.rule_id, %err, "failed to apply rule");
    }
}

async fn sync_older<H: JobHandler>(handler: &H, args: SyncOlderArgs) {
    let user_id = match handler.current_user_id().await {
        Ok(user_id) => user_id,
        Err(err) => {
            debug!(%err, "skipping sync older - no identity configured");
            return;
        }
    };

    if let Err(err) = handler.sync_older(&user_id, args).await {
        warn!(%err, "failed to sync older notifications");
    }
}
