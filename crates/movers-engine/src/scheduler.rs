//! Background task scheduler.
//!
//! Refreshes started from a request must outlive that request's response.
//! Tasks are registered with a [`TaskTracker`] so shutdown can wait for them,
//! and each gets a child [`CancellationToken`] that fires when its own
//! timeout expires or when shutdown gives up waiting. Tasks are expected to
//! return promptly once cancelled (and still release their locks).

use std::future::Future;
use std::time::{Duration, Instant};

use movers_core::MoversError;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{info, warn};

#[derive(Clone)]
pub struct Scheduler {
    tracker: TaskTracker,
    shutdown: CancellationToken,
    task_timeout: Duration,
}

impl Scheduler {
    pub fn new(task_timeout: Duration) -> Self {
        Self {
            tracker: TaskTracker::new(),
            shutdown: CancellationToken::new(),
            task_timeout,
        }
    }

    /// Tasks still running.
    pub fn pending(&self) -> usize {
        self.tracker.len()
    }

    /// Run `task` detached. Its outcome is logged, never propagated.
    pub fn spawn<F, Fut, T>(&self, label: impl Into<String>, task: F)
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = Result<T, MoversError>> + Send + 'static,
        T: Send + 'static,
    {
        let label = label.into();
        let cancel = self.shutdown.child_token();
        let fut = task(cancel.clone());
        let timeout = self.task_timeout;

        self.tracker.spawn(async move {
            let started = Instant::now();
            tokio::pin!(fut);
            let result = tokio::select! {
                r = &mut fut => r,
                _ = tokio::time::sleep(timeout) => {
                    warn!("[scheduler] {label} exceeded {timeout:?}, cancelling");
                    cancel.cancel();
                    fut.await
                }
            };
            match result {
                Ok(_) => info!("[scheduler] {label} completed in {:?}", started.elapsed()),
                Err(e) => warn!("[scheduler] {label} failed after {:?}: {e}", started.elapsed()),
            }
        });
    }

    /// Stop accepting work and wait up to `grace` for running tasks.
    ///
    /// Tasks still running after `grace` are cancelled and awaited. Returns
    /// `true` if everything finished within the grace period.
    pub async fn shutdown(&self, grace: Duration) -> bool {
        self.tracker.close();
        let pending = self.tracker.len();
        if pending > 0 {
            info!("[scheduler] waiting for {pending} background task(s)");
        }
        if tokio::time::timeout(grace, self.tracker.wait()).await.is_ok() {
            return true;
        }
        warn!("[scheduler] grace period elapsed, cancelling {} task(s)", self.tracker.len());
        self.shutdown.cancel();
        self.tracker.wait().await;
        false
    }
}
