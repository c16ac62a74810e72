//! Worker lifecycle and execution loop

use crate::config::TaskConfig;
use crate::error::{Error, Result};
use crate::request::{select_request, PreparedRequest};
use crate::response::{estimate_transfer_size, Outcome, ResponseStatus};
use crate::traits::{HttpTransport, RequestReport, StatsSink, TransportError};

use super::rate_limiter::RateLimiter;
use super::state::{SharedState, WorkerState};

use chrono::Utc;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::{JoinError, JoinHandle};

/// Worker repeatedly issues requests: throttle -> select -> send -> report -> repeat
///
/// The loop runs as a tokio task spawned by [`start`](Self::start). Stopping
/// is cooperative: [`stop`](Self::stop) raises a flag the loop checks after
/// the rate-limiter wait and after each request, and only cancels the task
/// when the grace period runs out.
///
/// Call `stop()` before dropping a running worker. Dropping it while the loop
/// is active aborts the task and logs a warning.
pub struct RequestWorker {
    /// Unique worker identifier
    id: usize,

    /// Everything the loop task needs, shared with it
    context: Arc<LoopContext>,

    /// State and stop flag, shared with the loop task
    shared: Arc<SharedState>,

    /// Handle of the active loop task
    handle: Option<JoinHandle<()>>,
}

pub(crate) struct LoopContext {
    pub(crate) id: usize,
    pub(crate) task: Arc<TaskConfig>,
    pub(crate) transport: Arc<dyn HttpTransport>,
    pub(crate) rate_limiter: Option<Arc<RateLimiter>>,
    pub(crate) sink: Arc<dyn StatsSink>,
}

impl RequestWorker {
    pub(crate) fn new(context: LoopContext) -> Self {
        Self {
            id: context.id,
            context: Arc::new(context),
            shared: Arc::new(SharedState::new()),
            handle: None,
        }
    }

    /// Spawn the loop task
    ///
    /// Does nothing if the loop is already running. Must be called from
    /// within a tokio runtime.
    ///
    /// # Errors
    /// Returns [`Error::Poisoned`] if an earlier loop failed outside request
    /// dispatch; such a worker has to be rebuilt.
    pub fn start(&mut self) -> Result<()> {
        if self.shared.is_poisoned() {
            return Err(Error::Poisoned(self.id));
        }
        if self.is_running() {
            return Ok(());
        }

        self.shared.clear_stop();
        self.shared.set(WorkerState::Waiting);
        self.handle = Some(tokio::spawn(run_loop(
            Arc::clone(&self.context),
            Arc::clone(&self.shared),
        )));
        Ok(())
    }

    /// Stop the loop, waiting up to `timeout` for it to finish by itself
    ///
    /// When the grace period elapses the task is cancelled and the call waits
    /// for the cancellation to land. `None` waits indefinitely and never
    /// cancels. The state is `Stopped` when this returns, whatever the result.
    ///
    /// # Errors
    /// Returns [`Error::Worker`] if the loop panicked outside request dispatch,
    /// or [`Error::Poisoned`] if such a failure was observed earlier.
    pub async fn stop(&mut self, timeout: Option<Duration>) -> Result<()> {
        self.shared.request_stop();
        tracing::debug!(worker_id = self.id, ?timeout, "Stop requested");

        let result = match self.handle.take() {
            Some(mut handle) => {
                let joined = match timeout {
                    None => handle.await,
                    Some(grace) => match tokio::time::timeout(grace, &mut handle).await {
                        Ok(joined) => joined,
                        Err(_) => {
                            tracing::debug!(
                                worker_id = self.id,
                                "Grace period elapsed, cancelling worker"
                            );
                            handle.abort();
                            handle.await
                        }
                    },
                };
                self.finish(joined)
            }
            None => Ok(()),
        };

        self.shared.set(WorkerState::Stopped);

        match result {
            Ok(()) if self.shared.is_poisoned() => Err(Error::Poisoned(self.id)),
            other => other,
        }
    }

    /// Wait up to `timeout` for the loop to finish without asking it to stop
    ///
    /// Returns `true` if the loop is not running when this returns. Never
    /// cancels the loop; a loop failure is logged rather than returned.
    pub async fn join(&mut self, timeout: Option<Duration>) -> bool {
        let Some(handle) = self.handle.as_mut() else {
            return true;
        };

        let joined = match timeout {
            None => Some(handle.await),
            Some(limit) => tokio::time::timeout(limit, handle).await.ok(),
        };

        match joined {
            Some(joined) => {
                self.handle = None;
                if let Err(e) = self.finish(joined) {
                    tracing::error!(worker_id = self.id, error = %e, "Worker loop failed");
                }
                true
            }
            None => false,
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> WorkerState {
        self.shared.get()
    }

    /// Whether the loop task is active
    pub fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Get the worker ID
    pub fn id(&self) -> usize {
        self.id
    }

    /// Task this worker runs
    pub fn task(&self) -> &TaskConfig {
        &self.context.task
    }

    fn finish(&self, joined: std::result::Result<(), JoinError>) -> Result<()> {
        match joined {
            Ok(()) => Ok(()),
            Err(e) if e.is_cancelled() => {
                tracing::debug!(worker_id = self.id, "Worker cancelled");
                Ok(())
            }
            Err(e) => {
                self.shared.poison();
                let message = e
                    .try_into_panic()
                    .map(|payload| panic_message(payload.as_ref()))
                    .unwrap_or_else(|e| e.to_string());
                Err(Error::worker(self.id, message))
            }
        }
    }
}

impl Drop for RequestWorker {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            if !handle.is_finished() {
                tracing::warn!(
                    worker_id = self.id,
                    "Worker dropped while running; call stop() before releasing it"
                );
                handle.abort();
            }
        }
    }
}

impl std::fmt::Debug for RequestWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestWorker")
            .field("id", &self.id)
            .field("task", &self.context.task.name)
            .field("transport", &self.context.transport.name())
            .field("rate_limiter", &self.context.rate_limiter)
            .field("state", &self.state())
            .finish()
    }
}

/// Forces `Stopped` however the loop ends: normal exit, panic or cancellation
struct ExitGuard {
    id: usize,
    shared: Arc<SharedState>,
}

impl Drop for ExitGuard {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.shared.poison();
            tracing::warn!(worker_id = self.id, "Worker loop panicked");
        }
        self.shared.set(WorkerState::Stopped);
        tracing::debug!(worker_id = self.id, "Worker finished");
    }
}

async fn run_loop(context: Arc<LoopContext>, shared: Arc<SharedState>) {
    let _exit = ExitGuard {
        id: context.id,
        shared: Arc::clone(&shared),
    };
    tracing::debug!(worker_id = context.id, task = %context.task.name, "Worker started");

    while !shared.stop_requested() {
        match &context.rate_limiter {
            Some(limiter) => limiter.acquire().await,
            // A transport that fails without I/O never suspends
            None => tokio::task::yield_now().await,
        }

        // A stop may have arrived while waiting for the limiter
        if shared.stop_requested() {
            break;
        }

        let report = context.execute_one(&shared).await;
        context.sink.report(&report);
    }
}

impl LoopContext {
    fn next_request(&self) -> PreparedRequest {
        let mut rng = rand::thread_rng();
        PreparedRequest::from_config(&self.task, select_request(&self.task, &mut rng))
    }

    /// Execute a single request; dispatch failures become the outcome
    async fn execute_one(&self, shared: &SharedState) -> RequestReport {
        let request = self.next_request();

        let reported_at = Utc::now();
        let start = Instant::now();
        shared.transition(WorkerState::Waiting, WorkerState::Working);

        let result = AssertUnwindSafe(self.transport.send(&request))
            .catch_unwind()
            .await
            .unwrap_or_else(|payload| {
                Err(TransportError::Other(format!(
                    "transport panicked: {}",
                    panic_message(payload.as_ref())
                )))
            });

        shared.transition(WorkerState::Working, WorkerState::Waiting);
        let elapsed = start.elapsed();

        let outcome = Outcome::from(result);
        let status = ResponseStatus::classify(&outcome);
        let bytes_transferred = outcome
            .response()
            .map_or(0, |response| estimate_transfer_size(&request, response));

        if let Some(error) = outcome.failure() {
            tracing::trace!(worker_id = self.id, %status, error = %error, "Request failed");
        }

        RequestReport {
            worker_id: self.id,
            request,
            outcome,
            reported_at,
            status,
            elapsed,
            bytes_transferred,
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
