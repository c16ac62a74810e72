//! Task execution: schedule, workers, live display and shutdown

use anyhow::{Context, Result};
use chrono::Utc;
use futures::future::join_all;
use requester_core::{Config, HttpTransport, RateLimiter, RequestWorker, RequestWorkerBuilder, TaskConfig};
use requester_transport::{HttpConfig, ReqwestTransport};
use std::future::Future;
use std::io::Write as _;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::stats::OverallStats;

/// How often the live statistics view is refreshed
const LIVE_INTERVAL: Duration = Duration::from_millis(500);

/// Clears the terminal and homes the cursor
const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";

/// Grace period for workers to finish their in-flight request
const STOP_GRACE: Duration = Duration::from_secs(10);

/// Requests listed in the task summary
const SUMMARY_REQUESTS: usize = 3;

/// Creates the transport(s) a task's workers send through
pub type TransportFactory = dyn Fn(&TaskConfig) -> Result<Arc<dyn HttpTransport>> + Send + Sync;

fn reqwest_transport(task: &TaskConfig) -> Result<Arc<dyn HttpTransport>> {
    let transport = ReqwestTransport::new(&HttpConfig::from_task(task))
        .context("failed to build HTTP client")?;
    Ok(Arc::new(transport))
}

/// Why a task's run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The schedule's end time was reached
    EndTime,
    /// Ctrl+C was received
    Interrupted,
}

/// Runs one task from start time to end time
pub struct TaskRunner {
    task: Arc<TaskConfig>,
    transport_factory: Arc<TransportFactory>,
    live: bool,
}

impl TaskRunner {
    /// Create a runner sending through reqwest
    pub fn new(task: TaskConfig) -> Self {
        Self {
            task: Arc::new(task),
            transport_factory: Arc::new(reqwest_transport),
            live: true,
        }
    }

    /// Use a different transport factory
    pub fn with_transport_factory(mut self, factory: Arc<TransportFactory>) -> Self {
        self.transport_factory = factory;
        self
    }

    /// Enable or disable the live statistics view
    pub fn with_live_display(mut self, live: bool) -> Self {
        self.live = live;
        self
    }

    /// Run the task and return its statistics
    pub async fn run(&self) -> Result<(Arc<OverallStats>, StopReason)> {
        let task = &self.task;
        let start_at = task.policy.schedule.start_time(Utc::now())?;
        let end_at = task.policy.schedule.end_time(start_at)?;

        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);
        let mut listening = true;

        if let Ok(wait) = (start_at - Utc::now()).to_std() {
            tracing::info!(task = %task.name, start = %start_at, "Waiting for start time");
            let start = tokio::time::sleep(wait);
            tokio::pin!(start);
            tokio::select! {
                _ = &mut start => {}
                result = &mut ctrl_c => match result {
                    Ok(()) => {
                        tracing::info!("Received Ctrl+C before start, skipping task");
                        return Ok((Arc::new(OverallStats::new()), StopReason::Interrupted));
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Failed to listen for Ctrl+C");
                        listening = false;
                        start.await;
                    }
                },
            }
        }

        self.log_summary(end_at.map(|end| end.to_rfc3339()));

        let limiter = task
            .policy
            .limits
            .effective_rps()
            .map(|rps| Arc::new(RateLimiter::new(rps)));
        let stats = Arc::new(OverallStats::new());
        let mut workers = self.build_workers(limiter, Arc::clone(&stats))?;

        for worker in &mut workers {
            worker.start()?;
        }

        // An end time already in the past still lets the workers start
        let deadline = end_at.map(|end| {
            Instant::now() + (end - Utc::now()).to_std().unwrap_or(Duration::ZERO)
        });
        let reason = self
            .wait_until_done(&stats, deadline, &mut ctrl_c, listening)
            .await;

        tracing::info!(task = %task.name, ?reason, workers = workers.len(), "Stopping workers");
        let results = join_all(workers.iter_mut().map(|w| w.stop(Some(STOP_GRACE)))).await;
        let failed = results
            .into_iter()
            .filter_map(|result| result.err())
            .inspect(|e| tracing::error!(error = %e, "Worker failed"))
            .count();
        if failed > 0 {
            tracing::warn!(task = %task.name, failed, "Some workers ended abnormally");
        }

        println!("{}", stats.snapshot().render_final(&task.name));
        Ok((stats, reason))
    }

    fn build_workers(
        &self,
        limiter: Option<Arc<RateLimiter>>,
        stats: Arc<OverallStats>,
    ) -> Result<Vec<RequestWorker>> {
        let task = &self.task;
        let shared = if task.policy.reuse_connections {
            Some((self.transport_factory)(task)?)
        } else {
            None
        };

        (0..task.policy.limits.coroutines)
            .map(|id| -> Result<RequestWorker> {
                let transport = match &shared {
                    Some(transport) => Arc::clone(transport),
                    None => (self.transport_factory)(task)?,
                };
                let worker = RequestWorkerBuilder::new(id)
                    .task(Arc::clone(task))
                    .transport(transport)
                    .rate_limiter(limiter.clone())
                    .sink(stats.clone())
                    .build()?;
                Ok(worker)
            })
            .collect()
    }

    async fn wait_until_done<F>(
        &self,
        stats: &OverallStats,
        deadline: Option<Instant>,
        ctrl_c: &mut Pin<&mut F>,
        mut listening: bool,
    ) -> StopReason
    where
        F: Future<Output = std::io::Result<()>>,
    {
        let mut ticker = tokio::time::interval(LIVE_INTERVAL);
        let end = async {
            match deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending().await,
            }
        };
        tokio::pin!(end);

        loop {
            tokio::select! {
                _ = &mut end => return StopReason::EndTime,
                result = ctrl_c.as_mut(), if listening => match result {
                    Ok(()) => {
                        tracing::info!("Received Ctrl+C, stopping task");
                        return StopReason::Interrupted;
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Failed to listen for Ctrl+C");
                        listening = false;
                    }
                },
                _ = ticker.tick() => {
                    let view = self
                        .live
                        .then(|| stats.snapshot().render_live(Utc::now()))
                        .flatten();
                    if let Some(view) = view {
                        println!("{CLEAR_SCREEN}{view}");
                        let _ = std::io::stdout().flush();
                    }
                }
            }
        }
    }

    fn log_summary(&self, end: Option<String>) {
        let task = &self.task;
        tracing::info!(
            task = %task.name,
            requests = task.requests.len(),
            coroutines = task.policy.limits.coroutines,
            rps = ?task.policy.limits.effective_rps(),
            order = %task.policy.order,
            reuse_connections = task.policy.reuse_connections,
            end = end.as_deref().unwrap_or("until interrupted"),
            "Starting task"
        );
        for request in task.requests.iter().take(SUMMARY_REQUESTS) {
            tracing::info!(method = %request.method, url = %request.url, "  request");
        }
        if task.requests.len() > SUMMARY_REQUESTS {
            tracing::info!(
                more = task.requests.len() - SUMMARY_REQUESTS,
                "  ... further requests not shown"
            );
        }
    }
}

/// Run the tasks of a configuration in order
///
/// With `only`, runs just the named task. A failing task is logged and the
/// next one runs; a Ctrl+C ends the whole run.
pub async fn run_config(config: &Config, only: Option<&str>) -> Result<()> {
    let tasks: Vec<&TaskConfig> = match only {
        Some(name) => vec![config
            .task(name)
            .with_context(|| format!("no task named {name:?} in configuration"))?],
        None => config.tasks.iter().collect(),
    };

    for task in tasks {
        match TaskRunner::new(task.clone()).run().await {
            Ok((_, StopReason::Interrupted)) => break,
            Ok((_, StopReason::EndTime)) => {}
            Err(e) => tracing::error!(task = %task.name, error = %e, "Task failed"),
        }
    }
    Ok(())
}
