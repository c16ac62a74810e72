//! Builder pattern for RequestWorker construction

use crate::config::TaskConfig;
use crate::error::{Error, Result};
use crate::traits::{HttpTransport, NoopSink, StatsSink};

use super::executor::{LoopContext, RequestWorker};
use super::rate_limiter::RateLimiter;

use std::sync::Arc;

/// Builder for creating RequestWorker instances
///
/// Provides ergonomic construction with validation.
///
/// # Example
/// ```ignore
/// let limiter = Arc::new(RateLimiter::new(50.0));
/// let mut worker = RequestWorkerBuilder::new(0)
///     .task(task)
///     .transport(transport)
///     .rate_limiter(Some(limiter))
///     .sink(stats)
///     .build()?;
///
/// worker.start()?;
/// ```
pub struct RequestWorkerBuilder {
    id: usize,
    task: Option<Arc<TaskConfig>>,
    transport: Option<Arc<dyn HttpTransport>>,
    rate_limiter: Option<Arc<RateLimiter>>,
    sink: Option<Arc<dyn StatsSink>>,
}

impl RequestWorkerBuilder {
    /// Create a new builder with the given worker ID
    pub fn new(id: usize) -> Self {
        Self {
            id,
            task: None,
            transport: None,
            rate_limiter: None,
            sink: None,
        }
    }

    /// Set the task whose requests the worker issues
    pub fn task(mut self, task: Arc<TaskConfig>) -> Self {
        self.task = Some(task);
        self
    }

    /// Set the transport
    pub fn transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Set the shared rate limiter. `None` leaves the worker unthrottled.
    pub fn rate_limiter(mut self, limiter: Option<Arc<RateLimiter>>) -> Self {
        self.rate_limiter = limiter;
        self
    }

    /// Set the statistics sink. Defaults to [`NoopSink`].
    pub fn sink(mut self, sink: Arc<dyn StatsSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Build the RequestWorker
    ///
    /// # Errors
    /// Returns an error if the task or transport is missing, or if the task
    /// fails validation (for example, it has no requests).
    pub fn build(self) -> Result<RequestWorker> {
        let task = self.task.ok_or(Error::MissingField("task"))?;
        let transport = self.transport.ok_or(Error::MissingField("transport"))?;
        task.validate()?;

        Ok(RequestWorker::new(LoopContext {
            id: self.id,
            task,
            transport,
            rate_limiter: self.rate_limiter,
            sink: self.sink.unwrap_or_else(|| Arc::new(NoopSink)),
        }))
    }
}
