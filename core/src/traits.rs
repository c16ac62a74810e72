//! Seams between the worker and its collaborators
//!
//! The worker drives an [`HttpTransport`] it does not own and reports every
//! iteration to a [`StatsSink`]. Implementations live elsewhere: the reqwest
//! transport in `requester-transport`, the aggregator in the binary.

use crate::request::PreparedRequest;
use crate::response::{HttpResponse, Outcome, ResponseStatus};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;

// ============================================================================
// Transport
// ============================================================================

/// HTTP transport shared by workers
///
/// Implementations must be safe for concurrent use; one instance is usually
/// shared by every worker of a task.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Transport identifier for logs
    fn name(&self) -> &str;

    /// Send a request and read the full response
    async fn send(&self, request: &PreparedRequest) -> Result<HttpResponse, TransportError>;
}

/// Failure captured while dispatching a request
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// Timed out while establishing the connection
    #[error("connect timeout: {0}")]
    ConnectTimeout(String),

    /// Timed out after the connection was established
    #[error("timeout: {0}")]
    Timeout(String),

    /// Any other failure
    #[error("request failed: {0}")]
    Other(String),
}

// ============================================================================
// Statistics sink
// ============================================================================

/// Everything reported about one worker iteration
#[derive(Debug)]
pub struct RequestReport {
    /// Worker that ran the iteration
    pub worker_id: usize,

    /// Request that was sent
    pub request: PreparedRequest,

    /// Response or captured failure
    pub outcome: Outcome,

    /// When the iteration's request was dispatched
    pub reported_at: DateTime<Utc>,

    /// Classified status
    pub status: ResponseStatus,

    /// Time from dispatch to response or failure
    pub elapsed: Duration,

    /// Estimated bytes transferred, zero for failures
    pub bytes_transferred: usize,
}

/// Receiver of per-iteration statistics
///
/// Called inline from the worker loop once per iteration, so implementations
/// must return quickly; time spent here stalls the worker.
pub trait StatsSink: Send + Sync {
    /// Record one iteration
    fn report(&self, report: &RequestReport);
}

/// Sink that discards every report
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl StatsSink for NoopSink {
    fn report(&self, _report: &RequestReport) {}
}
