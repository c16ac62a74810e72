//! requester-core: Core types for rate-limited HTTP load generation
//!
//! This crate provides the pieces shared by the transport and the binary:
//!
//! - Task configuration (JSONC loading and validation)
//! - Request selection and preparation
//! - Response classification and transfer size estimation
//! - Core traits (HttpTransport, StatsSink)
//! - The request worker and its shared rate limiter
//! - Error handling

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod request;
pub mod response;
pub mod traits;
pub mod worker;

pub use config::{load_config, Config, ConfigError, RequestConfig, TaskConfig};
pub use error::{Error, Result};
pub use request::PreparedRequest;
pub use response::{estimate_transfer_size, HttpResponse, Outcome, ResponseStatus};
pub use traits::{HttpTransport, NoopSink, RequestReport, StatsSink, TransportError};
pub use worker::{RateLimiter, RequestWorker, RequestWorkerBuilder, WorkerState};
