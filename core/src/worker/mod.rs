//! Worker module for issuing rate-limited requests
//!
//! The RequestWorker is the execution unit of a task, responsible for the
//! simple loop: **throttle -> select -> send -> classify -> report -> repeat**.
//!
//! Each worker owns one tokio task. Workers of a task usually share a single
//! [`RateLimiter`] and a single transport via `Arc`; the limiter's timestamp
//! is the only state one worker mutates that others can observe.
//!
//! # Lifecycle
//!
//! ```text
//! start() ──> Waiting ──send──> Working ──response/failure──> Waiting ──> ...
//!                 │                                               │
//!                 └──────── stop flag observed / loop exit ───────┴──> Stopped
//! ```
//!
//! # Example
//!
//! ```ignore
//! use requester_core::worker::{RateLimiter, RequestWorkerBuilder};
//!
//! let limiter = Arc::new(RateLimiter::new(100.0));
//! let mut worker = RequestWorkerBuilder::new(0)
//!     .task(task)
//!     .transport(transport)
//!     .rate_limiter(Some(limiter))
//!     .sink(stats)
//!     .build()?;
//!
//! worker.start()?;
//! tokio::time::sleep(Duration::from_secs(10)).await;
//! worker.stop(Some(Duration::from_secs(10))).await?;
//! ```

mod builder;
mod executor;
mod rate_limiter;
mod state;

pub use builder::RequestWorkerBuilder;
pub use executor::RequestWorker;
pub use rate_limiter::RateLimiter;
pub use state::WorkerState;
