//! HTTP transport for requester workers
//!
//! This crate provides the `reqwest`-backed implementation of
//! [`requester_core::HttpTransport`]:
//!
//! - [`HttpConfig`]: client settings derived from a task's policy
//! - [`ReqwestTransport`]: connection-pooled client that maps failures onto
//!   [`requester_core::TransportError`]

#![warn(missing_docs)]
#![warn(clippy::all)]

mod client;
mod config;

pub use client::ReqwestTransport;
pub use config::HttpConfig;
