//! Client configuration

use requester_core::config::TaskConfig;
use std::net::IpAddr;
use std::time::Duration;

/// Configuration for a [`ReqwestTransport`](crate::ReqwestTransport)
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Idle connection timeout
    pub pool_idle_timeout: Duration,

    /// Maximum idle connections per host
    pub pool_max_idle_per_host: usize,

    /// Timeout for the whole exchange, body included
    pub request_timeout: Duration,

    /// Connection timeout
    pub connect_timeout: Duration,

    /// Timeout for each read once connected
    pub read_timeout: Duration,

    /// User agent string
    pub user_agent: String,

    /// Hosts resolved to a fixed address instead of DNS
    pub host_overrides: Vec<(String, IpAddr)>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            pool_idle_timeout: Duration::from_secs(90),
            pool_max_idle_per_host: 64,
            request_timeout: Duration::from_secs(25),
            connect_timeout: Duration::from_secs(5),
            read_timeout: Duration::from_secs(10),
            user_agent: format!("requester/{}", env!("CARGO_PKG_VERSION")),
            host_overrides: Vec::new(),
        }
    }
}

impl HttpConfig {
    /// Build the client settings for a task
    ///
    /// The request timeout covers connect, read and write. A shared client
    /// keeps one idle connection per coroutine; a per-worker client keeps one.
    pub fn from_task(task: &TaskConfig) -> Self {
        let timeouts = &task.policy.timeouts;
        let pool_max_idle_per_host = if task.policy.reuse_connections {
            task.policy.limits.coroutines.max(1)
        } else {
            1
        };
        Self {
            pool_max_idle_per_host,
            request_timeout: timeouts.connect_timeout()
                + timeouts.read_timeout()
                + timeouts.write_timeout(),
            connect_timeout: timeouts.connect_timeout(),
            read_timeout: timeouts.read_timeout(),
            host_overrides: task.prefabs.host_overrides(),
            ..Self::default()
        }
    }

    /// Create config with custom request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Create config with custom connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Create config with custom read timeout.
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Resolve `host` to `address` instead of using DNS
    pub fn with_host_override(mut self, host: impl Into<String>, address: IpAddr) -> Self {
        self.host_overrides.push((host.into(), address));
        self
    }
}
