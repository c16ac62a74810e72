//! Task configuration types and the JSONC configuration loader
//!
//! A configuration file holds one or more tasks. Each task lists the requests
//! a worker may issue, the policy that drives the run (order, schedule,
//! limits, timeouts) and prefab settings shared by every request.

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::net::IpAddr;
use std::path::Path;
use std::time::Duration;

/// Configuration versions this release can load
pub const COMPATIBLE_VERSIONS: &[&str] = &["0.1", "0.2"];

/// Configuration validation errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configuration file could not be read
    #[error("configuration file '{path}' could not be read: {source}")]
    Read {
        /// Path that was attempted
        path: String,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// The configuration text is not valid for the schema
    #[error("configuration file format error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Version field missing or not supported
    #[error("unsupported config version '{0}', expected one of {versions:?}", versions = COMPATIBLE_VERSIONS)]
    Version(String),

    /// No tasks in the configuration
    #[error("tasks field is required and cannot be empty")]
    EmptyTasks,

    /// A task has no requests
    #[error("requests field is required and cannot be empty")]
    EmptyRequests,

    /// Request URL that does not parse or has an unsupported scheme
    #[error("invalid URL '{url}': {reason}")]
    InvalidUrl {
        /// Rejected URL
        url: String,
        /// What is wrong with it
        reason: String,
    },

    /// Method that is not a valid HTTP token
    #[error("invalid HTTP method '{0}'")]
    InvalidMethod(String),

    /// Header name or value that cannot be sent
    #[error("invalid header '{name}': {reason}")]
    InvalidHeader {
        /// Header name as configured
        name: String,
        /// What is wrong with it
        reason: String,
    },

    /// Host override that is not an IP address
    #[error("invalid override address for host '{host}': '{address}'")]
    InvalidOverride {
        /// Host being overridden
        host: String,
        /// Rejected address
        address: String,
    },

    /// Worker count of zero
    #[error("coroutines must be at least 1")]
    InvalidConcurrency,

    /// Timeout that is negative, zero or not finite
    #[error("invalid {field} timeout: {value}")]
    InvalidTimeout {
        /// Timeout field name
        field: &'static str,
        /// Rejected value in seconds
        value: f64,
    },

    /// Schedule value that cannot be interpreted
    #[error("unable to parse datetime '{0}'")]
    InvalidDatetime(String),
}

// ============================================================================
// Top-level configuration
// ============================================================================

/// Main configuration file contents
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Configuration format version
    pub version: String,

    /// Tasks, run one after another
    pub tasks: Vec<TaskConfig>,
}

impl Config {
    /// Parse configuration text with `//` line comments and validate it
    pub fn from_jsonc(text: &str) -> Result<Self, ConfigError> {
        let clean = strip_line_comments(text);
        let config: Config = serde_json::from_str(&clean)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !COMPATIBLE_VERSIONS.contains(&self.version.as_str()) {
            return Err(ConfigError::Version(self.version.clone()));
        }
        if self.tasks.is_empty() {
            return Err(ConfigError::EmptyTasks);
        }
        self.tasks.iter().try_for_each(TaskConfig::validate)
    }

    /// Find a task by name
    pub fn task(&self, name: &str) -> Option<&TaskConfig> {
        self.tasks.iter().find(|task| task.name == name)
    }
}

/// Load and validate a configuration file
///
/// # Errors
/// Returns an error if the file cannot be read, is not valid JSON after
/// comment removal, or fails validation.
pub fn load_config(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;
    Config::from_jsonc(&text)
}

/// Remove `//` comments that appear outside string literals
///
/// Line breaks are preserved so parse errors still point at the right line.
fn strip_line_comments(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    let mut in_string = false;
    let mut escaped = false;

    while let Some(c) = chars.next() {
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }

        match c {
            '"' => {
                in_string = true;
                out.push(c);
            }
            '/' if chars.peek() == Some(&'/') => {
                for skipped in chars.by_ref() {
                    if skipped == '\n' {
                        out.push('\n');
                        break;
                    }
                }
            }
            _ => out.push(c),
        }
    }

    out
}

// ============================================================================
// Task configuration
// ============================================================================

/// One stress-test task
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskConfig {
    /// Task name
    pub name: String,

    /// Requests to choose from on each iteration
    pub requests: Vec<RequestConfig>,

    /// Run policy
    #[serde(default)]
    pub policy: PolicyConfig,

    /// Settings applied to every request
    #[serde(default)]
    pub prefabs: PrefabsConfig,
}

impl TaskConfig {
    /// Create a task with default policy and prefabs
    pub fn new(name: impl Into<String>, requests: Vec<RequestConfig>) -> Self {
        Self {
            name: name.into(),
            requests,
            policy: PolicyConfig::default(),
            prefabs: PrefabsConfig::default(),
        }
    }

    /// Add a default header merged beneath every request's own headers
    pub fn with_default_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.prefabs.default_headers.insert(name.into(), value.into());
        self
    }

    /// Set the rate limit (requests per second)
    pub fn with_rps(mut self, rps: f64) -> Self {
        self.policy.limits.rps = Some(rps);
        self
    }

    /// Set the number of concurrent workers
    pub fn with_coroutines(mut self, coroutines: usize) -> Self {
        self.policy.limits.coroutines = coroutines;
        self
    }

    /// Validate the task
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.requests.is_empty() {
            return Err(ConfigError::EmptyRequests);
        }
        self.requests.iter().try_for_each(RequestConfig::validate)?;
        self.policy.validate()?;
        self.prefabs.validate()
    }
}

// ============================================================================
// Policy
// ============================================================================

/// How a task is run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Share one connection pool across workers instead of one per worker
    #[serde(default = "default_reuse_connections")]
    pub reuse_connections: bool,

    /// Request selection order
    #[serde(default)]
    pub order: RequestOrder,

    /// Start and end of the run
    #[serde(default)]
    pub schedule: ScheduleConfig,

    /// Rate and concurrency limits
    #[serde(default)]
    pub limits: LimitsConfig,

    /// Transport timeouts
    #[serde(default)]
    pub timeouts: TimeoutsConfig,
}

fn default_reuse_connections() -> bool {
    true
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            reuse_connections: default_reuse_connections(),
            order: RequestOrder::default(),
            schedule: ScheduleConfig::default(),
            limits: LimitsConfig::default(),
            timeouts: TimeoutsConfig::default(),
        }
    }
}

impl PolicyConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.limits.coroutines == 0 {
            return Err(ConfigError::InvalidConcurrency);
        }
        self.timeouts.validate()?;
        let start = self.schedule.start_time(Utc::now())?;
        self.schedule.end_time(start)?;
        Ok(())
    }
}

/// Strategy used to pick the request of each iteration
///
/// Unknown values are rejected when the configuration is parsed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestOrder {
    /// Uniform random choice over the configured requests
    #[default]
    Random,
}

impl std::fmt::Display for RequestOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestOrder::Random => write!(f, "random"),
        }
    }
}

/// Run window
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Start time, or seconds from now. Absent means immediately.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<TimeSpec>,

    /// End time, or seconds after start. Absent means run until interrupted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<TimeSpec>,
}

/// A point in time given either as an offset in seconds or as an ISO-8601 timestamp
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TimeSpec {
    /// Seconds relative to a reference instant
    Seconds(f64),
    /// ISO-8601 timestamp; local time when no offset is given
    Timestamp(String),
}

impl TimeSpec {
    fn resolve(&self, reference: DateTime<Utc>) -> Result<DateTime<Utc>, ConfigError> {
        match self {
            TimeSpec::Seconds(secs) => {
                let offset = chrono::Duration::try_milliseconds((secs * 1000.0) as i64)
                    .filter(|_| secs.is_finite())
                    .ok_or_else(|| ConfigError::InvalidDatetime(secs.to_string()))?;
                reference
                    .checked_add_signed(offset)
                    .ok_or_else(|| ConfigError::InvalidDatetime(secs.to_string()))
            }
            TimeSpec::Timestamp(text) => parse_timestamp(text),
        }
    }
}

impl ScheduleConfig {
    /// Resolve the start time, `now` being the reference for offsets
    pub fn start_time(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>, ConfigError> {
        match &self.start {
            Some(spec) => spec.resolve(now),
            None => Ok(now),
        }
    }

    /// Resolve the end time, `start` being the reference for offsets
    pub fn end_time(&self, start: DateTime<Utc>) -> Result<Option<DateTime<Utc>>, ConfigError> {
        self.end.as_ref().map(|spec| spec.resolve(start)).transpose()
    }
}

fn parse_timestamp(text: &str) -> Result<DateTime<Utc>, ConfigError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f%:z") {
        return Ok(dt.with_timezone(&Utc));
    }

    let naive = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
        .ok_or_else(|| ConfigError::InvalidDatetime(text.to_string()))?;

    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| ConfigError::InvalidDatetime(text.to_string()))
}

/// Rate and concurrency limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Maximum requests per second across all workers of the task
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rps: Option<f64>,

    /// Number of concurrent workers
    #[serde(default = "default_coroutines")]
    pub coroutines: usize,
}

fn default_coroutines() -> usize {
    64
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            rps: None,
            coroutines: default_coroutines(),
        }
    }
}

impl LimitsConfig {
    /// Rate limit to enforce, if any. Zero or negative values disable throttling.
    pub fn effective_rps(&self) -> Option<f64> {
        self.rps.filter(|rps| *rps > 0.0)
    }
}

/// Transport timeouts in seconds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutsConfig {
    /// Connection establishment timeout
    #[serde(default = "default_connect_timeout")]
    pub connect: f64,

    /// Read timeout
    #[serde(default = "default_io_timeout")]
    pub read: f64,

    /// Write timeout
    #[serde(default = "default_io_timeout")]
    pub write: f64,
}

fn default_connect_timeout() -> f64 {
    5.0
}

fn default_io_timeout() -> f64 {
    10.0
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            connect: default_connect_timeout(),
            read: default_io_timeout(),
            write: default_io_timeout(),
        }
    }
}

impl TimeoutsConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("connect", self.connect),
            ("read", self.read),
            ("write", self.write),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::InvalidTimeout { field, value });
            }
        }
        Ok(())
    }

    /// Connection establishment timeout
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.connect.max(0.0))
    }

    /// Read timeout
    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.read.max(0.0))
    }

    /// Write timeout
    pub fn write_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.write.max(0.0))
    }
}

// ============================================================================
// Prefabs
// ============================================================================

/// Settings shared by every request of a task
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PrefabsConfig {
    /// DNS overrides: host name to IP address
    #[serde(default)]
    pub override_hosts: BTreeMap<String, String>,

    /// Headers sent with every request unless the request overrides them
    #[serde(default)]
    pub default_headers: BTreeMap<String, String>,
}

impl PrefabsConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        for (host, address) in &self.override_hosts {
            if address.parse::<IpAddr>().is_err() {
                return Err(ConfigError::InvalidOverride {
                    host: host.clone(),
                    address: address.clone(),
                });
            }
        }
        validate_headers(&self.default_headers)
    }

    /// Parsed DNS overrides
    pub fn host_overrides(&self) -> Vec<(String, IpAddr)> {
        self.override_hosts
            .iter()
            .filter_map(|(host, address)| address.parse().ok().map(|ip| (host.clone(), ip)))
            .collect()
    }
}

// ============================================================================
// Requests
// ============================================================================

/// One configured request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestConfig {
    /// Target URL
    pub url: String,

    /// HTTP method, upper case
    #[serde(default = "default_method", deserialize_with = "deserialize_method")]
    pub method: String,

    /// Optional request body
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<RequestBody>,

    /// Per-request header overrides
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

fn default_method() -> String {
    "GET".to_string()
}

fn deserialize_method<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    String::deserialize(deserializer).map(|method| method.to_uppercase())
}

impl RequestConfig {
    /// Create a request with the given method and URL
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: method.into().to_uppercase(),
            data: None,
            headers: BTreeMap::new(),
        }
    }

    /// Create a GET request
    pub fn get(url: impl Into<String>) -> Self {
        Self::new("GET", url)
    }

    /// Set the request body
    pub fn with_body(mut self, body: RequestBody) -> Self {
        self.data = Some(body);
        self
    }

    /// Add a header override
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Validate the request
    ///
    /// Rejects anything the transport would refuse before sending, so a
    /// worker never spins on requests that fail without I/O.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = url::Url::parse(&self.url).map_err(|e| ConfigError::InvalidUrl {
            url: self.url.clone(),
            reason: e.to_string(),
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidUrl {
                url: self.url.clone(),
                reason: "scheme must be http or https".to_string(),
            });
        }
        if http::Method::from_bytes(self.method.as_bytes()).is_err() {
            return Err(ConfigError::InvalidMethod(self.method.clone()));
        }
        validate_headers(&self.headers)
    }
}

fn validate_headers(headers: &BTreeMap<String, String>) -> Result<(), ConfigError> {
    for (name, value) in headers {
        let invalid = |reason: String| ConfigError::InvalidHeader {
            name: name.clone(),
            reason,
        };
        http::HeaderName::from_bytes(name.as_bytes()).map_err(|e| invalid(e.to_string()))?;
        http::HeaderValue::from_str(value).map_err(|e| invalid(e.to_string()))?;
    }
    Ok(())
}

/// Request body as written in the configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestBody {
    /// JSON object, sent as its serialized text
    Structured(serde_json::Map<String, serde_json::Value>),
    /// Text, sent unchanged
    Text(String),
    /// Any other JSON value, sent as its textual representation
    Other(serde_json::Value),
}

impl RequestBody {
    /// Whether the body carries nothing to send
    pub fn is_empty(&self) -> bool {
        match self {
            RequestBody::Structured(map) => map.is_empty(),
            RequestBody::Text(text) => text.is_empty(),
            RequestBody::Other(value) => value.is_null(),
        }
    }

    /// Text sent on the wire
    pub fn to_text(&self) -> String {
        match self {
            RequestBody::Structured(map) => serde_json::Value::Object(map.clone()).to_string(),
            RequestBody::Text(text) => text.clone(),
            RequestBody::Other(value) => value.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const SAMPLE: &str = r#"{
        // format version
        "version": "0.2",
        "tasks": [
            {
                "name": "homepage",
                "requests": [
                    { "url": "https://example.com/", "method": "get" }, // trailing comment
                    {
                        "url": "http://example.com/api",
                        "method": "post",
                        "data": { "a": 1 },
                        "headers": { "X-Path": "a//b" }
                    }
                ],
                "policy": {
                    "limits": { "rps": 20, "coroutines": 4 },
                    "schedule": { "end": 30 }
                },
                "prefabs": {
                    "default_headers": { "User-Agent": "requester" },
                    "override_hosts": { "example.com": "127.0.0.1" }
                }
            }
        ]
    }"#;

    #[test]
    fn test_parse_sample_config() {
        let config = Config::from_jsonc(SAMPLE).unwrap();
        assert_eq!(config.version, "0.2");

        let task = &config.tasks[0];
        assert_eq!(task.name, "homepage");
        assert_eq!(task.requests.len(), 2);
        assert_eq!(task.requests[0].method, "GET");
        assert_eq!(task.requests[1].method, "POST");
        assert_eq!(task.requests[1].headers["X-Path"], "a//b");
        assert_eq!(task.policy.limits.effective_rps(), Some(20.0));
        assert_eq!(task.policy.limits.coroutines, 4);
        assert_eq!(task.policy.order, RequestOrder::Random);
        assert!(task.policy.reuse_connections);
        assert_eq!(task.prefabs.host_overrides().len(), 1);
        assert!(config.task("homepage").is_some());
        assert!(config.task("missing").is_none());
    }

    #[test]
    fn test_comment_stripping_keeps_urls() {
        let stripped = strip_line_comments("{\"u\": \"http://x\"} // note\n");
        assert_eq!(stripped, "{\"u\": \"http://x\"} \n");

        let escaped = strip_line_comments(r#"{"u": "a\"//b"}"#);
        assert_eq!(escaped, r#"{"u": "a\"//b"}"#);
    }

    #[test]
    fn test_defaults_applied() {
        let config = Config::from_jsonc(
            r#"{"version": "0.1", "tasks": [{"name": "t", "requests": [{"url": "http://h/"}]}]}"#,
        )
        .unwrap();
        let task = &config.tasks[0];
        assert_eq!(task.requests[0].method, "GET");
        assert!(task.requests[0].data.is_none());
        assert_eq!(task.policy.limits.coroutines, 64);
        assert!(task.policy.limits.effective_rps().is_none());
        assert_eq!(task.policy.timeouts.connect_timeout(), Duration::from_secs(5));
        assert_eq!(task.policy.timeouts.read_timeout(), Duration::from_secs(10));
        assert!(task.prefabs.default_headers.is_empty());
    }

    #[test]
    fn test_unsupported_order_rejected() {
        let result = Config::from_jsonc(
            r#"{"version": "0.2", "tasks": [{"name": "t", "requests": [{"url": "http://h/"}],
                "policy": {"order": "sequential"}}]}"#,
        );
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_incompatible_version_rejected() {
        let result = Config::from_jsonc(
            r#"{"version": "9.9", "tasks": [{"name": "t", "requests": [{"url": "http://h/"}]}]}"#,
        );
        assert!(matches!(result, Err(ConfigError::Version(v)) if v == "9.9"));
    }

    #[test]
    fn test_empty_requests_rejected() {
        let task = TaskConfig::new("t", vec![]);
        assert!(matches!(task.validate(), Err(ConfigError::EmptyRequests)));
    }

    #[test]
    fn test_empty_tasks_rejected() {
        let result = Config::from_jsonc(r#"{"version": "0.2", "tasks": []}"#);
        assert!(matches!(result, Err(ConfigError::EmptyTasks)));
    }

    #[test]
    fn test_invalid_url_rejected() {
        for url in ["ftp://example.com", "http://bad host/", "http://", "example.com/path"] {
            let task = TaskConfig::new("t", vec![RequestConfig::get(url)]);
            assert!(
                matches!(task.validate(), Err(ConfigError::InvalidUrl { .. })),
                "{url}"
            );
        }
    }

    #[test]
    fn test_invalid_method_rejected() {
        let task = TaskConfig::new("t", vec![RequestConfig::new("NOT A METHOD", "http://h/")]);
        assert!(matches!(task.validate(), Err(ConfigError::InvalidMethod(m)) if m == "NOT A METHOD"));

        let task = TaskConfig::new("t", vec![RequestConfig::new("PURGE", "http://h/")]);
        assert!(task.validate().is_ok());
    }

    #[test]
    fn test_invalid_headers_rejected() {
        let task = TaskConfig::new(
            "t",
            vec![RequestConfig::get("http://h/").with_header("Bad Name", "v")],
        );
        assert!(matches!(
            task.validate(),
            Err(ConfigError::InvalidHeader { name, .. }) if name == "Bad Name"
        ));

        let task = TaskConfig::new(
            "t",
            vec![RequestConfig::get("http://h/").with_header("X-Ok", "line\nbreak")],
        );
        assert!(matches!(task.validate(), Err(ConfigError::InvalidHeader { .. })));

        let task = TaskConfig::new("t", vec![RequestConfig::get("http://h/")])
            .with_default_header("Bad:Name", "v");
        assert!(matches!(task.validate(), Err(ConfigError::InvalidHeader { .. })));
    }

    #[test]
    fn test_invalid_override_rejected() {
        let mut task = TaskConfig::new("t", vec![RequestConfig::get("http://h/")]);
        task.prefabs
            .override_hosts
            .insert("h".to_string(), "not-an-ip".to_string());
        assert!(matches!(
            task.validate(),
            Err(ConfigError::InvalidOverride { .. })
        ));
    }

    #[test]
    fn test_zero_coroutines_rejected() {
        let task = TaskConfig::new("t", vec![RequestConfig::get("http://h/")]).with_coroutines(0);
        assert!(matches!(task.validate(), Err(ConfigError::InvalidConcurrency)));
    }

    #[test]
    fn test_negative_timeout_rejected() {
        let mut task = TaskConfig::new("t", vec![RequestConfig::get("http://h/")]);
        task.policy.timeouts.read = -1.0;
        assert!(matches!(
            task.validate(),
            Err(ConfigError::InvalidTimeout { field: "read", .. })
        ));
    }

    #[test]
    fn test_non_positive_rps_disables_limit() {
        let limits = LimitsConfig {
            rps: Some(0.0),
            coroutines: 1,
        };
        assert!(limits.effective_rps().is_none());
    }

    #[test]
    fn test_schedule_offsets() {
        let now = Utc::now();
        let schedule = ScheduleConfig {
            start: Some(TimeSpec::Seconds(10.0)),
            end: Some(TimeSpec::Seconds(30.0)),
        };
        let start = schedule.start_time(now).unwrap();
        let end = schedule.end_time(start).unwrap().unwrap();
        assert_eq!((start - now).num_seconds(), 10);
        assert_eq!((end - start).num_seconds(), 30);
    }

    #[test]
    fn test_schedule_timestamps() {
        let schedule = ScheduleConfig {
            start: Some(TimeSpec::Timestamp("2030-01-01T00:00:00Z".to_string())),
            end: Some(TimeSpec::Timestamp("2030-01-01T01:00:00+00:00".to_string())),
        };
        let start = schedule.start_time(Utc::now()).unwrap();
        let end = schedule.end_time(start).unwrap().unwrap();
        assert_eq!((end - start).num_minutes(), 60);

        assert!(parse_timestamp("2030-01-01T08:30:00").is_ok());
        assert!(parse_timestamp("2030-01-01").is_ok());
        assert!(matches!(
            parse_timestamp("next tuesday"),
            Err(ConfigError::InvalidDatetime(_))
        ));
    }

    #[test]
    fn test_schedule_offset_overflow_is_an_error() {
        let result = Config::from_jsonc(
            r#"{"version": "0.2", "tasks": [{"name": "t", "requests": [{"url": "http://h/"}],
                "policy": {"schedule": {"end": 1e15}}}]}"#,
        );
        assert!(matches!(result, Err(ConfigError::InvalidDatetime(_))));

        let schedule = ScheduleConfig {
            start: Some(TimeSpec::Seconds(1e17)),
            end: None,
        };
        assert!(schedule.start_time(Utc::now()).is_err());
    }

    #[test]
    fn test_version_error_lists_compatible_versions() {
        let message = ConfigError::Version("9.9".to_string()).to_string();
        assert_eq!(
            message,
            r#"unsupported config version '9.9', expected one of ["0.1", "0.2"]"#
        );
    }

    #[test]
    fn test_schedule_absent() {
        let now = Utc::now();
        let schedule = ScheduleConfig::default();
        assert_eq!(schedule.start_time(now).unwrap(), now);
        assert!(schedule.end_time(now).unwrap().is_none());
    }

    #[test]
    fn test_request_body_variants() {
        let body: RequestBody = serde_json::from_str(r#"{"a": 1}"#).unwrap();
        assert!(matches!(body, RequestBody::Structured(_)));
        assert_eq!(body.to_text(), r#"{"a":1}"#);

        let body: RequestBody = serde_json::from_str(r#""x""#).unwrap();
        assert_eq!(body, RequestBody::Text("x".to_string()));
        assert_eq!(body.to_text(), "x");

        let body: RequestBody = serde_json::from_str("42").unwrap();
        assert!(matches!(body, RequestBody::Other(_)));
        assert_eq!(body.to_text(), "42");

        let body: RequestBody = serde_json::from_str(r#"{"b": 1, "a": {"z": true, "y": null}}"#).unwrap();
        assert_eq!(body.to_text(), r#"{"b":1,"a":{"z":true,"y":null}}"#);

        assert!(RequestBody::Text(String::new()).is_empty());
        assert!(RequestBody::Structured(serde_json::Map::new()).is_empty());
    }

    #[test]
    fn test_load_config_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", SAMPLE).unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.tasks.len(), 1);
    }

    #[test]
    fn test_load_config_missing_file() {
        let result = load_config("/definitely/not/here.jsonc");
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }

    #[test]
    fn test_load_config_malformed() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        assert!(matches!(load_config(file.path()), Err(ConfigError::Parse(_))));
    }
}
