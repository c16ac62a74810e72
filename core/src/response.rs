//! Request outcomes, status classification and transfer-size estimation

use crate::request::PreparedRequest;
use crate::traits::TransportError;

/// A completed HTTP exchange as seen by the worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// HTTP status code
    pub status: u16,

    /// Response headers in arrival order; repeated names appear repeatedly
    pub headers: Vec<(String, String)>,

    /// Full response body
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Create a response with no headers and an empty body
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    /// Add a header
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Set the body
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }
}

/// Result of one request attempt: exactly one of a response or a captured failure
#[derive(Debug)]
pub enum Outcome {
    /// The exchange completed, whatever the status code
    Response(HttpResponse),
    /// The exchange failed before a response was received
    Failure(TransportError),
}

impl Outcome {
    /// The response, if the exchange completed
    pub fn response(&self) -> Option<&HttpResponse> {
        match self {
            Outcome::Response(response) => Some(response),
            Outcome::Failure(_) => None,
        }
    }

    /// The failure, if the exchange did not complete
    pub fn failure(&self) -> Option<&TransportError> {
        match self {
            Outcome::Response(_) => None,
            Outcome::Failure(error) => Some(error),
        }
    }
}

impl From<Result<HttpResponse, TransportError>> for Outcome {
    fn from(result: Result<HttpResponse, TransportError>) -> Self {
        match result {
            Ok(response) => Outcome::Response(response),
            Err(error) => Outcome::Failure(error),
        }
    }
}

/// Status category of a request attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResponseStatus {
    /// 2xx response
    Success,
    /// 4xx response
    Http4xx,
    /// 5xx response
    Http5xx,
    /// Any other completed status code
    HttpError,
    /// Timeout after the connection was established
    Timeout,
    /// Timeout while establishing the connection
    TimeoutConnect,
    /// Any other failure
    Exception,
}

impl ResponseStatus {
    /// Classify an outcome
    ///
    /// Connection timeouts are checked before generic timeouts.
    pub fn classify(outcome: &Outcome) -> Self {
        match outcome {
            Outcome::Response(response) => Self::from_status_code(response.status),
            Outcome::Failure(TransportError::ConnectTimeout(_)) => ResponseStatus::TimeoutConnect,
            Outcome::Failure(TransportError::Timeout(_)) => ResponseStatus::Timeout,
            Outcome::Failure(TransportError::Other(_)) => ResponseStatus::Exception,
        }
    }

    /// Classify a completed response by status code
    pub fn from_status_code(code: u16) -> Self {
        match code {
            200..=299 => ResponseStatus::Success,
            400..=499 => ResponseStatus::Http4xx,
            500..=599 => ResponseStatus::Http5xx,
            _ => ResponseStatus::HttpError,
        }
    }

    /// Check if this status indicates success
    pub fn is_success(&self) -> bool {
        matches!(self, ResponseStatus::Success)
    }

    /// Human-readable label
    pub fn label(&self) -> &'static str {
        match self {
            ResponseStatus::Success => "Success",
            ResponseStatus::Http4xx => "HTTP 4xx",
            ResponseStatus::Http5xx => "HTTP 5xx",
            ResponseStatus::HttpError => "HTTP Error",
            ResponseStatus::Timeout => "Timeout",
            ResponseStatus::TimeoutConnect => "Timeout Connect",
            ResponseStatus::Exception => "Exception",
        }
    }
}

impl std::fmt::Display for ResponseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Approximate bytes transferred by a completed exchange
///
/// Header lines are counted as `name: value` joined by CRLF, plus body
/// lengths. The request line, status line and transport framing are not
/// counted, so treat the result as a relative throughput signal.
pub fn estimate_transfer_size(request: &PreparedRequest, response: &HttpResponse) -> usize {
    header_block_len(request.headers.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        + request.body_len()
        + header_block_len(response.headers.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        + response.body.len()
}

fn header_block_len<'a>(headers: impl Iterator<Item = (&'a str, &'a str)>) -> usize {
    let (count, len) = headers.fold((0usize, 0usize), |(count, len), (name, value)| {
        (count + 1, len + name.len() + 2 + value.len())
    });
    len + 2 * count.saturating_sub(1)
}
