//! Request selection and preparation
//!
//! Each worker iteration picks one configured request according to the
//! task's [`RequestOrder`], then turns it into a [`PreparedRequest`]: the
//! prefab headers merged beneath the request's own headers, plus a body for
//! mutating methods.

use crate::config::{RequestConfig, RequestOrder, TaskConfig};
use rand::Rng;
use std::collections::BTreeMap;

/// Methods that carry a request body
const BODY_METHODS: &[&str] = &["POST", "PUT", "PATCH"];

/// A request ready to hand to the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedRequest {
    /// HTTP method, upper case
    pub method: String,

    /// Target URL
    pub url: String,

    /// Merged headers
    pub headers: BTreeMap<String, String>,

    /// Serialized body, if one is sent
    pub body: Option<String>,
}

impl PreparedRequest {
    /// Prepare a configured request using the task prefabs
    pub fn from_config(task: &TaskConfig, request: &RequestConfig) -> Self {
        Self {
            method: request.method.to_uppercase(),
            url: request.url.clone(),
            headers: merge_headers(&task.prefabs.default_headers, &request.headers),
            body: prepare_body(request),
        }
    }

    /// Body length in bytes, zero when absent
    pub fn body_len(&self) -> usize {
        self.body.as_ref().map_or(0, String::len)
    }
}

/// Pick the request for the next iteration
///
/// `task.requests` must be non-empty; the worker builder validates this.
pub fn select_request<'a, R: Rng>(task: &'a TaskConfig, rng: &mut R) -> &'a RequestConfig {
    match task.policy.order {
        RequestOrder::Random => &task.requests[rng.gen_range(0..task.requests.len())],
    }
}

/// Serialize the body of a mutating request
///
/// Non-mutating methods, and requests whose body is absent or empty, send no
/// body.
pub fn prepare_body(request: &RequestConfig) -> Option<String> {
    if !BODY_METHODS.contains(&request.method.to_uppercase().as_str()) {
        return None;
    }
    request
        .data
        .as_ref()
        .filter(|body| !body.is_empty())
        .map(|body| body.to_text())
}

/// Overlay per-request headers on the defaults; the request wins on collision
pub fn merge_headers(
    defaults: &BTreeMap<String, String>,
    overrides: &BTreeMap<String, String>,
) -> BTreeMap<String, String> {
    let mut merged = defaults.clone();
    merged.extend(overrides.iter().map(|(k, v)| (k.clone(), v.clone())));
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RequestBody;
    use rand::rngs::mock::StepRng;

    fn headers(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn structured(json: &str) -> RequestBody {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_get_with_body_sends_nothing() {
        let request = RequestConfig::get("http://h/").with_body(RequestBody::Text("x".into()));
        assert_eq!(prepare_body(&request), None);
    }

    #[test]
    fn test_post_structured_body_serialized() {
        let request = RequestConfig::new("POST", "http://h/").with_body(structured(r#"{"a":1}"#));
        assert_eq!(prepare_body(&request).as_deref(), Some(r#"{"a":1}"#));
    }

    #[test]
    fn test_post_scalar_body_unchanged() {
        let request = RequestConfig::new("POST", "http://h/").with_body(RequestBody::Text("x".into()));
        assert_eq!(prepare_body(&request).as_deref(), Some("x"));
    }

    #[test]
    fn test_put_and_patch_carry_bodies() {
        for method in ["PUT", "patch"] {
            let request =
                RequestConfig::new(method, "http://h/").with_body(RequestBody::Text("x".into()));
            assert_eq!(prepare_body(&request).as_deref(), Some("x"), "{method}");
        }
    }

    #[test]
    fn test_post_without_body() {
        let request = RequestConfig::new("POST", "http://h/");
        assert_eq!(prepare_body(&request), None);

        let empty = RequestConfig::new("POST", "http://h/").with_body(RequestBody::Text(String::new()));
        assert_eq!(prepare_body(&empty), None);
    }

    #[test]
    fn test_header_merge_override_wins() {
        let merged = merge_headers(
            &headers(&[("A", "1")]),
            &headers(&[("A", "2"), ("B", "3")]),
        );
        assert_eq!(merged, headers(&[("A", "2"), ("B", "3")]));
    }

    #[test]
    fn test_prepared_request_from_config() {
        let task = TaskConfig::new(
            "t",
            vec![RequestConfig::new("post", "http://h/api")
                .with_header("B", "3")
                .with_body(structured(r#"{"k":"v"}"#))],
        )
        .with_default_header("A", "1");

        let prepared = PreparedRequest::from_config(&task, &task.requests[0]);
        assert_eq!(prepared.method, "POST");
        assert_eq!(prepared.url, "http://h/api");
        assert_eq!(prepared.headers, headers(&[("A", "1"), ("B", "3")]));
        assert_eq!(prepared.body.as_deref(), Some(r#"{"k":"v"}"#));
        assert_eq!(prepared.body_len(), 9);
    }

    #[test]
    fn test_random_selection_covers_requests() {
        let task = TaskConfig::new(
            "t",
            vec![RequestConfig::get("http://h/a"), RequestConfig::get("http://h/b")],
        );
        let mut rng = rand::thread_rng();
        let mut seen = std::collections::HashSet::new();
        for _ in 0..200 {
            seen.insert(select_request(&task, &mut rng).url.clone());
        }
        assert_eq!(seen.len(), 2);
    }

    #[test]
    fn test_selection_single_request() {
        let task = TaskConfig::new("t", vec![RequestConfig::get("http://h/only")]);
        let mut rng = StepRng::new(u64::MAX / 2, 1);
        assert_eq!(select_request(&task, &mut rng).url, "http://h/only");
    }
}
