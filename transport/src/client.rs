//! reqwest-backed transport

use std::net::SocketAddr;

use async_trait::async_trait;
use reqwest::{Client, Method};
use requester_core::{HttpResponse, HttpTransport, PreparedRequest, TransportError};

use crate::config::HttpConfig;

/// HTTP transport with connection pooling
///
/// Cloning shares the underlying pool. Build one instance per task to share
/// connections across workers, or one per worker to keep them apart.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    /// The underlying reqwest client
    client: Client,

    /// Configuration used to create this transport
    config: HttpConfig,
}

impl ReqwestTransport {
    /// Create a new transport with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &HttpConfig) -> Result<Self, reqwest::Error> {
        let mut builder = Client::builder()
            .pool_idle_timeout(config.pool_idle_timeout)
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .read_timeout(config.read_timeout)
            .user_agent(&config.user_agent);

        for (host, address) in &config.host_overrides {
            // Port 0 keeps the port from the request URL
            builder = builder.resolve(host, SocketAddr::new(*address, 0));
        }

        let client = builder.build()?;
        tracing::debug!(
            overrides = config.host_overrides.len(),
            timeout = ?config.request_timeout,
            "HTTP client created"
        );

        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    /// Get the configuration for this transport.
    pub fn config(&self) -> &HttpConfig {
        &self.config
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    fn name(&self) -> &str {
        "reqwest"
    }

    async fn send(&self, request: &PreparedRequest) -> Result<HttpResponse, TransportError> {
        let method = Method::from_bytes(request.method.as_bytes())
            .map_err(|e| TransportError::Other(format!("invalid method {:?}: {e}", request.method)))?;

        let mut builder = self.client.request(method, &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send().await.map_err(map_error)?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();
        let body = response.bytes().await.map_err(map_error)?;

        Ok(HttpResponse {
            status,
            headers,
            body: body.to_vec(),
        })
    }
}

/// Map a reqwest failure onto the transport error kinds
fn map_error(error: reqwest::Error) -> TransportError {
    let message = error.to_string();
    if error.is_timeout() && error.is_connect() {
        TransportError::ConnectTimeout(message)
    } else if error.is_timeout() {
        TransportError::Timeout(message)
    } else {
        TransportError::Other(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::time::{Duration, Instant};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::sync::mpsc;

    /// Read one request: head up to the blank line, then Content-Length bytes
    async fn read_request(stream: &mut TcpStream) -> String {
        let mut data = Vec::new();
        let mut buf = [0u8; 1024];
        loop {
            let n = stream.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            data.extend_from_slice(&buf[..n]);

            let text = String::from_utf8_lossy(&data);
            if let Some(head_end) = text.find("\r\n\r\n") {
                let content_length = text[..head_end]
                    .lines()
                    .find_map(|line| {
                        let (name, value) = line.split_once(':')?;
                        name.eq_ignore_ascii_case("content-length")
                            .then(|| value.trim().parse::<usize>().ok())
                            .flatten()
                    })
                    .unwrap_or(0);
                if data.len() >= head_end + 4 + content_length {
                    break;
                }
            }
        }
        String::from_utf8_lossy(&data).into_owned()
    }

    /// Serve `response` to every connection, forwarding each raw request
    async fn spawn_server(response: &'static str) -> (SocketAddr, mpsc::UnboundedReceiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            loop {
                let (mut stream, _) = listener.accept().await.unwrap();
                let tx = tx.clone();
                tokio::spawn(async move {
                    let request = read_request(&mut stream).await;
                    let _ = tx.send(request);
                    stream.write_all(response.as_bytes()).await.unwrap();
                    stream.shutdown().await.ok();
                });
            }
        });

        (addr, rx)
    }

    fn request(method: &str, url: String) -> PreparedRequest {
        PreparedRequest {
            method: method.to_string(),
            url,
            headers: BTreeMap::new(),
            body: None,
        }
    }

    #[tokio::test]
    async fn test_send_reads_full_response() {
        let (addr, mut requests) = spawn_server(
            "HTTP/1.1 201 Created\r\nContent-Length: 5\r\nX-Server: mock\r\nConnection: close\r\n\r\nhello",
        )
        .await;
        let transport = ReqwestTransport::new(&HttpConfig::default()).unwrap();

        let mut prepared = request("POST", format!("http://{addr}/items"));
        prepared.headers.insert("X-Trace".into(), "abc".into());
        prepared.body = Some(r#"{"id":1}"#.into());

        let response = transport.send(&prepared).await.unwrap();
        assert_eq!(response.status, 201);
        assert_eq!(response.body, b"hello");
        assert!(response
            .headers
            .iter()
            .any(|(name, value)| name == "x-server" && value == "mock"));

        let raw = requests.recv().await.unwrap();
        assert!(raw.starts_with("POST /items HTTP/1.1\r\n"));
        assert!(raw.to_ascii_lowercase().contains("x-trace: abc"));
        assert!(raw.ends_with(r#"{"id":1}"#));
    }

    #[tokio::test]
    async fn test_error_status_is_a_response() {
        let (addr, _requests) = spawn_server(
            "HTTP/1.1 503 Service Unavailable\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
        )
        .await;
        let transport = ReqwestTransport::new(&HttpConfig::default()).unwrap();

        let response = transport
            .send(&request("GET", format!("http://{addr}/")))
            .await
            .unwrap();
        assert_eq!(response.status, 503);
        assert!(response.body.is_empty());
    }

    #[tokio::test]
    async fn test_host_override() {
        let (addr, mut requests) = spawn_server(
            "HTTP/1.1 200 OK\r\nContent-Length: 2\r\nConnection: close\r\n\r\nok",
        )
        .await;
        let config = HttpConfig::default().with_host_override("svc.requester.test", addr.ip());
        let transport = ReqwestTransport::new(&config).unwrap();

        let response = transport
            .send(&request(
                "GET",
                format!("http://svc.requester.test:{}/ping", addr.port()),
            ))
            .await
            .unwrap();
        assert_eq!(response.status, 200);

        let raw = requests.recv().await.unwrap();
        assert!(raw.to_ascii_lowercase().contains("host: svc.requester.test"));
    }

    #[tokio::test]
    async fn test_silent_server_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            loop {
                let (stream, _) = listener.accept().await.unwrap();
                held.push(stream);
            }
        });

        let config = HttpConfig::default()
            .with_read_timeout(Duration::from_millis(200))
            .with_request_timeout(Duration::from_millis(400));
        let transport = ReqwestTransport::new(&config).unwrap();

        let start = Instant::now();
        let error = transport
            .send(&request("GET", format!("http://{addr}/")))
            .await
            .unwrap_err();

        assert!(matches!(error, TransportError::Timeout(_)), "{error:?}");
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_refused_connection_is_other() {
        let addr = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap()
        };
        let transport = ReqwestTransport::new(&HttpConfig::default()).unwrap();

        let error = transport
            .send(&request("GET", format!("http://{addr}/")))
            .await
            .unwrap_err();
        assert!(matches!(error, TransportError::Other(_)), "{error:?}");
    }

    #[tokio::test]
    async fn test_invalid_method_is_other() {
        let transport = ReqwestTransport::new(&HttpConfig::default()).unwrap();

        let error = transport
            .send(&request("NOT A METHOD", "http://127.0.0.1:9/".to_string()))
            .await
            .unwrap_err();
        assert!(matches!(error, TransportError::Other(_)));
    }

    #[test]
    fn test_transport_config() {
        let config = HttpConfig::default().with_connect_timeout(Duration::from_secs(2));
        let transport = ReqwestTransport::new(&config).unwrap();

        assert_eq!(transport.name(), "reqwest");
        assert_eq!(transport.config().connect_timeout, Duration::from_secs(2));
    }
}
