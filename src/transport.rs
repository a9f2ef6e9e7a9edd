use std::time::Duration;
use async_trait::async_trait;
use http::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{redirect::Policy, Client as ReqwestClient};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::request::{Headers, Method};
use crate::response::Response;

/// User agent sent by the default transport
pub const DEFAULT_USER_AGENT: &str = concat!("bolacha/", env!("CARGO_PKG_VERSION"));

/// Transport trait for HTTP operations
///
/// A transport performs the actual network exchange. The client hands it a
/// fully shaped request: the body is already encoded and the headers are
/// already merged with the session.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a request and return the response
    async fn request(
        &self,
        url: &str,
        method: Method,
        body: Vec<u8>,
        headers: &Headers,
    ) -> Result<Response>;

    /// Get the transport name/type
    fn name(&self) -> &str;
}

/// Default HTTP transport implementation using reqwest
pub struct HttpTransport {
    client: ReqwestClient,
    config: TransportConfig,
}

impl HttpTransport {
    /// Create a new HTTP transport
    pub fn new(config: TransportConfig) -> Result<Self> {
        let redirect = if config.follow_redirects {
            Policy::default()
        } else {
            Policy::none()
        };

        let mut builder = ReqwestClient::builder()
            .user_agent(config.user_agent.clone())
            .danger_accept_invalid_certs(config.danger_accept_invalid_certs)
            .redirect(redirect);

        if let Some(timeout) = config.connect_timeout {
            builder = builder.connect_timeout(timeout);
        }

        let client = builder
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    /// Get the underlying reqwest client
    pub fn client(&self) -> &ReqwestClient {
        &self.client
    }

    /// Get the transport configuration
    pub fn config(&self) -> &TransportConfig {
        &self.config
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn request(
        &self,
        url: &str,
        method: Method,
        body: Vec<u8>,
        headers: &Headers,
    ) -> Result<Response> {
        let request = self
            .client
            .request(method.into(), url)
            .headers(to_header_map(headers)?)
            .body(body)
            .build()?;

        // The body is buffered here, so the read counts against the timeout.
        let exchange = async {
            let response = self.client.execute(request).await?;
            let status = response.status().as_u16();
            let headers = from_header_map(response.headers());
            let body = response.bytes().await?;
            Ok::<_, Error>(Response::new(status, body.to_vec()).with_headers(headers))
        };

        match self.config.timeout {
            Some(timeout) => tokio::time::timeout(timeout, exchange)
                .await
                .map_err(|_| Error::timeout(timeout))?,
            None => exchange.await,
        }
    }

    fn name(&self) -> &str {
        "HTTP/1.1"
    }
}

/// Names differing only in case collapse onto one wire header; the last in
/// key order wins.
fn to_header_map(headers: &Headers) -> Result<HeaderMap> {
    let mut map = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        let name = name.parse::<HeaderName>()?;
        let value = value.parse::<HeaderValue>()?;
        map.insert(name, value);
    }
    Ok(map)
}

/// Lowercase names; repeated headers are joined with `", "`.
fn from_header_map(map: &HeaderMap) -> Headers {
    let mut headers = Headers::new();
    for (name, value) in map {
        let value = String::from_utf8_lossy(value.as_bytes());
        match headers.get_mut(name.as_str()) {
            Some(existing) => {
                existing.push_str(", ");
                existing.push_str(&value);
            }
            None => {
                headers.insert(name.as_str().to_string(), value.into_owned());
            }
        }
    }
    headers
}

/// Transport configuration
///
/// Missing keys fall back to the defaults when deserialized.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Overall request timeout
    pub timeout: Option<Duration>,
    /// Connection establishment timeout
    pub connect_timeout: Option<Duration>,
    /// User agent header
    pub user_agent: String,
    /// Skip TLS certificate verification
    pub danger_accept_invalid_certs: bool,
    /// Follow redirects
    pub follow_redirects: bool,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: None,
            connect_timeout: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            danger_accept_invalid_certs: false,
            follow_redirects: true,
        }
    }
}

/// Transport builder for creating transport configurations
pub struct TransportBuilder {
    config: TransportConfig,
}

impl TransportBuilder {
    /// Create a new transport builder
    pub fn new() -> Self {
        Self {
            config: TransportConfig::default(),
        }
    }

    /// Set the overall request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = Some(timeout);
        self
    }

    /// Set the connection timeout
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = Some(timeout);
        self
    }

    /// Set the user agent
    pub fn user_agent(mut self, user_agent: &str) -> Self {
        self.config.user_agent = user_agent.to_string();
        self
    }

    /// Accept invalid TLS certificates
    pub fn danger_accept_invalid_certs(mut self, accept: bool) -> Self {
        self.config.danger_accept_invalid_certs = accept;
        self
    }

    /// Enable or disable redirect following
    pub fn follow_redirects(mut self, follow: bool) -> Self {
        self.config.follow_redirects = follow;
        self
    }

    /// Build the transport configuration
    pub fn build(self) -> TransportConfig {
        self.config
    }
}

impl Default for TransportBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn transport() -> HttpTransport {
        HttpTransport::new(TransportConfig::default()).unwrap()
    }

    #[test]
    fn test_transport_config() {
        let config = TransportConfig::default();

        assert!(config.timeout.is_none());
        assert!(config.follow_redirects);
        assert!(!config.danger_accept_invalid_certs);
        assert!(config.user_agent.starts_with("bolacha/"));
    }

    #[test]
    fn test_transport_builder() {
        let config = TransportBuilder::new()
            .timeout(Duration::from_secs(5))
            .user_agent("tests/1.0")
            .follow_redirects(false)
            .build();

        assert_eq!(config.timeout, Some(Duration::from_secs(5)));
        assert_eq!(config.user_agent, "tests/1.0");
        assert!(!config.follow_redirects);
    }

    #[test]
    fn test_transport_config_from_json() {
        let config: TransportConfig = serde_json::from_str(
            r#"{"timeout": {"secs": 10, "nanos": 0}, "follow_redirects": false}"#,
        )
        .unwrap();

        assert_eq!(config.timeout, Some(Duration::from_secs(10)));
        assert!(!config.follow_redirects);
        assert_eq!(config.user_agent, DEFAULT_USER_AGENT);
    }

    #[test]
    fn test_from_header_map_joins_repeats() {
        let mut map = HeaderMap::new();
        map.append("Set-Cookie", HeaderValue::from_static("a=1"));
        map.append("Set-Cookie", HeaderValue::from_static("b=2"));
        map.insert("Connection", HeaderValue::from_static("close"));

        let headers = from_header_map(&map);
        assert_eq!(headers["set-cookie"], "a=1, b=2");
        assert_eq!(headers["connection"], "close");
    }

    #[test]
    fn test_to_header_map_rejects_bad_names() {
        let mut headers = Headers::new();
        headers.insert("bad header".to_string(), "x".to_string());

        let err = to_header_map(&headers).unwrap_err();
        assert!(matches!(err, Error::InvalidHeader(_)));
    }

    #[tokio::test]
    async fn test_http_transport_round_trip() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/login"))
            .and(header("content-type", "application/x-www-form-urlencoded"))
            .and(body_string("password=bar&username=foo"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("set-cookie", "session=abc")
                    .set_body_string("Welcome to the website!"),
            )
            .mount(&server)
            .await;

        let mut headers = Headers::new();
        headers.insert(
            "Content-type".to_string(),
            "application/x-www-form-urlencoded".to_string(),
        );

        let response = transport()
            .request(
                &format!("{}/login", server.uri()),
                Method::Post,
                b"password=bar&username=foo".to_vec(),
                &headers,
            )
            .await
            .unwrap();

        assert_eq!(response.status(), 200);
        assert_eq!(response.header("set-cookie"), Some("session=abc"));
        assert_eq!(response.text(), "Welcome to the website!");
    }

    #[tokio::test]
    async fn test_http_transport_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
            .mount(&server)
            .await;

        let transport = HttpTransport::new(
            TransportBuilder::new()
                .timeout(Duration::from_millis(50))
                .build(),
        )
        .unwrap();

        let err = transport
            .request(&server.uri(), Method::Get, Vec::new(), &Headers::new())
            .await
            .unwrap_err();
        assert!(err.is_timeout());
    }

    #[tokio::test]
    async fn test_http_transport_timeout_covers_body() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        use tokio::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 1024];
            let _ = socket.read(&mut buf).await;
            socket
                .write_all(b"HTTP/1.1 200 OK\r\ncontent-length: 5\r\n\r\n")
                .await
                .unwrap();
            tokio::time::sleep(Duration::from_millis(1500)).await;
            let _ = socket.write_all(b"hello").await;
        });

        let transport = HttpTransport::new(
            TransportBuilder::new()
                .timeout(Duration::from_millis(100))
                .build(),
        )
        .unwrap();

        let started = std::time::Instant::now();
        let err = transport
            .request(&format!("http://{}/", addr), Method::Get, Vec::new(), &Headers::new())
            .await
            .unwrap_err();
        assert!(err.is_timeout());
        assert!(started.elapsed() < Duration::from_millis(1000));
    }

    #[tokio::test]
    async fn test_http_transport_connection_refused() {
        let err = transport()
            .request("http://127.0.0.1:1/", Method::Get, Vec::new(), &Headers::new())
            .await
            .unwrap_err();
        assert!(err.is_network());
    }
}
