use std::fmt;
use std::time::Duration;
use serde_json::Value;
use tracing::debug;

use crate::error::Result;
use crate::multipart::{self, Fields};
use crate::request::{headers_from_json, require_text, validate_url, Body, Headers, Method};
use crate::response::Response;
use crate::session::Session;
use crate::transport::{HttpTransport, Transport, TransportConfig};

/// Header naming the body encoding
pub const CONTENT_TYPE: &str = "Content-type";
/// Header carrying the multipart body size
pub const CONTENT_LENGTH: &str = "content-length";
/// Content type of URL-encoded form bodies
pub const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";

/// Builds the transport from the transport options
pub type TransportFactory = Box<dyn FnOnce(TransportConfig) -> Result<Box<dyn Transport>> + Send>;

/// HTTP client that keeps a session between requests
///
/// Each call shapes the request (body encoding, header merge), hands it to
/// the transport, then records what the session needs from the response:
/// the `set-cookie` value for a persistent client, the `connection` value
/// otherwise. The next call replays it.
///
/// # Examples
///
/// ```rust,no_run
/// use bolacha::{Client, Fields, FieldValue};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let mut client = Client::new()?;
///
///     let mut login = Fields::new();
///     login.insert("username".into(), FieldValue::from("foo"));
///     login.insert("password".into(), FieldValue::from("bar"));
///     client.post("http://localhost:5050/", login, None).await?;
///
///     // sent with the cookie from the login response
///     let response = client.get("http://localhost:5050/", "", None).await?;
///     println!("{}", response.text());
///     Ok(())
/// }
/// ```
pub struct Client {
    transport: Box<dyn Transport>,
    session: Session,
    boundary: String,
}

/// How a body was encoded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Encoding {
    Raw,
    UrlEncoded,
    Multipart,
}

impl Client {
    /// Create a persistent client over the default transport
    pub fn new() -> Result<Self> {
        Self::builder().build()
    }

    /// Create a new client builder
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Create a client over an existing transport
    pub fn with_transport<T>(transport: T, persistent: bool) -> Self
    where
        T: Transport + 'static,
    {
        Self {
            transport: Box::new(transport),
            session: Session::new(persistent),
            boundary: multipart::boundary().to_string(),
        }
    }

    /// Whether the client replays cookies
    pub fn is_persistent(&self) -> bool {
        self.session.is_persistent()
    }

    /// Get the session state
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Get the transport
    pub fn transport(&self) -> &dyn Transport {
        self.transport.as_ref()
    }

    /// Get the multipart boundary
    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// Send a GET request
    pub async fn get(&mut self, url: &str, body: impl Into<Body>, headers: Option<Headers>) -> Result<Response> {
        self.send(url, Method::Get, body.into(), headers).await
    }

    /// Send a POST request
    pub async fn post(&mut self, url: &str, body: impl Into<Body>, headers: Option<Headers>) -> Result<Response> {
        self.send(url, Method::Post, body.into(), headers).await
    }

    /// Send a PUT request
    pub async fn put(&mut self, url: &str, body: impl Into<Body>, headers: Option<Headers>) -> Result<Response> {
        self.send(url, Method::Put, body.into(), headers).await
    }

    /// Send a DELETE request
    pub async fn delete(&mut self, url: &str, body: impl Into<Body>, headers: Option<Headers>) -> Result<Response> {
        self.send(url, Method::Delete, body.into(), headers).await
    }

    /// Send a HEAD request
    pub async fn head(&mut self, url: &str, body: impl Into<Body>, headers: Option<Headers>) -> Result<Response> {
        self.send(url, Method::Head, body.into(), headers).await
    }

    /// Send a request with a method given by name
    ///
    /// Fails with [`Error::InvalidArgument`](crate::Error::InvalidArgument)
    /// for an empty URL or a method outside the RFC 2616 set, before
    /// anything is sent.
    pub async fn request(
        &mut self,
        url: &str,
        method: &str,
        body: impl Into<Body>,
        headers: Option<Headers>,
    ) -> Result<Response> {
        validate_url(url)?;
        let method = method.parse::<Method>()?;
        self.send(url, method, body.into(), headers).await
    }

    /// Send a request described by untyped JSON arguments
    ///
    /// `url` and `method` must be strings, `body` a string or an object and
    /// `headers` an object; anything else is an invalid argument.
    pub async fn request_json(
        &mut self,
        url: &Value,
        method: &Value,
        body: Option<&Value>,
        headers: Option<&Value>,
    ) -> Result<Response> {
        let url = require_text("url", url)?;
        validate_url(url)?;
        let method = require_text("method", method)?.parse::<Method>()?;
        let body = match body {
            Some(value) => Body::try_from(value)?,
            None => Body::Empty,
        };
        let headers = headers.map(headers_from_json).transpose()?;
        self.send(url, method, body, headers).await
    }

    /// Shape and send a request, then update the session
    ///
    /// This is the checked entry point behind every other request method: it
    /// rejects an empty URL itself, so it is safe to call directly. Transport
    /// errors come back as-is and leave the session untouched.
    pub async fn send(&mut self, url: &str, method: Method, body: Body, headers: Option<Headers>) -> Result<Response> {
        validate_url(url)?;

        let (payload, encoding) = encode_body(body, &self.boundary)?;
        let mut outgoing = self.session.outgoing(headers);

        match encoding {
            Encoding::UrlEncoded => {
                outgoing
                    .entry(CONTENT_TYPE.to_string())
                    .or_insert_with(|| FORM_URLENCODED.to_string());
            }
            Encoding::Multipart => {
                // Other spellings would shadow these on the wire.
                outgoing.retain(|name, _| {
                    !name.eq_ignore_ascii_case(CONTENT_TYPE) && !name.eq_ignore_ascii_case(CONTENT_LENGTH)
                });
                outgoing.insert(
                    CONTENT_TYPE.to_string(),
                    format!("multipart/form-data; boundary={}", self.boundary),
                );
                outgoing.insert(CONTENT_LENGTH.to_string(), payload.len().to_string());
            }
            Encoding::Raw => {}
        }

        debug!(
            %method,
            target = %log_target(url),
            encoding = ?encoding,
            body_len = payload.len(),
            headers = outgoing.len(),
            transport = self.transport.name(),
            "sending request"
        );

        let response = self.transport.request(url, method, payload, &outgoing).await?;

        debug!(status = response.status(), "received response");
        self.session.absorb(response.headers());

        Ok(response)
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("transport", &self.transport.name())
            .field("session", &self.session)
            .field("boundary", &self.boundary)
            .finish()
    }
}

/// Host and path only; userinfo and query stay out of the logs.
fn log_target(url: &str) -> String {
    match url::Url::parse(url) {
        Ok(parsed) => format!("{}{}", parsed.host_str().unwrap_or_default(), parsed.path()),
        Err(_) => "<unparsed>".to_string(),
    }
}

fn encode_body(body: Body, boundary: &str) -> Result<(Vec<u8>, Encoding)> {
    match body {
        Body::Empty => Ok((Vec::new(), Encoding::Raw)),
        Body::Text(text) => Ok((text.into_bytes(), Encoding::Raw)),
        Body::Fields(fields) => encode_fields(fields, boundary),
    }
}

fn encode_fields(fields: Fields, boundary: &str) -> Result<(Vec<u8>, Encoding)> {
    if multipart::has_file(&fields) {
        Ok((multipart::encode_multipart(boundary, fields)?, Encoding::Multipart))
    } else {
        Ok((multipart::url_encode(&fields).into_bytes(), Encoding::UrlEncoded))
    }
}

/// Builder for creating clients with custom configuration
///
/// # Examples
///
/// ```rust,no_run
/// use bolacha::ClientBuilder;
/// use std::time::Duration;
///
/// let client = ClientBuilder::new()
///     .persistent(false)
///     .timeout(Duration::from_secs(30))
///     .user_agent("MyApp/1.0")
///     .build()
///     .unwrap();
/// ```
pub struct ClientBuilder {
    persistent: bool,
    boundary: Option<String>,
    transport_config: TransportConfig,
    factory: Option<TransportFactory>,
}

impl ClientBuilder {
    /// Create a new client builder
    pub fn new() -> Self {
        Self {
            persistent: true,
            boundary: None,
            transport_config: TransportConfig::default(),
            factory: None,
        }
    }

    /// Keep cookies between requests (the default) or echo `connection`
    pub fn persistent(mut self, persistent: bool) -> Self {
        self.persistent = persistent;
        self
    }

    /// Use a fixed multipart boundary instead of the process-wide one
    pub fn boundary(mut self, boundary: impl Into<String>) -> Self {
        self.boundary = Some(boundary.into());
        self
    }

    /// Set the options the transport is built with
    pub fn transport_config(mut self, config: TransportConfig) -> Self {
        self.transport_config = config;
        self
    }

    /// Set the overall request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.transport_config.timeout = Some(timeout);
        self
    }

    /// Set the connection timeout
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.transport_config.connect_timeout = Some(timeout);
        self
    }

    /// Set the user agent
    pub fn user_agent(mut self, user_agent: &str) -> Self {
        self.transport_config.user_agent = user_agent.to_string();
        self
    }

    /// Build the transport with a factory instead of [`HttpTransport`]
    ///
    /// The factory receives the transport options.
    pub fn transport<F, T>(mut self, factory: F) -> Self
    where
        F: FnOnce(TransportConfig) -> Result<T> + Send + 'static,
        T: Transport + 'static,
    {
        self.factory = Some(Box::new(move |config: TransportConfig| -> Result<Box<dyn Transport>> {
            let transport: Box<dyn Transport> = Box::new(factory(config)?);
            Ok(transport)
        }));
        self
    }

    /// Build the client
    pub fn build(self) -> Result<Client> {
        let transport: Box<dyn Transport> = match self.factory {
            Some(factory) => factory(self.transport_config)?,
            None => Box::new(HttpTransport::new(self.transport_config)?),
        };

        Ok(Client {
            transport,
            session: Session::new(self.persistent),
            boundary: self
                .boundary
                .unwrap_or_else(|| multipart::boundary().to_string()),
        })
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
