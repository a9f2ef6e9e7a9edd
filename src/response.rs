use crate::request::Headers;

/// HTTP response representation
///
/// Produced by a [`Transport`](crate::transport::Transport) and handed back
/// to the caller untouched. Header names are whatever the transport
/// reported; the bundled transport lowercases them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    status: u16,
    headers: Headers,
    body: Vec<u8>,
}

impl Response {
    /// Create a response with no headers
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: Headers::new(),
            body: body.into(),
        }
    }

    /// Add a header
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Replace all headers
    pub fn with_headers(mut self, headers: Headers) -> Self {
        self.headers = headers;
        self
    }

    /// Get the HTTP status code
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Get the response headers
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Get a specific header value
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    /// Get the raw body
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Get the body as text, replacing invalid UTF-8
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Check if the response is successful (2xx status code)
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Split into headers and body
    pub fn into_parts(self) -> (Headers, Vec<u8>) {
        (self.headers, self.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_accessors() {
        let response = Response::new(200, "Welcome to the website!")
            .with_header("set-cookie", "session=1")
            .with_header("content-type", "text/html");

        assert_eq!(response.status(), 200);
        assert!(response.is_success());
        assert_eq!(response.header("set-cookie"), Some("session=1"));
        assert_eq!(response.header("Set-Cookie"), None);
        assert_eq!(response.text(), "Welcome to the website!");

        let (headers, body) = response.into_parts();
        assert_eq!(headers.len(), 2);
        assert_eq!(body, b"Welcome to the website!".to_vec());
    }

    #[test]
    fn test_status_checks() {
        assert!(!Response::new(403, "").is_success());
        assert!(!Response::new(500, "").is_success());
    }
}
