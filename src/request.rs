use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde_json::Value;

use crate::error::{Error, Result};
use crate::multipart::{FieldValue, Fields};

/// Header mapping sent to and received from a transport
///
/// Keys are compared case-sensitively: `Content-type` and `content-type` are
/// different entries.
pub type Headers = BTreeMap<String, String>;

/// Where valid method names are defined
pub const RFC_LOCATION: &str =
    "Take a look at http://www.w3.org/Protocols/rfc2616/rfc2616-sec9.html to see valid method definitions";

/// HTTP methods accepted by the client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Options,
    Get,
    Head,
    Post,
    Put,
    Delete,
    Trace,
    Connect,
}

impl Method {
    /// Every accepted method, in RFC 2616 order
    pub const ALL: [Method; 8] = [
        Method::Options,
        Method::Get,
        Method::Head,
        Method::Post,
        Method::Put,
        Method::Delete,
        Method::Trace,
        Method::Connect,
    ];

    /// Get the wire representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Options => "OPTIONS",
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Trace => "TRACE",
            Method::Connect => "CONNECT",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = Error;

    /// Method names are case-sensitive: `get` is rejected.
    fn from_str(s: &str) -> Result<Self> {
        Method::ALL
            .iter()
            .copied()
            .find(|method| method.as_str() == s)
            .ok_or_else(|| {
                Error::invalid_argument(format!(
                    "parameter method must be a valid HTTP method. Got {}. {}",
                    s, RFC_LOCATION
                ))
            })
    }
}

impl From<Method> for http::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Options => http::Method::OPTIONS,
            Method::Get => http::Method::GET,
            Method::Head => http::Method::HEAD,
            Method::Post => http::Method::POST,
            Method::Put => http::Method::PUT,
            Method::Delete => http::Method::DELETE,
            Method::Trace => http::Method::TRACE,
            Method::Connect => http::Method::CONNECT,
        }
    }
}

/// Request body before encoding
#[derive(Debug, Default)]
pub enum Body {
    /// No body; sent as empty text
    #[default]
    Empty,
    /// Text sent unchanged
    Text(String),
    /// Form fields, URL-encoded or multipart depending on their values
    Fields(Fields),
}

impl From<&str> for Body {
    fn from(text: &str) -> Self {
        Body::Text(text.to_string())
    }
}

impl From<String> for Body {
    fn from(text: String) -> Self {
        Body::Text(text)
    }
}

impl From<Fields> for Body {
    fn from(fields: Fields) -> Self {
        Body::Fields(fields)
    }
}

impl TryFrom<&Value> for Body {
    type Error = Error;

    /// Strings become text bodies, objects become field mappings and `null`
    /// is an empty body. Anything else is rejected.
    fn try_from(value: &Value) -> Result<Self> {
        match value {
            Value::Null => Ok(Body::Empty),
            Value::String(text) => Ok(Body::Text(text.clone())),
            Value::Object(map) => Ok(Body::Fields(
                map.iter()
                    .map(|(name, value)| (name.clone(), field_from_json(value)))
                    .collect(),
            )),
            other => Err(Error::invalid_argument(format!(
                "parameter body must be a string or dict. Got {}.",
                other
            ))),
        }
    }
}

fn field_from_json(value: &Value) -> FieldValue {
    match value {
        Value::Null => FieldValue::Text(String::new()),
        Value::String(text) => FieldValue::Text(text.clone()),
        Value::Array(items) => FieldValue::List(items.iter().map(field_from_json).collect()),
        other => FieldValue::Text(other.to_string()),
    }
}

/// Parse a JSON object of string values into a header mapping
pub fn headers_from_json(value: &Value) -> Result<Headers> {
    let map = value.as_object().ok_or_else(|| {
        Error::invalid_argument(format!(
            "parameter headers must be a dict or NoneType. Got {}",
            value
        ))
    })?;

    map.iter()
        .map(|(name, value)| match value {
            Value::String(text) => Ok((name.clone(), text.clone())),
            Value::Number(_) | Value::Bool(_) => Ok((name.clone(), value.to_string())),
            other => Err(Error::invalid_argument(format!(
                "header {} must be a string. Got {}",
                name, other
            ))),
        })
        .collect()
}

/// Check the URL argument
pub fn validate_url(url: &str) -> Result<()> {
    if url.is_empty() {
        return Err(Error::invalid_argument(format!(
            "parameter url must be a non-empty string. Got {:?}",
            url
        )));
    }
    Ok(())
}

/// Check a JSON value is text and return it
pub(crate) fn require_text<'a>(param: &str, value: &'a Value) -> Result<&'a str> {
    value.as_str().ok_or_else(|| {
        Error::invalid_argument(format!(
            "parameter {} must be a string. Got {}",
            param, value
        ))
    })
}
