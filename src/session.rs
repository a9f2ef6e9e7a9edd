use tracing::trace;

use crate::request::Headers;

/// Response header carrying the session cookie
pub const SET_COOKIE: &str = "set-cookie";
/// Request header the session cookie is replayed in
pub const COOKIE: &str = "Cookie";
/// Response header echoed back by non-persistent clients
pub const CONNECTION: &str = "connection";

/// Headers carried from one response into the next request
///
/// This is a single slot, not a cookie jar: a persistent session remembers
/// the last `set-cookie` value it saw, a non-persistent one the last
/// `connection` value. Each response overwrites the slot.
#[derive(Debug, Clone, Default)]
pub struct Session {
    persistent: bool,
    headers: Headers,
}

impl Session {
    /// Create an empty session
    pub fn new(persistent: bool) -> Self {
        Self {
            persistent,
            headers: Headers::new(),
        }
    }

    /// Whether the session replays cookies
    pub fn is_persistent(&self) -> bool {
        self.persistent
    }

    /// The stored headers
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// The stored cookie, if any
    pub fn cookie(&self) -> Option<&str> {
        self.headers.get(SET_COOKIE).map(String::as_str)
    }

    /// Merge stored headers with the caller's for an outgoing request
    ///
    /// Caller headers override stored ones, but the stored cookie is applied
    /// last and wins over a caller-supplied `Cookie`. `set-cookie` is never
    /// sent.
    pub fn outgoing(&self, caller: Option<Headers>) -> Headers {
        let mut headers = self.headers.clone();
        headers.extend(caller.unwrap_or_default());

        if self.persistent {
            if let Some(cookie) = self.cookie() {
                headers.insert(COOKIE.to_string(), cookie.to_string());
            }
        }

        headers.remove(SET_COOKIE);
        headers
    }

    /// Record the headers of a response
    pub fn absorb(&mut self, response: &Headers) {
        let key = if self.persistent { SET_COOKIE } else { CONNECTION };
        if let Some(value) = response.get(key) {
            trace!(header = key, value = %value, "storing session header");
            self.headers.insert(key.to_string(), value.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers<const N: usize>(entries: [(&str, &str); N]) -> Headers {
        entries
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_new_session_is_empty() {
        let session = Session::new(true);
        assert!(session.is_persistent());
        assert!(session.headers().is_empty());
        assert!(session.outgoing(None).is_empty());
    }

    #[test]
    fn test_persistent_session_replays_cookie() {
        let mut session = Session::new(true);
        session.absorb(&headers([("set-cookie", "A"), ("connection", "close")]));

        assert_eq!(session.cookie(), Some("A"));
        assert_eq!(session.headers().len(), 1);
        assert_eq!(session.outgoing(None), headers([("Cookie", "A")]));
    }

    #[test]
    fn test_cookie_overwritten_by_each_response() {
        let mut session = Session::new(true);
        session.absorb(&headers([("set-cookie", "A")]));
        session.absorb(&headers([("set-cookie", "B")]));
        session.absorb(&headers([("content-type", "text/plain")]));

        assert_eq!(session.cookie(), Some("B"));
    }

    #[test]
    fn test_stored_cookie_beats_caller_cookie() {
        let mut session = Session::new(true);
        session.absorb(&headers([("set-cookie", "stored")]));

        let outgoing = session.outgoing(Some(headers([("Cookie", "mine"), ("Accept", "*/*")])));
        assert_eq!(outgoing, headers([("Accept", "*/*"), ("Cookie", "stored")]));
    }

    #[test]
    fn test_caller_set_cookie_is_dropped() {
        let session = Session::new(true);
        let outgoing = session.outgoing(Some(headers([("set-cookie", "x"), ("Accept", "*/*")])));
        assert_eq!(outgoing, headers([("Accept", "*/*")]));
    }

    #[test]
    fn test_non_persistent_session_keeps_connection_only() {
        let mut session = Session::new(false);
        session.absorb(&headers([("set-cookie", "A"), ("connection", "close")]));

        assert_eq!(session.cookie(), None);
        assert_eq!(session.outgoing(None), headers([("connection", "close")]));

        let outgoing = session.outgoing(Some(headers([("connection", "keep-alive")])));
        assert_eq!(outgoing["connection"], "keep-alive");
    }
}
