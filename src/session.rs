//! Session state: the (cookie, token) pair shared by all requests.
//!
//! The device rotates its CSRF-style verification token on nearly every
//! exchange; the token carried by request N+1 must be the one last observed
//! at (or after) the completion of request N.  The owning [`crate::Client`]
//! serializes all exchanges, so updates here never race.

use reqwest::header::HeaderMap;
use tracing::debug;

use crate::TOKEN_HEADER;

/// Name of the session cookie issued by the device.
pub const SESSION_COOKIE: &str = "SessionID";

/// The current session identifier and verification token.
///
/// Created empty; populated by the bootstrap exchange; the token is then
/// superseded opportunistically by every token-bearing response.
#[derive(Debug, Default)]
pub struct Session {
    session_id: Option<String>,
    token: Option<String>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// The current verification token, if a session has been established.
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// The `Cookie` header value for the current session, if any.
    pub fn cookie(&self) -> Option<String> {
        self.session_id
            .as_deref()
            .map(|id| format!("{SESSION_COOKIE}={id}"))
    }

    /// Install a fresh (session, token) pair, replacing any prior state.
    ///
    /// Used by the bootstrap exchange and by the login handshake, which
    /// issues a replacement pair on success.
    pub fn establish(&mut self, session_id: impl Into<String>, token: impl Into<String>) {
        self.session_id = Some(session_id.into());
        self.token = Some(token.into());
        debug!("session established");
    }

    /// Adopt a rotated token from response headers, when one is present.
    ///
    /// Runs before the response body is inspected, so a body that fails to
    /// decode still advances the token.  Last writer wins; execution is
    /// serialized so there is never a competing writer.
    pub fn observe(&mut self, headers: &HeaderMap) {
        if let Some(tok) = headers.get(TOKEN_HEADER).and_then(|v| v.to_str().ok()) {
            if !tok.is_empty() {
                debug!("verification token rotated");
                self.token = Some(tok.to_owned());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::{HeaderMap, HeaderValue};

    fn headers_with_token(tok: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(TOKEN_HEADER, HeaderValue::from_str(tok).unwrap());
        headers
    }

    #[test]
    fn starts_empty() {
        let session = Session::new();
        assert_eq!(session.token(), None);
        assert_eq!(session.cookie(), None);
    }

    #[test]
    fn establish_sets_cookie_and_token() {
        let mut session = Session::new();
        session.establish("abc123", "tok-1");
        assert_eq!(session.token(), Some("tok-1"));
        assert_eq!(session.cookie().as_deref(), Some("SessionID=abc123"));
    }

    #[test]
    fn observe_adopts_fresh_token() {
        let mut session = Session::new();
        session.establish("abc123", "tok-1");
        session.observe(&headers_with_token("tok-2"));
        assert_eq!(session.token(), Some("tok-2"));
    }

    #[test]
    fn observe_ignores_absent_header() {
        let mut session = Session::new();
        session.establish("abc123", "tok-1");
        session.observe(&HeaderMap::new());
        assert_eq!(session.token(), Some("tok-1"));
    }

    #[test]
    fn observe_ignores_empty_header() {
        let mut session = Session::new();
        session.establish("abc123", "tok-1");
        session.observe(&headers_with_token(""));
        assert_eq!(session.token(), Some("tok-1"));
    }

    #[test]
    fn observe_does_not_touch_cookie() {
        let mut session = Session::new();
        session.establish("abc123", "tok-1");
        session.observe(&headers_with_token("tok-2"));
        assert_eq!(session.cookie().as_deref(), Some("SessionID=abc123"));
    }
}
