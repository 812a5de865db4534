//! The HiLink request engine and authentication handshake.
//!
//! One [`Client`] owns one device session: the rotating verification token
//! and the `SessionID` cookie.  Every exchange — bootstrap, login, and every
//! ordinary request — runs under a single async mutex, because the device
//! rejects requests carrying a token that a concurrent exchange has already
//! superseded.  Independent `Client` instances are fully independent.
//!
//! # Session lifecycle
//! 1. First use: GET `api/webserver/SesTokInfo`, install the initial
//!    (session, token) pair.
//! 2. If credentials are configured: POST `api/user/login` with the
//!    token-bound digest; the response's distinct token header and
//!    `Set-Cookie` replace the pair.
//! 3. Every response thereafter may rotate the token via the
//!    `__RequestVerificationToken` header.

use std::time::Duration;

use reqwest::Url;
use reqwest::header::{CONTENT_TYPE, COOKIE, HeaderMap, SET_COOKIE};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::auth::Credentials;
use crate::error::{Error, Result};
use crate::session::{SESSION_COOKIE, Session};
use crate::xml::{self, Fields, RequestBody, XmlMap};
use crate::{DEFAULT_TIMEOUT, DEFAULT_URL, LOGIN_TOKEN_HEADER, TOKEN_HEADER};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Configuration for a [`Client`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the device's web interface, e.g. `http://192.168.8.1/`.
    pub url: String,
    /// Transport timeout applied to every request.
    pub timeout: Duration,
    /// Login credentials; `None` skips the login handshake entirely.
    pub credentials: Option<Credentials>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_owned(),
            timeout: DEFAULT_TIMEOUT,
            credentials: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct State {
    session: Session,
    /// Set once the bootstrap (and login, when configured) has completed.
    started: bool,
}

/// A stateful client for one HiLink device.
///
/// Endpoint wrappers drive the three classified entry points ([`Self::data`],
/// [`Self::check_ok`], [`Self::text`]) and perform no XML handling of their
/// own.  The session is established lazily on first use.
#[derive(Debug)]
pub struct Client {
    base: Url,
    http: reqwest::Client,
    credentials: Option<Credentials>,
    state: Mutex<State>,
}

impl Client {
    /// Build a client from `config`.  No network I/O happens here; the
    /// session bootstrap runs lazily on the first request.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let mut raw = config.url;
        if !raw.ends_with('/') {
            raw.push('/');
        }
        let base = Url::parse(&raw).map_err(|e| Error::InvalidUrl(format!("{raw}: {e}")))?;

        let http = reqwest::Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            base,
            http,
            credentials: config.credentials,
            state: Mutex::new(State {
                session: Session::new(),
                started: false,
            }),
        })
    }

    /// Client for the default endpoint with no credentials.
    pub fn with_defaults() -> Result<Self> {
        Self::new(ClientConfig::default())
    }

    // -- classified entry points -------------------------------------------

    /// Execute an operation returning structured data: the single root
    /// element's children, in document order.
    pub async fn data(&self, path: &str, body: Option<RequestBody>) -> Result<XmlMap> {
        let mut state = self.state.lock().await;
        self.ensure_started(&mut state).await?;
        let (_, buf) = self.exchange(&mut state.session, path, body).await?;
        let (_, children) = xml::decode_element(&buf)?;
        Ok(children)
    }

    /// Execute an operation whose result is the boolean `<response>OK</response>`
    /// envelope.  Any other literal content yields `false`, never an error.
    pub async fn check_ok(&self, path: &str, body: Option<RequestBody>) -> Result<bool> {
        let mut state = self.state.lock().await;
        self.ensure_started(&mut state).await?;
        let (_, buf) = self.exchange(&mut state.session, path, body).await?;
        let tree = xml::decode_tree(&buf)?;
        Ok(tree.require_str("response")? == "OK")
    }

    /// Execute a data operation and extract the child `name` as a string.
    pub async fn text(&self, path: &str, body: Option<RequestBody>, name: &str) -> Result<String> {
        let mut state = self.state.lock().await;
        self.ensure_started(&mut state).await?;
        let (_, buf) = self.exchange(&mut state.session, path, body).await?;
        let (_, children) = xml::decode_element(&buf)?;
        Ok(children.require_str(name)?.to_owned())
    }

    /// Establish the session (bootstrap + optional login) without issuing
    /// any feature request.  A no-op when already established.
    pub async fn ensure_session(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        self.ensure_started(&mut state).await
    }

    // -- session establishment ---------------------------------------------

    async fn ensure_started(&self, state: &mut State) -> Result<()> {
        if state.started {
            return Ok(());
        }
        self.bootstrap(&mut state.session).await?;
        if let Some(creds) = &self.credentials {
            self.login(&mut state.session, creds).await?;
        }
        state.started = true;
        Ok(())
    }

    /// Initial unauthenticated exchange: fetch the session cookie and the
    /// first verification token.
    async fn bootstrap(&self, session: &mut Session) -> Result<()> {
        let (_, buf) = self
            .exchange(session, "api/webserver/SesTokInfo", None)
            .await?;
        let (_, fields) = xml::decode_element(&buf)?;

        let ses_info = fields
            .get("SesInfo")
            .and_then(xml::XmlValue::as_str)
            .ok_or(Error::InvalidResponse("SesInfo missing or not a string"))?;
        let token = fields
            .get("TokInfo")
            .and_then(xml::XmlValue::as_str)
            .ok_or(Error::InvalidResponse("TokInfo missing or not a string"))?;
        let session_id = ses_info
            .strip_prefix("SessionID=")
            .ok_or(Error::InvalidResponse("SesInfo is not a SessionID cookie"))?;

        session.establish(session_id, token);
        info!("session bootstrapped");
        Ok(())
    }

    /// The password_type-4 login exchange.
    ///
    /// On success the response carries a replacement token in a distinct
    /// header plus a fresh `SessionID` cookie; both are installed together.
    async fn login(&self, session: &mut Session, creds: &Credentials) -> Result<()> {
        let token = session
            .token()
            .ok_or(Error::InvalidResponse("no verification token for login"))?;
        let digest = creds.login_digest(token);

        let body = Fields::new()
            .field("Username", creds.username())
            .field("Password", digest)
            .field("password_type", "4");
        let (headers, buf) = self
            .exchange(session, "api/user/login", Some(body.into()))
            .await?;

        let tree = xml::decode_tree(&buf)?;
        if tree.require_str("response")? != "OK" {
            return Err(Error::InvalidResponse("login rejected"));
        }

        let token = headers
            .get(LOGIN_TOKEN_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|t| !t.is_empty())
            .ok_or(Error::InvalidResponse("login response missing token header"))?;
        let session_id = headers
            .get(SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .and_then(session_id_from_set_cookie)
            .ok_or(Error::InvalidResponse("login response missing session cookie"))?;

        session.establish(session_id, token);
        info!(user = creds.username(), "logged in");
        Ok(())
    }

    // -- the serialized exchange -------------------------------------------

    /// Perform one HTTP exchange.  Callers hold the state mutex, so token
    /// rotation is strictly ordered across exchanges.
    ///
    /// The response headers are observed for a rotated token *before* the
    /// body is read, so a body that fails to decode still advances the token.
    async fn exchange(
        &self,
        session: &mut Session,
        path: &str,
        body: Option<RequestBody>,
    ) -> Result<(HeaderMap, Vec<u8>)> {
        let url = self
            .base
            .join(path)
            .map_err(|e| Error::InvalidUrl(format!("{path}: {e}")))?;

        // Absent body: read-only GET.  Present body: POST carrying the
        // current verification token.
        let mut req = match body {
            None => self.http.get(url),
            Some(body) => {
                let mut req = self
                    .http
                    .post(url)
                    .header(
                        CONTENT_TYPE,
                        "application/x-www-form-urlencoded; charset=UTF-8",
                    )
                    .body(body.into_bytes());
                if let Some(token) = session.token() {
                    req = req.header(TOKEN_HEADER, token);
                }
                req
            }
        };
        if let Some(cookie) = session.cookie() {
            req = req.header(COOKIE, cookie);
        }

        debug!(path, "dispatching request");
        let res = req.send().await?;

        let status = res.status();
        if !status.is_success() {
            return Err(Error::BadStatusCode(status));
        }

        let headers = res.headers().clone();
        session.observe(&headers);

        let buf = res.bytes().await?;
        debug!(path, len = buf.len(), "response received");
        Ok((headers, buf.to_vec()))
    }
}

/// Extract the session identifier from a `Set-Cookie` header value like
/// `SessionID=abc123; path=/; HttpOnly`.
fn session_id_from_set_cookie(value: &str) -> Option<String> {
    let first = value.split(';').next()?.trim();
    first
        .strip_prefix(SESSION_COOKIE)?
        .strip_prefix('=')
        .map(str::to_owned)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_cookie_value_is_extracted() {
        let id = session_id_from_set_cookie("SessionID=abc123; path=/; HttpOnly");
        assert_eq!(id.as_deref(), Some("abc123"));
    }

    #[test]
    fn set_cookie_without_attributes() {
        let id = session_id_from_set_cookie("SessionID=xyz");
        assert_eq!(id.as_deref(), Some("xyz"));
    }

    #[test]
    fn unrelated_cookie_is_rejected() {
        assert_eq!(session_id_from_set_cookie("Other=1; path=/"), None);
    }

    #[test]
    fn config_defaults() {
        let cfg = ClientConfig::default();
        assert_eq!(cfg.url, DEFAULT_URL);
        assert_eq!(cfg.timeout, DEFAULT_TIMEOUT);
        assert!(cfg.credentials.is_none());
    }

    #[test]
    fn base_url_gains_trailing_slash() {
        let client = Client::new(ClientConfig {
            url: "http://192.168.8.1".to_owned(),
            ..ClientConfig::default()
        })
        .unwrap();
        assert_eq!(client.base.as_str(), "http://192.168.8.1/");
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        let err = Client::new(ClientConfig {
            url: "not a url".to_owned(),
            ..ClientConfig::default()
        })
        .unwrap_err();
        assert!(matches!(err, Error::InvalidUrl(_)));
    }
}
