//! Error taxonomy for the HiLink client.
//!
//! Device-reported failures (`Error::Device`) always take precedence over
//! any other interpretation of a response body.  Transport and decode
//! failures are surfaced as-is; nothing is retried internally.

use reqwest::StatusCode;
use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Connection / timeout failure from the underlying transport.
    #[error("transport: {0}")]
    Transport(#[from] reqwest::Error),
    /// The configured endpoint (or a joined request path) is not a valid URL.
    #[error("invalid endpoint url: {0}")]
    InvalidUrl(String),
    /// The device answered with a non-2xx HTTP status.
    #[error("bad status code: {0}")]
    BadStatusCode(StatusCode),
    /// The response body was not parsable XML.
    #[error("malformed document: {0}")]
    MalformedDocument(String),
    /// The response did not contain exactly one top-level element.
    #[error("missing or multiple root elements")]
    MissingOrMultipleRoot,
    /// A top-level `<error>` element was present but not a mapping.
    #[error("invalid error shape")]
    InvalidErrorShape,
    /// A mapping was expected where a scalar (or nothing) was found.
    #[error("unexpected shape: expected element with children")]
    UnexpectedShape,
    /// Failure reported by the device itself.
    ///
    /// `message` falls back to [`error_message`] when the device omits it.
    #[error("hilink error {code}: {message}")]
    Device { code: String, message: String },
    /// A required field was absent from the decoded response.
    #[error("missing field: {0}")]
    MissingField(String),
    /// A field was present but not the expected scalar string.
    #[error("type mismatch for field: {0}")]
    TypeMismatch(String),
    /// Outgoing SMS content exceeds the protocol's 160-character limit.
    #[error("message too long")]
    MessageTooLong,
    /// The response decoded cleanly but violated a protocol expectation.
    #[error("invalid response: {0}")]
    InvalidResponse(&'static str),
    /// Programmer-error invariant violated (e.g. an odd-length pair list).
    /// Not part of the taxonomy callers are expected to branch on.
    #[error("precondition violated: {0}")]
    PreconditionViolated(&'static str),
}

/// Known HiLink error codes and their meanings.
///
/// The device frequently returns a bare `<code>` with no `<message>`; this
/// table supplies the human-readable text in that case.
pub fn error_message(code: &str) -> &'static str {
    match code.parse::<i32>() {
        Ok(100002) => "not supported by firmware or incorrect API path",
        Ok(100003) => "unauthorized",
        Ok(100004 | 113018) => "system busy",
        Ok(100005 | 103002 | 103015 | 115001) => "unknown error",
        Ok(100006) => "invalid parameter",
        Ok(100009) => "write error",
        Ok(108001) => "invalid username",
        Ok(108002) => "invalid password",
        Ok(108003) => "user already logged in",
        Ok(108006) => "invalid username or password",
        Ok(108007) => "invalid username, password, or session timeout",
        Ok(110024) => "battery charge less than 50%",
        Ok(111019) => "no network response",
        Ok(111020) => "network timeout",
        Ok(111022) => "network not supported",
        Ok(114001 | 114002) => "file already exists",
        Ok(114003) => "SD card currently in use",
        Ok(114004) => "path does not exist",
        Ok(114005) => "path too long",
        Ok(114006) => "no permission for specified file or directory",
        Ok(117001) => "incorrect WiFi password",
        Ok(117004) => "incorrect WISPr password",
        Ok(120001) => "voice busy",
        Ok(125001) => "invalid token",
        _ => "system not available",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_code_resolves_to_table_entry() {
        assert_eq!(error_message("108002"), "invalid password");
        assert_eq!(error_message("125001"), "invalid token");
    }

    #[test]
    fn unknown_code_falls_back_to_generic_entry() {
        assert_eq!(error_message("999999"), "system not available");
    }

    #[test]
    fn non_numeric_code_falls_back_to_generic_entry() {
        assert_eq!(error_message("bogus"), "system not available");
        assert_eq!(error_message(""), "system not available");
    }
}
