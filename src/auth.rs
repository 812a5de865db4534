//! Login credential handling and digest derivation.
//!
//! The WebUI's password_type-4 login never sends the password itself.  The
//! raw password is hashed once when credentials are configured, and each
//! login attempt derives a digest binding that hash to the current
//! verification token:
//!
//! ```text
//! password_hash = base64(hex(sha256(password)))
//! digest        = base64(hex(sha256(username + password_hash + token)))
//! ```

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use sha2::{Digest, Sha256};

/// Login identity for the device's web interface.
///
/// Holds only the derived password hash; the raw password is not retained.
#[derive(Debug, Clone)]
pub struct Credentials {
    username: String,
    password_hash: String,
}

impl Credentials {
    /// Hash `password` and build credentials for `username`.
    pub fn new(username: impl Into<String>, password: &str) -> Self {
        Self {
            username: username.into(),
            password_hash: hash_b64(password),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// The login digest for the given verification token.
    ///
    /// Pure function of the stored identity and `token`; the same inputs
    /// always produce the same digest.
    pub fn login_digest(&self, token: &str) -> String {
        hash_b64(&format!("{}{}{}", self.username, self.password_hash, token))
    }
}

/// base64 of the lowercase hex sha256 digest of `input`.
fn hash_b64(input: &str) -> String {
    BASE64.encode(hex::encode(Sha256::digest(input.as_bytes())))
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADMIN_PW_HASH: &str =
        "OGM2OTc2ZTViNTQxMDQxNWJkZTkwOGJkNGRlZTE1ZGZiMTY3YTljODczZmM0YmI4YTgxZjZmMmFiNDQ4YTkxOA==";

    #[test]
    fn password_is_hashed_at_construction() {
        let creds = Credentials::new("admin", "admin");
        assert_eq!(creds.password_hash, ADMIN_PW_HASH);
    }

    #[test]
    fn digest_matches_known_composition() {
        // sha256("admin" + base64(hex(sha256("admin"))) + "token123")
        let creds = Credentials::new("admin", "admin");
        assert_eq!(
            creds.login_digest("token123"),
            "OThhYTU3NzVhOTliYzZlNTUzOTM5NzM3OGVjMjJmNzZkN2I0NDUwZjM4MTFjN2VlNDI0OWMwZDM2MWU2ZGFkYQ=="
        );
    }

    #[test]
    fn digest_is_deterministic() {
        let a = Credentials::new("admin", "secret").login_digest("tok");
        let b = Credentials::new("admin", "secret").login_digest("tok");
        assert_eq!(a, b);
    }

    #[test]
    fn digest_varies_with_token() {
        let creds = Credentials::new("admin", "secret");
        assert_ne!(creds.login_digest("tok-1"), creds.login_digest("tok-2"));
    }

    #[test]
    fn digest_varies_with_password() {
        let a = Credentials::new("admin", "secret-1").login_digest("tok");
        let b = Credentials::new("admin", "secret-2").login_digest("tok");
        assert_ne!(a, b);
    }
}
