//! Client for the Huawei HiLink web management API.
//!
//! HiLink routers expose an HTTP/XML control interface guarded by a rotating
//! CSRF-style verification token bound to a session cookie.  This crate
//! implements the session engine underneath that interface: bootstrap and
//! token rotation, the password_type-4 login handshake, strictly serialized
//! request execution, and an order-preserving XML codec (the device's parser
//! is order-sensitive and several endpoints repeat field names).
//!
//! ```no_run
//! use hilink::{Client, ClientConfig, Credentials};
//!
//! # async fn run() -> hilink::Result<()> {
//! let client = Client::new(ClientConfig {
//!     url: "http://192.168.8.1/".to_owned(),
//!     credentials: Some(Credentials::new("admin", "admin")),
//!     ..ClientConfig::default()
//! })?;
//!
//! let info = client.device_info().await?;
//! println!("{:?}", info.get("DeviceName"));
//! client.sms_send("hello", &["+15551234567"]).await?;
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

pub mod api;
mod auth;
mod client;
mod error;
mod session;
mod xml;

pub use api::{PinType, SMS_MAX_LEN, SmsBoxType, UssdState};
pub use auth::Credentials;
pub use client::{Client, ClientConfig};
pub use error::{Error, Result, error_message};
pub use session::Session;
pub use xml::{FieldValue, Fields, RequestBody, XmlMap, XmlValue};

/// Default URL endpoint for the HiLink WebUI.
pub const DEFAULT_URL: &str = "http://192.168.8.1/";

/// Default transport timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Header carrying the rotating CSRF verification token.
pub const TOKEN_HEADER: &str = "__RequestVerificationToken";

/// Header carrying the replacement token issued by the login exchange.
pub const LOGIN_TOKEN_HEADER: &str = "__RequestVerificationTokenone";
