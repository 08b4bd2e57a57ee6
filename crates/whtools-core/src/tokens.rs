//! Session credential obtained from the CAS exchange.

use std::fmt;

/// Name of the cookie carrying the warehouse session id.
pub const SESSION_COOKIE: &str = "JSESSIONID";

/// The warehouse session credential (`JSESSIONID` cookie value).
///
/// A session id is valid for a single connection attempt. It may be empty
/// when the warehouse accepted the service ticket without setting the
/// cookie; callers decide whether to proceed.
///
/// # Security
///
/// - Never logged or displayed in Debug output
/// - Treat as opaque; do not parse or inspect
#[derive(Clone, PartialEq, Eq)]
pub struct SessionId(String);

impl SessionId {
    /// Wrap a session id value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the raw value for use in a `Cookie` header.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when the warehouse did not hand out a session cookie.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Render as a `Cookie` header value.
    pub fn cookie_header(&self) -> String {
        format!("{}={}", SESSION_COOKIE, self.0)
    }
}

impl fmt::Debug for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SessionId").field(&"[REDACTED]").finish()
    }
}
