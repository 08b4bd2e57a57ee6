//! Service URL type.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use url::Url;

use crate::error::{Error, InvalidInputError};

/// A validated URL for the CAS server or the warehouse.
///
/// Accepts `http`, `https`, `ws` and `wss` URLs that carry a host. The
/// warehouse session address uses a WebSocket scheme; the CAS server and
/// the warehouse's ticket-redeem endpoint use HTTP.
///
/// # Example
///
/// ```
/// use whtools_core::ServiceUrl;
///
/// let ws = ServiceUrl::new("wss://warehouse.example.org/whtools/websocket").unwrap();
/// assert!(ws.is_websocket());
/// assert_eq!(
///     ws.to_http().unwrap().as_str(),
///     "https://warehouse.example.org/whtools/websocket"
/// );
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ServiceUrl(Url);

impl ServiceUrl {
    /// Create a new service URL from a string, validating the format.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL does not parse, is relative, has no host,
    /// or uses an unsupported scheme.
    pub fn new(s: impl AsRef<str>) -> Result<Self, Error> {
        let s = s.as_ref();
        let url = Url::parse(s).map_err(|e| InvalidInputError::ServiceUrl {
            value: s.to_string(),
            reason: e.to_string(),
        })?;

        Self::validate(&url, s)?;

        Ok(Self(url))
    }

    /// Returns the URL as a string.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Returns the inner URL.
    pub fn as_url(&self) -> &Url {
        &self.0
    }

    /// Returns the host string.
    pub fn host(&self) -> Option<&str> {
        self.0.host_str()
    }

    /// Returns the URL scheme.
    pub fn scheme(&self) -> &str {
        self.0.scheme()
    }

    /// True for `https` and `wss`.
    pub fn is_secure(&self) -> bool {
        matches!(self.0.scheme(), "https" | "wss")
    }

    /// True for `ws` and `wss`.
    pub fn is_websocket(&self) -> bool {
        matches!(self.0.scheme(), "ws" | "wss")
    }

    /// The HTTP form of this URL (`wss` → `https`, `ws` → `http`).
    ///
    /// HTTP URLs are returned unchanged.
    pub fn to_http(&self) -> Result<Self, Error> {
        let scheme = match self.0.scheme() {
            "wss" => "https",
            "ws" => "http",
            _ => return Ok(self.clone()),
        };
        let rest = &self.0.as_str()[self.0.scheme().len()..];
        Self::new(format!("{}{}", scheme, rest))
    }

    /// Append a single path segment, e.g. a ticket id under the CAS tickets
    /// resource.
    pub fn child(&self, segment: &str) -> Result<Self, Error> {
        let base = self.0.as_str().trim_end_matches('/');
        Self::new(format!("{}/{}", base, segment))
    }

    fn validate(url: &Url, original: &str) -> Result<(), Error> {
        if url.cannot_be_a_base() {
            return Err(InvalidInputError::ServiceUrl {
                value: original.to_string(),
                reason: "must be an absolute URL".to_string(),
            }
            .into());
        }

        if !matches!(url.scheme(), "http" | "https" | "ws" | "wss") {
            return Err(InvalidInputError::ServiceUrl {
                value: original.to_string(),
                reason: format!("unsupported scheme '{}'", url.scheme()),
            }
            .into());
        }

        if url.host_str().is_none() {
            return Err(InvalidInputError::ServiceUrl {
                value: original.to_string(),
                reason: "must have a host".to_string(),
            }
            .into());
        }

        Ok(())
    }
}

impl fmt::Display for ServiceUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ServiceUrl {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl Serialize for ServiceUrl {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.0.as_str())
    }
}

impl<'de> Deserialize<'de> for ServiceUrl {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        ServiceUrl::new(&s).map_err(serde::de::Error::custom)
    }
}

impl AsRef<str> for ServiceUrl {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_wss_url() {
        let url = ServiceUrl::new("wss://wh.example.org:8443/ws").unwrap();
        assert_eq!(url.host(), Some("wh.example.org"));
        assert!(url.is_secure());
        assert!(url.is_websocket());
    }

    #[test]
    fn plain_ws_maps_to_http() {
        let url = ServiceUrl::new("ws://127.0.0.1:9000/whtools/websocket").unwrap();
        assert!(!url.is_secure());
        assert_eq!(
            url.to_http().unwrap().as_str(),
            "http://127.0.0.1:9000/whtools/websocket"
        );
    }

    #[test]
    fn http_is_unchanged_by_to_http() {
        let url = ServiceUrl::new("https://cas.example.org/cas/v1/tickets").unwrap();
        assert_eq!(url.to_http().unwrap(), url);
    }

    #[test]
    fn child_appends_segment() {
        let url = ServiceUrl::new("https://cas.example.org/cas/v1/tickets").unwrap();
        assert_eq!(
            url.child("TGT-1-abc").unwrap().as_str(),
            "https://cas.example.org/cas/v1/tickets/TGT-1-abc"
        );

        let trailing = ServiceUrl::new("https://cas.example.org/cas/v1/tickets/").unwrap();
        assert_eq!(
            trailing.child("TGT-1-abc").unwrap().as_str(),
            "https://cas.example.org/cas/v1/tickets/TGT-1-abc"
        );
    }

    #[test]
    fn invalid_relative_url() {
        assert!(ServiceUrl::new("/cas/v1/tickets").is_err());
    }

    #[test]
    fn invalid_scheme() {
        assert!(ServiceUrl::new("ftp://example.org/file").is_err());
        assert!(ServiceUrl::new("file:///tmp/x").is_err());
    }

    #[test]
    fn deserializes_from_string() {
        let url: ServiceUrl = serde_json::from_str("\"wss://wh.example.org/ws\"").unwrap();
        assert_eq!(url.scheme(), "wss");
        assert!(serde_json::from_str::<ServiceUrl>("\"not a url\"").is_err());
    }
}
