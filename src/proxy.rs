//! Forward-proxy endpoint parsing.
//!
//! A proxy is supplied to the fetch operations as a plain `"host:port"`
//! string. The proxy hop always speaks plain HTTP, regardless of the target
//! URL's scheme; an `https` target is tunnelled through the same proxy.

use std::error::Error;
use std::fmt;
use std::str::FromStr;

/// A forward proxy endpoint parsed from a `"host:port"` string.
///
/// # Example
///
/// ```rust
/// use fetchpool::ProxySpec;
///
/// let proxy: ProxySpec = "10.0.0.1:8080".parse().unwrap();
/// assert_eq!(proxy.host(), "10.0.0.1");
/// assert_eq!(proxy.port(), 8080);
/// assert_eq!(proxy.url(), "http://10.0.0.1:8080");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProxySpec {
    host: String,
    port: u16,
}

impl ProxySpec {
    /// Proxy host name or address.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Proxy TCP port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// The proxy endpoint as a URL, in the form accepted by
    /// [`reqwest::Proxy::all`]. The scheme is always `http`.
    pub fn url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

impl fmt::Display for ProxySpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Error returned when a proxy string is not of the form `"host:port"`
/// with a numeric port.
///
/// A malformed proxy string is a caller configuration defect, not a network
/// condition, so unlike transport failures it is never swallowed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyParseError {
    input: String,
}

impl fmt::Display for ProxyParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid proxy specification '{}': expected \"host:port\" with a numeric port",
            self.input
        )
    }
}

impl Error for ProxyParseError {}

impl FromStr for ProxySpec {
    type Err = ProxyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ProxyParseError {
            input: s.to_string(),
        };

        let mut parts = s.split(':');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(host), Some(port), None) if !host.is_empty() => {
                let port = port.parse::<u16>().map_err(|_| err())?;
                Ok(ProxySpec {
                    host: host.to_string(),
                    port,
                })
            }
            _ => Err(err()),
        }
    }
}
