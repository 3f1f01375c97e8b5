//! WebSocket URL parsing.

use std::fmt;
use std::str::FromStr;

use url::{Host, Url};

use crate::error::{Error, Result};

/// Where to connect, derived from a `ws://` or `wss://` URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// `true` for `wss://`.
    pub secure: bool,
    /// Host name or address literal, without IPv6 brackets.
    pub host: String,
    /// TCP port (scheme default when the URL omits it).
    pub port: u16,
    /// Request target: path plus optional query, never empty.
    pub resource: String,
    ipv6: bool,
}

impl Endpoint {
    /// Parse a WebSocket URL.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidUrl`] for unparsable URLs, schemes other than
    /// `ws`/`wss`, missing hosts or URLs carrying a fragment.
    pub fn parse(input: &str) -> Result<Self> {
        let url = Url::parse(input).map_err(|e| Error::InvalidUrl(format!("{input}: {e}")))?;

        let secure = match url.scheme() {
            "ws" => false,
            "wss" => true,
            other => {
                return Err(Error::InvalidUrl(format!(
                    "unsupported scheme '{other}', expected ws or wss"
                )));
            }
        };

        if url.fragment().is_some() {
            return Err(Error::InvalidUrl(
                "WebSocket URLs must not contain a fragment".into(),
            ));
        }

        let (host, ipv6) = match url.host() {
            Some(Host::Domain(domain)) => (domain.to_owned(), false),
            Some(Host::Ipv4(addr)) => (addr.to_string(), false),
            Some(Host::Ipv6(addr)) => (addr.to_string(), true),
            None => return Err(Error::InvalidUrl(format!("{input}: missing host"))),
        };

        let port = url
            .port_or_known_default()
            .unwrap_or(if secure { 443 } else { 80 });

        let mut resource = url.path().to_owned();
        if resource.is_empty() {
            resource.push('/');
        }
        if let Some(query) = url.query() {
            resource.push('?');
            resource.push_str(query);
        }

        Ok(Self {
            secure,
            host,
            port,
            resource,
            ipv6,
        })
    }

    /// Port used when the URL does not name one.
    #[must_use]
    pub const fn default_port(&self) -> u16 {
        if self.secure { 443 } else { 80 }
    }

    /// Value for the HTTP `Host` header.
    ///
    /// The port is omitted when it is the scheme default.
    #[must_use]
    pub fn host_header(&self) -> String {
        let host = if self.ipv6 {
            format!("[{}]", self.host)
        } else {
            self.host.clone()
        };
        if self.port == self.default_port() {
            host
        } else {
            format!("{host}:{}", self.port)
        }
    }
}

impl FromStr for Endpoint {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Endpoint::parse(s)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let scheme = if self.secure { "wss" } else { "ws" };
        let host = if self.ipv6 {
            format!("[{}]", self.host)
        } else {
            self.host.clone()
        };
        write!(f, "{scheme}://{host}:{}{}", self.port, self.resource)
    }
}
