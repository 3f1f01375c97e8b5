//! Client side of the HTTP Upgrade handshake (RFC 6455 Section 4).

use std::collections::HashMap;

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use bytes::{Buf, BytesMut};
use sha1::{Digest, Sha1};

use crate::error::{Error, Result};

/// The WebSocket GUID used in the Sec-WebSocket-Accept calculation.
pub const WS_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// Computes the Sec-WebSocket-Accept value for a Sec-WebSocket-Key.
///
/// ```
/// use pollws::protocol::handshake::compute_accept_key;
///
/// let accept = compute_accept_key("dGhlIHNhbXBsZSBub25jZQ==");
/// assert_eq!(accept, "s3pPLMBiTxaQ9kYGzzhZRbK+xOo=");
/// ```
#[must_use]
pub fn compute_accept_key(key: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(key.as_bytes());
    hasher.update(WS_GUID.as_bytes());
    BASE64.encode(hasher.finalize())
}

/// Generate a fresh Sec-WebSocket-Key: 16 random bytes, base64 encoded.
///
/// # Errors
///
/// Returns [`Error::InvalidHandshake`] if the OS random source fails.
pub fn generate_key() -> Result<String> {
    let mut nonce = [0u8; 16];
    getrandom::getrandom(&mut nonce)
        .map_err(|e| Error::InvalidHandshake(format!("cannot generate key: {e}")))?;
    Ok(BASE64.encode(nonce))
}

/// Position just past the blank line ending an HTTP head, if present.
#[must_use]
pub fn find_header_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n").map(|i| i + 4)
}

fn validate_header_value(name: &str, value: &str) -> Result<()> {
    if value.contains(['\r', '\n']) {
        return Err(Error::InvalidHeaderValue(format!(
            "{name} contains CR or LF characters"
        )));
    }
    Ok(())
}

/// Lowercased header names mapped to comma-joined values.
fn parse_headers<'a>(lines: impl Iterator<Item = &'a str>) -> HashMap<String, String> {
    let mut headers: HashMap<String, String> = HashMap::new();
    for line in lines.take_while(|line| !line.is_empty()) {
        if let Some((name, value)) = line.split_once(':') {
            headers
                .entry(name.trim().to_ascii_lowercase())
                .and_modify(|existing| {
                    existing.push_str(", ");
                    existing.push_str(value.trim());
                })
                .or_insert_with(|| value.trim().to_owned());
        }
    }
    headers
}

fn has_token(value: &str, token: &str) -> bool {
    value
        .split(',')
        .any(|part| part.trim().eq_ignore_ascii_case(token))
}

/// Opening handshake request sent by the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeRequest {
    /// Request target, e.g. `/chat?room=1`.
    pub resource: String,
    /// `Host` header value.
    pub host: String,
    /// Sec-WebSocket-Key sent with this request.
    pub key: String,
    pub origin: Option<String>,
    /// Offered subprotocols, in preference order.
    pub protocols: Vec<String>,
    /// Additional headers.
    pub headers: Vec<(String, String)>,
}

impl HandshakeRequest {
    /// Create a request with a freshly generated key.
    ///
    /// # Errors
    ///
    /// See [`generate_key`].
    pub fn new(host: impl Into<String>, resource: impl Into<String>) -> Result<Self> {
        Ok(Self {
            resource: resource.into(),
            host: host.into(),
            key: generate_key()?,
            origin: None,
            protocols: Vec::new(),
            headers: Vec::new(),
        })
    }

    #[must_use]
    pub fn with_origin(mut self, origin: Option<String>) -> Self {
        self.origin = origin;
        self
    }

    #[must_use]
    pub fn with_protocols(mut self, protocols: Vec<String>) -> Self {
        self.protocols = protocols;
        self
    }

    #[must_use]
    pub fn with_headers(mut self, headers: Vec<(String, String)>) -> Self {
        self.headers = headers;
        self
    }

    /// Write the HTTP request to `buf`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidHeaderValue`] if any value contains CR or LF.
    pub fn write(&self, buf: &mut Vec<u8>) -> Result<()> {
        validate_header_value("Request target", &self.resource)?;
        validate_header_value("Host", &self.host)?;

        let mut head = format!(
            "GET {} HTTP/1.1\r\n\
             Host: {}\r\n\
             Upgrade: websocket\r\n\
             Connection: Upgrade\r\n\
             Sec-WebSocket-Key: {}\r\n\
             Sec-WebSocket-Version: 13\r\n",
            self.resource, self.host, self.key
        );
        if let Some(origin) = &self.origin {
            validate_header_value("Origin", origin)?;
            head.push_str(&format!("Origin: {origin}\r\n"));
        }
        if !self.protocols.is_empty() {
            let joined = self.protocols.join(", ");
            validate_header_value("Sec-WebSocket-Protocol", &joined)?;
            head.push_str(&format!("Sec-WebSocket-Protocol: {joined}\r\n"));
        }
        for (name, value) in &self.headers {
            validate_header_value(name, name)?;
            validate_header_value(name, value)?;
            head.push_str(&format!("{name}: {value}\r\n"));
        }
        head.push_str("\r\n");

        buf.extend_from_slice(head.as_bytes());
        Ok(())
    }
}

/// Server's answer to the opening handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeResponse {
    /// HTTP status code.
    pub status: u16,
    /// The Sec-WebSocket-Accept value.
    pub accept: String,
    /// Subprotocol selected by the server.
    pub protocol: Option<String>,
    /// Extensions the server claims to have negotiated.
    pub extensions: Vec<String>,
}

impl HandshakeResponse {
    /// Parse an HTTP response head.
    ///
    /// # Errors
    ///
    /// - [`Error::HandshakeRejected`] for any status other than 101
    /// - [`Error::InvalidHandshake`] for a malformed status line, or missing
    ///   or wrong `Upgrade`, `Connection` or `Sec-WebSocket-Accept` headers
    pub fn parse(data: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(data)
            .map_err(|_| Error::InvalidHandshake("Response is not valid UTF-8".into()))?;
        let mut lines = text.split("\r\n");

        let status_line = lines
            .next()
            .filter(|line| !line.is_empty())
            .ok_or_else(|| Error::InvalidHandshake("Empty response".into()))?;
        let mut parts = status_line.split_whitespace();
        let version = parts.next().unwrap_or_default();
        if !version.starts_with("HTTP/1.") {
            return Err(Error::InvalidHandshake(format!(
                "Invalid status line: {status_line}"
            )));
        }
        let status: u16 = parts
            .next()
            .and_then(|code| code.parse().ok())
            .ok_or_else(|| Error::InvalidHandshake(format!("Invalid status line: {status_line}")))?;
        if status != 101 {
            return Err(Error::HandshakeRejected { status });
        }

        let headers = parse_headers(lines);

        let upgrade = headers
            .get("upgrade")
            .ok_or_else(|| Error::InvalidHandshake("Missing Upgrade header in response".into()))?;
        if !upgrade.eq_ignore_ascii_case("websocket") {
            return Err(Error::InvalidHandshake(format!(
                "Invalid Upgrade header: {upgrade}"
            )));
        }

        let connection = headers.get("connection").ok_or_else(|| {
            Error::InvalidHandshake("Missing Connection header in response".into())
        })?;
        if !has_token(connection, "upgrade") {
            return Err(Error::InvalidHandshake(format!(
                "Invalid Connection header: {connection}"
            )));
        }

        let accept = headers
            .get("sec-websocket-accept")
            .ok_or_else(|| Error::InvalidHandshake("Missing Sec-WebSocket-Accept header".into()))?
            .clone();

        let protocol = headers.get("sec-websocket-protocol").cloned();
        let extensions = headers
            .get("sec-websocket-extensions")
            .map(|e| e.split(',').map(|s| s.trim().to_owned()).collect())
            .unwrap_or_default();

        Ok(Self {
            status,
            accept,
            protocol,
            extensions,
        })
    }

    /// Check this response against the request that produced it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidHandshake`] if the accept key does not match,
    /// the server picked a subprotocol that was not offered, or it claims any
    /// extension (none are ever offered).
    pub fn validate(&self, request: &HandshakeRequest) -> Result<()> {
        let expected = compute_accept_key(&request.key);
        if self.accept != expected {
            return Err(Error::InvalidHandshake(format!(
                "Sec-WebSocket-Accept mismatch: expected {expected}, got {}",
                self.accept
            )));
        }
        if let Some(protocol) = &self.protocol {
            if !request.protocols.iter().any(|p| p == protocol) {
                return Err(Error::InvalidHandshake(format!(
                    "Server selected unoffered subprotocol '{protocol}'"
                )));
            }
        }
        if let Some(extension) = self.extensions.iter().find(|e| !e.is_empty()) {
            return Err(Error::InvalidHandshake(format!(
                "Server negotiated unoffered extension '{extension}'"
            )));
        }
        Ok(())
    }
}

/// Handshake in flight: request bytes still to send and response bytes
/// received so far.
#[derive(Debug)]
pub struct ClientHandshake {
    request: HandshakeRequest,
    outgoing: BytesMut,
    incoming: BytesMut,
    max_size: usize,
}

impl ClientHandshake {
    /// Serialize `request` and prepare to read a response of at most
    /// `max_size` bytes.
    ///
    /// # Errors
    ///
    /// See [`HandshakeRequest::write`].
    pub fn new(request: HandshakeRequest, max_size: usize) -> Result<Self> {
        let mut raw = Vec::new();
        request.write(&mut raw)?;
        Ok(Self {
            request,
            outgoing: BytesMut::from(&raw[..]),
            incoming: BytesMut::new(),
            max_size,
        })
    }

    #[must_use]
    pub fn request(&self) -> &HandshakeRequest {
        &self.request
    }

    /// Request bytes not yet written.
    #[must_use]
    pub fn pending_request(&self) -> &[u8] {
        &self.outgoing
    }

    /// Mark `n` request bytes as written.
    pub fn advance_request(&mut self, n: usize) {
        self.outgoing.advance(n);
    }

    /// Feed response bytes. Returns the validated response once the head is
    /// complete; bytes after the head stay available via [`Self::into_remaining`].
    ///
    /// # Errors
    ///
    /// [`Error::HandshakeTooLarge`] if the head grows past the limit, or any
    /// error from [`HandshakeResponse::parse`] / [`HandshakeResponse::validate`].
    pub fn receive(&mut self, data: &[u8]) -> Result<Option<HandshakeResponse>> {
        // Only the unseen bytes plus three of overlap can hold a new terminator.
        let search_from = self.incoming.len().saturating_sub(3);
        self.incoming.extend_from_slice(data);

        let Some(end) = find_header_end(&self.incoming[search_from..]).map(|n| search_from + n)
        else {
            if self.incoming.len() > self.max_size {
                return Err(Error::HandshakeTooLarge {
                    size: self.incoming.len(),
                    max: self.max_size,
                });
            }
            return Ok(None);
        };
        if end > self.max_size {
            return Err(Error::HandshakeTooLarge {
                size: end,
                max: self.max_size,
            });
        }

        let head = self.incoming.split_to(end);
        let response = HandshakeResponse::parse(&head)?;
        response.validate(&self.request)?;
        Ok(Some(response))
    }

    /// Bytes received after the response head: the start of the frame stream.
    #[must_use]
    pub fn into_remaining(self) -> BytesMut {
        self.incoming
    }
}
