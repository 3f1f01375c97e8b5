use std::fmt;
use std::net::SocketAddr;
use std::time::Instant;

use crate::config::Config;
use crate::connection::fragmenter::{MessageBuilder, OutgoingMessage};
use crate::connection::queue::{RecvQueue, SendQueue, Written};
use crate::connection::{CloseStatus, ConnectionState};
use crate::endpoint::Endpoint;
use crate::error::{Error, ErrorCategory, Result};
use crate::message::{CloseCode, CloseFrame, Message, MessageKind};
use crate::protocol::{
    ClientHandshake, Frame, FrameDecoder, HandshakeRequest, MAX_CONTROL_FRAME_PAYLOAD,
    MessageAssembler, OpCode,
};
use crate::report::{self, ErrorReport};
use crate::stats::Stats;
use crate::transport::{self, Transport};

/// A client WebSocket connection driven by polling.
///
/// Nothing here blocks once the transport is open. The caller queues
/// outbound messages, calls [`update`](Self::update) periodically to move
/// bytes, and picks up inbound messages with [`recv`](Self::recv).
///
/// ## Example
///
/// ```rust,no_run
/// use pollws::{Config, Connection, CloseCode};
///
/// let mut conn = Connection::connect("ws://127.0.0.1:9001/", Config::default())?;
/// conn.send_text("Hello world!")?;
/// while !conn.is_closed() {
///     conn.update()?;
///     if let Some(message) = conn.recv() {
///         println!("received {message:?}");
///         conn.queue_close(CloseCode::Normal, "done")?;
///     }
///     std::thread::sleep(std::time::Duration::from_millis(10));
/// }
/// # Ok::<(), pollws::Error>(())
/// ```
pub struct Connection {
    transport: Box<dyn Transport>,
    endpoint: Endpoint,
    config: Config,
    state: ConnectionState,
    handshake: Option<ClientHandshake>,
    decoder: FrameDecoder,
    assembler: MessageAssembler,
    send_queue: SendQueue,
    /// Completed writes still held inside the transport.
    unflushed: Vec<Written>,
    recv_queue: RecvQueue,
    builder: Option<MessageBuilder>,
    stats: Stats,
    last_error: Option<ErrorReport>,
    close_status: Option<CloseStatus>,
    close_sent: bool,
    close_received: bool,
    local_close: Option<CloseFrame>,
    remote_close: Option<CloseFrame>,
    handshake_deadline: Option<Instant>,
    close_deadline: Option<Instant>,
    next_ping: Option<Instant>,
    ping_deadline: Option<Instant>,
    read_buf: Vec<u8>,
    protocol: Option<String>,
    peer: Option<SocketAddr>,
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("endpoint", &self.endpoint)
            .field("state", &self.state)
            .field("stats", &self.stats)
            .field("close_status", &self.close_status)
            .finish_non_exhaustive()
    }
}

impl Connection {
    /// Open a connection to a `ws://` or `wss://` URL.
    ///
    /// TCP connect and, for `wss://`, the TLS handshake finish before this
    /// returns. The upgrade request is written by the first
    /// [`update`](Self::update).
    ///
    /// # Errors
    ///
    /// [`Error::InvalidUrl`], transport errors for resolution and connect
    /// failures, and TLS errors. The failure is also recorded for
    /// [`last_error`](crate::last_error).
    pub fn connect(url: &str, config: Config) -> Result<Self> {
        let endpoint = Endpoint::parse(url).map_err(|e| report::reported("connect", e))?;
        let transport =
            transport::open(&endpoint, &config).map_err(|e| report::reported("connect", e))?;
        config.log.log(&format!("transport open to {endpoint}"));
        Self::with_transport(transport, &endpoint, config)
    }

    /// Run the engine over an already open transport.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidHeaderValue`] if the configured origin, protocols or
    /// headers cannot be sent, or a failure to generate the handshake key.
    pub fn with_transport(
        transport: impl Transport + 'static,
        endpoint: &Endpoint,
        config: Config,
    ) -> Result<Self> {
        let request = HandshakeRequest::new(endpoint.host_header(), endpoint.resource.clone())
            .map(|request| {
                request
                    .with_origin(config.origin.clone())
                    .with_protocols(config.protocols.clone())
                    .with_headers(config.headers.clone())
            })
            .and_then(|request| ClientHandshake::new(request, config.limits.max_handshake_size))
            .map_err(|e| report::reported("connect", e))?;

        let limits = config.limits;
        let peer = transport.peer_addr();
        Ok(Self {
            transport: Box::new(transport),
            endpoint: endpoint.clone(),
            state: ConnectionState::Connecting,
            handshake: Some(request),
            decoder: FrameDecoder::new(limits),
            assembler: MessageAssembler::new(limits),
            send_queue: SendQueue::new(limits.max_send_queue_size, config.fragment_size),
            unflushed: Vec::new(),
            recv_queue: RecvQueue::default(),
            builder: None,
            stats: Stats::default(),
            last_error: None,
            close_status: None,
            close_sent: false,
            close_received: false,
            local_close: None,
            remote_close: None,
            handshake_deadline: Some(Instant::now() + config.timeouts.handshake),
            close_deadline: None,
            next_ping: None,
            ping_deadline: None,
            read_buf: vec![0; config.read_buffer_size.max(1)],
            protocol: None,
            peer,
            config,
        })
    }

    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// `true` once the connection reached its terminal state.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        !self.state.is_active()
    }

    /// Snapshot of the traffic counters.
    #[must_use]
    pub fn stats(&self) -> Stats {
        self.stats
    }

    /// Most recent failure on this connection.
    #[must_use]
    pub fn last_error(&self) -> Option<&ErrorReport> {
        self.last_error.as_ref()
    }

    /// How the connection ended; `None` while it is still active.
    #[must_use]
    pub fn close_status(&self) -> Option<&CloseStatus> {
        self.close_status.as_ref()
    }

    /// The close frame we sent, if any.
    #[must_use]
    pub fn local_close_frame(&self) -> Option<&CloseFrame> {
        self.local_close.as_ref()
    }

    /// Subprotocol accepted by the server.
    #[must_use]
    pub fn protocol(&self) -> Option<&str> {
        self.protocol.as_deref()
    }

    #[must_use]
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer
    }

    #[must_use]
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Payload bytes accepted by the send queue but not yet written.
    #[must_use]
    pub fn pending_send_bytes(&self) -> usize {
        self.send_queue.queued_bytes()
    }

    /// Whether anything is waiting for the transport.
    #[must_use]
    pub fn has_pending_writes(&self) -> bool {
        self.handshake
            .as_ref()
            .is_some_and(|h| !h.pending_request().is_empty())
            || self.send_queue.has_pending()
            || self.transport.wants_write()
            || !self.unflushed.is_empty()
    }

    /// Drive the connection: write what the transport accepts, read and
    /// process everything available, then apply timeouts.
    ///
    /// # Errors
    ///
    /// The fatal error that closed the connection during this call. The
    /// connection is [`Closed`](ConnectionState::Closed) afterwards and the
    /// error is kept in [`last_error`](Self::last_error). Calling `update` on
    /// a closed connection does nothing.
    pub fn update(&mut self) -> Result<()> {
        if self.is_closed() {
            return Ok(());
        }
        let result = self.pump();
        self.settle("update", result)
    }

    /// Only write pending output.
    ///
    /// # Errors
    ///
    /// As for [`update`](Self::update).
    pub fn update_io_write(&mut self) -> Result<()> {
        if self.is_closed() {
            return Ok(());
        }
        let result = self.flush();
        self.settle("update_io_write", result)
    }

    /// Queue a complete message.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidState`] once a close was requested or received, and
    /// [`Error::QueueFull`] when the message would exceed the send queue
    /// ceiling. Neither closes the connection.
    pub fn send(&mut self, message: Message) -> Result<()> {
        let result = self
            .ensure_can_send("send")
            .and_then(|()| self.send_queue.push_message(OutgoingMessage::from(message)));
        self.settle("send", result)
    }

    /// Queue a text message.
    ///
    /// # Errors
    ///
    /// As for [`send`](Self::send).
    pub fn send_text(&mut self, text: impl Into<String>) -> Result<()> {
        self.send(Message::Text(text.into()))
    }

    /// Queue a binary message.
    ///
    /// # Errors
    ///
    /// As for [`send`](Self::send).
    pub fn send_binary(&mut self, data: impl Into<Vec<u8>>) -> Result<()> {
        self.send(Message::Binary(data.into()))
    }

    /// Queue a ping. The payload is limited to 125 bytes.
    ///
    /// # Errors
    ///
    /// [`Error::Usage`] for an oversized payload, [`Error::InvalidState`]
    /// once closing.
    pub fn send_ping(&mut self, payload: impl Into<Vec<u8>>) -> Result<()> {
        let payload = payload.into();
        let result = self.ensure_can_send("send_ping").and_then(|()| {
            if payload.len() > MAX_CONTROL_FRAME_PAYLOAD {
                return Err(Error::Usage(format!(
                    "ping payload is {} bytes (max: {MAX_CONTROL_FRAME_PAYLOAD})",
                    payload.len()
                )));
            }
            self.send_queue.push_control(Frame::ping(payload));
            Ok(())
        });
        self.settle("send_ping", result)
    }

    /// Start a message streamed in chunks with [`send_append`](Self::send_append).
    ///
    /// # Errors
    ///
    /// [`Error::Usage`] if a streamed message is already in progress,
    /// [`Error::InvalidState`] once closing.
    pub fn send_begin(&mut self, kind: MessageKind) -> Result<()> {
        let result = self.ensure_can_send("send_begin").and_then(|()| {
            if self.builder.is_some() {
                return Err(Error::Usage(
                    "a streamed message is already in progress".into(),
                ));
            }
            self.builder = Some(MessageBuilder::new(kind));
            Ok(())
        });
        self.settle("send_begin", result)
    }

    /// Add a chunk to the streamed message. Each chunk becomes at least one
    /// frame on the wire.
    ///
    /// # Errors
    ///
    /// [`Error::Usage`] without a preceding [`send_begin`](Self::send_begin)
    /// or when a text chunk breaks UTF-8, [`Error::QueueFull`] when the
    /// message no longer fits in the send queue.
    pub fn send_append(&mut self, data: &[u8]) -> Result<()> {
        let result = self.append(data);
        self.settle("send_append", result)
    }

    /// [`send_append`](Self::send_append) for string data.
    ///
    /// # Errors
    ///
    /// As for [`send_append`](Self::send_append).
    pub fn send_append_str(&mut self, data: &str) -> Result<()> {
        self.send_append(data.as_bytes())
    }

    /// Complete the streamed message and queue it.
    ///
    /// # Errors
    ///
    /// [`Error::Usage`] without a preceding [`send_begin`](Self::send_begin)
    /// or if a text message ends mid code point.
    pub fn send_finish(&mut self) -> Result<()> {
        let result = self.finish_message();
        self.settle("send_finish", result)
    }

    /// Take the oldest complete inbound message.
    pub fn recv(&mut self) -> Option<Message> {
        self.recv_queue.pop()
    }

    /// Number of inbound messages waiting.
    #[must_use]
    pub fn recv_pending(&self) -> usize {
        self.recv_queue.len()
    }

    /// Request a clean close.
    ///
    /// The close frame goes out before any queued message that has not
    /// started transmitting; those are discarded. The connection closes once
    /// the peer answers or the close timeout elapses. While still connecting
    /// the transport is dropped at once. Does nothing when already closing.
    ///
    /// # Errors
    ///
    /// [`Error::Usage`] for a code that may not be sent or a reason longer
    /// than 123 bytes.
    pub fn queue_close(&mut self, code: CloseCode, reason: &str) -> Result<()> {
        let result = self.begin_close(code, reason);
        self.settle("queue_close", result)
    }

    fn pump(&mut self) -> Result<()> {
        self.flush()?;
        self.read_available()?;
        self.check_timers(Instant::now())?;
        self.flush()
    }

    fn ensure_can_send(&self, operation: &'static str) -> Result<()> {
        if self.state.can_send() {
            Ok(())
        } else {
            Err(Error::InvalidState {
                operation,
                state: self.state,
            })
        }
    }

    fn append(&mut self, data: &[u8]) -> Result<()> {
        self.ensure_can_send("send_append")?;
        let Some(builder) = self.builder.as_mut() else {
            return Err(Error::Usage("send_append called without send_begin".into()));
        };
        self.send_queue.check_room(builder.len() + data.len())?;
        builder
            .append(data)
            .map_err(|_| Error::Usage("text chunk is not valid UTF-8".into()))
    }

    fn finish_message(&mut self) -> Result<()> {
        self.ensure_can_send("send_finish")?;
        let Some(builder) = self.builder.as_ref() else {
            return Err(Error::Usage("send_finish called without send_begin".into()));
        };
        // The builder stays in place until the message is accepted, so a
        // failed finish can be retried.
        builder
            .check_complete()
            .map_err(|_| Error::Usage("text message ends inside a UTF-8 sequence".into()))?;
        self.send_queue.check_room(builder.len())?;

        let Some(builder) = self.builder.take() else {
            return Ok(());
        };
        self.send_queue.push_message(builder.finish()?)
    }

    fn begin_close(&mut self, code: CloseCode, reason: &str) -> Result<()> {
        match self.state {
            ConnectionState::Connecting => {
                self.log(format_args!("close requested before the upgrade completed"));
                self.shutdown(CloseStatus::Aborted);
                Ok(())
            }
            ConnectionState::Open => {
                let frame = CloseFrame::new(code, reason);
                frame.check_outgoing()?;
                self.log(format_args!("close queued ({})", code.as_u16()));
                self.queue_close_frame(Some(frame.clone()));
                self.local_close = Some(frame);
                self.state = ConnectionState::ClosingLocal;
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn queue_close_frame(&mut self, frame: Option<CloseFrame>) {
        let dropped = self.send_queue.push_close(Frame::close(frame.as_ref()));
        if dropped > 0 {
            self.log(format_args!("discarded {dropped} unsent message(s)"));
        }
        self.builder = None;
        self.close_deadline = Some(Instant::now() + self.config.timeouts.close);
        self.next_ping = None;
        self.ping_deadline = None;
    }

    fn flush(&mut self) -> Result<()> {
        if self.is_closed() {
            return Ok(());
        }
        self.transport.flush()?;
        self.release_written();
        if let Some(handshake) = self.handshake.as_mut() {
            while !handshake.pending_request().is_empty() {
                let n = self.transport.write(handshake.pending_request())?;
                if n == 0 {
                    break;
                }
                handshake.advance_request(n);
            }
            // Frames wait for the upgrade.
            return Ok(());
        }

        while let Some(chunk) = self.send_queue.next_chunk() {
            let n = self.transport.write(chunk)?;
            if n == 0 {
                break;
            }
            if let Some(written) = self.send_queue.consume(n) {
                self.unflushed.push(written);
                self.release_written();
                if self.is_closed() {
                    break;
                }
            }
        }
        Ok(())
    }

    /// Report completed writes once the transport holds none of their bytes.
    fn release_written(&mut self) {
        if self.transport.wants_write() {
            return;
        }
        for written in std::mem::take(&mut self.unflushed) {
            if self.is_closed() {
                break;
            }
            self.on_written(written);
        }
    }

    fn on_written(&mut self, written: Written) {
        match written {
            Written::Message(len) => self.stats.send.record(len),
            Written::Control => {}
            Written::Close => {
                self.close_sent = true;
                if self.close_received {
                    self.shutdown(CloseStatus::Clean(self.remote_close.clone()));
                }
            }
        }
    }

    fn read_available(&mut self) -> Result<()> {
        while !self.is_closed() {
            let n = match self.transport.read(&mut self.read_buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(Error::ConnectionClosed) => return self.on_eof(),
                Err(e) => return Err(e),
            };
            if self.handshake.is_some() {
                self.receive_handshake(n)?;
            } else {
                self.decoder.extend(&self.read_buf[..n]);
                self.process_frames()?;
            }
        }
        Ok(())
    }

    fn receive_handshake(&mut self, n: usize) -> Result<()> {
        let Some(mut handshake) = self.handshake.take() else {
            return Ok(());
        };
        let Some(response) = handshake.receive(&self.read_buf[..n])? else {
            self.handshake = Some(handshake);
            return Ok(());
        };

        self.protocol = response.protocol;
        self.state = ConnectionState::Open;
        self.handshake_deadline = None;
        if let Some(interval) = self.config.timeouts.ping_interval {
            self.next_ping = Some(Instant::now() + interval);
        }
        self.log(format_args!("handshake accepted by {}", self.endpoint));

        let remaining = handshake.into_remaining();
        if !remaining.is_empty() {
            self.decoder.extend(&remaining);
            self.process_frames()?;
        }
        Ok(())
    }

    fn process_frames(&mut self) -> Result<()> {
        while !self.is_closed() {
            let Some(frame) = self.decoder.decode()? else {
                break;
            };
            self.handle_frame(frame)?;
        }
        Ok(())
    }

    fn handle_frame(&mut self, frame: Frame) -> Result<()> {
        match frame.opcode {
            OpCode::Ping => {
                self.send_queue.push_control(Frame::pong(frame.into_payload()));
            }
            OpCode::Pong => self.ping_deadline = None,
            OpCode::Close => self.on_close_frame(&frame)?,
            OpCode::Text | OpCode::Binary | OpCode::Continuation => {
                if !self.state.can_receive() {
                    return Ok(());
                }
                if let Some(message) = self.assembler.push(frame)? {
                    self.stats.recv.record(message.len());
                    self.recv_queue.push(message);
                }
            }
        }
        Ok(())
    }

    fn on_close_frame(&mut self, frame: &Frame) -> Result<()> {
        let close = CloseFrame::from_payload(frame.payload())?;
        match &close {
            Some(c) => self.log(format_args!("close received ({}) {}", c.code.as_u16(), c.reason)),
            None => self.log(format_args!("close received (no status)")),
        }
        self.close_received = true;
        self.remote_close = close;

        match self.state {
            ConnectionState::Open => {
                self.state = ConnectionState::ClosingRemote;
                let echo = self
                    .remote_close
                    .as_ref()
                    .map(|c| CloseFrame::new(c.code, ""));
                self.queue_close_frame(echo);
            }
            ConnectionState::ClosingLocal if self.close_sent => {
                self.shutdown(CloseStatus::Clean(self.remote_close.clone()));
            }
            _ => {}
        }
        Ok(())
    }

    fn on_eof(&mut self) -> Result<()> {
        if self.close_received {
            self.shutdown(CloseStatus::Clean(self.remote_close.clone()));
            return Ok(());
        }
        Err(Error::ConnectionClosed)
    }

    fn check_timers(&mut self, now: Instant) -> Result<()> {
        let expired = |deadline: Option<Instant>| deadline.is_some_and(|d| now >= d);

        match self.state {
            ConnectionState::Connecting if expired(self.handshake_deadline) => {
                Err(Error::HandshakeTimeout(self.config.timeouts.handshake))
            }
            state if state.is_closing() && expired(self.close_deadline) => {
                self.log(format_args!(
                    "close handshake timed out after {:?}",
                    self.config.timeouts.close
                ));
                self.shutdown(CloseStatus::TimedOut);
                Ok(())
            }
            ConnectionState::Open => {
                if expired(self.ping_deadline) {
                    return Err(Error::PingTimeout(self.config.timeouts.ping_timeout));
                }
                if let Some(interval) = self.config.timeouts.ping_interval {
                    if expired(self.next_ping) {
                        self.send_queue.push_control(Frame::ping(Vec::new()));
                        self.ping_deadline
                            .get_or_insert(now + self.config.timeouts.ping_timeout);
                        self.next_ping = Some(now + interval);
                    }
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Record a failed call; fatal errors also tear the connection down.
    fn settle<T>(&mut self, function: &'static str, result: Result<T>) -> Result<T> {
        if let Err(err) = &result {
            self.fail(function, err);
        }
        result
    }

    fn fail(&mut self, function: &'static str, err: &Error) {
        let report = ErrorReport::new(function, err);
        self.log(format_args!("{report}"));
        report::record(report.clone());
        self.last_error = Some(report);

        if !err.is_fatal() || self.is_closed() {
            return;
        }
        if err.category() == ErrorCategory::Protocol && !self.close_sent {
            let close = CloseFrame::new(err.close_code(), "");
            if let Some(bytes) = self.send_queue.encode_immediate(&Frame::close(Some(&close))) {
                // Best effort: the transport is dropped right after.
                let _ = self.transport.write(&bytes);
            }
        }
        self.shutdown(CloseStatus::Failed(err.category()));
    }

    fn shutdown(&mut self, status: CloseStatus) {
        if self.is_closed() {
            return;
        }
        self.transport.close();
        self.state = ConnectionState::Closed;
        self.handshake = None;
        self.builder = None;
        self.send_queue.clear();
        self.unflushed.clear();
        self.assembler.reset();
        self.handshake_deadline = None;
        self.close_deadline = None;
        self.next_ping = None;
        self.ping_deadline = None;
        self.log(format_args!(
            "closed ({status:?}); sent {} message(s) / {} byte(s), received {} message(s) / {} byte(s)",
            self.stats.send.total_messages,
            self.stats.send.total_bytes,
            self.stats.recv.total_messages,
            self.stats.recv.total_bytes,
        ));
        self.close_status = Some(status);
    }

    fn log(&self, args: fmt::Arguments<'_>) {
        self.config.log.log(&args.to_string());
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.transport.close();
    }
}
