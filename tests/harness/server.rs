//! WebSocket echo server for integration testing.
//!
//! Runs on its own tokio runtime so the poll-driven client under test can be
//! driven from plain synchronous test code.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::BytesMut;
use pollws::protocol::{Frame, compute_accept_key};
use pollws::{Error, OpCode};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::runtime::Runtime;
use tokio_rustls::TlsAcceptor;

/// How the server treats each connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    /// Echo data frames, answer pings and close frames.
    Echo,
    /// Echo, but never answer a close frame.
    IgnoreClose,
    /// Answer the upgrade with this HTTP status.
    RejectHandshake(u16),
    /// Answer the upgrade with a wrong `Sec-WebSocket-Accept`.
    BadAccept,
    /// Send a continuation frame right after the upgrade.
    OrphanContinuation,
    /// Send a header announcing a 2 GiB frame right after the upgrade.
    OversizedFrame,
    /// Read slowly and never echo data; close frames are still answered.
    SlowSink,
}

/// A server accepting any number of connections on a random local port.
pub struct TestServer {
    addr: SocketAddr,
    secure: bool,
    frames: Arc<Mutex<Vec<Frame>>>,
    _runtime: Runtime,
}

impl TestServer {
    pub fn spawn(behavior: Behavior) -> Self {
        Self::start(behavior, None)
    }

    pub fn spawn_tls(behavior: Behavior, acceptor: TlsAcceptor) -> Self {
        Self::start(behavior, Some(acceptor))
    }

    fn start(behavior: Behavior, acceptor: Option<TlsAcceptor>) -> Self {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
            .unwrap();
        let listener = runtime
            .block_on(TcpListener::bind("127.0.0.1:0"))
            .unwrap();
        let addr = listener.local_addr().unwrap();
        let frames = Arc::new(Mutex::new(Vec::new()));
        let secure = acceptor.is_some();

        let log = Arc::clone(&frames);
        runtime.spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    return;
                };
                let log = Arc::clone(&log);
                let acceptor = acceptor.clone();
                tokio::spawn(async move {
                    match acceptor {
                        Some(acceptor) => {
                            if let Ok(tls) = acceptor.accept(stream).await {
                                let _ = serve(tls, behavior, log).await;
                            }
                        }
                        None => {
                            let _ = serve(stream, behavior, log).await;
                        }
                    }
                });
            }
        });

        Self {
            addr,
            secure,
            frames,
            _runtime: runtime,
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// URL for the given path, with `localhost` as host for TLS servers.
    pub fn url(&self, path: &str) -> String {
        if self.secure {
            format!("wss://localhost:{}{path}", self.addr.port())
        } else {
            format!("ws://{}{path}", self.addr)
        }
    }

    /// Every frame received from clients so far, unmasked.
    pub fn received(&self) -> Vec<Frame> {
        self.frames.lock().unwrap().clone()
    }
}

fn encode(frame: &Frame) -> BytesMut {
    let mut buf = BytesMut::new();
    frame.encode(&mut buf, None);
    buf
}

async fn read_request<S: AsyncRead + Unpin>(stream: &mut S) -> std::io::Result<Option<String>> {
    let mut head = Vec::new();
    let mut byte = [0u8; 1];
    while !head.ends_with(b"\r\n\r\n") {
        if stream.read(&mut byte).await? == 0 {
            return Ok(None);
        }
        head.push(byte[0]);
    }
    Ok(Some(String::from_utf8_lossy(&head).into_owned()))
}

fn header<'a>(head: &'a str, name: &str) -> Option<&'a str> {
    head.lines().find_map(|line| {
        let (key, value) = line.split_once(':')?;
        key.trim().eq_ignore_ascii_case(name).then(|| value.trim())
    })
}

async fn serve<S>(mut stream: S, behavior: Behavior, log: Arc<Mutex<Vec<Frame>>>) -> std::io::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let Some(head) = read_request(&mut stream).await? else {
        return Ok(());
    };
    let key = header(&head, "Sec-WebSocket-Key").unwrap_or_default().to_owned();

    if let Behavior::RejectHandshake(status) = behavior {
        let response = format!("HTTP/1.1 {status} Rejected\r\nContent-Length: 0\r\n\r\n");
        stream.write_all(response.as_bytes()).await?;
        return stream.shutdown().await;
    }

    let accept = if behavior == Behavior::BadAccept {
        compute_accept_key("not-the-client-key")
    } else {
        compute_accept_key(&key)
    };
    let mut response = format!(
        "HTTP/1.1 101 Switching Protocols\r\n\
         Upgrade: websocket\r\n\
         Connection: Upgrade\r\n\
         Sec-WebSocket-Accept: {accept}\r\n"
    );
    if let Some(protocol) = header(&head, "Sec-WebSocket-Protocol") {
        let first = protocol.split(',').next().unwrap_or_default().trim();
        response.push_str(&format!("Sec-WebSocket-Protocol: {first}\r\n"));
    }
    response.push_str("\r\n");
    stream.write_all(response.as_bytes()).await?;

    match behavior {
        Behavior::OrphanContinuation => {
            let frame = Frame::new(true, OpCode::Continuation, b"orphan".to_vec());
            stream.write_all(&encode(&frame)).await?;
        }
        Behavior::OversizedFrame => {
            stream
                .write_all(&[0x82, 127, 0, 0, 0, 0, 0x80, 0, 0, 0])
                .await?;
        }
        _ => {}
    }

    let mut buf = BytesMut::new();
    let mut chunk = vec![0u8; 16 * 1024];
    loop {
        if behavior == Behavior::SlowSink {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Ok(());
        }
        buf.extend_from_slice(&chunk[..n]);

        loop {
            let (frame, used) = match Frame::parse(&buf) {
                Ok(parsed) => parsed,
                Err(Error::IncompleteFrame { .. }) => break,
                Err(_) => return Ok(()),
            };
            let _ = buf.split_to(used);
            log.lock().unwrap().push(frame.clone());

            match frame.opcode {
                OpCode::Ping => {
                    stream.write_all(&encode(&Frame::pong(frame.into_payload()))).await?;
                }
                OpCode::Pong => {}
                OpCode::Close => {
                    if behavior == Behavior::IgnoreClose {
                        continue;
                    }
                    stream.write_all(&encode(&frame)).await?;
                    return stream.shutdown().await;
                }
                OpCode::Text | OpCode::Binary | OpCode::Continuation => {
                    if behavior != Behavior::SlowSink {
                        stream.write_all(&encode(&frame)).await?;
                    }
                }
            }
        }
    }
}
