//! `wss://` connections against a local TLS echo server.
#![cfg(feature = "tls-rustls")]

mod harness;

use std::io::Write;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use harness::{Behavior, TestServer, WAIT, open, pump_until, quiet_config, recv_one};
use pollws::{CloseCode, Config, Connection, ErrorCategory, Message, TlsContext};
use rcgen::{CertifiedKey, generate_simple_self_signed};
use tempfile::NamedTempFile;
use tokio_rustls::TlsAcceptor;
use tokio_rustls::rustls::ServerConfig;
use tokio_rustls::rustls::crypto::ring;
use tokio_rustls::rustls::pki_types::{CertificateDer, PrivateKeyDer};

/// A self-signed certificate for `localhost` and an acceptor serving it.
fn localhost_acceptor() -> (String, TlsAcceptor) {
    let CertifiedKey { cert, key_pair } =
        generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();

    let cert_der = CertificateDer::from(cert.der().to_vec());
    let key_der = PrivateKeyDer::Pkcs8(key_pair.serialize_der().into());

    let config = ServerConfig::builder_with_provider(Arc::new(ring::default_provider()))
        .with_safe_default_protocol_versions()
        .unwrap()
        .with_no_client_auth()
        .with_single_cert(vec![cert_der], key_der)
        .unwrap();

    (cert.pem(), TlsAcceptor::from(Arc::new(config)))
}

fn ca_file(pem: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(pem.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

fn trusting(pem: &str) -> Config {
    let file = ca_file(pem);
    quiet_config().with_tls(TlsContext::from_ca_file(file.path()).unwrap())
}

#[test]
fn test_secure_echo() {
    let (pem, acceptor) = localhost_acceptor();
    let server = TestServer::spawn_tls(Behavior::Echo, acceptor);
    assert!(server.url("/").starts_with("wss://"));

    let mut conn = open(&server.url("/"), trusting(&pem));
    conn.send_text("Hello world!").unwrap();
    conn.send_binary(vec![7u8; 40_000]).unwrap();

    assert_eq!(recv_one(&mut conn), Some(Message::text("Hello world!")));
    assert_eq!(recv_one(&mut conn), Some(Message::binary(vec![7u8; 40_000])));

    conn.queue_close(CloseCode::Normal, "bye").unwrap();
    assert!(pump_until(&mut conn, |c| c.is_closed()));
    assert!(conn.close_status().unwrap().is_clean());
}

#[test]
fn test_secure_streamed_message() {
    let (pem, acceptor) = localhost_acceptor();
    let server = TestServer::spawn_tls(Behavior::Echo, acceptor);
    let mut conn = open(&server.url("/"), trusting(&pem).with_fragment_size(3));

    conn.send_begin(pollws::MessageKind::Text).unwrap();
    for part in ["Multi", "Part", "Message"] {
        conn.send_append_str(part).unwrap();
    }
    conn.send_finish().unwrap();

    assert_eq!(recv_one(&mut conn), Some(Message::text("MultiPartMessage")));
    assert_eq!(conn.stats().send.total_messages, 1);
}

#[test]
fn test_large_message_reaches_slow_reader() {
    const LEN: usize = 8 * 1024 * 1024;

    let (pem, acceptor) = localhost_acceptor();
    let server = TestServer::spawn_tls(Behavior::SlowSink, acceptor);
    let mut conn = open(&server.url("/"), trusting(&pem));

    let payload: Vec<u8> = (0..LEN).map(|i| (i % 251) as u8).collect();
    conn.send_binary(payload.clone()).unwrap();
    assert!(pump_until(&mut conn, |c| !c.has_pending_writes()));

    let stats = conn.stats();
    assert_eq!(stats.send.total_messages, 1);
    assert_eq!(stats.send.total_bytes, LEN as u64);

    // Nothing is left to queue; plain updates must push out the tail.
    let deadline = Instant::now() + WAIT;
    let delivered = loop {
        conn.update().unwrap();
        let frames = server.received();
        if frames.last().is_some_and(|f| f.fin) {
            break Some(frames.iter().flat_map(|f| f.payload().to_vec()).collect::<Vec<u8>>());
        }
        if Instant::now() >= deadline {
            break None;
        }
        thread::sleep(Duration::from_millis(1));
    };
    let delivered = delivered.expect("message did not fully reach the peer");
    assert_eq!(delivered.len(), LEN);
    assert!(delivered == payload);

    conn.queue_close(CloseCode::Normal, "").unwrap();
    assert!(pump_until(&mut conn, |c| c.is_closed()));
    assert!(conn.close_status().unwrap().is_clean());
}

#[test]
fn test_untrusted_certificate_rejected() {
    let (_pem, acceptor) = localhost_acceptor();
    let server = TestServer::spawn_tls(Behavior::Echo, acceptor);

    pollws::clear_last_error();
    let config = quiet_config().with_tls(TlsContext::with_webpki_roots().unwrap());
    let err = Connection::connect(&server.url("/"), config).unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Tls);

    let report = pollws::last_error().unwrap();
    assert_eq!(report.category, ErrorCategory::Tls);
    assert_eq!(report.function, "connect");
}

#[test]
fn test_default_context_uses_public_roots() {
    let (_pem, acceptor) = localhost_acceptor();
    let server = TestServer::spawn_tls(Behavior::Echo, acceptor);

    let err = Connection::connect(&server.url("/"), quiet_config()).unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Tls);
}

#[test]
fn test_wrong_ca_rejected() {
    let (_pem, acceptor) = localhost_acceptor();
    let server = TestServer::spawn_tls(Behavior::Echo, acceptor);
    let (other_pem, _) = localhost_acceptor();

    let err = Connection::connect(&server.url("/"), trusting(&other_pem)).unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Tls);
}
