//! Echo client driven by a plain polling loop.
//!
//! Sends a few messages, waits for the echoes, then counts to five once per
//! ten ticks and closes.
//!
//! Run with: `cargo run --example echo_client -- [-v] [url]`
//!
//! When a `cacert.pem` exists in the working directory it is used as the
//! trust store for `wss://` URLs; otherwise the bundled public roots are.

use std::thread;
use std::time::Duration;

use pollws::{CloseCode, Config, Connection, Message, MessageKind};
use tracing_subscriber::EnvFilter;

const DEFAULT_URL: &str = "wss://echo.websocket.org";

fn report_last_error() {
    if let Some(report) = pollws::last_error() {
        eprintln!("{report}");
    }
}

fn build_config(verbose: bool) -> pollws::Result<Config> {
    let mut config = Config::default();
    if verbose {
        config = config.with_log_sink(|line: &str| println!("@@ {line}"));
    }
    #[cfg(feature = "tls-rustls")]
    if std::path::Path::new("cacert.pem").exists() {
        config = config.with_tls(pollws::TlsContext::from_ca_file("cacert.pem")?);
    }
    Ok(config)
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut verbose = false;
    let mut url = DEFAULT_URL.to_string();
    for arg in std::env::args().skip(1) {
        if arg == "-v" {
            verbose = true;
        } else {
            url = arg;
        }
    }

    let config = match build_config(verbose) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("TLS setup failed: {err}");
            report_last_error();
            std::process::exit(1);
        }
    };

    let mut ws = match Connection::connect(&url, config) {
        Ok(ws) => ws,
        Err(err) => {
            eprintln!("connect failed: {err}");
            report_last_error();
            std::process::exit(1);
        }
    };
    if let Some(addr) = ws.peer_addr() {
        println!("Connected to {addr}");
    }

    let queued = ws
        .send_text("Hello world!")
        .and_then(|()| ws.send(Message::text("Test")))
        .and_then(|()| ws.send_begin(MessageKind::Text))
        .and_then(|()| ws.send_append_str("Multi"))
        .and_then(|()| ws.send_append_str("Part"))
        .and_then(|()| ws.send_append_str("Message"))
        .and_then(|()| ws.send_finish());
    if let Err(err) = queued {
        eprintln!("send failed: {err}");
    }

    let mut num_recv = 0usize;
    let mut timer = 0usize;
    let mut counter = 0usize;

    while !ws.is_closed() {
        thread::sleep(Duration::from_millis(10));
        // Failures are reported through `last_error` once the loop ends.
        let _ = ws.update();

        if num_recv >= 3 && counter < 5 {
            if timer % 10 == 0 {
                counter += 1;
                let msg = counter.to_string();
                if verbose {
                    println!("{msg}...");
                }
                let _ = ws.send_text(msg);
                let _ = ws.update_io_write();

                if counter >= 5 {
                    let _ = ws.queue_close(CloseCode::Normal, "");
                }
            }
            timer += 1;
        }

        while let Some(msg) = ws.recv() {
            num_recv += 1;
            if verbose {
                match msg.as_text() {
                    Some(text) => println!("-> {text}"),
                    None => println!("-> <{} bytes>", msg.len()),
                }
            }
        }
    }

    let stats = ws.stats();
    println!(
        "Sent {} messages: {} bytes",
        stats.send.total_messages, stats.send.total_bytes
    );
    println!(
        "Received {} messages: {} bytes",
        stats.recv.total_messages, stats.recv.total_bytes
    );
    if let Some(status) = ws.close_status() {
        println!("Closed: {status:?}");
    }
    report_last_error();
}
