//! Helpers for driving a poll-based client from test code.

use std::thread;
use std::time::{Duration, Instant};

use pollws::{Config, Connection, ConnectionState, Message, NoopSink};

/// Upper bound for any single wait in the integration tests.
pub const WAIT: Duration = Duration::from_secs(5);

pub fn quiet_config() -> Config {
    Config::default().with_log_sink(NoopSink)
}

/// Call `update` until `done` holds, the connection closes or [`WAIT`]
/// passes. Returns whether `done` held. Update errors end the wait.
pub fn pump_until(conn: &mut Connection, mut done: impl FnMut(&mut Connection) -> bool) -> bool {
    let deadline = Instant::now() + WAIT;
    while Instant::now() < deadline {
        if done(conn) {
            return true;
        }
        if conn.is_closed() || conn.update().is_err() {
            return done(conn);
        }
        thread::sleep(Duration::from_millis(1));
    }
    done(conn)
}

/// Connect and pump until the upgrade completes.
pub fn open(url: &str, config: Config) -> Connection {
    let mut conn = Connection::connect(url, config).unwrap();
    assert!(
        pump_until(&mut conn, |c| c.state() == ConnectionState::Open),
        "upgrade did not complete: {:?}",
        conn.last_error()
    );
    conn
}

/// Pump until one message arrives.
pub fn recv_one(conn: &mut Connection) -> Option<Message> {
    let mut received = None;
    pump_until(conn, |c| {
        if received.is_none() {
            received = c.recv();
        }
        received.is_some()
    });
    received
}

/// Pump until `count` messages arrived, returning them in order.
pub fn recv_n(conn: &mut Connection, count: usize) -> Vec<Message> {
    let mut received = Vec::with_capacity(count);
    pump_until(conn, |c| {
        while let Some(message) = c.recv() {
            received.push(message);
        }
        received.len() >= count
    });
    received
}
