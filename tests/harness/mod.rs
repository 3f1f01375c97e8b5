//! Test harness shared by the integration tests.
//!
//! Each test binary uses a different subset of these helpers.
#![allow(dead_code)]

mod client;
mod server;

pub use client::{WAIT, open, pump_until, quiet_config, recv_n, recv_one};
pub use server::{Behavior, TestServer};
