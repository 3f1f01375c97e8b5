//! Structured error reports.
//!
//! Each failure is captured as an [`ErrorReport`] naming the public operation
//! that failed. Connections keep their most recent report; the calling thread
//! keeps one too, so failures before a connection exists (bad URL, refused
//! connect, TLS setup) are still observable through [`last_error`].

use std::cell::RefCell;
use std::fmt;

use crate::error::{Error, ErrorCategory};

/// Snapshot of a single failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorReport {
    /// Public operation in which the failure surfaced.
    pub function: &'static str,
    /// Classification of the failure.
    pub category: ErrorCategory,
    /// Category-specific numeric detail, see [`Error::code`].
    pub code: i64,
    /// Human-readable description.
    pub description: String,
    /// The error itself.
    pub error: Error,
}

impl ErrorReport {
    /// Build a report for `error` raised inside `function`.
    #[must_use]
    pub fn new(function: &'static str, error: &Error) -> Self {
        Self {
            function,
            category: error.category(),
            code: error.code(),
            description: error.to_string(),
            error: error.clone(),
        }
    }
}

impl fmt::Display for ErrorReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} error ({}): {}",
            self.function, self.category, self.code, self.description
        )
    }
}

thread_local! {
    static LAST_ERROR: RefCell<Option<ErrorReport>> = const { RefCell::new(None) };
}

/// Store `report` as this thread's most recent failure.
pub(crate) fn record(report: ErrorReport) {
    LAST_ERROR.with(|slot| *slot.borrow_mut() = Some(report));
}

/// Record `error` for `function` and hand it back, for use in `map_err`.
pub(crate) fn reported(function: &'static str, error: Error) -> Error {
    record(ErrorReport::new(function, &error));
    error
}

/// The most recent failure raised on the calling thread, by any connection.
#[must_use]
pub fn last_error() -> Option<ErrorReport> {
    LAST_ERROR.with(|slot| slot.borrow().clone())
}

/// Forget the calling thread's most recent failure.
pub fn clear_last_error() {
    LAST_ERROR.with(|slot| slot.borrow_mut().take());
}
