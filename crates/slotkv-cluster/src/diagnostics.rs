//! Per-call diagnostics.
//!
//! A `Diagnostics` value belongs to whoever issues the call and is passed in
//! by mutable reference, so concurrent callers never observe each other's
//! state. The router resets it at the start of every call.

use serde::Serialize;

use crate::error::{ErrorKind, RouterError};

/// Outcome details of the most recent call made with this value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Diagnostics {
    kind: ErrorKind,
    message: String,
    attempts: u32,
}

impl Diagnostics {
    /// Creates an empty diagnostics slot.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn reset(&mut self) {
        self.kind = ErrorKind::Ok;
        self.message.clear();
        self.attempts = 0;
    }

    pub(crate) fn set_attempts(&mut self, attempts: u32) {
        self.attempts = attempts;
    }

    pub(crate) fn record_error(&mut self, err: &RouterError) {
        self.kind = err.kind();
        self.message = err.to_string();
    }

    /// Kind of the last failure, or `ErrorKind::Ok`.
    pub fn last_error_kind(&self) -> ErrorKind {
        self.kind
    }

    /// Human-readable message of the last failure; empty on success.
    pub fn last_error_message(&self) -> &str {
        &self.message
    }

    /// Attempts consumed by the last call.
    pub fn last_attempt_count(&self) -> u32 {
        self.attempts
    }

    /// True when the last call succeeded.
    pub fn is_ok(&self) -> bool {
        self.kind == ErrorKind::Ok
    }
}
