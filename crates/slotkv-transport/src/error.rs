//! Error types for the slotkv transport layer.

use thiserror::Error;

/// Failures surfaced by a [`crate::Transport`] or [`crate::Connection`].
#[derive(Debug, Error)]
pub enum TransportError {
    /// The peer actively refused the connection.
    #[error("connection refused to {addr}")]
    ConnectionRefused {
        /// Address that refused.
        addr: String,
    },

    /// Connection establishment did not finish in time.
    #[error("connection timeout after {timeout_ms}ms to {addr}")]
    ConnectionTimeout {
        /// Address being dialled.
        addr: String,
        /// Configured timeout.
        timeout_ms: u64,
    },

    /// The peer closed the stream, possibly in the middle of a reply.
    #[error("connection reset by peer")]
    ConnectionReset,

    /// No complete reply arrived before the read deadline.
    #[error("read timeout after {timeout_ms}ms from {addr}")]
    ReadTimeout {
        /// Peer address.
        addr: String,
        /// Configured timeout.
        timeout_ms: u64,
    },

    /// The connection already failed and can no longer carry requests.
    #[error("connection is broken")]
    Broken,

    /// The byte stream did not follow RESP framing.
    #[error("protocol error: {reason}")]
    Protocol {
        /// What was wrong with the stream.
        reason: String,
    },

    /// Underlying socket error.
    #[error(transparent)]
    IoError(#[from] std::io::Error),
}

impl TransportError {
    pub(crate) fn protocol(reason: impl Into<String>) -> Self {
        TransportError::Protocol {
            reason: reason.into(),
        }
    }
}

/// Result alias for transport operations.
pub type Result<T> = std::result::Result<T, TransportError>;
