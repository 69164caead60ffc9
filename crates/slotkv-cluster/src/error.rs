//! Error types for slot routing.

use serde::{Deserialize, Serialize};
use slotkv_transport::TransportError;
use thiserror::Error;

/// Coarse classification of a routing failure, as reported by [`crate::Diagnostics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ErrorKind {
    /// The last call succeeded (possibly with an application-level error reply).
    #[default]
    Ok,
    /// Denylisted or key-less command.
    CommandNotSupported,
    /// No owner cached for the slot and random fallback is disabled.
    SlotMissedAndNoFallback,
    /// Connectivity failure, including "no node available".
    Io,
    /// All attempts were consumed without a definitive answer.
    TtlExceeded,
    /// Seed list or configuration could not be turned into a working router.
    Setup,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::Ok => "ok",
            ErrorKind::CommandNotSupported => "command not supported",
            ErrorKind::SlotMissedAndNoFallback => "slot missed",
            ErrorKind::Io => "io",
            ErrorKind::TtlExceeded => "ttl exceeded",
            ErrorKind::Setup => "setup",
        };
        f.write_str(name)
    }
}

/// Routing and setup failures.
///
/// Application errors returned by the store itself are not represented here;
/// they come back as a successful call carrying a `Reply::Error`.
#[derive(Debug, Error)]
pub enum RouterError {
    /// Denylisted command or fewer than two tokens.
    #[error("{0}")]
    CommandNotSupported(String),

    /// Slot owner unknown and random fallback disabled.
    #[error("slot {slot} has no cached owner and random fallback is disabled")]
    SlotMissedAndNoFallback {
        /// Slot that missed.
        slot: u16,
    },

    /// Random fallback found no candidate node.
    #[error("no available node for slot {slot}")]
    NoAvailableNode {
        /// Slot being routed.
        slot: u16,
    },

    /// No known node answered the topology query.
    #[error("topology unavailable: none of {tried} nodes answered")]
    TopologyUnavailable {
        /// Number of nodes queried.
        tried: usize,
        /// Transport failure from the last node tried, if it failed at that level.
        #[source]
        last: Option<TransportError>,
    },

    /// No further node ids can be issued.
    #[error("node registry full ({capacity} nodes)")]
    RegistryFull {
        /// Maximum number of nodes.
        capacity: usize,
    },

    /// Every attempt failed or was redirected.
    #[error("max ttl exceeded after {attempts} attempts")]
    TtlExceeded {
        /// Attempts consumed.
        attempts: u32,
    },

    /// Seed list unusable or the required initial topology load failed.
    #[error("setup failed: {0}")]
    Setup(String),

    /// Configuration rejected.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A `host:port` string could not be parsed.
    #[error("invalid node address {0:?}")]
    InvalidAddress(String),
}

impl RouterError {
    /// Maps this error to its diagnostic kind.
    pub fn kind(&self) -> ErrorKind {
        match self {
            RouterError::CommandNotSupported(_) => ErrorKind::CommandNotSupported,
            RouterError::SlotMissedAndNoFallback { .. } => ErrorKind::SlotMissedAndNoFallback,
            RouterError::NoAvailableNode { .. } | RouterError::TopologyUnavailable { .. } => {
                ErrorKind::Io
            }
            RouterError::TtlExceeded { .. } => ErrorKind::TtlExceeded,
            RouterError::Setup(_)
            | RouterError::Config(_)
            | RouterError::InvalidAddress(_)
            | RouterError::RegistryFull { .. } => ErrorKind::Setup,
        }
    }
}

/// Result alias for routing operations.
pub type Result<T> = std::result::Result<T, RouterError>;
