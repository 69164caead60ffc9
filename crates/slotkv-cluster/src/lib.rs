#![warn(missing_docs)]

//! slotkv cluster subsystem: client-side slot routing for a sharded key-value store.
//!
//! Keys hash to one of [`HASH_SLOTS`] slots; each slot is owned by a node that
//! can change at runtime (resharding, failover). The [`Router`] keeps a slot
//! map and a registry of nodes with one connection pool each, follows
//! `MOVED`/`ASK` redirects, and retries a call a bounded number of times.

pub mod command;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod hash;
pub mod metrics;
pub mod node;
pub mod pool;
pub mod redirect;
pub mod registry;
pub mod router;
pub mod slots;
pub mod topology;

pub use command::{Command, UNSUPPORTED_COMMANDS};
pub use config::{RouterConfig, DEFAULT_MAX_TTL};
pub use diagnostics::Diagnostics;
pub use error::{ErrorKind, Result, RouterError};
pub use hash::{crc16, hash_tag, key_slot, HASH_SLOTS};
pub use metrics::{MetricsSnapshot, RouterMetrics};
pub use node::{Node, NodeAddr, NodeId};
pub use pool::{ConnectionPool, PoolConfig, PoolStats};
pub use redirect::{parse_redirect, Redirect, RedirectKind};
pub use registry::NodeRegistry;
pub use router::Router;
pub use slots::SlotMap;
pub use topology::{parse_topology, topology_command, SlotRange};

pub use slotkv_transport::{Connection, Reply, ReplyKind, Transport, TransportError};
