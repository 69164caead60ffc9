//! Node identity and the node handle owned by the registry.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use slotkv_transport::Transport;

use crate::error::RouterError;
use crate::pool::{ConnectionPool, PoolConfig};

/// Network identity of a node.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeAddr {
    /// Host name or IP literal.
    pub host: String,
    /// TCP port.
    pub port: u16,
}

impl NodeAddr {
    /// Creates a new address.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for NodeAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl FromStr for NodeAddr {
    type Err = RouterError;

    /// Parses `host:port`, splitting on the last colon and trimming whitespace
    /// around both parts.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (host, port) = s
            .rsplit_once(':')
            .ok_or_else(|| RouterError::InvalidAddress(s.to_string()))?;
        let host = host.trim();
        let port = port
            .trim()
            .parse::<u16>()
            .map_err(|_| RouterError::InvalidAddress(s.to_string()))?;
        if host.is_empty() {
            return Err(RouterError::InvalidAddress(s.to_string()));
        }
        Ok(NodeAddr::new(host, port))
    }
}

/// Stable index of a node inside its [`crate::NodeRegistry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(u32);

impl NodeId {
    /// Largest raw value a live node can carry; `u32::MAX` marks an empty slot.
    pub const MAX: u32 = u32::MAX - 1;

    pub(crate) fn new(index: u32) -> Self {
        NodeId(index)
    }

    /// Id for the node at arena position `index`, or `None` past [`NodeId::MAX`].
    pub(crate) fn from_index(index: usize) -> Option<Self> {
        u32::try_from(index)
            .ok()
            .filter(|raw| *raw <= Self::MAX)
            .map(NodeId)
    }

    /// Returns the underlying index.
    pub fn as_u32(self) -> u32 {
        self.0
    }
}

/// A server node and its connection pool.
///
/// Equality, ordering and hashing use the address only; pool contents never
/// take part in identity.
pub struct Node {
    id: NodeId,
    addr: NodeAddr,
    pool: ConnectionPool,
}

impl Node {
    pub(crate) fn new(
        id: NodeId,
        addr: NodeAddr,
        transport: Arc<dyn Transport>,
        pool_config: PoolConfig,
    ) -> Self {
        let pool = ConnectionPool::new(addr.clone(), transport, pool_config);
        Self { id, addr, pool }
    }

    /// Registry index of this node.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Network identity of this node.
    pub fn addr(&self) -> &NodeAddr {
        &self.addr
    }

    /// Connection pool for this node.
    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("addr", &self.addr.to_string())
            .finish()
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Node{{{}}}", self.addr)
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.addr == other.addr
    }
}

impl Eq for Node {}

impl PartialOrd for Node {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Node {
    fn cmp(&self, other: &Self) -> Ordering {
        self.addr.cmp(&other.addr)
    }
}

impl Hash for Node {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.addr.hash(state);
    }
}
