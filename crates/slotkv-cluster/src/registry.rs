//! Deduplicated set of known nodes.
//!
//! The registry is the only owner of [`Node`] values. Nodes are appended and
//! never removed while the registry lives, so a [`NodeId`] handed out once
//! stays valid for the registry's lifetime. The slot map stores those ids.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use parking_lot::RwLock;
use rand::Rng;
use slotkv_transport::Transport;
use tracing::{debug, warn};

use crate::error::{Result, RouterError};
use crate::node::{Node, NodeAddr, NodeId};
use crate::pool::{PoolConfig, PoolStats};

#[derive(Default)]
struct RegistryInner {
    nodes: Vec<Arc<Node>>,
    by_addr: BTreeMap<NodeAddr, NodeId>,
}

/// Thread-safe registry of nodes keyed by `(host, port)`.
pub struct NodeRegistry {
    transport: Arc<dyn Transport>,
    pool_config: PoolConfig,
    max_nodes: usize,
    inner: RwLock<RegistryInner>,
}

impl NodeRegistry {
    /// Creates an empty registry whose nodes connect through `transport`.
    pub fn new(transport: Arc<dyn Transport>, pool_config: PoolConfig) -> Self {
        Self::with_max_nodes(transport, pool_config, NodeId::MAX as usize + 1)
    }

    pub(crate) fn with_max_nodes(
        transport: Arc<dyn Transport>,
        pool_config: PoolConfig,
        max_nodes: usize,
    ) -> Self {
        Self {
            transport,
            pool_config,
            max_nodes,
            inner: RwLock::new(RegistryInner::default()),
        }
    }

    /// Parses a comma-separated `host:port` list.
    ///
    /// Whitespace around hosts, ports and separators is ignored. Entries
    /// without a colon, with an empty host or with an invalid port are skipped.
    pub fn parse_seeds(seeds: &str) -> Vec<NodeAddr> {
        seeds
            .split(',')
            .filter_map(|entry| {
                let entry = entry.trim();
                if entry.is_empty() {
                    return None;
                }
                match entry.parse::<NodeAddr>() {
                    Ok(addr) => Some(addr),
                    Err(_) => {
                        debug!(entry = entry, "skipping malformed seed entry");
                        None
                    }
                }
            })
            .collect()
    }

    /// Seeds the registry from a startup string and returns the number of
    /// distinct addresses it named.
    pub fn parse_and_seed(&self, seeds: &str) -> usize {
        let distinct: BTreeSet<NodeAddr> = Self::parse_seeds(seeds).into_iter().collect();
        let mut known = 0;
        for addr in &distinct {
            match self.get_or_insert(&addr.host, addr.port) {
                Ok((node, true)) => debug!(node = %node, "seed node added"),
                Ok((node, false)) => debug!(node = %node, "duplicate seed node ignored"),
                Err(e) => {
                    warn!(addr = %addr, error = %e, "seed node not added");
                    continue;
                }
            }
            known += 1;
        }
        known
    }

    /// Returns the node for `(host, port)`, creating it if unknown.
    ///
    /// The boolean is true when this call inserted the node. Fails with
    /// [`RouterError::RegistryFull`] once no further [`NodeId`] can be issued.
    pub fn get_or_insert(&self, host: &str, port: u16) -> Result<(Arc<Node>, bool)> {
        let addr = NodeAddr::new(host, port);
        if let Some(node) = self.find(&addr) {
            return Ok((node, false));
        }

        let mut inner = self.inner.write();
        if let Some(id) = inner.by_addr.get(&addr) {
            return Ok((inner.nodes[id.as_u32() as usize].clone(), false));
        }
        let id = Some(inner.nodes.len())
            .filter(|index| *index < self.max_nodes)
            .and_then(NodeId::from_index)
            .ok_or(RouterError::RegistryFull {
                capacity: self.max_nodes,
            })?;
        let node = Arc::new(Node::new(
            id,
            addr.clone(),
            self.transport.clone(),
            self.pool_config.clone(),
        ));
        inner.nodes.push(node.clone());
        inner.by_addr.insert(addr, id);
        Ok((node, true))
    }

    /// Looks a node up by address.
    pub fn find(&self, addr: &NodeAddr) -> Option<Arc<Node>> {
        let inner = self.inner.read();
        inner
            .by_addr
            .get(addr)
            .map(|id| inner.nodes[id.as_u32() as usize].clone())
    }

    /// Looks a node up by registry index.
    pub fn get(&self, id: NodeId) -> Option<Arc<Node>> {
        self.inner.read().nodes.get(id.as_u32() as usize).cloned()
    }

    /// Picks a node starting from a random position, skipping `excluding`.
    ///
    /// Returns `None` when the registry is empty or holds only the excluded node.
    pub fn random_node(&self, excluding: Option<NodeId>) -> Option<Arc<Node>> {
        let inner = self.inner.read();
        let len = inner.nodes.len();
        if len == 0 {
            return None;
        }
        let start = rand::thread_rng().gen_range(0..len);
        (0..len)
            .map(|offset| &inner.nodes[(start + offset) % len])
            .find(|node| Some(node.id()) != excluding)
            .cloned()
    }

    /// All nodes in insertion order.
    pub fn snapshot(&self) -> Vec<Arc<Node>> {
        self.inner.read().nodes.clone()
    }

    /// Number of known nodes.
    pub fn len(&self) -> usize {
        self.inner.read().nodes.len()
    }

    /// True when no node is known.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Pool counters for every node.
    pub fn pool_stats(&self) -> Vec<(NodeAddr, PoolStats)> {
        self.snapshot()
            .iter()
            .map(|node| (node.addr().clone(), node.pool().stats()))
            .collect()
    }
}

impl std::fmt::Debug for NodeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeRegistry")
            .field("nodes", &self.len())
            .finish()
    }
}
