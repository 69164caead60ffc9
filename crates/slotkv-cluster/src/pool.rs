//! Per-node connection pool.
//!
//! Each node owns one pool guarded by its own lock, so pools for different
//! nodes never contend. The lock covers only the idle list and counters;
//! connection establishment happens outside it.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use slotkv_transport::{Connection, Transport};
use tracing::debug;

use crate::node::NodeAddr;

/// Configuration for a node's connection pool.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Upper bound on connection establishment (`None` defers to the transport default).
    pub connect_timeout: Option<Duration>,
    /// Maximum idle connections kept per node (`None` = unbounded).
    pub max_idle: Option<usize>,
}

/// Counters for one pool. Observability only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStats {
    /// Connections currently idle in the pool.
    pub idle: usize,
    /// Connections established by this pool.
    pub created: u64,
    /// Acquisitions served from the idle list.
    pub reused: u64,
    /// Successful acquisitions.
    pub acquired: u64,
    /// Connections returned to the idle list.
    pub released: u64,
    /// Connections dropped as broken or over the idle limit.
    pub discarded: u64,
}

struct PoolInner {
    idle: VecDeque<Box<dyn Connection>>,
    stats: PoolStats,
}

/// Idle connections to one `(host, port)` endpoint.
pub struct ConnectionPool {
    addr: NodeAddr,
    transport: Arc<dyn Transport>,
    config: PoolConfig,
    inner: Mutex<PoolInner>,
}

impl ConnectionPool {
    /// Creates an empty pool for `addr`.
    pub fn new(addr: NodeAddr, transport: Arc<dyn Transport>, config: PoolConfig) -> Self {
        Self {
            addr,
            transport,
            config,
            inner: Mutex::new(PoolInner {
                idle: VecDeque::new(),
                stats: PoolStats::default(),
            }),
        }
    }

    /// Takes a live connection, connecting a fresh one when no idle one is usable.
    ///
    /// Idle connections already in an error state are dropped on the way. A
    /// failed connect is returned to the caller as-is; the pool never retries.
    pub async fn acquire(&self) -> slotkv_transport::Result<Box<dyn Connection>> {
        {
            let mut inner = self.inner.lock();
            while let Some(conn) = inner.idle.pop_front() {
                if conn.is_broken() {
                    inner.stats.discarded += 1;
                    debug!(addr = %self.addr, "dropping broken idle connection");
                    continue;
                }
                inner.stats.reused += 1;
                inner.stats.acquired += 1;
                return Ok(conn);
            }
        }

        let conn = self
            .transport
            .connect(&self.addr.host, self.addr.port, self.config.connect_timeout)
            .await?;
        let mut inner = self.inner.lock();
        inner.stats.created += 1;
        inner.stats.acquired += 1;
        debug!(addr = %self.addr, created = inner.stats.created, "opened connection");
        Ok(conn)
    }

    /// Returns a connection for reuse; it is handed out first on the next acquire.
    ///
    /// Callers discard connections they know are broken instead of releasing them.
    pub fn release(&self, conn: Box<dyn Connection>) {
        let mut inner = self.inner.lock();
        if let Some(max_idle) = self.config.max_idle {
            if inner.idle.len() >= max_idle {
                inner.stats.discarded += 1;
                return;
            }
        }
        inner.idle.push_front(conn);
        inner.stats.released += 1;
    }

    /// Drops a connection that failed mid-request.
    pub fn discard(&self, conn: Box<dyn Connection>) {
        drop(conn);
        self.inner.lock().stats.discarded += 1;
    }

    /// Number of idle connections.
    pub fn idle_len(&self) -> usize {
        self.inner.lock().idle.len()
    }

    /// Snapshot of the pool counters.
    pub fn stats(&self) -> PoolStats {
        let inner = self.inner.lock();
        PoolStats {
            idle: inner.idle.len(),
            ..inner.stats
        }
    }

    /// Endpoint this pool connects to.
    pub fn addr(&self) -> &NodeAddr {
        &self.addr
    }
}
