//! Slot-aware request router.
//!
//! A call hashes its key to a slot, picks the cached owner (or a random known
//! node when the owner is unknown or unreachable), and retries up to
//! `max_ttl` times. `MOVED`/`ASK` replies patch the slot map and schedule a
//! full topology rebuild for the next call. Anything else the store answers,
//! application errors included, is returned to the caller as-is.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use slotkv_transport::{Reply, Transport};
use tracing::{debug, info, warn};

use crate::command::Command;
use crate::config::RouterConfig;
use crate::diagnostics::Diagnostics;
use crate::error::{Result, RouterError};
use crate::hash::key_slot;
use crate::metrics::{MetricsSnapshot, RouterMetrics};
use crate::node::{Node, NodeAddr, NodeId};
use crate::pool::PoolStats;
use crate::redirect::parse_redirect;
use crate::registry::NodeRegistry;
use crate::slots::SlotMap;
use crate::topology::{parse_topology, topology_command};

/// Routes single-key commands to the node owning the key's slot.
///
/// `Router` is `Send + Sync`; share it between tasks behind an `Arc`.
pub struct Router {
    config: RouterConfig,
    registry: NodeRegistry,
    slots: SlotMap,
    refresh_pending: AtomicBool,
    metrics: RouterMetrics,
}

impl Router {
    /// Builds a router from a seed list with default settings.
    ///
    /// With `lazy` the topology is loaded on the first call; otherwise it is
    /// loaded here and a cluster that cannot answer fails setup.
    pub async fn setup(seeds: &str, lazy: bool, transport: Arc<dyn Transport>) -> Result<Self> {
        let config = RouterConfig {
            seeds: seeds.to_string(),
            lazy,
            ..RouterConfig::default()
        };
        Self::with_config(config, transport).await
    }

    /// Builds a router from a full configuration.
    pub async fn with_config(config: RouterConfig, transport: Arc<dyn Transport>) -> Result<Self> {
        config.validate()?;

        let registry = NodeRegistry::new(transport, config.pool_config());
        let seeded = registry.parse_and_seed(&config.seeds);
        if seeded == 0 {
            return Err(RouterError::Setup(format!(
                "no usable seed node in {:?}",
                config.seeds
            )));
        }

        let router = Self {
            refresh_pending: AtomicBool::new(config.lazy),
            registry,
            slots: SlotMap::new(),
            metrics: RouterMetrics::new(),
            config,
        };

        if !router.config.lazy {
            match router.refresh_topology().await {
                Ok(_) => {}
                Err(e) if router.config.require_topology => {
                    return Err(RouterError::Setup(e.to_string()));
                }
                Err(e) => {
                    warn!(error = %e, "initial topology load failed, starting with an empty slot map");
                }
            }
        }

        info!(
            seeds = seeded,
            lazy = router.config.lazy,
            max_ttl = router.config.max_ttl,
            filled = router.slots.filled(),
            "router ready"
        );
        Ok(router)
    }

    /// Routes one command; `args[1]` is the key.
    pub async fn run<S>(&self, args: &[S]) -> Result<Reply>
    where
        S: AsRef<[u8]> + Sync,
    {
        let mut diag = Diagnostics::new();
        self.run_traced(args, &mut diag).await
    }

    /// Like [`Router::run`], also recording the outcome in `diag`.
    ///
    /// `diag` is reset first, so it always describes this call only.
    pub async fn run_traced<S>(&self, args: &[S], diag: &mut Diagnostics) -> Result<Reply>
    where
        S: AsRef<[u8]> + Sync,
    {
        diag.reset();
        self.metrics.inc_calls();

        let result = match Command::parse(args) {
            Ok(cmd) => self.execute(&cmd, diag).await,
            Err(e) => Err(e),
        };

        match &result {
            Ok(_) => self.metrics.inc_successes(),
            Err(e) => {
                if matches!(e, RouterError::TtlExceeded { .. }) {
                    self.metrics.inc_ttl_exhausted();
                }
                self.metrics.inc_failures();
                debug!(error = %e, attempts = diag.last_attempt_count(), "call failed");
                diag.record_error(e);
            }
        }
        result
    }

    async fn execute(&self, cmd: &Command, diag: &mut Diagnostics) -> Result<Reply> {
        if self.refresh_pending.swap(false, Ordering::AcqRel) {
            if let Err(e) = self.refresh_topology().await {
                warn!(error = %e, "deferred topology refresh failed");
            }
        }

        let slot = key_slot(cmd.key());
        let fallback = self.config.random_fallback;
        let mut force_random = false;
        let mut last_tried: Option<NodeId> = None;
        let mut redirect_to: Option<Arc<Node>> = None;

        for attempt in 1..=self.config.max_ttl {
            diag.set_attempts(attempt);

            let node = if let Some(node) = redirect_to.take() {
                node
            } else if force_random {
                force_random = false;
                match self.registry.random_node(last_tried) {
                    Some(node) => node,
                    None => return Err(RouterError::NoAvailableNode { slot }),
                }
            } else {
                match self.slots.lookup(slot).and_then(|id| self.registry.get(id)) {
                    Some(node) => node,
                    None if fallback => {
                        debug!(slot, attempt, "slot not cached, falling back to a random node");
                        force_random = true;
                        continue;
                    }
                    None => return Err(RouterError::SlotMissedAndNoFallback { slot }),
                }
            };
            last_tried = Some(node.id());

            let mut conn = match node.pool().acquire().await {
                Ok(conn) => conn,
                Err(e) => {
                    self.metrics.inc_connect_failures();
                    debug!(node = %node.addr(), slot, attempt, error = %e, "connect failed");
                    force_random = fallback;
                    continue;
                }
            };

            let reply = match conn.send_command(cmd.argv()).await {
                Ok(reply) => reply,
                Err(e) => {
                    node.pool().discard(conn);
                    self.metrics.inc_transport_failures();
                    debug!(node = %node.addr(), slot, attempt, error = %e, "request failed");
                    force_random = fallback;
                    continue;
                }
            };
            node.pool().release(conn);

            let redirect = match &reply {
                Reply::Error(text) => parse_redirect(text),
                _ => None,
            };
            match redirect {
                None => return Ok(reply),
                Some(Err(e)) => {
                    warn!(node = %node.addr(), error = %e, "unusable redirect, returning reply as-is");
                    return Ok(reply);
                }
                Some(Ok(redirect)) => {
                    self.metrics.inc_redirects();
                    let target = self
                        .slots
                        .patch(&self.registry, redirect.slot, &redirect.target)?;
                    self.refresh_pending.store(true, Ordering::Release);
                    debug!(
                        kind = ?redirect.kind,
                        slot = redirect.slot,
                        from = %node.addr(),
                        to = %target.addr(),
                        attempt,
                        "following redirect"
                    );
                    if redirect.slot != slot {
                        warn!(
                            expected = slot,
                            got = redirect.slot,
                            to = %target.addr(),
                            "redirect names a different slot"
                        );
                        redirect_to = Some(target);
                    }
                }
            }
        }

        Err(RouterError::TtlExceeded {
            attempts: self.config.max_ttl,
        })
    }

    /// Queries known nodes in order until one answers `CLUSTER SLOTS`, then
    /// replaces the slot map with its answer.
    ///
    /// Returns the number of populated slots, or `None` if another rebuild
    /// was already running and this one was skipped.
    pub async fn refresh_topology(&self) -> Result<Option<usize>> {
        let Some(_guard) = self.slots.try_begin_rebuild() else {
            debug!("topology rebuild already running, skipping");
            return Ok(None);
        };
        self.rebuild().await.map(Some)
    }

    /// Empties the slot map and rebuilds it from scratch.
    pub async fn reset_topology(&self) -> Result<Option<usize>> {
        let Some(_guard) = self.slots.try_begin_rebuild() else {
            debug!("topology rebuild already running, skipping reset");
            return Ok(None);
        };
        self.slots.clear();
        self.rebuild().await.map(Some)
    }

    // Caller holds the rebuild gate.
    async fn rebuild(&self) -> Result<usize> {
        let nodes = self.registry.snapshot();
        let command = topology_command();
        let mut last = None;

        for node in &nodes {
            let mut conn = match node.pool().acquire().await {
                Ok(conn) => conn,
                Err(e) => {
                    debug!(node = %node.addr(), error = %e, "topology source unreachable");
                    last = Some(e);
                    continue;
                }
            };
            let reply = match conn.send_command(&command).await {
                Ok(reply) => {
                    node.pool().release(conn);
                    reply
                }
                Err(e) => {
                    node.pool().discard(conn);
                    debug!(node = %node.addr(), error = %e, "topology query failed");
                    last = Some(e);
                    continue;
                }
            };
            let Some(ranges) = parse_topology(&reply) else {
                debug!(node = %node.addr(), reply = %reply.kind(), "unexpected topology reply");
                continue;
            };

            let filled = self.slots.rebuild_from_topology(&self.registry, &ranges)?;
            self.metrics.inc_topology_refreshes();
            info!(
                source = %node.addr(),
                ranges = ranges.len(),
                filled,
                nodes = self.registry.len(),
                "topology rebuilt"
            );
            return Ok(filled);
        }

        self.metrics.inc_topology_failures();
        warn!(tried = nodes.len(), "no node answered the topology query");
        Err(RouterError::TopologyUnavailable {
            tried: nodes.len(),
            last,
        })
    }

    /// Address of the cached owner of `slot`.
    pub fn slot_owner(&self, slot: u16) -> Option<NodeAddr> {
        self.slots
            .lookup(slot)
            .and_then(|id| self.registry.get(id))
            .map(|node| node.addr().clone())
    }

    /// Active configuration.
    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// Known nodes.
    pub fn registry(&self) -> &NodeRegistry {
        &self.registry
    }

    /// Slot owner table.
    pub fn slots(&self) -> &SlotMap {
        &self.slots
    }

    /// Counters since construction.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Pool counters for every known node.
    pub fn pool_stats(&self) -> Vec<(NodeAddr, PoolStats)> {
        self.registry.pool_stats()
    }

    /// True when the next call will rebuild the topology first.
    pub fn refresh_pending(&self) -> bool {
        self.refresh_pending.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("nodes", &self.registry.len())
            .field("filled", &self.slots.filled())
            .field("refresh_pending", &self.refresh_pending())
            .finish()
    }
}
