//! Common test utilities and fixtures for integration tests.
//!
//! `FakeCluster` is an in-process transport: every `host:port` is a node that
//! answers `CLUSTER SLOTS` with a configurable layout and everything else
//! with `+OK`, unless a per-node script says otherwise.

#![allow(dead_code)]

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use rand::Rng;
use slotkv_cluster::{key_slot, Connection, Reply, Transport, TransportError};

/// One scripted answer for a data command.
#[derive(Debug, Clone)]
pub enum Step {
    /// Answer with this reply.
    Reply(Reply),
    /// Fail the request and break the connection.
    Fail,
}

#[derive(Default)]
struct State {
    refuse_all: bool,
    refused: BTreeSet<String>,
    topology: Option<Reply>,
    scripts: HashMap<String, VecDeque<Step>>,
    always: HashMap<String, Reply>,
    redirect_ratio: f64,
    redirect_targets: Vec<(String, u16)>,
    log: Vec<(String, Vec<Bytes>)>,
}

struct Shared {
    state: Mutex<State>,
    connects: AtomicUsize,
    topology_queries: AtomicUsize,
    requests: AtomicUsize,
}

/// Scriptable fake cluster; cheap to clone, clones share state.
#[derive(Clone)]
pub struct FakeCluster {
    shared: Arc<Shared>,
}

impl FakeCluster {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State::default()),
                connects: AtomicUsize::new(0),
                topology_queries: AtomicUsize::new(0),
                requests: AtomicUsize::new(0),
            }),
        }
    }

    /// Cluster whose `CLUSTER SLOTS` answer is built from `ranges`.
    pub fn with_layout(ranges: &[(u16, u16, &str, u16)]) -> Self {
        let cluster = Self::new();
        cluster.set_topology(slots_reply(ranges));
        cluster
    }

    pub fn transport(&self) -> Arc<dyn Transport> {
        Arc::new(self.clone())
    }

    pub fn set_topology(&self, reply: Reply) {
        self.shared.state.lock().topology = Some(reply);
    }

    pub fn refuse(&self, addr: &str) {
        self.shared.state.lock().refused.insert(addr.to_string());
    }

    pub fn refuse_all(&self) {
        self.shared.state.lock().refuse_all = true;
    }

    /// Queues answers for the next data commands sent to `addr`.
    pub fn script(&self, addr: &str, steps: impl IntoIterator<Item = Step>) {
        self.shared
            .state
            .lock()
            .scripts
            .entry(addr.to_string())
            .or_default()
            .extend(steps);
    }

    /// Answers every unscripted data command on `addr` with `reply`.
    pub fn always(&self, addr: &str, reply: Reply) {
        self.shared.state.lock().always.insert(addr.to_string(), reply);
    }

    /// Makes a share of unscripted data commands answer `MOVED` to a random target.
    pub fn random_redirects(&self, ratio: f64, targets: &[(&str, u16)]) {
        let mut state = self.shared.state.lock();
        state.redirect_ratio = ratio;
        state.redirect_targets = targets
            .iter()
            .map(|(host, port)| (host.to_string(), *port))
            .collect();
    }

    pub fn connects(&self) -> usize {
        self.shared.connects.load(Ordering::SeqCst)
    }

    pub fn topology_queries(&self) -> usize {
        self.shared.topology_queries.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> usize {
        self.shared.requests.load(Ordering::SeqCst)
    }

    /// Nodes that received data commands, in order.
    pub fn request_log(&self) -> Vec<String> {
        self.shared
            .state
            .lock()
            .log
            .iter()
            .map(|(addr, _)| addr.clone())
            .collect()
    }

    fn answer(&self, addr: &str, argv: &[Bytes]) -> Step {
        let is_topology = argv.len() == 2
            && argv[0].eq_ignore_ascii_case(b"CLUSTER")
            && argv[1].eq_ignore_ascii_case(b"SLOTS");
        let mut state = self.shared.state.lock();
        if is_topology {
            self.shared.topology_queries.fetch_add(1, Ordering::SeqCst);
            return Step::Reply(
                state
                    .topology
                    .clone()
                    .unwrap_or_else(|| Reply::Error("ERR This instance has cluster support disabled".into())),
            );
        }

        self.shared.requests.fetch_add(1, Ordering::SeqCst);
        state.log.push((addr.to_string(), argv.to_vec()));
        if let Some(step) = state.scripts.get_mut(addr).and_then(|queue| queue.pop_front()) {
            return step;
        }
        if let Some(reply) = state.always.get(addr) {
            return Step::Reply(reply.clone());
        }
        if state.redirect_ratio > 0.0 && !state.redirect_targets.is_empty() {
            let mut rng = rand::thread_rng();
            if rng.gen_bool(state.redirect_ratio) {
                let (host, port) = &state.redirect_targets[rng.gen_range(0..state.redirect_targets.len())];
                let slot = argv.get(1).map(|key| key_slot(key)).unwrap_or(0);
                return Step::Reply(Reply::Error(format!("MOVED {} {}:{}", slot, host, port)));
            }
        }
        Step::Reply(Reply::Status("OK".into()))
    }
}

impl Default for FakeCluster {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for FakeCluster {
    async fn connect(
        &self,
        host: &str,
        port: u16,
        _timeout: Option<Duration>,
    ) -> slotkv_transport::Result<Box<dyn Connection>> {
        let addr = format!("{}:{}", host, port);
        {
            let state = self.shared.state.lock();
            if state.refuse_all || state.refused.contains(&addr) {
                return Err(TransportError::ConnectionRefused { addr });
            }
        }
        self.shared.connects.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        Ok(Box::new(FakeConn {
            cluster: self.clone(),
            addr,
            broken: false,
        }))
    }
}

struct FakeConn {
    cluster: FakeCluster,
    addr: String,
    broken: bool,
}

#[async_trait]
impl Connection for FakeConn {
    async fn send_command(
        &mut self,
        argv: &[Bytes],
    ) -> slotkv_transport::Result<Reply> {
        if self.broken {
            return Err(TransportError::Broken);
        }
        tokio::task::yield_now().await;
        match self.cluster.answer(&self.addr, argv) {
            Step::Reply(reply) => Ok(reply),
            Step::Fail => {
                self.broken = true;
                Err(TransportError::ConnectionReset)
            }
        }
    }

    fn is_broken(&self) -> bool {
        self.broken
    }

    fn peer_addr(&self) -> &str {
        &self.addr
    }
}

/// Builds a `CLUSTER SLOTS` reply.
pub fn slots_reply(ranges: &[(u16, u16, &str, u16)]) -> Reply {
    Reply::Array(
        ranges
            .iter()
            .map(|(start, end, host, port)| {
                Reply::Array(vec![
                    Reply::Integer(i64::from(*start)),
                    Reply::Integer(i64::from(*end)),
                    Reply::Array(vec![
                        Reply::bulk(host.to_string()),
                        Reply::Integer(i64::from(*port)),
                    ]),
                ])
            })
            .collect(),
    )
}

/// First `key<N>` that hashes to `slot`.
pub fn key_for_slot(slot: u16) -> String {
    (0u64..)
        .map(|i| format!("key{}", i))
        .find(|key| key_slot(key.as_bytes()) == slot)
        .expect("every slot is reachable")
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
