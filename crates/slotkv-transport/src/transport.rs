//! Abstract transport used by the routing core.
//!
//! This module defines the Transport and Connection traits. The TCP backend
//! implements them for real servers; tests implement them with scripted fakes.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;
use crate::reply::Reply;

/// Factory for connections to a single `(host, port)` endpoint.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Connect to `host:port`.
    ///
    /// # Arguments
    /// * `host` - Host name or IP literal.
    /// * `port` - TCP port.
    /// * `timeout` - Upper bound on connection establishment, if any.
    async fn connect(
        &self,
        host: &str,
        port: u16,
        timeout: Option<Duration>,
    ) -> Result<Box<dyn Connection>>;
}

/// An established request/response connection to one node.
///
/// Dropping a connection closes it.
#[async_trait]
pub trait Connection: Send {
    /// Send one command and wait for its reply.
    ///
    /// Any `Err` means the connection is no longer usable and must not be pooled.
    async fn send_command(&mut self, argv: &[Bytes]) -> Result<Reply>;

    /// True once the connection has observed an I/O or protocol failure.
    fn is_broken(&self) -> bool;

    /// Remote peer address as a string.
    fn peer_addr(&self) -> &str;
}
