//! TCP transport implementation

use std::time::Duration;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;

use crate::error::{Result, TransportError};
use crate::reply::Reply;
use crate::resp::{encode_command, ReplyDecoder};
use crate::transport::{Connection, Transport};

const READ_CHUNK: usize = 16 * 1024;

/// TCP transport configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TcpTransportConfig {
    /// Connection timeout in milliseconds, used when the caller passes none.
    pub connect_timeout_ms: u64,
    /// Per-reply read timeout in milliseconds (`None` waits forever).
    pub read_timeout_ms: Option<u64>,
    /// Whether to enable TCP_NODELAY (disable Nagle's algorithm).
    pub nodelay: bool,
}

impl Default for TcpTransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 5000,
            read_timeout_ms: None,
            nodelay: true,
        }
    }
}

/// TCP transport that creates RESP connections
#[derive(Debug, Clone, Default)]
pub struct TcpTransport {
    config: TcpTransportConfig,
}

impl TcpTransport {
    /// Creates a new TCP transport with the given configuration.
    pub fn new(config: TcpTransportConfig) -> Self {
        Self { config }
    }

    /// Establishes a TCP connection to `host:port`.
    pub async fn connect_tcp(
        &self,
        host: &str,
        port: u16,
        timeout: Option<Duration>,
    ) -> Result<TcpConnection> {
        let addr = format!("{}:{}", host, port);
        let timeout =
            timeout.unwrap_or_else(|| Duration::from_millis(self.config.connect_timeout_ms));
        let stream = tokio::time::timeout(timeout, TcpStream::connect((host, port)))
            .await
            .map_err(|_| TransportError::ConnectionTimeout {
                addr: addr.clone(),
                timeout_ms: timeout.as_millis() as u64,
            })?
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::ConnectionRefused => {
                    TransportError::ConnectionRefused { addr: addr.clone() }
                }
                _ => TransportError::IoError(e),
            })?;
        if self.config.nodelay {
            stream.set_nodelay(true).map_err(TransportError::IoError)?;
        }
        debug!(addr = %addr, "TCP connected");
        Ok(TcpConnection::from_stream(
            stream,
            addr,
            self.config.read_timeout_ms,
        ))
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn connect(
        &self,
        host: &str,
        port: u16,
        timeout: Option<Duration>,
    ) -> Result<Box<dyn Connection>> {
        let conn = self.connect_tcp(host, port, timeout).await?;
        Ok(Box::new(conn))
    }
}

/// A single RESP connection over TCP.
pub struct TcpConnection {
    stream: TcpStream,
    read_buf: BytesMut,
    decoder: ReplyDecoder,
    peer_addr: String,
    read_timeout_ms: Option<u64>,
    broken: bool,
}

impl std::fmt::Debug for TcpConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpConnection")
            .field("peer_addr", &self.peer_addr)
            .field("buffered", &self.read_buf.len())
            .field("broken", &self.broken)
            .finish()
    }
}

impl TcpConnection {
    pub(crate) fn from_stream(
        stream: TcpStream,
        peer_addr: String,
        read_timeout_ms: Option<u64>,
    ) -> Self {
        Self {
            stream,
            read_buf: BytesMut::with_capacity(READ_CHUNK),
            decoder: ReplyDecoder::new(),
            peer_addr,
            read_timeout_ms,
            broken: false,
        }
    }

    async fn roundtrip(&mut self, argv: &[Bytes]) -> Result<Reply> {
        let encoded = encode_command(argv);
        self.stream
            .write_all(&encoded)
            .await
            .map_err(TransportError::IoError)?;
        self.stream.flush().await.map_err(TransportError::IoError)?;

        match self.read_timeout_ms {
            Some(ms) => tokio::time::timeout(Duration::from_millis(ms), self.read_reply())
                .await
                .map_err(|_| TransportError::ReadTimeout {
                    addr: self.peer_addr.clone(),
                    timeout_ms: ms,
                })?,
            None => self.read_reply().await,
        }
    }

    async fn read_reply(&mut self) -> Result<Reply> {
        loop {
            if let Some(reply) = self.decoder.decode(&mut self.read_buf)? {
                return Ok(reply);
            }
            self.read_buf.reserve(READ_CHUNK);
            let n = self
                .stream
                .read_buf(&mut self.read_buf)
                .await
                .map_err(TransportError::IoError)?;
            if n == 0 {
                return Err(TransportError::ConnectionReset);
            }
        }
    }
}

#[async_trait]
impl Connection for TcpConnection {
    async fn send_command(&mut self, argv: &[Bytes]) -> Result<Reply> {
        if self.broken {
            return Err(TransportError::Broken);
        }
        let result = self.roundtrip(argv).await;
        if let Err(e) = &result {
            debug!(addr = %self.peer_addr, error = %e, "connection marked broken");
            self.broken = true;
        }
        result
    }

    fn is_broken(&self) -> bool {
        self.broken
    }

    fn peer_addr(&self) -> &str {
        &self.peer_addr
    }
}
