#![warn(missing_docs)]

//! slotkv transport subsystem: reply model, RESP2 codec and a tokio TCP transport.
//!
//! The routing core only talks to nodes through the [`Transport`] and
//! [`Connection`] traits, so tests can substitute scripted fakes.

pub mod error;
pub mod reply;
pub mod resp;
pub mod tcp;
pub mod transport;

pub use error::{Result, TransportError};
pub use reply::{Reply, ReplyKind};
pub use resp::{encode_command, ReplyDecoder, MAX_BULK_LEN};
pub use tcp::{TcpConnection, TcpTransport, TcpTransportConfig};
pub use transport::{Connection, Transport};
