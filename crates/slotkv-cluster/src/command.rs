//! Request validation.
//!
//! Only single-key data commands are routed: the second token is the key.

use bytes::Bytes;

use crate::error::{Result, RouterError};

/// Commands rejected before any network activity.
pub const UNSUPPORTED_COMMANDS: &[&str] = &[
    "CLUSTER",
    "CONFIG",
    "DISCARD",
    "EXEC",
    "INFO",
    "MULTI",
    "REPLICAOF",
    "SHUTDOWN",
    "SLAVEOF",
    "WATCH",
];

/// A validated request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    name: String,
    argv: Vec<Bytes>,
}

impl Command {
    /// Validates and copies a request.
    ///
    /// Fails with [`RouterError::CommandNotSupported`] for fewer than two
    /// tokens or a denylisted command name (case-insensitive).
    pub fn parse<S: AsRef<[u8]>>(args: &[S]) -> Result<Self> {
        if args.len() < 2 {
            return Err(RouterError::CommandNotSupported(
                "none-key commands are not supported".to_string(),
            ));
        }
        let name = String::from_utf8_lossy(args[0].as_ref()).to_ascii_uppercase();
        if UNSUPPORTED_COMMANDS.contains(&name.as_str()) {
            return Err(RouterError::CommandNotSupported(format!(
                "command [{}] not supported",
                name
            )));
        }
        let argv = args
            .iter()
            .map(|arg| Bytes::copy_from_slice(arg.as_ref()))
            .collect();
        Ok(Self { name, argv })
    }

    /// Upper-cased command name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Routing key (second token).
    pub fn key(&self) -> &[u8] {
        &self.argv[1]
    }

    /// All tokens as sent on the wire.
    pub fn argv(&self) -> &[Bytes] {
        &self.argv
    }
}
