//! Redirect replies: `MOVED <slot> <host>:<port>` and `ASK <slot> <host>:<port>`.

use thiserror::Error;

use crate::hash::HASH_SLOTS;
use crate::node::NodeAddr;

/// Which redirect the server sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectKind {
    /// Slot ownership moved permanently.
    Moved,
    /// Slot is migrating; this request belongs elsewhere.
    Ask,
}

/// A parsed redirect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect {
    /// Redirect flavour.
    pub kind: RedirectKind,
    /// Slot the server is talking about.
    pub slot: u16,
    /// Node the server points at.
    pub target: NodeAddr,
}

/// A reply that announced a redirect but did not carry a usable target.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed redirect reply {text:?}")]
pub struct RedirectError {
    /// Raw error text.
    pub text: String,
}

/// Parses the text of an error reply.
///
/// Returns `None` if the text is not a redirect at all, `Some(Err(_))` if it
/// starts like one but the slot or target cannot be read.
pub fn parse_redirect(text: &str) -> Option<Result<Redirect, RedirectError>> {
    let kind = if text.starts_with("MOVED") {
        RedirectKind::Moved
    } else if text == "ASK" || text.starts_with("ASK ") {
        RedirectKind::Ask
    } else {
        return None;
    };
    Some(parse_target(kind, text).ok_or_else(|| RedirectError {
        text: text.to_string(),
    }))
}

fn parse_target(kind: RedirectKind, text: &str) -> Option<Redirect> {
    let mut parts = text.split(' ').filter(|part| !part.is_empty());
    parts.next()?;
    let slot = parts.next()?.parse::<u16>().ok().filter(|slot| *slot < HASH_SLOTS)?;
    let target = parts.next()?.parse::<NodeAddr>().ok()?;
    Some(Redirect { kind, slot, target })
}
