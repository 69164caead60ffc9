//! Topology query and reply parsing.

use bytes::Bytes;
use slotkv_transport::Reply;
use tracing::debug;

use crate::hash::HASH_SLOTS;

/// One contiguous range of slots and its owner, as reported by a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotRange {
    /// First slot, inclusive.
    pub start: u16,
    /// Last slot, inclusive.
    pub end: u16,
    /// Owner host.
    pub host: String,
    /// Owner port.
    pub port: u16,
}

impl SlotRange {
    /// Number of slots covered.
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        (self.end - self.start) as usize + 1
    }
}

/// The administrative command that returns the slot layout.
pub fn topology_command() -> Vec<Bytes> {
    vec![Bytes::from_static(b"CLUSTER"), Bytes::from_static(b"SLOTS")]
}

/// Extracts slot ranges from a topology reply.
///
/// Returns `None` when the reply is not an array (for example an error reply
/// from a node that is not in cluster mode). Entries that do not look like
/// `[start, end, [host, port, ...], ...]` with `start <= end < HASH_SLOTS`
/// are skipped one by one.
pub fn parse_topology(reply: &Reply) -> Option<Vec<SlotRange>> {
    let entries = reply.as_array()?;
    let ranges = entries
        .iter()
        .filter_map(|entry| {
            let range = parse_entry(entry);
            if range.is_none() {
                debug!(entry = ?entry, "skipping malformed topology entry");
            }
            range
        })
        .collect();
    Some(ranges)
}

fn parse_entry(entry: &Reply) -> Option<SlotRange> {
    let fields = entry.as_array()?;
    if fields.len() < 3 {
        return None;
    }
    let start = slot_from(fields[0].as_integer()?)?;
    let end = slot_from(fields[1].as_integer()?)?;
    if start > end {
        return None;
    }
    let owner = fields[2].as_array()?;
    if owner.len() < 2 {
        return None;
    }
    let host = owner[0].as_bulk_str()?.to_string();
    let port = u16::try_from(owner[1].as_integer()?).ok()?;
    Some(SlotRange {
        start,
        end,
        host,
        port,
    })
}

fn slot_from(value: i64) -> Option<u16> {
    u16::try_from(value).ok().filter(|slot| *slot < HASH_SLOTS)
}
