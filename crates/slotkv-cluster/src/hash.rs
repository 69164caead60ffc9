//! Key to slot hashing.
//!
//! Slots are CRC16/XMODEM of the key (or of its hash tag) modulo [`HASH_SLOTS`].

use crc::{Crc, CRC_16_XMODEM};

/// Number of hash slots the key space is partitioned into.
pub const HASH_SLOTS: u16 = 16384;

const CRC16: Crc<u16> = Crc::<u16>::new(&CRC_16_XMODEM);

/// CRC16/XMODEM (polynomial 0x1021, initial value 0, no reflection).
pub fn crc16(data: &[u8]) -> u16 {
    CRC16.checksum(data)
}

/// Returns the part of `key` that is hashed.
///
/// If the key contains `{`, and a `}` follows it with at least one byte in
/// between, only those bytes are hashed. Otherwise the whole key is.
pub fn hash_tag(key: &[u8]) -> &[u8] {
    if let Some(open) = key.iter().position(|&b| b == b'{') {
        if let Some(len) = key[open + 1..].iter().position(|&b| b == b'}') {
            if len > 0 {
                return &key[open + 1..open + 1 + len];
            }
        }
    }
    key
}

/// Maps a key to its slot in `[0, HASH_SLOTS)`.
pub fn key_slot(key: &[u8]) -> u16 {
    crc16(hash_tag(key)) % HASH_SLOTS
}
