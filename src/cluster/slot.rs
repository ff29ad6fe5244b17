//! Hash slot calculation.

use crc::{Crc, CRC_16_XMODEM};

/// Number of hash slots in a cluster.
pub const SLOT_COUNT: u16 = 16384;

const CRC16: Crc<u16> = Crc::<u16>::new(&CRC_16_XMODEM);

/// Returns the hash slot (0-16383) serving `key`.
///
/// Only the hash tag is hashed when the key has one, so related keys such as
/// `{user:42}:profile` and `{user:42}:orders` land on the same node.
///
/// ```
/// use kvbridge::cluster::key_slot;
///
/// assert_eq!(key_slot("foo"), 12182);
/// assert_eq!(key_slot("{user1000}.following"), key_slot("{user1000}.followers"));
/// ```
pub fn key_slot(key: &str) -> u16 {
    CRC16.checksum(hash_tag(key.as_bytes())) % SLOT_COUNT
}

/// The part of the key that is hashed: the bytes between the first `{` and
/// the first `}` after it, unless that span is empty or unterminated.
fn hash_tag(key: &[u8]) -> &[u8] {
    let Some(open) = key.iter().position(|&b| b == b'{') else {
        return key;
    };
    match key[open + 1..].iter().position(|&b| b == b'}') {
        Some(0) | None => key,
        Some(len) => &key[open + 1..open + 1 + len],
    }
}
