//! Content hashing for tile deduplication.
//!
//! Tiles are addressed by a 64-bit FNV-1a hash of their raw bytes: palette
//! indices for indexed tiles, R/G/B/A bytes for rendered images.

const FNV_OFFSET: u64 = 0xcbf29ce484222325;
const FNV_PRIME: u64 = 0x100000001b3;

/// FNV-1a hash algorithm.
pub fn fnv1a_hash(data: &[u8]) -> u64 {
    let mut hash = FNV_OFFSET;
    for byte in data {
        hash ^= *byte as u64;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}
