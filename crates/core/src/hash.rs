//! Content hashing for definition records
//!
//! The file format records a 64-bit FNV-1a hash with every definition
//! body, so the algorithm is pinned: offset basis `0xcbf29ce484222325`,
//! prime `0x100000001b3`. The `fnv` crate implements exactly this, and
//! `FnvHasher::with_key` gives us the caller-supplied basis we need for
//! chunked recomputation.

use std::hash::Hasher;

use fnv::FnvHasher;

/// The standard FNV-1a 64-bit offset basis.
pub const FNV_OFFSET_BASIS: u64 = 0xcbf29ce484222325;

/// Hash a byte slice with 64-bit FNV-1a.
pub fn fnv1a(data: &[u8]) -> u64 {
    fnv1a_with(FNV_OFFSET_BASIS, data)
}

/// Continue an FNV-1a hash from a previous value.
///
/// `fnv1a_with(fnv1a(a), b)` equals `fnv1a(a ++ b)`, which lets batched
/// readers hash a record without holding it in memory at once.
pub fn fnv1a_with(init: u64, data: &[u8]) -> u64 {
    let mut hasher = FnvHasher::with_key(init);
    hasher.write(data);
    hasher.finish()
}
