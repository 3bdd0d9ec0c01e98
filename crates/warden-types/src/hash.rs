//! Process-stable transparent string hashing.
//!
//! The permission trie keys its children by segment hash and the
//! group registry keys groups by name hash, while lookups arrive as
//! borrowed slices of caller strings. Both shapes must hash
//! identically, and the hash must stay stable for the life of the
//! process because hashes are stored inside long-lived structures.
//!
//! `ahash` with pinned seeds gives both properties; nothing here
//! survives the process, so DOS-resistant per-map randomization is
//! not needed for these keys.

use ahash::RandomState;

// Pinned seeds: hashes are compared against values stored in live
// structures, so every call site must agree for the process lifetime.
const SEEDS: (u64, u64, u64, u64) = (
    0x9e37_79b9_7f4a_7c15,
    0xc2b2_ae3d_27d4_eb4f,
    0x1656_67b1_9e37_79f9,
    0x27d4_eb2f_1656_67c5,
);

fn fixed_state() -> RandomState {
    RandomState::with_seeds(SEEDS.0, SEEDS.1, SEEDS.2, SEEDS.3)
}

/// Hashes a string with the process-stable 64-bit hash.
///
/// Owned strings and borrowed slices of equal content produce equal
/// hashes, which is the rule the heterogeneous trie and registry
/// lookups rely on.
#[must_use]
pub fn str_hash(s: &str) -> u64 {
    fixed_state().hash_one(s.as_bytes())
}

/// Hash of the literal `"*"` segment: the all-access sentinel.
///
/// A segment hashing to this value terminates a permission path; a
/// fingerprint that *starts* with it addresses the whole permission
/// set of a trie.
pub static WILDCARD_HASH: std::sync::LazyLock<u64> =
    std::sync::LazyLock::new(|| str_hash("*"));

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stable_within_process() {
        assert_eq!(str_hash("admin"), str_hash("admin"));
        assert_eq!(str_hash(""), str_hash(""));
    }

    #[test]
    fn owned_and_borrowed_agree() {
        let owned = String::from("admin.kick.temp");
        assert_eq!(str_hash(&owned), str_hash("admin.kick.temp"));
        assert_eq!(str_hash(&owned[0..5]), str_hash("admin"));
    }

    #[test]
    fn distinct_segments_diverge() {
        assert_ne!(str_hash("admin"), str_hash("kick"));
        assert_ne!(str_hash("a"), str_hash("a "));
    }

    #[test]
    fn wildcard_sentinel() {
        assert_eq!(*WILDCARD_HASH, str_hash("*"));
        assert_ne!(*WILDCARD_HASH, str_hash("admin"));
    }
}
