//! Compiled-module cache key (SPEC_FULL.md §6). File-backed persistence of
//! the compiled bytecode keyed on this hash is the out-of-scope external
//! collaborator; this is the one piece of that story implemented here.

use crate::config::Features;
use sha2::{Digest, Sha256};

/// Hashes the engine version, the enabled feature set and the raw module
/// bytes into a key stable across process restarts but invalidated by any
/// change that could alter how the bytes compile (spec.md §3, §6).
pub fn cache_key(engine_version: &str, features: Features, bytes: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(engine_version.as_bytes());
    hasher.update([0u8]);
    hasher.update([
        features.mutable_global as u8,
        features.sign_extension as u8,
        features.saturating_float_to_int as u8,
        features.multi_value as u8,
        features.bulk_memory as u8,
        features.reference_types as u8,
        features.tail_call as u8,
        features.simd as u8,
    ]);
    hasher.update(bytes);
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn differs_on_feature_flags() {
        let mut a = Features::default();
        let mut b = Features::default();
        a.simd = true;
        b.simd = false;
        assert_ne!(cache_key("1.0.0", a, b"\0asm"), cache_key("1.0.0", b, b"\0asm"));
    }

    #[test]
    fn stable_for_identical_input() {
        let f = Features::default();
        assert_eq!(cache_key("1.0.0", f, b"hello"), cache_key("1.0.0", f, b"hello"));
    }
}
