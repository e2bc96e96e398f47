use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// The key hash an extendible hash table folds down to a directory index.
///
/// A plain function pointer keeps the table's type signature flat while
/// still letting tests inject hashes with known bit patterns.
pub struct HashFunction<K> {
    f: fn(&K) -> u32,
}

impl<K: Hash> HashFunction<K> {
    /// The default hash: the standard library's hasher, folded to 32 bits.
    pub fn new() -> Self {
        Self {
            f: |key| {
                let mut hasher = DefaultHasher::new();
                key.hash(&mut hasher);
                hasher.finish() as u32
            },
        }
    }
}

impl<K> HashFunction<K> {
    /// A custom hash, mainly for tests that need deterministic bucket
    /// placement.
    pub fn with(f: fn(&K) -> u32) -> Self {
        Self { f }
    }

    pub fn hash(&self, key: &K) -> u32 {
        (self.f)(key)
    }
}

impl<K: Hash> Default for HashFunction<K> {
    fn default() -> Self {
        Self::new()
    }
}
