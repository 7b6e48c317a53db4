//! Hasher aliasing shared by every analysis crate in the workspace.
//!
//! The analyses here build many small-to-medium maps and sets keyed by file
//! paths and symbol names inside hot per-file loops; `ahash` trades the
//! DoS-resistance of the standard library's default hasher for speed, which
//! is the right trade for an analysis engine over trusted local source
//! trees.

pub type ARandomState = ahash::RandomState;
pub type AHashMap<K, V> = std::collections::HashMap<K, V, ARandomState>;
pub type AHashSet<T> = std::collections::HashSet<T, ARandomState>;

/// Builds an [`AHashMap`] with the default ahash hasher.
pub fn new_map<K, V>() -> AHashMap<K, V> {
    AHashMap::default()
}

/// Builds an [`AHashSet`] with the default ahash hasher.
pub fn new_set<T>() -> AHashSet<T> {
    AHashSet::default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_and_set_roundtrip() {
        let mut m: AHashMap<&str, i32> = new_map();
        m.insert("a", 1);
        assert_eq!(m.get("a"), Some(&1));

        let mut s: AHashSet<&str> = new_set();
        s.insert("a");
        assert!(s.contains("a"));
    }
}
