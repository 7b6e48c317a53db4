//! Structural feature extraction from a labelled tree, MinHash signature
//! computation, and banded LSH indexing for near-duplicate fragment
//! search.

use canopy_apted::Tree;
use canopy_config::{FeaturesConfig, LshConfig};
use canopy_hash::{AHashMap, AHashSet};

const CONTROL_FLOW_KINDS: &[&str] = &[
    "IfStatement",
    "ForStatement",
    "WhileStatement",
    "DoWhileStatement",
    "SwitchStatement",
    "SwitchCase",
    "TryStatement",
    "CatchClause",
    "ConditionalExpression",
    "LogicalExpression",
];

fn base_kind(label: &str) -> &str {
    label.split('(').next().unwrap_or(label)
}

fn canonicalize(label: &str, include_literals: bool) -> &str {
    if include_literals {
        label
    } else {
        base_kind(label)
    }
}

fn bin_count(n: usize) -> &'static str {
    match n {
        0 => "0",
        1 => "1",
        2..=3 => "2-3",
        4..=7 => "4-7",
        8..=15 => "8-15",
        _ => "16+",
    }
}

fn fnv1a64(bytes: &[u8]) -> u64 {
    let mut h = 0xcbf29ce484222325u64;
    for &b in bytes {
        h ^= b as u64;
        h = h.wrapping_mul(0x100000001b3);
    }
    h
}

fn postorder_old_ids(tree: &Tree) -> Vec<usize> {
    if tree.is_empty() {
        return Vec::new();
    }
    let mut stack = vec![tree.root];
    let mut order = Vec::with_capacity(tree.len());
    while let Some(id) = stack.pop() {
        order.push(id);
        for &child in &tree.nodes[id].children {
            stack.push(child);
        }
    }
    order.reverse();
    order
}

fn preorder_old_ids(tree: &Tree) -> Vec<usize> {
    if tree.is_empty() {
        return Vec::new();
    }
    let mut stack = vec![tree.root];
    let mut order = Vec::with_capacity(tree.len());
    while let Some(id) = stack.pop() {
        order.push(id);
        for &child in tree.nodes[id].children.iter().rev() {
            stack.push(child);
        }
    }
    order
}

/// Subtree canonical hashes (`sub:`) for every node, up to
/// `config.max_subtree_height` levels deep. Computed bottom-up so each
/// node's representation reuses its children's already-computed strings
/// instead of re-walking the subtree per node.
fn subtree_features(tree: &Tree, config: &FeaturesConfig) -> Vec<String> {
    if tree.is_empty() {
        return Vec::new();
    }
    let h = config.max_subtree_height;
    let mut canon: Vec<Vec<String>> = vec![Vec::new(); tree.len()];

    for id in postorder_old_ids(tree) {
        let label0 = canonicalize(&tree.nodes[id].label, config.include_literals).to_string();
        let mut levels = Vec::with_capacity(h + 1);
        levels.push(label0.clone());
        for ht in 1..=h {
            if tree.nodes[id].children.is_empty() {
                levels.push(levels[ht - 1].clone());
            } else {
                let parts: Vec<&str> = tree.nodes[id].children.iter().map(|&c| canon[c][ht - 1].as_str()).collect();
                levels.push(format!("{label0}({})", parts.join(",")));
            }
        }
        canon[id] = levels;
    }

    (0..tree.len())
        .map(|id| format!("sub:{:016x}", fnv1a64(canon[id][h].as_bytes())))
        .collect()
}

/// k-grams (`kgram:`) of pre-order labels, length `config.k_gram_size`.
fn kgram_features(tree: &Tree, config: &FeaturesConfig) -> Vec<String> {
    let k = config.k_gram_size;
    if k == 0 {
        return Vec::new();
    }
    let labels: Vec<&str> = preorder_old_ids(tree)
        .into_iter()
        .map(|id| canonicalize(&tree.nodes[id].label, config.include_literals))
        .collect();
    if labels.len() < k {
        return Vec::new();
    }
    labels.windows(k).map(|w| format!("kgram:{}", w.join(">"))).collect()
}

/// Node-type counts (`type:`) binned into coarse ranges.
fn type_count_features(tree: &Tree) -> Vec<String> {
    let mut counts: AHashMap<&str, usize> = AHashMap::default();
    for node in &tree.nodes {
        *counts.entry(base_kind(&node.label)).or_insert(0) += 1;
    }
    counts
        .into_iter()
        .map(|(kind, count)| format!("type:{kind}:{}", bin_count(count)))
        .collect()
}

/// Control-flow pattern labels (`pattern:`), one occurrence per matching
/// node — duplicates collapse naturally when the signature is computed
/// over the deduplicated feature set.
fn pattern_features(tree: &Tree) -> Vec<String> {
    tree.nodes
        .iter()
        .map(|n| base_kind(&n.label))
        .filter(|kind| CONTROL_FLOW_KINDS.contains(kind))
        .map(|kind| format!("pattern:{kind}"))
        .collect()
}

/// Extracts the full deterministic feature multi-set for a tree: subtree
/// hashes, label k-grams, node-type-count bins (when `include_types`),
/// and control-flow pattern labels.
pub fn extract_features(tree: &Tree, config: &FeaturesConfig) -> Vec<String> {
    let mut features = subtree_features(tree, config);
    features.extend(kgram_features(tree, config));
    if config.include_types {
        features.extend(type_count_features(tree));
    }
    features.extend(pattern_features(tree));
    features
}

/// splitmix64's output finalizer — a fast, fixed, well-distributed 64-bit
/// mix with no external dependency.
fn mix64(mut x: u64) -> u64 {
    x ^= x >> 30;
    x = x.wrapping_mul(0xbf58476d1ce4e5b9);
    x ^= x >> 27;
    x = x.wrapping_mul(0x94d049bb133111eb);
    x ^= x >> 31;
    x
}

const GOLDEN_RATIO_64: u64 = 0x9E3779B97F4A7C15;

fn hash_at(index: usize, feature: &str) -> u64 {
    let base = fnv1a64(feature.as_bytes());
    let salted = base ^ (index as u64).wrapping_mul(GOLDEN_RATIO_64);
    mix64(salted)
}

/// Computes the `H`-length MinHash signature of a feature multi-set. The
/// multi-set is deduplicated first — repeated features never bias the
/// signature. Empty input yields the all-ones signature.
pub fn signature(features: &[String], num_hashes: usize) -> Vec<u64> {
    let unique: AHashSet<&String> = features.iter().collect();
    if unique.is_empty() {
        return vec![u64::MAX; num_hashes];
    }
    (0..num_hashes)
        .map(|i| unique.iter().map(|f| hash_at(i, f)).min().unwrap())
        .collect()
}

/// Estimated Jaccard similarity: the fraction of signature positions that
/// agree. Either signature absent, or mismatched lengths, yields 0.
pub fn jaccard_estimate(a: Option<&[u64]>, b: Option<&[u64]>) -> f64 {
    match (a, b) {
        (Some(a), Some(b)) if !a.is_empty() && a.len() == b.len() => {
            let equal = a.iter().zip(b).filter(|(x, y)| x == y).count();
            (equal as f64 / a.len() as f64).clamp(0.0, 1.0)
        }
        _ => 0.0,
    }
}

/// Banded LSH index over MinHash signatures. Insertion is idempotent per
/// ID; queries return deduplicated candidate IDs. Not required to be
/// concurrent-writable — callers serialise insertions or shard and merge.
#[derive(Debug, Clone)]
pub struct LshIndex<Id> {
    bands: usize,
    rows: usize,
    signatures: AHashMap<Id, Vec<u64>>,
    band_tables: Vec<AHashMap<Vec<u64>, Vec<Id>>>,
}

impl<Id: Clone + Eq + std::hash::Hash> LshIndex<Id> {
    pub fn new(config: LshConfig) -> Self {
        Self {
            bands: config.bands,
            rows: config.rows,
            signatures: AHashMap::default(),
            band_tables: (0..config.bands).map(|_| AHashMap::default()).collect(),
        }
    }

    /// A no-op: this index is maintained incrementally via [`insert`].
    ///
    /// [`insert`]: LshIndex::insert
    pub fn build_index(&mut self) {}

    pub fn insert(&mut self, id: Id, sig: &[u64]) {
        if sig.len() != self.bands * self.rows {
            return;
        }
        self.signatures.insert(id.clone(), sig.to_vec());
        for b in 0..self.bands {
            let start = b * self.rows;
            let key = sig[start..start + self.rows].to_vec();
            let bucket = self.band_tables[b].entry(key).or_default();
            if !bucket.contains(&id) {
                bucket.push(id.clone());
            }
        }
    }

    pub fn find_candidates(&self, sig: &[u64]) -> Vec<Id> {
        if sig.is_empty() || sig.len() != self.bands * self.rows {
            return Vec::new();
        }
        let mut seen = AHashSet::default();
        let mut out = Vec::new();
        for b in 0..self.bands {
            let start = b * self.rows;
            if let Some(bucket) = self.band_tables[b].get(&sig[start..start + self.rows]) {
                for id in bucket {
                    if seen.insert(id.clone()) {
                        out.push(id.clone());
                    }
                }
            }
        }
        out
    }

    pub fn signature_of(&self, id: &Id) -> Option<&[u64]> {
        self.signatures.get(id).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.signatures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signatures.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use canopy_apted::TreeBuilder;

    fn features_config() -> FeaturesConfig {
        FeaturesConfig {
            max_subtree_height: 3,
            k_gram_size: 2,
            include_types: true,
            include_literals: false,
        }
    }

    fn lsh_config() -> LshConfig {
        LshConfig {
            num_hashes: 128,
            bands: 32,
            rows: 4,
        }
    }

    fn sample_tree() -> Tree {
        let mut b = TreeBuilder::new();
        let cond = b.add("Identifier(x)", None);
        let if_stmt = b.add("IfStatement", None);
        b.push_child(if_stmt, cond);
        b.finish(if_stmt)
    }

    #[test]
    fn signature_is_deterministic_and_order_independent_of_duplicates() {
        let features = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let deduped = vec!["a".to_string(), "b".to_string(), "b".to_string(), "c".to_string(), "c".to_string()];
        assert_eq!(signature(&features, 128), signature(&features, 128));
        assert_eq!(signature(&features, 128), signature(&deduped, 128));
    }

    #[test]
    fn empty_feature_set_yields_all_ones_signature() {
        let sig = signature(&[], 16);
        assert!(sig.iter().all(|&v| v == u64::MAX));
    }

    #[test]
    fn jaccard_estimate_is_one_for_identical_signatures() {
        let sig = signature(&["a".to_string(), "b".to_string()], 64);
        assert_eq!(jaccard_estimate(Some(&sig), Some(&sig)), 1.0);
    }

    #[test]
    fn jaccard_estimate_is_zero_when_a_signature_is_absent() {
        let sig = signature(&["a".to_string()], 64);
        assert_eq!(jaccard_estimate(Some(&sig), None), 0.0);
    }

    /// Signatures sharing 7 of 9 source features, H=128/B=32/R=4: the
    /// second fragment is found as a candidate for the first with high
    /// probability (LSH soundness: any shared full band is enough).
    #[test]
    fn lsh_finds_high_overlap_fragment_as_candidate() {
        let a: Vec<String> = "abcdefgh".chars().map(|c| c.to_string()).collect();
        let mut b_features = a[..7].to_vec();
        b_features.push("x".to_string());
        b_features.push("y".to_string());

        let config = lsh_config();
        let sig_a = signature(&a, config.num_hashes);
        let sig_b = signature(&b_features, config.num_hashes);

        let mut index = LshIndex::new(config);
        index.insert("a", &sig_a);
        index.insert("b", &sig_b);

        let candidates = index.find_candidates(&sig_a);
        assert!(candidates.contains(&"b"));
    }

    #[test]
    fn lsh_insert_is_idempotent_and_query_deduplicates() {
        let config = lsh_config();
        let sig = signature(&["a".to_string(), "b".to_string()], config.num_hashes);
        let mut index = LshIndex::new(config);
        index.insert("frag", &sig);
        index.insert("frag", &sig);
        let candidates = index.find_candidates(&sig);
        assert_eq!(candidates.iter().filter(|&&id| id == "frag").count(), 1);
    }

    #[test]
    fn find_candidates_on_empty_signature_is_empty() {
        let index: LshIndex<&str> = LshIndex::new(lsh_config());
        assert!(index.find_candidates(&[]).is_empty());
    }

    #[test]
    fn extract_features_includes_every_category() {
        let tree = sample_tree();
        let config = features_config();
        let features = extract_features(&tree, &config);
        assert!(features.iter().any(|f| f.starts_with("sub:")));
        assert!(features.iter().any(|f| f.starts_with("kgram:")));
        assert!(features.iter().any(|f| f.starts_with("type:")));
        assert!(features.iter().any(|f| f == "pattern:IfStatement"));
    }
}
