//! Ordered, labelled-tree edit distance (APTED) under a pluggable cost
//! model, plus batch distance computation and similarity clustering.
//!
//! The implementation follows the classic Zhang-Shasha key-root
//! decomposition rather than APTED's adaptive strategy switching — the
//! spec this crate is built against explicitly allows that as "an
//! acceptable optimisation but not required for correctness".

use canopy_errors::AnalysisError;
use canopy_hash::AHashMap;

/// A single node in an unordered-build, ordered-traversal tree: a label,
/// an optional back-reference to whatever produced it, and an ordered
/// child list (indices into the owning [`Tree`]'s node vector).
#[derive(Debug, Clone)]
pub struct TreeNode {
    pub label: String,
    pub ast_ref: Option<canopy_ast::NodeId>,
    pub children: Vec<usize>,
}

#[derive(Debug, Clone)]
pub struct Tree {
    pub nodes: Vec<TreeNode>,
    pub root: usize,
}

impl Tree {
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

fn literal_value_label(value: &canopy_ast::LiteralValue) -> String {
    use canopy_ast::LiteralValue;
    match value {
        LiteralValue::String(s) => s.clone(),
        LiteralValue::Number(n) => n.to_string(),
        LiteralValue::Bool(b) => b.to_string(),
        LiteralValue::Null => "null".to_string(),
        LiteralValue::Regex(r) => r.clone(),
    }
}

fn ast_node_label(node: &canopy_ast::Node) -> String {
    let base = format!("{:?}", node.kind);
    if let Some(name) = &node.name {
        format!("{base}({name})")
    } else if let Some(op) = &node.operator {
        format!("{base}({op})")
    } else if let Some(value) = &node.value {
        format!("{base}({})", literal_value_label(value))
    } else {
        base
    }
}

/// Converts an AST subtree into the labelled [`Tree`] shape APTED and
/// MinHash both operate on. Each tree node's label is `Kind` or
/// `Kind(detail)` where `detail` is the AST node's name, operator, or
/// literal value, in that preference order — whichever the node actually
/// populated. Traversal uses an explicit stack, matching the rest of the
/// core's tree-walking convention.
pub fn ast_to_tree(ast: &canopy_ast::Ast, root: canopy_ast::NodeId) -> Tree {
    let mut builder = TreeBuilder::new();
    let mut stack = vec![(root, None::<usize>)];
    while let Some((ast_id, parent_idx)) = stack.pop() {
        let Some(node) = ast.node(ast_id) else { continue };
        let tree_idx = builder.add(ast_node_label(node), Some(ast_id));
        if let Some(p) = parent_idx {
            builder.push_child(p, tree_idx);
        }
        for &child in node.children().iter().rev() {
            stack.push((child, Some(tree_idx)));
        }
    }
    builder.finish(0)
}

#[derive(Debug, Default)]
pub struct TreeBuilder {
    nodes: Vec<TreeNode>,
}

impl TreeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, label: impl Into<String>, ast_ref: Option<canopy_ast::NodeId>) -> usize {
        let id = self.nodes.len();
        self.nodes.push(TreeNode {
            label: label.into(),
            ast_ref,
            children: Vec::new(),
        });
        id
    }

    pub fn push_child(&mut self, parent: usize, child: usize) {
        self.nodes[parent].children.push(child);
    }

    pub fn finish(self, root: usize) -> Tree {
        Tree { nodes: self.nodes, root }
    }
}

/// The preparation pass's output: everything indexed by *post-order ID*
/// (1-based, matching the DP recurrence's own indexing), so the DP never
/// touches the original tree again.
#[derive(Debug, Clone)]
pub struct PreparedTree {
    labels: Vec<String>,
    ast_refs: Vec<Option<canopy_ast::NodeId>>,
    lld: Vec<usize>,
    #[allow(dead_code)]
    size: Vec<usize>,
    parent: Vec<Option<usize>>,
    key_roots: Vec<usize>,
    n: usize,
}

impl PreparedTree {
    pub fn len(&self) -> usize {
        self.n
    }

    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    /// Post-order ID `i` is 1-based throughout this crate's public API,
    /// matching the DP recurrence it feeds.
    pub fn label(&self, i: usize) -> &str {
        &self.labels[i - 1]
    }

    pub fn ast_ref(&self, i: usize) -> Option<canopy_ast::NodeId> {
        self.ast_refs[i - 1]
    }

    pub fn key_roots(&self) -> &[usize] {
        &self.key_roots
    }
}

/// Assigns post-order IDs, leftmost-leaf-descendants, subtree sizes, and
/// identifies key roots ({root} ∪ {v : v has a left sibling}).
///
/// Uses an explicit work stack for the post-order walk (push-then-reverse)
/// rather than recursion, so a pathologically deep tree can't blow the
/// call stack.
pub fn prepare(tree: &Tree) -> PreparedTree {
    let n = tree.nodes.len();
    if n == 0 {
        return PreparedTree {
            labels: Vec::new(),
            ast_refs: Vec::new(),
            lld: Vec::new(),
            size: Vec::new(),
            parent: Vec::new(),
            key_roots: Vec::new(),
            n: 0,
        };
    }

    let mut stack = vec![(tree.root, None::<usize>, true)];
    let mut seq = Vec::with_capacity(n);
    while let Some((old, parent_old, is_first)) = stack.pop() {
        seq.push((old, parent_old, is_first));
        for (idx, &child) in tree.nodes[old].children.iter().enumerate() {
            stack.push((child, Some(old), idx == 0));
        }
    }
    seq.reverse();

    let old_to_post: AHashMap<usize, usize> = seq.iter().enumerate().map(|(i, &(old, ..))| (old, i + 1)).collect();

    let mut labels = vec![String::new(); n];
    let mut ast_refs = vec![None; n];
    let mut lld = vec![0usize; n];
    let mut size = vec![0usize; n];
    let mut parent = vec![None; n];
    let mut is_first_child = vec![false; n];

    for (idx, &(old, parent_old, is_first)) in seq.iter().enumerate() {
        labels[idx] = tree.nodes[old].label.clone();
        ast_refs[idx] = tree.nodes[old].ast_ref;
        parent[idx] = parent_old.map(|p| old_to_post[&p]);
        is_first_child[idx] = is_first;

        if tree.nodes[old].children.is_empty() {
            lld[idx] = idx + 1;
        } else {
            let first_child_post = old_to_post[&tree.nodes[old].children[0]];
            lld[idx] = lld[first_child_post - 1];
        }

        let mut s = 1;
        for &child in &tree.nodes[old].children {
            s += size[old_to_post[&child] - 1];
        }
        size[idx] = s;
    }

    let mut key_roots: Vec<usize> = (1..=n).filter(|&i| parent[i - 1].is_none() || !is_first_child[i - 1]).collect();
    key_roots.sort_unstable();

    PreparedTree {
        labels,
        ast_refs,
        lld,
        size,
        parent,
        key_roots,
        n,
    }
}

/// The three edit operations APTED scores, all required to return
/// non-negative costs.
pub trait CostModel {
    fn insert(&self, label: &str) -> f64;
    fn delete(&self, label: &str) -> f64;
    fn rename(&self, from: &str, to: &str) -> f64;

    /// A label-independent lower bound on insert/delete cost, used by the
    /// early-termination size heuristic. 1.0 is correct for every cost
    /// model in this crate; override only if a model can produce cheaper
    /// operations.
    fn min_unit_cost(&self) -> f64 {
        1.0
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultCostModel;

impl CostModel for DefaultCostModel {
    fn insert(&self, _label: &str) -> f64 {
        1.0
    }
    fn delete(&self, _label: &str) -> f64 {
        1.0
    }
    fn rename(&self, from: &str, to: &str) -> f64 {
        if from == to {
            0.0
        } else {
            1.0
        }
    }
}

const STRUCTURAL_LABELS: &[&str] = &[
    "FunctionDeclaration",
    "FunctionExpression",
    "ArrowFunction",
    "AsyncFunction",
    "GeneratorFunction",
    "Class",
    "ClassExpression",
    "MethodDefinition",
    "BlockStatement",
];

fn base_kind(label: &str) -> &str {
    label.split('(').next().unwrap_or(label)
}

fn structural_weight(label: &str) -> f64 {
    if STRUCTURAL_LABELS.contains(&base_kind(label)) {
        2.0
    } else {
        1.0
    }
}

/// Weights structural labels (function/class/block) above leaf
/// expressions and discounts renames between nodes sharing a base kind;
/// optionally treats literal-value and identifier-name differences as
/// free.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsCostModel {
    pub ignore_literals: bool,
    pub ignore_identifiers: bool,
}

impl CostModel for JsCostModel {
    fn insert(&self, label: &str) -> f64 {
        structural_weight(label)
    }

    fn delete(&self, label: &str) -> f64 {
        structural_weight(label)
    }

    fn rename(&self, from: &str, to: &str) -> f64 {
        if from == to {
            return 0.0;
        }
        let (base_from, base_to) = (base_kind(from), base_kind(to));
        if base_from != base_to {
            return structural_weight(from).max(structural_weight(to));
        }
        let is_literal_kind = matches!(base_from, "Literal" | "StringLiteral" | "NumberLiteral");
        if (self.ignore_literals && is_literal_kind) || (self.ignore_identifiers && base_from == "Identifier") {
            return 0.0;
        }
        0.5 * structural_weight(from).max(structural_weight(to))
    }
}

/// Scales another cost model's three operations by fixed factors.
#[derive(Debug, Clone, Copy)]
pub struct WeightedCostModel<M> {
    pub inner: M,
    pub insert_factor: f64,
    pub delete_factor: f64,
    pub rename_factor: f64,
}

impl<M: CostModel> CostModel for WeightedCostModel<M> {
    fn insert(&self, label: &str) -> f64 {
        self.inner.insert(label) * self.insert_factor
    }
    fn delete(&self, label: &str) -> f64 {
        self.inner.delete(label) * self.delete_factor
    }
    fn rename(&self, from: &str, to: &str) -> f64 {
        self.inner.rename(from, to) * self.rename_factor
    }
    fn min_unit_cost(&self) -> f64 {
        self.inner.min_unit_cost() * self.insert_factor.min(self.delete_factor)
    }
}

fn sum_insert_cost(t: &PreparedTree, cost: &dyn CostModel) -> f64 {
    (1..=t.n).map(|i| cost.insert(t.label(i))).sum()
}

struct TdTable {
    n2: usize,
    data: Vec<f64>,
}

impl TdTable {
    fn new(n1: usize, n2: usize) -> Self {
        Self {
            n2,
            data: vec![0.0; (n1 + 1) * (n2 + 1)],
        }
    }

    fn get(&self, i: usize, j: usize) -> f64 {
        self.data[i * (self.n2 + 1) + j]
    }

    fn set(&mut self, i: usize, j: usize, v: f64) {
        self.data[i * (self.n2 + 1) + j] = v;
    }
}

/// Fills the forest-distance table for the forests rooted at `kr1`/`kr2`
/// and copies full-subtree distances into `td` wherever a cell sits on
/// both key roots' leftmost paths.
fn compute_forest_distance(kr1: usize, kr2: usize, t1: &PreparedTree, t2: &PreparedTree, cost: &dyn CostModel, td: &mut TdTable) {
    let l1 = t1.lld[kr1 - 1];
    let l2 = t2.lld[kr2 - 1];
    let rows = kr1 - l1 + 2;
    let cols = kr2 - l2 + 2;
    let mut fd = vec![vec![0.0f64; cols]; rows];

    for r in 1..rows {
        let i = l1 - 1 + r;
        fd[r][0] = fd[r - 1][0] + cost.delete(t1.label(i));
    }
    for c in 1..cols {
        let j = l2 - 1 + c;
        fd[0][c] = fd[0][c - 1] + cost.insert(t2.label(j));
    }

    for r in 1..rows {
        let i = l1 - 1 + r;
        let li = t1.lld[i - 1];
        for c in 1..cols {
            let j = l2 - 1 + c;
            let lj = t2.lld[j - 1];

            let del = fd[r - 1][c] + cost.delete(t1.label(i));
            let ins = fd[r][c - 1] + cost.insert(t2.label(j));

            if li == l1 && lj == l2 {
                let ren = fd[r - 1][c - 1] + cost.rename(t1.label(i), t2.label(j));
                let v = del.min(ins).min(ren);
                fd[r][c] = v;
                td.set(i, j, v);
            } else {
                let far = fd[li - l1][lj - l2] + td.get(i, j);
                fd[r][c] = del.min(ins).min(far);
            }
        }
    }
}

/// Runs the full key-root decomposition between two already-prepared
/// trees. Refuses with [`AnalysisError::TooLarge`] rather than allocate
/// the O(n1·n2) distance table when either tree exceeds `max_tree_size`.
pub fn apted_distance(t1: &PreparedTree, t2: &PreparedTree, cost: &dyn CostModel, max_tree_size: usize) -> Result<f64, AnalysisError> {
    if t1.n == 0 && t2.n == 0 {
        return Ok(0.0);
    }
    if t1.n == 0 {
        return Ok(sum_insert_cost(t2, cost));
    }
    if t2.n == 0 {
        return Ok(sum_insert_cost(t1, cost));
    }
    if t1.n > max_tree_size || t2.n > max_tree_size {
        return Err(AnalysisError::TooLarge(format!(
            "tree pair ({}, {}) exceeds max_tree_size {max_tree_size}",
            t1.n, t2.n
        )));
    }

    let mut td = TdTable::new(t1.n, t2.n);
    for &kr1 in &t1.key_roots {
        for &kr2 in &t2.key_roots {
            compute_forest_distance(kr1, kr2, t1, t2, cost, &mut td);
        }
    }
    Ok(td.get(t1.n, t2.n))
}

/// 1 − distance / max(1, sum of insertion costs over both trees), clamped
/// to [0, 1].
pub fn similarity(distance: f64, t1: &PreparedTree, t2: &PreparedTree, cost: &dyn CostModel) -> f64 {
    let denom = (sum_insert_cost(t1, cost) + sum_insert_cost(t2, cost)).max(1.0);
    (1.0 - distance / denom).clamp(0.0, 1.0)
}

/// Top-level entry point: prepares both trees, applies the
/// early-termination bound if given, then runs the full algorithm.
/// Absent trees (`None`) are handled as edge cases: both absent is distance
/// 0; exactly one absent is that tree's total insertion cost.
pub fn tree_distance(
    t1: Option<&Tree>,
    t2: Option<&Tree>,
    cost: &dyn CostModel,
    max_tree_size: usize,
    early_termination_bound: Option<f64>,
) -> Result<f64, AnalysisError> {
    match (t1, t2) {
        (None, None) => Ok(0.0),
        (Some(t), None) | (None, Some(t)) => Ok(sum_insert_cost(&prepare(t), cost)),
        (Some(a), Some(b)) => {
            let (pa, pb) = (prepare(a), prepare(b));
            if let Some(bound) = early_termination_bound {
                let diff = (pa.n as isize - pb.n as isize).unsigned_abs() as f64;
                let lower_bound = diff * cost.min_unit_cost();
                if lower_bound > bound {
                    return Ok(lower_bound);
                }
            }
            apted_distance(&pa, &pb, cost, max_tree_size)
        }
    }
}

/// Computes distances for a list of tree pairs independently.
pub fn batch_compute_distances(
    pairs: &[(Tree, Tree)],
    cost: &dyn CostModel,
    max_tree_size: usize,
    early_termination_bound: Option<f64>,
) -> Vec<Result<f64, AnalysisError>> {
    pairs
        .iter()
        .map(|(a, b)| tree_distance(Some(a), Some(b), cost, max_tree_size, early_termination_bound))
        .collect()
}

struct UnionFind {
    parent: Vec<usize>,
    rank: Vec<u8>,
}

impl UnionFind {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
            rank: vec![0; n],
        }
    }

    fn find(&mut self, x: usize) -> usize {
        if self.parent[x] != x {
            self.parent[x] = self.find(self.parent[x]);
        }
        self.parent[x]
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra == rb {
            return;
        }
        match self.rank[ra].cmp(&self.rank[rb]) {
            std::cmp::Ordering::Less => self.parent[ra] = rb,
            std::cmp::Ordering::Greater => self.parent[rb] = ra,
            std::cmp::Ordering::Equal => {
                self.parent[rb] = ra;
                self.rank[ra] += 1;
            }
        }
    }

    fn groups(&mut self) -> Vec<Vec<usize>> {
        let mut groups: AHashMap<usize, Vec<usize>> = AHashMap::default();
        for i in 0..self.parent.len() {
            let root = self.find(i);
            groups.entry(root).or_default().push(i);
        }
        let mut out: Vec<Vec<usize>> = groups.into_values().collect();
        out.sort_by_key(|g| g[0]);
        out
    }
}

/// Groups trees by union-find over all O(n²) pairs with similarity at or
/// above `threshold`. Callers with large `n` are expected to prefilter
/// candidates with the LSH index before calling this.
pub fn cluster_similar_trees(trees: &[Tree], cost: &dyn CostModel, threshold: f64, max_tree_size: usize) -> Vec<Vec<usize>> {
    let prepared: Vec<PreparedTree> = trees.iter().map(prepare).collect();
    let mut uf = UnionFind::new(trees.len());

    for i in 0..trees.len() {
        for j in (i + 1)..trees.len() {
            if prepared[i].n > max_tree_size || prepared[j].n > max_tree_size {
                continue;
            }
            if let Ok(distance) = apted_distance(&prepared[i], &prepared[j], cost, max_tree_size) {
                if similarity(distance, &prepared[i], &prepared[j], cost) >= threshold {
                    uf.union(i, j);
                }
            }
        }
    }
    uf.groups()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(b: &mut TreeBuilder, label: &str) -> usize {
        b.add(label, None)
    }

    /// `Root{Child}` vs `Root{Child}` (identical trees): distance 0,
    /// similarity 1.
    #[test]
    fn identical_trees_have_zero_distance_and_full_similarity() {
        let mut b1 = TreeBuilder::new();
        let child1 = leaf(&mut b1, "Child");
        let root1 = b1.add("Root", None);
        b1.push_child(root1, child1);
        let t1 = b1.finish(root1);

        let mut b2 = TreeBuilder::new();
        let child2 = leaf(&mut b2, "Child");
        let root2 = b2.add("Root", None);
        b2.push_child(root2, child2);
        let t2 = b2.finish(root2);

        let cost = DefaultCostModel;
        let distance = tree_distance(Some(&t1), Some(&t2), &cost, 10_000, None).unwrap();
        assert_eq!(distance, 0.0);

        let (p1, p2) = (prepare(&t1), prepare(&t2));
        assert_eq!(similarity(distance, &p1, &p2, &cost), 1.0);
    }

    /// `A{B}` vs `X{Y,Z}` under the default cost model: distance 3
    /// (rename A→X, rename B→Y, insert Z); similarity 1 − 3/5 = 0.4.
    #[test]
    fn literal_scenario_distance_and_similarity() {
        let mut b1 = TreeBuilder::new();
        let b = leaf(&mut b1, "B");
        let a = b1.add("A", None);
        b1.push_child(a, b);
        let t1 = b1.finish(a);

        let mut b2 = TreeBuilder::new();
        let y = leaf(&mut b2, "Y");
        let z = leaf(&mut b2, "Z");
        let x = b2.add("X", None);
        b2.push_child(x, y);
        b2.push_child(x, z);
        let t2 = b2.finish(x);

        let cost = DefaultCostModel;
        let distance = tree_distance(Some(&t1), Some(&t2), &cost, 10_000, None).unwrap();
        assert_eq!(distance, 3.0);

        let (p1, p2) = (prepare(&t1), prepare(&t2));
        assert!((similarity(distance, &p1, &p2, &cost) - 0.4).abs() < 1e-9);
    }

    #[test]
    fn distance_is_symmetric() {
        let mut b1 = TreeBuilder::new();
        let b = leaf(&mut b1, "B");
        let a = b1.add("A", None);
        b1.push_child(a, b);
        let t1 = b1.finish(a);

        let mut b2 = TreeBuilder::new();
        let y = leaf(&mut b2, "Y");
        let z = leaf(&mut b2, "Z");
        let x = b2.add("X", None);
        b2.push_child(x, y);
        b2.push_child(x, z);
        let t2 = b2.finish(x);

        let cost = DefaultCostModel;
        let d1 = tree_distance(Some(&t1), Some(&t2), &cost, 10_000, None).unwrap();
        let d2 = tree_distance(Some(&t2), Some(&t1), &cost, 10_000, None).unwrap();
        assert_eq!(d1, d2);
    }

    #[test]
    fn one_absent_tree_costs_its_full_insertion() {
        let mut b1 = TreeBuilder::new();
        let child = leaf(&mut b1, "Child");
        let root = b1.add("Root", None);
        b1.push_child(root, child);
        let t1 = b1.finish(root);

        let cost = DefaultCostModel;
        let distance = tree_distance(Some(&t1), None, &cost, 10_000, None).unwrap();
        assert_eq!(distance, 2.0);
    }

    #[test]
    fn both_absent_trees_have_zero_distance() {
        let cost = DefaultCostModel;
        assert_eq!(tree_distance(None, None, &cost, 10_000, None).unwrap(), 0.0);
    }

    #[test]
    fn oversized_tree_pair_refuses_with_too_large() {
        let mut b1 = TreeBuilder::new();
        let leaf1 = leaf(&mut b1, "Leaf");
        let t1 = b1.finish(leaf1);
        let mut b2 = TreeBuilder::new();
        let leaf2 = leaf(&mut b2, "Leaf");
        let t2 = b2.finish(leaf2);

        let cost = DefaultCostModel;
        let err = tree_distance(Some(&t1), Some(&t2), &cost, 0, None).unwrap_err();
        assert!(matches!(err, AnalysisError::TooLarge(_)));
    }

    #[test]
    fn js_cost_model_discounts_same_base_kind_rename() {
        let cost = JsCostModel::default();
        let full = cost.rename("Identifier(foo)", "BinaryExpression(x)");
        let discounted = cost.rename("Identifier(foo)", "Identifier(bar)");
        assert!(discounted < full);
    }

    #[test]
    fn js_cost_model_ignores_identifier_renames_when_configured() {
        let cost = JsCostModel {
            ignore_identifiers: true,
            ..Default::default()
        };
        assert_eq!(cost.rename("Identifier(foo)", "Identifier(bar)"), 0.0);
    }

    #[test]
    fn ast_to_tree_preserves_structure_and_labels() {
        use canopy_ast::{AstBuilder, Location, NodeKind};

        let mut ab = AstBuilder::new();
        let loc = Location::new("f.ts", 1, 1, 0, 1);
        let if_stmt = ab.add(NodeKind::IfStatement, loc.clone());
        let consequent = ab.add(NodeKind::BlockStatement, loc.clone());
        ab.node_mut(if_stmt).consequent = Some(consequent);
        ab.set_parent(consequent, if_stmt);
        let ast = ab.finish(if_stmt);

        let tree = ast_to_tree(&ast, if_stmt);
        assert_eq!(tree.len(), 2);
        assert_eq!(tree.nodes[0].label, "IfStatement");
        assert_eq!(tree.nodes[0].children.len(), 1);
        assert_eq!(tree.nodes[tree.nodes[0].children[0]].label, "BlockStatement");
    }

    #[test]
    fn clustering_groups_near_identical_trees() {
        let mut trees = Vec::new();
        for label in ["A", "A", "Z"] {
            let mut b = TreeBuilder::new();
            let root = b.add(label, None);
            trees.push(b.finish(root));
        }
        let cost = DefaultCostModel;
        let groups = cluster_similar_trees(&trees, &cost, 0.99, 10_000);
        assert_eq!(groups.len(), 2);
        let sizes: Vec<usize> = groups.iter().map(Vec::len).collect();
        assert!(sizes.contains(&2));
        assert!(sizes.contains(&1));
    }
}
