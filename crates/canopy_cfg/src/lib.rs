//! Control-flow graph data model.
//!
//! A CFG builder lives outside this crate — something consumes a function's
//! AST and emits one of these per function. This crate only owns the data
//! model and the handful of invariants the rest of the core relies on:
//! every reachable block is in the map, the entry has no predecessors, the
//! exit has no successors, and every edge appears in both endpoints' lists.

use canopy_ast::NodeId;
use canopy_hash::AHashMap;

pub type BlockId = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdgeKind {
    Normal,
    ConditionalTrue,
    ConditionalFalse,
    LoopBack,
    Return,
    Throw,
    Break,
    Continue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
    pub from: BlockId,
    pub to: BlockId,
    pub kind: EdgeKind,
}

#[derive(Debug, Clone, Default)]
pub struct Block {
    pub id: BlockId,
    /// Opaque references into the originating AST; the CFG doesn't own the
    /// statements, only their ordering within the block.
    pub statements: Vec<NodeId>,
    pub successors: Vec<Edge>,
    pub predecessors: Vec<Edge>,
}

impl Block {
    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct Cfg {
    pub function_name: String,
    pub entry: BlockId,
    pub exit: BlockId,
    blocks: AHashMap<BlockId, Block>,
}

impl Cfg {
    pub fn block(&self, id: BlockId) -> Option<&Block> {
        self.blocks.get(&id)
    }

    pub fn block_ids(&self) -> impl Iterator<Item = BlockId> + '_ {
        self.blocks.keys().copied()
    }

    pub fn blocks(&self) -> impl Iterator<Item = &Block> {
        self.blocks.values()
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    pub fn edge_count(&self) -> usize {
        self.blocks.values().map(|b| b.successors.len()).sum()
    }

    /// Visits every block then every edge, in the shape the contract
    /// describes (`visitBlock` / `visitEdge`). Block visit order is
    /// ascending by ID for determinism; edge visit order follows each
    /// block's successor list.
    pub fn walk(&self, mut visit_block: impl FnMut(&Block), mut visit_edge: impl FnMut(&Edge)) {
        let mut ids: Vec<_> = self.blocks.keys().copied().collect();
        ids.sort_unstable();
        for id in &ids {
            visit_block(&self.blocks[id]);
        }
        for id in &ids {
            for edge in &self.blocks[id].successors {
                visit_edge(edge);
            }
        }
    }

    /// Checks the invariants the rest of the core assumes hold. Not called
    /// on every construction — intended for builders and tests to assert
    /// against, since a hand-built CFG can otherwise silently violate them.
    pub fn check_invariants(&self) -> Result<(), String> {
        let entry = self
            .blocks
            .get(&self.entry)
            .ok_or_else(|| "entry block missing from map".to_string())?;
        if !entry.predecessors.is_empty() {
            return Err("entry block has predecessors".to_string());
        }
        let exit = self
            .blocks
            .get(&self.exit)
            .ok_or_else(|| "exit block missing from map".to_string())?;
        if !exit.successors.is_empty() {
            return Err("exit block has successors".to_string());
        }
        for block in self.blocks.values() {
            for edge in &block.successors {
                let target = self
                    .blocks
                    .get(&edge.to)
                    .ok_or_else(|| format!("edge target {} missing from map", edge.to))?;
                if !target.predecessors.iter().any(|p| p.from == block.id && p.kind == edge.kind) {
                    return Err(format!(
                        "edge {}->{} not mirrored in target's predecessors",
                        block.id, edge.to
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Builds a [`Cfg`] block-by-block, keeping each edge's mirrored copy in
/// sync between the two endpoints automatically.
#[derive(Debug, Default)]
pub struct CfgBuilder {
    blocks: AHashMap<BlockId, Block>,
    next_id: BlockId,
}

impl CfgBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_block(&mut self) -> BlockId {
        let id = self.next_id;
        self.next_id += 1;
        self.blocks.insert(
            id,
            Block {
                id,
                statements: Vec::new(),
                successors: Vec::new(),
                predecessors: Vec::new(),
            },
        );
        id
    }

    pub fn push_statement(&mut self, block: BlockId, stmt: NodeId) {
        self.blocks
            .get_mut(&block)
            .expect("unknown block id")
            .statements
            .push(stmt);
    }

    pub fn add_edge(&mut self, from: BlockId, to: BlockId, kind: EdgeKind) {
        self.blocks
            .get_mut(&from)
            .expect("unknown source block id")
            .successors
            .push(Edge { from, to, kind });
        self.blocks
            .get_mut(&to)
            .expect("unknown target block id")
            .predecessors
            .push(Edge { from, to, kind });
    }

    pub fn finish(self, function_name: impl Into<String>, entry: BlockId, exit: BlockId) -> Cfg {
        Cfg {
            function_name: function_name.into(),
            entry,
            exit,
            blocks: self.blocks,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_produces_invariant_respecting_cfg() {
        let mut b = CfgBuilder::new();
        let entry = b.add_block();
        let mid = b.add_block();
        let exit = b.add_block();
        b.add_edge(entry, mid, EdgeKind::Normal);
        b.add_edge(mid, exit, EdgeKind::Return);
        let cfg = b.finish("f", entry, exit);

        cfg.check_invariants().unwrap();
        assert_eq!(cfg.block_count(), 3);
        assert_eq!(cfg.edge_count(), 2);
    }

    #[test]
    fn detects_entry_with_predecessors() {
        let mut b = CfgBuilder::new();
        let entry = b.add_block();
        let exit = b.add_block();
        b.add_edge(exit, entry, EdgeKind::LoopBack);
        let cfg = b.finish("f", entry, exit);
        assert!(cfg.check_invariants().is_err());
    }

    #[test]
    fn walk_visits_every_block_and_edge() {
        let mut b = CfgBuilder::new();
        let entry = b.add_block();
        let exit = b.add_block();
        b.add_edge(entry, exit, EdgeKind::Normal);
        let cfg = b.finish("f", entry, exit);

        let mut blocks_seen = 0;
        let mut edges_seen = 0;
        cfg.walk(|_| blocks_seen += 1, |_| edges_seen += 1);
        assert_eq!(blocks_seen, 2);
        assert_eq!(edges_seen, 1);
    }
}
