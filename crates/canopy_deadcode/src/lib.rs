//! Reachability analysis and dead-code finding extraction over a CFG.
//!
//! Three passes run in sequence: an intra-block scan for statements
//! stranded after a terminator in the *same* block, a structural
//! reachability traversal from entry, and an "all paths return" refinement
//! that strips blocks a universally-returning predecessor can never fall
//! into. Everything else (which blocks exist, how they're wired) is the
//! CFG builder's problem, not this crate's.

use canopy_ast::{Ast, Location, NodeKind};
use canopy_cfg::{BlockId, Cfg, EdgeKind};
use canopy_hash::{AHashMap, AHashSet};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeadCodeReason {
    UnreachableAfterReturn,
    UnreachableAfterBreak,
    UnreachableAfterContinue,
    UnreachableAfterThrow,
    UnreachableBranch,
    UnreachableAfterInfiniteLoop,
}

impl DeadCodeReason {
    pub fn severity(self) -> Severity {
        match self {
            DeadCodeReason::UnreachableAfterReturn | DeadCodeReason::UnreachableAfterThrow => Severity::Critical,
            DeadCodeReason::UnreachableAfterBreak
            | DeadCodeReason::UnreachableAfterContinue
            | DeadCodeReason::UnreachableBranch => Severity::Warning,
            DeadCodeReason::UnreachableAfterInfiniteLoop => Severity::Info,
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            DeadCodeReason::UnreachableAfterReturn => "this code can never run: it follows a return statement",
            DeadCodeReason::UnreachableAfterBreak => "this code can never run: it follows a break statement",
            DeadCodeReason::UnreachableAfterContinue => "this code can never run: it follows a continue statement",
            DeadCodeReason::UnreachableAfterThrow => "this code can never run: it follows a throw statement",
            DeadCodeReason::UnreachableBranch => "this branch can never be taken",
            DeadCodeReason::UnreachableAfterInfiniteLoop => "this code follows a loop that never exits",
        }
    }
}

#[derive(Debug, Clone)]
pub struct DeadCodeFinding {
    pub block_id: BlockId,
    pub file_path: Option<std::path::PathBuf>,
    pub function_name: String,
    pub start_line: u32,
    pub end_line: u32,
    pub severity: Severity,
    pub reason: DeadCodeReason,
    pub code_snippet: String,
    pub description: &'static str,
}

#[derive(Debug, Clone)]
pub struct DeadCodeReport {
    pub reachable_count: usize,
    pub unreachable_count: usize,
    pub findings: Vec<DeadCodeFinding>,
    pub duration: Duration,
    pub reachable_ratio: f64,
}

const SNIPPET_MAX_LEN: usize = 80;

fn snippet_for(ast: &Ast, node_id: canopy_ast::NodeId) -> String {
    let text = ast
        .node(node_id)
        .and_then(|n| n.raw.clone())
        .unwrap_or_else(|| ast.node(node_id).map(|n| format!("{:?}", n.kind)).unwrap_or_default());
    if text.len() > SNIPPET_MAX_LEN {
        format!("{}...", &text[..SNIPPET_MAX_LEN])
    } else {
        text
    }
}

fn terminator_reason(kind: NodeKind) -> Option<DeadCodeReason> {
    match kind {
        NodeKind::ReturnStatement => Some(DeadCodeReason::UnreachableAfterReturn),
        NodeKind::ThrowStatement => Some(DeadCodeReason::UnreachableAfterThrow),
        NodeKind::BreakStatement => Some(DeadCodeReason::UnreachableAfterBreak),
        NodeKind::ContinueStatement => Some(DeadCodeReason::UnreachableAfterContinue),
        _ => None,
    }
}

pub fn analyze_dead_code(cfg: &Cfg, ast: &Ast, file_path: Option<&std::path::Path>) -> DeadCodeReport {
    let started = Instant::now();
    let mut findings = Vec::new();

    intra_block_findings(cfg, ast, file_path, &mut findings);

    let structurally_reachable = structural_reachability(cfg);
    let killed_by_return = universally_returns_refinement(cfg, ast, &structurally_reachable);

    let final_reachable: AHashSet<BlockId> = structurally_reachable
        .iter()
        .copied()
        .filter(|b| !killed_by_return.contains(b))
        .collect();

    for block in cfg.blocks() {
        if final_reachable.contains(&block.id) || block.is_empty() {
            continue;
        }
        let reason = if killed_by_return.contains(&block.id) {
            DeadCodeReason::UnreachableAfterReturn
        } else {
            structural_reason(cfg, block.id)
        };
        findings.push(finding_for_block(cfg, ast, file_path, block.id, reason));
    }

    findings.sort_by_key(|f| f.start_line);

    let total = cfg.block_count();
    let reachable_count = final_reachable.len();
    let unreachable_count = total.saturating_sub(reachable_count);
    let reachable_ratio = if total == 0 { 1.0 } else { reachable_count as f64 / total as f64 };

    DeadCodeReport {
        reachable_count,
        unreachable_count,
        findings,
        duration: started.elapsed(),
        reachable_ratio,
    }
}

/// Flags statements stranded after a terminator within the same block —
/// the CFG builder put them in the block for source fidelity, but they can
/// never execute once their block is entered.
fn intra_block_findings(
    cfg: &Cfg,
    ast: &Ast,
    file_path: Option<&std::path::Path>,
    out: &mut Vec<DeadCodeFinding>,
) {
    for block in cfg.blocks() {
        let mut terminator_reason_seen = None;
        let mut dead_tail: Vec<canopy_ast::NodeId> = Vec::new();
        for &stmt in &block.statements {
            if terminator_reason_seen.is_some() {
                dead_tail.push(stmt);
                continue;
            }
            if let Some(kind) = ast.node(stmt).map(|n| n.kind) {
                if let Some(reason) = terminator_reason(kind) {
                    terminator_reason_seen = Some(reason);
                }
            }
        }
        let Some(reason) = terminator_reason_seen else {
            continue;
        };
        if dead_tail.is_empty() {
            continue;
        }
        let locations: Vec<&Location> = dead_tail.iter().filter_map(|id| ast.node(*id).map(|n| &n.location)).collect();
        let Some(start) = locations.iter().map(|l| l.start_line).min() else {
            continue;
        };
        let end = locations.iter().map(|l| l.end_line).max().unwrap_or(start);
        out.push(DeadCodeFinding {
            block_id: block.id,
            file_path: file_path.map(|p| p.to_path_buf()),
            function_name: cfg.function_name.clone(),
            start_line: start,
            end_line: end,
            severity: reason.severity(),
            reason,
            code_snippet: snippet_for(ast, dead_tail[0]),
            description: reason.description(),
        });
    }
}

fn structural_reachability(cfg: &Cfg) -> AHashSet<BlockId> {
    let mut visited = AHashSet::default();
    let mut stack = vec![cfg.entry];
    while let Some(id) = stack.pop() {
        if !visited.insert(id) {
            continue;
        }
        if let Some(block) = cfg.block(id) {
            for edge in &block.successors {
                if !visited.contains(&edge.to) {
                    stack.push(edge.to);
                }
            }
        }
    }
    visited
}

/// A predecessor-of-loop-condition marker: a block is a "loop condition"
/// block if one of its outgoing edges loops back. Used only to recognize
/// the infinite-loop dead-code pattern.
fn is_loop_condition_block(cfg: &Cfg, id: BlockId) -> bool {
    cfg.block(id)
        .map(|b| b.successors.iter().any(|e| e.kind == EdgeKind::LoopBack))
        .unwrap_or(false)
}

fn structural_reason(cfg: &Cfg, block_id: BlockId) -> DeadCodeReason {
    let Some(block) = cfg.block(block_id) else {
        return DeadCodeReason::UnreachableBranch;
    };
    if block
        .predecessors
        .iter()
        .any(|e| e.kind == EdgeKind::ConditionalFalse && is_loop_condition_block(cfg, e.from))
    {
        return DeadCodeReason::UnreachableAfterInfiniteLoop;
    }
    if block.predecessors.iter().any(|e| e.kind == EdgeKind::Throw) {
        return DeadCodeReason::UnreachableAfterThrow;
    }
    if block.predecessors.iter().any(|e| e.kind == EdgeKind::Break) {
        return DeadCodeReason::UnreachableAfterBreak;
    }
    if block.predecessors.iter().any(|e| e.kind == EdgeKind::Continue) {
        return DeadCodeReason::UnreachableAfterContinue;
    }
    if block.predecessors.iter().any(|e| e.kind == EdgeKind::Return) {
        return DeadCodeReason::UnreachableAfterReturn;
    }
    DeadCodeReason::UnreachableBranch
}

/// Phase 2: a block "universally returns" if it contains a `return`, or it
/// isn't the exit block, has at least one non-return successor, and every
/// successor edge other than a return-to-exit edge also universally
/// returns. A block revisited while still being computed (a cycle) is
/// treated as not universally returning for that path, which is enough to
/// guarantee termination without caching a wrong answer: the cycle edge
/// itself can never be the reason a block DOES universally return.
fn universally_returns_refinement(
    cfg: &Cfg,
    ast: &Ast,
    structurally_reachable: &AHashSet<BlockId>,
) -> AHashSet<BlockId> {
    let mut memo: AHashMap<BlockId, bool> = AHashMap::default();
    let mut in_progress: AHashSet<BlockId> = AHashSet::default();
    let mut killed = AHashSet::default();

    for &id in structurally_reachable {
        if universally_returns(id, cfg, ast, &mut in_progress, &mut memo) {
            if let Some(block) = cfg.block(id) {
                for edge in &block.successors {
                    if edge.kind == EdgeKind::Normal {
                        flood_normal(edge.to, cfg, &mut killed);
                    }
                }
            }
        }
    }
    killed
}

fn flood_normal(start: BlockId, cfg: &Cfg, killed: &mut AHashSet<BlockId>) {
    let mut stack = vec![start];
    while let Some(id) = stack.pop() {
        if !killed.insert(id) {
            continue;
        }
        if let Some(block) = cfg.block(id) {
            for edge in &block.successors {
                if edge.kind == EdgeKind::Normal {
                    stack.push(edge.to);
                }
            }
        }
    }
}

fn contains_return(cfg: &Cfg, ast: &Ast, id: BlockId) -> bool {
    cfg.block(id)
        .map(|b| {
            b.statements
                .iter()
                .any(|s| ast.node(*s).map(|n| n.kind == NodeKind::ReturnStatement).unwrap_or(false))
        })
        .unwrap_or(false)
}

fn universally_returns(
    id: BlockId,
    cfg: &Cfg,
    ast: &Ast,
    in_progress: &mut AHashSet<BlockId>,
    memo: &mut AHashMap<BlockId, bool>,
) -> bool {
    if let Some(&cached) = memo.get(&id) {
        return cached;
    }
    if in_progress.contains(&id) {
        return false;
    }
    if contains_return(cfg, ast, id) {
        memo.insert(id, true);
        return true;
    }
    if id == cfg.exit {
        memo.insert(id, false);
        return false;
    }
    let Some(block) = cfg.block(id) else {
        memo.insert(id, false);
        return false;
    };

    let has_non_return_successor = block.successors.iter().any(|e| e.kind != EdgeKind::Return);
    if !has_non_return_successor {
        memo.insert(id, false);
        return false;
    }

    in_progress.insert(id);
    let result = block.successors.iter().all(|edge| {
        let is_return_to_exit = edge.kind == EdgeKind::Return && edge.to == cfg.exit;
        is_return_to_exit || universally_returns(edge.to, cfg, ast, in_progress, memo)
    });
    in_progress.remove(&id);
    memo.insert(id, result);
    result
}

fn finding_for_block(
    cfg: &Cfg,
    ast: &Ast,
    file_path: Option<&std::path::Path>,
    block_id: BlockId,
    reason: DeadCodeReason,
) -> DeadCodeFinding {
    let block = cfg.block(block_id);
    let locations: Vec<&Location> = block
        .map(|b| b.statements.iter().filter_map(|s| ast.node(*s).map(|n| &n.location)).collect())
        .unwrap_or_default();
    let start_line = locations.iter().map(|l| l.start_line).min().unwrap_or(0);
    let end_line = locations.iter().map(|l| l.end_line).max().unwrap_or(start_line);
    let snippet = block
        .and_then(|b| b.statements.first())
        .map(|s| snippet_for(ast, *s))
        .unwrap_or_default();

    DeadCodeFinding {
        block_id,
        file_path: file_path.map(|p| p.to_path_buf()),
        function_name: cfg.function_name.clone(),
        start_line,
        end_line,
        severity: reason.severity(),
        reason,
        code_snippet: snippet,
        description: reason.description(),
    }
}
