//! Cyclomatic complexity over a function's control-flow graph.
//!
//! The McCabe term (`E - N + 2`) comes straight out of the CFG's edge and
//! block counts; everything language-specific — `&&`/`||`/`??` and `?:`,
//! which don't introduce new CFG edges but are still additional decision
//! points by any conventional definition of complexity — is layered on top
//! by walking the statements the blocks point back into.

use canopy_ast::{Ast, NodeId, NodeKind};
use canopy_cfg::Cfg;
use canopy_config::ComplexityThresholds;
use canopy_hash::AHashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DetailedMetrics {
    pub nodes: usize,
    pub edges: usize,
    pub if_statements: usize,
    pub loop_statements: usize,
    pub exception_handlers: usize,
    pub switch_cases: usize,
    pub logical_operators: usize,
    pub ternary_operators: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComplexityResult {
    pub function_name: String,
    pub complexity: u32,
    pub risk_level: RiskLevel,
    pub metrics: DetailedMetrics,
    pub warnings: Vec<String>,
}

/// The fixed high-water mark at which a "high_complexity" warning fires,
/// independent of whatever `maxComplexity` a caller has configured.
const HIGH_COMPLEXITY_WATERMARK: u32 = 20;

pub fn calculate_complexity(cfg: &Cfg, ast: &Ast, thresholds: &ComplexityThresholds) -> ComplexityResult {
    let n = cfg.block_count() as i64;
    let e = cfg.edge_count() as i64;
    let mccabe = (e - n + 2).max(1) as u32;

    let (metrics, contributor_sum) = collect_metrics(cfg, ast);
    let complexity = mccabe + contributor_sum;

    let risk_level = if complexity <= thresholds.low {
        RiskLevel::Low
    } else if complexity <= thresholds.medium {
        RiskLevel::Medium
    } else {
        RiskLevel::High
    };

    let mut warnings = Vec::new();
    if complexity > thresholds.max {
        warnings.push("max_complexity_exceeded".to_string());
    }
    if complexity > HIGH_COMPLEXITY_WATERMARK {
        warnings.push("high_complexity".to_string());
    }

    ComplexityResult {
        function_name: cfg.function_name.clone(),
        complexity,
        risk_level,
        metrics,
        warnings,
    }
}

/// Walks every block's statements back into the AST, counting contributing
/// node kinds exactly once each (a node reachable from more than one
/// block's statement list — CFG builders commonly re-point at the same
/// condition expression from several blocks — is only ever counted on its
/// first visit) and never crossing into a nested function's own body.
fn collect_metrics(cfg: &Cfg, ast: &Ast) -> (DetailedMetrics, u32) {
    let mut metrics = DetailedMetrics::default();
    let mut contributor_sum: u32 = 0;
    let mut visited: AHashSet<NodeId> = AHashSet::default();

    for block in cfg.blocks() {
        for &stmt in &block.statements {
            ast.walk(stmt, |node| {
                if !visited.insert(node.id) {
                    return false;
                }
                metrics.nodes += 1;
                match node.kind {
                    NodeKind::IfStatement => metrics.if_statements += 1,
                    NodeKind::ForStatement | NodeKind::WhileStatement | NodeKind::DoWhileStatement => {
                        metrics.loop_statements += 1
                    }
                    NodeKind::CatchClause => metrics.exception_handlers += 1,
                    NodeKind::SwitchCase => metrics.switch_cases += 1,
                    NodeKind::LogicalExpression => {
                        metrics.logical_operators += 1;
                        contributor_sum += 1;
                    }
                    NodeKind::ConditionalExpression => {
                        metrics.ternary_operators += 1;
                        contributor_sum += 1;
                    }
                    _ => {}
                }
                !node.kind.is_function_boundary()
            });
        }
    }

    metrics.edges = cfg.edge_count();
    (metrics, contributor_sum)
}

#[cfg(test)]
mod tests {
    use super::*;
    use canopy_ast::{AstBuilder, Location};
    use canopy_cfg::{CfgBuilder, EdgeKind};

    fn loc(line: u32) -> Location {
        Location::new("f.ts", line, line, 0, 1)
    }

    fn default_thresholds() -> ComplexityThresholds {
        ComplexityThresholds {
            low: 5,
            medium: 10,
            max: 20,
        }
    }

    /// `entry -> exit` with a single statement: E=1, N=2, mccabe = max(1, 1-2+2) = 1.
    #[test]
    fn linear_function_has_complexity_one() {
        let mut ab = AstBuilder::new();
        let program = ab.add(canopy_ast::NodeKind::Program, loc(1));
        let stmt = ab.add(canopy_ast::NodeKind::ExpressionStatement, loc(1));
        ab.push_body(program, stmt);
        let ast = ab.finish(program);

        let mut cb = CfgBuilder::new();
        let entry = cb.add_block();
        let exit = cb.add_block();
        cb.push_statement(entry, stmt);
        cb.add_edge(entry, exit, EdgeKind::Normal);
        let cfg = cb.finish("f", entry, exit);

        let result = calculate_complexity(&cfg, &ast, &default_thresholds());
        assert_eq!(result.complexity, 1);
        assert_eq!(result.risk_level, RiskLevel::Low);
        assert!(result.warnings.is_empty());
    }

    /// entry -> (true) -> exit, entry -> (false) -> exit: E=2, N=3,
    /// mccabe = 2-3+2 = 1, plus one LogicalExpression contributor inside
    /// the condition statement = 2 total.
    #[test]
    fn branch_plus_logical_expression_adds_contributor() {
        let mut ab = AstBuilder::new();
        let program = ab.add(canopy_ast::NodeKind::Program, loc(1));
        let if_stmt = ab.add(canopy_ast::NodeKind::IfStatement, loc(1));
        let logical = ab.add(canopy_ast::NodeKind::LogicalExpression, loc(1));
        ab.node_mut(if_stmt).test = Some(logical);
        ab.set_parent(logical, if_stmt);
        ab.push_body(program, if_stmt);
        let ast = ab.finish(program);

        let mut cb = CfgBuilder::new();
        let entry = cb.add_block();
        let exit = cb.add_block();
        cb.push_statement(entry, if_stmt);
        cb.add_edge(entry, exit, EdgeKind::ConditionalTrue);
        cb.add_edge(entry, exit, EdgeKind::ConditionalFalse);
        let cfg = cb.finish("f", entry, exit);

        let result = calculate_complexity(&cfg, &ast, &default_thresholds());
        assert_eq!(result.metrics.if_statements, 1);
        assert_eq!(result.metrics.logical_operators, 1);
        assert_eq!(result.complexity, 2);
    }

    #[test]
    fn contributor_does_not_descend_into_nested_function() {
        let mut ab = AstBuilder::new();
        let program = ab.add(canopy_ast::NodeKind::Program, loc(1));
        let outer_stmt = ab.add(canopy_ast::NodeKind::ExpressionStatement, loc(1));
        let nested_fn = ab.add(canopy_ast::NodeKind::FunctionExpression, loc(2));
        let nested_logical = ab.add(canopy_ast::NodeKind::LogicalExpression, loc(3));
        ab.push_body(program, outer_stmt);
        ab.node_mut(outer_stmt).argument = Some(nested_fn);
        ab.set_parent(nested_fn, outer_stmt);
        ab.node_mut(nested_fn).body.push(nested_logical);
        ab.set_parent(nested_logical, nested_fn);
        let ast = ab.finish(program);

        let mut cb = CfgBuilder::new();
        let entry = cb.add_block();
        let exit = cb.add_block();
        cb.push_statement(entry, outer_stmt);
        cb.add_edge(entry, exit, EdgeKind::Normal);
        let cfg = cb.finish("outer", entry, exit);

        let result = calculate_complexity(&cfg, &ast, &default_thresholds());
        assert_eq!(result.metrics.logical_operators, 0);
        assert_eq!(result.complexity, 1);
    }

    #[test]
    fn high_complexity_warnings_fire_past_thresholds() {
        let thresholds = ComplexityThresholds {
            low: 1,
            medium: 2,
            max: 3,
        };
        let mut ab = AstBuilder::new();
        let program = ab.add(canopy_ast::NodeKind::Program, loc(1));
        let stmt = ab.add(canopy_ast::NodeKind::ExpressionStatement, loc(1));
        let mut prev_logical = None;
        for i in 0..25 {
            let cond = ab.add(canopy_ast::NodeKind::LogicalExpression, loc(i));
            if let Some(prev) = prev_logical {
                ab.node_mut(cond).argument = Some(prev);
                ab.set_parent(prev, cond);
            }
            prev_logical = Some(cond);
        }
        ab.node_mut(stmt).argument = prev_logical;
        if let Some(top) = prev_logical {
            ab.set_parent(top, stmt);
        }
        ab.push_body(program, stmt);
        let ast = ab.finish(program);

        let mut cb = CfgBuilder::new();
        let entry = cb.add_block();
        let exit = cb.add_block();
        cb.push_statement(entry, stmt);
        cb.add_edge(entry, exit, EdgeKind::Normal);
        let cfg = cb.finish("f", entry, exit);

        let result = calculate_complexity(&cfg, &ast, &thresholds);
        assert_eq!(result.risk_level, RiskLevel::High);
        assert!(result.warnings.contains(&"max_complexity_exceeded".to_string()));
        assert!(result.warnings.contains(&"high_complexity".to_string()));
    }
}
