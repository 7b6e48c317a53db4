//! Top-level orchestration: wires every analysis crate into the
//! parallel-per-file pipeline, then the single-worker cross-module pass.
//!
//! Parsing and CFG construction live outside the workspace — callers hand
//! in already-parsed [`canopy_ast::Ast`]s and already-built [`canopy_cfg::Cfg`]s
//! per file. This crate owns only what happens after that: per-file
//! module analysis, complexity, and dead-code run independently (one
//! rayon task per file); the import graph, cross-module detectors, and
//! coupling metrics run afterward against the now-immutable per-file
//! results. Structural similarity (APTED/MinHash) is exposed as on-demand
//! utilities rather than folded into the automatic scan, since fragment
//! comparison is caller-driven rather than a per-file stage.

use canopy_ast::Ast;
use canopy_cfg::Cfg;
use canopy_config::{AptedConfig, CanopyConfig, FeaturesConfig, LshConfig};
use canopy_coupling::{CouplingMetrics, DependencyGraph};
use canopy_errors::AnalysisError;
use canopy_graph::ImportGraph;
use canopy_hash::AHashMap;
use canopy_logger::Logger;
use canopy_module::ModuleInfo;
use canopy_report::{Finding, Reason, Severity};
use canopy_resolve::TsConfigPaths;
use rayon::prelude::*;
use std::hash::Hash;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// One file's externally-produced inputs: its AST and one CFG per function
/// found in it.
#[derive(Debug, Clone)]
pub struct FileUnit {
    pub path: PathBuf,
    pub ast: Ast,
    pub cfgs: Vec<Cfg>,
}

#[derive(Debug, Clone)]
pub struct ScanReport {
    pub findings: Vec<Finding>,
    pub coupling: AHashMap<PathBuf, CouplingMetrics>,
    pub files_analyzed: usize,
    pub duration: Duration,
}

struct PerFileResult {
    path: PathBuf,
    module: ModuleInfo,
    findings: Vec<Finding>,
}

/// Runs the full scan: per-file stages in parallel, then the cross-module
/// detectors and coupling metrics on a single worker once every
/// `ModuleInfo` and the import graph are immutable.
pub fn run_scan(
    root: &Path,
    files: &[FileUnit],
    config: &CanopyConfig,
    ts_paths: Option<&TsConfigPaths>,
    logger: &dyn Logger,
) -> ScanReport {
    let start = Instant::now();
    logger.log(&format!("scanning {} files", files.len()));

    let per_file: Vec<PerFileResult> = files.par_iter().map(|file| analyze_file(file, config)).collect();

    let mut modules: AHashMap<PathBuf, ModuleInfo> = AHashMap::default();
    let mut findings: Vec<Finding> = Vec::new();
    for result in per_file {
        findings.extend(result.findings);
        modules.insert(result.path, result.module);
    }

    let graph = ImportGraph::build(&modules, root, &config.module.alias_patterns, ts_paths);

    findings.extend(cross_module_findings(files, &modules, &graph));

    let coupling = compute_coupling(&modules, &graph);

    canopy_report::sort_findings(&mut findings);
    logger.log(&format!("found {} findings across {} files", findings.len(), files.len()));

    ScanReport {
        findings,
        coupling,
        files_analyzed: files.len(),
        duration: start.elapsed(),
    }
}

fn analyze_file(file: &FileUnit, config: &CanopyConfig) -> PerFileResult {
    let module = canopy_module::analyze_module(&file.path, &file.ast, &config.module.alias_patterns);

    let mut findings = Vec::new();
    for cfg in &file.cfgs {
        let dead = canopy_deadcode::analyze_dead_code(cfg, &file.ast, Some(&file.path));
        findings.extend(dead.findings.into_iter().map(dead_code_finding_to_finding));

        if config.complexity.enabled {
            let result = canopy_complexity::calculate_complexity(cfg, &file.ast, &config.complexity.thresholds);
            findings.extend(complexity_findings(&file.path, cfg, &file.ast, &result));
        }
    }

    PerFileResult {
        path: file.path.clone(),
        module,
        findings,
    }
}

fn dead_code_finding_to_finding(finding: canopy_deadcode::DeadCodeFinding) -> Finding {
    Finding {
        file_path: finding.file_path.unwrap_or_default(),
        function_name: Some(finding.function_name),
        block_id: Some(finding.block_id),
        reason: dead_code_reason(finding.reason),
        severity: dead_code_severity(finding.severity),
        start_line: finding.start_line,
        end_line: finding.end_line,
        description: finding.description.to_string(),
        code_snippet: Some(finding.code_snippet),
    }
}

fn dead_code_reason(reason: canopy_deadcode::DeadCodeReason) -> Reason {
    use canopy_deadcode::DeadCodeReason as D;
    match reason {
        D::UnreachableAfterReturn => Reason::UnreachableAfterReturn,
        D::UnreachableAfterBreak => Reason::UnreachableAfterBreak,
        D::UnreachableAfterContinue => Reason::UnreachableAfterContinue,
        D::UnreachableAfterThrow => Reason::UnreachableAfterThrow,
        D::UnreachableBranch => Reason::UnreachableBranch,
        D::UnreachableAfterInfiniteLoop => Reason::UnreachableAfterInfiniteLoop,
    }
}

fn dead_code_severity(severity: canopy_deadcode::Severity) -> Severity {
    match severity {
        canopy_deadcode::Severity::Info => Severity::Info,
        canopy_deadcode::Severity::Warning => Severity::Warning,
        canopy_deadcode::Severity::Critical => Severity::Critical,
    }
}

/// The location a complexity finding attaches to: the function's entry
/// block's first statement, since `ComplexityResult` itself carries no
/// location, only a function name.
fn cfg_primary_location(ast: &Ast, cfg: &Cfg) -> (u32, u32) {
    cfg.block(cfg.entry)
        .and_then(|block| block.statements.first())
        .and_then(|id| ast.node(*id))
        .map(|node| (node.location.start_line, node.location.end_line))
        .unwrap_or((0, 0))
}

fn complexity_findings(path: &Path, cfg: &Cfg, ast: &Ast, result: &canopy_complexity::ComplexityResult) -> Vec<Finding> {
    let (start_line, end_line) = cfg_primary_location(ast, cfg);
    result
        .warnings
        .iter()
        .map(|warning| {
            let (reason, severity) = match warning.as_str() {
                "max_complexity_exceeded" => (Reason::MaxComplexityExceeded, Severity::Critical),
                _ => (Reason::HighComplexity, Severity::Warning),
            };
            Finding {
                file_path: path.to_path_buf(),
                function_name: Some(result.function_name.clone()),
                block_id: None,
                reason,
                severity,
                start_line,
                end_line,
                description: format!(
                    "{} has cyclomatic complexity {} (risk: {})",
                    result.function_name,
                    result.complexity,
                    risk_label(result.risk_level)
                ),
                code_snippet: None,
            }
        })
        .collect()
}

fn risk_label(risk: canopy_complexity::RiskLevel) -> &'static str {
    match risk {
        canopy_complexity::RiskLevel::Low => "low",
        canopy_complexity::RiskLevel::Medium => "medium",
        canopy_complexity::RiskLevel::High => "high",
    }
}

fn cross_module_findings(files: &[FileUnit], modules: &AHashMap<PathBuf, ModuleInfo>, graph: &ImportGraph) -> Vec<Finding> {
    let asts: AHashMap<PathBuf, Ast> = files.iter().map(|f| (f.path.clone(), f.ast.clone())).collect();
    let mut findings = canopy_graph::detect_unused_imports(modules, &asts);
    findings.extend(canopy_graph::detect_unused_exports(modules, graph));
    findings.extend(canopy_graph::detect_unused_exported_functions(modules, graph));
    findings.extend(canopy_graph::detect_orphan_files(modules, graph));
    findings
}

fn compute_coupling(modules: &AHashMap<PathBuf, ModuleInfo>, graph: &ImportGraph) -> AHashMap<PathBuf, CouplingMetrics> {
    let mut dep_graph: DependencyGraph<PathBuf> = DependencyGraph::new();
    for (path, module) in modules {
        dep_graph.add_module(path.clone(), module.exports.len());
    }
    for path in modules.keys() {
        for target in graph.targets_of(path) {
            dep_graph.add_dependency(path.clone(), target.clone());
        }
    }
    canopy_coupling::compute_metrics(&dep_graph)
}

/// Tree-edit-distance and similarity between two already-converted
/// fragments, exposed for callers doing ad-hoc duplicate checking (e.g. a
/// refactor-suggestion tool comparing two functions a user points at).
pub fn compare_fragments(
    tree_a: &canopy_apted::Tree,
    tree_b: &canopy_apted::Tree,
    config: &AptedConfig,
) -> Result<(f64, f64), AnalysisError> {
    let cost = canopy_apted::DefaultCostModel;
    let distance = canopy_apted::tree_distance(Some(tree_a), Some(tree_b), &cost, config.max_tree_size, config.early_termination_bound)?;
    let pa = canopy_apted::prepare(tree_a);
    let pb = canopy_apted::prepare(tree_b);
    let similarity = canopy_apted::similarity(distance, &pa, &pb, &cost);
    Ok((distance, similarity))
}

/// Builds a near-duplicate search index over a set of identified fragments
/// (e.g. every function body in a project, converted to a tree and keyed
/// by its file path plus function name).
pub fn build_fragment_index<Id: Clone + Eq + Hash>(
    fragments: &[(Id, canopy_apted::Tree)],
    features_config: &FeaturesConfig,
    lsh_config: &LshConfig,
) -> canopy_minhash::LshIndex<Id> {
    let mut index = canopy_minhash::LshIndex::new(*lsh_config);
    for (id, tree) in fragments {
        let features = canopy_minhash::extract_features(tree, features_config);
        let sig = canopy_minhash::signature(&features, lsh_config.num_hashes);
        index.insert(id.clone(), &sig);
    }
    index
}
