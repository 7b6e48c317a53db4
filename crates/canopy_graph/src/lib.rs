//! Import graph construction and the cross-module unused-code detectors
//! that read it: unused imports, unused exports, unused exported
//! functions/classes, and orphan files.

use canopy_ast::{Ast, NodeKind};
use canopy_hash::AHashMap;
use canopy_module::{Export, ExportType, Import, ImportType, ModuleInfo, SourceType};
use canopy_report::{Finding, Reason, Severity};
use canopy_resolve::{resolve_import_path, TsConfigPaths};
use rayon::prelude::*;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// A resolved import retains enough of the originating `Import` to answer
/// "does anything reference export X of this file" without re-reading the
/// AST — the import graph is built once and treated as read-only from then
/// on (per the core's concurrency model).
#[derive(Debug, Clone)]
pub struct ResolvedImportEdge {
    pub from: PathBuf,
    pub to: PathBuf,
    pub import_type: ImportType,
    pub specifiers: Vec<canopy_module::ImportSpecifierInfo>,
}

#[derive(Debug, Clone, Default)]
pub struct ImportGraph {
    edges: Vec<ResolvedImportEdge>,
    targets_by_file: AHashMap<PathBuf, Vec<PathBuf>>,
    importers_by_file: AHashMap<PathBuf, Vec<PathBuf>>,
}

impl ImportGraph {
    /// Resolves every import of every module against the known file set in
    /// parallel (each file's resolution is independent) and assembles the
    /// graph from whatever resolved. Unresolved imports simply produce no
    /// edge — resolution failure is silent per the core's error model.
    pub fn build(
        modules: &AHashMap<PathBuf, ModuleInfo>,
        project_root: &Path,
        alias_patterns: &[String],
        ts_paths: Option<&TsConfigPaths>,
    ) -> Self {
        let known: HashSet<PathBuf> = modules.keys().cloned().collect();

        let per_file_edges: Vec<Vec<ResolvedImportEdge>> = modules
            .par_iter()
            .map(|(file, module)| {
                module
                    .imports
                    .iter()
                    .filter_map(|import| {
                        let target = resolve_import_path(
                            file,
                            &import.source,
                            import.source_type,
                            project_root,
                            alias_patterns,
                            ts_paths,
                            &known,
                        )?;
                        if &target == file {
                            return None;
                        }
                        Some(ResolvedImportEdge {
                            from: file.clone(),
                            to: target,
                            import_type: import.import_type,
                            specifiers: import.specifiers.clone(),
                        })
                    })
                    .collect()
            })
            .collect();

        let edges: Vec<ResolvedImportEdge> = per_file_edges.into_iter().flatten().collect();

        let mut targets_by_file: AHashMap<PathBuf, Vec<PathBuf>> = AHashMap::default();
        let mut importers_by_file: AHashMap<PathBuf, Vec<PathBuf>> = AHashMap::default();
        for edge in &edges {
            let targets = targets_by_file.entry(edge.from.clone()).or_default();
            if !targets.contains(&edge.to) {
                targets.push(edge.to.clone());
            }
            let importers = importers_by_file.entry(edge.to.clone()).or_default();
            if !importers.contains(&edge.from) {
                importers.push(edge.from.clone());
            }
        }

        Self {
            edges,
            targets_by_file,
            importers_by_file,
        }
    }

    pub fn targets_of(&self, file: &Path) -> &[PathBuf] {
        self.targets_by_file.get(file).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn importers_of(&self, file: &Path) -> &[PathBuf] {
        self.importers_by_file.get(file).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn edges_into<'a, 'b>(&'a self, file: &'b Path) -> impl Iterator<Item = &'a ResolvedImportEdge> + 'b
    where
        'a: 'b,
    {
        self.edges.iter().filter(move |e| e.to == file)
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }
}

const RESERVED_EXPORT_NAMES: &[&str] = &[
    "generateMetadata",
    "generateStaticParams",
    "metadata",
    "viewport",
    "default",
    "loading",
    "error",
    "layout",
    "page",
];

const FRAMEWORK_PAGE_FILE_STEMS: &[&str] = &["page", "layout", "loading", "error", "default"];

const FUNCTION_LIKE_DECL_KINDS: &[&str] = &[
    "FunctionDeclaration",
    "AsyncFunction",
    "GeneratorFunction",
    "Class",
    "ClassExpression",
    "FunctionExpression",
];

fn has_path_segment(path: &Path, segment: &str) -> bool {
    path.components().any(|c| c.as_os_str() == segment)
}

fn file_stem(path: &Path) -> String {
    // Source files may carry a double extension (`foo.test.ts`); take
    // everything before the *first* dot in the final component so
    // `foo.test.ts` yields `foo.test`, matching the basename conventions
    // the classifiers below are written against.
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    name.split('.').next().unwrap_or(name).to_string()
}

fn basename_without_last_extension(path: &Path) -> String {
    path.file_stem().and_then(|s| s.to_str()).unwrap_or("").to_string()
}

pub fn is_entry_point_file(path: &Path) -> bool {
    matches!(file_stem(path).as_str(), "index" | "main" | "app" | "server")
}

pub fn is_test_file(path: &Path) -> bool {
    if has_path_segment(path, "__tests__") {
        return true;
    }
    let basename = basename_without_last_extension(path);
    basename.ends_with(".test") || basename.ends_with(".spec")
}

pub fn is_config_file(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    name.contains(".config.") || name.contains(".setup.")
}

pub fn is_framework_page_file(path: &Path) -> bool {
    has_path_segment(path, "app") && FRAMEWORK_PAGE_FILE_STEMS.contains(&file_stem(path).as_str())
}

pub fn is_framework_reserved_export(path: &Path, export: &Export) -> bool {
    if !has_path_segment(path, "app") {
        return false;
    }
    if export.export_type == ExportType::Default {
        return true;
    }
    export
        .name
        .as_deref()
        .map(|n| RESERVED_EXPORT_NAMES.contains(&n))
        .unwrap_or(false)
}

fn skip_export_detectors_for_file(path: &Path) -> bool {
    is_entry_point_file(path) || is_test_file(path) || is_config_file(path) || is_framework_page_file(path)
}

fn is_property_of_member_expression(ast: &Ast, id: canopy_ast::NodeId) -> bool {
    let Some(node) = ast.node(id) else { return false };
    let Some(parent_id) = node.parent else { return false };
    let Some(parent) = ast.node(parent_id) else { return false };
    parent.kind == NodeKind::MemberExpression && parent.property == Some(id)
}

fn identifier_is_used(ast: &Ast, local: &str) -> bool {
    let Some(root) = ast.root() else { return false };
    let mut used = false;
    ast.walk(root, |node| {
        if used {
            return false;
        }
        if node.kind == NodeKind::Identifier
            && node.name.as_deref() == Some(local)
            && !is_property_of_member_expression(ast, node.id)
        {
            used = true;
        }
        true
    });
    used
}

fn reexported_as_usage(module: &ModuleInfo, local: &str) -> bool {
    module.exports.iter().any(|e| {
        e.name.as_deref() == Some(local) || e.specifiers.iter().any(|s| s.local == local)
    })
}

/// Flags import specifiers whose local binding is never referenced
/// anywhere in the file (identifier use, non-computed member access
/// excluded, re-export counts as use).
pub fn detect_unused_imports(modules: &AHashMap<PathBuf, ModuleInfo>, asts: &AHashMap<PathBuf, Ast>) -> Vec<Finding> {
    let mut findings = Vec::new();
    for (file, module) in modules {
        let Some(ast) = asts.get(file) else { continue };
        for import in &module.imports {
            if import.is_type_only || import.import_type == ImportType::SideEffect {
                continue;
            }
            for spec in &import.specifiers {
                if identifier_is_used(ast, &spec.local) || reexported_as_usage(module, &spec.local) {
                    continue;
                }
                findings.push(Finding {
                    file_path: file.clone(),
                    function_name: None,
                    block_id: None,
                    reason: Reason::UnusedImport,
                    severity: Severity::Warning,
                    start_line: import.location.start_line,
                    end_line: import.location.end_line,
                    description: format!("'{}' is imported but never used", spec.local),
                    code_snippet: None,
                });
            }
        }
    }
    findings
}

fn export_is_referenced(graph: &ImportGraph, file: &Path, export: &Export) -> bool {
    graph.edges_into(file).any(|edge| {
        if edge.import_type == ImportType::Namespace {
            return true;
        }
        match export.export_type {
            ExportType::Default => edge.specifiers.iter().any(|s| s.imported == "default"),
            ExportType::Named => {
                let name = export.name.as_deref();
                edge.specifiers.iter().any(|s| Some(s.imported.as_str()) == name)
                    || export
                        .specifiers
                        .iter()
                        .any(|es| edge.specifiers.iter().any(|s| s.imported == es.exported))
            }
            ExportType::All => false,
        }
    })
}

fn export_findings(
    modules: &AHashMap<PathBuf, ModuleInfo>,
    graph: &ImportGraph,
    restrict_to_function_like: bool,
) -> Vec<Finding> {
    let mut findings = Vec::new();
    for (file, module) in modules {
        if skip_export_detectors_for_file(file) {
            continue;
        }
        for export in &module.exports {
            if export.is_reexport() {
                continue;
            }
            if is_framework_reserved_export(file, export) {
                continue;
            }
            if restrict_to_function_like {
                let is_function_like = export
                    .declaration_kind
                    .as_deref()
                    .map(|k| FUNCTION_LIKE_DECL_KINDS.contains(&k))
                    .unwrap_or(false);
                if !is_function_like {
                    continue;
                }
            }
            if export_is_referenced(graph, file, export) {
                continue;
            }
            let label = export.name.as_deref().unwrap_or("default");
            let (reason, severity) = if restrict_to_function_like {
                (Reason::UnusedExportedFunction, Severity::Warning)
            } else {
                (Reason::UnusedExport, Severity::Info)
            };
            findings.push(Finding {
                file_path: file.clone(),
                function_name: export.name.clone(),
                block_id: None,
                reason,
                severity,
                start_line: export.location.start_line,
                end_line: export.location.end_line,
                description: format!("'{label}' is exported but never imported elsewhere"),
                code_snippet: None,
            });
        }
    }
    findings
}

/// Unused export: every non-re-export export of a non-skipped file
/// that no other file's resolved import references.
pub fn detect_unused_exports(modules: &AHashMap<PathBuf, ModuleInfo>, graph: &ImportGraph) -> Vec<Finding> {
    export_findings(modules, graph, false)
}

/// Unused exported function/class: the same check narrowed to
/// function- and class-shaped declarations.
pub fn detect_unused_exported_functions(modules: &AHashMap<PathBuf, ModuleInfo>, graph: &ImportGraph) -> Vec<Finding> {
    export_findings(modules, graph, true)
}

/// Orphan file: files unreachable from any root (entry points,
/// tests, config files, framework pages, and any file nobody imports) over
/// the forward import graph.
pub fn detect_orphan_files(modules: &AHashMap<PathBuf, ModuleInfo>, graph: &ImportGraph) -> Vec<Finding> {
    let is_root = |file: &Path| -> bool { skip_export_detectors_for_file(file) || graph.importers_of(file).is_empty() };

    let roots: Vec<PathBuf> = modules.keys().filter(|f| is_root(f)).cloned().collect();

    let mut reachable: HashSet<PathBuf> = HashSet::new();
    let mut stack = roots.clone();
    while let Some(file) = stack.pop() {
        if !reachable.insert(file.clone()) {
            continue;
        }
        for target in graph.targets_of(&file) {
            if !reachable.contains(target) {
                stack.push(target.clone());
            }
        }
    }

    modules
        .keys()
        .filter(|file| !reachable.contains(*file) && !is_root(file))
        .map(|file| Finding {
            file_path: file.clone(),
            function_name: None,
            block_id: None,
            reason: Reason::OrphanFile,
            severity: Severity::Info,
            start_line: 0,
            end_line: 0,
            description: format!("{} is never imported from any reachable entry point", file.display()),
            code_snippet: None,
        })
        .collect()
}
