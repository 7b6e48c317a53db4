//! Extracts a [`ModuleInfo`] (imports, exports, source classification) from
//! a single file's AST.
//!
//! The AST contract this crate relies on (documented here since it's an
//! internal convention rather than something a real parser enforces): an
//! `ImportDeclaration`/`ExportNamedDeclaration`/`ExportAllDeclaration`'s
//! module specifier string lives in `name`; an `ImportSpecifier`'s local
//! binding lives in `name` and its imported name (when aliased) lives in
//! `raw`; a `require(...)`/`import(...)` call's source is the string
//! literal in its first argument.

use canopy_ast::{Ast, Location, NodeId, NodeKind};
use canopy_hash::AHashSet;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceType {
    Relative,
    Absolute,
    Alias,
    Package,
    Builtin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImportType {
    Default,
    Named,
    Namespace,
    SideEffect,
    Dynamic,
    Require,
    TypeOnly,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportSpecifierInfo {
    pub imported: String,
    pub local: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Import {
    pub source: String,
    pub source_type: SourceType,
    pub import_type: ImportType,
    pub specifiers: Vec<ImportSpecifierInfo>,
    pub is_dynamic: bool,
    pub is_type_only: bool,
    pub location: Location,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExportType {
    Named,
    Default,
    All,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSpecifierInfo {
    pub local: String,
    pub exported: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Export {
    pub export_type: ExportType,
    pub source: Option<String>,
    pub declaration_kind: Option<String>,
    pub name: Option<String>,
    pub specifiers: Vec<ExportSpecifierInfo>,
    pub location: Location,
}

impl Export {
    pub fn is_reexport(&self) -> bool {
        self.source.is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleInfo {
    pub file_path: PathBuf,
    pub imports: Vec<Import>,
    pub exports: Vec<Export>,
    /// Resolved import targets. Empty until a later pass (see
    /// `canopy_resolve`/`canopy_graph`) resolves each import's source
    /// string against the known file set — this crate only extracts what
    /// the AST says, it never touches the filesystem.
    pub dependencies: Vec<PathBuf>,
}

const BUILTIN_MODULES: &[&str] = &[
    "assert", "async_hooks", "buffer", "child_process", "cluster", "console", "constants", "crypto",
    "dgram", "diagnostics_channel", "dns", "domain", "events", "fs", "http", "https", "inspector", "module",
    "net", "os", "path", "perf_hooks", "process", "punycode", "querystring", "readline", "repl", "stream",
    "string_decoder", "timers", "tls", "trace_events", "tty", "url", "util", "v8", "vm", "worker_threads", "zlib",
];

pub fn classify_source(source: &str, alias_patterns: &[String]) -> SourceType {
    if source.starts_with("node:") || BUILTIN_MODULES.contains(&source) {
        return SourceType::Builtin;
    }
    if source.starts_with("./") || source.starts_with("../") {
        return SourceType::Relative;
    }
    if source.starts_with('/') {
        return SourceType::Absolute;
    }
    if alias_patterns.iter().any(|p| source.starts_with(p.as_str())) {
        return SourceType::Alias;
    }
    SourceType::Package
}

fn source_string(ast: &Ast, node_id: NodeId) -> Option<String> {
    ast.node(node_id).and_then(|n| n.name.clone())
}

fn call_callee_name(ast: &Ast, call: NodeId) -> Option<String> {
    let callee = ast.node(call)?.callee?;
    ast.node(callee)?.name.clone()
}

fn call_string_argument(ast: &Ast, call: NodeId) -> Option<String> {
    let first = *ast.node(call)?.arguments.first()?;
    let node = ast.node(first)?;
    match (&node.kind, &node.value) {
        (NodeKind::StringLiteral | NodeKind::Literal, Some(canopy_ast::LiteralValue::String(s))) => Some(s.clone()),
        _ => node.raw.clone(),
    }
}

fn looks_like_import_type_only(ast: &Ast, node_id: NodeId) -> bool {
    ast.node(node_id)
        .and_then(|n| n.raw.as_ref())
        .map(|raw| raw.trim_start().starts_with("import type"))
        .unwrap_or(false)
}

/// Extracts every import in the file: static `import` declarations,
/// `require(...)` calls, and dynamic `import(...)` calls. Each is
/// deduplicated by its node's location key, since a given call or
/// declaration node may be reachable through more than one typed slot.
pub fn extract_imports(ast: &Ast, alias_patterns: &[String]) -> Vec<Import> {
    let Some(root) = ast.root() else {
        return Vec::new();
    };
    let mut seen = AHashSet::default();
    let mut imports = Vec::new();

    ast.walk(root, |node| {
        let key = node.location.dedup_key(node.kind);
        match node.kind {
            NodeKind::ImportDeclaration => {
                if !seen.insert(key) {
                    return true;
                }
                if let Some(source) = source_string(ast, node.id) {
                    let is_type_only = looks_like_import_type_only(ast, node.id);
                    let specifiers = extract_import_specifiers(ast, node.id);
                    let import_type = if specifiers.is_empty() {
                        ImportType::SideEffect
                    } else if is_type_only {
                        ImportType::TypeOnly
                    } else {
                        infer_declaration_import_type(ast, node.id)
                    };
                    imports.push(Import {
                        source_type: classify_source(&source, alias_patterns),
                        source,
                        import_type,
                        specifiers,
                        is_dynamic: false,
                        is_type_only,
                        location: node.location.clone(),
                    });
                }
            }
            NodeKind::CallExpression => {
                if !seen.insert(key) {
                    return true;
                }
                match call_callee_name(ast, node.id).as_deref() {
                    Some("require") => {
                        if let Some(source) = call_string_argument(ast, node.id) {
                            imports.push(Import {
                                source_type: classify_source(&source, alias_patterns),
                                source,
                                import_type: ImportType::Require,
                                specifiers: Vec::new(),
                                is_dynamic: false,
                                is_type_only: false,
                                location: node.location.clone(),
                            });
                        }
                    }
                    Some("import") => {
                        if let Some(source) = call_string_argument(ast, node.id) {
                            imports.push(Import {
                                source_type: classify_source(&source, alias_patterns),
                                source,
                                import_type: ImportType::Dynamic,
                                specifiers: Vec::new(),
                                is_dynamic: true,
                                is_type_only: false,
                                location: node.location.clone(),
                            });
                        }
                    }
                    _ => {}
                }
            }
            _ => {}
        }
        true
    });

    imports
}

fn extract_import_specifiers(ast: &Ast, import_decl: NodeId) -> Vec<ImportSpecifierInfo> {
    let Some(node) = ast.node(import_decl) else {
        return Vec::new();
    };
    node.specifiers
        .iter()
        .filter_map(|&id| {
            let spec = ast.node(id)?;
            let local = spec.name.clone()?;
            let imported = match spec.kind {
                NodeKind::ImportDefaultSpecifier => "default".to_string(),
                NodeKind::ImportNamespaceSpecifier => "*".to_string(),
                _ => spec.raw.clone().unwrap_or_else(|| local.clone()),
            };
            Some(ImportSpecifierInfo { imported, local })
        })
        .collect()
}

fn infer_declaration_import_type(ast: &Ast, import_decl: NodeId) -> ImportType {
    let Some(node) = ast.node(import_decl) else {
        return ImportType::Named;
    };
    let kinds: Vec<NodeKind> = node.specifiers.iter().filter_map(|&id| ast.node(id).map(|n| n.kind)).collect();
    if kinds.len() == 1 {
        match kinds[0] {
            NodeKind::ImportDefaultSpecifier => return ImportType::Default,
            NodeKind::ImportNamespaceSpecifier => return ImportType::Namespace,
            _ => {}
        }
    }
    ImportType::Named
}

/// Extracts every export in the file: named and default declarations,
/// `export * from`, and the CommonJS `module.exports = …` /
/// `exports.<name> = …` assignment forms.
pub fn extract_exports(ast: &Ast) -> Vec<Export> {
    let Some(root) = ast.root() else {
        return Vec::new();
    };
    let mut exports = Vec::new();

    ast.walk(root, |node| {
        match node.kind {
            NodeKind::ExportNamedDeclaration => {
                let source = source_string(ast, node.id);
                if let Some(&decl_id) = node.declarations.first() {
                    let decl = ast.node(decl_id);
                    exports.push(Export {
                        export_type: ExportType::Named,
                        source,
                        declaration_kind: decl.map(|d| format!("{:?}", d.kind)),
                        name: decl.and_then(|d| d.name.clone()),
                        specifiers: Vec::new(),
                        location: node.location.clone(),
                    });
                } else {
                    let specifiers = extract_export_specifiers(ast, node.id);
                    exports.push(Export {
                        export_type: ExportType::Named,
                        source,
                        declaration_kind: None,
                        name: None,
                        specifiers,
                        location: node.location.clone(),
                    });
                }
            }
            NodeKind::ExportDefaultDeclaration => {
                let decl = node.argument.and_then(|id| ast.node(id));
                exports.push(Export {
                    export_type: ExportType::Default,
                    source: None,
                    declaration_kind: decl.map(|d| format!("{:?}", d.kind)),
                    name: decl.and_then(|d| d.name.clone()),
                    specifiers: Vec::new(),
                    location: node.location.clone(),
                });
            }
            NodeKind::ExportAllDeclaration => {
                exports.push(Export {
                    export_type: ExportType::All,
                    source: source_string(ast, node.id),
                    declaration_kind: None,
                    name: None,
                    specifiers: Vec::new(),
                    location: node.location.clone(),
                });
            }
            NodeKind::AssignmentExpression => {
                if let Some(export) = commonjs_export(ast, node.id) {
                    exports.push(export);
                }
            }
            _ => {}
        }
        true
    });

    exports
}

fn extract_export_specifiers(ast: &Ast, export_decl: NodeId) -> Vec<ExportSpecifierInfo> {
    let Some(node) = ast.node(export_decl) else {
        return Vec::new();
    };
    node.specifiers
        .iter()
        .filter_map(|&id| {
            let spec = ast.node(id)?;
            let local = spec.name.clone()?;
            let exported = spec.raw.clone().unwrap_or_else(|| local.clone());
            Some(ExportSpecifierInfo { local, exported })
        })
        .collect()
}

/// Recognizes `module.exports = …` (default export) and
/// `exports.<name> = …` (named export) assignment forms.
fn commonjs_export(ast: &Ast, assign: NodeId) -> Option<Export> {
    let node = ast.node(assign)?;
    let left = ast.node(node.left?)?;
    if left.kind != NodeKind::MemberExpression {
        return None;
    }
    let object = ast.node(left.object?)?;
    let property = left.property.and_then(|p| ast.node(p));

    if object.name.as_deref() == Some("module") && property.and_then(|p| p.name.as_deref()) == Some("exports") {
        return Some(Export {
            export_type: ExportType::Default,
            source: None,
            declaration_kind: None,
            name: None,
            specifiers: Vec::new(),
            location: node.location.clone(),
        });
    }
    if object.name.as_deref() == Some("exports") {
        let name = property?.name.clone()?;
        return Some(Export {
            export_type: ExportType::Named,
            source: None,
            declaration_kind: None,
            name: Some(name),
            specifiers: Vec::new(),
            location: node.location.clone(),
        });
    }
    None
}

pub fn analyze_module(file_path: &Path, ast: &Ast, alias_patterns: &[String]) -> ModuleInfo {
    ModuleInfo {
        file_path: file_path.to_path_buf(),
        imports: extract_imports(ast, alias_patterns),
        exports: extract_exports(ast),
        dependencies: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use canopy_ast::{AstBuilder, LiteralValue, Location, NodeKind as NK};

    fn loc(line: u32) -> Location {
        Location::new("f.ts", line, line, 0, 1)
    }

    fn default_alias_patterns() -> Vec<String> {
        vec!["@/".to_string(), "~/".to_string()]
    }

    #[test]
    fn classifies_all_source_kinds() {
        let aliases = default_alias_patterns();
        assert_eq!(classify_source("node:fs", &aliases), SourceType::Builtin);
        assert_eq!(classify_source("fs", &aliases), SourceType::Builtin);
        assert_eq!(classify_source("./local", &aliases), SourceType::Relative);
        assert_eq!(classify_source("../local", &aliases), SourceType::Relative);
        assert_eq!(classify_source("/abs/path", &aliases), SourceType::Absolute);
        assert_eq!(classify_source("@/components/button", &aliases), SourceType::Alias);
        assert_eq!(classify_source("react", &aliases), SourceType::Package);
    }

    /// `import { useState, useEffect } from 'react'` — scenario 2's source.
    #[test]
    fn extracts_named_import_specifiers() {
        let mut ab = AstBuilder::new();
        let program = ab.add(NK::Program, loc(1));
        let import_decl = ab.add(NK::ImportDeclaration, loc(1));
        ab.node_mut(import_decl).name = Some("react".to_string());
        let use_state = ab.add(NK::ImportSpecifier, loc(1));
        ab.node_mut(use_state).name = Some("useState".to_string());
        let use_effect = ab.add(NK::ImportSpecifier, loc(1));
        ab.node_mut(use_effect).name = Some("useEffect".to_string());
        ab.node_mut(import_decl).specifiers = vec![use_state, use_effect];
        ab.push_body(program, import_decl);
        let ast = ab.finish(program);

        let imports = extract_imports(&ast, &default_alias_patterns());
        assert_eq!(imports.len(), 1);
        assert_eq!(imports[0].source, "react");
        assert_eq!(imports[0].source_type, SourceType::Package);
        assert_eq!(imports[0].import_type, ImportType::Named);
        assert_eq!(imports[0].specifiers.len(), 2);
        assert_eq!(imports[0].specifiers[1].local, "useEffect");
    }

    #[test]
    fn extracts_require_call() {
        let mut ab = AstBuilder::new();
        let program = ab.add(NK::Program, loc(1));
        let call = ab.add(NK::CallExpression, loc(1));
        let callee = ab.add(NK::Identifier, loc(1));
        ab.node_mut(callee).name = Some("require".to_string());
        let arg = ab.add(NK::StringLiteral, loc(1));
        ab.node_mut(arg).value = Some(LiteralValue::String("./utils".to_string()));
        ab.node_mut(call).callee = Some(callee);
        ab.node_mut(call).arguments.push(arg);
        ab.push_body(program, call);
        let ast = ab.finish(program);

        let imports = extract_imports(&ast, &default_alias_patterns());
        assert_eq!(imports.len(), 1);
        assert_eq!(imports[0].source, "./utils");
        assert_eq!(imports[0].import_type, ImportType::Require);
        assert_eq!(imports[0].source_type, SourceType::Relative);
    }

    #[test]
    fn extracts_commonjs_named_export() {
        let mut ab = AstBuilder::new();
        let program = ab.add(NK::Program, loc(1));
        let assign = ab.add(NK::AssignmentExpression, loc(1));
        let member = ab.add(NK::MemberExpression, loc(1));
        let object = ab.add(NK::Identifier, loc(1));
        ab.node_mut(object).name = Some("exports".to_string());
        let property = ab.add(NK::Identifier, loc(1));
        ab.node_mut(property).name = Some("helper".to_string());
        ab.node_mut(member).object = Some(object);
        ab.node_mut(member).property = Some(property);
        ab.node_mut(assign).left = Some(member);
        ab.push_body(program, assign);
        let ast = ab.finish(program);

        let exports = extract_exports(&ast);
        assert_eq!(exports.len(), 1);
        assert_eq!(exports[0].export_type, ExportType::Named);
        assert_eq!(exports[0].name.as_deref(), Some("helper"));
    }

    #[test]
    fn export_all_is_a_reexport() {
        let mut ab = AstBuilder::new();
        let program = ab.add(NK::Program, loc(1));
        let export_all = ab.add(NK::ExportAllDeclaration, loc(1));
        ab.node_mut(export_all).name = Some("./other".to_string());
        ab.push_body(program, export_all);
        let ast = ab.finish(program);

        let exports = extract_exports(&ast);
        assert_eq!(exports.len(), 1);
        assert!(exports[0].is_reexport());
        assert_eq!(exports[0].export_type, ExportType::All);
    }
}
