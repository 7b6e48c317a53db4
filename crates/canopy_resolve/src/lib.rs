//! Bounded import path resolution: `resolveImportPath(from, source, known)`.
//!
//! This deliberately does not implement Node's full resolution algorithm —
//! no `package.json` `main`/`exports` field lookups, no node_modules walk.
//! It recognizes a fixed suffix list and index-file fallback against a
//! caller-supplied set of known project files, which is all the
//! cross-module detectors need.

use canopy_hash::AHashMap;
use canopy_module::SourceType;
use path_clean::PathClean;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

const RESOLUTION_SUFFIXES: &[&str] = &[".ts", ".tsx", ".js", ".jsx", ".mjs", ".cjs", ".mts", ".cts"];

/// tsconfig-style `baseUrl`/`paths` configuration, consulted only for Alias
/// sources. `paths` keys may end in `*` for prefix-substitution patterns,
/// matching tsconfig's own wildcard convention.
#[derive(Debug, Clone, Default)]
pub struct TsConfigPaths {
    pub base_url: Option<PathBuf>,
    pub paths: AHashMap<String, Vec<String>>,
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut s = path.to_string_lossy().into_owned();
    s.push_str(suffix);
    PathBuf::from(s)
}

/// Tries `path` itself, then every suffix, then `path/index` with every
/// suffix. Returns the first candidate present in `known`.
fn try_candidates(path: &Path, known: &HashSet<PathBuf>) -> Option<PathBuf> {
    if known.contains(path) {
        return Some(path.to_path_buf());
    }
    for suffix in RESOLUTION_SUFFIXES {
        let candidate = with_suffix(path, suffix);
        if known.contains(&candidate) {
            return Some(candidate);
        }
    }
    let index = path.join("index");
    for suffix in RESOLUTION_SUFFIXES {
        let candidate = with_suffix(&index, suffix);
        if known.contains(&candidate) {
            return Some(candidate);
        }
    }
    None
}

fn join_posix_normalized(base_dir: &Path, source: &str) -> PathBuf {
    base_dir.join(source).clean()
}

/// Resolves a single import's source string to a known project file.
/// Package, Builtin and Absolute sources never resolve to a project file
/// (`None`, the Rust equivalent of an "unresolved" empty-string result).
pub fn resolve_import_path(
    from: &Path,
    source: &str,
    source_type: SourceType,
    project_root: &Path,
    alias_patterns: &[String],
    ts_paths: Option<&TsConfigPaths>,
    known: &HashSet<PathBuf>,
) -> Option<PathBuf> {
    match source_type {
        SourceType::Package | SourceType::Builtin | SourceType::Absolute => None,
        SourceType::Relative => {
            let from_dir = from.parent().unwrap_or_else(|| Path::new(""));
            let joined = join_posix_normalized(from_dir, source);
            try_candidates(&joined, known)
        }
        SourceType::Alias => resolve_alias(source, project_root, alias_patterns, ts_paths, known),
    }
}

fn resolve_alias(
    source: &str,
    project_root: &Path,
    alias_patterns: &[String],
    ts_paths: Option<&TsConfigPaths>,
    known: &HashSet<PathBuf>,
) -> Option<PathBuf> {
    if let Some(ts) = ts_paths {
        if let Some(found) = resolve_via_ts_paths(source, project_root, ts, known) {
            return Some(found);
        }
    }

    let prefix = alias_patterns.iter().find(|p| source.starts_with(p.as_str()))?;
    let remainder = &source[prefix.len()..];
    let joined = join_posix_normalized(project_root, remainder);
    try_candidates(&joined, known)
}

/// Longest-prefix match over `paths` entries, with `*` substitution —
/// e.g. pattern `"@/*"` mapped to `["src/*"]` resolves `@/components/button`
/// to `<base>/src/components/button`.
fn resolve_via_ts_paths(
    source: &str,
    project_root: &Path,
    ts: &TsConfigPaths,
    known: &HashSet<PathBuf>,
) -> Option<PathBuf> {
    let base = ts.base_url.as_deref().unwrap_or(project_root);

    let mut candidates: Vec<(&String, &Vec<String>)> = ts.paths.iter().collect();
    candidates.sort_by(|a, b| b.0.len().cmp(&a.0.len()));

    for (pattern, targets) in candidates {
        if let Some(stripped_pattern) = pattern.strip_suffix('*') {
            if let Some(captured) = source.strip_prefix(stripped_pattern) {
                for target in targets {
                    let substituted = target.replacen('*', captured, 1);
                    let joined = join_posix_normalized(base, &substituted);
                    if let Some(found) = try_candidates(&joined, known) {
                        return Some(found);
                    }
                }
            }
        } else if pattern == source {
            for target in targets {
                let joined = join_posix_normalized(base, target);
                if let Some(found) = try_candidates(&joined, known) {
                    return Some(found);
                }
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn known(paths: &[&str]) -> HashSet<PathBuf> {
        paths.iter().map(PathBuf::from).collect()
    }

    #[test]
    fn package_and_builtin_and_absolute_never_resolve() {
        let k = known(&["src/react.ts"]);
        for st in [SourceType::Package, SourceType::Builtin, SourceType::Absolute] {
            assert_eq!(
                resolve_import_path(Path::new("src/app.ts"), "react", st, Path::new("."), &[], None, &k),
                None
            );
        }
    }

    #[test]
    fn relative_resolves_with_suffix_fallback() {
        let k = known(&["src/utils.ts"]);
        let result = resolve_import_path(
            Path::new("src/app.ts"),
            "./utils",
            SourceType::Relative,
            Path::new("."),
            &[],
            None,
            &k,
        );
        assert_eq!(result, Some(PathBuf::from("src/utils.ts")));
    }

    #[test]
    fn relative_resolves_to_index_file() {
        let k = known(&["src/components/index.tsx"]);
        let result = resolve_import_path(
            Path::new("src/app.ts"),
            "./components",
            SourceType::Relative,
            Path::new("."),
            &[],
            None,
            &k,
        );
        assert_eq!(result, Some(PathBuf::from("src/components/index.tsx")));
    }

    #[test]
    fn relative_parent_traversal_normalizes_dotdot() {
        let k = known(&["shared/helper.ts"]);
        let result = resolve_import_path(
            Path::new("src/feature/app.ts"),
            "../../shared/helper",
            SourceType::Relative,
            Path::new("."),
            &[],
            None,
            &k,
        );
        assert_eq!(result, Some(PathBuf::from("shared/helper.ts")));
    }

    #[test]
    fn alias_strips_prefix_against_project_root() {
        let k = known(&["src/components/button.tsx"]);
        let result = resolve_import_path(
            Path::new("src/app.ts"),
            "@/components/button",
            SourceType::Alias,
            Path::new("."),
            &["@/".to_string()],
            None,
            &k,
        );
        assert_eq!(result, Some(PathBuf::from("src/components/button.tsx")));
    }

    #[test]
    fn alias_uses_tsconfig_paths_wildcard() {
        let k = known(&["src/lib/format.ts"]);
        let mut paths = AHashMap::default();
        paths.insert("@/*".to_string(), vec!["src/*".to_string()]);
        let ts = TsConfigPaths {
            base_url: Some(PathBuf::from(".")),
            paths,
        };
        let result = resolve_import_path(
            Path::new("src/app.ts"),
            "@/lib/format",
            SourceType::Alias,
            Path::new("."),
            &["@/".to_string()],
            Some(&ts),
            &k,
        );
        assert_eq!(result, Some(PathBuf::from("src/lib/format.ts")));
    }

    #[test]
    fn unresolvable_alias_is_none() {
        let k = known(&["src/components/button.tsx"]);
        let result = resolve_import_path(
            Path::new("src/app.ts"),
            "@/missing/thing",
            SourceType::Alias,
            Path::new("."),
            &["@/".to_string()],
            None,
            &k,
        );
        assert_eq!(result, None);
    }
}
