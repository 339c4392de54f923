//! Import Resolver (§4.5): filters raw import paths down to the ones worth
//! resolving, maps each to a `ref_id` via annotation lookup then
//! source-prefix matching, and derives `depends_on` edges from the result.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::config::Config;
use crate::error::BeadloomResult;
use crate::store::Store;
use crate::types::{CodeImport, Edge, EdgeKind, Language, Node, RawImport};

/// Filter raw imports for `file_path` down to the ones the resolver should
/// attempt to resolve: relative imports, language-stdlib paths, and bare
/// npm packages (unless aliased) are dropped.
pub fn filter_imports(language: Language, raw: Vec<RawImport>, config: &Config) -> Vec<RawImport> {
    raw.into_iter()
        .filter(|import| should_resolve(language, &import.import_path, config))
        .collect()
}

fn should_resolve(language: Language, import_path: &str, config: &Config) -> bool {
    let path = import_path.trim();

    if is_relative(language, path) {
        return false;
    }
    if is_stdlib(language, path) {
        return false;
    }
    if language_is_npm_like(language) && !has_alias_or_local_prefix(path, config) {
        return false;
    }

    true
}

fn is_relative(language: Language, path: &str) -> bool {
    match language {
        Language::Rust => path.starts_with("super::") || path.starts_with("self::") || path.starts_with("crate::"),
        Language::Python => path.starts_with("from .") || path.starts_with('.'),
        Language::TypeScript | Language::Tsx | Language::JavaScript | Language::Jsx => {
            path.contains("'./") || path.contains("\"./") || path.contains("'../") || path.contains("\"../")
        }
        Language::Go => path.starts_with("./") || path.starts_with("../"),
        _ => false,
    }
}

fn is_stdlib(language: Language, path: &str) -> bool {
    match language {
        Language::Rust => {
            path.starts_with("std::") || path.starts_with("core::") || path.starts_with("alloc::")
        }
        Language::Go => !path.contains('/') && !path.contains('.'),
        _ => false,
    }
}

fn language_is_npm_like(language: Language) -> bool {
    matches!(
        language,
        Language::TypeScript | Language::Tsx | Language::JavaScript | Language::Jsx
    )
}

fn has_alias_or_local_prefix(path: &str, config: &Config) -> bool {
    config
        .import_aliases
        .aliases
        .iter()
        .any(|(prefix, _)| path.contains(prefix.as_str()))
}

/// Apply configured aliases, converting an import path string into
/// candidate relative file paths under each scan root.
fn candidate_paths(import_path: &str, config: &Config) -> Vec<PathBuf> {
    let resolved = apply_aliases(import_path, config);
    let dotted = normalize_to_dotted(&resolved);
    let segments: Vec<&str> = dotted.split(['.', '/']).filter(|s| !s.is_empty()).collect();

    if segments.is_empty() {
        return Vec::new();
    }

    let relative = segments.join("/");
    let mut candidates = Vec::new();
    for root in config.scan_paths.iter() {
        candidates.push(PathBuf::from(root).join(format!("{relative}.py")));
        candidates.push(PathBuf::from(root).join(&relative).join("__init__.py"));
        candidates.push(PathBuf::from(root).join(format!("{relative}.ts")));
        candidates.push(PathBuf::from(root).join(format!("{relative}.tsx")));
        candidates.push(PathBuf::from(root).join(format!("{relative}.js")));
        candidates.push(PathBuf::from(root).join(format!("{relative}.go")));
        candidates.push(PathBuf::from(root).join(format!("{relative}.rs")));
    }
    candidates
}

fn apply_aliases(path: &str, config: &Config) -> String {
    for (prefix, target) in &config.import_aliases.aliases {
        if let Some(rest) = path.strip_prefix(prefix.as_str()) {
            return format!("{target}{rest}");
        }
    }
    path.to_string()
}

/// Strip quotes, `from x import y` / `import x` boilerplate, and convert
/// path separators into a uniform dotted form for segmenting.
fn normalize_to_dotted(path: &str) -> String {
    let cleaned = path
        .trim()
        .trim_start_matches("from")
        .trim()
        .trim_start_matches("import")
        .trim()
        .split(" import")
        .next()
        .unwrap_or(path)
        .trim_matches(|c| c == '\'' || c == '"' || c == ';')
        .to_string();
    cleaned.replace("::", ".")
}

/// Strategy 1: look up each candidate path's `code_symbols.annotations` rows
/// and return the first `ref_id` whose `domain`/`feature`/`service`
/// annotation matches an existing node's `ref_id`.
fn resolve_via_annotations(store: &Store, candidates: &[PathBuf], nodes: &[Node]) -> BeadloomResult<Option<String>> {
    for candidate in candidates {
        for node in nodes {
            for key in ["domain", "feature", "service"] {
                if store.symbols_with_annotation(candidate, key, &node.ref_id)? {
                    return Ok(Some(node.ref_id.clone()));
                }
            }
        }
    }
    Ok(None)
}

/// Strategy 2: walk the first candidate path from its deepest segment to
/// shallowest, returning the deepest node whose `source` prefix-matches.
fn resolve_via_source_prefix(candidates: &[PathBuf], nodes: &[Node]) -> Option<String> {
    let candidate = candidates.first()?;
    let components: Vec<String> = candidate
        .components()
        .map(|c| c.as_os_str().to_string_lossy().to_string())
        .collect();

    for depth in (1..=components.len()).rev() {
        let prefix = components[..depth].join("/");
        if let Some(node) = find_node_by_source_prefix(nodes, &prefix) {
            return Some(node.ref_id.clone());
        }
    }
    None
}

/// Exposed `pub(crate)` so the Rule Engine's `deny` evaluator can map an
/// importing file back to its owning node the same way edge derivation does.
pub(crate) fn find_node_by_source_prefix<'a>(nodes: &'a [Node], prefix: &str) -> Option<&'a Node> {
    nodes
        .iter()
        .filter(|n| !n.source.is_empty() && (n.source == prefix || prefix.starts_with(n.source.trim_end_matches('/'))))
        .max_by_key(|n| n.source.len())
}

/// Resolve every import for `file_path` against the current node set and
/// persist the resulting `code_imports` rows (§4.5 "Resolve import ->
/// ref_id").
pub fn resolve_imports_for_file(
    store: &Store,
    config: &Config,
    file_path: &Path,
    file_hash: &str,
    language: Language,
    raw_imports: Vec<RawImport>,
) -> BeadloomResult<Vec<CodeImport>> {
    let filtered = filter_imports(language, raw_imports, config);
    let nodes = store.list_nodes()?;

    let mut resolved = Vec::with_capacity(filtered.len());
    for raw in filtered {
        let candidates = candidate_paths(&raw.import_path, config);
        let ref_id = match resolve_via_annotations(store, &candidates, &nodes)? {
            Some(id) => Some(id),
            None => resolve_via_source_prefix(&candidates, &nodes),
        };

        if ref_id.is_none() {
            debug!(path = %raw.import_path, file = %file_path.display(), "import left unresolved");
        }

        resolved.push(CodeImport {
            file_path: file_path.to_path_buf(),
            line_number: raw.line_number,
            import_path: raw.import_path,
            resolved_ref_id: ref_id,
            file_hash: file_hash.to_string(),
        });
    }

    store.replace_imports(file_path, &resolved)?;
    Ok(resolved)
}

/// Derive `depends_on` edges from every stored, resolved import (§4.5 "Edge
/// derivation"). Re-run after any batch of imports changes; existing
/// machine-derived `depends_on` edges from the affected source nodes are
/// cleared first so stale edges don't linger.
pub fn derive_dependency_edges(store: &Store, nodes: &[Node]) -> BeadloomResult<usize> {
    let imports = store.all_imports()?;
    let mut pairs: BTreeSet<(String, String)> = BTreeSet::new();

    for import in &imports {
        let Some(dst) = &import.resolved_ref_id else { continue };
        let Some(src_node) = owning_node(&import.file_path, nodes) else { continue };
        if &src_node.ref_id == dst {
            continue;
        }
        pairs.insert((src_node.ref_id.clone(), dst.clone()));
    }

    let affected_sources: BTreeSet<&str> = pairs.iter().map(|(src, _)| src.as_str()).collect();
    for src in &affected_sources {
        store.delete_derived_edges_from(src, EdgeKind::DependsOn)?;
    }

    let mut count = 0;
    for (src, dst) in &pairs {
        store.insert_edge(&Edge {
            src_ref_id: src.clone(),
            dst_ref_id: dst.clone(),
            kind: EdgeKind::DependsOn,
        })?;
        count += 1;
    }

    if count == 0 {
        warn!("import resolution derived no depends_on edges");
    }
    Ok(count)
}

pub(crate) fn owning_node<'a>(file_path: &Path, nodes: &'a [Node]) -> Option<&'a Node> {
    let path_str = file_path.to_string_lossy();
    find_node_by_source_prefix(nodes, &path_str)
}
