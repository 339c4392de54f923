//! Code Indexer (§4.4): tree-sitter symbol extraction, annotation parsing,
//! and framework route detection.
//!
//! Mirrors `omni-core::parser`'s architecture (a `LanguageAnalyzer` trait
//! plus a per-extension registry) but extracts the smaller symbol shape
//! the store persists rather than the teacher's full `StructuralElement`.

pub mod annotations;
pub mod languages;
pub mod registry;
pub mod routes;

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::{BeadloomError, BeadloomResult};
use crate::types::{CodeSymbol, Language, RawImport, SymbolKind};

/// Walk every configured scan root, skipping hidden and vendor directories,
/// and return the absolute paths of every file whose extension maps to a
/// parseable language (§4.4 "closed language list").
pub fn walk_code_roots(scan_roots: &[PathBuf]) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for root in scan_roots {
        if !root.exists() {
            continue;
        }
        let found = WalkDir::new(root)
            .into_iter()
            .filter_entry(|e| {
                let name = e.file_name().to_string_lossy();
                !(name.starts_with('.') || name == "node_modules" || name == "vendor" || name == "target")
            })
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter(|e| {
                e.path()
                    .extension()
                    .and_then(|x| x.to_str())
                    .map(|ext| Language::from_extension(ext).is_code())
                    .unwrap_or(false)
            })
            .map(|e| e.path().to_path_buf());
        files.extend(found);
    }
    files
}

/// One symbol site found by a language analyzer, before annotations are
/// attached.
#[derive(Debug, Clone)]
pub struct ExtractedSymbol {
    pub symbol_name: String,
    pub kind: SymbolKind,
    pub line_start: u32,
    pub line_end: u32,
}

/// Trait each supported language implements (§4.4, §9 "Tree-sitter
/// integration"). Grammars are immutable; a fresh `tree_sitter::Parser` is
/// created per call so the trait stays `Send + Sync` for worker-pool use.
pub trait LanguageAnalyzer: Send + Sync {
    fn language(&self) -> Language;
    fn tree_sitter_language(&self) -> tree_sitter::Language;
    fn extract_symbols(&self, tree: &tree_sitter::Tree, source: &[u8]) -> Vec<ExtractedSymbol>;
    fn extract_imports(&self, tree: &tree_sitter::Tree, source: &[u8]) -> Vec<RawImport>;
}

/// Parse `source` with the analyzer registered for `language` and return
/// the structural symbols found (not yet including route symbols or
/// annotations — see `index_file`).
fn parse_with(
    analyzer: &dyn LanguageAnalyzer,
    file_path: &Path,
    source: &[u8],
) -> BeadloomResult<tree_sitter::Tree> {
    let mut parser = tree_sitter::Parser::new();
    parser
        .set_language(&analyzer.tree_sitter_language())
        .map_err(|e| BeadloomError::Internal(format!("{}: failed to set grammar: {e}", file_path.display())))?;

    parser.parse(source, None).ok_or_else(|| {
        BeadloomError::Internal(format!("{}: tree-sitter returned no parse tree", file_path.display()))
    })
}

/// Index one source file: extract symbols, attach annotations from leading
/// comment blocks, append route symbols from the framework-detection pass,
/// and extract raw (unfiltered) import paths.
///
/// Returns `(symbols, raw_imports)`. Callers skip the file with a warning
/// on any error (§4.4, §4.5 "Failure semantics").
pub fn index_file(file_path: &Path, source: &[u8], language: Language) -> BeadloomResult<(Vec<CodeSymbol>, Vec<RawImport>)> {
    let registry = registry::global_registry();
    let analyzer = registry.get(language).ok_or_else(|| {
        BeadloomError::Internal(format!("no analyzer registered for language: {language}"))
    })?;

    let tree = parse_with(analyzer, file_path, source)?;
    let source_text = std::str::from_utf8(source)
        .map_err(|e| BeadloomError::Internal(format!("{}: invalid UTF-8: {e}", file_path.display())))?;

    let extracted = analyzer.extract_symbols(&tree, source);
    let mut symbols: Vec<CodeSymbol> = extracted
        .into_iter()
        .map(|sym| CodeSymbol {
            file_path: file_path.to_path_buf(),
            annotations: annotations::annotations_for_line(source_text, sym.line_start, language),
            symbol_name: sym.symbol_name,
            kind: sym.kind,
            line_start: sym.line_start,
            line_end: sym.line_end,
            language,
        })
        .collect();

    symbols.extend(routes::detect_routes(file_path, source_text, language));

    let raw_imports = analyzer.extract_imports(&tree, source);

    Ok((symbols, raw_imports))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indexes_a_python_file_with_annotation_and_route() {
        let src = b"# beadloom:domain=billing\n@app.get(\"/invoices\")\ndef list_invoices():\n    pass\n";
        let (symbols, _imports) = index_file(Path::new("src/billing/api.py"), src, Language::Python).unwrap();

        let func = symbols.iter().find(|s| s.symbol_name == "list_invoices").unwrap();
        assert_eq!(func.annotations.get("domain"), Some(&"billing".to_string()));

        assert!(symbols.iter().any(|s| s.kind == SymbolKind::Route));
    }
}
