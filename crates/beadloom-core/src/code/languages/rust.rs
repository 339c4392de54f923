//! Rust analyzer, grounded in `omni-core::parser::languages::rust`'s
//! recursive-descent walk over the tree-sitter-rust grammar.

use tree_sitter::{Node, Tree};

use crate::code::{ExtractedSymbol, LanguageAnalyzer};
use crate::types::{Language, RawImport, SymbolKind};

pub struct RustAnalyzer;

impl LanguageAnalyzer for RustAnalyzer {
    fn language(&self) -> Language {
        Language::Rust
    }

    fn tree_sitter_language(&self) -> tree_sitter::Language {
        tree_sitter_rust::LANGUAGE.into()
    }

    fn extract_symbols(&self, tree: &Tree, source: &[u8]) -> Vec<ExtractedSymbol> {
        let mut symbols = Vec::new();
        walk(tree.root_node(), source, false, &mut symbols);
        symbols
    }

    fn extract_imports(&self, tree: &Tree, source: &[u8]) -> Vec<RawImport> {
        let mut imports = Vec::new();
        collect_use_declarations(tree.root_node(), source, &mut imports);
        imports
    }
}

fn walk(node: Node, source: &[u8], in_impl: bool, out: &mut Vec<ExtractedSymbol>) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "function_item" => {
                out.push(ExtractedSymbol {
                    symbol_name: field_text(child, "name", source),
                    kind: function_kind(child, source, in_impl),
                    line_start: child.start_position().row as u32 + 1,
                    line_end: child.end_position().row as u32 + 1,
                });
            }
            "struct_item" | "enum_item" | "trait_item" => {
                out.push(ExtractedSymbol {
                    symbol_name: field_text(child, "name", source),
                    kind: SymbolKind::Class,
                    line_start: child.start_position().row as u32 + 1,
                    line_end: child.end_position().row as u32 + 1,
                });
            }
            "impl_item" => walk(child, source, true, out),
            "mod_item" | "declaration_list" => walk(child, source, in_impl, out),
            _ => {}
        }
    }
}

fn function_kind(node: Node, source: &[u8], in_impl: bool) -> SymbolKind {
    if has_test_attribute(node, source) {
        return SymbolKind::Test;
    }
    if in_impl {
        SymbolKind::Method
    } else {
        SymbolKind::Function
    }
}

/// `#[test]` sits as a `attribute_item` sibling immediately before the
/// function in the enclosing block; tree-sitter-rust doesn't attach
/// attributes to the item node itself, so we check the preceding sibling.
fn has_test_attribute(node: Node, source: &[u8]) -> bool {
    let mut sibling = node.prev_sibling();
    while let Some(s) = sibling {
        match s.kind() {
            "attribute_item" => {
                let text = s.utf8_text(source).unwrap_or("");
                if text.contains("test") {
                    return true;
                }
                sibling = s.prev_sibling();
            }
            "line_comment" | "block_comment" => sibling = s.prev_sibling(),
            _ => break,
        }
    }
    false
}

fn collect_use_declarations(node: Node, source: &[u8], out: &mut Vec<RawImport>) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() == "use_declaration" {
            if let Some(text) = child.utf8_text(source).ok() {
                let path = text
                    .trim_start_matches("use")
                    .trim()
                    .trim_end_matches(';')
                    .to_string();
                out.push(RawImport {
                    line_number: child.start_position().row as u32 + 1,
                    import_path: path,
                });
            }
        } else {
            collect_use_declarations(child, source, out);
        }
    }
}

fn field_text(node: Node, field: &str, source: &[u8]) -> String {
    node.child_by_field_name(field)
        .and_then(|n| n.utf8_text(source).ok())
        .unwrap_or("<anonymous>")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::code::index_file;
    use std::path::Path;

    #[test]
    fn extracts_functions_methods_and_tests() {
        let src = br#"
struct Widget;

impl Widget {
    fn render(&self) {}
}

fn free_function() {}

#[test]
fn it_renders() {}
"#;
        let (symbols, _) = index_file(Path::new("widget.rs"), src, Language::Rust).unwrap();
        assert!(symbols.iter().any(|s| s.symbol_name == "Widget" && s.kind == SymbolKind::Class));
        assert!(symbols.iter().any(|s| s.symbol_name == "render" && s.kind == SymbolKind::Method));
        assert!(symbols.iter().any(|s| s.symbol_name == "free_function" && s.kind == SymbolKind::Function));
        assert!(symbols.iter().any(|s| s.symbol_name == "it_renders" && s.kind == SymbolKind::Test));
    }

    #[test]
    fn extracts_use_declarations_as_imports() {
        let src = b"use crate::store::Store;\nfn main() {}\n";
        let (_, imports) = index_file(Path::new("main.rs"), src, Language::Rust).unwrap();
        assert_eq!(imports.len(), 1);
        assert_eq!(imports[0].import_path, "crate::store::Store");
    }
}
