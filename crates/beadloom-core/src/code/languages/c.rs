//! C analyzer: `function_definition` as functions, `struct_specifier`/
//! `union_specifier`/`enum_specifier` as classes, `#include` directives as
//! imports.

use tree_sitter::{Node, Tree};

use crate::code::{ExtractedSymbol, LanguageAnalyzer};
use crate::types::{Language, RawImport, SymbolKind};

pub struct CAnalyzer;

impl LanguageAnalyzer for CAnalyzer {
    fn language(&self) -> Language {
        Language::C
    }

    fn tree_sitter_language(&self) -> tree_sitter::Language {
        tree_sitter_c::LANGUAGE.into()
    }

    fn extract_symbols(&self, tree: &Tree, source: &[u8]) -> Vec<ExtractedSymbol> {
        let mut symbols = Vec::new();
        walk(tree.root_node(), source, &mut symbols);
        symbols
    }

    fn extract_imports(&self, tree: &Tree, source: &[u8]) -> Vec<RawImport> {
        let mut imports = Vec::new();
        collect_includes(tree.root_node(), source, &mut imports);
        imports
    }
}

pub(crate) fn walk(node: Node, source: &[u8], out: &mut Vec<ExtractedSymbol>) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "function_definition" => {
                if let Some(name) = function_name(child, source) {
                    out.push(ExtractedSymbol {
                        symbol_name: name,
                        kind: SymbolKind::Function,
                        line_start: child.start_position().row as u32 + 1,
                        line_end: child.end_position().row as u32 + 1,
                    });
                }
            }
            "struct_specifier" | "union_specifier" | "enum_specifier" => {
                if let Some(name_node) = child.child_by_field_name("name") {
                    out.push(ExtractedSymbol {
                        symbol_name: name_node.utf8_text(source).unwrap_or("<anonymous>").to_string(),
                        kind: SymbolKind::Class,
                        line_start: child.start_position().row as u32 + 1,
                        line_end: child.end_position().row as u32 + 1,
                    });
                }
            }
            _ => walk(child, source, out),
        }
    }
}

pub(crate) fn function_name(node: Node, source: &[u8]) -> Option<String> {
    let declarator = node.child_by_field_name("declarator")?;
    find_identifier(declarator, source)
}

fn find_identifier(node: Node, source: &[u8]) -> Option<String> {
    if node.kind() == "identifier" {
        return node.utf8_text(source).ok().map(|s| s.to_string());
    }
    if let Some(inner) = node.child_by_field_name("declarator") {
        return find_identifier(inner, source);
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if let Some(found) = find_identifier(child, source) {
            return Some(found);
        }
    }
    None
}

pub(crate) fn collect_includes(node: Node, source: &[u8], out: &mut Vec<RawImport>) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() == "preproc_include" {
            if let Ok(text) = child.utf8_text(source) {
                let path = text
                    .trim_start_matches("#include")
                    .trim()
                    .trim_matches(|c| c == '"' || c == '<' || c == '>')
                    .to_string();
                out.push(RawImport {
                    line_number: child.start_position().row as u32 + 1,
                    import_path: path,
                });
            }
        } else {
            collect_includes(child, source, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::code::index_file;
    use std::path::Path;

    #[test]
    fn extracts_function_and_struct() {
        let src = br#"
struct Invoice {
    int id;
};

int total(struct Invoice *inv) {
    return 0;
}
"#;
        let (symbols, _) = index_file(Path::new("invoice.c"), src, Language::C).unwrap();
        assert!(symbols.iter().any(|s| s.symbol_name == "Invoice" && s.kind == SymbolKind::Class));
        assert!(symbols.iter().any(|s| s.symbol_name == "total" && s.kind == SymbolKind::Function));
    }

    #[test]
    fn extracts_include_directives() {
        let src = b"#include <stdio.h>\nint main() { return 0; }\n";
        let (_, imports) = index_file(Path::new("main.c"), src, Language::C).unwrap();
        assert_eq!(imports.len(), 1);
        assert_eq!(imports[0].import_path, "stdio.h");
    }
}
