//! C++ analyzer: adds `class_specifier`, `namespace_definition`, and
//! `template_declaration` handling on top of the C analyzer's function and
//! struct extraction.

use tree_sitter::{Node, Tree};

use super::c;
use crate::code::{ExtractedSymbol, LanguageAnalyzer};
use crate::types::{Language, RawImport, SymbolKind};

pub struct CppAnalyzer;

impl LanguageAnalyzer for CppAnalyzer {
    fn language(&self) -> Language {
        Language::Cpp
    }

    fn tree_sitter_language(&self) -> tree_sitter::Language {
        tree_sitter_cpp::LANGUAGE.into()
    }

    fn extract_symbols(&self, tree: &Tree, source: &[u8]) -> Vec<ExtractedSymbol> {
        let mut symbols = Vec::new();
        walk(tree.root_node(), source, &mut symbols);
        symbols
    }

    fn extract_imports(&self, tree: &Tree, source: &[u8]) -> Vec<RawImport> {
        let mut imports = Vec::new();
        c::collect_includes(tree.root_node(), source, &mut imports);
        imports
    }
}

fn walk(node: Node, source: &[u8], out: &mut Vec<ExtractedSymbol>) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "class_specifier" | "struct_specifier" => {
                if let Some(name_node) = child.child_by_field_name("name") {
                    out.push(ExtractedSymbol {
                        symbol_name: name_node.utf8_text(source).unwrap_or("<anonymous>").to_string(),
                        kind: SymbolKind::Class,
                        line_start: child.start_position().row as u32 + 1,
                        line_end: child.end_position().row as u32 + 1,
                    });
                }
                if let Some(body) = child.child_by_field_name("body") {
                    walk(body, source, out);
                }
            }
            "function_definition" => {
                if let Some(name) = c::function_name(child, source) {
                    out.push(ExtractedSymbol {
                        symbol_name: name,
                        kind: SymbolKind::Function,
                        line_start: child.start_position().row as u32 + 1,
                        line_end: child.end_position().row as u32 + 1,
                    });
                }
            }
            "namespace_definition" | "template_declaration" | "field_declaration_list"
            | "declaration_list" => walk(child, source, out),
            _ => {}
        }
    }
}
