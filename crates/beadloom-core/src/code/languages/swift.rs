//! Swift analyzer: `class_declaration`/`protocol_declaration` as classes,
//! `function_declaration` as functions or methods depending on nesting.

use tree_sitter::{Node, Tree};

use crate::code::{ExtractedSymbol, LanguageAnalyzer};
use crate::types::{Language, RawImport, SymbolKind};

pub struct SwiftAnalyzer;

impl LanguageAnalyzer for SwiftAnalyzer {
    fn language(&self) -> Language {
        Language::Swift
    }

    fn tree_sitter_language(&self) -> tree_sitter::Language {
        tree_sitter_swift::LANGUAGE.into()
    }

    fn extract_symbols(&self, tree: &Tree, source: &[u8]) -> Vec<ExtractedSymbol> {
        let mut symbols = Vec::new();
        walk(tree.root_node(), source, false, &mut symbols);
        symbols
    }

    fn extract_imports(&self, tree: &Tree, source: &[u8]) -> Vec<RawImport> {
        let mut imports = Vec::new();
        collect_imports(tree.root_node(), source, &mut imports);
        imports
    }
}

fn walk(node: Node, source: &[u8], in_type: bool, out: &mut Vec<ExtractedSymbol>) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "class_declaration" | "protocol_declaration" => {
                out.push(ExtractedSymbol {
                    symbol_name: field_text(child, "name", source),
                    kind: SymbolKind::Class,
                    line_start: child.start_position().row as u32 + 1,
                    line_end: child.end_position().row as u32 + 1,
                });
                walk(child, source, true, out);
            }
            "function_declaration" => {
                let name = field_text(child, "name", source);
                let kind = if name.starts_with("test") {
                    SymbolKind::Test
                } else if in_type {
                    SymbolKind::Method
                } else {
                    SymbolKind::Function
                };
                out.push(ExtractedSymbol {
                    symbol_name: name,
                    kind,
                    line_start: child.start_position().row as u32 + 1,
                    line_end: child.end_position().row as u32 + 1,
                });
            }
            _ => walk(child, source, in_type, out),
        }
    }
}

fn collect_imports(node: Node, source: &[u8], out: &mut Vec<RawImport>) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() == "import_declaration" {
            if let Ok(text) = child.utf8_text(source) {
                let path = text.trim_start_matches("import").trim().to_string();
                out.push(RawImport {
                    line_number: child.start_position().row as u32 + 1,
                    import_path: path,
                });
            }
        } else {
            collect_imports(child, source, out);
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
    fn extracts_class_and_function() {
        let src = br#"
class InvoiceService {
    func send() {}
}

func helper() {}
"#;
        let (symbols, _) = index_file(Path::new("Invoice.swift"), src, Language::Swift).unwrap();
        assert!(symbols.iter().any(|s| s.symbol_name == "InvoiceService" && s.kind == SymbolKind::Class));
        assert!(symbols.iter().any(|s| s.symbol_name == "helper" && s.kind == SymbolKind::Function));
    }
}
