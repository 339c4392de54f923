//! Java analyzer: `class_declaration`/`interface_declaration`/`enum_declaration`
//! as classes, `method_declaration`/`constructor_declaration` as methods,
//! `@Test`-annotated methods as tests.

use tree_sitter::{Node, Tree};

use crate::code::{ExtractedSymbol, LanguageAnalyzer};
use crate::types::{Language, RawImport, SymbolKind};

pub struct JavaAnalyzer;

impl LanguageAnalyzer for JavaAnalyzer {
    fn language(&self) -> Language {
        Language::Java
    }

    fn tree_sitter_language(&self) -> tree_sitter::Language {
        tree_sitter_java::LANGUAGE.into()
    }

    fn extract_symbols(&self, tree: &Tree, source: &[u8]) -> Vec<ExtractedSymbol> {
        let mut symbols = Vec::new();
        walk(tree.root_node(), source, &mut symbols);
        symbols
    }

    fn extract_imports(&self, tree: &Tree, source: &[u8]) -> Vec<RawImport> {
        let mut imports = Vec::new();
        collect_imports(tree.root_node(), source, &mut imports);
        imports
    }
}

fn walk(node: Node, source: &[u8], out: &mut Vec<ExtractedSymbol>) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "class_declaration" | "interface_declaration" | "enum_declaration" => {
                out.push(ExtractedSymbol {
                    symbol_name: field_text(child, "name", source),
                    kind: SymbolKind::Class,
                    line_start: child.start_position().row as u32 + 1,
                    line_end: child.end_position().row as u32 + 1,
                });
                if let Some(body) = child.child_by_field_name("body") {
                    walk(body, source, out);
                }
            }
            "method_declaration" | "constructor_declaration" => {
                let kind = if has_test_annotation(child, source) {
                    SymbolKind::Test
                } else {
                    SymbolKind::Method
                };
                out.push(ExtractedSymbol {
                    symbol_name: field_text(child, "name", source),
                    kind,
                    line_start: child.start_position().row as u32 + 1,
                    line_end: child.end_position().row as u32 + 1,
                });
            }
            _ => walk(child, source, out),
        }
    }
}

fn has_test_annotation(node: Node, source: &[u8]) -> bool {
    let Some(modifiers) = node.child_by_field_name("modifiers") else { return false };
    modifiers
        .utf8_text(source)
        .map(|text| text.contains("@Test"))
        .unwrap_or(false)
}

fn collect_imports(node: Node, source: &[u8], out: &mut Vec<RawImport>) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() == "import_declaration" {
            if let Ok(text) = child.utf8_text(source) {
                let path = text.trim_start_matches("import").trim().trim_end_matches(';').to_string();
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
    fn extracts_class_methods_and_annotated_tests() {
        let src = br#"
public class InvoiceService {
    public void send() {}

    @Test
    public void testSend() {}
}
"#;
        let (symbols, _) = index_file(Path::new("InvoiceService.java"), src, Language::Java).unwrap();
        assert!(symbols.iter().any(|s| s.symbol_name == "InvoiceService" && s.kind == SymbolKind::Class));
        assert!(symbols.iter().any(|s| s.symbol_name == "send" && s.kind == SymbolKind::Method));
        assert!(symbols.iter().any(|s| s.symbol_name == "testSend" && s.kind == SymbolKind::Test));
    }
}
