//! Go analyzer: `function_declaration`, `method_declaration` (receiver
//! makes it a method), and `type_declaration` structs/interfaces as classes.

use tree_sitter::{Node, Tree};

use crate::code::{ExtractedSymbol, LanguageAnalyzer};
use crate::types::{Language, RawImport, SymbolKind};

pub struct GoAnalyzer;

impl LanguageAnalyzer for GoAnalyzer {
    fn language(&self) -> Language {
        Language::Go
    }

    fn tree_sitter_language(&self) -> tree_sitter::Language {
        tree_sitter_go::LANGUAGE.into()
    }

    fn extract_symbols(&self, tree: &Tree, source: &[u8]) -> Vec<ExtractedSymbol> {
        let mut symbols = Vec::new();
        let mut cursor = tree.root_node().walk();
        for child in tree.root_node().children(&mut cursor) {
            match child.kind() {
                "function_declaration" => symbols.push(function_symbol(child, source, false)),
                "method_declaration" => symbols.push(function_symbol(child, source, true)),
                "type_declaration" => collect_type_specs(child, source, &mut symbols),
                _ => {}
            }
        }
        symbols
    }

    fn extract_imports(&self, tree: &Tree, source: &[u8]) -> Vec<RawImport> {
        let mut imports = Vec::new();
        collect_imports(tree.root_node(), source, &mut imports);
        imports
    }
}

fn function_symbol(node: Node, source: &[u8], is_method: bool) -> ExtractedSymbol {
    let name = field_text(node, "name", source);
    let kind = if name.starts_with("Test") {
        SymbolKind::Test
    } else if is_method {
        SymbolKind::Method
    } else {
        SymbolKind::Function
    };
    ExtractedSymbol {
        symbol_name: name,
        kind,
        line_start: node.start_position().row as u32 + 1,
        line_end: node.end_position().row as u32 + 1,
    }
}

fn collect_type_specs(node: Node, source: &[u8], out: &mut Vec<ExtractedSymbol>) {
    let mut cursor = node.walk();
    for spec in node.children(&mut cursor) {
        if spec.kind() != "type_spec" {
            continue;
        }
        let Some(ty) = spec.child_by_field_name("type") else { continue };
        if matches!(ty.kind(), "struct_type" | "interface_type") {
            out.push(ExtractedSymbol {
                symbol_name: field_text(spec, "name", source),
                kind: SymbolKind::Class,
                line_start: spec.start_position().row as u32 + 1,
                line_end: spec.end_position().row as u32 + 1,
            });
        }
    }
}

fn collect_imports(node: Node, source: &[u8], out: &mut Vec<RawImport>) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "import_spec" => {
                if let Some(path_node) = child.child_by_field_name("path") {
                    if let Ok(text) = path_node.utf8_text(source) {
                        out.push(RawImport {
                            line_number: child.start_position().row as u32 + 1,
                            import_path: text.trim_matches('"').to_string(),
                        });
                    }
                }
            }
            _ => collect_imports(child, source, out),
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
    fn extracts_functions_methods_structs_and_tests() {
        let src = br#"
package billing

type Invoice struct {
    ID string
}

func (i *Invoice) Total() int {
    return 0
}

func NewInvoice() *Invoice {
    return &Invoice{}
}

func TestNewInvoice(t *testing.T) {
}
"#;
        let (symbols, _) = index_file(Path::new("invoice.go"), src, Language::Go).unwrap();
        assert!(symbols.iter().any(|s| s.symbol_name == "Invoice" && s.kind == SymbolKind::Class));
        assert!(symbols.iter().any(|s| s.symbol_name == "Total" && s.kind == SymbolKind::Method));
        assert!(symbols.iter().any(|s| s.symbol_name == "NewInvoice" && s.kind == SymbolKind::Function));
        assert!(symbols.iter().any(|s| s.symbol_name == "TestNewInvoice" && s.kind == SymbolKind::Test));
    }

    #[test]
    fn extracts_import_paths() {
        let src = b"package main\n\nimport \"fmt\"\n";
        let (_, imports) = index_file(Path::new("main.go"), src, Language::Go).unwrap();
        assert_eq!(imports.len(), 1);
        assert_eq!(imports[0].import_path, "fmt");
    }
}
