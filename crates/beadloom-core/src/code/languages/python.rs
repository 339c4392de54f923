//! Python analyzer, grounded in `omni-core::parser::languages::python`'s
//! handling of `decorated_definition` wrappers around `function_definition`
//! and `class_definition`.

use tree_sitter::{Node, Tree};

use crate::code::{ExtractedSymbol, LanguageAnalyzer};
use crate::types::{Language, RawImport, SymbolKind};

pub struct PythonAnalyzer;

impl LanguageAnalyzer for PythonAnalyzer {
    fn language(&self) -> Language {
        Language::Python
    }

    fn tree_sitter_language(&self) -> tree_sitter::Language {
        tree_sitter_python::LANGUAGE.into()
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

fn walk(node: Node, source: &[u8], in_class: bool, out: &mut Vec<ExtractedSymbol>) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "function_definition" => out.push(function_symbol(child, source, in_class)),
            "class_definition" => {
                out.push(ExtractedSymbol {
                    symbol_name: field_text(child, "name", source),
                    kind: SymbolKind::Class,
                    line_start: child.start_position().row as u32 + 1,
                    line_end: child.end_position().row as u32 + 1,
                });
                if let Some(body) = child.child_by_field_name("body") {
                    walk(body, source, true, out);
                }
            }
            "decorated_definition" => {
                if let Some(def) = child.child_by_field_name("definition") {
                    match def.kind() {
                        "function_definition" => out.push(function_symbol(def, source, in_class)),
                        "class_definition" => walk(child, source, in_class, out),
                        _ => {}
                    }
                }
            }
            "block" | "module" => walk(child, source, in_class, out),
            _ => {}
        }
    }
}

fn function_symbol(node: Node, source: &[u8], in_class: bool) -> ExtractedSymbol {
    let name = field_text(node, "name", source);
    let kind = if name.starts_with("test_") {
        SymbolKind::Test
    } else if in_class {
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

fn collect_imports(node: Node, source: &[u8], out: &mut Vec<RawImport>) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "import_statement" | "import_from_statement" => {
                if let Ok(text) = child.utf8_text(source) {
                    out.push(RawImport {
                        line_number: child.start_position().row as u32 + 1,
                        import_path: text.trim().to_string(),
                    });
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
    fn extracts_class_methods_and_test_functions() {
        let src = br#"
class Invoicer:
    def send(self):
        pass

def test_send_invoice():
    pass

def helper():
    pass
"#;
        let (symbols, _) = index_file(Path::new("billing.py"), src, Language::Python).unwrap();
        assert!(symbols.iter().any(|s| s.symbol_name == "Invoicer" && s.kind == SymbolKind::Class));
        assert!(symbols.iter().any(|s| s.symbol_name == "send" && s.kind == SymbolKind::Method));
        assert!(symbols.iter().any(|s| s.symbol_name == "test_send_invoice" && s.kind == SymbolKind::Test));
        assert!(symbols.iter().any(|s| s.symbol_name == "helper" && s.kind == SymbolKind::Function));
    }

    #[test]
    fn decorated_function_is_still_extracted() {
        let src = b"@app.get(\"/x\")\ndef handler():\n    pass\n";
        let (symbols, _) = index_file(Path::new("api.py"), src, Language::Python).unwrap();
        assert!(symbols.iter().any(|s| s.symbol_name == "handler" && s.kind == SymbolKind::Function));
    }

    #[test]
    fn extracts_from_imports() {
        let src = b"from beadloom.store import Store\n";
        let (_, imports) = index_file(Path::new("mod.py"), src, Language::Python).unwrap();
        assert_eq!(imports.len(), 1);
        assert!(imports[0].import_path.contains("beadloom.store"));
    }
}
