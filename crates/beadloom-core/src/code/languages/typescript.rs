//! TypeScript/TSX analyzer, grounded in
//! `omni-core::parser::languages::typescript`'s handling of
//! `export_statement` wrappers and arrow-function class fields.

use tree_sitter::{Node, Tree};

use crate::code::{ExtractedSymbol, LanguageAnalyzer};
use crate::types::{Language, RawImport, SymbolKind};

pub struct TypeScriptAnalyzer {
    tsx: bool,
}

impl TypeScriptAnalyzer {
    pub fn new(tsx: bool) -> Self {
        Self { tsx }
    }
}

impl LanguageAnalyzer for TypeScriptAnalyzer {
    fn language(&self) -> Language {
        if self.tsx {
            Language::Tsx
        } else {
            Language::TypeScript
        }
    }

    fn tree_sitter_language(&self) -> tree_sitter::Language {
        if self.tsx {
            tree_sitter_typescript::LANGUAGE_TSX.into()
        } else {
            tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into()
        }
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

pub(crate) fn walk(node: Node, source: &[u8], in_class: bool, out: &mut Vec<ExtractedSymbol>) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "function_declaration" => out.push(function_symbol(child, source, in_class)),
            "method_definition" => out.push(function_symbol(child, source, true)),
            "class_declaration" => {
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
            "export_statement" | "class_body" | "program" | "statement_block" => {
                walk(child, source, in_class, out)
            }
            "lexical_declaration" | "variable_declaration" => {
                collect_arrow_const(child, source, in_class, out)
            }
            _ => {}
        }
    }
}

/// `const handler = (req, res) => {...}` / `export const x = async () => {}`.
fn collect_arrow_const(node: Node, source: &[u8], in_class: bool, out: &mut Vec<ExtractedSymbol>) {
    let mut cursor = node.walk();
    for declarator in node.children(&mut cursor) {
        if declarator.kind() != "variable_declarator" {
            continue;
        }
        let Some(value) = declarator.child_by_field_name("value") else { continue };
        if matches!(value.kind(), "arrow_function" | "function_expression") {
            let name = declarator
                .child_by_field_name("name")
                .and_then(|n| n.utf8_text(source).ok())
                .unwrap_or("<anonymous>")
                .to_string();
            let kind = test_kind(&name, in_class);
            out.push(ExtractedSymbol {
                symbol_name: name,
                kind,
                line_start: declarator.start_position().row as u32 + 1,
                line_end: value.end_position().row as u32 + 1,
            });
        }
    }
}

fn function_symbol(node: Node, source: &[u8], in_class: bool) -> ExtractedSymbol {
    let name = field_text(node, "name", source);
    ExtractedSymbol {
        symbol_name: name.clone(),
        kind: test_kind(&name, in_class),
        line_start: node.start_position().row as u32 + 1,
        line_end: node.end_position().row as u32 + 1,
    }
}

fn test_kind(name: &str, in_class: bool) -> SymbolKind {
    if name.starts_with("test") || name.ends_with("Test") {
        SymbolKind::Test
    } else if in_class {
        SymbolKind::Method
    } else {
        SymbolKind::Function
    }
}

fn collect_imports(node: Node, source: &[u8], out: &mut Vec<RawImport>) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() == "import_statement" {
            if let Ok(text) = child.utf8_text(source) {
                out.push(RawImport {
                    line_number: child.start_position().row as u32 + 1,
                    import_path: text.trim().to_string(),
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
    fn extracts_class_and_function_declarations() {
        let src = br#"
export class UserService {
    findOne() {}
}

export function createUser() {}

const testHelper = () => {};
"#;
        let (symbols, _) = index_file(Path::new("users.ts"), src, Language::TypeScript).unwrap();
        assert!(symbols.iter().any(|s| s.symbol_name == "UserService" && s.kind == SymbolKind::Class));
        assert!(symbols.iter().any(|s| s.symbol_name == "findOne" && s.kind == SymbolKind::Method));
        assert!(symbols.iter().any(|s| s.symbol_name == "createUser" && s.kind == SymbolKind::Function));
    }

    #[test]
    fn extracts_import_statements() {
        let src = b"import { Store } from './store';\n";
        let (_, imports) = index_file(Path::new("index.ts"), src, Language::TypeScript).unwrap();
        assert_eq!(imports.len(), 1);
    }
}
