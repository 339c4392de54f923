//! Objective-C analyzer: `class_interface`/`class_implementation` as
//! classes, `method_definition` as methods, `#import`/`#include` as
//! imports.
//!
//! No pack example targets Objective-C; this mirrors the C analyzer's
//! preprocessor-include handling and a best-effort read of the
//! tree-sitter-objc grammar's node-kind names.

use tree_sitter::{Node, Tree};

use super::c;
use crate::code::{ExtractedSymbol, LanguageAnalyzer};
use crate::types::{Language, RawImport, SymbolKind};

pub struct ObjectiveCAnalyzer;

impl LanguageAnalyzer for ObjectiveCAnalyzer {
    fn language(&self) -> Language {
        Language::ObjectiveC
    }

    fn tree_sitter_language(&self) -> tree_sitter::Language {
        tree_sitter_objc::LANGUAGE.into()
    }

    fn extract_symbols(&self, tree: &Tree, source: &[u8]) -> Vec<ExtractedSymbol> {
        let mut symbols = Vec::new();
        walk(tree.root_node(), source, false, &mut symbols);
        symbols
    }

    fn extract_imports(&self, tree: &Tree, source: &[u8]) -> Vec<RawImport> {
        let mut imports = Vec::new();
        collect_imports(tree.root_node(), source, &mut imports);
        c::collect_includes(tree.root_node(), source, &mut imports);
        imports
    }
}

fn walk(node: Node, source: &[u8], in_class: bool, out: &mut Vec<ExtractedSymbol>) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "class_interface" | "class_implementation" | "protocol_declaration" => {
                if let Some(name_node) = child.child_by_field_name("name") {
                    out.push(ExtractedSymbol {
                        symbol_name: name_node.utf8_text(source).unwrap_or("<anonymous>").to_string(),
                        kind: SymbolKind::Class,
                        line_start: child.start_position().row as u32 + 1,
                        line_end: child.end_position().row as u32 + 1,
                    });
                }
                walk(child, source, true, out);
            }
            "method_definition" | "method_declaration" => {
                if let Some(name) = method_name(child, source) {
                    out.push(ExtractedSymbol {
                        symbol_name: name,
                        kind: if in_class { SymbolKind::Method } else { SymbolKind::Function },
                        line_start: child.start_position().row as u32 + 1,
                        line_end: child.end_position().row as u32 + 1,
                    });
                }
            }
            _ => walk(child, source, in_class, out),
        }
    }
}

/// Objective-C selectors are keyword sequences (`doThing:withArg:`); join
/// every `identifier` child under the method's selector node into one name.
fn method_name(node: Node, source: &[u8]) -> Option<String> {
    let text = node.utf8_text(source).ok()?;
    let first_line = text.lines().next().unwrap_or(text);
    Some(first_line.trim_start_matches(['-', '+']).trim().to_string())
}

fn collect_imports(node: Node, source: &[u8], out: &mut Vec<RawImport>) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() == "import_declaration" {
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::code::index_file;
    use std::path::Path;

    #[test]
    fn extracts_class_interface_name() {
        let src = b"@interface Invoice : NSObject\n- (int)total;\n@end\n";
        let (symbols, _) = index_file(Path::new("Invoice.m"), src, Language::ObjectiveC).unwrap();
        assert!(symbols.iter().any(|s| s.symbol_name == "Invoice" && s.kind == SymbolKind::Class));
    }
}
