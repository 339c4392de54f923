//! JavaScript/JSX analyzer. Shares its structural walk with the TypeScript
//! analyzer since the two grammars agree on the node kinds this indexer
//! cares about (`function_declaration`, `class_declaration`,
//! `method_definition`, arrow-function `variable_declarator`s).

use tree_sitter::Tree;

use super::typescript;
use crate::code::{ExtractedSymbol, LanguageAnalyzer};
use crate::types::{Language, RawImport};

pub struct JavaScriptAnalyzer;

impl LanguageAnalyzer for JavaScriptAnalyzer {
    fn language(&self) -> Language {
        Language::JavaScript
    }

    fn tree_sitter_language(&self) -> tree_sitter::Language {
        tree_sitter_javascript::LANGUAGE.into()
    }

    fn extract_symbols(&self, tree: &Tree, source: &[u8]) -> Vec<ExtractedSymbol> {
        let mut symbols = Vec::new();
        typescript::walk(tree.root_node(), source, false, &mut symbols);
        symbols
    }

    fn extract_imports(&self, tree: &Tree, source: &[u8]) -> Vec<RawImport> {
        let mut imports = Vec::new();
        collect_imports(tree.root_node(), source, &mut imports);
        imports
    }
}

fn collect_imports(node: tree_sitter::Node, source: &[u8], out: &mut Vec<RawImport>) {
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::code::index_file;
    use crate::types::SymbolKind;
    use std::path::Path;

    #[test]
    fn extracts_express_handler_and_class() {
        let src = br#"
class UserController {
    list() {}
}

function createUser() {}
"#;
        let (symbols, _) = index_file(Path::new("users.js"), src, Language::JavaScript).unwrap();
        assert!(symbols.iter().any(|s| s.symbol_name == "UserController" && s.kind == SymbolKind::Class));
        assert!(symbols.iter().any(|s| s.symbol_name == "createUser" && s.kind == SymbolKind::Function));
    }
}
