//! `beadloom:key=value` annotation extraction from leading comment blocks
//! (§4.4: "a map extracted from any leading comment block of the enclosing
//! scope whose content matches `beadloom:key=value` pairs").

use std::collections::BTreeMap;

use crate::types::Language;

/// Collect annotations from the contiguous comment block immediately
/// preceding `line_start` (1-indexed).
pub fn annotations_for_line(source: &str, line_start: u32, language: Language) -> BTreeMap<String, String> {
    let lines: Vec<&str> = source.lines().collect();
    if line_start == 0 {
        return BTreeMap::new();
    }

    let style = CommentStyle::for_language(language);
    let mut block_lines = Vec::new();
    let mut idx = (line_start - 1) as i64 - 1; // zero-indexed line before line_start

    while idx >= 0 {
        let line = lines[idx as usize].trim();
        match style.strip_comment(line) {
            Some(text) => {
                block_lines.push(text);
                idx -= 1;
            }
            None if line.is_empty() && !block_lines.is_empty() => break,
            None => break,
        }
    }

    block_lines.reverse();
    parse_annotation_lines(&block_lines)
}

fn parse_annotation_lines(lines: &[String]) -> BTreeMap<String, String> {
    let mut map = BTreeMap::new();
    for line in lines {
        let Some(rest) = line.trim().strip_prefix("beadloom:") else { continue };
        if let Some((key, value)) = rest.split_once('=') {
            map.insert(key.trim().to_string(), value.trim().to_string());
        }
    }
    map
}

enum CommentStyle {
    Hash,
    DoubleSlash,
    Both,
}

impl CommentStyle {
    fn for_language(language: Language) -> Self {
        match language {
            Language::Python => Self::Hash,
            Language::Rust
            | Language::TypeScript
            | Language::Tsx
            | Language::JavaScript
            | Language::Jsx
            | Language::Go
            | Language::Java
            | Language::Kotlin
            | Language::Swift
            | Language::C
            | Language::Cpp
            | Language::ObjectiveC => Self::DoubleSlash,
            _ => Self::Both,
        }
    }

    /// Strip a line comment marker and return the trailing text, handling
    /// a `/* ... */` block comment line as well since both forms are used
    /// for annotations across the supported languages.
    fn strip_comment(&self, line: &str) -> Option<String> {
        if let Some(rest) = line.strip_prefix("//") {
            return Some(rest.trim().to_string());
        }
        if matches!(self, Self::Hash | Self::Both) {
            if let Some(rest) = line.strip_prefix('#') {
                return Some(rest.trim().to_string());
            }
        }
        let trimmed = line.trim_start_matches("/*").trim_end_matches("*/").trim();
        if line.starts_with("/*") || line.ends_with("*/") || line.starts_with('*') {
            return Some(trimmed.trim_start_matches('*').trim().to_string());
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_annotation_from_hash_comment() {
        let src = "# beadloom:domain=billing\n# beadloom:feature=invoicing\ndef handler():\n    pass\n";
        let annotations = annotations_for_line(src, 3, Language::Python);
        assert_eq!(annotations.get("domain"), Some(&"billing".to_string()));
        assert_eq!(annotations.get("feature"), Some(&"invoicing".to_string()));
    }

    #[test]
    fn extracts_annotation_from_double_slash_comment() {
        let src = "// beadloom:service=auth\nfn handler() {}\n";
        let annotations = annotations_for_line(src, 2, Language::Rust);
        assert_eq!(annotations.get("service"), Some(&"auth".to_string()));
    }

    #[test]
    fn stops_at_blank_line_gap() {
        let src = "# beadloom:domain=billing\n\ndef handler():\n    pass\n";
        let annotations = annotations_for_line(src, 3, Language::Python);
        assert!(annotations.is_empty());
    }

    #[test]
    fn no_comment_yields_empty_map() {
        let src = "def handler():\n    pass\n";
        assert!(annotations_for_line(src, 1, Language::Python).is_empty());
    }
}
