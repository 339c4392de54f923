//! Language analyzer registry (§9 "Tree-sitter integration"): a grammar
//! registry indexed by `Language`, initialized once and shared across
//! threads. Mirrors `omni-core::parser::registry`.

use std::collections::HashMap;
use std::sync::OnceLock;

use super::LanguageAnalyzer;
use crate::types::Language;

static REGISTRY: OnceLock<Registry> = OnceLock::new();

/// Get the global language analyzer registry.
pub fn global_registry() -> &'static Registry {
    REGISTRY.get_or_init(Registry::new)
}

/// Registry of language analyzers, one per supported `Language` (§4.4's
/// closed language list).
pub struct Registry {
    analyzers: HashMap<Language, Box<dyn LanguageAnalyzer>>,
}

impl Registry {
    fn new() -> Self {
        let mut analyzers: HashMap<Language, Box<dyn LanguageAnalyzer>> = HashMap::new();

        analyzers.insert(Language::Python, Box::new(super::languages::python::PythonAnalyzer));
        analyzers.insert(Language::Rust, Box::new(super::languages::rust::RustAnalyzer));
        analyzers.insert(
            Language::TypeScript,
            Box::new(super::languages::typescript::TypeScriptAnalyzer::new(false)),
        );
        analyzers.insert(
            Language::Tsx,
            Box::new(super::languages::typescript::TypeScriptAnalyzer::new(true)),
        );
        analyzers.insert(Language::JavaScript, Box::new(super::languages::javascript::JavaScriptAnalyzer));
        analyzers.insert(Language::Jsx, Box::new(super::languages::javascript::JavaScriptAnalyzer));
        analyzers.insert(Language::Go, Box::new(super::languages::go::GoAnalyzer));
        analyzers.insert(Language::Java, Box::new(super::languages::java::JavaAnalyzer));
        analyzers.insert(Language::Kotlin, Box::new(super::languages::kotlin::KotlinAnalyzer));
        analyzers.insert(Language::Swift, Box::new(super::languages::swift::SwiftAnalyzer));
        analyzers.insert(Language::C, Box::new(super::languages::c::CAnalyzer));
        analyzers.insert(Language::Cpp, Box::new(super::languages::cpp::CppAnalyzer));
        analyzers.insert(Language::ObjectiveC, Box::new(super::languages::objc::ObjectiveCAnalyzer));

        Self { analyzers }
    }

    /// Get the analyzer for a given language.
    pub fn get(&self, language: Language) -> Option<&dyn LanguageAnalyzer> {
        self.analyzers.get(&language).map(|a| a.as_ref())
    }

    /// List all registered languages.
    pub fn languages(&self) -> Vec<Language> {
        self.analyzers.keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_covers_every_code_language() {
        let reg = global_registry();
        for lang in [
            Language::Python,
            Language::Rust,
            Language::TypeScript,
            Language::Tsx,
            Language::JavaScript,
            Language::Jsx,
            Language::Go,
            Language::Java,
            Language::Kotlin,
            Language::Swift,
            Language::C,
            Language::Cpp,
            Language::ObjectiveC,
        ] {
            assert!(reg.get(lang).is_some(), "missing analyzer for {lang}");
        }
    }

    #[test]
    fn registry_has_no_analyzer_for_non_code_languages() {
        let reg = global_registry();
        assert!(reg.get(Language::Markdown).is_none());
        assert!(reg.get(Language::Unknown).is_none());
    }
}
