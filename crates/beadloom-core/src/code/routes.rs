//! Framework route detection (§4.4 "Frameworks and routes"): a secondary,
//! regex-based pass over raw source text that records `(method, path,
//! handler)` route symbols, independent of the tree-sitter structural pass.

use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;

use crate::types::{CodeSymbol, Language, SymbolKind};

struct RoutePattern {
    regex: &'static Regex,
    method_group: usize,
    path_group: usize,
    handler_group: Option<usize>,
}

fn patterns_for(language: Language) -> Vec<RoutePattern> {
    match language {
        Language::Python => vec![
            // @app.get("/invoices") / @router.post('/x') -- FastAPI
            RoutePattern {
                regex: fastapi_re(),
                method_group: 1,
                path_group: 2,
                handler_group: None,
            },
            // @app.route("/x", methods=["GET"]) -- Flask
            RoutePattern {
                regex: flask_re(),
                method_group: 2,
                path_group: 1,
                handler_group: None,
            },
        ],
        Language::JavaScript | Language::Jsx | Language::TypeScript | Language::Tsx => vec![
            // router.get('/x', handler) -- Express
            RoutePattern {
                regex: express_re(),
                method_group: 1,
                path_group: 2,
                handler_group: None,
            },
            // @Get('/x') -- NestJS
            RoutePattern {
                regex: nestjs_re(),
                method_group: 1,
                path_group: 2,
                handler_group: None,
            },
        ],
        Language::Java | Language::Kotlin => vec![
            // @GetMapping("/x") -- Spring
            RoutePattern {
                regex: spring_re(),
                method_group: 1,
                path_group: 2,
                handler_group: None,
            },
        ],
        Language::Go => vec![
            // r.GET("/x", handler) -- Gin
            RoutePattern {
                regex: gin_re(),
                method_group: 1,
                path_group: 2,
                handler_group: Some(3),
            },
        ],
        _ => Vec::new(),
    }
}

macro_rules! static_regex {
    ($name:ident, $pattern:expr) => {
        fn $name() -> &'static Regex {
            static RE: OnceLock<Regex> = OnceLock::new();
            RE.get_or_init(|| Regex::new($pattern).expect("valid route regex"))
        }
    };
}

static_regex!(fastapi_re, r#"@\w*\.(get|post|put|delete|patch)\(\s*["']([^"']+)["']"#);
static_regex!(flask_re, r#"@\w*\.route\(\s*["']([^"']+)["']\s*,\s*methods\s*=\s*\[\s*["'](\w+)["']"#);
static_regex!(express_re, r#"(?:router|app)\.(get|post|put|delete|patch)\(\s*["']([^"']+)["']"#);
static_regex!(nestjs_re, r#"@(Get|Post|Put|Delete|Patch)\(\s*["']?([^"')]*)["']?\s*\)"#);
static_regex!(spring_re, r#"@(Get|Post|Put|Delete|Patch)Mapping\(\s*["']([^"']+)["']"#);
static_regex!(gin_re, r#"\w+\.(GET|POST|PUT|DELETE|PATCH)\(\s*["']([^"']+)["']\s*,\s*(\w+)"#);

/// Scan `source` for framework route declarations and emit `Route` symbols.
///
/// Each match produces one symbol whose `annotations` carry `method` and
/// `path`; `symbol_name` is the handler name when the pattern captures one,
/// otherwise the path itself.
pub fn detect_routes(file_path: &Path, source: &str, language: Language) -> Vec<CodeSymbol> {
    let patterns = patterns_for(language);
    if patterns.is_empty() {
        return Vec::new();
    }

    let mut symbols = Vec::new();
    for pattern in &patterns {
        for caps in pattern.regex.captures_iter(source) {
            let Some(method_match) = caps.get(pattern.method_group) else { continue };
            let Some(path_match) = caps.get(pattern.path_group) else { continue };

            let method = method_match.as_str().to_uppercase();
            let path = path_match.as_str().to_string();
            let handler = pattern
                .handler_group
                .and_then(|g| caps.get(g))
                .map(|m| m.as_str().to_string())
                .unwrap_or_else(|| path.clone());

            let line = source[..method_match.start()].matches('\n').count() as u32 + 1;

            let mut annotations = std::collections::BTreeMap::new();
            annotations.insert("method".to_string(), method);
            annotations.insert("path".to_string(), path);

            symbols.push(CodeSymbol {
                file_path: file_path.to_path_buf(),
                symbol_name: handler,
                kind: SymbolKind::Route,
                line_start: line,
                line_end: line,
                language,
                annotations,
            });
        }
    }

    symbols
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_fastapi_route() {
        let src = "@app.get(\"/invoices\")\ndef list_invoices():\n    pass\n";
        let routes = detect_routes(Path::new("api.py"), src, Language::Python);
        assert_eq!(routes.len(), 1);
        assert_eq!(routes[0].annotations.get("method"), Some(&"GET".to_string()));
        assert_eq!(routes[0].annotations.get("path"), Some(&"/invoices".to_string()));
    }

    #[test]
    fn detects_express_route() {
        let src = "router.post('/users', createUser);\n";
        let routes = detect_routes(Path::new("routes.js"), src, Language::JavaScript);
        assert_eq!(routes.len(), 1);
        assert_eq!(routes[0].annotations.get("method"), Some(&"POST".to_string()));
    }

    #[test]
    fn non_route_language_yields_nothing() {
        assert!(detect_routes(Path::new("lib.rs"), "fn main() {}", Language::Rust).is_empty());
    }
}
