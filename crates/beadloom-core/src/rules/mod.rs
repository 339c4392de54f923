//! Rule Engine (§4.8): parses `rules.yml` into an immutable rule set and
//! evaluates it against the store.

pub mod evaluate;
pub mod matcher;

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{BeadloomError, BeadloomResult};
use crate::store::Store;
use crate::types::{EdgeKind, Node};
use matcher::NodeMatcher;

pub use evaluate::evaluate_all;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Warn,
}

impl Default for Severity {
    fn default() -> Self {
        Self::Error
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LayerSpec {
    pub name: String,
    pub tag: String,
}

/// One of the Rule Engine's seven variants (§4.8). Each carries its own
/// name, description, and severity alongside variant-specific fields.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Rule {
    Deny {
        name: String,
        #[serde(default)]
        description: String,
        #[serde(default)]
        severity: Severity,
        from: NodeMatcher,
        to: NodeMatcher,
        #[serde(default)]
        unless_edge: Vec<EdgeKind>,
    },
    Require {
        name: String,
        #[serde(default)]
        description: String,
        #[serde(default)]
        severity: Severity,
        #[serde(rename = "for")]
        for_matcher: NodeMatcher,
        has_edge_to: NodeMatcher,
        #[serde(default)]
        edge_kind: Option<EdgeKind>,
    },
    ForbidCycles {
        name: String,
        #[serde(default)]
        description: String,
        #[serde(default)]
        severity: Severity,
        edge_kind: Vec<EdgeKind>,
        #[serde(default = "default_max_depth")]
        max_depth: usize,
    },
    ForbidImport {
        name: String,
        #[serde(default)]
        description: String,
        #[serde(default)]
        severity: Severity,
        from_glob: String,
        to_glob: String,
    },
    ForbidEdge {
        name: String,
        #[serde(default)]
        description: String,
        #[serde(default)]
        severity: Severity,
        from: NodeMatcher,
        to: NodeMatcher,
        #[serde(default)]
        edge_kind: Option<EdgeKind>,
    },
    Layers {
        name: String,
        #[serde(default)]
        description: String,
        #[serde(default)]
        severity: Severity,
        layers: Vec<LayerSpec>,
        edge_kind: EdgeKind,
        #[serde(default)]
        allow_skip: bool,
    },
    #[serde(rename = "check")]
    Cardinality {
        name: String,
        #[serde(default)]
        description: String,
        #[serde(default = "default_warn_severity")]
        severity: Severity,
        #[serde(rename = "for")]
        for_matcher: NodeMatcher,
        #[serde(default)]
        max_symbols: Option<usize>,
        #[serde(default)]
        max_files: Option<usize>,
        #[serde(default)]
        min_doc_coverage: Option<f64>,
    },
}

fn default_max_depth() -> usize {
    10
}

fn default_warn_severity() -> Severity {
    Severity::Warn
}

impl Rule {
    pub fn name(&self) -> &str {
        match self {
            Rule::Deny { name, .. }
            | Rule::Require { name, .. }
            | Rule::ForbidCycles { name, .. }
            | Rule::ForbidImport { name, .. }
            | Rule::ForbidEdge { name, .. }
            | Rule::Layers { name, .. }
            | Rule::Cardinality { name, .. } => name,
        }
    }

    pub fn description(&self) -> &str {
        match self {
            Rule::Deny { description, .. }
            | Rule::Require { description, .. }
            | Rule::ForbidCycles { description, .. }
            | Rule::ForbidImport { description, .. }
            | Rule::ForbidEdge { description, .. }
            | Rule::Layers { description, .. }
            | Rule::Cardinality { description, .. } => description,
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            Rule::Deny { severity, .. }
            | Rule::Require { severity, .. }
            | Rule::ForbidCycles { severity, .. }
            | Rule::ForbidImport { severity, .. }
            | Rule::ForbidEdge { severity, .. }
            | Rule::Layers { severity, .. }
            | Rule::Cardinality { severity, .. } => *severity,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Rule::Deny { .. } => "deny",
            Rule::Require { .. } => "require",
            Rule::ForbidCycles { .. } => "forbid_cycles",
            Rule::ForbidImport { .. } => "forbid_import",
            Rule::ForbidEdge { .. } => "forbid_edge",
            Rule::Layers { .. } => "layers",
            Rule::Cardinality { .. } => "check",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Violation {
    pub rule_name: String,
    pub rule_description: String,
    pub rule_type: String,
    pub severity: Severity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_number: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_ref_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_ref_id: Option<String>,
    pub message: String,
}

#[derive(Debug, Deserialize)]
struct RulesFile {
    version: u32,
    #[serde(default)]
    rules: Vec<Rule>,
    #[serde(default)]
    tags: std::collections::BTreeMap<String, Vec<String>>,
}

/// Parse `rules.yml`'s content into a validated rule set. An absent file is
/// handled by the caller (§4.8 "Failure semantics": zero violations, not an
/// error) — this function only runs once content is already read.
pub fn parse_rules(content: &str, path: &Path) -> BeadloomResult<Vec<Rule>> {
    let file: RulesFile = serde_yaml::from_str(content).map_err(|e| BeadloomError::from(e).with_path(path))?;

    if !(1..=3).contains(&file.version) {
        return Err(BeadloomError::Config {
            path: path.to_path_buf(),
            details: format!("unsupported rules schema version {}", file.version),
        });
    }

    let mut seen = std::collections::HashSet::new();
    for rule in &file.rules {
        if !seen.insert(rule.name().to_string()) {
            return Err(BeadloomError::Config {
                path: path.to_path_buf(),
                details: format!("duplicate rule name '{}'", rule.name()),
            });
        }
        validate_rule_shape(rule, path)?;
    }

    Ok(file.rules)
}

fn validate_rule_shape(rule: &Rule, path: &Path) -> BeadloomResult<()> {
    let specific_ok = match rule {
        Rule::Deny { from, .. } => from.is_specific(),
        Rule::Require { for_matcher, .. } => for_matcher.is_specific(),
        Rule::Cardinality { for_matcher, .. } => for_matcher.is_specific(),
        _ => true,
    };
    if !specific_ok {
        return Err(BeadloomError::Config {
            path: path.to_path_buf(),
            details: format!("rule '{}' requires a non-empty matcher in its 'from'/'for' position", rule.name()),
        });
    }
    Ok(())
}

/// Load `rules.yml` if present, merge any version-3 `tags:` block into
/// matching nodes in the store, and return the parsed rule set. An absent
/// file yields an empty rule set, not an error.
///
/// The tags block is folded in here rather than in the Graph Loader: by the
/// time `rules.yml` is parsed the graph is already persisted, so merging
/// happens against the store directly instead of an in-memory node vector.
pub fn load_rules(store: &Store, rules_path: &Path) -> BeadloomResult<Vec<Rule>> {
    if !rules_path.exists() {
        return Ok(Vec::new());
    }

    let content = std::fs::read_to_string(rules_path)?;
    let file: RulesFile = serde_yaml::from_str(&content).map_err(|e| BeadloomError::from(e).with_path(rules_path))?;

    for (tag, ref_ids) in &file.tags {
        for ref_id in ref_ids {
            if let Some(mut node) = store.get_node(ref_id)? {
                node.extra.tags.insert(tag.clone());
                store.upsert_node(&node)?;
            }
        }
    }

    parse_rules(&content, rules_path)
}

/// Persist `rules` into the `rules` table, replacing whatever was there
/// (§4.6: rule reload happens on every reindex alongside the graph).
pub fn persist_rules(store: &Store, rules: &[Rule]) -> BeadloomResult<()> {
    store.clear_rules()?;
    for rule in rules {
        let rule_json = serde_json::to_string(rule)
            .map_err(|e| BeadloomError::Internal(format!("serializing rule '{}': {e}", rule.name())))?;
        store.upsert_rule(rule.name(), rule.type_name(), &rule_json, true)?;
    }
    Ok(())
}

/// Load every enabled rule row back out of the store, deserializing each
/// `rule_json` into its `Rule` variant. Disabled rows are skipped rather
/// than evaluated (§4.8 "enabled" flag).
pub fn load_enabled_rules(store: &Store) -> BeadloomResult<Vec<Rule>> {
    let rows = store.list_rule_rows()?;
    rows.into_iter()
        .filter(|(_, _, _, enabled)| *enabled)
        .map(|(name, _, rule_json, _)| {
            serde_json::from_str(&rule_json)
                .map_err(|e| BeadloomError::Internal(format!("deserializing rule '{name}': {e}")))
        })
        .collect()
}

/// Ref_ids named by a rule's matchers that don't correspond to any known
/// node. Non-fatal (§4.8 "Failure semantics"): reindex logs these as
/// warnings rather than aborting.
pub fn validate_rules(rules: &[Rule], nodes: &[Node]) -> Vec<String> {
    let known: std::collections::HashSet<&str> = nodes.iter().map(|n| n.ref_id.as_str()).collect();
    let mut warnings = Vec::new();

    let mut check = |rule: &Rule, matcher: &NodeMatcher| {
        if let Some(ref_id) = &matcher.ref_id {
            if !known.contains(ref_id.as_str()) {
                warnings.push(format!("rule '{}' references unknown ref_id '{}'", rule.name(), ref_id));
            }
        }
    };

    for rule in rules {
        match rule {
            Rule::Deny { from, to, .. } => {
                check(rule, from);
                check(rule, to);
            }
            Rule::Require { for_matcher, has_edge_to, .. } => {
                check(rule, for_matcher);
                check(rule, has_edge_to);
            }
            Rule::ForbidEdge { from, to, .. } => {
                check(rule, from);
                check(rule, to);
            }
            Rule::Cardinality { for_matcher, .. } => check(rule, for_matcher),
            Rule::ForbidCycles { .. } | Rule::ForbidImport { .. } | Rule::Layers { .. } => {}
        }
    }
    warnings
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_deny_rule() {
        let yaml = r#"
version: 1
rules:
  - type: deny
    name: no_billing_to_internal
    from: { tag: "public-api" }
    to: { tag: "internal" }
"#;
        let rules = parse_rules(yaml, Path::new("rules.yml")).unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].name(), "no_billing_to_internal");
        assert_eq!(rules[0].type_name(), "deny");
    }

    #[test]
    fn rejects_unsupported_schema_version() {
        let yaml = "version: 9\nrules: []\n";
        assert!(parse_rules(yaml, Path::new("rules.yml")).is_err());
    }

    #[test]
    fn rejects_duplicate_rule_names() {
        let yaml = r#"
version: 1
rules:
  - type: require
    name: dup
    for: { kind: domain }
    has_edge_to: {}
  - type: require
    name: dup
    for: { kind: service }
    has_edge_to: {}
"#;
        assert!(parse_rules(yaml, Path::new("rules.yml")).is_err());
    }

    #[test]
    fn deny_rule_requires_specific_from_matcher() {
        let yaml = r#"
version: 1
rules:
  - type: deny
    name: bad
    from: {}
    to: { kind: domain }
"#;
        assert!(parse_rules(yaml, Path::new("rules.yml")).is_err());
    }
}
