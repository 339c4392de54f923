//! Node Matcher (§4.8): `{ref_id?, kind?, tag?, exclude?}`, used by `deny`,
//! `require`, `forbid_edge`, `cardinality`, and `layers` rules to select
//! which nodes a rule applies to.

use serde::{Deserialize, Serialize};

use crate::types::{Node, NodeKind};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NodeMatcher {
    #[serde(default)]
    pub ref_id: Option<String>,
    #[serde(default)]
    pub kind: Option<NodeKind>,
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
}

impl NodeMatcher {
    /// `true` iff every non-null field matches and `node.ref_id` is not in
    /// `exclude`.
    pub fn matches(&self, node: &Node) -> bool {
        if self.exclude.iter().any(|id| id == &node.ref_id) {
            return false;
        }
        if let Some(ref_id) = &self.ref_id {
            if ref_id != &node.ref_id {
                return false;
            }
        }
        if let Some(kind) = self.kind {
            if kind != node.kind {
                return false;
            }
        }
        if let Some(tag) = &self.tag {
            if !node.extra.tags.contains(tag) {
                return false;
            }
        }
        true
    }

    /// `true` if at least one field is set — required for `deny`/`require`'s
    /// `from`/`for` positions, which may not match "everything."
    pub fn is_specific(&self) -> bool {
        self.ref_id.is_some() || self.kind.is_some() || self.tag.is_some() || !self.exclude.is_empty()
    }

    pub fn matching<'a>(&self, nodes: &'a [Node]) -> Vec<&'a Node> {
        nodes.iter().filter(|n| self.matches(n)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NodeExtra;

    fn node(ref_id: &str, kind: NodeKind, tags: &[&str]) -> Node {
        Node {
            ref_id: ref_id.to_string(),
            kind,
            summary: String::new(),
            source: String::new(),
            extra: NodeExtra {
                tags: tags.iter().map(|t| t.to_string()).collect(),
                ..Default::default()
            },
        }
    }

    #[test]
    fn matches_by_kind_and_tag() {
        let billing = node("billing", NodeKind::Domain, &["core"]);
        let matcher = NodeMatcher {
            kind: Some(NodeKind::Domain),
            tag: Some("core".to_string()),
            ..Default::default()
        };
        assert!(matcher.matches(&billing));
    }

    #[test]
    fn exclude_overrides_other_fields() {
        let billing = node("billing", NodeKind::Domain, &[]);
        let matcher = NodeMatcher {
            kind: Some(NodeKind::Domain),
            exclude: vec!["billing".to_string()],
            ..Default::default()
        };
        assert!(!matcher.matches(&billing));
    }

    #[test]
    fn empty_matcher_matches_anything() {
        let billing = node("billing", NodeKind::Domain, &[]);
        assert!(NodeMatcher::default().matches(&billing));
        assert!(!NodeMatcher::default().is_specific());
    }
}
