//! Graph Loader (§4.2): parses `.beadloom/_graph/*.yml` into in-memory
//! node/edge vectors, validating the closed kind sets and `ref_id`
//! uniqueness before anything touches the store.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_yaml::Value;

use crate::error::{BeadloomError, BeadloomResult};
use crate::types::{Edge, EdgeKind, Link, Node, NodeExtra, NodeKind};

/// Result of loading every graph YAML file under a `_graph` directory.
#[derive(Debug, Default, Clone)]
pub struct LoadedGraph {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

#[derive(Debug, Deserialize)]
struct GraphFile {
    #[serde(default)]
    nodes: Vec<RawNode>,
    #[serde(default)]
    edges: Vec<RawEdge>,
    /// v3 bulk tag assignment: `tags: {tag_name: [ref_id, ...]}` (§4.2.4).
    #[serde(default)]
    version: Option<u32>,
    #[serde(default)]
    tags: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct RawNode {
    ref_id: String,
    kind: String,
    #[serde(default)]
    summary: String,
    #[serde(default)]
    source: String,
    #[serde(default)]
    docs: Vec<String>,
    #[serde(default)]
    links: Vec<Link>,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    c4_level: Option<String>,
    /// Every other top-level field, captured for `extra.other` (§4.2.3).
    #[serde(flatten)]
    extra_fields: serde_yaml::Mapping,
}

#[derive(Debug, Deserialize)]
struct RawEdge {
    src: String,
    dst: String,
    kind: String,
}

const KNOWN_NODE_FIELDS: &[&str] = &[
    "ref_id", "kind", "summary", "source", "docs", "links", "tags", "c4_level",
];

/// Walk `graph_dir`, parse every `*.yml` file, and merge into one graph.
///
/// `rules.yml` is excluded — it is parsed by the Rule Engine (§4.8), not
/// here, even though it lives in the same directory.
pub fn load_graph_dir(graph_dir: &Path) -> BeadloomResult<LoadedGraph> {
    let mut entries: Vec<PathBuf> = Vec::new();
    if graph_dir.exists() {
        for entry in std::fs::read_dir(graph_dir)? {
            let entry = entry?;
            let path = entry.path();
            let is_yml = path.extension().and_then(|e| e.to_str()) == Some("yml")
                || path.extension().and_then(|e| e.to_str()) == Some("yaml");
            if is_yml && path.file_name().and_then(|n| n.to_str()) != Some("rules.yml") {
                entries.push(path);
            }
        }
    }
    entries.sort();

    let mut seen_ref_ids: HashMap<String, PathBuf> = HashMap::new();
    let mut graph = LoadedGraph::default();

    for path in &entries {
        load_graph_file(path, &mut graph, &mut seen_ref_ids)?;
    }

    Ok(graph)
}

/// Parse a single graph YAML file and merge its nodes/edges into `graph`,
/// tracking cross-file `ref_id` uniqueness via `seen_ref_ids`.
fn load_graph_file(
    path: &Path,
    graph: &mut LoadedGraph,
    seen_ref_ids: &mut HashMap<String, PathBuf>,
) -> BeadloomResult<()> {
    let content = std::fs::read_to_string(path)?;
    let file: GraphFile = serde_yaml::from_str(&content).map_err(|e| {
        BeadloomError::from(e).with_path(path)
    })?;

    if let Some(version) = file.version {
        if !(1..=3).contains(&version) {
            return Err(BeadloomError::Config {
                path: path.to_path_buf(),
                details: format!("unsupported graph schema version {version}"),
            });
        }
    }

    for raw in &file.nodes {
        if raw.ref_id.is_empty() {
            return Err(BeadloomError::Config {
                path: path.to_path_buf(),
                details: "node has an empty ref_id".to_string(),
            });
        }
        if let Some(prior) = seen_ref_ids.get(&raw.ref_id) {
            return Err(BeadloomError::Config {
                path: path.to_path_buf(),
                details: format!(
                    "duplicate ref_id '{}' (already defined in {})",
                    raw.ref_id,
                    prior.display()
                ),
            });
        }
        let kind = NodeKind::parse(&raw.kind).ok_or_else(|| BeadloomError::Config {
            path: path.to_path_buf(),
            details: format!(
                "node '{}' has unknown kind '{}' (expected one of {})",
                raw.ref_id,
                raw.kind,
                NodeKind::ALL.iter().map(|k| k.as_str()).collect::<Vec<_>>().join(", ")
            ),
        })?;

        seen_ref_ids.insert(raw.ref_id.clone(), path.to_path_buf());
        graph.nodes.push(node_from_raw(raw, kind));
    }

    for raw in &file.edges {
        let kind = EdgeKind::parse(&raw.kind).ok_or_else(|| BeadloomError::Config {
            path: path.to_path_buf(),
            details: format!(
                "edge {} -> {} has unknown kind '{}' (expected one of {})",
                raw.src,
                raw.dst,
                raw.kind,
                EdgeKind::ALL.iter().map(|k| k.as_str()).collect::<Vec<_>>().join(", ")
            ),
        })?;
        graph.edges.push(Edge {
            src_ref_id: raw.src.clone(),
            dst_ref_id: raw.dst.clone(),
            kind,
        });
    }

    // v3 bulk tag assignment (§4.2.4): merge into matching nodes' extra.tags.
    if !file.tags.is_empty() {
        let mut by_ref: HashMap<&str, &mut Node> =
            graph.nodes.iter_mut().map(|n| (n.ref_id.as_str(), n)).collect();
        for (tag, ref_ids) in &file.tags {
            for ref_id in ref_ids {
                if let Some(node) = by_ref.get_mut(ref_id.as_str()) {
                    node.extra.tags.insert(tag.clone());
                }
            }
        }
    }

    Ok(())
}

fn node_from_raw(raw: &RawNode, kind: NodeKind) -> Node {
    let mut extra = NodeExtra {
        tags: raw.tags.iter().cloned().collect(),
        links: raw.links.clone(),
        c4_level: raw.c4_level.clone(),
        docs: raw.docs.clone(),
        other: serde_json::Map::new(),
    };

    let known: HashSet<&str> = KNOWN_NODE_FIELDS.iter().copied().collect();
    for (key, value) in &raw.extra_fields {
        let Some(key_str) = key.as_str() else { continue };
        if known.contains(key_str) {
            continue;
        }
        extra.other.insert(key_str.to_string(), yaml_to_json(value));
    }

    Node {
        ref_id: raw.ref_id.clone(),
        kind,
        summary: raw.summary.clone(),
        source: raw.source.clone(),
        extra,
    }
}

fn yaml_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                serde_json::Value::from(i)
            } else if let Some(f) = n.as_f64() {
                serde_json::Number::from_f64(f)
                    .map(serde_json::Value::Number)
                    .unwrap_or(serde_json::Value::Null)
            } else {
                serde_json::Value::Null
            }
        }
        Value::String(s) => serde_json::Value::String(s.clone()),
        Value::Sequence(seq) => {
            serde_json::Value::Array(seq.iter().map(yaml_to_json).collect())
        }
        Value::Mapping(map) => {
            let mut obj = serde_json::Map::new();
            for (k, v) in map {
                if let Some(key) = k.as_str() {
                    obj.insert(key.to_string(), yaml_to_json(v));
                }
            }
            serde_json::Value::Object(obj)
        }
        Value::Tagged(tagged) => yaml_to_json(&tagged.value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &Path, name: &str, content: &str) {
        std::fs::write(dir.join(name), content).unwrap();
    }

    #[test]
    fn loads_nodes_and_edges_with_extra_fields() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "graph.yml",
            r#"
nodes:
  - ref_id: billing
    kind: domain
    summary: Billing domain
    source: src/billing/
    tags: [core]
    custom_field: hello
  - ref_id: auth
    kind: domain
    source: src/auth/
edges:
  - src: billing
    dst: auth
    kind: depends_on
"#,
        );

        let graph = load_graph_dir(dir.path()).unwrap();
        assert_eq!(graph.nodes.len(), 2);
        assert_eq!(graph.edges.len(), 1);

        let billing = graph.nodes.iter().find(|n| n.ref_id == "billing").unwrap();
        assert!(billing.extra.tags.contains("core"));
        assert_eq!(
            billing.extra.other.get("custom_field").and_then(|v| v.as_str()),
            Some("hello")
        );
    }

    #[test]
    fn duplicate_ref_id_across_files_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.yml", "nodes:\n  - ref_id: billing\n    kind: domain\n");
        write(dir.path(), "b.yml", "nodes:\n  - ref_id: billing\n    kind: domain\n");

        let err = load_graph_dir(dir.path()).unwrap_err();
        assert!(matches!(err, BeadloomError::Config { .. }));
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.yml", "nodes:\n  - ref_id: x\n    kind: bogus\n");

        let err = load_graph_dir(dir.path()).unwrap_err();
        assert!(matches!(err, BeadloomError::Config { .. }));
    }

    #[test]
    fn v3_bulk_tags_merge_into_node_extra() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "graph.yml",
            r#"
version: 3
nodes:
  - ref_id: billing
    kind: domain
tags:
  core: [billing]
"#,
        );

        let graph = load_graph_dir(dir.path()).unwrap();
        let billing = graph.nodes.iter().find(|n| n.ref_id == "billing").unwrap();
        assert!(billing.extra.tags.contains("core"));
    }

    #[test]
    fn rules_yml_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "graph.yml", "nodes:\n  - ref_id: x\n    kind: domain\n");
        write(dir.path(), "rules.yml", "not: valid: graph: yaml:::");

        let graph = load_graph_dir(dir.path()).unwrap();
        assert_eq!(graph.nodes.len(), 1);
    }
}
