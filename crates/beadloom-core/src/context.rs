//! Context Assembler (§4.9): given one or more focus `ref_id`s, BFS the
//! `part_of`/`depends_on`/`uses` subgraph out to a bounded depth and node
//! count, then attach the docs, code symbols, sync state, and rule
//! constraints relevant to that subgraph.

use std::collections::{BTreeSet, HashMap, HashSet};

use crate::error::{BeadloomError, BeadloomResult};
use crate::rules::matcher::NodeMatcher;
use crate::rules::Rule;
use crate::store::Store;
use crate::types::{
    BundleConstraint, BundleFocus, BundleGraph, BundleNode, BundleTextChunk, CodeSymbol, ContextBundle, Edge,
    EdgeKind, Node,
};

const TRAVERSAL_KINDS: [EdgeKind; 3] = [EdgeKind::PartOf, EdgeKind::DependsOn, EdgeKind::Uses];

/// Assemble a context bundle rooted at `ref_ids[0]`, pulling in related
/// nodes via BFS seeded from every id in `ref_ids` (§4.9 "Select
/// subgraph").
pub fn assemble(
    store: &Store,
    rules: &[Rule],
    ref_ids: &[String],
    depth: usize,
    max_nodes: usize,
    max_chunks: usize,
) -> BeadloomResult<ContextBundle> {
    if ref_ids.is_empty() {
        return Err(BeadloomError::Internal("assemble requires at least one ref_id".to_string()));
    }

    let focus_node = store.require_node(&ref_ids[0])?;
    let (sub_nodes, sub_edges) = build_subgraph(store, ref_ids, depth, max_nodes)?;

    let mut text_chunks = Vec::new();
    for node in &sub_nodes {
        text_chunks.extend(chunks_for_node(store, node, max_chunks)?);
    }

    let code_symbols = collect_symbols(store, &sub_nodes)?;

    let mut sync_status = Vec::new();
    for ref_id in ref_ids {
        sync_status.extend(store.sync_states_for_ref(ref_id)?);
    }

    let sub_ref_ids: BTreeSet<String> = sub_nodes.iter().map(|n| n.ref_id.clone()).collect();
    let constraints = rules
        .iter()
        .filter(|rule| rule_touches_subgraph(rule, &sub_ref_ids))
        .map(to_constraint)
        .collect::<BeadloomResult<Vec<_>>>()?;

    Ok(ContextBundle {
        version: 2,
        focus: BundleFocus {
            ref_id: focus_node.ref_id.clone(),
            kind: focus_node.kind,
            summary: focus_node.summary.clone(),
            links: focus_node.extra.links.clone(),
        },
        graph: BundleGraph {
            nodes: sub_nodes
                .iter()
                .map(|n| BundleNode {
                    ref_id: n.ref_id.clone(),
                    kind: n.kind,
                    summary: n.summary.clone(),
                })
                .collect(),
            edges: sub_edges,
        },
        text_chunks,
        code_symbols,
        sync_status,
        constraints,
    })
}

/// BFS outward from `seeds` across `part_of`/`depends_on`/`uses` edges in
/// both directions, stopping at `depth` levels or `max_nodes` visited
/// nodes, whichever comes first. Neighbors are visited in lexicographic
/// `ref_id` order so the result is deterministic for identical inputs.
fn build_subgraph(
    store: &Store,
    seeds: &[String],
    depth: usize,
    max_nodes: usize,
) -> BeadloomResult<(Vec<Node>, Vec<Edge>)> {
    let all_nodes = store.list_nodes()?;
    let all_edges = store.list_edges()?;

    let mut adjacency: HashMap<&str, BTreeSet<&str>> = HashMap::new();
    for edge in &all_edges {
        if !TRAVERSAL_KINDS.contains(&edge.kind) {
            continue;
        }
        adjacency.entry(edge.src_ref_id.as_str()).or_default().insert(edge.dst_ref_id.as_str());
        adjacency.entry(edge.dst_ref_id.as_str()).or_default().insert(edge.src_ref_id.as_str());
    }

    let mut visited: BTreeSet<String> = seeds.iter().cloned().collect();
    let mut frontier: BTreeSet<String> = visited.clone();

    for _ in 0..depth {
        if visited.len() >= max_nodes || frontier.is_empty() {
            break;
        }
        let mut next_frontier: BTreeSet<String> = BTreeSet::new();
        for node_id in &frontier {
            let Some(neighbors) = adjacency.get(node_id.as_str()) else { continue };
            for neighbor in neighbors {
                if visited.len() + next_frontier.len() >= max_nodes {
                    break;
                }
                if !visited.contains(*neighbor) {
                    next_frontier.insert((*neighbor).to_string());
                }
            }
        }
        for id in &next_frontier {
            visited.insert(id.clone());
        }
        frontier = next_frontier;
    }

    let subgraph_nodes: Vec<Node> = all_nodes.into_iter().filter(|n| visited.contains(&n.ref_id)).collect();
    let subgraph_edges: Vec<Edge> = all_edges
        .into_iter()
        .filter(|e| visited.contains(&e.src_ref_id) && visited.contains(&e.dst_ref_id))
        .collect();

    Ok((subgraph_nodes, subgraph_edges))
}

/// Chunks owned by `node`'s docs, ordered so sections whose heading path
/// names the node come first, then by ascending `chunk_index` (§4.9
/// "order by proximity to the focus").
fn chunks_for_node(store: &Store, node: &Node, max_chunks: usize) -> BeadloomResult<Vec<BundleTextChunk>> {
    let mut chunks = Vec::new();
    for doc in store.docs_for_ref(&node.ref_id)? {
        chunks.extend(store.chunks_for_doc(&doc.path)?);
    }

    let needle = node.ref_id.to_lowercase();
    chunks.sort_by(|a, b| {
        let a_match = a.heading_path.to_lowercase().contains(&needle);
        let b_match = b.heading_path.to_lowercase().contains(&needle);
        b_match.cmp(&a_match).then(a.chunk_index.cmp(&b.chunk_index))
    });
    chunks.truncate(max_chunks);

    Ok(chunks
        .into_iter()
        .map(|c| BundleTextChunk {
            doc_path: c.doc_path,
            heading_path: c.heading_path,
            text: c.text,
        })
        .collect())
}

/// Code symbols under every subgraph node's `source` prefix, deduplicated
/// across nodes whose `source` prefixes overlap.
fn collect_symbols(store: &Store, nodes: &[Node]) -> BeadloomResult<Vec<CodeSymbol>> {
    let mut seen: HashSet<(String, String, u32)> = HashSet::new();
    let mut out = Vec::new();
    for node in nodes {
        if node.source.is_empty() {
            continue;
        }
        for symbol in store.symbols_under_prefix(&node.source)? {
            let key = (symbol.file_path.to_string_lossy().to_string(), symbol.symbol_name.clone(), symbol.line_start);
            if seen.insert(key) {
                out.push(symbol);
            }
        }
    }
    Ok(out)
}

/// `true` if any of `rule`'s node-matcher fields could select a node inside
/// `subgraph_ref_ids` (§4.9 "Collect Constraints"). Matchers with no
/// `ref_id` narrow enough to check cheaply fall back to "include it" —
/// kind/tag matchers can't be checked without the subgraph's node records,
/// which the caller already filtered to exactly this set.
fn rule_touches_subgraph(rule: &Rule, subgraph_ref_ids: &BTreeSet<String>) -> bool {
    let matcher_touches = |m: &NodeMatcher| match &m.ref_id {
        Some(id) => subgraph_ref_ids.contains(id),
        None => true,
    };

    match rule {
        Rule::Deny { from, to, .. } => matcher_touches(from) || matcher_touches(to),
        Rule::Require { for_matcher, has_edge_to, .. } => matcher_touches(for_matcher) || matcher_touches(has_edge_to),
        Rule::ForbidEdge { from, to, .. } => matcher_touches(from) || matcher_touches(to),
        Rule::Cardinality { for_matcher, .. } => matcher_touches(for_matcher),
        Rule::Layers { .. } | Rule::ForbidCycles { .. } => true,
        Rule::ForbidImport { .. } => false,
    }
}

fn to_constraint(rule: &Rule) -> BeadloomResult<BundleConstraint> {
    let definition = serde_json::to_value(rule)
        .map_err(|e| BeadloomError::Internal(format!("serializing rule '{}': {e}", rule.name())))?;
    Ok(BundleConstraint {
        rule: rule.name().to_string(),
        description: rule.description().to_string(),
        rule_type: rule.type_name().to_string(),
        definition,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::types::{DocChunk, DocRecord, NodeExtra, NodeKind};
    use std::path::PathBuf;

    fn store() -> (tempfile::TempDir, Store) {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::defaults(dir.path());
        std::fs::create_dir_all(config.config_dir()).unwrap();
        let store = Store::open(&config).unwrap();
        (dir, store)
    }

    fn node(ref_id: &str, source: &str) -> Node {
        Node {
            ref_id: ref_id.to_string(),
            kind: NodeKind::Domain,
            summary: format!("{ref_id} summary"),
            source: source.to_string(),
            extra: NodeExtra::default(),
        }
    }

    #[test]
    fn bfs_respects_depth_and_includes_seed() {
        let (_dir, store) = store();
        store.upsert_node(&node("a", "src/a")).unwrap();
        store.upsert_node(&node("b", "src/b")).unwrap();
        store.upsert_node(&node("c", "src/c")).unwrap();
        store
            .insert_edge(&Edge { src_ref_id: "a".into(), dst_ref_id: "b".into(), kind: EdgeKind::DependsOn })
            .unwrap();
        store
            .insert_edge(&Edge { src_ref_id: "b".into(), dst_ref_id: "c".into(), kind: EdgeKind::DependsOn })
            .unwrap();

        let bundle = assemble(&store, &[], &["a".to_string()], 1, 20, 10).unwrap();
        let ids: BTreeSet<&str> = bundle.graph.nodes.iter().map(|n| n.ref_id.as_str()).collect();
        assert!(ids.contains("a"));
        assert!(ids.contains("b"));
        assert!(!ids.contains("c"));
    }

    #[test]
    fn bfs_stops_at_max_nodes() {
        let (_dir, store) = store();
        for id in ["a", "b", "c"] {
            store.upsert_node(&node(id, &format!("src/{id}"))).unwrap();
        }
        store
            .insert_edge(&Edge { src_ref_id: "a".into(), dst_ref_id: "b".into(), kind: EdgeKind::DependsOn })
            .unwrap();
        store
            .insert_edge(&Edge { src_ref_id: "a".into(), dst_ref_id: "c".into(), kind: EdgeKind::DependsOn })
            .unwrap();

        let bundle = assemble(&store, &[], &["a".to_string()], 5, 2, 10).unwrap();
        assert_eq!(bundle.graph.nodes.len(), 2);
    }

    #[test]
    fn chunks_prioritize_matching_heading_then_chunk_index() {
        let (_dir, store) = store();
        store.upsert_node(&node("billing", "src/billing")).unwrap();
        store
            .upsert_doc(&DocRecord {
                path: PathBuf::from("billing/README.md"),
                ref_id: Some("billing".to_string()),
                hash: "h".to_string(),
                title: "Billing".to_string(),
                last_modified: 0,
            })
            .unwrap();
        store
            .replace_chunks(
                &PathBuf::from("billing/README.md"),
                &[
                    DocChunk { doc_path: PathBuf::from("billing/README.md"), chunk_index: 0, heading_path: "Overview".into(), text: "t0".into(), token_estimate: 1 },
                    DocChunk { doc_path: PathBuf::from("billing/README.md"), chunk_index: 1, heading_path: "Billing > Rules".into(), text: "t1".into(), token_estimate: 1 },
                ],
            )
            .unwrap();

        let bundle = assemble(&store, &[], &["billing".to_string()], 1, 20, 10).unwrap();
        assert_eq!(bundle.text_chunks[0].heading_path, "Billing > Rules");
    }

    #[test]
    fn unknown_focus_ref_id_is_not_found() {
        let (_dir, store) = store();
        let err = assemble(&store, &[], &["missing".to_string()], 1, 20, 10).unwrap_err();
        assert!(matches!(err, BeadloomError::NotFound { .. }));
    }
}
