//! Point-in-time graph snapshots and the diff between a snapshot and the
//! store's current state (§3 `graph_snapshots`, §6 "Snapshot compare
//! output").
//!
//! Taking a snapshot and diffing it against the live graph is a core
//! primitive; rendering that diff (the CLI's `beadloom snapshot diff`
//! command) is the out-of-scope visualization layer built on top of it.
//! Grounded on `omni-core::index`'s own before/after row comparison used
//! when reporting what an incremental embed pass changed, generalized here
//! to nodes/edges instead of document rows.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use crate::error::BeadloomResult;
use crate::store::Store;
use crate::types::{ChangedNode, Edge, SnapshotDiff};

/// Persist the store's current nodes/edges as a labeled snapshot, returning
/// its id for later comparison.
pub fn take(store: &Store, label: &str, taken_at: i64) -> BeadloomResult<i64> {
    let nodes = store.list_nodes()?;
    let edges = store.list_edges()?;
    let symbols_count = store.statistics()?.symbols_count;
    store.insert_graph_snapshot(label, taken_at, &nodes, &edges, symbols_count)
}

/// Compare a previously taken snapshot against the store's current state.
///
/// Returns `Ok(None)` if `since_snapshot_id` does not exist (a "not found"
/// condition the caller turns into a user-facing error with suggestions,
/// same as an unknown `ref_id` lookup).
pub fn compare(store: &Store, since_snapshot_id: i64) -> BeadloomResult<Option<SnapshotDiff>> {
    let Some((old_nodes, old_edges)) = store.get_graph_snapshot(since_snapshot_id)? else {
        return Ok(None);
    };

    let new_nodes = store.list_nodes()?;
    let new_edges = store.list_edges()?;

    let old_by_ref: BTreeMap<&str, &str> =
        old_nodes.iter().map(|n| (n.ref_id.as_str(), n.summary.as_str())).collect();
    let new_by_ref: BTreeMap<&str, &str> =
        new_nodes.iter().map(|n| (n.ref_id.as_str(), n.summary.as_str())).collect();

    let old_refs: BTreeSet<&str> = old_by_ref.keys().copied().collect();
    let new_refs: BTreeSet<&str> = new_by_ref.keys().copied().collect();

    let added_nodes: Vec<String> = new_refs.difference(&old_refs).map(|s| s.to_string()).collect();
    let removed_nodes: Vec<String> = old_refs.difference(&new_refs).map(|s| s.to_string()).collect();

    let mut changed_nodes = Vec::new();
    for ref_id in old_refs.intersection(&new_refs) {
        let old_summary = old_by_ref[ref_id];
        let new_summary = new_by_ref[ref_id];
        if old_summary != new_summary {
            changed_nodes.push(ChangedNode {
                ref_id: ref_id.to_string(),
                old_summary: old_summary.to_string(),
                new_summary: new_summary.to_string(),
            });
        }
    }
    changed_nodes.sort_by(|a, b| a.ref_id.cmp(&b.ref_id));

    let old_edge_set: HashSet<&Edge> = old_edges.iter().collect();
    let new_edge_set: HashSet<&Edge> = new_edges.iter().collect();

    let mut added_edges: Vec<Edge> = new_edge_set.difference(&old_edge_set).map(|e| (*e).clone()).collect();
    let mut removed_edges: Vec<Edge> = old_edge_set.difference(&new_edge_set).map(|e| (*e).clone()).collect();
    let sort_key = |e: &Edge| (e.src_ref_id.clone(), e.dst_ref_id.clone(), e.kind.as_str());
    added_edges.sort_by_key(sort_key);
    removed_edges.sort_by_key(sort_key);

    Ok(Some(SnapshotDiff {
        since_ref: since_snapshot_id.to_string(),
        added_nodes,
        removed_nodes,
        changed_nodes,
        added_edges,
        removed_edges,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::types::{Node, NodeKind};

    fn node(ref_id: &str, summary: &str) -> Node {
        Node { ref_id: ref_id.to_string(), kind: NodeKind::Domain, summary: summary.to_string(), source: String::new(), extra: Default::default() }
    }

    #[test]
    fn diff_reports_added_removed_and_changed_nodes() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(dir.path()).unwrap();
        let store = Store::open(&config).unwrap();

        store.upsert_node(&node("a", "alpha")).unwrap();
        store.upsert_node(&node("b", "beta")).unwrap();
        let snap = take(&store, "before", 1).unwrap();

        store.upsert_node(&node("a", "alpha-two")).unwrap();
        store.delete_node("b").unwrap();
        store.upsert_node(&node("c", "gamma")).unwrap();

        let diff = compare(&store, snap).unwrap().unwrap();
        assert_eq!(diff.added_nodes, vec!["c".to_string()]);
        assert_eq!(diff.removed_nodes, vec!["b".to_string()]);
        assert_eq!(diff.changed_nodes.len(), 1);
        assert_eq!(diff.changed_nodes[0].ref_id, "a");
        assert_eq!(diff.changed_nodes[0].new_summary, "alpha-two");
    }

    #[test]
    fn compare_returns_none_for_unknown_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(dir.path()).unwrap();
        let store = Store::open(&config).unwrap();
        assert!(compare(&store, 999).unwrap().is_none());
    }
}
