//! Sync Engine (§4.7): tracks whether a node's docs and code have drifted
//! apart since the last time someone confirmed they agree.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde_json::json;

use crate::error::BeadloomResult;
use crate::store::Store;
use crate::types::{Node, SyncState, SyncStatus};

/// Recompute Sync State rows for every `(ref_id, doc_path, code_path)` pair
/// belonging to `node`, comparing current content against the last-synced
/// baseline. Nodes with no doc link or no code files have no pairs and
/// nothing is written.
pub fn recompute_for_node(store: &Store, node: &Node) -> BeadloomResult<Vec<SyncState>> {
    let doc_paths = doc_paths_for(store, node)?;
    let code_paths = code_paths_for(store, node)?;

    // The baseline is read before anything is written: `compute_state`
    // compares against it, so deleting these rows first (as a prior
    // revision of this function did via `delete_sync_states_for_ref`)
    // would make every pair look untracked and always resolve to
    // `status=Unknown` instead of comparing against the last sync.
    let baseline: Vec<SyncState> = store.sync_states_for_ref(&node.ref_id)?;

    if doc_paths.is_empty() || code_paths.is_empty() {
        for stale in &baseline {
            store.delete_sync_state(&node.ref_id, &stale.doc_path, &stale.code_path)?;
        }
        return Ok(Vec::new());
    }

    let current_symbols = symbol_names_for(store, node)?;

    let mut out = Vec::new();
    for doc_path in &doc_paths {
        let doc_hash = store.get_doc(doc_path)?.map(|d| d.hash);
        for code_path in &code_paths {
            let code_hash = file_hash(store, code_path)?;
            let prior = baseline
                .iter()
                .find(|s| &s.doc_path == doc_path && &s.code_path == code_path);

            let state = compute_state(node, doc_path, code_path, doc_hash.clone(), code_hash, &current_symbols, prior);
            store.upsert_sync_state(&state)?;
            out.push(state);
        }
    }

    // Prune baseline pairs that are no longer valid (their doc or code file
    // was removed) rather than wiping the whole baseline up front.
    for stale in &baseline {
        let still_valid = out.iter().any(|s| s.doc_path == stale.doc_path && s.code_path == stale.code_path);
        if !still_valid {
            store.delete_sync_state(&node.ref_id, &stale.doc_path, &stale.code_path)?;
        }
    }

    Ok(out)
}

fn compute_state(
    node: &Node,
    doc_path: &Path,
    code_path: &str,
    doc_hash: Option<String>,
    code_hash: Option<String>,
    current_symbols: &BTreeSet<String>,
    prior: Option<&SyncState>,
) -> SyncState {
    let Some(prior) = prior else {
        return SyncState {
            ref_id: node.ref_id.clone(),
            doc_path: doc_path.to_path_buf(),
            code_path: code_path.to_string(),
            status: SyncStatus::Unknown,
            code_hash_at_sync: None,
            doc_hash_at_sync: None,
            synced_at: None,
            reason: Some("untracked_files".to_string()),
            details: Some(json!({ "code_path": code_path, "doc_path": doc_path })),
        };
    };

    let prior_symbols: BTreeSet<String> = prior
        .details
        .as_ref()
        .and_then(|d| d.get("symbols"))
        .and_then(|v| v.as_array())
        .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
        .unwrap_or_default();

    let code_unchanged = code_hash.is_some() && code_hash == prior.code_hash_at_sync;
    let doc_unchanged = doc_hash.is_some() && doc_hash == prior.doc_hash_at_sync;
    let symbols_unchanged = prior_symbols == *current_symbols;

    if code_unchanged && doc_unchanged && symbols_unchanged {
        return SyncState {
            ref_id: node.ref_id.clone(),
            doc_path: doc_path.to_path_buf(),
            code_path: code_path.to_string(),
            status: SyncStatus::Ok,
            code_hash_at_sync: prior.code_hash_at_sync.clone(),
            doc_hash_at_sync: prior.doc_hash_at_sync.clone(),
            synced_at: prior.synced_at,
            reason: None,
            details: prior.details.clone(),
        };
    }

    let (reason, details) = if !symbols_unchanged {
        let added: Vec<&str> = current_symbols.difference(&prior_symbols).map(String::as_str).collect();
        let removed: Vec<&str> = prior_symbols.difference(current_symbols).map(String::as_str).collect();
        ("symbols_changed", json!({ "added": added, "removed": removed }))
    } else if !code_unchanged {
        ("content_changed", json!({ "code_path": code_path }))
    } else {
        ("doc_rewritten", json!({ "doc_path": doc_path }))
    };

    SyncState {
        ref_id: node.ref_id.clone(),
        doc_path: doc_path.to_path_buf(),
        code_path: code_path.to_string(),
        status: SyncStatus::Stale,
        code_hash_at_sync: prior.code_hash_at_sync.clone(),
        doc_hash_at_sync: prior.doc_hash_at_sync.clone(),
        synced_at: prior.synced_at,
        reason: Some(reason.to_string()),
        details: Some(details),
    }
}

/// Recompute current hashes for `node`'s pairs and write them as the new
/// baseline with `status=ok`.
pub fn mark_synced(store: &Store, node: &Node, now: i64) -> BeadloomResult<Vec<SyncState>> {
    let doc_paths = doc_paths_for(store, node)?;
    let code_paths = code_paths_for(store, node)?;
    let current_symbols = symbol_names_for(store, node)?;
    let symbols_json: Vec<&str> = current_symbols.iter().map(String::as_str).collect();

    let mut out = Vec::new();
    for doc_path in &doc_paths {
        let doc_hash = store.get_doc(doc_path)?.map(|d| d.hash);
        for code_path in &code_paths {
            let code_hash = file_hash(store, code_path)?;
            let state = SyncState {
                ref_id: node.ref_id.clone(),
                doc_path: doc_path.clone(),
                code_path: code_path.clone(),
                status: SyncStatus::Ok,
                code_hash_at_sync: code_hash,
                doc_hash_at_sync: doc_hash,
                synced_at: Some(now),
                reason: None,
                details: Some(json!({ "symbols": symbols_json })),
            };
            store.upsert_sync_state(&state)?;
            out.push(state);
        }
    }
    Ok(out)
}

fn doc_paths_for(store: &Store, node: &Node) -> BeadloomResult<Vec<PathBuf>> {
    let mut paths: BTreeSet<PathBuf> = node.extra.docs.iter().map(PathBuf::from).collect();
    for doc in store.docs_for_ref(&node.ref_id)? {
        paths.insert(doc.path);
    }
    Ok(paths.into_iter().collect())
}

fn code_paths_for(store: &Store, node: &Node) -> BeadloomResult<Vec<String>> {
    let symbols = store.symbols_under_prefix(&node.source)?;
    let mut paths: BTreeSet<String> = BTreeSet::new();
    for symbol in symbols {
        paths.insert(symbol.file_path.to_string_lossy().to_string());
    }
    Ok(paths.into_iter().collect())
}

fn symbol_names_for(store: &Store, node: &Node) -> BeadloomResult<BTreeSet<String>> {
    let symbols = store.symbols_under_prefix(&node.source)?;
    Ok(symbols.into_iter().map(|s| s.symbol_name).collect())
}

fn file_hash(store: &Store, code_path: &str) -> BeadloomResult<Option<String>> {
    Ok(store.file_index_get(Path::new(code_path))?.map(|e| e.hash))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::types::{CodeSymbol, DocRecord, FileIndexEntry, FileKind, Language, NodeExtra, NodeKind, SymbolKind};
    use std::collections::BTreeMap;

    fn store() -> Store {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::defaults(dir.path());
        std::fs::create_dir_all(config.config_dir()).unwrap();
        let opened = Store::open(&config).unwrap();
        std::mem::forget(dir);
        opened
    }

    fn node() -> Node {
        Node {
            ref_id: "billing".to_string(),
            kind: NodeKind::Domain,
            summary: String::new(),
            source: "src/billing".to_string(),
            extra: NodeExtra::default(),
        }
    }

    #[test]
    fn first_sync_is_unknown_then_mark_synced_is_ok() {
        let store = store();
        let node = node();
        store.upsert_node(&node).unwrap();
        store
            .upsert_doc(&DocRecord {
                path: PathBuf::from("billing/README.md"),
                ref_id: Some("billing".to_string()),
                hash: "doc1".to_string(),
                title: "Billing".to_string(),
                last_modified: 0,
            })
            .unwrap();
        store
            .replace_symbols(
                Path::new("src/billing/api.py"),
                &[CodeSymbol {
                    file_path: PathBuf::from("src/billing/api.py"),
                    symbol_name: "handler".to_string(),
                    kind: SymbolKind::Function,
                    line_start: 1,
                    line_end: 2,
                    language: Language::Python,
                    annotations: BTreeMap::new(),
                }],
            )
            .unwrap();
        store
            .file_index_set(&FileIndexEntry {
                path: PathBuf::from("src/billing/api.py"),
                hash: "code1".to_string(),
                kind: FileKind::Code,
                indexed_at: 0,
            })
            .unwrap();

        let states = recompute_for_node(&store, &node).unwrap();
        assert_eq!(states.len(), 1);
        assert_eq!(states[0].status, SyncStatus::Unknown);

        mark_synced(&store, &node, 100).unwrap();
        let states = recompute_for_node(&store, &node).unwrap();
        assert_eq!(states[0].status, SyncStatus::Ok);
    }
}
