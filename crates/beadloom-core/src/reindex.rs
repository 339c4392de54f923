//! Reindex Pipeline (§4.6): orchestrates the Graph Loader, Doc Indexer,
//! Code Indexer, Import Resolver, Sync Engine, and Rule Engine into one
//! full or incremental pass over a project.
//!
//! Ordering follows §5: nodes/edges land before anything that might
//! reference them, every code symbol for a batch of files is committed
//! before the Import Resolver runs over that batch, and the FTS rebuild is
//! the last write before `meta.last_reindex_at` is bumped.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::config::Config;
use crate::error::BeadloomResult;
use crate::graph_loader;
use crate::imports;
use crate::rules;
use crate::store::Store;
use crate::sync;
use crate::types::{
    FileIndexEntry, FileKind, Language, Node, ReindexMode, ReindexResult,
};
use crate::{code, docs};

/// Run a reindex in the given mode (§4.6).
pub fn run(store: &Store, config: &Config, mode: ReindexMode) -> BeadloomResult<ReindexResult> {
    match mode {
        ReindexMode::Full => run_full(store, config),
        ReindexMode::Incremental => run_incremental(store, config),
    }
}

fn run_full(store: &Store, config: &Config) -> BeadloomResult<ReindexResult> {
    info!("starting full reindex");
    store.drop_volatile_tables()?;

    let mut result = ReindexResult::default();

    let graph = graph_loader::load_graph_dir(&config.graph_dir())?;
    store.reload_nodes_and_edges(&graph.nodes, &graph.edges)?;
    record_graph_file_hashes(store, &config.graph_dir())?;
    result.nodes_count = graph.nodes.len();
    result.edges_count = graph.edges.len();

    let loaded_rules = rules::load_rules(store, &config.rules_path())?;
    rules::persist_rules(store, &loaded_rules)?;

    let nodes = store.list_nodes()?;
    for warning in rules::validate_rules(&loaded_rules, &nodes) {
        warn!(warning, "rule validation warning");
    }

    index_all_docs(store, config, &nodes, &mut result)?;
    let changed_code_files = index_all_code(store, config, &mut result)?;

    for (rel, hash, language, raw_imports) in &changed_code_files {
        imports::resolve_imports_for_file(store, config, rel, hash, *language, raw_imports.clone())?;
    }
    imports::derive_dependency_edges(store, &nodes)?;

    // A full reindex establishes a fresh baseline rather than comparing
    // against one: there is nothing to have drifted from yet, so every
    // pair starts `ok` (§4.7, §8 Scenario A) rather than `unknown`.
    let sync_now = now_ts();
    for node in &nodes {
        sync::mark_synced(store, node, sync_now)?;
    }

    rebuild_fts_wholesale(store, &nodes)?;

    let now = now_ts();
    store.meta_set("last_reindex_at", &now.to_string())?;
    take_health_snapshot(store, now, &nodes)?;

    info!(
        nodes = result.nodes_count,
        edges = result.edges_count,
        docs = result.docs_count,
        symbols = result.symbols_count,
        "full reindex complete"
    );
    Ok(result)
}

fn run_incremental(store: &Store, config: &Config) -> BeadloomResult<ReindexResult> {
    info!("starting incremental reindex");
    let mut result = ReindexResult::default();
    let mut affected_refs: BTreeSet<String> = BTreeSet::new();

    let graph_changed = reindex_graph_if_changed(store, config, &mut result, &mut affected_refs)?;

    let nodes = store.list_nodes()?;
    if graph_changed {
        let loaded_rules = rules::load_rules(store, &config.rules_path())?;
        rules::persist_rules(store, &loaded_rules)?;
        for warning in rules::validate_rules(&loaded_rules, &nodes) {
            warn!(warning, "rule validation warning");
        }
    }

    reindex_docs_incremental(store, config, &nodes, &mut result, &mut affected_refs)?;
    let changed_code_files = reindex_code_incremental(store, config, &mut result, &mut affected_refs)?;

    if !changed_code_files.is_empty() {
        for (rel, hash, language, raw_imports) in &changed_code_files {
            imports::resolve_imports_for_file(store, config, rel, hash, *language, raw_imports.clone())?;
        }
        imports::derive_dependency_edges(store, &nodes)?;
    }

    for ref_id in &affected_refs {
        if let Some(node) = nodes.iter().find(|n| &n.ref_id == ref_id) {
            // `recompute_for_node` reads the existing baseline before
            // writing anything and prunes pairs that are no longer valid
            // itself; deleting the baseline here first would make every
            // pair look untracked (§8 Scenario A).
            sync::recompute_for_node(store, node)?;
            refresh_fts_for_node(store, node)?;
        }
    }

    result.nodes_count = nodes.len();
    result.edges_count = store.list_edges()?.len();

    let now = now_ts();
    store.meta_set("last_reindex_at", &now.to_string())?;
    take_health_snapshot(store, now, &nodes)?;

    info!(
        changed = result.files_changed,
        deleted = result.files_deleted,
        failed = result.files_failed,
        "incremental reindex complete"
    );
    Ok(result)
}

// ---------------------------------------------------------------------------
// Graph
// ---------------------------------------------------------------------------

fn record_graph_file_hashes(store: &Store, graph_dir: &Path) -> BeadloomResult<()> {
    for (rel, hash) in current_graph_file_hashes(graph_dir)? {
        store.file_index_set(&FileIndexEntry {
            path: rel,
            hash,
            kind: FileKind::Graph,
            indexed_at: now_ts(),
        })?;
    }
    Ok(())
}

fn current_graph_file_hashes(graph_dir: &Path) -> BeadloomResult<Vec<(PathBuf, String)>> {
    let mut out = Vec::new();
    if !graph_dir.exists() {
        return Ok(out);
    }
    for entry in std::fs::read_dir(graph_dir)? {
        let entry = entry?;
        let path = entry.path();
        let is_yml = matches!(path.extension().and_then(|e| e.to_str()), Some("yml") | Some("yaml"));
        if !is_yml {
            continue;
        }
        let content = std::fs::read(&path)?;
        out.push((path.clone(), hash_bytes(&content)));
    }
    out.sort();
    Ok(out)
}

/// Reload the graph (nodes/edges) iff any `*.yml` under `graph_dir` (graph
/// files or `rules.yml`) is new, changed, or gone (§4.6 "a graph file
/// change of any kind triggers a full graph reload"). Returns whether a
/// reload happened.
fn reindex_graph_if_changed(
    store: &Store,
    config: &Config,
    result: &mut ReindexResult,
    affected_refs: &mut BTreeSet<String>,
) -> BeadloomResult<bool> {
    let current = current_graph_file_hashes(&config.graph_dir())?;
    let prior = store.file_index_list(Some(FileKind::Graph))?;

    result.files_scanned += current.len();

    let mut changed = current.len() != prior.len();
    for (path, hash) in &current {
        match prior.iter().find(|p| &p.path == path) {
            Some(entry) if &entry.hash == hash => {}
            _ => changed = true,
        }
    }

    if !changed {
        return Ok(false);
    }

    for node in store.list_nodes()? {
        affected_refs.insert(node.ref_id);
    }

    let graph = graph_loader::load_graph_dir(&config.graph_dir())?;
    store.reload_nodes_and_edges(&graph.nodes, &graph.edges)?;

    for path in store.file_index_list(Some(FileKind::Graph))?.into_iter().map(|e| e.path) {
        if !current.iter().any(|(p, _)| p == &path) {
            store.file_index_delete(&path)?;
        }
    }
    for (path, hash) in &current {
        store.file_index_set(&FileIndexEntry {
            path: path.clone(),
            hash: hash.clone(),
            kind: FileKind::Graph,
            indexed_at: now_ts(),
        })?;
    }

    for node in &graph.nodes {
        affected_refs.insert(node.ref_id.clone());
    }
    result.files_changed += 1;
    Ok(true)
}

// ---------------------------------------------------------------------------
// Docs
// ---------------------------------------------------------------------------

fn index_all_docs(
    store: &Store,
    config: &Config,
    nodes: &[Node],
    result: &mut ReindexResult,
) -> BeadloomResult<()> {
    for abs in docs::walk_docs(&config.docs_path()) {
        result.files_scanned += 1;
        match docs::index_doc(&config.docs_path(), &abs, nodes) {
            Ok(indexed) => {
                store.upsert_doc(&indexed.record)?;
                store.replace_chunks(&indexed.record.path, &indexed.chunks)?;
                store.file_index_set(&FileIndexEntry {
                    path: indexed.record.path.clone(),
                    hash: indexed.record.hash.clone(),
                    kind: FileKind::Doc,
                    indexed_at: now_ts(),
                })?;
                result.docs_count += 1;
            }
            Err(e) => {
                warn!(file = %abs.display(), error = %e, "failed to index doc");
                result.files_failed += 1;
            }
        }
    }
    Ok(())
}

fn reindex_docs_incremental(
    store: &Store,
    config: &Config,
    nodes: &[Node],
    result: &mut ReindexResult,
    affected_refs: &mut BTreeSet<String>,
) -> BeadloomResult<()> {
    let docs_root = config.docs_path();
    let current_paths = docs::walk_docs(&docs_root);
    let mut current_rel: BTreeSet<PathBuf> = BTreeSet::new();

    for abs in &current_paths {
        result.files_scanned += 1;
        let rel = abs.strip_prefix(&docs_root).unwrap_or(abs).to_path_buf();
        current_rel.insert(rel.clone());

        let content = match std::fs::read(abs) {
            Ok(c) => c,
            Err(e) => {
                warn!(file = %abs.display(), error = %e, "failed to read doc");
                result.files_failed += 1;
                continue;
            }
        };
        let hash = hash_bytes(&content);
        let unchanged = store
            .file_index_get(&rel)?
            .is_some_and(|entry| entry.hash == hash);
        if unchanged {
            continue;
        }

        match docs::index_doc(&docs_root, abs, nodes) {
            Ok(indexed) => {
                if let Some(prior_ref) = indexed_prior_ref(store, &rel)? {
                    affected_refs.insert(prior_ref);
                }
                if let Some(ref_id) = &indexed.record.ref_id {
                    affected_refs.insert(ref_id.clone());
                }
                store.upsert_doc(&indexed.record)?;
                store.replace_chunks(&indexed.record.path, &indexed.chunks)?;
                store.file_index_set(&FileIndexEntry {
                    path: rel,
                    hash: indexed.record.hash.clone(),
                    kind: FileKind::Doc,
                    indexed_at: now_ts(),
                })?;
                result.docs_count += 1;
                result.files_changed += 1;
            }
            Err(e) => {
                warn!(file = %abs.display(), error = %e, "failed to index doc");
                result.files_failed += 1;
            }
        }
    }

    for entry in store.file_index_list(Some(FileKind::Doc))? {
        if current_rel.contains(&entry.path) {
            continue;
        }
        if let Some(prior_ref) = indexed_prior_ref(store, &entry.path)? {
            affected_refs.insert(prior_ref);
        }
        store.delete_doc(&entry.path)?;
        store.fts_clear_for_doc(&entry.path)?;
        store.file_index_delete(&entry.path)?;
        result.files_deleted += 1;
    }

    result.docs_count = store.list_docs()?.len();
    Ok(())
}

fn indexed_prior_ref(store: &Store, rel_path: &Path) -> BeadloomResult<Option<String>> {
    Ok(store.get_doc(rel_path)?.and_then(|d| d.ref_id))
}

// ---------------------------------------------------------------------------
// Code
// ---------------------------------------------------------------------------

type ChangedCodeFile = (PathBuf, String, Language, Vec<crate::types::RawImport>);

fn index_all_code(
    store: &Store,
    config: &Config,
    result: &mut ReindexResult,
) -> BeadloomResult<Vec<ChangedCodeFile>> {
    let mut changed = Vec::new();
    for abs in code::walk_code_roots(&config.scan_root_paths()) {
        result.files_scanned += 1;
        let rel = abs.strip_prefix(&config.project_root).unwrap_or(&abs).to_path_buf();

        let bytes = match std::fs::read(&abs) {
            Ok(b) => b,
            Err(e) => {
                warn!(file = %abs.display(), error = %e, "failed to read code file");
                result.files_failed += 1;
                continue;
            }
        };
        let hash = hash_bytes(&bytes);
        let language = rel
            .extension()
            .and_then(|e| e.to_str())
            .map(Language::from_extension)
            .unwrap_or(Language::Unknown);
        if !language.is_code() {
            continue;
        }

        match code::index_file(&rel, &bytes, language) {
            Ok((symbols, raw_imports)) => {
                result.symbols_count += symbols.len();
                store.replace_symbols(&rel, &symbols)?;
                store.file_index_set(&FileIndexEntry {
                    path: rel.clone(),
                    hash: hash.clone(),
                    kind: FileKind::Code,
                    indexed_at: now_ts(),
                })?;
                changed.push((rel, hash, language, raw_imports));
            }
            Err(e) => {
                warn!(file = %rel.display(), error = %e, "failed to index code file");
                result.files_failed += 1;
            }
        }
    }
    Ok(changed)
}

fn reindex_code_incremental(
    store: &Store,
    config: &Config,
    result: &mut ReindexResult,
    affected_refs: &mut BTreeSet<String>,
) -> BeadloomResult<Vec<ChangedCodeFile>> {
    let project_root = config.project_root.clone();
    let current_paths = code::walk_code_roots(&config.scan_root_paths());
    let mut current_rel: BTreeSet<PathBuf> = BTreeSet::new();
    let nodes = store.list_nodes()?;
    let mut changed = Vec::new();

    for abs in &current_paths {
        result.files_scanned += 1;
        let rel = abs.strip_prefix(&project_root).unwrap_or(abs).to_path_buf();
        current_rel.insert(rel.clone());

        let bytes = match std::fs::read(abs) {
            Ok(b) => b,
            Err(e) => {
                warn!(file = %abs.display(), error = %e, "failed to read code file");
                result.files_failed += 1;
                continue;
            }
        };
        let hash = hash_bytes(&bytes);
        let language = rel
            .extension()
            .and_then(|e| e.to_str())
            .map(Language::from_extension)
            .unwrap_or(Language::Unknown);
        if !language.is_code() {
            continue;
        }

        let unchanged = store.file_index_get(&rel)?.is_some_and(|entry| entry.hash == hash);
        if unchanged {
            continue;
        }

        match code::index_file(&rel, &bytes, language) {
            Ok((symbols, raw_imports)) => {
                if let Some(owner) = owning_node(&rel, &nodes) {
                    affected_refs.insert(owner.ref_id.clone());
                }
                result.symbols_count += symbols.len();
                store.replace_symbols(&rel, &symbols)?;
                store.file_index_set(&FileIndexEntry {
                    path: rel.clone(),
                    hash: hash.clone(),
                    kind: FileKind::Code,
                    indexed_at: now_ts(),
                })?;
                result.files_changed += 1;
                changed.push((rel, hash, language, raw_imports));
            }
            Err(e) => {
                warn!(file = %rel.display(), error = %e, "failed to index code file");
                result.files_failed += 1;
            }
        }
    }

    for entry in store.file_index_list(Some(FileKind::Code))? {
        if current_rel.contains(&entry.path) {
            continue;
        }
        if let Some(owner) = owning_node(&entry.path, &nodes) {
            affected_refs.insert(owner.ref_id.clone());
        }
        store.delete_symbols_for_file(&entry.path)?;
        store.replace_imports(&entry.path, &[])?;
        store.file_index_delete(&entry.path)?;
        result.files_deleted += 1;
    }

    Ok(changed)
}

fn owning_node<'a>(rel_path: &Path, nodes: &'a [Node]) -> Option<&'a Node> {
    let path_str = rel_path.to_string_lossy();
    nodes
        .iter()
        .filter(|n| !n.source.is_empty() && path_str.starts_with(n.source.trim_end_matches('/')))
        .max_by_key(|n| n.source.len())
}

// ---------------------------------------------------------------------------
// FTS
// ---------------------------------------------------------------------------

fn rebuild_fts_wholesale(store: &Store, nodes: &[Node]) -> BeadloomResult<()> {
    store.fts_clear_all()?;
    for node in nodes {
        refresh_fts_for_node(store, node)?;
    }
    Ok(())
}

fn refresh_fts_for_node(store: &Store, node: &Node) -> BeadloomResult<()> {
    store.fts_clear_for_ref(&node.ref_id)?;
    store.fts_index_node(&node.ref_id, node.kind.as_str(), &node.summary)?;
    for doc in store.docs_for_ref(&node.ref_id)? {
        for chunk in store.chunks_for_doc(&doc.path)? {
            store.fts_index_chunk(Some(&node.ref_id), &chunk.doc_path, &chunk.text)?;
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

fn take_health_snapshot(store: &Store, taken_at: i64, nodes: &[Node]) -> BeadloomResult<()> {
    let edges = store.list_edges()?;
    let docs = store.list_docs()?;

    let mut touched: BTreeSet<&str> = BTreeSet::new();
    for edge in &edges {
        touched.insert(edge.src_ref_id.as_str());
        touched.insert(edge.dst_ref_id.as_str());
    }
    let isolated_count = nodes.iter().filter(|n| !touched.contains(n.ref_id.as_str())).count() as i64;

    let mut stale_count = 0i64;
    let mut nodes_with_docs = 0i64;
    for node in nodes {
        let states = store.sync_states_for_ref(&node.ref_id)?;
        if states.iter().any(|s| s.status == crate::types::SyncStatus::Stale) {
            stale_count += 1;
        }
        if !store.docs_for_ref(&node.ref_id)?.is_empty() {
            nodes_with_docs += 1;
        }
    }
    let coverage_pct = if nodes.is_empty() {
        0.0
    } else {
        100.0 * nodes_with_docs as f64 / nodes.len() as f64
    };

    store.insert_health_snapshot(
        taken_at,
        nodes.len() as i64,
        edges.len() as i64,
        docs.len() as i64,
        coverage_pct,
        stale_count,
        isolated_count,
    )
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn hash_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

fn now_ts() -> i64 {
    chrono::Utc::now().timestamp()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NodeKind;

    fn project(dir: &Path) -> Config {
        Config::defaults(dir)
    }

    fn write(dir: &Path, rel: &str, content: &str) {
        let path = dir.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    #[test]
    fn full_reindex_builds_graph_docs_and_code() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            ".beadloom/_graph/graph.yml",
            "nodes:\n  - ref_id: billing\n    kind: domain\n    source: src/billing\n",
        );
        write(
            dir.path(),
            "docs/billing/README.md",
            "# Billing\n\nOverview.\n",
        );
        write(
            dir.path(),
            "src/billing/api.py",
            "# beadloom:domain=billing\ndef handler():\n    pass\n",
        );

        let config = project(dir.path());
        let store = Store::open(&config).unwrap();

        let result = run(&store, &config, ReindexMode::Full).unwrap();
        assert_eq!(result.nodes_count, 1);
        assert_eq!(result.docs_count, 1);
        assert!(result.symbols_count >= 1);
        assert!(store.meta_get("last_reindex_at").unwrap().is_some());

        let states = store.sync_states_for_ref("billing").unwrap();
        assert_eq!(states.len(), 1);
        assert_eq!(states[0].status, crate::types::SyncStatus::Ok);
    }

    #[test]
    fn incremental_reindex_picks_up_new_code_file() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            ".beadloom/_graph/graph.yml",
            "nodes:\n  - ref_id: billing\n    kind: domain\n    source: src/billing\n",
        );
        let config = project(dir.path());
        let store = Store::open(&config).unwrap();
        run(&store, &config, ReindexMode::Full).unwrap();

        write(dir.path(), "src/billing/api.py", "def handler():\n    pass\n");
        let result = run(&store, &config, ReindexMode::Incremental).unwrap();
        assert_eq!(result.files_changed, 1);
        assert_eq!(store.symbols_for_file(Path::new("src/billing/api.py")).unwrap().len(), 1);
    }

    #[test]
    fn incremental_reindex_is_a_no_op_when_nothing_changed() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            ".beadloom/_graph/graph.yml",
            "nodes:\n  - ref_id: billing\n    kind: domain\n",
        );
        let config = project(dir.path());
        let store = Store::open(&config).unwrap();
        run(&store, &config, ReindexMode::Full).unwrap();

        let result = run(&store, &config, ReindexMode::Incremental).unwrap();
        assert_eq!(result.files_changed, 0);
        assert_eq!(result.files_deleted, 0);
        assert_eq!(store.list_nodes().unwrap()[0].kind, NodeKind::Domain);
    }
}
