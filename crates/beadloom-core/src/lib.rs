//! Core indexing, rule-evaluation, and context-assembly engine for Beadloom.
//!
//! This crate owns the graph, docs, and code stores plus the pipelines that
//! keep them in sync; it does not install a `tracing` subscriber, parse CLI
//! arguments, or serve requests over any transport (that's an outer
//! surface's job, same as `omni-core` stays transport-agnostic in the
//! project this one is modeled on).

pub mod cache;
pub mod code;
pub mod config;
pub mod context;
pub mod docs;
pub mod error;
pub mod graph_loader;
pub mod imports;
pub mod reindex;
pub mod rules;
pub mod snapshot;
pub mod store;
pub mod sync;
pub mod types;

use std::path::Path;

use tracing::info;

pub use cache::ContextCache;
pub use config::Config;
pub use error::{BeadloomError, BeadloomResult};
pub use rules::Rule;
pub use store::Store;
pub use types::{ContextResponse, ReindexMode, ReindexResult, SnapshotDiff, SyncState};

/// An open project: its resolved configuration, its SQLite-backed store,
/// the rule set currently loaded from `rules.yml`, and the context bundle
/// cache that sits in front of assembly. This is the primary entry point
/// for embedding `beadloom-core` (mirrors `omni-core::pipeline::Engine`'s
/// role as the one struct a caller constructs and drives).
pub struct Project {
    config: Config,
    store: Store,
    rules: Vec<Rule>,
    cache: ContextCache,
}

impl Project {
    /// Open (creating if absent) the store at `project_root`, loading
    /// config and the currently-persisted rule set.
    pub fn open(project_root: &Path) -> BeadloomResult<Self> {
        let config = Config::load(project_root)?;
        let store = Store::open(&config)?;
        let rules = rules::load_enabled_rules(&store)?;
        info!(project_root = %project_root.display(), rules = rules.len(), "project opened");

        Ok(Self { config, store, rules, cache: ContextCache::new() })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Run a reindex, reload the in-memory rule set from what the pass
    /// just persisted, and drop the context cache (§4.10: any write
    /// invalidates both tiers).
    pub fn reindex(&mut self, mode: ReindexMode) -> BeadloomResult<ReindexResult> {
        let result = reindex::run(&self.store, &self.config, mode)?;
        self.rules = rules::load_enabled_rules(&self.store)?;
        self.cache.invalidate_all(&self.store)?;
        Ok(result)
    }

    /// Re-parse `rules.yml` from disk and persist the result, without
    /// touching the graph/docs/code indexes (§4.7 rule-only edit path).
    pub fn reload_rules(&mut self) -> BeadloomResult<()> {
        let rules = rules::load_rules(&self.store, &self.config.rules_path())?;
        rules::persist_rules(&self.store, &rules)?;
        self.rules = rules;
        self.cache.invalidate_all(&self.store)?;
        Ok(())
    }

    /// Evaluate every enabled rule against the current graph (§4.7).
    pub fn lint(&self) -> BeadloomResult<Vec<rules::Violation>> {
        rules::evaluate::evaluate_all(&self.store, &self.rules)
    }

    /// Warnings for rules whose matchers reference unknown `ref_id`s, a
    /// lint-time sanity check distinct from rule evaluation itself.
    pub fn validate_rules(&self) -> BeadloomResult<Vec<String>> {
        let nodes = self.store.list_nodes()?;
        Ok(rules::validate_rules(&self.rules, &nodes))
    }

    /// Assemble (or serve from cache) a context bundle rooted at
    /// `ref_ids[0]` (§4.9, §4.10).
    pub fn get_context(
        &self,
        ref_ids: &[String],
        depth: usize,
        max_nodes: usize,
        max_chunks: usize,
    ) -> BeadloomResult<ContextResponse> {
        self.cache.get_or_build(&self.store, &self.config, &self.rules, ref_ids, depth, max_nodes, max_chunks)
    }

    /// Recompute sync state for one node (§4.8), without a full reindex.
    pub fn recompute_sync(&self, ref_id: &str) -> BeadloomResult<Vec<SyncState>> {
        let node = self.store.require_node(ref_id)?;
        sync::recompute_for_node(&self.store, &node)
    }

    /// Mark a node's current doc/code pairing as synced (§4.8 "Mark
    /// synced"), clearing the cache since the sync snapshot embedded in
    /// any cached bundle for this node is now stale.
    pub fn mark_synced(&self, ref_id: &str, now: i64) -> BeadloomResult<Vec<SyncState>> {
        let node = self.store.require_node(ref_id)?;
        let states = sync::mark_synced(&self.store, &node, now)?;
        self.cache.invalidate_all(&self.store)?;
        Ok(states)
    }

    /// Persist the current graph as a labeled point-in-time snapshot
    /// (§3 `graph_snapshots`), returning its id for a later `compare_snapshot`.
    pub fn take_snapshot(&self, label: &str, now: i64) -> BeadloomResult<i64> {
        snapshot::take(&self.store, label, now)
    }

    /// Diff a previously taken snapshot against the store's current state
    /// (§6 "Snapshot compare output"). `Ok(None)` if the snapshot id is
    /// unknown.
    pub fn compare_snapshot(&self, since_snapshot_id: i64) -> BeadloomResult<Option<SnapshotDiff>> {
        snapshot::compare(&self.store, since_snapshot_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opens_an_empty_project_with_no_rules() {
        let dir = tempfile::tempdir().unwrap();
        let project = Project::open(dir.path()).unwrap();
        assert!(project.rules().is_empty());
    }

    #[test]
    fn full_reindex_on_an_empty_project_yields_zero_counts() {
        let dir = tempfile::tempdir().unwrap();
        let mut project = Project::open(dir.path()).unwrap();
        let result = project.reindex(ReindexMode::Full).unwrap();
        assert_eq!(result.nodes_count, 0);
        assert_eq!(result.edges_count, 0);
    }
}
