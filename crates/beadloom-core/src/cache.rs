//! Context Bundle Cache (§4.10): an in-process L1 tier backed by the
//! persistent L2 `bundle_cache` table. A lookup checks L1 first, falls
//! through to L2 on a miss, and only calls the Context Assembler when both
//! tiers miss or have gone stale.
//!
//! Invalidation is conservative (§4.10 "the simplest conservative policy is
//! to delete all L1 entries and all L2 rows on any write"): any node,
//! edge, doc, or code mutation clears the whole cache rather than tracking
//! which bundles it could have touched.

use std::collections::HashMap;
use std::path::Path;

use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use walkdir::WalkDir;

use crate::config::Config;
use crate::context;
use crate::error::BeadloomResult;
use crate::rules::Rule;
use crate::store::Store;
use crate::types::{CacheHitEnvelope, ContextResponse};

struct L1Entry {
    bundle_json: String,
    etag: String,
    graph_mtime: i64,
    docs_mtime: i64,
}

/// In-process context bundle cache. Cheap to construct; one instance
/// should live for the lifetime of a project session so its L1 tier is
/// actually useful.
pub struct ContextCache {
    l1: Mutex<HashMap<String, L1Entry>>,
}

impl Default for ContextCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ContextCache {
    pub fn new() -> Self {
        Self { l1: Mutex::new(HashMap::new()) }
    }

    /// Look up or build a bundle for `ref_ids` at the given traversal
    /// parameters. Returns a `ContextResponse::CacheHit` envelope when
    /// either tier has a fresh entry, otherwise assembles, persists, and
    /// returns the fresh `ContextResponse::Bundle`.
    pub fn get_or_build(
        &self,
        store: &Store,
        config: &Config,
        rules: &[Rule],
        ref_ids: &[String],
        depth: usize,
        max_nodes: usize,
        max_chunks: usize,
    ) -> BeadloomResult<ContextResponse> {
        let key = cache_key(ref_ids, depth, max_nodes, max_chunks);
        let graph_mtime = tree_mtime(&config.graph_dir());
        let docs_mtime = tree_mtime(&config.docs_path());

        if let Some(entry) = self.l1.lock().get(&key) {
            if entry.graph_mtime == graph_mtime && entry.docs_mtime == docs_mtime {
                return Ok(hit(entry, "l1"));
            }
        }

        if let Some((bundle_json, etag, l2_graph_mtime, l2_docs_mtime)) = store.bundle_cache_get(&key)? {
            if l2_graph_mtime == graph_mtime && l2_docs_mtime == docs_mtime {
                let entry = L1Entry { bundle_json, etag, graph_mtime: l2_graph_mtime, docs_mtime: l2_docs_mtime };
                let response = hit(&entry, "l2");
                self.l1.lock().insert(key, entry);
                return Ok(response);
            }
        }

        let bundle = context::assemble(store, rules, ref_ids, depth, max_nodes, max_chunks)?;
        let bundle_json = serde_json::to_string(&bundle)
            .map_err(|e| crate::error::BeadloomError::Internal(format!("serializing context bundle: {e}")))?;
        let etag = hash_bytes(bundle_json.as_bytes());
        let now = chrono::Utc::now().timestamp();

        store.bundle_cache_set(&key, &bundle_json, &etag, graph_mtime, docs_mtime, now)?;
        self.l1.lock().insert(
            key,
            L1Entry { bundle_json, etag, graph_mtime, docs_mtime },
        );

        Ok(ContextResponse::Bundle(bundle))
    }

    /// Clear both tiers. Called after any reindex or node-level mutation.
    pub fn invalidate_all(&self, store: &Store) -> BeadloomResult<()> {
        self.l1.lock().clear();
        store.bundle_cache_clear()
    }
}

fn hit(entry: &L1Entry, hint: &str) -> ContextResponse {
    ContextResponse::CacheHit(CacheHitEnvelope {
        cached: true,
        etag: entry.etag.clone(),
        unchanged_since: entry.graph_mtime.max(entry.docs_mtime),
        hint: Some(hint.to_string()),
    })
}

/// `(ref_ids-tuple, depth, max_nodes, max_chunks)` as a stable string key.
/// `ref_ids` order matters — it's part of the tuple, not a set.
fn cache_key(ref_ids: &[String], depth: usize, max_nodes: usize, max_chunks: usize) -> String {
    format!("{}|{depth}|{max_nodes}|{max_chunks}", ref_ids.join(","))
}

/// Latest mtime (as a Unix timestamp) across every file under `root`, used
/// as a coarse staleness signal for the graph and docs trees. A missing
/// root has no files to go stale, so it reports 0.
fn tree_mtime(root: &Path) -> i64 {
    if !root.exists() {
        return 0;
    }
    WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| e.metadata().ok())
        .filter_map(|m| m.modified().ok())
        .filter_map(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
        .map(|d| d.as_secs() as i64)
        .max()
        .unwrap_or(0)
}

fn hash_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Node, NodeExtra, NodeKind};

    fn setup() -> (tempfile::TempDir, Config, Store) {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::defaults(dir.path());
        std::fs::create_dir_all(config.config_dir()).unwrap();
        let store = Store::open(&config).unwrap();
        store
            .upsert_node(&Node {
                ref_id: "billing".to_string(),
                kind: NodeKind::Domain,
                summary: "Billing".to_string(),
                source: String::new(),
                extra: NodeExtra::default(),
            })
            .unwrap();
        (dir, config, store)
    }

    #[test]
    fn second_lookup_is_a_cache_hit() {
        let (_dir, config, store) = setup();
        let cache = ContextCache::new();
        let ref_ids = vec!["billing".to_string()];

        let first = cache.get_or_build(&store, &config, &[], &ref_ids, 1, 20, 10).unwrap();
        assert!(matches!(first, ContextResponse::Bundle(_)));

        let second = cache.get_or_build(&store, &config, &[], &ref_ids, 1, 20, 10).unwrap();
        assert!(matches!(second, ContextResponse::CacheHit(_)));
    }

    #[test]
    fn invalidate_all_forces_rebuild() {
        let (_dir, config, store) = setup();
        let cache = ContextCache::new();
        let ref_ids = vec!["billing".to_string()];

        cache.get_or_build(&store, &config, &[], &ref_ids, 1, 20, 10).unwrap();
        cache.invalidate_all(&store).unwrap();

        let after = cache.get_or_build(&store, &config, &[], &ref_ids, 1, 20, 10).unwrap();
        assert!(matches!(after, ContextResponse::Bundle(_)));
    }

    #[test]
    fn l2_alone_still_serves_a_hit_after_l1_is_cleared() {
        let (_dir, config, store) = setup();
        let cache = ContextCache::new();
        let ref_ids = vec!["billing".to_string()];

        cache.get_or_build(&store, &config, &[], &ref_ids, 1, 20, 10).unwrap();
        cache.l1.lock().clear();

        let response = cache.get_or_build(&store, &config, &[], &ref_ids, 1, 20, 10).unwrap();
        match response {
            ContextResponse::CacheHit(envelope) => assert_eq!(envelope.hint.as_deref(), Some("l2")),
            ContextResponse::Bundle(_) => panic!("expected a cache hit from L2"),
        }
    }
}
