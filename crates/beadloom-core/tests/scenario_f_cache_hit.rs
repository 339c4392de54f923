//! Scenario F (§8): repeated `get_context` calls with identical arguments
//! and an untouched filesystem hit the cache with a stable etag; touching a
//! graph YAML file's mtime (content unchanged) still invalidates, since the
//! cache's staleness signal is mtime, not content hash; touching an
//! unrelated file outside `docs/`/the graph dir leaves the cache alone.

use std::path::Path;
use std::time::{Duration, SystemTime};

use beadloom_core::{ContextResponse, Project, ReindexMode};

fn write(dir: &Path, rel: &str, content: &str) {
    let path = dir.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

fn etag_of(response: &ContextResponse) -> String {
    match response {
        ContextResponse::Bundle(bundle) => {
            let json = serde_json::to_string(bundle).unwrap();
            let mut hasher = sha2::Sha256::new();
            use sha2::Digest;
            hasher.update(json.as_bytes());
            hex::encode(hasher.finalize())
        }
        ContextResponse::CacheHit(envelope) => envelope.etag.clone(),
    }
}

#[test]
fn repeated_calls_hit_the_cache_until_graph_mtime_drifts() {
    let dir = tempfile::tempdir().unwrap();
    let graph_path = dir.path().join(".beadloom/_graph/graph.yml");
    write(dir.path(), ".beadloom/_graph/graph.yml", "nodes:\n  - ref_id: billing\n    kind: domain\n");
    write(dir.path(), "docs/README.md", "# Billing\n\nOverview.\n");

    let mut project = Project::open(dir.path()).unwrap();
    project.reindex(ReindexMode::Full).unwrap();

    let ref_ids = vec!["billing".to_string()];
    let first = project.get_context(&ref_ids, 1, 20, 10).unwrap();
    assert!(matches!(first, ContextResponse::Bundle(_)));
    let first_etag = etag_of(&first);

    // Second call, nothing touched: cache hit with the same etag.
    let second = project.get_context(&ref_ids, 1, 20, 10).unwrap();
    assert!(matches!(second, ContextResponse::CacheHit(_)));
    assert_eq!(etag_of(&second), first_etag);

    // Touch an unrelated file outside docs/ and the graph dir: still a hit.
    write(dir.path(), "src/scratch.txt", "unrelated");
    let third = project.get_context(&ref_ids, 1, 20, 10).unwrap();
    assert!(matches!(third, ContextResponse::CacheHit(_)));

    // Bump the graph file's mtime without changing its content: rebuilds.
    let later = SystemTime::now() + Duration::from_secs(120);
    let file = std::fs::File::options().write(true).open(&graph_path).unwrap();
    file.set_modified(later).unwrap();

    let fourth = project.get_context(&ref_ids, 1, 20, 10).unwrap();
    assert!(matches!(fourth, ContextResponse::Bundle(_)), "mtime drift should force a rebuild despite identical content");
}
