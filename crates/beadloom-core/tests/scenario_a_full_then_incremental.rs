//! Scenario A (§8): full reindex over a small graph, then an incremental
//! run after a source file gains a function.

use std::path::Path;

use beadloom_core::types::SyncStatus;
use beadloom_core::{Project, ReindexMode};
use tempfile::TempDir;

fn write(dir: &Path, rel: &str, content: &str) {
    let path = dir.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

fn project_fixture() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        ".beadloom/_graph/graph.yml",
        r#"
nodes:
  - ref_id: A
    kind: domain
    source: src/a/
  - ref_id: B
    kind: feature
    source: src/a/b/
edges:
  - src: B
    dst: A
    kind: part_of
"#,
    );
    write(dir.path(), "src/a/x.py", "# beadloom:domain=A\ndef handler():\n    pass\n");
    write(dir.path(), "docs/A/README.md", "# A\n\nOverview.\n");
    dir
}

#[test]
fn full_reindex_then_incremental_detects_new_symbol() {
    let dir = project_fixture();
    let mut project = Project::open(dir.path()).unwrap();

    let full = project.reindex(ReindexMode::Full).unwrap();
    assert_eq!(full.nodes_count, 2);
    assert_eq!(full.edges_count, 1);
    assert_eq!(full.symbols_count, 1);

    let a_states = project.store().sync_states_for_ref("A").unwrap();
    assert_eq!(a_states.len(), 1);
    assert_eq!(a_states[0].status, SyncStatus::Ok);

    write(
        dir.path(),
        "src/a/x.py",
        "# beadloom:domain=A\ndef handler():\n    pass\n\ndef second():\n    pass\n",
    );
    project.reindex(ReindexMode::Incremental).unwrap();

    let a_states = project.store().sync_states_for_ref("A").unwrap();
    assert_eq!(a_states.len(), 1);
    assert_eq!(a_states[0].status, SyncStatus::Stale);
    assert_eq!(a_states[0].reason.as_deref(), Some("symbols_changed"));

    let added = a_states[0]
        .details
        .as_ref()
        .and_then(|d| d.get("added"))
        .and_then(|v| v.as_array())
        .unwrap();
    assert_eq!(added.len(), 1);
    assert_eq!(added[0].as_str(), Some("second"));
}
