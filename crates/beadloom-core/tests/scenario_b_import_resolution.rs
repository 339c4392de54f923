//! Scenario B (§8): import resolution derives a `depends_on` edge from a
//! resolved cross-module import.

use std::path::{Path, PathBuf};

use beadloom_core::types::EdgeKind;
use beadloom_core::{Project, ReindexMode};

fn write(dir: &Path, rel: &str, content: &str) {
    let path = dir.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

#[test]
fn resolves_cross_module_import_into_depends_on_edge() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        ".beadloom/_graph/graph.yml",
        r#"
nodes:
  - ref_id: auth
    kind: domain
    source: src/auth/
  - ref_id: billing
    kind: domain
    source: src/billing/
"#,
    );
    write(
        dir.path(),
        "src/auth/tokens.py",
        "def verify(token):\n    return True\n",
    );
    write(
        dir.path(),
        "src/billing/invoice.py",
        "from auth.tokens import verify\n\ndef charge():\n    return verify('x')\n",
    );

    let mut project = Project::open(dir.path()).unwrap();
    project.reindex(ReindexMode::Full).unwrap();

    let imports = project.store().all_imports().unwrap();
    let resolved = imports
        .iter()
        .find(|i| i.file_path == PathBuf::from("src/billing/invoice.py"))
        .expect("an import row for invoice.py");
    assert_eq!(resolved.resolved_ref_id.as_deref(), Some("auth"));

    let edges = project.store().list_edges().unwrap();
    assert!(edges
        .iter()
        .any(|e| e.src_ref_id == "billing" && e.dst_ref_id == "auth" && e.kind == EdgeKind::DependsOn));
}
