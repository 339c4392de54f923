//! Scenario D (§8): `forbid_cycles` reports a readable path for a
//! three-node `depends_on` cycle.

use std::path::Path;

use beadloom_core::{Project, ReindexMode};

fn write(dir: &Path, rel: &str, content: &str) {
    let path = dir.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

#[test]
fn cycle_of_three_nodes_is_reported_with_its_path() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        ".beadloom/_graph/graph.yml",
        r#"
nodes:
  - ref_id: X
    kind: domain
  - ref_id: Y
    kind: domain
  - ref_id: Z
    kind: domain
edges:
  - src: X
    dst: Y
    kind: depends_on
  - src: Y
    dst: Z
    kind: depends_on
  - src: Z
    dst: X
    kind: depends_on
"#,
    );
    write(
        dir.path(),
        ".beadloom/_graph/rules.yml",
        r#"
version: 1
rules:
  - type: forbid_cycles
    name: no-cycles
    edge_kind: [depends_on]
    max_depth: 10
"#,
    );

    let mut project = Project::open(dir.path()).unwrap();
    project.reindex(ReindexMode::Full).unwrap();

    let violations = project.lint().unwrap();
    assert_eq!(violations.len(), 1);
    assert_eq!(violations[0].rule_type, "forbid_cycles");
    assert!(violations[0].message.contains("X -> Y -> Z -> X"));
}

#[test]
fn cycle_longer_than_max_depth_is_not_reported() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        ".beadloom/_graph/graph.yml",
        r#"
nodes:
  - ref_id: X
    kind: domain
  - ref_id: Y
    kind: domain
  - ref_id: Z
    kind: domain
edges:
  - src: X
    dst: Y
    kind: depends_on
  - src: Y
    dst: Z
    kind: depends_on
  - src: Z
    dst: X
    kind: depends_on
"#,
    );
    write(
        dir.path(),
        ".beadloom/_graph/rules.yml",
        r#"
version: 1
rules:
  - type: forbid_cycles
    name: no-cycles
    edge_kind: [depends_on]
    max_depth: 2
"#,
    );

    let mut project = Project::open(dir.path()).unwrap();
    project.reindex(ReindexMode::Full).unwrap();

    assert!(project.lint().unwrap().is_empty());
}
