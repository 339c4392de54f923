//! Scenario E (§8): a `require` rule with an empty `has_edge_to` matcher
//! treats "has_edge_to: {}" as "any node" — any domain with zero outgoing
//! `part_of` edges violates, and adding any `part_of` edge clears it.

use std::path::Path;

use beadloom_core::{Project, ReindexMode};

fn write(dir: &Path, rel: &str, content: &str) {
    let path = dir.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

fn write_rules(dir: &Path) {
    write(
        dir,
        ".beadloom/_graph/rules.yml",
        r#"
version: 1
rules:
  - type: require
    name: domains-have-a-parent
    for: { kind: domain }
    has_edge_to: {}
    edge_kind: part_of
"#,
    );
}

#[test]
fn domain_with_no_part_of_edge_violates() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        ".beadloom/_graph/graph.yml",
        "nodes:\n  - ref_id: billing\n    kind: domain\n",
    );
    write_rules(dir.path());

    let mut project = Project::open(dir.path()).unwrap();
    project.reindex(ReindexMode::Full).unwrap();

    let violations = project.lint().unwrap();
    assert_eq!(violations.len(), 1);
    assert_eq!(violations[0].rule_type, "require");
    assert_eq!(violations[0].from_ref_id.as_deref(), Some("billing"));
}

#[test]
fn adding_any_part_of_edge_clears_the_violation() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        ".beadloom/_graph/graph.yml",
        r#"
nodes:
  - ref_id: billing
    kind: domain
  - ref_id: root
    kind: adr
edges:
  - src: billing
    dst: root
    kind: part_of
"#,
    );
    write_rules(dir.path());

    let mut project = Project::open(dir.path()).unwrap();
    project.reindex(ReindexMode::Full).unwrap();

    let violations = project.lint().unwrap();
    assert!(violations.is_empty(), "expected no violations, got {violations:?}");
}
