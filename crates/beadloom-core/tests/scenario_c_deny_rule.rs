//! Scenario C (§8): a `deny` rule flags a resolved import edge unless
//! `unless_edge` names the edge kind that's actually there.

use std::path::Path;

use beadloom_core::{Project, ReindexMode};

fn write(dir: &Path, rel: &str, content: &str) {
    let path = dir.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

fn fixture() -> tempfile::TempDir {
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
    write(dir.path(), "src/auth/tokens.py", "def verify(token):\n    return True\n");
    write(
        dir.path(),
        "src/billing/invoice.py",
        "from auth.tokens import verify\n\ndef charge():\n    return verify('x')\n",
    );
    dir
}

fn write_rules(dir: &Path, content: &str) {
    write(dir, ".beadloom/_graph/rules.yml", content);
}

#[test]
fn deny_rule_flags_the_resolved_edge() {
    let dir = fixture();
    write_rules(
        dir.path(),
        r#"
version: 1
rules:
  - type: deny
    name: no-cross
    from: { ref_id: billing }
    to: { ref_id: auth }
"#,
    );

    let mut project = Project::open(dir.path()).unwrap();
    project.reindex(ReindexMode::Full).unwrap();

    let violations = project.lint().unwrap();
    assert_eq!(violations.len(), 1);
    let v = &violations[0];
    assert_eq!(v.rule_type, "deny");
    assert_eq!(v.file_path.as_deref(), Some("src/billing/invoice.py"));
    assert_eq!(v.line_number, Some(1));
    assert_eq!(v.from_ref_id.as_deref(), Some("billing"));
    assert_eq!(v.to_ref_id.as_deref(), Some("auth"));
}

#[test]
fn unless_edge_suppresses_the_violation_but_a_plain_edge_does_not() {
    let dir = fixture();
    write_rules(
        dir.path(),
        r#"
version: 1
rules:
  - type: deny
    name: no-cross
    from: { ref_id: billing }
    to: { ref_id: auth }
"#,
    );

    let mut project = Project::open(dir.path()).unwrap();
    project.reindex(ReindexMode::Full).unwrap();
    assert_eq!(project.lint().unwrap().len(), 1);

    // Adding another depends_on edge does not suppress the violation: the
    // rule has no `unless_edge` naming it.
    write(
        dir.path(),
        ".beadloom/_graph/extra.yml",
        "edges:\n  - src: billing\n    dst: auth\n    kind: depends_on\n",
    );
    project.reindex(ReindexMode::Full).unwrap();
    assert_eq!(project.lint().unwrap().len(), 1);

    write_rules(
        dir.path(),
        r#"
version: 1
rules:
  - type: deny
    name: no-cross
    from: { ref_id: billing }
    to: { ref_id: auth }
    unless_edge: [depends_on]
"#,
    );
    project.reindex(ReindexMode::Full).unwrap();
    assert!(project.lint().unwrap().is_empty());
}
