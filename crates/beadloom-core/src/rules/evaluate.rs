//! Rule evaluation (§4.8 "Evaluation"): one evaluator per variant, called
//! from `evaluate_all` and merged into a deterministically ordered result.

use std::collections::{HashMap, HashSet};

use globset::Glob;
use petgraph::algo::is_cyclic_directed;
use petgraph::graph::{DiGraph, NodeIndex};

use crate::error::BeadloomResult;
use crate::imports;
use crate::store::Store;
use crate::types::{CodeImport, Edge, EdgeKind, Node};

use super::{Rule, Severity, Violation};

/// Evaluate every rule against the current store state, partitioned by
/// variant, and return violations sorted by `(rule_name, file_path ?? "")`.
pub fn evaluate_all(store: &Store, rules: &[Rule]) -> BeadloomResult<Vec<Violation>> {
    let nodes = store.list_nodes()?;
    let edges = store.list_edges()?;
    let imports = store.all_imports()?;

    let mut violations = Vec::new();
    for rule in rules {
        let found = match rule {
            Rule::Deny { .. } => evaluate_deny(rule, &nodes, &edges, &imports),
            Rule::Require { .. } => evaluate_require(rule, &nodes, &edges),
            Rule::ForbidCycles { .. } => evaluate_forbid_cycles(rule, &nodes, &edges),
            Rule::ForbidImport { .. } => evaluate_forbid_import(rule, &imports),
            Rule::ForbidEdge { .. } => evaluate_forbid_edge(rule, &nodes, &edges),
            Rule::Layers { .. } => evaluate_layers(rule, &nodes, &edges),
            Rule::Cardinality { .. } => evaluate_cardinality(rule, store, &nodes)?,
        };
        violations.extend(found);
    }

    violations.sort_by(|a, b| {
        (a.rule_name.as_str(), a.file_path.as_deref().unwrap_or(""))
            .cmp(&(b.rule_name.as_str(), b.file_path.as_deref().unwrap_or("")))
    });
    Ok(violations)
}

fn base_violation(rule: &Rule, message: String) -> Violation {
    Violation {
        rule_name: rule.name().to_string(),
        rule_description: rule.description().to_string(),
        rule_type: rule.type_name().to_string(),
        severity: rule.severity(),
        file_path: None,
        line_number: None,
        from_ref_id: None,
        to_ref_id: None,
        message,
    }
}

fn edge_exists(edges: &[Edge], src: &str, dst: &str, kinds: &[EdgeKind]) -> bool {
    edges.iter().any(|e| {
        e.src_ref_id == src && e.dst_ref_id == dst && (kinds.is_empty() || kinds.contains(&e.kind))
    })
}

/// `deny` is an import-level rule (§4.8, §8 Scenario C): it walks resolved
/// `CodeImport` rows rather than graph `depends_on` edges, so each
/// violation carries the importing `file_path`/`line_number` the edge-level
/// variants (`forbid_edge`) don't need. `unless_edge` is still checked
/// against the graph's edges — it names an edge *kind* that, if present
/// between the two nodes, suppresses the violation regardless of which
/// import triggered it.
fn evaluate_deny(rule: &Rule, nodes: &[Node], edges: &[Edge], imports: &[CodeImport]) -> Vec<Violation> {
    let Rule::Deny { from, to, unless_edge, .. } = rule else { return Vec::new() };

    let mut out = Vec::new();
    for import in imports {
        let Some(dst_ref_id) = &import.resolved_ref_id else { continue };
        let Some(src_node) = imports::owning_node(&import.file_path, nodes) else { continue };
        if src_node.ref_id == *dst_ref_id {
            continue;
        }
        if !from.matches(src_node) {
            continue;
        }
        let Some(dst_node) = nodes.iter().find(|n| &n.ref_id == dst_ref_id) else { continue };
        if !to.matches(dst_node) {
            continue;
        }
        if !unless_edge.is_empty() && edge_exists(edges, &src_node.ref_id, dst_ref_id, unless_edge) {
            continue;
        }

        let mut v = base_violation(
            rule,
            format!("'{}' depends on denied target '{}'", src_node.ref_id, dst_ref_id),
        );
        v.from_ref_id = Some(src_node.ref_id.clone());
        v.to_ref_id = Some(dst_ref_id.clone());
        v.file_path = Some(import.file_path.to_string_lossy().to_string());
        v.line_number = Some(import.line_number);
        out.push(v);
    }
    out
}

fn evaluate_require(rule: &Rule, nodes: &[Node], edges: &[Edge]) -> Vec<Violation> {
    let Rule::Require { for_matcher, has_edge_to, edge_kind, .. } = rule else { return Vec::new() };
    let subjects = for_matcher.matching(nodes);
    let targets: HashSet<&str> = has_edge_to.matching(nodes).iter().map(|n| n.ref_id.as_str()).collect();
    let kinds: Vec<EdgeKind> = edge_kind.map(|k| vec![k]).unwrap_or_default();

    let mut out = Vec::new();
    for subject in &subjects {
        let satisfied = edges.iter().any(|e| {
            e.src_ref_id == subject.ref_id
                && (kinds.is_empty() || kinds.contains(&e.kind))
                && (has_edge_to == &super::matcher::NodeMatcher::default() || targets.contains(e.dst_ref_id.as_str()))
        });
        if !satisfied {
            let mut v = base_violation(rule, format!("'{}' has no required outgoing edge", subject.ref_id));
            v.from_ref_id = Some(subject.ref_id.clone());
            out.push(v);
        }
    }
    out
}

fn evaluate_forbid_cycles(rule: &Rule, nodes: &[Node], edges: &[Edge]) -> Vec<Violation> {
    let Rule::ForbidCycles { edge_kind, max_depth, .. } = rule else { return Vec::new() };

    let mut graph = DiGraph::<String, ()>::new();
    let mut index_of: HashMap<&str, NodeIndex> = HashMap::new();
    for node in nodes {
        let idx = graph.add_node(node.ref_id.clone());
        index_of.insert(&node.ref_id, idx);
    }
    for edge in edges {
        if !edge_kind.contains(&edge.kind) {
            continue;
        }
        if let (Some(&src), Some(&dst)) = (index_of.get(edge.src_ref_id.as_str()), index_of.get(edge.dst_ref_id.as_str())) {
            graph.add_edge(src, dst, ());
        }
    }

    if !is_cyclic_directed(&graph) {
        return Vec::new();
    }

    match find_cycle_path(&graph, *max_depth) {
        Some(path) => {
            let joined = path.join(" -> ");
            vec![base_violation(rule, format!("cycle detected: {joined}"))]
        }
        None => Vec::new(),
    }
}

/// DFS for a concrete cycle path, bounded by `max_depth`, for a readable
/// violation message (`is_cyclic_directed` alone only says yes/no). A cycle
/// of length `max_depth` is reported; one of length `max_depth + 1` is not
/// (§8 boundary behavior), so a path already `max_depth` nodes long is the
/// last one still allowed to close the loop.
fn find_cycle_path(graph: &DiGraph<String, ()>, max_depth: usize) -> Option<Vec<String>> {
    for start in graph.node_indices() {
        let mut stack = vec![(start, vec![start])];
        while let Some((current, path)) = stack.pop() {
            if path.len() > max_depth {
                continue;
            }
            for neighbor in graph.neighbors(current) {
                if neighbor == start && path.len() > 1 {
                    let mut names: Vec<String> = path.iter().map(|i| graph[*i].clone()).collect();
                    names.push(graph[start].clone());
                    return Some(names);
                }
                if !path.contains(&neighbor) {
                    let mut next = path.clone();
                    next.push(neighbor);
                    stack.push((neighbor, next));
                }
            }
        }
    }
    None
}

fn evaluate_forbid_import(rule: &Rule, imports: &[CodeImport]) -> Vec<Violation> {
    let Rule::ForbidImport { from_glob, to_glob, .. } = rule else { return Vec::new() };
    let Ok(from_matcher) = Glob::new(from_glob).map(|g| g.compile_matcher()) else { return Vec::new() };
    let Ok(to_matcher) = Glob::new(to_glob).map(|g| g.compile_matcher()) else { return Vec::new() };

    let mut out = Vec::new();
    for import in imports {
        let from_str = import.file_path.to_string_lossy();
        if !from_matcher.is_match(from_str.as_ref()) {
            continue;
        }
        if !to_matcher.is_match(&import.import_path) {
            continue;
        }
        let mut v = base_violation(
            rule,
            format!("'{}' imports forbidden target '{}'", from_str, import.import_path),
        );
        v.file_path = Some(from_str.to_string());
        v.line_number = Some(import.line_number);
        out.push(v);
    }
    out
}

fn evaluate_forbid_edge(rule: &Rule, nodes: &[Node], edges: &[Edge]) -> Vec<Violation> {
    let Rule::ForbidEdge { from, to, edge_kind, .. } = rule else { return Vec::new() };
    let froms: HashSet<&str> = from.matching(nodes).iter().map(|n| n.ref_id.as_str()).collect();
    let tos: HashSet<&str> = to.matching(nodes).iter().map(|n| n.ref_id.as_str()).collect();

    let mut out = Vec::new();
    for edge in edges {
        if let Some(kind) = edge_kind {
            if &edge.kind != kind {
                continue;
            }
        }
        if froms.contains(edge.src_ref_id.as_str()) && tos.contains(edge.dst_ref_id.as_str()) {
            let mut v = base_violation(
                rule,
                format!("edge '{}' -> '{}' is forbidden", edge.src_ref_id, edge.dst_ref_id),
            );
            v.from_ref_id = Some(edge.src_ref_id.clone());
            v.to_ref_id = Some(edge.dst_ref_id.clone());
            out.push(v);
        }
    }
    out
}

fn evaluate_layers(rule: &Rule, nodes: &[Node], edges: &[Edge]) -> Vec<Violation> {
    let Rule::Layers { layers, edge_kind, allow_skip, .. } = rule else { return Vec::new() };

    let layer_index: HashMap<&str, usize> = layers.iter().enumerate().map(|(i, l)| (l.tag.as_str(), i)).collect();
    let node_layer = |ref_id: &str| -> Option<usize> {
        let node = nodes.iter().find(|n| n.ref_id == ref_id)?;
        node.extra.tags.iter().find_map(|t| layer_index.get(t.as_str()).copied())
    };

    let mut out = Vec::new();
    for edge in edges {
        if edge.kind != *edge_kind {
            continue;
        }
        let (Some(src_layer), Some(dst_layer)) = (node_layer(&edge.src_ref_id), node_layer(&edge.dst_ref_id)) else {
            continue;
        };
        if src_layer < dst_layer {
            // True top-down. Still flag it if it skips more than one layer
            // and the rule doesn't allow skipping.
            if !*allow_skip && dst_layer - src_layer > 1 {
                let mut v = base_violation(
                    rule,
                    format!("edge '{}' -> '{}' skips layers", edge.src_ref_id, edge.dst_ref_id),
                );
                v.from_ref_id = Some(edge.src_ref_id.clone());
                v.to_ref_id = Some(edge.dst_ref_id.clone());
                out.push(v);
            }
            continue;
        }
        // Same-layer or bottom-up: always a violation, `allow_skip` only
        // ever relaxes how many top-down layers an edge may cross.
        let mut v = base_violation(
            rule,
            format!(
                "edge '{}' -> '{}' violates top-down layering ({} -> {})",
                edge.src_ref_id, edge.dst_ref_id, layers[src_layer].name, layers[dst_layer].name
            ),
        );
        v.from_ref_id = Some(edge.src_ref_id.clone());
        v.to_ref_id = Some(edge.dst_ref_id.clone());
        out.push(v);
    }
    out
}

fn evaluate_cardinality(rule: &Rule, store: &Store, nodes: &[Node]) -> BeadloomResult<Vec<Violation>> {
    let Rule::Cardinality { for_matcher, max_symbols, max_files, min_doc_coverage, .. } = rule else {
        return Ok(Vec::new());
    };

    let mut out = Vec::new();
    for node in for_matcher.matching(nodes) {
        let symbols = store.symbols_under_prefix(&node.source)?;
        if let Some(max) = max_symbols {
            if symbols.len() > *max {
                let mut v = base_violation(rule, format!("'{}' has {} symbols (max {})", node.ref_id, symbols.len(), max));
                v.from_ref_id = Some(node.ref_id.clone());
                out.push(v);
            }
        }

        if let Some(max) = max_files {
            let files: HashSet<&std::path::Path> = symbols.iter().map(|s| s.file_path.as_path()).collect();
            if files.len() > *max {
                let mut v = base_violation(rule, format!("'{}' spans {} files (max {})", node.ref_id, files.len(), max));
                v.from_ref_id = Some(node.ref_id.clone());
                out.push(v);
            }
        }

        if let Some(min_coverage) = min_doc_coverage {
            let docs = store.docs_for_ref(&node.ref_id)?;
            let coverage = if docs.is_empty() { 0.0 } else { 1.0 };
            if coverage < *min_coverage {
                let mut v = base_violation(
                    rule,
                    format!("'{}' has doc coverage {:.2} (min {:.2})", node.ref_id, coverage, min_coverage),
                );
                v.from_ref_id = Some(node.ref_id.clone());
                out.push(v);
            }
        }
    }
    Ok(out)
}
