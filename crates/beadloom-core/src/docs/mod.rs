//! Doc Indexer (§4.3): walks the docs tree, hashes and chunks markdown
//! files at heading boundaries, and derives a best-effort owning `ref_id`
//! for each chunk.

mod chunker;

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use walkdir::WalkDir;

use crate::error::BeadloomResult;
use crate::types::{DocChunk, DocRecord, Node};

pub use chunker::{chunk_markdown, HeadingChunk};

/// One indexed markdown file: its record plus the chunks derived from it.
pub struct IndexedDoc {
    pub record: DocRecord,
    pub chunks: Vec<DocChunk>,
}

/// Walk `docs_root`, skipping hidden and vendor directories, and index
/// every `*.md` file found.
pub fn walk_docs(docs_root: &Path) -> Vec<PathBuf> {
    if !docs_root.exists() {
        return Vec::new();
    }
    WalkDir::new(docs_root)
        .into_iter()
        .filter_entry(|e| {
            let name = e.file_name().to_string_lossy();
            !(name.starts_with('.') || name == "node_modules" || name == "vendor")
        })
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.path().extension().and_then(|x| x.to_str()) == Some("md"))
        .map(|e| e.path().to_path_buf())
        .collect()
}

/// Index a single markdown file relative to `docs_root`, given the set of
/// known graph nodes for `ref_id` association (§4.3.3).
pub fn index_doc(docs_root: &Path, abs_path: &Path, nodes: &[Node]) -> BeadloomResult<IndexedDoc> {
    let content = std::fs::read_to_string(abs_path)?;
    let hash = hash_content(&content);
    let rel_path = abs_path.strip_prefix(docs_root).unwrap_or(abs_path).to_path_buf();

    let explicit_ref = extract_ref_marker(&content);
    let ref_id = explicit_ref.or_else(|| ref_from_directory_heuristic(&rel_path, nodes));

    let title = extract_title(&content).unwrap_or_else(|| {
        rel_path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default()
    });

    let last_modified = std::fs::metadata(abs_path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0);

    let headings = chunk_markdown(&content);
    let chunks = headings
        .into_iter()
        .enumerate()
        .map(|(i, h)| DocChunk {
            doc_path: rel_path.clone(),
            chunk_index: i as u32,
            heading_path: h.heading_path,
            token_estimate: token_estimate(&h.text),
            text: h.text,
        })
        .collect();

    Ok(IndexedDoc {
        record: DocRecord {
            path: rel_path,
            ref_id,
            hash,
            title,
            last_modified,
        },
        chunks,
    })
}

fn hash_content(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

/// Token estimate per §4.3: `ceil(len(text) / 4)`.
pub fn token_estimate(text: &str) -> u32 {
    let len = text.len() as u32;
    len.div_ceil(4)
}

/// Look for a `<!-- beadloom:ref=<ref_id> -->` marker anywhere in the doc.
fn extract_ref_marker(content: &str) -> Option<String> {
    for line in content.lines() {
        let trimmed = line.trim();
        if let Some(rest) = trimmed.strip_prefix("<!-- beadloom:ref=") {
            if let Some(ref_id) = rest.strip_suffix("-->").map(|s| s.trim()) {
                return Some(ref_id.to_string());
            }
        }
    }
    None
}

/// Heuristic: the nearest containing directory of the doc maps to a node's
/// `source` (§4.3.3) — here interpreted as the doc's parent path, relative
/// to the docs root, matching a node whose `source` ends with that segment.
fn ref_from_directory_heuristic(rel_path: &Path, nodes: &[Node]) -> Option<String> {
    let parent = rel_path.parent()?;
    let parent_name = parent.file_name()?.to_str()?;
    nodes
        .iter()
        .find(|n| {
            let source = n.source.trim_end_matches('/');
            source.rsplit('/').next().is_some_and(|seg| seg.eq_ignore_ascii_case(parent_name))
                || n.ref_id.eq_ignore_ascii_case(parent_name)
        })
        .map(|n| n.ref_id.clone())
}

fn extract_title(content: &str) -> Option<String> {
    content
        .lines()
        .find(|l| l.trim_start().starts_with('#'))
        .map(|l| l.trim_start_matches('#').trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{NodeExtra, NodeKind};

    #[test]
    fn indexes_a_doc_with_directory_heuristic_ref() {
        let dir = tempfile::tempdir().unwrap();
        let docs_root = dir.path().join("docs");
        std::fs::create_dir_all(docs_root.join("billing")).unwrap();
        std::fs::write(
            docs_root.join("billing").join("README.md"),
            "# Billing\n\nOverview text.\n\n## Rules\n\nRule text.\n",
        )
        .unwrap();

        let nodes = vec![Node {
            ref_id: "billing".into(),
            kind: NodeKind::Domain,
            summary: String::new(),
            source: "src/billing/".into(),
            extra: NodeExtra::default(),
        }];

        let found = walk_docs(&docs_root);
        assert_eq!(found.len(), 1);

        let indexed = index_doc(&docs_root, &found[0], &nodes).unwrap();
        assert_eq!(indexed.record.ref_id.as_deref(), Some("billing"));
        assert_eq!(indexed.record.title, "Billing");
        assert_eq!(indexed.chunks.len(), 2);
        assert_eq!(indexed.chunks[0].heading_path, "Billing");
        assert_eq!(indexed.chunks[1].heading_path, "Billing > Rules");
    }

    #[test]
    fn explicit_marker_overrides_directory_heuristic() {
        let dir = tempfile::tempdir().unwrap();
        let docs_root = dir.path().join("docs");
        std::fs::create_dir_all(docs_root.join("billing")).unwrap();
        std::fs::write(
            docs_root.join("billing").join("README.md"),
            "<!-- beadloom:ref=auth -->\n# Billing\n\nText\n",
        )
        .unwrap();

        let found = walk_docs(&docs_root);
        let indexed = index_doc(&docs_root, &found[0], &[]).unwrap();
        assert_eq!(indexed.record.ref_id.as_deref(), Some("auth"));
    }

    #[test]
    fn token_estimate_rounds_up() {
        assert_eq!(token_estimate("abcd"), 1);
        assert_eq!(token_estimate("abcde"), 2);
        assert_eq!(token_estimate(""), 0);
    }
}
