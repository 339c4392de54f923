//! Core domain types shared across all beadloom-core subsystems.
//!
//! These types form the API contract between modules, the same role
//! `omni-core::types` plays for that crate's subsystems: stable, minimal,
//! and changed only when every consumer is updated in lockstep.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Node / edge kinds (closed sets, §3)
// ---------------------------------------------------------------------------

/// The closed set of node kinds a graph node may have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Domain,
    Feature,
    Service,
    Entity,
    Adr,
}

impl NodeKind {
    /// All valid node kinds, for validation error messages.
    pub const ALL: [NodeKind; 5] = [
        NodeKind::Domain,
        NodeKind::Feature,
        NodeKind::Service,
        NodeKind::Entity,
        NodeKind::Adr,
    ];

    /// Parse from the YAML/DB string form. `None` if not in the closed set.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "domain" => Some(Self::Domain),
            "feature" => Some(Self::Feature),
            "service" => Some(Self::Service),
            "entity" => Some(Self::Entity),
            "adr" => Some(Self::Adr),
            _ => None,
        }
    }

    /// Database/YAML string form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Domain => "domain",
            Self::Feature => "feature",
            Self::Service => "service",
            Self::Entity => "entity",
            Self::Adr => "adr",
        }
    }
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The closed set of edge kinds a directed edge may have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    PartOf,
    DependsOn,
    Uses,
    Implements,
    TouchesEntity,
    TouchesCode,
}

impl EdgeKind {
    /// All valid edge kinds, for validation error messages.
    pub const ALL: [EdgeKind; 6] = [
        EdgeKind::PartOf,
        EdgeKind::DependsOn,
        EdgeKind::Uses,
        EdgeKind::Implements,
        EdgeKind::TouchesEntity,
        EdgeKind::TouchesCode,
    ];

    /// Parse from the YAML/DB string form. `None` if not in the closed set.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "part_of" => Some(Self::PartOf),
            "depends_on" => Some(Self::DependsOn),
            "uses" => Some(Self::Uses),
            "implements" => Some(Self::Implements),
            "touches_entity" => Some(Self::TouchesEntity),
            "touches_code" => Some(Self::TouchesCode),
            _ => None,
        }
    }

    /// Database/YAML string form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PartOf => "part_of",
            Self::DependsOn => "depends_on",
            Self::Uses => "uses",
            Self::Implements => "implements",
            Self::TouchesEntity => "touches_entity",
            Self::TouchesCode => "touches_code",
        }
    }
}

impl std::fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Node attribute bag
// ---------------------------------------------------------------------------

/// A `{url, label}` link attached to a node.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Link {
    pub url: String,
    pub label: String,
}

/// The open-ended attribute bag carried by every node (§3, §9).
///
/// Known, structurally-validated fields are typed; everything else lands in
/// `other` so unrecognized *data* fields round-trip without loss while
/// unrecognized *structural* fields (wrong type for a known key) still fail
/// validation at load time.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NodeExtra {
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub tags: BTreeSet<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<Link>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub c4_level: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub docs: Vec<String>,

    /// Indexer-added fields (routes, activity, tests) plus any other
    /// forward-compatible user data.
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub other: serde_json::Map<String, serde_json::Value>,
}

// ---------------------------------------------------------------------------
// Node / Edge records
// ---------------------------------------------------------------------------

/// A graph node (§3 Node).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub ref_id: String,
    pub kind: NodeKind,
    #[serde(default)]
    pub summary: String,
    /// Path prefix relative to project root. Empty for the root node.
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub extra: NodeExtra,
}

/// A directed edge `(src, dst, kind)` (§3 Edge).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Edge {
    pub src_ref_id: String,
    pub dst_ref_id: String,
    pub kind: EdgeKind,
}

// ---------------------------------------------------------------------------
// Docs / chunks
// ---------------------------------------------------------------------------

/// Metadata about one indexed markdown document (§3 Doc).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocRecord {
    /// Path relative to the docs root.
    pub path: PathBuf,
    /// Owning node, if any. `None` marks an orphan doc.
    pub ref_id: Option<String>,
    /// SHA-256 of full content.
    pub hash: String,
    pub title: String,
    /// Unix timestamp of the file's mtime at index time.
    pub last_modified: i64,
}

/// An ordered sub-section of a `DocRecord` (§3 Chunk).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocChunk {
    pub doc_path: PathBuf,
    pub chunk_index: u32,
    pub heading_path: String,
    pub text: String,
    pub token_estimate: u32,
}

// ---------------------------------------------------------------------------
// Code symbols / imports
// ---------------------------------------------------------------------------

/// Supported source languages (§4.4), plus the handful of document/config
/// formats the doc indexer and sync engine care about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Python,
    TypeScript,
    Tsx,
    JavaScript,
    Jsx,
    Go,
    Rust,
    Java,
    Kotlin,
    Swift,
    C,
    Cpp,
    ObjectiveC,
    Markdown,
    Unknown,
}

impl Language {
    /// Detect language from a lowercase file extension (no leading dot).
    pub fn from_extension(ext: &str) -> Self {
        match ext {
            "py" => Self::Python,
            "ts" => Self::TypeScript,
            "tsx" => Self::Tsx,
            "js" | "mjs" | "cjs" => Self::JavaScript,
            "jsx" => Self::Jsx,
            "go" => Self::Go,
            "rs" => Self::Rust,
            "java" => Self::Java,
            "kt" | "kts" => Self::Kotlin,
            "swift" => Self::Swift,
            "c" | "h" => Self::C,
            "cpp" | "cc" | "cxx" | "hpp" | "hxx" | "hh" => Self::Cpp,
            "m" | "mm" => Self::ObjectiveC,
            "md" | "mdx" => Self::Markdown,
            _ => Self::Unknown,
        }
    }

    /// Returns true if this language is parsed via tree-sitter for symbols/imports.
    pub fn is_code(&self) -> bool {
        !matches!(self, Self::Markdown | Self::Unknown)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Python => "python",
            Self::TypeScript => "typescript",
            Self::Tsx => "tsx",
            Self::JavaScript => "javascript",
            Self::Jsx => "jsx",
            Self::Go => "go",
            Self::Rust => "rust",
            Self::Java => "java",
            Self::Kotlin => "kotlin",
            Self::Swift => "swift",
            Self::C => "c",
            Self::Cpp => "cpp",
            Self::ObjectiveC => "objective-c",
            Self::Markdown => "markdown",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The kind of a code symbol (§3 Code Symbol).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolKind {
    Function,
    Class,
    Method,
    Route,
    Test,
}

impl SymbolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Function => "function",
            Self::Class => "class",
            Self::Method => "method",
            Self::Route => "route",
            Self::Test => "test",
        }
    }

    pub fn from_str_lossy(s: &str) -> Self {
        match s {
            "class" => Self::Class,
            "method" => Self::Method,
            "route" => Self::Route,
            "test" => Self::Test,
            _ => Self::Function,
        }
    }
}

/// A symbol extracted from a source file by the Code Indexer (§3, §4.4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeSymbol {
    pub file_path: PathBuf,
    pub symbol_name: String,
    pub kind: SymbolKind,
    pub line_start: u32,
    pub line_end: u32,
    pub language: Language,
    /// `beadloom:key=value` pairs recovered from the enclosing comment block.
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
}

/// A raw import statement extracted from a source file (§4.5 Extract).
#[derive(Debug, Clone)]
pub struct RawImport {
    pub line_number: u32,
    pub import_path: String,
}

/// A stored Code Import row (§3 Code Import).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeImport {
    pub file_path: PathBuf,
    pub line_number: u32,
    pub import_path: String,
    pub resolved_ref_id: Option<String>,
    pub file_hash: String,
}

// ---------------------------------------------------------------------------
// File index (incremental reindex bookkeeping, §3 File Index)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
    Graph,
    Doc,
    Code,
}

impl FileKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Graph => "graph",
            Self::Doc => "doc",
            Self::Code => "code",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileIndexEntry {
    pub path: PathBuf,
    pub hash: String,
    pub kind: FileKind,
    pub indexed_at: i64,
}

// ---------------------------------------------------------------------------
// Sync state (§3, §4.7)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Ok,
    Stale,
    Unknown,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Stale => "stale",
            Self::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncState {
    pub ref_id: String,
    pub doc_path: PathBuf,
    pub code_path: String,
    pub status: SyncStatus,
    pub code_hash_at_sync: Option<String>,
    pub doc_hash_at_sync: Option<String>,
    pub synced_at: Option<i64>,
    pub reason: Option<String>,
    pub details: Option<serde_json::Value>,
}

// ---------------------------------------------------------------------------
// Context bundle (§6)
// ---------------------------------------------------------------------------

/// Minimal node view returned in a context bundle's `graph.nodes`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleNode {
    pub ref_id: String,
    pub kind: NodeKind,
    pub summary: String,
}

/// A context bundle's focus node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleFocus {
    pub ref_id: String,
    pub kind: NodeKind,
    pub summary: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<Link>,
}

/// One text chunk entry in a context bundle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleTextChunk {
    pub doc_path: PathBuf,
    pub heading_path: String,
    pub text: String,
}

/// A rendered constraint entry in a context bundle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleConstraint {
    pub rule: String,
    pub description: String,
    #[serde(rename = "type")]
    pub rule_type: String,
    pub definition: serde_json::Value,
}

/// The assembled context bundle (§6 Context bundle).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextBundle {
    pub version: u32,
    pub focus: BundleFocus,
    pub graph: BundleGraph,
    pub text_chunks: Vec<BundleTextChunk>,
    pub code_symbols: Vec<CodeSymbol>,
    pub sync_status: Vec<SyncState>,
    pub constraints: Vec<BundleConstraint>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleGraph {
    pub nodes: Vec<BundleNode>,
    pub edges: Vec<Edge>,
}

/// A cache-hit envelope, returned instead of a full bundle on a cache hit
/// (§4.10, §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheHitEnvelope {
    pub cached: bool,
    pub etag: String,
    pub unchanged_since: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

/// Either a freshly assembled bundle or a cache-hit envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ContextResponse {
    Bundle(ContextBundle),
    CacheHit(CacheHitEnvelope),
}

// ---------------------------------------------------------------------------
// Snapshot compare output (§6)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangedNode {
    pub ref_id: String,
    pub old_summary: String,
    pub new_summary: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotDiff {
    pub since_ref: String,
    pub added_nodes: Vec<String>,
    pub removed_nodes: Vec<String>,
    pub changed_nodes: Vec<ChangedNode>,
    pub added_edges: Vec<Edge>,
    pub removed_edges: Vec<Edge>,
}

// ---------------------------------------------------------------------------
// Pipeline events (reindex orchestration)
// ---------------------------------------------------------------------------

/// Events flowing through the reindex pipeline's internal worker channel.
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    GraphChanged { path: PathBuf },
    DocChanged { path: PathBuf },
    CodeChanged { path: PathBuf },
    FileDeleted { path: PathBuf, kind: FileKind },
}

/// Which reindex mode to run (§4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReindexMode {
    Full,
    Incremental,
}

/// Summary of a completed reindex run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReindexResult {
    pub files_scanned: usize,
    pub files_changed: usize,
    pub files_deleted: usize,
    pub files_failed: usize,
    pub nodes_count: usize,
    pub edges_count: usize,
    pub docs_count: usize,
    pub symbols_count: usize,
}
