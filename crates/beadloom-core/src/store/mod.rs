//! SQLite-backed persistent store (§3, §4.1).
//!
//! Owns the database file, schema, and every read/write path other
//! subsystems use. Only this module touches raw SQL; every other subsystem
//! goes through `Store` methods, the same discipline `omni-core::index`
//! follows for its `MetadataIndex`.
//!
//! ## Concurrency
//!
//! SQLite is opened in WAL mode so readers don't block the single writer.
//! Every multi-row mutation runs inside a transaction that commits on
//! success and rolls back on any error (§9 "Scoped database transactions").

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use rusqlite::{params, Connection, OptionalExtension};

use crate::config::Config;
use crate::error::{BeadloomError, BeadloomResult};
use crate::types::{
    CodeImport, CodeSymbol, DocChunk, DocRecord, Edge, EdgeKind, FileIndexEntry, FileKind, Link,
    Node, NodeExtra, NodeKind, SymbolKind, SyncState, SyncStatus,
};

/// Tables that survive a full reindex's `drop_volatile_tables` (§4.1).
const PERSISTENT_TABLES: &[&str] = &[
    "file_index",
    "bundle_cache",
    "health_snapshots",
    "graph_snapshots",
    "rules",
    "meta",
];

/// All tables managed by this schema, in FK-safe delete order.
const ALL_TABLES: &[&str] = &[
    "search_fts",
    "sync_state",
    "code_imports",
    "code_symbols",
    "chunks",
    "docs",
    "edges",
    "nodes",
    "file_index",
    "bundle_cache",
    "health_snapshots",
    "graph_snapshots",
    "rules",
    "meta",
];

/// Current schema version (§4.1). Bumped when a change requires a full
/// reindex rather than an additive `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA_VERSION: &str = "2";

/// The persistent store.
pub struct Store {
    conn: Connection,
}

impl Store {
    /// Open or create the store for a project (§4.1 `open`).
    pub fn open(config: &Config) -> BeadloomResult<Self> {
        let db_path = config.store_path();
        Self::open_at(&db_path)
    }

    /// Open or create a store at an explicit path (used by tests and by
    /// callers that manage their own config-dir layout).
    pub fn open_at(db_path: &Path) -> BeadloomResult<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(db_path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;

        let store = Self { conn };
        store.ensure_schema()?;
        store.ensure_meta_defaults(db_path)?;

        Ok(store)
    }

    fn ensure_schema(&self) -> BeadloomResult<()> {
        self.conn
            .execute_batch(include_str!("schema.sql"))
            .map_err(BeadloomError::from)
    }

    fn ensure_meta_defaults(&self, db_path: &Path) -> BeadloomResult<()> {
        if self.meta_get("schema_version")?.is_none() {
            self.meta_set("schema_version", SCHEMA_VERSION)?;
        }
        if self.meta_get("project_name")?.is_none() {
            let name = db_path
                .parent()
                .and_then(|p| p.parent()) // .beadloom/.. -> project root
                .and_then(|p| p.file_name())
                .and_then(|n| n.to_str())
                .unwrap_or("project")
                .to_string();
            self.meta_set("project_name", &name)?;
        }
        Ok(())
    }

    /// Run an integrity check on the database (§4.1 Failure semantics).
    pub fn check_integrity(&self) -> BeadloomResult<bool> {
        let result: String =
            self.conn
                .query_row("PRAGMA integrity_check", [], |row| row.get(0))?;
        Ok(result == "ok")
    }

    /// Raw connection access for subsystems that need a custom query.
    /// Prefer adding a method here over reaching for this.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Truncate every table except the persistent ones (§4.1). Used by a
    /// full reindex before rebuilding from scratch.
    pub fn drop_volatile_tables(&self) -> BeadloomResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        for table in ALL_TABLES {
            if PERSISTENT_TABLES.contains(table) {
                continue;
            }
            tx.execute(&format!("DELETE FROM {table}"), [])?;
        }
        tx.commit()?;
        Ok(())
    }

    // -----------------------------------------------------------------
    // Meta
    // -----------------------------------------------------------------

    pub fn meta_get(&self, key: &str) -> BeadloomResult<Option<String>> {
        self.conn
            .query_row("SELECT value FROM meta WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()
            .map_err(BeadloomError::from)
    }

    pub fn meta_set(&self, key: &str, value: &str) -> BeadloomResult<()> {
        self.conn.execute(
            "INSERT INTO meta (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    pub fn schema_version(&self) -> BeadloomResult<String> {
        Ok(self.meta_get("schema_version")?.unwrap_or_default())
    }

    // -----------------------------------------------------------------
    // Nodes
    // -----------------------------------------------------------------

    pub fn upsert_node(&self, node: &Node) -> BeadloomResult<()> {
        let extra_json = serde_json::to_string(&node.extra)
            .map_err(|e| BeadloomError::Internal(format!("serializing node extra: {e}")))?;
        self.conn.execute(
            "INSERT INTO nodes (ref_id, kind, summary, source, extra)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(ref_id) DO UPDATE SET
                kind = excluded.kind,
                summary = excluded.summary,
                source = excluded.source,
                extra = excluded.extra",
            params![node.ref_id, node.kind.as_str(), node.summary, node.source, extra_json],
        )?;
        Ok(())
    }

    pub fn delete_node(&self, ref_id: &str) -> BeadloomResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM nodes WHERE ref_id = ?1", params![ref_id])?;
        // edges cascade via FK; docs.ref_id / code_imports.resolved_ref_id SET NULL.
        tx.execute("DELETE FROM sync_state WHERE ref_id = ?1", params![ref_id])?;
        tx.commit()?;
        Ok(())
    }

    pub fn get_node(&self, ref_id: &str) -> BeadloomResult<Option<Node>> {
        self.conn
            .query_row(
                "SELECT ref_id, kind, summary, source, extra FROM nodes WHERE ref_id = ?1",
                params![ref_id],
                Self::row_to_node,
            )
            .optional()
            .map_err(BeadloomError::from)
    }

    /// Fetch a node, returning a ranked `NotFound` error if it's absent.
    pub fn require_node(&self, ref_id: &str) -> BeadloomResult<Node> {
        match self.get_node(ref_id)? {
            Some(node) => Ok(node),
            None => {
                let known = self.all_ref_ids()?;
                Err(BeadloomError::not_found("node", ref_id, &known))
            }
        }
    }

    pub fn all_ref_ids(&self) -> BeadloomResult<Vec<String>> {
        let mut stmt = self.conn.prepare("SELECT ref_id FROM nodes")?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        rows.collect::<Result<Vec<_>, _>>().map_err(BeadloomError::from)
    }

    pub fn list_nodes(&self) -> BeadloomResult<Vec<Node>> {
        let mut stmt = self
            .conn
            .prepare("SELECT ref_id, kind, summary, source, extra FROM nodes ORDER BY ref_id")?;
        let rows = stmt.query_map([], Self::row_to_node)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(BeadloomError::from)
    }

    fn row_to_node(row: &rusqlite::Row<'_>) -> rusqlite::Result<Node> {
        let kind_str: String = row.get(1)?;
        let extra_str: String = row.get(4)?;
        let extra: NodeExtra = serde_json::from_str(&extra_str).unwrap_or_default();
        Ok(Node {
            ref_id: row.get(0)?,
            kind: NodeKind::parse(&kind_str).unwrap_or(NodeKind::Domain),
            summary: row.get(2)?,
            source: row.get(3)?,
            extra,
        })
    }

    // -----------------------------------------------------------------
    // Edges
    // -----------------------------------------------------------------

    pub fn insert_edge(&self, edge: &Edge) -> BeadloomResult<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO edges (src_ref_id, dst_ref_id, kind) VALUES (?1, ?2, ?3)",
            params![edge.src_ref_id, edge.dst_ref_id, edge.kind.as_str()],
        )?;
        Ok(())
    }

    pub fn list_edges(&self) -> BeadloomResult<Vec<Edge>> {
        let mut stmt = self
            .conn
            .prepare("SELECT src_ref_id, dst_ref_id, kind FROM edges ORDER BY src_ref_id, dst_ref_id, kind")?;
        let rows = stmt.query_map([], Self::row_to_edge)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(BeadloomError::from)
    }

    /// Delete every `depends_on` edge whose source file owns `source_ref_id`,
    /// used before re-deriving edges for a set of re-resolved files (§4.5).
    pub fn delete_derived_edges_from(&self, src_ref_id: &str, kind: EdgeKind) -> BeadloomResult<()> {
        self.conn.execute(
            "DELETE FROM edges WHERE src_ref_id = ?1 AND kind = ?2",
            params![src_ref_id, kind.as_str()],
        )?;
        Ok(())
    }

    pub fn edges_touching(&self, ref_id: &str) -> BeadloomResult<Vec<Edge>> {
        let mut stmt = self.conn.prepare(
            "SELECT src_ref_id, dst_ref_id, kind FROM edges WHERE src_ref_id = ?1 OR dst_ref_id = ?1",
        )?;
        let rows = stmt.query_map(params![ref_id], Self::row_to_edge)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(BeadloomError::from)
    }

    fn row_to_edge(row: &rusqlite::Row<'_>) -> rusqlite::Result<Edge> {
        let kind_str: String = row.get(2)?;
        Ok(Edge {
            src_ref_id: row.get(0)?,
            dst_ref_id: row.get(1)?,
            kind: EdgeKind::parse(&kind_str).unwrap_or(EdgeKind::Uses),
        })
    }

    /// Replace the entire node/edge set in one transaction (§4.6 "a graph
    /// file change of any kind triggers a full graph reload"). `sync_state`
    /// is cleared too since it's keyed by `ref_id`, which may no longer
    /// exist after the reload; callers recompute it for the fresh node set.
    pub fn reload_nodes_and_edges(&self, nodes: &[Node], edges: &[Edge]) -> BeadloomResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM sync_state", [])?;
        tx.execute("DELETE FROM edges", [])?;
        tx.execute("DELETE FROM nodes", [])?;

        for node in nodes {
            let extra_json = serde_json::to_string(&node.extra)
                .map_err(|e| BeadloomError::Internal(format!("serializing node extra: {e}")))?;
            tx.execute(
                "INSERT INTO nodes (ref_id, kind, summary, source, extra) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![node.ref_id, node.kind.as_str(), node.summary, node.source, extra_json],
            )?;
        }
        for edge in edges {
            tx.execute(
                "INSERT OR IGNORE INTO edges (src_ref_id, dst_ref_id, kind) VALUES (?1, ?2, ?3)",
                params![edge.src_ref_id, edge.dst_ref_id, edge.kind.as_str()],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    // -----------------------------------------------------------------
    // Docs + chunks
    // -----------------------------------------------------------------

    pub fn upsert_doc(&self, doc: &DocRecord) -> BeadloomResult<()> {
        let path_str = doc.path.to_string_lossy();
        self.conn.execute(
            "INSERT INTO docs (path, ref_id, hash, title, last_modified)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(path) DO UPDATE SET
                ref_id = excluded.ref_id,
                hash = excluded.hash,
                title = excluded.title,
                last_modified = excluded.last_modified",
            params![path_str, doc.ref_id, doc.hash, doc.title, doc.last_modified],
        )?;
        Ok(())
    }

    pub fn get_doc(&self, path: &Path) -> BeadloomResult<Option<DocRecord>> {
        self.conn
            .query_row(
                "SELECT path, ref_id, hash, title, last_modified FROM docs WHERE path = ?1",
                params![path.to_string_lossy()],
                Self::row_to_doc,
            )
            .optional()
            .map_err(BeadloomError::from)
    }

    pub fn list_docs(&self) -> BeadloomResult<Vec<DocRecord>> {
        let mut stmt = self
            .conn
            .prepare("SELECT path, ref_id, hash, title, last_modified FROM docs ORDER BY path")?;
        let rows = stmt.query_map([], Self::row_to_doc)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(BeadloomError::from)
    }

    pub fn docs_for_ref(&self, ref_id: &str) -> BeadloomResult<Vec<DocRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT path, ref_id, hash, title, last_modified FROM docs WHERE ref_id = ?1 ORDER BY path",
        )?;
        let rows = stmt.query_map(params![ref_id], Self::row_to_doc)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(BeadloomError::from)
    }

    pub fn delete_doc(&self, path: &Path) -> BeadloomResult<()> {
        self.conn
            .execute("DELETE FROM docs WHERE path = ?1", params![path.to_string_lossy()])?;
        Ok(())
    }

    fn row_to_doc(row: &rusqlite::Row<'_>) -> rusqlite::Result<DocRecord> {
        let path_str: String = row.get(0)?;
        Ok(DocRecord {
            path: PathBuf::from(path_str),
            ref_id: row.get(1)?,
            hash: row.get(2)?,
            title: row.get(3)?,
            last_modified: row.get(4)?,
        })
    }

    /// Replace every chunk belonging to `doc_path` (§3 Chunk: "regenerated
    /// wholesale whenever their parent Doc is re-indexed").
    pub fn replace_chunks(&self, doc_path: &Path, chunks: &[DocChunk]) -> BeadloomResult<()> {
        let path_str = doc_path.to_string_lossy().to_string();
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM chunks WHERE doc_path = ?1", params![path_str])?;
        for chunk in chunks {
            tx.execute(
                "INSERT INTO chunks (doc_path, chunk_index, heading_path, text, token_estimate)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![path_str, chunk.chunk_index, chunk.heading_path, chunk.text, chunk.token_estimate],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    pub fn chunks_for_doc(&self, doc_path: &Path) -> BeadloomResult<Vec<DocChunk>> {
        let mut stmt = self.conn.prepare(
            "SELECT doc_path, chunk_index, heading_path, text, token_estimate
             FROM chunks WHERE doc_path = ?1 ORDER BY chunk_index",
        )?;
        let rows = stmt.query_map(params![doc_path.to_string_lossy()], Self::row_to_chunk)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(BeadloomError::from)
    }

    pub fn chunks_for_docs(&self, doc_paths: &[PathBuf]) -> BeadloomResult<Vec<DocChunk>> {
        let mut all = Vec::new();
        for path in doc_paths {
            all.extend(self.chunks_for_doc(path)?);
        }
        Ok(all)
    }

    fn row_to_chunk(row: &rusqlite::Row<'_>) -> rusqlite::Result<DocChunk> {
        let path_str: String = row.get(0)?;
        Ok(DocChunk {
            doc_path: PathBuf::from(path_str),
            chunk_index: row.get(1)?,
            heading_path: row.get(2)?,
            text: row.get(3)?,
            token_estimate: row.get(4)?,
        })
    }

    // -----------------------------------------------------------------
    // Code symbols
    // -----------------------------------------------------------------

    /// Replace every symbol for `file_path` (§4.4: "additive per file:
    /// re-indexing a file first removes all rows for that `file_path`").
    pub fn replace_symbols(&self, file_path: &Path, symbols: &[CodeSymbol]) -> BeadloomResult<()> {
        let path_str = file_path.to_string_lossy().to_string();
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM code_symbols WHERE file_path = ?1", params![path_str])?;
        for sym in symbols {
            let annotations_json = serde_json::to_string(&sym.annotations)
                .map_err(|e| BeadloomError::Internal(format!("serializing annotations: {e}")))?;
            tx.execute(
                "INSERT INTO code_symbols
                    (file_path, symbol_name, kind, line_start, line_end, language, annotations)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    path_str,
                    sym.symbol_name,
                    sym.kind.as_str(),
                    sym.line_start,
                    sym.line_end,
                    sym.language.as_str(),
                    annotations_json,
                ],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    pub fn symbols_for_file(&self, file_path: &Path) -> BeadloomResult<Vec<CodeSymbol>> {
        let mut stmt = self.conn.prepare(
            "SELECT file_path, symbol_name, kind, line_start, line_end, language, annotations
             FROM code_symbols WHERE file_path = ?1 ORDER BY line_start",
        )?;
        let rows = stmt.query_map(params![file_path.to_string_lossy()], Self::row_to_symbol)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(BeadloomError::from)
    }

    /// All symbols whose `file_path` starts with `prefix` (used by the
    /// context assembler to collect symbols under a node's `source`).
    pub fn symbols_under_prefix(&self, prefix: &str) -> BeadloomResult<Vec<CodeSymbol>> {
        let like = format!("{}%", prefix.trim_end_matches('/'));
        let mut stmt = self.conn.prepare(
            "SELECT file_path, symbol_name, kind, line_start, line_end, language, annotations
             FROM code_symbols WHERE file_path LIKE ?1 ORDER BY file_path, line_start",
        )?;
        let rows = stmt.query_map(params![like], Self::row_to_symbol)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(BeadloomError::from)
    }

    pub fn delete_symbols_for_file(&self, file_path: &Path) -> BeadloomResult<()> {
        self.conn.execute(
            "DELETE FROM code_symbols WHERE file_path = ?1",
            params![file_path.to_string_lossy()],
        )?;
        Ok(())
    }

    /// Symbols annotated with `key = value` (used by the import resolver's
    /// annotation-lookup strategy, §4.5).
    pub fn symbols_with_annotation(&self, file_path: &Path, key: &str, value: &str) -> BeadloomResult<bool> {
        let symbols = self.symbols_for_file(file_path)?;
        Ok(symbols
            .iter()
            .any(|s| s.annotations.get(key).is_some_and(|v| v == value)))
    }

    fn row_to_symbol(row: &rusqlite::Row<'_>) -> rusqlite::Result<CodeSymbol> {
        let path_str: String = row.get(0)?;
        let kind_str: String = row.get(2)?;
        let lang_str: String = row.get(5)?;
        let annotations_str: String = row.get(6)?;
        let annotations: BTreeMap<String, String> =
            serde_json::from_str(&annotations_str).unwrap_or_default();
        Ok(CodeSymbol {
            file_path: PathBuf::from(path_str),
            symbol_name: row.get(1)?,
            kind: SymbolKind::from_str_lossy(&kind_str),
            line_start: row.get(3)?,
            line_end: row.get(4)?,
            language: parse_language_lossy(&lang_str),
            annotations,
        })
    }

    // -----------------------------------------------------------------
    // Code imports
    // -----------------------------------------------------------------

    pub fn replace_imports(&self, file_path: &Path, imports: &[CodeImport]) -> BeadloomResult<()> {
        let path_str = file_path.to_string_lossy().to_string();
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM code_imports WHERE file_path = ?1", params![path_str])?;
        for imp in imports {
            tx.execute(
                "INSERT INTO code_imports (file_path, line_number, import_path, resolved_ref_id, file_hash)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![path_str, imp.line_number, imp.import_path, imp.resolved_ref_id, imp.file_hash],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    pub fn imports_for_file(&self, file_path: &Path) -> BeadloomResult<Vec<CodeImport>> {
        let mut stmt = self.conn.prepare(
            "SELECT file_path, line_number, import_path, resolved_ref_id, file_hash
             FROM code_imports WHERE file_path = ?1 ORDER BY line_number",
        )?;
        let rows = stmt.query_map(params![file_path.to_string_lossy()], Self::row_to_import)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(BeadloomError::from)
    }

    pub fn all_imports(&self) -> BeadloomResult<Vec<CodeImport>> {
        let mut stmt = self.conn.prepare(
            "SELECT file_path, line_number, import_path, resolved_ref_id, file_hash
             FROM code_imports ORDER BY file_path, line_number",
        )?;
        let rows = stmt.query_map([], Self::row_to_import)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(BeadloomError::from)
    }

    pub fn unresolved_imports(&self) -> BeadloomResult<Vec<CodeImport>> {
        let mut stmt = self.conn.prepare(
            "SELECT file_path, line_number, import_path, resolved_ref_id, file_hash
             FROM code_imports WHERE resolved_ref_id IS NULL ORDER BY file_path, line_number",
        )?;
        let rows = stmt.query_map([], Self::row_to_import)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(BeadloomError::from)
    }

    fn row_to_import(row: &rusqlite::Row<'_>) -> rusqlite::Result<CodeImport> {
        let path_str: String = row.get(0)?;
        Ok(CodeImport {
            file_path: PathBuf::from(path_str),
            line_number: row.get(1)?,
            import_path: row.get(2)?,
            resolved_ref_id: row.get(3)?,
            file_hash: row.get(4)?,
        })
    }

    // -----------------------------------------------------------------
    // File index (incremental reindex bookkeeping)
    // -----------------------------------------------------------------

    pub fn file_index_get(&self, path: &Path) -> BeadloomResult<Option<FileIndexEntry>> {
        self.conn
            .query_row(
                "SELECT path, hash, kind, indexed_at FROM file_index WHERE path = ?1",
                params![path.to_string_lossy()],
                Self::row_to_file_index,
            )
            .optional()
            .map_err(BeadloomError::from)
    }

    pub fn file_index_set(&self, entry: &FileIndexEntry) -> BeadloomResult<()> {
        self.conn.execute(
            "INSERT INTO file_index (path, hash, kind, indexed_at) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(path) DO UPDATE SET hash = excluded.hash, kind = excluded.kind, indexed_at = excluded.indexed_at",
            params![
                entry.path.to_string_lossy(),
                entry.hash,
                entry.kind.as_str(),
                entry.indexed_at
            ],
        )?;
        Ok(())
    }

    pub fn file_index_delete(&self, path: &Path) -> BeadloomResult<()> {
        self.conn
            .execute("DELETE FROM file_index WHERE path = ?1", params![path.to_string_lossy()])?;
        Ok(())
    }

    pub fn file_index_list(&self, kind: Option<FileKind>) -> BeadloomResult<Vec<FileIndexEntry>> {
        let mut stmt;
        let rows_iter;
        match kind {
            Some(k) => {
                stmt = self
                    .conn
                    .prepare("SELECT path, hash, kind, indexed_at FROM file_index WHERE kind = ?1")?;
                rows_iter = stmt.query_map(params![k.as_str()], Self::row_to_file_index)?;
            }
            None => {
                stmt = self.conn.prepare("SELECT path, hash, kind, indexed_at FROM file_index")?;
                rows_iter = stmt.query_map([], Self::row_to_file_index)?;
            }
        }
        rows_iter.collect::<Result<Vec<_>, _>>().map_err(BeadloomError::from)
    }

    fn row_to_file_index(row: &rusqlite::Row<'_>) -> rusqlite::Result<FileIndexEntry> {
        let path_str: String = row.get(0)?;
        let kind_str: String = row.get(2)?;
        Ok(FileIndexEntry {
            path: PathBuf::from(path_str),
            hash: row.get(1)?,
            kind: match kind_str.as_str() {
                "doc" => FileKind::Doc,
                "code" => FileKind::Code,
                _ => FileKind::Graph,
            },
            indexed_at: row.get(3)?,
        })
    }

    // -----------------------------------------------------------------
    // Sync state
    // -----------------------------------------------------------------

    pub fn upsert_sync_state(&self, state: &SyncState) -> BeadloomResult<()> {
        let details_json = state
            .details
            .as_ref()
            .map(|d| d.to_string())
            .unwrap_or_default();
        self.conn.execute(
            "INSERT INTO sync_state
                (ref_id, doc_path, code_path, status, code_hash_at_sync, doc_hash_at_sync, synced_at, reason, details)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT(ref_id, doc_path, code_path) DO UPDATE SET
                status = excluded.status,
                code_hash_at_sync = excluded.code_hash_at_sync,
                doc_hash_at_sync = excluded.doc_hash_at_sync,
                synced_at = excluded.synced_at,
                reason = excluded.reason,
                details = excluded.details",
            params![
                state.ref_id,
                state.doc_path.to_string_lossy(),
                state.code_path,
                state.status.as_str(),
                state.code_hash_at_sync,
                state.doc_hash_at_sync,
                state.synced_at,
                state.reason,
                details_json,
            ],
        )?;
        Ok(())
    }

    pub fn sync_states_for_ref(&self, ref_id: &str) -> BeadloomResult<Vec<SyncState>> {
        let mut stmt = self.conn.prepare(
            "SELECT ref_id, doc_path, code_path, status, code_hash_at_sync, doc_hash_at_sync, synced_at, reason, details
             FROM sync_state WHERE ref_id = ?1",
        )?;
        let rows = stmt.query_map(params![ref_id], Self::row_to_sync_state)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(BeadloomError::from)
    }

    pub fn delete_sync_states_for_ref(&self, ref_id: &str) -> BeadloomResult<()> {
        self.conn
            .execute("DELETE FROM sync_state WHERE ref_id = ?1", params![ref_id])?;
        Ok(())
    }

    /// Delete one `(ref_id, doc_path, code_path)` row, used to prune pairs
    /// that genuinely no longer exist (a doc or code file was removed)
    /// after a recompute, rather than wiping the whole baseline up front.
    pub fn delete_sync_state(&self, ref_id: &str, doc_path: &Path, code_path: &str) -> BeadloomResult<()> {
        self.conn.execute(
            "DELETE FROM sync_state WHERE ref_id = ?1 AND doc_path = ?2 AND code_path = ?3",
            params![ref_id, doc_path.to_string_lossy(), code_path],
        )?;
        Ok(())
    }

    fn row_to_sync_state(row: &rusqlite::Row<'_>) -> rusqlite::Result<SyncState> {
        let doc_path_str: String = row.get(1)?;
        let status_str: String = row.get(3)?;
        let details_str: Option<String> = row.get(8)?;
        Ok(SyncState {
            ref_id: row.get(0)?,
            doc_path: PathBuf::from(doc_path_str),
            code_path: row.get(2)?,
            status: match status_str.as_str() {
                "ok" => SyncStatus::Ok,
                "stale" => SyncStatus::Stale,
                _ => SyncStatus::Unknown,
            },
            code_hash_at_sync: row.get(4)?,
            doc_hash_at_sync: row.get(5)?,
            synced_at: row.get(6)?,
            reason: row.get(7)?,
            details: details_str.and_then(|s| serde_json::from_str(&s).ok()),
        })
    }

    // -----------------------------------------------------------------
    // Rules
    // -----------------------------------------------------------------

    pub fn upsert_rule(&self, name: &str, rule_type: &str, rule_json: &str, enabled: bool) -> BeadloomResult<()> {
        self.conn.execute(
            "INSERT INTO rules (name, rule_type, rule_json, enabled) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(name) DO UPDATE SET rule_type = excluded.rule_type, rule_json = excluded.rule_json, enabled = excluded.enabled",
            params![name, rule_type, rule_json, enabled as i64],
        )?;
        Ok(())
    }

    pub fn clear_rules(&self) -> BeadloomResult<()> {
        self.conn.execute("DELETE FROM rules", [])?;
        Ok(())
    }

    pub fn list_rule_rows(&self) -> BeadloomResult<Vec<(String, String, String, bool)>> {
        let mut stmt = self
            .conn
            .prepare("SELECT name, rule_type, rule_json, enabled FROM rules ORDER BY name")?;
        let rows = stmt.query_map([], |row| {
            let enabled: i64 = row.get(3)?;
            Ok((row.get(0)?, row.get(1)?, row.get(2)?, enabled != 0))
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(BeadloomError::from)
    }

    // -----------------------------------------------------------------
    // Snapshots
    // -----------------------------------------------------------------

    pub fn insert_graph_snapshot(
        &self,
        label: &str,
        created_at: i64,
        nodes: &[Node],
        edges: &[Edge],
        symbols_count: i64,
    ) -> BeadloomResult<i64> {
        let nodes_json = serde_json::to_string(nodes)
            .map_err(|e| BeadloomError::Internal(format!("serializing snapshot nodes: {e}")))?;
        let edges_json = serde_json::to_string(edges)
            .map_err(|e| BeadloomError::Internal(format!("serializing snapshot edges: {e}")))?;
        self.conn.execute(
            "INSERT INTO graph_snapshots (label, created_at, nodes_json, edges_json, symbols_count)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![label, created_at, nodes_json, edges_json, symbols_count],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn get_graph_snapshot(&self, id: i64) -> BeadloomResult<Option<(Vec<Node>, Vec<Edge>)>> {
        let row: Option<(String, String)> = self
            .conn
            .query_row(
                "SELECT nodes_json, edges_json FROM graph_snapshots WHERE id = ?1",
                params![id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        match row {
            Some((nodes_json, edges_json)) => {
                let nodes: Vec<Node> = serde_json::from_str(&nodes_json)
                    .map_err(|e| BeadloomError::Internal(format!("deserializing snapshot nodes: {e}")))?;
                let edges: Vec<Edge> = serde_json::from_str(&edges_json)
                    .map_err(|e| BeadloomError::Internal(format!("deserializing snapshot edges: {e}")))?;
                Ok(Some((nodes, edges)))
            }
            None => Ok(None),
        }
    }

    pub fn insert_health_snapshot(
        &self,
        taken_at: i64,
        nodes_count: i64,
        edges_count: i64,
        docs_count: i64,
        coverage_pct: f64,
        stale_count: i64,
        isolated_count: i64,
    ) -> BeadloomResult<()> {
        self.conn.execute(
            "INSERT INTO health_snapshots
                (taken_at, nodes_count, edges_count, docs_count, coverage_pct, stale_count, isolated_count)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(taken_at) DO UPDATE SET
                nodes_count = excluded.nodes_count,
                edges_count = excluded.edges_count,
                docs_count = excluded.docs_count,
                coverage_pct = excluded.coverage_pct,
                stale_count = excluded.stale_count,
                isolated_count = excluded.isolated_count",
            params![taken_at, nodes_count, edges_count, docs_count, coverage_pct, stale_count, isolated_count],
        )?;
        Ok(())
    }

    // -----------------------------------------------------------------
    // Bundle cache (L2, §4.10)
    // -----------------------------------------------------------------

    pub fn bundle_cache_get(&self, key: &str) -> BeadloomResult<Option<(String, String, i64, i64)>> {
        self.conn
            .query_row(
                "SELECT bundle_json, etag, graph_mtime, docs_mtime FROM bundle_cache WHERE cache_key = ?1",
                params![key],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .optional()
            .map_err(BeadloomError::from)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn bundle_cache_set(
        &self,
        key: &str,
        bundle_json: &str,
        etag: &str,
        graph_mtime: i64,
        docs_mtime: i64,
        created_at: i64,
    ) -> BeadloomResult<()> {
        self.conn.execute(
            "INSERT INTO bundle_cache (cache_key, bundle_json, etag, graph_mtime, docs_mtime, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(cache_key) DO UPDATE SET
                bundle_json = excluded.bundle_json,
                etag = excluded.etag,
                graph_mtime = excluded.graph_mtime,
                docs_mtime = excluded.docs_mtime,
                created_at = excluded.created_at",
            params![key, bundle_json, etag, graph_mtime, docs_mtime, created_at],
        )?;
        Ok(())
    }

    pub fn bundle_cache_clear(&self) -> BeadloomResult<()> {
        self.conn.execute("DELETE FROM bundle_cache", [])?;
        Ok(())
    }

    // -----------------------------------------------------------------
    // Full-text search (§3 FTS index)
    // -----------------------------------------------------------------

    pub fn fts_clear_for_ref(&self, ref_id: &str) -> BeadloomResult<()> {
        self.conn
            .execute("DELETE FROM search_fts WHERE ref_id = ?1", params![ref_id])?;
        Ok(())
    }

    pub fn fts_clear_for_doc(&self, doc_path: &Path) -> BeadloomResult<()> {
        self.conn.execute(
            "DELETE FROM search_fts WHERE doc_path = ?1",
            params![doc_path.to_string_lossy()],
        )?;
        Ok(())
    }

    pub fn fts_clear_all(&self) -> BeadloomResult<()> {
        self.conn.execute("DELETE FROM search_fts", [])?;
        Ok(())
    }

    pub fn fts_index_node(&self, ref_id: &str, kind: &str, text: &str) -> BeadloomResult<()> {
        self.conn.execute(
            "INSERT INTO search_fts (ref_id, doc_path, kind, text) VALUES (?1, NULL, ?2, ?3)",
            params![ref_id, kind, text],
        )?;
        Ok(())
    }

    pub fn fts_index_chunk(&self, ref_id: Option<&str>, doc_path: &Path, text: &str) -> BeadloomResult<()> {
        self.conn.execute(
            "INSERT INTO search_fts (ref_id, doc_path, kind, text) VALUES (?1, ?2, 'chunk', ?3)",
            params![ref_id, doc_path.to_string_lossy(), text],
        )?;
        Ok(())
    }

    pub fn fts_search(&self, query: &str, limit: usize) -> BeadloomResult<Vec<(Option<String>, Option<String>, String)>> {
        let mut stmt = self.conn.prepare(
            "SELECT ref_id, doc_path, kind FROM search_fts WHERE search_fts MATCH ?1 ORDER BY rank LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![query, limit as i64], |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?))
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(BeadloomError::from)
    }

    // -----------------------------------------------------------------
    // Statistics
    // -----------------------------------------------------------------

    pub fn statistics(&self) -> BeadloomResult<Statistics> {
        let count = |sql: &str| -> BeadloomResult<i64> {
            Ok(self.conn.query_row(sql, [], |row| row.get(0))?)
        };
        Ok(Statistics {
            nodes_count: count("SELECT COUNT(*) FROM nodes")?,
            edges_count: count("SELECT COUNT(*) FROM edges")?,
            docs_count: count("SELECT COUNT(*) FROM docs")?,
            chunks_count: count("SELECT COUNT(*) FROM chunks")?,
            symbols_count: count("SELECT COUNT(*) FROM code_symbols")?,
            imports_count: count("SELECT COUNT(*) FROM code_imports")?,
        })
    }
}

/// Summary counts across the store, used for `status`/health snapshots.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct Statistics {
    pub nodes_count: i64,
    pub edges_count: i64,
    pub docs_count: i64,
    pub chunks_count: i64,
    pub symbols_count: i64,
    pub imports_count: i64,
}

/// Helper usable outside this module for deserializing a `NodeExtra`'s
/// `links` field into the public `Link` type (kept here to avoid a public
/// dependency on serde_json plumbing elsewhere).
pub fn links_from_extra(extra: &NodeExtra) -> Vec<Link> {
    extra.links.clone()
}

fn parse_language_lossy(s: &str) -> crate::types::Language {
    use crate::types::Language;
    match s {
        "python" => Language::Python,
        "typescript" => Language::TypeScript,
        "tsx" => Language::Tsx,
        "javascript" => Language::JavaScript,
        "jsx" => Language::Jsx,
        "go" => Language::Go,
        "rust" => Language::Rust,
        "java" => Language::Java,
        "kotlin" => Language::Kotlin,
        "swift" => Language::Swift,
        "c" => Language::C,
        "cpp" => Language::Cpp,
        "objective-c" => Language::ObjectiveC,
        "markdown" => Language::Markdown,
        _ => Language::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_store() -> (tempfile::TempDir, Store) {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open_at(&dir.path().join(".beadloom").join("beadloom.db")).unwrap();
        (dir, store)
    }

    #[test]
    fn open_creates_database_and_schema() {
        let (_dir, store) = test_store();
        assert!(store.check_integrity().unwrap());
        assert_eq!(store.schema_version().unwrap(), SCHEMA_VERSION);
    }

    #[test]
    fn node_round_trip() {
        let (_dir, store) = test_store();
        let node = Node {
            ref_id: "billing".into(),
            kind: NodeKind::Domain,
            summary: "Billing domain".into(),
            source: "src/billing/".into(),
            extra: NodeExtra::default(),
        };
        store.upsert_node(&node).unwrap();
        let fetched = store.get_node("billing").unwrap().unwrap();
        assert_eq!(fetched.ref_id, "billing");
        assert_eq!(fetched.kind, NodeKind::Domain);
        assert_eq!(fetched.source, "src/billing/");
    }

    #[test]
    fn delete_node_cascades_edges_and_sync_state() {
        let (_dir, store) = test_store();
        for ref_id in ["a", "b"] {
            store
                .upsert_node(&Node {
                    ref_id: ref_id.into(),
                    kind: NodeKind::Domain,
                    summary: String::new(),
                    source: String::new(),
                    extra: NodeExtra::default(),
                })
                .unwrap();
        }
        store
            .insert_edge(&Edge {
                src_ref_id: "a".into(),
                dst_ref_id: "b".into(),
                kind: EdgeKind::DependsOn,
            })
            .unwrap();
        store
            .upsert_sync_state(&SyncState {
                ref_id: "a".into(),
                doc_path: PathBuf::from("docs/a.md"),
                code_path: "src/a".into(),
                status: SyncStatus::Ok,
                code_hash_at_sync: Some("h".into()),
                doc_hash_at_sync: Some("h".into()),
                synced_at: Some(0),
                reason: None,
                details: None,
            })
            .unwrap();

        store.delete_node("a").unwrap();

        assert!(store.edges_touching("a").unwrap().is_empty());
        assert!(store.sync_states_for_ref("a").unwrap().is_empty());
    }

    #[test]
    fn drop_volatile_tables_keeps_persistent_ones() {
        let (_dir, store) = test_store();
        store.meta_set("last_reindex_at", "123").unwrap();
        store
            .upsert_node(&Node {
                ref_id: "a".into(),
                kind: NodeKind::Domain,
                summary: String::new(),
                source: String::new(),
                extra: NodeExtra::default(),
            })
            .unwrap();

        store.drop_volatile_tables().unwrap();

        assert!(store.list_nodes().unwrap().is_empty());
        assert_eq!(store.meta_get("last_reindex_at").unwrap().as_deref(), Some("123"));
    }

    #[test]
    fn reload_nodes_and_edges_replaces_prior_graph() {
        let (_dir, store) = test_store();
        store
            .upsert_node(&Node {
                ref_id: "old".into(),
                kind: NodeKind::Domain,
                summary: String::new(),
                source: String::new(),
                extra: NodeExtra::default(),
            })
            .unwrap();
        store
            .upsert_sync_state(&SyncState {
                ref_id: "old".into(),
                doc_path: PathBuf::from("docs/old.md"),
                code_path: "src/old".into(),
                status: SyncStatus::Ok,
                code_hash_at_sync: None,
                doc_hash_at_sync: None,
                synced_at: None,
                reason: None,
                details: None,
            })
            .unwrap();

        let fresh = vec![Node {
            ref_id: "new".into(),
            kind: NodeKind::Domain,
            summary: String::new(),
            source: String::new(),
            extra: NodeExtra::default(),
        }];
        store.reload_nodes_and_edges(&fresh, &[]).unwrap();

        assert!(store.get_node("old").unwrap().is_none());
        assert!(store.get_node("new").unwrap().is_some());
        assert!(store.sync_states_for_ref("old").unwrap().is_empty());
    }

    #[test]
    fn fts_search_finds_indexed_node() {
        let (_dir, store) = test_store();
        store.fts_index_node("billing", "domain", "Billing domain summary text").unwrap();
        let hits = store.fts_search("billing", 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].0.as_deref(), Some("billing"));
    }
}
