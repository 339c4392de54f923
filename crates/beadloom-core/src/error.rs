//! Error types for beadloom-core.
//!
//! Uses a hierarchical error enum so callers can pattern-match on the
//! subsystem that failed, the same way `omni-core`'s `OmniError` separates
//! recoverable, degraded, and fatal conditions.

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type for all beadloom-core operations.
#[derive(Debug, Error)]
pub enum BeadloomError {
    // ---- Configuration (fatal to the operation, never partially applied) ----
    /// Malformed YAML graph/rules file.
    #[error("invalid YAML in {path}: {message}")]
    Yaml {
        /// File that failed to parse.
        path: PathBuf,
        /// Human-readable error description.
        message: String,
    },

    /// Malformed TOML config file.
    #[error("invalid TOML in {path}: {message}")]
    Toml {
        /// File that failed to parse.
        path: PathBuf,
        /// Human-readable error description.
        message: String,
    },

    /// A node, edge, or rule referenced a `ref_id`/`kind` outside the closed set,
    /// or duplicated a unique key.
    #[error("configuration error in {path}: {details}")]
    Config {
        /// File the offending definition came from.
        path: PathBuf,
        /// What's wrong with it.
        details: String,
    },

    // ---- Not Found ----
    /// Requested ref_id/doc/rule was not found in the store.
    #[error("no such {entity}: {name}{}", suggestions_suffix(suggestions))]
    NotFound {
        /// What kind of thing was missing (e.g. "node", "rule").
        entity: String,
        /// The name that was looked up.
        name: String,
        /// Edit-distance-ranked candidates, closest first.
        suggestions: Vec<String>,
    },

    // ---- I/O ----
    /// I/O error. Per-file occurrences are logged and skipped by callers;
    /// a failure opening/creating the store database is fatal.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // ---- Constraint / database ----
    /// SQLite error (constraint violation, corruption, etc.).
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Database failed `PRAGMA integrity_check`. Requires a full reindex.
    #[error("database corruption detected: {details}")]
    Corruption {
        /// Diagnostic details.
        details: String,
    },

    // ---- Generic ----
    /// Generic internal error for unexpected conditions.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<serde_yaml::Error> for BeadloomError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Yaml {
            path: PathBuf::new(),
            message: err.to_string(),
        }
    }
}

impl From<toml::de::Error> for BeadloomError {
    fn from(err: toml::de::Error) -> Self {
        Self::Toml {
            path: PathBuf::new(),
            message: err.to_string(),
        }
    }
}

impl BeadloomError {
    /// Build a `NotFound` error, ranking `candidates` by similarity to `name`
    /// and keeping up to 3 above a 0.7 Jaro-Winkler threshold.
    pub fn not_found(entity: &str, name: &str, candidates: &[String]) -> Self {
        let mut ranked: Vec<(f64, &String)> = candidates
            .iter()
            .map(|c| (strsim::jaro_winkler(name, c), c))
            .filter(|(score, _)| *score > 0.7)
            .collect();
        ranked.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        Self::NotFound {
            entity: entity.to_string(),
            name: name.to_string(),
            suggestions: ranked.into_iter().take(3).map(|(_, c)| c.clone()).collect(),
        }
    }

    /// Attach a file path to a `Yaml`/`Toml` error produced via `?` (which
    /// loses the path at the `From` boundary).
    pub fn with_path(mut self, file: &std::path::Path) -> Self {
        match &mut self {
            Self::Yaml { path, .. } | Self::Toml { path, .. } => *path = file.to_path_buf(),
            _ => {}
        }
        self
    }
}

fn suggestions_suffix(suggestions: &[String]) -> String {
    if suggestions.is_empty() {
        String::new()
    } else {
        format!(" (did you mean: {}?)", suggestions.join(", "))
    }
}

/// Convenience type alias for Results in beadloom-core.
pub type BeadloomResult<T> = Result<T, BeadloomError>;
