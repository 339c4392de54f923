//! Configuration loading and validation.
//!
//! Configuration is resolved with the following precedence (highest wins),
//! mirroring `omni-core::config::Config::load`:
//!
//! 1. Environment variables (`BEADLOOM_*`)
//! 2. Project config (`<project_root>/.beadloom/config.yml`)
//! 3. User config (`~/.config/beadloom/config.toml`)
//! 4. Compiled-in defaults

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{BeadloomError, BeadloomResult};

/// The on-disk name of the project's configuration directory (§6).
pub const CONFIG_DIR: &str = ".beadloom";
/// The SQLite store filename under the config directory.
pub const STORE_FILE: &str = "beadloom.db";

/// Top-level configuration for Beadloom (§6 Config file).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Project root path being indexed.
    pub project_root: PathBuf,

    /// Source roots to scan for code (default `["src", "lib", "app"]`).
    #[serde(default = "Config::default_scan_paths")]
    pub scan_paths: Vec<String>,

    /// Docs root, relative to `project_root` (default `"docs"`).
    #[serde(default = "Config::default_docs_dir")]
    pub docs_dir: String,

    /// MCP-layer settings (consumed by the out-of-scope RPC server; carried
    /// here because it is part of the documented config surface, §6).
    #[serde(default)]
    pub mcp: McpConfig,

    /// Docs-audit settings (consumed by the out-of-scope doc-audit tool).
    #[serde(default)]
    pub docs_audit: DocsAuditConfig,

    /// Import resolver aliasing (§4.5).
    #[serde(default)]
    pub import_aliases: ImportAliasConfig,

    /// Context assembler tuning defaults (§4.9).
    #[serde(default)]
    pub context: ContextConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpConfig {
    #[serde(default = "McpConfig::default_auto_reindex")]
    pub auto_reindex: bool,
}

impl Default for McpConfig {
    fn default() -> Self {
        Self {
            auto_reindex: Self::default_auto_reindex(),
        }
    }
}

impl McpConfig {
    fn default_auto_reindex() -> bool {
        true
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocsAuditConfig {
    #[serde(default)]
    pub exclude_paths: Vec<String>,
}

/// Import path aliases (§4.5 Import Resolver). Default aliases match the
/// teacher's TS path-alias convention (`@/`, `~/` -> `src/`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportAliasConfig {
    #[serde(default = "ImportAliasConfig::default_aliases")]
    pub aliases: Vec<(String, String)>,
}

impl Default for ImportAliasConfig {
    fn default() -> Self {
        Self {
            aliases: Self::default_aliases(),
        }
    }
}

impl ImportAliasConfig {
    fn default_aliases() -> Vec<(String, String)> {
        vec![
            ("@/".to_string(), "src/".to_string()),
            ("~/".to_string(), "src/".to_string()),
        ]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    #[serde(default = "ContextConfig::default_depth")]
    pub depth: usize,
    #[serde(default = "ContextConfig::default_max_nodes")]
    pub max_nodes: usize,
    #[serde(default = "ContextConfig::default_max_chunks")]
    pub max_chunks: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            depth: Self::default_depth(),
            max_nodes: Self::default_max_nodes(),
            max_chunks: Self::default_max_chunks(),
        }
    }
}

impl ContextConfig {
    fn default_depth() -> usize {
        2
    }
    fn default_max_nodes() -> usize {
        20
    }
    fn default_max_chunks() -> usize {
        10
    }
}

impl Config {
    fn default_scan_paths() -> Vec<String> {
        vec!["src".to_string(), "lib".to_string(), "app".to_string()]
    }

    fn default_docs_dir() -> String {
        "docs".to_string()
    }

    /// Create a default configuration for the given project root.
    pub fn defaults(project_root: &Path) -> Self {
        Self {
            project_root: project_root.to_path_buf(),
            scan_paths: Self::default_scan_paths(),
            docs_dir: Self::default_docs_dir(),
            mcp: McpConfig::default(),
            docs_audit: DocsAuditConfig::default(),
            import_aliases: ImportAliasConfig::default(),
            context: ContextConfig::default(),
        }
    }

    /// Load configuration from defaults, then overlay user config, then
    /// project config, then environment overrides.
    pub fn load(project_root: &Path) -> BeadloomResult<Self> {
        let mut config = Self::defaults(project_root);

        if let Some(user_config_dir) = dirs::config_dir() {
            let user_config_path = user_config_dir.join("beadloom").join("config.toml");
            if user_config_path.exists() {
                config.merge_from_toml(&user_config_path)?;
            }
        }

        let project_config_path = project_root.join(CONFIG_DIR).join("config.yml");
        if project_config_path.exists() {
            config.merge_from_yaml(&project_config_path)?;
        }

        config.apply_env_overrides();

        Ok(config)
    }

    /// The `.beadloom` config directory for this project.
    pub fn config_dir(&self) -> PathBuf {
        self.project_root.join(CONFIG_DIR)
    }

    /// The `_graph` directory holding graph YAML + `rules.yml`.
    pub fn graph_dir(&self) -> PathBuf {
        self.config_dir().join("_graph")
    }

    /// Path to the `rules.yml` file, if it exists.
    pub fn rules_path(&self) -> PathBuf {
        self.graph_dir().join("rules.yml")
    }

    /// Path to the SQLite store database.
    pub fn store_path(&self) -> PathBuf {
        self.config_dir().join(STORE_FILE)
    }

    /// Absolute path to the docs root.
    pub fn docs_path(&self) -> PathBuf {
        self.project_root.join(&self.docs_dir)
    }

    /// Absolute paths of all configured scan roots that exist on disk.
    pub fn scan_root_paths(&self) -> Vec<PathBuf> {
        self.scan_paths
            .iter()
            .map(|p| self.project_root.join(p))
            .filter(|p| p.exists())
            .collect()
    }

    fn merge_from_toml(&mut self, path: &Path) -> BeadloomResult<()> {
        let content = std::fs::read_to_string(path)?;
        let overlay: ConfigOverlay =
            toml::from_str(&content).map_err(|e| BeadloomError::Toml {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        overlay.apply(self);
        Ok(())
    }

    fn merge_from_yaml(&mut self, path: &Path) -> BeadloomResult<()> {
        let content = std::fs::read_to_string(path)?;
        let overlay: ConfigOverlay =
            serde_yaml::from_str(&content).map_err(|e| BeadloomError::Yaml {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        overlay.apply(self);
        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(docs_dir) = std::env::var("BEADLOOM_DOCS_DIR") {
            self.docs_dir = docs_dir;
        }
        if let Ok(scan_paths) = std::env::var("BEADLOOM_SCAN_PATHS") {
            self.scan_paths = scan_paths.split(',').map(|s| s.trim().to_string()).collect();
        }
        if let Ok(auto) = std::env::var("BEADLOOM_MCP_AUTO_REINDEX") {
            self.mcp.auto_reindex = auto == "1" || auto.eq_ignore_ascii_case("true");
        }
    }
}

/// A partial config overlay: every field optional, only present fields
/// override the base configuration (non-destructive overlay, same
/// discipline as `omni-core::Config::merge_from_file`).
#[derive(Debug, Default, Deserialize)]
struct ConfigOverlay {
    scan_paths: Option<Vec<String>>,
    docs_dir: Option<String>,
    mcp: Option<McpConfigOverlay>,
    docs_audit: Option<DocsAuditConfig>,
    context: Option<ContextConfig>,
}

#[derive(Debug, Default, Deserialize)]
struct McpConfigOverlay {
    auto_reindex: Option<bool>,
}

impl ConfigOverlay {
    fn apply(self, config: &mut Config) {
        if let Some(v) = self.scan_paths {
            config.scan_paths = v;
        }
        if let Some(v) = self.docs_dir {
            config.docs_dir = v;
        }
        if let Some(mcp) = self.mcp {
            if let Some(auto) = mcp.auto_reindex {
                config.mcp.auto_reindex = auto;
            }
        }
        if let Some(v) = self.docs_audit {
            config.docs_audit = v;
        }
        if let Some(v) = self.context {
            config.context = v;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let config = Config::defaults(Path::new("/tmp/test-project"));
        assert_eq!(config.scan_paths, vec!["src", "lib", "app"]);
        assert_eq!(config.docs_dir, "docs");
        assert!(config.mcp.auto_reindex);
        assert_eq!(config.context.depth, 2);
        assert_eq!(config.context.max_nodes, 20);
        assert_eq!(config.context.max_chunks, 10);
    }

    #[test]
    fn project_yaml_overlay_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg_dir = dir.path().join(CONFIG_DIR);
        std::fs::create_dir_all(&cfg_dir).unwrap();
        std::fs::write(
            cfg_dir.join("config.yml"),
            "scan_paths: [\"source\"]\nmcp:\n  auto_reindex: false\n",
        )
        .unwrap();

        let config = Config::load(dir.path()).unwrap();
        assert_eq!(config.scan_paths, vec!["source"]);
        assert!(!config.mcp.auto_reindex);
        assert_eq!(config.docs_dir, "docs"); // untouched field keeps default
    }
}
