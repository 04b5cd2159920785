use anyhow::{Context, Result};
use confyg::{env, Confygery};
use serde::{Deserialize, Serialize};
use sonority_search::builder::{DEFAULT_CHUNK_SIZE, DEFAULT_TREE_COUNT};
use sonority_search::BuildOptions;
use std::path::{Path, PathBuf};

/// Keys accepted by `sonority config set`.
pub const SETTABLE_KEYS: [&str; 6] = [
    "model_dir",
    "catalog_path",
    "tree_count",
    "chunk_size",
    "seed",
    "default_count",
];

/// Configuration for sonority.
///
/// Configuration is loaded from multiple sources with the following priority:
/// 1. CLI arguments (highest priority)
/// 2. Environment variables (SONORITY_* prefix)
/// 3. Config file (~/.config/sonority/config.toml)
/// 4. Built-in defaults (lowest priority)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding the model artifacts.
    ///
    /// Can be set via:
    /// - CLI: --model-dir /path/to/model
    /// - ENV: SONORITY_MODEL_DIR
    /// - Config: model_dir = "/path/to/model"
    /// - Default: ~/.local/share/sonority/model
    #[serde(default = "default_model_dir")]
    pub model_dir: PathBuf,

    /// Path to the SQLite song catalog.
    ///
    /// Can be set via:
    /// - CLI: --catalog /path/to/catalog.db
    /// - ENV: SONORITY_CATALOG_PATH
    /// - Config: catalog_path = "/path/to/catalog.db"
    /// - Default: ~/.local/share/sonority/catalog.db
    #[serde(default = "default_catalog_path")]
    pub catalog_path: PathBuf,

    /// Trees in the index forest.
    #[serde(default = "default_tree_count")]
    pub tree_count: usize,

    /// Dataset rows processed per chunk during a build.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Fixed build seed. Unset means a fresh random seed per build.
    #[serde(default)]
    pub seed: Option<u64>,

    /// Recommendations returned when a request gives no count.
    #[serde(default = "default_count")]
    pub default_count: usize,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Log output settings, applied by the CLI at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// One of trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_true")]
    pub coloured: bool,

    /// Include the source file and line of each log call.
    #[serde(default)]
    pub report_caller: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            coloured: true,
            report_caller: false,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model_dir: default_model_dir(),
            catalog_path: default_catalog_path(),
            tree_count: default_tree_count(),
            chunk_size: default_chunk_size(),
            seed: None,
            default_count: default_count(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from file and environment variables.
    ///
    /// Searches for config file at: ~/.config/sonority/config.toml
    /// Reads environment variables with SONORITY_ prefix.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed.
    pub fn load() -> Result<Self> {
        Self::load_from(&config_file_path())
    }

    /// Load configuration from a specific file plus the environment.
    ///
    /// A missing file is not an error.
    pub fn load_from(config_path: &Path) -> Result<Self> {
        let mut builder = Confygery::new().context("Failed to create config builder")?;

        if config_path.exists() {
            let path_str = config_path
                .to_str()
                .ok_or_else(|| anyhow::anyhow!("Config path contains invalid UTF-8"))?;
            builder
                .add_file(path_str)
                .context("Failed to load config file")?;
        }

        let env_opts = env::Options::with_top_level("sonority");
        builder
            .add_env(env_opts)
            .context("Failed to load environment variables")?;

        let config: Self = builder
            .build()
            .context("Failed to build configuration")?;

        Ok(config)
    }

    /// Build options derived from this configuration.
    #[must_use]
    pub fn build_options(&self) -> BuildOptions {
        let options = BuildOptions::default()
            .with_tree_count(self.tree_count)
            .with_chunk_size(self.chunk_size);
        match self.seed {
            Some(seed) => options.with_seed(seed),
            None => options,
        }
    }
}

/// Get the default model directory.
///
/// Returns: ~/.local/share/sonority/model (or platform equivalent)
fn default_model_dir() -> PathBuf {
    data_dir().join("model")
}

/// Get the default catalog path.
///
/// Returns: ~/.local/share/sonority/catalog.db (or platform equivalent)
fn default_catalog_path() -> PathBuf {
    data_dir().join("catalog.db")
}

fn data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("sonority")
}

const fn default_tree_count() -> usize {
    DEFAULT_TREE_COUNT
}

const fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

const fn default_count() -> usize {
    10
}

fn default_log_level() -> String {
    "info".to_string()
}

const fn default_true() -> bool {
    true
}

/// Get the config file path.
///
/// Returns:
/// - Linux: ~/.config/sonority/config.toml
/// - macOS: ~/Library/Application Support/sonority/config.toml
/// - Windows: %APPDATA%\sonority\config.toml
pub fn config_file_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("sonority")
        .join("config.toml")
}

/// Get the example config file content.
pub fn example_config() -> &'static str {
    r#"# Sonority Configuration File
#
# Configuration is loaded from multiple sources with the following priority:
# 1. CLI arguments (highest priority)
# 2. Environment variables (SONORITY_* prefix)
# 3. This config file
# 4. Built-in defaults (lowest priority)

# Directory holding the built model (content.ann, metadata.bin,
# scaler.json, manifest.json)
#
# Can also be set via:
# - CLI: sonority --model-dir /custom/model recommend ...
# - Environment: SONORITY_MODEL_DIR=/custom/model
#
# Default: Platform-specific data directory
#model_dir = "/path/to/model"

# Path to the SQLite song catalog used for names and search
#
# Default: Platform-specific data directory
#catalog_path = "/path/to/catalog.db"

# Trees in the index forest. More trees improve recall at the cost of
# build time and memory.
tree_count = 50

# Dataset rows processed per chunk during a build
chunk_size = 1000

# Fixed seed for reproducible builds. Leave unset for a random seed.
#seed = 42

# Recommendations returned when no count is given
default_count = 10

[logging]
coloured = true
level = "info"
report_caller = false
"#
}

/// Create default config file if it doesn't exist.
///
/// Returns true if a new file was created, false if it already existed.
pub fn ensure_config_file() -> Result<bool> {
    ensure_config_file_at(&config_file_path())
}

fn ensure_config_file_at(config_path: &Path) -> Result<bool> {
    if config_path.exists() {
        return Ok(false);
    }

    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create config directory")?;
    }

    std::fs::write(config_path, example_config()).context("Failed to write config file")?;

    Ok(true)
}

/// Set one top-level key in a config file, keeping its comments and layout.
///
/// Numeric keys are written as integers; path keys as strings.
pub fn set_value(config_path: &Path, key: &str, value: &str) -> Result<()> {
    if !SETTABLE_KEYS.contains(&key) {
        anyhow::bail!(
            "Unknown config key: {key}. Valid keys: {}",
            SETTABLE_KEYS.join(", ")
        );
    }

    let contents = if config_path.exists() {
        std::fs::read_to_string(config_path).context("Failed to read config file")?
    } else {
        String::new()
    };
    let mut doc = contents
        .parse::<toml_edit::DocumentMut>()
        .context("Failed to parse config file")?;

    match key {
        "model_dir" | "catalog_path" => {
            doc[key] = toml_edit::value(value);
        }
        _ => {
            let number: i64 = value
                .parse()
                .with_context(|| format!("{key} must be a non-negative integer, got {value:?}"))?;
            if number < 0 || (key != "seed" && number == 0) {
                anyhow::bail!("{key} must be positive, got {number}");
            }
            doc[key] = toml_edit::value(number);
        }
    }

    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create config directory")?;
    }
    std::fs::write(config_path, doc.to_string()).context("Failed to write config file")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(!config.model_dir.as_os_str().is_empty());
        assert!(config.catalog_path.ends_with("catalog.db"));
        assert_eq!(config.tree_count, 50);
        assert_eq!(config.chunk_size, 1000);
        assert_eq!(config.default_count, 10);
        assert!(config.seed.is_none());
    }

    #[test]
    fn test_config_load() {
        // Should not fail even if config file doesn't exist
        let result = Config::load();
        assert!(result.is_ok());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "tree_count = 12\nseed = 7\nmodel_dir = \"/tmp/m\"\n").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.tree_count, 12);
        assert_eq!(config.seed, Some(7));
        assert_eq!(config.model_dir, PathBuf::from("/tmp/m"));
        assert_eq!(config.chunk_size, 1000);
    }

    #[test]
    fn test_build_options() {
        let config = Config {
            tree_count: 8,
            chunk_size: 64,
            seed: Some(3),
            ..Config::default()
        };
        let options = config.build_options();
        assert_eq!(options.tree_count, 8);
        assert_eq!(options.chunk_size, 64);
        assert_eq!(options.seed, Some(3));
    }

    #[test]
    fn test_ensure_config_file_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        assert!(ensure_config_file_at(&path).unwrap());
        assert!(!ensure_config_file_at(&path).unwrap());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), example_config());
    }

    #[test]
    fn test_example_config_parses() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, example_config()).unwrap();
        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.tree_count, 50);
        assert_eq!(config.logging, LoggingConfig::default());
    }

    #[test]
    fn test_set_value_keeps_comments() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "# trees\ntree_count = 50\n").unwrap();

        set_value(&path, "tree_count", "80").unwrap();
        set_value(&path, "model_dir", "/srv/model").unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("# trees"));
        assert!(written.contains("tree_count = 80"));
        assert!(written.contains("model_dir = \"/srv/model\""));
    }

    #[test]
    fn test_set_value_rejects_bad_input() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        assert!(set_value(&path, "colour", "red").is_err());
        assert!(set_value(&path, "tree_count", "many").is_err());
        assert!(set_value(&path, "chunk_size", "0").is_err());
        assert!(set_value(&path, "seed", "0").is_ok());
    }
}
