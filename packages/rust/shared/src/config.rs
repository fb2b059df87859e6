//! Application configuration for Folio.
//!
//! Config lives in `folio.toml` in the working directory (or wherever
//! `--config` points). CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{FolioError, Result};

/// Default configuration file name.
pub const CONFIG_FILE_NAME: &str = "folio.toml";

// ---------------------------------------------------------------------------
// Config structs (matching folio.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Working directory layout.
    #[serde(default)]
    pub paths: PathsConfig,

    /// HTTP settings for the `fetch` filter.
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Document parser flags handed to every chain.
    #[serde(default)]
    pub parser: ParserConfig,
}

/// `[paths]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Base directory every relative path below resolves against.
    #[serde(default = "default_root")]
    pub root: String,

    /// Where bare spec names are looked up.
    #[serde(default = "default_specs_dir")]
    pub specs_dir: String,

    /// Filter definition files (`<id>.toml`).
    #[serde(default = "default_filters_dir")]
    pub filters_dir: String,

    /// Cache of fetched sources.
    #[serde(default = "default_cache_dir")]
    pub cache_dir: String,

    /// Where output filters write artifacts.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            specs_dir: default_specs_dir(),
            filters_dir: default_filters_dir(),
            cache_dir: default_cache_dir(),
            output_dir: default_output_dir(),
        }
    }
}

fn default_root() -> String {
    ".".into()
}
fn default_specs_dir() -> String {
    "specs".into()
}
fn default_filters_dir() -> String {
    "filters".into()
}
fn default_cache_dir() -> String {
    "cache".into()
}
fn default_output_dir() -> String {
    "output".into()
}

/// `[fetch]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// User-Agent header sent with every request.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Per-request timeout.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Maximum redirects followed per request.
    #[serde(default = "default_redirect_limit")]
    pub redirect_limit: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            timeout_secs: default_timeout_secs(),
            redirect_limit: default_redirect_limit(),
        }
    }
}

fn default_user_agent() -> String {
    concat!("Folio/", env!("CARGO_PKG_VERSION")).into()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_redirect_limit() -> usize {
    5
}

/// `[parser]` section.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ParserConfig {
    /// Decode character references while parsing. When `false`, references
    /// are kept verbatim for a later `unescape` filter.
    #[serde(default = "default_true")]
    pub decode_entities: bool,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            decode_entities: true,
        }
    }
}

fn default_true() -> bool {
    true
}

// ---------------------------------------------------------------------------
// Resolved paths (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Absolute-or-root-relative directories used during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paths {
    pub root: PathBuf,
    pub specs_dir: PathBuf,
    pub filters_dir: PathBuf,
    pub cache_dir: PathBuf,
    pub output_dir: PathBuf,
}

impl Paths {
    /// Resolve the configured directories against `root`.
    pub fn resolve(config: &PathsConfig, root: &Path) -> Self {
        let join = |p: &str| {
            let p = Path::new(p);
            if p.is_absolute() {
                p.to_path_buf()
            } else {
                root.join(p)
            }
        };

        Self {
            root: root.to_path_buf(),
            specs_dir: join(&config.specs_dir),
            filters_dir: join(&config.filters_dir),
            cache_dir: join(&config.cache_dir),
            output_dir: join(&config.output_dir),
        }
    }
}

impl From<&AppConfig> for Paths {
    fn from(config: &AppConfig) -> Self {
        Self::resolve(&config.paths, Path::new(&config.paths.root))
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Load `folio.toml` from the working directory. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = PathBuf::from(CONFIG_FILE_NAME);

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| FolioError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| FolioError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Write a default config file to `path`, refusing to overwrite an existing one.
pub fn init_config(path: &Path) -> Result<()> {
    if path.exists() {
        return Err(FolioError::config(format!(
            "{} already exists",
            path.display()
        )));
    }

    let content = toml::to_string_pretty(&AppConfig::default())
        .map_err(|e| FolioError::config(e.to_string()))?;

    std::fs::write(path, content).map_err(|e| FolioError::io(path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("cache_dir"));
        assert!(toml_str.contains("decode_entities"));
    }

    #[test]
    fn partial_config_fills_defaults() {
        let toml_str = r#"
[paths]
output_dir = "/tmp/books"

[fetch]
timeout_secs = 5
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.paths.output_dir, "/tmp/books");
        assert_eq!(config.paths.cache_dir, "cache");
        assert_eq!(config.fetch.timeout_secs, 5);
        assert_eq!(config.fetch.redirect_limit, 5);
        assert!(config.parser.decode_entities);
    }

    #[test]
    fn paths_resolve_against_root() {
        let mut config = PathsConfig::default();
        config.output_dir = "/srv/out".into();

        let paths = Paths::resolve(&config, Path::new("/work"));
        assert_eq!(paths.cache_dir, PathBuf::from("/work/cache"));
        assert_eq!(paths.filters_dir, PathBuf::from("/work/filters"));
        assert_eq!(paths.output_dir, PathBuf::from("/srv/out"));
    }

    #[test]
    fn init_refuses_to_overwrite() {
        let dir = std::env::temp_dir().join(format!("folio-config-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(CONFIG_FILE_NAME);

        init_config(&path).unwrap();
        let loaded = load_config_from(&path).unwrap();
        assert_eq!(loaded.paths.specs_dir, "specs");

        let err = init_config(&path).unwrap_err();
        assert!(err.is_config());

        let _ = std::fs::remove_dir_all(&dir);
    }
}
