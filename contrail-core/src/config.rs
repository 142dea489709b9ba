//! Contrail configuration.
//!
//! # Storage layout
//!
//! ```text
//! ~/.contrail/
//!   config.yaml   (optional: defaults apply when absent)
//! ```
//!
//! # API pattern
//!
//! - `load_at(home)`: explicit home; used in tests with `TempDir`
//! - `load()`: derives home from `dirs::home_dir()`, delegates to `_at`

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{io_err, CoreError};

/// Where published bundles are stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum RemoteConfig {
    /// A directory tree (local disk, network mount, synced folder).
    Fs { path: PathBuf },
    /// A bucket-style HTTP object storage API.
    Http {
        base_url: String,
        bucket: String,
        /// Name of the environment variable holding the bearer token.
        #[serde(default = "default_token_env")]
        token_env: String,
    },
}

fn default_token_env() -> String {
    "CONTRAIL_STORE_TOKEN".to_string()
}

/// Root of `~/.contrail/config.yaml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory that holds one context repository per project. A leading
    /// `~` is expanded against the home directory.
    pub context_root: PathBuf,
    /// File extensions counted as transcripts.
    pub transcript_extensions: Vec<String>,
    /// How many code ancestors to visit when looking for inherited context.
    pub ancestor_search_depth: usize,
    pub lock_timeout_ms: u64,
    /// Minimum spacing between two publishes of the same project.
    pub publish_min_interval_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote: Option<RemoteConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            context_root: PathBuf::from("~/.claude/projects"),
            transcript_extensions: vec!["jsonl".to_string()],
            ancestor_search_depth: 100,
            lock_timeout_ms: 10_000,
            publish_min_interval_ms: 2_000,
            remote: None,
        }
    }
}

impl Config {
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    pub fn publish_min_interval(&self) -> Duration {
        Duration::from_millis(self.publish_min_interval_ms)
    }

    /// `context_root` with `~` expanded against `home`.
    pub fn context_root_at(&self, home: &Path) -> PathBuf {
        expand_home(&self.context_root, home)
    }
}

// ---------------------------------------------------------------------------
// Paths
// ---------------------------------------------------------------------------

/// `<home>/.contrail/`
pub fn contrail_dir_at(home: &Path) -> PathBuf {
    home.join(".contrail")
}

/// `<home>/.contrail/config.yaml`: pure, no I/O.
pub fn config_path_at(home: &Path) -> PathBuf {
    contrail_dir_at(home).join("config.yaml")
}

// ---------------------------------------------------------------------------
// Load / save
// ---------------------------------------------------------------------------

/// Load the configuration, falling back to defaults when the file is absent.
///
/// Returns `CoreError::Parse` (with path + line context) if malformed YAML.
pub fn load_at(home: &Path) -> Result<Config, CoreError> {
    let path = config_path_at(home);
    if !path.exists() {
        return Ok(Config::default());
    }
    let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
    if contents.trim().is_empty() {
        return Ok(Config::default());
    }
    serde_yaml::from_str(&contents).map_err(|e| CoreError::Parse { path, source: e })
}

/// `load_at` convenience wrapper.
pub fn load() -> Result<Config, CoreError> {
    load_at(&home()?)
}

/// Atomically save the configuration (`.yaml.tmp` sibling → `rename`).
pub fn save_at(home: &Path, config: &Config) -> Result<(), CoreError> {
    let dir = contrail_dir_at(home);
    std::fs::create_dir_all(&dir).map_err(|e| io_err(&dir, e))?;
    let path = config_path_at(home);
    let tmp = path.with_extension("yaml.tmp");
    let yaml = serde_yaml::to_string(config)?;
    std::fs::write(&tmp, yaml).map_err(|e| io_err(&tmp, e))?;
    std::fs::rename(&tmp, &path).map_err(|e| io_err(&path, e))?;
    Ok(())
}

/// The user's home directory.
pub fn home() -> Result<PathBuf, CoreError> {
    dirs::home_dir().ok_or(CoreError::HomeNotFound)
}

fn expand_home(path: &Path, home: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => home.join(rest),
        Err(_) => path.to_path_buf(),
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
