//! Configuration loaded from `~/.config/subgloss/config.toml`.
//!
//! Every section is optional; a missing file means defaults throughout.
//!
//! ```toml
//! [dictionary]
//! base_url = "http://localhost:8000"
//! partial_limit = 5
//!
//! [cache]
//! capacity = 4096
//! ttl_secs = 0
//!
//! [analyzer]
//! command = "kuromoji-json"
//!
//! [converter]
//! command = "furigana-html"
//!
//! [pipeline]
//! word_source = "analyzer"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Top-level configuration file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub dictionary: DictionaryConfig,
    pub cache: CacheConfig,
    pub analyzer: CommandConfig,
    pub converter: CommandConfig,
    pub pipeline: PipelineConfig,
    pub playback: PlaybackConfig,
}

/// Dictionary HTTP service
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DictionaryConfig {
    /// Service root; endpoint templates are resolved against it
    pub base_url: String,
    /// Inflected search, `{query}` is the URL-encoded word
    pub inflected: String,
    /// Direct search
    pub direct: String,
    /// Partial search, `{limit}` is [`Self::partial_limit`]
    pub partial: String,
    pub partial_limit: usize,
    pub timeout_secs: u64,
}

impl Default for DictionaryConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            inflected: "/api/search/inflected?query={query}".to_string(),
            direct: "/api/search?query={query}".to_string(),
            partial: "/api/search/partial?query={query}&limit={limit}".to_string(),
            partial_limit: crate::dictionary::DEFAULT_PARTIAL_LIMIT,
            timeout_secs: 10,
        }
    }
}

impl DictionaryConfig {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Gloss cache bounds
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub capacity: usize,
    /// Entry lifetime in seconds, 0 for none
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: crate::dictionary::cache::DEFAULT_CAPACITY,
            ttl_secs: 0,
        }
    }
}

impl CacheConfig {
    #[must_use]
    pub fn ttl(&self) -> Option<Duration> {
        (self.ttl_secs > 0).then(|| Duration::from_secs(self.ttl_secs))
    }
}

/// External helper program (analyzer or reading converter)
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CommandConfig {
    /// Program name or path; `None` disables the helper
    pub command: Option<String>,
    pub args: Vec<String>,
    pub timeout_secs: u64,
}

impl Default for CommandConfig {
    fn default() -> Self {
        Self {
            command: None,
            args: Vec::new(),
            timeout_secs: 10,
        }
    }
}

impl CommandConfig {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Where annotated words come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WordSource {
    /// Fresh tokenization by the morphological analyzer
    #[default]
    Analyzer,
    /// Base texts of the converter's reading elements, one per surface form
    ReadingTree,
}

/// Annotation pass settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub word_source: WordSource,
    /// Joins reading and meaning in the popup text
    pub popup_separator: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            word_source: WordSource::default(),
            popup_separator: " - ".to_string(),
        }
    }
}

/// Playback clock settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Interval between simulated time updates
    pub tick_ms: u64,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self { tick_ms: 250 }
    }
}

impl Config {
    /// Load from `path`, or from the default location when `None`.
    ///
    /// A missing file yields defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path.map_or_else(config_path, Path::to_path_buf);
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;

        Self::parse(&content).with_context(|| format!("invalid TOML in {}", path.display()))
    }

    /// Parse configuration text
    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }
}

/// Return the path to the default config file.
#[must_use]
pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("subgloss")
        .join("config.toml")
}
