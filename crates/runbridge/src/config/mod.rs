use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;

use serde::Deserialize;
use thiserror::Error;

pub use crate::config::language::{
    CompileConfig, FileExtension, Language, LanguageId, Placeholders, RunConfig, WorkspaceLayout,
};

pub mod language;
mod loader;

/// Example configuration embedded at compile time.
///
/// Always loaded as the lowest-precedence source, so a user file only needs
/// to contain the values it changes.
pub const EXAMPLE_CONFIG: &str = include_str!("../../runbridge.example.toml");

/// Prefix of environment variables that override configuration values
pub const ENV_PREFIX: &str = "RUNBRIDGE";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid characters in file extension")]
    InvalidFileExtChars,

    #[error("failed to parse config: {0}")]
    Parse(#[from] config::ConfigError),

    #[error("language '{0}' not found in configuration")]
    LanguageNotFound(String),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Config for runbridge
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Address the server listens on
    #[serde(default = "default_bind")]
    pub bind: SocketAddr,

    /// Directory in which per-request workspaces are created
    /// (the OS temp directory if not specified).
    #[serde(default)]
    pub scratch_dir: Option<PathBuf>,

    /// Output streaming settings
    #[serde(default)]
    pub stream: StreamConfig,

    /// Settings for the code review assistant endpoint
    #[serde(default)]
    pub analyze: AnalyzeConfig,

    /// Language configurations keyed by language table key
    #[serde(default)]
    pub languages: HashMap<String, Language>,
}

/// Result of looking up a client-supplied language name
#[derive(Debug, Clone, Copy)]
pub enum Resolution<'a> {
    /// The language runs through a server-side pipeline
    Pipeline(LanguageId, &'a Language),
    /// The language is handled entirely by the client
    ClientSide(LanguageId),
    /// Not a supported language, or its table was removed from configuration
    Unknown,
}

impl Config {
    /// Create a new config with embedded default languages
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty config with no languages
    pub fn empty() -> Self {
        Self {
            bind: default_bind(),
            scratch_dir: None,
            stream: StreamConfig::default(),
            analyze: AnalyzeConfig::default(),
            languages: HashMap::new(),
        }
    }

    /// Get a language by ID
    pub fn get_language(&self, id: LanguageId) -> Result<&Language, ConfigError> {
        self.languages
            .get(id.key())
            .ok_or_else(|| ConfigError::LanguageNotFound(id.key().to_string()))
    }

    /// Resolve a client-supplied language name (aliases, any case) to its pipeline
    pub fn resolve(&self, name: &str) -> Resolution<'_> {
        let Ok(id) = name.parse::<LanguageId>() else {
            return Resolution::Unknown;
        };
        if id.layout().is_none() {
            return Resolution::ClientSide(id);
        }
        match self.languages.get(id.key()) {
            Some(language) => Resolution::Pipeline(id, language),
            None => Resolution::Unknown,
        }
    }

    /// Directory under which workspaces are allocated
    pub fn scratch_dir(&self) -> PathBuf {
        self.scratch_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::parse_toml(EXAMPLE_CONFIG).expect("embedded default config should be valid")
    }
}

/// Output streaming settings
#[derive(Debug, Clone, Deserialize)]
pub struct StreamConfig {
    /// Maximum bytes read from the process per output frame
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Capacity of the queues between a session and its transport
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

/// Settings for the code review assistant
#[derive(Clone, Deserialize)]
pub struct AnalyzeConfig {
    /// Credential for the text-generation API
    #[serde(default)]
    pub api_key: Option<String>,

    /// Model name used for suggestions
    #[serde(default = "default_model")]
    pub model: String,

    /// Base URL of the text-generation API
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

impl Default for AnalyzeConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_model(),
            base_url: default_base_url(),
        }
    }
}

impl fmt::Debug for AnalyzeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalyzeConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .finish()
    }
}

fn default_bind() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8000))
}

fn default_chunk_size() -> usize {
    1024
}

fn default_channel_capacity() -> usize {
    64
}

fn default_model() -> String {
    "gemini-2.5-flash".to_owned()
}

fn default_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_owned()
}
