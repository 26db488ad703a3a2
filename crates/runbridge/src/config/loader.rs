//! Configuration file loading for runbridge
//!
//! Handles loading and parsing configuration files using the config crate.
//! Sources are layered: embedded defaults, then the user file, then
//! `RUNBRIDGE_*` environment variables.

use std::path::Path;

use config::{Config as ConfigBuilder, Environment, File, FileFormat};

use crate::config::{Config, ConfigError, ENV_PREFIX, EXAMPLE_CONFIG, LanguageId};

impl Config {
    /// Load configuration from a file, layered over the embedded defaults
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::load(Some(path.as_ref()))
    }

    /// Load the embedded defaults, an optional user file and environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::layered(path, environment())
    }

    /// Parse configuration from a TOML string, without defaults or environment
    pub fn parse_toml(content: &str) -> Result<Self, ConfigError> {
        let config = ConfigBuilder::builder()
            .add_source(File::from_str(content, FileFormat::Toml))
            .build()?;

        let config: Config = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn layered(path: Option<&Path>, env: Environment) -> Result<Self, ConfigError> {
        let mut builder =
            ConfigBuilder::builder().add_source(File::from_str(EXAMPLE_CONFIG, FileFormat::Toml));
        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }
        let config: Config = builder.add_source(env).build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    fn validate(&self) -> Result<(), ConfigError> {
        if self.stream.chunk_size == 0 {
            return Err(ConfigError::Invalid(
                "stream.chunk_size must be greater than zero".to_owned(),
            ));
        }
        if self.stream.channel_capacity == 0 {
            return Err(ConfigError::Invalid(
                "stream.channel_capacity must be greater than zero".to_owned(),
            ));
        }

        for (key, lang) in &self.languages {
            let layout = LanguageId::from_key(key)
                .and_then(LanguageId::layout)
                .ok_or_else(|| ConfigError::Invalid(format!("unsupported language '{key}'")))?;

            if lang.name.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "language '{key}' has empty name"
                )));
            }
            if lang.extension.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "language '{key}' has empty extension"
                )));
            }
            if lang.run.command.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "language '{key}' has empty run command"
                )));
            }
            match (&lang.compile, layout.requires_build()) {
                (Some(compile), true) if compile.command.is_empty() => {
                    return Err(ConfigError::Invalid(format!(
                        "language '{key}' has empty compile command"
                    )));
                }
                (None, true) => {
                    return Err(ConfigError::Invalid(format!(
                        "language '{key}' requires a compile command"
                    )));
                }
                (Some(_), false) => {
                    return Err(ConfigError::Invalid(format!(
                        "language '{key}' is interpreted and cannot have a compile command"
                    )));
                }
                _ => {}
            }
        }

        Ok(())
    }
}

fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}
