use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, de};

use crate::config::ConfigError;

const INVALID_FILE_EXT_CHARS: [char; 2] = ['/', '.'];

/// Supported language identifiers
///
/// The set is closed: every command the service can ever launch is reachable
/// from one of these variants and its configured [`Language`] table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LanguageId {
    Python,
    C,
    Cpp,
    Java,
    JavaScript,
    /// Rendered by the client; never executed on the server
    Html,
}

impl LanguageId {
    /// All identifiers, in display order
    pub const ALL: [LanguageId; 6] = [
        LanguageId::Python,
        LanguageId::C,
        LanguageId::Cpp,
        LanguageId::Java,
        LanguageId::JavaScript,
        LanguageId::Html,
    ];

    /// Key of this language's table in the configuration file
    pub fn key(self) -> &'static str {
        match self {
            LanguageId::Python => "python",
            LanguageId::C => "c",
            LanguageId::Cpp => "cpp",
            LanguageId::Java => "java",
            LanguageId::JavaScript => "javascript",
            LanguageId::Html => "html",
        }
    }

    /// Workspace shape required by this language's toolchain
    ///
    /// Returns `None` for languages that are never executed server-side.
    pub fn layout(self) -> Option<WorkspaceLayout> {
        match self {
            LanguageId::Python | LanguageId::JavaScript => Some(WorkspaceLayout::SingleFile),
            LanguageId::C | LanguageId::Cpp => Some(WorkspaceLayout::FileWithBinary),
            LanguageId::Java => Some(WorkspaceLayout::Directory),
            LanguageId::Html => None,
        }
    }

    /// Whether the source file name is derived from the entry point declared in the source
    pub fn derives_entry_point(self) -> bool {
        matches!(self, LanguageId::Java)
    }

    /// Look up an identifier from the table key used in configuration files
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|id| id.key() == key)
    }
}

impl FromStr for LanguageId {
    type Err = ConfigError;

    /// Parse a client-supplied language name, case-insensitively, folding aliases
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "python" => Ok(LanguageId::Python),
            "c" => Ok(LanguageId::C),
            "cpp" | "c++" => Ok(LanguageId::Cpp),
            "java" => Ok(LanguageId::Java),
            "js" | "javascript" => Ok(LanguageId::JavaScript),
            "html" => Ok(LanguageId::Html),
            _ => Err(ConfigError::LanguageNotFound(s.to_owned())),
        }
    }
}

impl fmt::Display for LanguageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Shape of the scratch location allocated for one execution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkspaceLayout {
    /// One source file, run directly by an interpreter
    SingleFile,
    /// A source file plus the native binary compiled from it
    FileWithBinary,
    /// A dedicated directory; the toolchain picks file names from the source
    Directory,
}

impl WorkspaceLayout {
    /// Whether programs in this layout go through a build step
    pub fn requires_build(self) -> bool {
        !matches!(self, WorkspaceLayout::SingleFile)
    }
}

/// Configuration for a programming language
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Language {
    /// Human-readable name for the language (e.g., "C++ (GCC)")
    pub name: String,

    /// File extension
    pub extension: FileExtension,

    /// Compilation configuration (None for interpreted languages)
    #[serde(default)]
    pub compile: Option<CompileConfig>,

    /// Execution configuration
    pub run: RunConfig,
}

impl Language {
    /// Check if the language is compiled
    pub fn is_compiled(&self) -> bool {
        self.compile.is_some()
    }

    /// Expand placeholders in the given command
    pub fn expand_command(command: &[String], values: &Placeholders<'_>) -> Vec<String> {
        command
            .iter()
            .map(|arg| {
                arg.replace("{source}", values.source)
                    .replace("{binary}", values.binary)
                    .replace("{entry}", values.entry)
            })
            .collect()
    }
}

/// Values substituted into command templates
#[derive(Debug, Clone, Copy)]
pub struct Placeholders<'a> {
    /// `{source}`: the source file handed to the toolchain
    pub source: &'a str,
    /// `{binary}`: the compiled artifact
    pub binary: &'a str,
    /// `{entry}`: the entry point name derived from the source
    pub entry: &'a str,
}

/// File extension without dot (e.g., "cpp")
#[derive(Debug, Clone, Serialize)]
pub struct FileExtension(String);

impl FileExtension {
    pub fn new(extension: &str) -> Result<Self, ConfigError> {
        let contains_invalid = extension
            .chars()
            .any(|c| INVALID_FILE_EXT_CHARS.contains(&c));
        if contains_invalid {
            return Err(ConfigError::InvalidFileExtChars);
        }
        Ok(Self(extension.to_owned()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for FileExtension {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        FileExtension::new(&s).map_err(|_| {
            de::Error::invalid_value(
                de::Unexpected::Str(&s),
                &"a file extension without '/' or '.' characters",
            )
        })
    }
}

impl fmt::Display for FileExtension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Configuration for the compilation step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompileConfig {
    /// Command and arguments with placeholders
    /// Placeholders: {source}, {binary}, {entry}
    pub command: Vec<String>,

    /// Environment variables to set during compilation
    #[serde(default)]
    pub env: HashMap<String, String>,
}

/// Configuration for the execution step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Command and arguments with placeholders
    /// Placeholders: {source}, {binary}, {entry}
    pub command: Vec<String>,

    /// Environment variables to set
    #[serde(default)]
    pub env: HashMap<String, String>,
}
