//! Wire messages exchanged with clients

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// First message of a session: what to run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRequest {
    /// Language name, matched case-insensitively with aliases
    #[serde(alias = "lang")]
    pub language: String,

    /// Source code of the program
    pub code: String,
}

impl SessionRequest {
    /// Parse an open message
    ///
    /// The error is a short human-readable reason, suitable for sending back
    /// to the client.
    pub fn parse(message: &str) -> Result<Self, String> {
        let value: Value =
            serde_json::from_str(message).map_err(|e| format!("not valid JSON: {e}"))?;
        let Value::Object(mut fields) = value else {
            return Err("expected a JSON object with `language` and `code`".to_owned());
        };
        // `language` wins over the older `lang` spelling
        if fields.contains_key("language") {
            fields.remove("lang");
        }
        serde_json::from_value(Value::Object(fields)).map_err(|e| e.to_string())
    }
}

/// A message sent while a program runs
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputMessage {
    /// One line of input, without the trailing newline
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stdin: Option<String>,
}

impl InputMessage {
    /// Parse an input message, or `None` if it is not a JSON object
    ///
    /// A `stdin` field that is not a string is treated as absent.
    pub fn parse(message: &str) -> Option<Self> {
        let value: Value = serde_json::from_str(message).ok()?;
        let object = value.as_object()?;
        Some(Self {
            stdin: object
                .get("stdin")
                .and_then(Value::as_str)
                .map(str::to_owned),
        })
    }
}

/// Request to the code review assistant
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyzeRequest {
    #[serde(default)]
    pub code: String,

    #[serde(default, alias = "lang")]
    pub language: String,

    /// Output of the last run, if any
    #[serde(default)]
    pub output: String,
}

/// Reply from the code review assistant
///
/// Failures are reported as text in `suggestion`, never as a protocol error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyzeResponse {
    pub suggestion: String,
}
