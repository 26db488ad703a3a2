//! Code review assistant
//!
//! A thin client for a Gemini `generateContent` endpoint. Given a program, its
//! language and the output of its last run, it asks the model for a fixed or
//! polished version of the code.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::config::AnalyzeConfig;
use crate::types::{AnalyzeRequest, AnalyzeResponse};

/// Environment variable consulted when no key is configured
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Errors from the text-generation API
#[derive(Debug, Error)]
pub enum AnalyzeError {
    #[error("analyze API key is not configured")]
    MissingKey,

    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("response contained no text")]
    EmptyResponse,
}

/// Client for code suggestions
#[derive(Clone)]
pub struct Analyzer {
    client: Client,
    api_key: Option<String>,
    model: String,
    base_url: String,
}

impl std::fmt::Debug for Analyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Analyzer")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl Analyzer {
    /// Create an analyzer from configuration
    ///
    /// Falls back to the `GEMINI_API_KEY` environment variable when the
    /// configuration carries no key.
    pub fn new(config: AnalyzeConfig) -> Self {
        let api_key = config
            .api_key
            .filter(|key| !key.is_empty())
            .or_else(|| std::env::var(API_KEY_ENV).ok().filter(|key| !key.is_empty()));
        Self {
            client: Client::new(),
            api_key,
            model: config.model,
            base_url: config.base_url.trim_end_matches('/').to_owned(),
        }
    }

    pub fn has_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Ask for a suggestion, reporting failures as text
    pub async fn suggest(&self, request: &AnalyzeRequest) -> AnalyzeResponse {
        let suggestion = match self.try_suggest(request).await {
            Ok(text) => text,
            Err(AnalyzeError::MissingKey) => format!("Error: {}", AnalyzeError::MissingKey),
            Err(e) => {
                warn!(error = %e, "analyze request failed");
                format!("AI Error: {e}")
            }
        };
        AnalyzeResponse { suggestion }
    }

    /// Ask for a suggestion
    #[instrument(skip_all, fields(model = %self.model, language = %request.language))]
    pub async fn try_suggest(&self, request: &AnalyzeRequest) -> Result<String, AnalyzeError> {
        let api_key = self.api_key.as_deref().ok_or(AnalyzeError::MissingKey)?;

        let body = GenerateRequest {
            contents: vec![Content {
                role: Some("user".to_owned()),
                parts: vec![Part {
                    text: Some(render_prompt(request)),
                }],
            }],
        };
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);

        // Sent as a header: request errors include the URL
        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorBody>(&text)
                .map(|body| body.error.message)
                .unwrap_or(text);
            return Err(AnalyzeError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let response: GenerateResponse = response.json().await?;
        let text: String = response
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .map(|content| content.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        debug!(len = text.len(), "suggestion received");
        if text.is_empty() {
            return Err(AnalyzeError::EmptyResponse);
        }
        Ok(text)
    }
}

/// Build the review prompt for a request
pub fn render_prompt(request: &AnalyzeRequest) -> String {
    let output = if request.output.trim().is_empty() {
        "(no output)"
    } else {
        request.output.as_str()
    };
    format!(
        "You are an expert programming assistant reviewing a user's program.\n\
         \n\
         Language: {language}\n\
         \n\
         Code:\n\
         ```\n\
         {code}\n\
         ```\n\
         \n\
         Output of the last run:\n\
         {output}\n\
         \n\
         Instructions:\n\
         1. Look for errors and inefficiencies in the code and its output.\n\
         2. If something is wrong, reply with the COMPLETE corrected file in one fenced code block.\n\
         3. Otherwise, reply with a cleaned-up version of the whole file in one fenced code block.\n\
         4. Follow the code block with a short explanation.\n\
         \n\
         Tag the fenced block with the language name (for example ```python) so it can be extracted automatically.\n",
        language = request.language,
        code = request.code,
    )
}

#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}
