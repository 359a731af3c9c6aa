pub mod anthropic;
pub mod error;
pub mod gemini;
pub mod json;

use crate::config::Settings;
use crate::prompt::Prompt;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// One request to the model service: the rendered prompt plus the JSON schema
/// the reply is asked to follow.
#[derive(Debug, Clone)]
pub struct GenerateInput {
    pub operation: &'static str,
    pub prompt: Prompt,
    pub output_schema: serde_json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Gemini,
    Anthropic,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Gemini => "gemini",
            Provider::Anthropic => "anthropic",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gemini" | "google" | "googleai" => Ok(Provider::Gemini),
            "anthropic" | "claude" => Ok(Provider::Anthropic),
            other => anyhow::bail!("unknown model provider {other:?} (expected gemini or anthropic)"),
        }
    }
}

#[async_trait::async_trait]
pub trait LlmClient: Send + Sync {
    fn provider(&self) -> Provider;

    /// Sends exactly one request and returns the reply as JSON. No retries.
    async fn generate(&self, input: GenerateInput) -> anyhow::Result<serde_json::Value>;
}

/// Builds the client for the configured provider. A missing credential is not an
/// error here; the client fails each call instead.
pub fn client_from_settings(settings: &Settings) -> anyhow::Result<Arc<dyn LlmClient>> {
    Ok(match settings.provider {
        Provider::Gemini => Arc::new(gemini::GeminiClient::from_settings(settings)?),
        Provider::Anthropic => Arc::new(anthropic::AnthropicClient::from_settings(settings)?),
    })
}
