use crate::config::Settings;
use crate::llm::error::LlmDiagnosticsError;
use crate::llm::json;
use crate::llm::{GenerateInput, LlmClient, Provider};
use crate::prompt::{Prompt, PromptPart};
use anyhow::Context;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const DEFAULT_MODEL: &str = "claude-3-5-sonnet-latest";
const DEFAULT_MAX_TOKENS: u32 = 2048;
const DEFAULT_TIMEOUT_SECS: u64 = 60;

const TOOL_NAME_EMIT_REPLY: &str = "emit_reply";

#[derive(Debug, Clone)]
pub struct AnthropicClient {
    http: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
    model: String,
    max_tokens: u32,
}

impl AnthropicClient {
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let timeout_secs = settings
            .anthropic_timeout_secs
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("failed to build reqwest client")?;

        Ok(Self {
            http,
            api_key: settings.anthropic_api_key.clone(),
            base_url: settings
                .anthropic_base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            model: settings
                .anthropic_model
                .clone()
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            max_tokens: settings.anthropic_max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
        })
    }

    async fn create_message(
        &self,
        api_key: &str,
        req: &CreateMessageRequest,
    ) -> anyhow::Result<(Value, CreateMessageResponse)> {
        let mut headers = HeaderMap::new();
        headers.insert("x-api-key", HeaderValue::from_str(api_key)?);
        headers.insert(
            "anthropic-version",
            HeaderValue::from_static(ANTHROPIC_VERSION),
        );

        let url = format!("{}/v1/messages", self.base_url.trim_end_matches('/'));
        let res = self
            .http
            .post(url)
            .headers(headers)
            .json(req)
            .send()
            .await
            .context("Anthropic request failed")?;

        let status = res.status();
        let text = res
            .text()
            .await
            .context("failed to read Anthropic response body")?;
        if !status.is_success() {
            let raw_response_json = serde_json::from_str::<Value>(&text).ok();
            return Err(LlmDiagnosticsError {
                provider: Provider::Anthropic,
                stage: "http",
                detail: format!("status={status}"),
                raw_output: Some(text),
                raw_response_json,
            }
            .into());
        }

        let raw_json = serde_json::from_str::<Value>(&text)
            .with_context(|| format!("failed to parse Anthropic response JSON: {text}"))?;
        let parsed = serde_json::from_value::<CreateMessageResponse>(raw_json.clone())
            .context("failed to decode Anthropic response into CreateMessageResponse")?;
        Ok((raw_json, parsed))
    }

    fn request(&self, input: &GenerateInput) -> CreateMessageRequest {
        CreateMessageRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            system: Some(Self::system_prompt()),
            messages: vec![Message {
                role: "user",
                content: content_blocks(&input.prompt),
            }],
            tools: Some(vec![Tool {
                name: TOOL_NAME_EMIT_REPLY,
                description: "Emit the final answer as structured JSON",
                input_schema: input.output_schema.clone(),
            }]),
            tool_choice: Some(ToolChoice::Tool {
                name: TOOL_NAME_EMIT_REPLY,
            }),
        }
    }

    fn system_prompt() -> String {
        [
            "Answer by calling the emit_reply tool exactly once.",
            "Fill every required field of the tool's input schema with plain text; do not leave required strings empty.",
        ]
        .join("\n")
    }

    fn response_text(res: &CreateMessageResponse) -> String {
        let mut out = String::new();
        for block in &res.content {
            if let ContentBlock::Text { text } = block {
                if !out.is_empty() {
                    out.push('\n');
                }
                out.push_str(text);
            }
        }
        out
    }

    fn response_tool_input(res: &CreateMessageResponse) -> Option<&Value> {
        res.content.iter().find_map(|block| match block {
            ContentBlock::ToolUse { name, input, .. } if name == TOOL_NAME_EMIT_REPLY => {
                Some(input)
            }
            _ => None,
        })
    }
}

#[async_trait::async_trait]
impl LlmClient for AnthropicClient {
    fn provider(&self) -> Provider {
        Provider::Anthropic
    }

    async fn generate(&self, input: GenerateInput) -> anyhow::Result<Value> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            LlmDiagnosticsError::missing_credential(Provider::Anthropic, "ANTHROPIC_API_KEY")
        })?;

        tracing::debug!(
            operation = input.operation,
            model = %self.model,
            images = input.prompt.images().count(),
            "sending Anthropic messages request"
        );

        let (raw_json, res) = self.create_message(api_key, &self.request(&input)).await?;

        if matches!(res.stop_reason.as_deref(), Some("max_tokens")) {
            tracing::warn!(
                operation = input.operation,
                max_tokens = self.max_tokens,
                "Anthropic stop_reason=max_tokens; reply may be truncated"
            );
        }

        // Tool output path.
        if let Some(tool_input) = Self::response_tool_input(&res) {
            return Ok(tool_input.clone());
        }

        // Fallback to text (should be rare).
        let text = Self::response_text(&res);
        json::parse_reply(&text).map_err(|err| {
            anyhow::Error::from(
                LlmDiagnosticsError::new(Provider::Anthropic, "parse", format!("{err:#}"))
                    .with_raw_output(text)
                    .with_raw_json(raw_json),
            )
        })
    }
}

fn content_blocks(prompt: &Prompt) -> Vec<RequestBlock> {
    prompt
        .parts
        .iter()
        .map(|part| match part {
            PromptPart::Text(text) => RequestBlock::Text { text: text.clone() },
            PromptPart::Image(img) => RequestBlock::Image {
                source: ImageSource {
                    kind: "base64",
                    media_type: img.mime_type.clone(),
                    data: img.data.clone(),
                },
            },
        })
        .collect()
}

#[derive(Debug, Clone, Serialize)]
struct CreateMessageRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<Message>,

    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<Tool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<ToolChoice>,
}

#[derive(Debug, Clone, Serialize)]
struct Message {
    role: &'static str,
    content: Vec<RequestBlock>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum RequestBlock {
    Text { text: String },
    Image { source: ImageSource },
}

#[derive(Debug, Clone, Serialize)]
struct ImageSource {
    #[serde(rename = "type")]
    kind: &'static str,
    media_type: String,
    data: String,
}

#[derive(Debug, Clone, Deserialize)]
struct CreateMessageResponse {
    content: Vec<ContentBlock>,

    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
struct Tool {
    name: &'static str,
    description: &'static str,
    input_schema: Value,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
enum ToolChoice {
    #[serde(rename = "tool")]
    Tool { name: &'static str },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },

    #[serde(rename = "tool_use")]
    ToolUse {
        #[serde(default)]
        name: String,
        #[serde(default)]
        input: Value,
    },

    #[serde(other)]
    Unknown,
}
