use crate::config::Settings;
use crate::llm::error::LlmDiagnosticsError;
use crate::llm::json;
use crate::llm::{GenerateInput, LlmClient, Provider};
use crate::prompt::{Prompt, PromptPart};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_MODEL: &str = "gemini-2.0-flash";
const DEFAULT_TIMEOUT_SECS: u64 = 60;

// Keys of the OpenAPI subset Gemini accepts in `responseSchema`.
const SCHEMA_KEYS: [&str; 7] = [
    "type",
    "description",
    "nullable",
    "enum",
    "properties",
    "required",
    "items",
];

#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
    model: String,
}

impl GeminiClient {
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let timeout_secs = settings.gemini_timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS);
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("failed to build reqwest client")?;

        Ok(Self {
            http,
            api_key: settings.gemini_api_key.clone(),
            base_url: settings
                .gemini_base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            model: settings
                .gemini_model
                .clone()
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        })
    }

    fn endpoint(&self) -> String {
        let model = self.model.trim();
        let model_path = if model.starts_with("models/") {
            model.to_string()
        } else {
            format!("models/{model}")
        };
        format!(
            "{}/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            model_path
        )
    }

    fn request_body(input: &GenerateInput) -> GenerateContentRequest {
        GenerateContentRequest {
            contents: vec![Content {
                role: "user",
                parts: parts(&input.prompt),
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json",
                response_schema: to_gemini_schema(&input.output_schema),
            },
        }
    }

    async fn generate_content(
        &self,
        api_key: &str,
        req: &GenerateContentRequest,
    ) -> anyhow::Result<(Value, GenerateContentResponse)> {
        let res = self
            .http
            .post(self.endpoint())
            .header("x-goog-api-key", api_key)
            .json(req)
            .send()
            .await
            .context("Gemini request failed")?;

        let status = res.status();
        let text = res
            .text()
            .await
            .context("failed to read Gemini response body")?;
        if !status.is_success() {
            let raw_response_json = serde_json::from_str::<Value>(&text).ok();
            return Err(LlmDiagnosticsError {
                provider: Provider::Gemini,
                stage: "http",
                detail: format!("status={status}"),
                raw_output: Some(text),
                raw_response_json,
            }
            .into());
        }

        let raw_json = serde_json::from_str::<Value>(&text)
            .with_context(|| format!("failed to parse Gemini response JSON: {text}"))?;
        let parsed = serde_json::from_value::<GenerateContentResponse>(raw_json.clone())
            .context("failed to decode Gemini response into GenerateContentResponse")?;
        Ok((raw_json, parsed))
    }

    fn response_text(res: &GenerateContentResponse) -> Option<String> {
        let candidate = res.candidates.first()?;
        let text: String = candidate
            .content
            .as_ref()?
            .parts
            .iter()
            .filter_map(|p| p.text.as_deref())
            .collect();
        (!text.trim().is_empty()).then_some(text)
    }
}

#[async_trait::async_trait]
impl LlmClient for GeminiClient {
    fn provider(&self) -> Provider {
        Provider::Gemini
    }

    async fn generate(&self, input: GenerateInput) -> anyhow::Result<Value> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| LlmDiagnosticsError::missing_credential(Provider::Gemini, "GEMINI_API_KEY"))?;

        tracing::debug!(
            operation = input.operation,
            model = %self.model,
            images = input.prompt.images().count(),
            "sending Gemini generateContent request"
        );

        let req = Self::request_body(&input);
        let (raw_json, res) = self.generate_content(api_key, &req).await?;

        let Some(text) = Self::response_text(&res) else {
            let reason = res
                .candidates
                .first()
                .and_then(|c| c.finish_reason.clone())
                .unwrap_or_else(|| "no candidates".to_string());
            return Err(LlmDiagnosticsError::new(
                Provider::Gemini,
                "response",
                format!("empty reply (finish_reason={reason})"),
            )
            .with_raw_json(raw_json)
            .into());
        };

        json::parse_reply(&text).map_err(|err| {
            anyhow::Error::from(
                LlmDiagnosticsError::new(Provider::Gemini, "parse", format!("{err:#}"))
                    .with_raw_output(text)
                    .with_raw_json(raw_json),
            )
        })
    }
}

fn parts(prompt: &Prompt) -> Vec<Part> {
    prompt
        .parts
        .iter()
        .map(|part| match part {
            PromptPart::Text(text) => Part::Text { text: text.clone() },
            PromptPart::Image(img) => Part::InlineData {
                inline_data: InlineData {
                    mime_type: img.mime_type.clone(),
                    data: img.data.clone(),
                },
            },
        })
        .collect()
}

/// Rewrites a JSON Schema into the form `responseSchema` expects: upper-case
/// type names and no keys outside the supported subset.
fn to_gemini_schema(schema: &Value) -> Value {
    let Value::Object(map) = schema else {
        return schema.clone();
    };

    let mut out = serde_json::Map::new();
    for (key, value) in map {
        if !SCHEMA_KEYS.contains(&key.as_str()) {
            continue;
        }
        let converted = match (key.as_str(), value) {
            ("type", Value::String(t)) => Value::String(t.to_ascii_uppercase()),
            ("items", v) => to_gemini_schema(v),
            ("properties", Value::Object(props)) => Value::Object(
                props
                    .iter()
                    .map(|(k, v)| (k.clone(), to_gemini_schema(v)))
                    .collect(),
            ),
            (_, v) => v.clone(),
        };
        out.insert(key.clone(), converted);
    }
    Value::Object(out)
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Clone, Serialize)]
struct Content {
    role: &'static str,
    parts: Vec<Part>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
enum Part {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: &'static str,
    response_schema: Value,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<ResponseContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Clone, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}
