pub mod domain;
pub mod flow;
pub mod llm;
pub mod prompt;

pub mod config {
    use crate::llm::Provider;
    use anyhow::Context;

    // Lookup order for the Gemini credential.
    pub const GEMINI_API_KEY_VARS: [&str; 3] =
        ["GEMINI_API_KEY", "GOOGLE_API_KEY", "GOOGLE_GENAI_API_KEY"];
    pub const ANTHROPIC_API_KEY_VAR: &str = "ANTHROPIC_API_KEY";

    #[derive(Debug, Clone)]
    pub struct Settings {
        pub provider: Provider,
        pub gemini_api_key: Option<String>,
        pub gemini_base_url: Option<String>,
        pub gemini_model: Option<String>,
        pub gemini_timeout_secs: Option<u64>,
        pub anthropic_api_key: Option<String>,
        pub anthropic_base_url: Option<String>,
        pub anthropic_model: Option<String>,
        pub anthropic_max_tokens: Option<u32>,
        pub anthropic_timeout_secs: Option<u64>,
        pub sentry_dsn: Option<String>,
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            Self::from_lookup(|key| std::env::var(key).ok())
        }

        /// Builds settings from an arbitrary variable source. Blank values count as unset.
        pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
        where
            F: Fn(&str) -> Option<String>,
        {
            let var = |key: &str| {
                lookup(key)
                    .map(|v| v.trim().to_string())
                    .filter(|v| !v.is_empty())
            };

            let provider = match var("MODEL_PROVIDER") {
                Some(s) => s
                    .parse::<Provider>()
                    .with_context(|| format!("invalid MODEL_PROVIDER: {s}"))?,
                None => Provider::Gemini,
            };

            let gemini_api_key = GEMINI_API_KEY_VARS.iter().find_map(|&key| var(key));

            Ok(Self {
                provider,
                gemini_api_key,
                gemini_base_url: var("GEMINI_BASE_URL"),
                gemini_model: var("GEMINI_MODEL"),
                gemini_timeout_secs: var("GEMINI_TIMEOUT_SECS").and_then(|s| s.parse().ok()),
                anthropic_api_key: var(ANTHROPIC_API_KEY_VAR),
                anthropic_base_url: var("ANTHROPIC_BASE_URL"),
                anthropic_model: var("ANTHROPIC_MODEL"),
                anthropic_max_tokens: var("ANTHROPIC_MAX_TOKENS").and_then(|s| s.parse().ok()),
                anthropic_timeout_secs: var("ANTHROPIC_TIMEOUT_SECS")
                    .and_then(|s| s.parse().ok()),
                sentry_dsn: var("SENTRY_DSN"),
            })
        }

        /// Credential for the selected provider, if configured.
        pub fn model_api_key(&self) -> Option<&str> {
            match self.provider {
                Provider::Gemini => self.gemini_api_key.as_deref(),
                Provider::Anthropic => self.anthropic_api_key.as_deref(),
            }
        }

        /// Name of the variable an operator should set for the selected provider.
        pub fn model_api_key_var(&self) -> &'static str {
            match self.provider {
                Provider::Gemini => GEMINI_API_KEY_VARS[0],
                Provider::Anthropic => ANTHROPIC_API_KEY_VAR,
            }
        }
    }

}
