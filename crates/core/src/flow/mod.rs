//! Validate → render → call → validate, once per operation.
//!
//! Each operation is a [`Flow`]: its input checks, its prompt template, and the
//! reply contract. [`run`] drives any of them against an injected
//! [`LlmClient`], so tests can hand in a stub.

pub mod alternatives;
pub mod image_analysis;
pub mod persona;

pub use alternatives::{find_cheaper_alternatives, FindAlternatives};
pub use image_analysis::{analyze_image, ImageAnalysis};
pub use persona::{persona_analysis, PersonaAnalysis};

use crate::domain::ValidationError;
use crate::llm::error::LlmDiagnosticsError;
use crate::llm::{GenerateInput, LlmClient};
use crate::prompt::Prompt;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;

/// Persona the analysis prompts speak as.
pub const PERSONA: &str = "Charlie Munger";

pub trait Flow {
    const NAME: &'static str;

    type Input: Sync;
    type Reply: DeserializeOwned;

    fn validate(input: &Self::Input) -> Result<(), ValidationError>;

    /// Only called on input that passed [`Flow::validate`].
    fn render(input: &Self::Input) -> Prompt;

    fn output_schema() -> Value;

    fn check_reply(reply: &Self::Reply) -> Result<(), ValidationError>;
}

#[derive(Debug)]
pub enum FlowError {
    /// The request failed its schema; the model was not contacted.
    Validation(ValidationError),
    /// The model service failed or its reply broke the output contract.
    Service(anyhow::Error),
}

impl FlowError {
    pub fn is_validation(&self) -> bool {
        matches!(self, FlowError::Validation(_))
    }

    pub fn diagnostics(&self) -> Option<&LlmDiagnosticsError> {
        match self {
            FlowError::Service(err) => err.downcast_ref::<LlmDiagnosticsError>(),
            FlowError::Validation(_) => None,
        }
    }
}

impl fmt::Display for FlowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlowError::Validation(err) => write!(f, "{err}"),
            FlowError::Service(err) => write!(f, "model service error: {err:#}"),
        }
    }
}

impl std::error::Error for FlowError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FlowError::Validation(err) => Some(err),
            FlowError::Service(err) => Some(&**err),
        }
    }
}

impl From<ValidationError> for FlowError {
    fn from(err: ValidationError) -> Self {
        FlowError::Validation(err)
    }
}

/// Renders the prompt for a flow without contacting the model.
pub fn render<F: Flow>(input: &F::Input) -> Result<Prompt, ValidationError> {
    F::validate(input)?;
    Ok(F::render(input))
}

pub async fn run<F: Flow>(client: &dyn LlmClient, input: &F::Input) -> Result<F::Reply, FlowError> {
    let prompt = render::<F>(input).map_err(|err| {
        tracing::debug!(operation = F::NAME, error = %err, "request rejected");
        FlowError::Validation(err)
    })?;

    let provider = client.provider();
    let request = GenerateInput {
        operation: F::NAME,
        prompt,
        output_schema: F::output_schema(),
    };

    let raw = client.generate(request).await.map_err(|err| {
        tracing::warn!(operation = F::NAME, %provider, error = %err, "model call failed");
        FlowError::Service(err)
    })?;

    let reply = serde_json::from_value::<F::Reply>(raw.clone())
        .map_err(|err| err.to_string())
        .and_then(|reply| match F::check_reply(&reply) {
            Ok(()) => Ok(reply),
            Err(err) => Err(err.to_string()),
        });

    match reply {
        Ok(reply) => {
            tracing::info!(operation = F::NAME, %provider, "model reply accepted");
            Ok(reply)
        }
        Err(detail) => {
            tracing::warn!(operation = F::NAME, %provider, %detail, "model reply broke the output contract");
            Err(FlowError::Service(
                LlmDiagnosticsError::new(provider, "contract", detail)
                    .with_raw_json(raw)
                    .into(),
            ))
        }
    }
}
