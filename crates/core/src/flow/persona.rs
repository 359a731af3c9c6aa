use crate::domain::{PurchaseQuery, Recommendation, ValidationError};
use crate::flow::{run, Flow, FlowError, PERSONA};
use crate::llm::LlmClient;
use crate::prompt::{Prompt, PromptBuilder};
use serde_json::Value;

/// Buy/don't-buy advice from item details and an optional financial profile.
pub struct PersonaAnalysis;

impl Flow for PersonaAnalysis {
    const NAME: &'static str = "persona_analysis";

    type Input = PurchaseQuery;
    type Reply = Recommendation;

    fn validate(input: &PurchaseQuery) -> Result<(), ValidationError> {
        input.validate()
    }

    fn render(q: &PurchaseQuery) -> Prompt {
        let profile = &q.profile;
        PromptBuilder::new()
            .line(&format!(
                "You are {PERSONA}, a wise and rational financial advisor. A user is considering purchasing the following item:"
            ))
            .blank()
            .field("Item Name", &q.item_name)
            .field("Cost", q.cost)
            .optional_field("Purpose", q.purpose.as_deref())
            .optional_field("Frequency of Use", q.frequency)
            .optional_image("Item Image", q.photo.as_ref())
            .section_if(!profile.is_empty(), |b| {
                b.blank()
                    .line("Consider the user's financial situation:")
                    .optional_field("Monthly Income", profile.income)
                    .optional_field("Monthly Expenses", profile.expenses)
                    .optional_field("Total Savings", profile.savings)
                    .optional_field("Risk Tolerance", profile.risk_tolerance.as_deref())
            })
            .blank()
            .line("Analyze the purchase, considering opportunity cost, rational thinking, and long-term financial impact. Provide a clear recommendation (Buy or Don't Buy) and explain your reasoning. Suggest cheaper alternatives if available. Analyze how the purchase affects the user's financial health and provide key insights and behavioral economics observations related to the purchase.")
            .blank()
            .line("Format your response as a JSON object with these fields:")
            .blank()
            .line("recommendation: Buy or Don't Buy")
            .line("reasoning: your reasoning")
            .line("opportunityCost: analysis of the opportunity cost")
            .line("alternatives: suggested cheaper alternatives, if any")
            .line("financialImpact: how the purchase affects the user's financial health")
            .line("keyInsights: key insights and behavioral economics observations")
            .build()
    }

    fn output_schema() -> Value {
        Recommendation::output_schema()
    }

    fn check_reply(reply: &Recommendation) -> Result<(), ValidationError> {
        reply.validate()
    }
}

pub async fn persona_analysis(
    client: &dyn LlmClient,
    query: &PurchaseQuery,
) -> Result<Recommendation, FlowError> {
    run::<PersonaAnalysis>(client, query).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Frequency, ImagePayload, Verdict};
    use crate::flow::testing::StubClient;
    use crate::llm::error::LlmDiagnosticsError;
    use serde_json::json;

    fn standing_desk() -> PurchaseQuery {
        PurchaseQuery::from_value(&json!({
            "itemName": "Standing Desk",
            "cost": 500,
            "frequency": "Daily",
        }))
        .unwrap()
    }

    fn reply() -> Value {
        json!({
            "recommendation": "Buy",
            "reasoning": "Daily use spreads the cost thin.",
            "opportunityCost": "$500 invested at 7% for 10 years is about $980.",
            "financialImpact": "Small relative to lifetime health benefits.",
            "keyInsights": "Beware of buying for the identity rather than the use.",
        })
    }

    #[test]
    fn renders_only_present_fields() {
        let text = PersonaAnalysis::render(&standing_desk()).to_display_text();
        assert!(text.starts_with("You are Charlie Munger"));
        assert!(text.contains("Item Name: Standing Desk\nCost: 500\nFrequency of Use: Daily\n"));
        assert!(!text.contains("Purpose:"));
        assert!(!text.contains("Item Image:"));
        assert!(!text.contains("financial situation"));
        assert!(text.ends_with("keyInsights: key insights and behavioral economics observations"));
    }

    #[test]
    fn renders_profile_section_when_any_field_present() {
        let mut q = standing_desk();
        q.profile.savings = Some(12000.0);
        q.profile.risk_tolerance = Some("low".into());
        let text = PersonaAnalysis::render(&q).to_display_text();
        assert!(text.contains(
            "Consider the user's financial situation:\nTotal Savings: 12000\nRisk Tolerance: low\n"
        ));
        assert!(!text.contains("Monthly Income"));
    }

    #[test]
    fn renders_optional_photo_as_image_part() {
        let mut q = standing_desk();
        q.photo = Some(ImagePayload::from_data_uri("data:image/png;base64,AAAA").unwrap());
        let prompt = PersonaAnalysis::render(&q);
        assert_eq!(prompt.images().count(), 1);
        assert!(prompt.to_display_text().contains("Item Image: [image image/png"));
    }

    #[tokio::test]
    async fn standing_desk_gets_a_verdict() {
        let client = StubClient::replying(reply());
        let rec = persona_analysis(&client, &standing_desk()).await.unwrap();
        assert_eq!(rec.verdict(), Verdict::Buy);
        assert_eq!(client.call_count(), 1);

        let sent = client.last_input();
        assert_eq!(sent.operation, "persona_analysis");
        assert_eq!(sent.output_schema, Recommendation::output_schema());
    }

    #[tokio::test]
    async fn zero_cost_is_rejected_without_calling_the_model() {
        let client = StubClient::replying(reply());
        let mut q = standing_desk();
        q.cost = 0.0;
        let err = persona_analysis(&client, &q).await.unwrap_err();
        match err {
            FlowError::Validation(v) => assert!(v.has_field("cost")),
            other => panic!("expected validation error, got {other}"),
        }
        assert_eq!(client.call_count(), 0);

        q.cost = 0.01;
        q.frequency = Some(Frequency::OneTime);
        assert!(persona_analysis(&client, &q).await.is_ok());
        assert_eq!(client.call_count(), 1);
    }

    #[tokio::test]
    async fn partial_reply_is_a_service_error() {
        let mut partial = reply();
        partial["keyInsights"] = json!("");
        let client = StubClient::replying(partial);
        let err = persona_analysis(&client, &standing_desk()).await.unwrap_err();
        assert!(!err.is_validation());
        let diag = err.diagnostics().unwrap();
        assert_eq!(diag.stage, "contract");
        assert!(diag.detail.contains("keyInsights"));
    }

    #[tokio::test]
    async fn wrongly_typed_reply_is_a_service_error() {
        let mut bad = reply();
        bad["alternatives"] = json!(["a", "b"]);
        let client = StubClient::replying(bad);
        let err = persona_analysis(&client, &standing_desk()).await.unwrap_err();
        assert_eq!(err.diagnostics().map(|d| d.stage), Some("contract"));
    }

    #[tokio::test]
    async fn transport_failure_is_reported_not_raised() {
        let client = StubClient::failing("connection refused");
        let err = persona_analysis(&client, &standing_desk()).await.unwrap_err();
        assert!(matches!(err, FlowError::Service(_)));
        assert!(err.to_string().contains("connection refused"));
        assert!(err.diagnostics().is_none());
    }

    #[tokio::test]
    async fn missing_credential_surfaces_as_service_error() {
        struct NoKey;

        #[async_trait::async_trait]
        impl LlmClient for NoKey {
            fn provider(&self) -> crate::llm::Provider {
                crate::llm::Provider::Gemini
            }

            async fn generate(&self, _input: crate::llm::GenerateInput) -> anyhow::Result<Value> {
                Err(LlmDiagnosticsError::missing_credential(self.provider(), "GEMINI_API_KEY").into())
            }
        }

        let err = persona_analysis(&NoKey, &standing_desk()).await.unwrap_err();
        assert_eq!(err.diagnostics().map(|d| d.stage), Some("credential"));
    }
}
