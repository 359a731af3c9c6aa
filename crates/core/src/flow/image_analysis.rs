use crate::domain::schema::FieldIssues;
use crate::domain::{ImageRecommendation, PurchaseQuery, ValidationError};
use crate::flow::{run, Flow, FlowError, PERSONA};
use crate::llm::LlmClient;
use crate::prompt::{Prompt, PromptBuilder};
use serde_json::Value;

/// Identifies the item from its photo first, then gives the same advice.
pub struct ImageAnalysis;

impl Flow for ImageAnalysis {
    const NAME: &'static str = "image_analysis";

    type Input = PurchaseQuery;
    type Reply = ImageRecommendation;

    fn validate(input: &PurchaseQuery) -> Result<(), ValidationError> {
        let mut issues = FieldIssues::default();
        input.check(&mut issues);
        if input.photo.is_none() {
            issues.push("photo", "is required");
        }
        issues.into_result(())
    }

    fn render(q: &PurchaseQuery) -> Prompt {
        let profile = &q.profile;
        PromptBuilder::new()
            .line(&format!(
                "You are {PERSONA}, providing financial advice. Analyze the following purchase decision and provide a recommendation."
            ))
            .blank()
            .field("Item Name", &q.item_name)
            .field("Cost", q.cost)
            .optional_field("Purpose", q.purpose.as_deref())
            .optional_field("Frequency of Use", q.frequency)
            .optional_field("Monthly Income", profile.income)
            .optional_field("Monthly Expenses", profile.expenses)
            .optional_field("Total Savings", profile.savings)
            .optional_field("Risk Tolerance", profile.risk_tolerance.as_deref())
            .optional_image("Image", q.photo.as_ref())
            .blank()
            .line("Consider the opportunity cost, financial impact, and behavioral economics principles. First, provide a short description of the item in the image, and then provide your analysis.")
            .blank()
            .line("Format your response as a JSON object with these fields:")
            .blank()
            .line("itemDescription: what the image shows")
            .line("recommendation: whether to buy the item")
            .line("reasoning: the reasoning behind the recommendation")
            .line("opportunityCost: analysis of the opportunity cost")
            .line("alternatives: a list of cheaper alternative suggestions")
            .line("financialImpact: an object with shortTerm and longTerm impact")
            .line("keyInsights: key insights and behavioral economics observations")
            .build()
    }

    fn output_schema() -> Value {
        ImageRecommendation::output_schema()
    }

    fn check_reply(reply: &ImageRecommendation) -> Result<(), ValidationError> {
        reply.validate()
    }
}

pub async fn analyze_image(
    client: &dyn LlmClient,
    query: &PurchaseQuery,
) -> Result<ImageRecommendation, FlowError> {
    run::<ImageAnalysis>(client, query).await
}
