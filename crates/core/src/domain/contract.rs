use crate::domain::recommendation::{AlternativesResult, ImageRecommendation, Recommendation};
use crate::domain::schema::{require_non_negative, require_text, FieldIssues, ValidationError};
use serde_json::{json, Value};

impl Recommendation {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut issues = FieldIssues::default();
        require_text(&mut issues, "recommendation", &self.recommendation);
        require_text(&mut issues, "reasoning", &self.reasoning);
        require_text(&mut issues, "opportunityCost", &self.opportunity_cost);
        require_text(&mut issues, "financialImpact", &self.financial_impact);
        require_text(&mut issues, "keyInsights", &self.key_insights);
        issues.into_result(())
    }

    pub fn output_schema() -> Value {
        json!({
            "type": "object",
            "required": ["recommendation", "reasoning", "opportunityCost", "financialImpact", "keyInsights"],
            "properties": {
                "recommendation": {"type": "string", "description": "A clear recommendation: Buy or Don't Buy."},
                "reasoning": {"type": "string", "description": "The reasoning behind the recommendation."},
                "opportunityCost": {"type": "string", "description": "An analysis of the opportunity cost of the purchase."},
                "alternatives": {"type": "string", "description": "Suggested cheaper alternatives, if any."},
                "financialImpact": {"type": "string", "description": "How the purchase affects the user's financial health."},
                "keyInsights": {"type": "string", "description": "Key insights and behavioral economics observations."}
            }
        })
    }
}

impl ImageRecommendation {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut issues = FieldIssues::default();
        require_text(&mut issues, "recommendation", &self.recommendation);
        require_text(&mut issues, "reasoning", &self.reasoning);
        require_text(&mut issues, "opportunityCost", &self.opportunity_cost);
        for (i, alt) in self.alternatives.iter().enumerate() {
            require_text(&mut issues, &format!("alternatives[{i}]"), alt);
        }
        require_text(
            &mut issues,
            "financialImpact.shortTerm",
            &self.financial_impact.short_term,
        );
        require_text(
            &mut issues,
            "financialImpact.longTerm",
            &self.financial_impact.long_term,
        );
        require_text(&mut issues, "keyInsights", &self.key_insights);
        require_text(&mut issues, "itemDescription", &self.item_description);
        issues.into_result(())
    }

    pub fn output_schema() -> Value {
        json!({
            "type": "object",
            "required": [
                "recommendation", "reasoning", "opportunityCost", "alternatives",
                "financialImpact", "keyInsights", "itemDescription"
            ],
            "properties": {
                "recommendation": {"type": "string", "description": "A recommendation on whether to buy the item."},
                "reasoning": {"type": "string", "description": "The reasoning behind the recommendation."},
                "opportunityCost": {"type": "string", "description": "An analysis of the opportunity cost."},
                "alternatives": {
                    "type": "array",
                    "description": "Cheaper alternative suggestions.",
                    "items": {"type": "string"}
                },
                "financialImpact": {
                    "type": "object",
                    "description": "The short-term and long-term financial impact of the purchase.",
                    "required": ["shortTerm", "longTerm"],
                    "properties": {
                        "shortTerm": {"type": "string"},
                        "longTerm": {"type": "string"}
                    }
                },
                "keyInsights": {"type": "string", "description": "Key insights and behavioral economics observations."},
                "itemDescription": {"type": "string", "description": "A description of the item identified from the image."}
            }
        })
    }
}

impl AlternativesResult {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut issues = FieldIssues::default();
        for (i, alt) in self.alternatives.iter().enumerate() {
            require_text(&mut issues, &format!("alternatives[{i}].name"), &alt.name);
            if !is_web_url(&alt.url) {
                issues.push(
                    format!("alternatives[{i}].url"),
                    format!("must be an http(s) URL (got {:?})", alt.url),
                );
            }
            require_non_negative(&mut issues, &format!("alternatives[{i}].price"), alt.price);
        }
        issues.into_result(())
    }

    pub fn output_schema() -> Value {
        json!({
            "type": "object",
            "required": ["alternatives"],
            "properties": {
                "alternatives": {
                    "type": "array",
                    "description": "A list of cheaper alternatives found online.",
                    "items": {
                        "type": "object",
                        "required": ["name", "url", "price"],
                        "properties": {
                            "name": {"type": "string", "description": "The name of the alternative item."},
                            "url": {"type": "string", "format": "uri", "description": "The URL where the alternative item can be found."},
                            "price": {"type": "number", "description": "The price of the alternative item."}
                        }
                    }
                }
            }
        })
    }
}

fn is_web_url(s: &str) -> bool {
    match reqwest::Url::parse(s) {
        Ok(url) => matches!(url.scheme(), "http" | "https") && url.host().is_some(),
        Err(_) => false,
    }
}
