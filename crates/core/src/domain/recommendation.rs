use serde::{Deserialize, Serialize};

/// Persona-style purchase advice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub recommendation: String,
    pub reasoning: String,
    pub opportunity_cost: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alternatives: Option<String>,
    pub financial_impact: String,
    pub key_insights: String,
}

/// Advice produced from a photo, with what the model saw in it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageRecommendation {
    pub recommendation: String,
    pub reasoning: String,
    pub opportunity_cost: String,
    pub alternatives: Vec<String>,
    pub financial_impact: FinancialImpact,
    pub key_insights: String,
    pub item_description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinancialImpact {
    pub short_term: String,
    pub long_term: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlternativesResult {
    pub alternatives: Vec<Alternative>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alternative {
    pub name: String,
    pub url: String,
    pub price: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Buy,
    DontBuy,
    Unclear,
}

// Words that flip a following "buy" or "purchase" into a no.
const NEGATIONS: [&str; 12] = [
    "not", "no", "never", "don't", "dont", "shouldn't", "wouldn't", "won't", "can't", "cannot",
    "avoid", "skip",
];

impl Verdict {
    /// Reads the verdict out of free-text wording such as "Don't Buy",
    /// "Not worth buying" or "Buy, but wait for a sale".
    ///
    /// The first clause that mentions buying decides: a negation earlier in
    /// that clause makes it `DontBuy`.
    pub fn classify(text: &str) -> Self {
        let text = text.to_lowercase().replace('\u{2019}', "'");
        let mut declined = false;

        for clause in text.split([',', '.', ';', ':', '!', '?']) {
            let words: Vec<&str> = clause
                .split(|c: char| !(c.is_alphanumeric() || c == '\''))
                .filter(|w| !w.is_empty())
                .collect();
            let negated = |upto: usize| {
                let before = &words[..upto];
                before.iter().any(|w| NEGATIONS.contains(w))
                    || before.windows(2).any(|pair| pair == ["hold", "off"])
            };

            if let Some(at) = words
                .iter()
                .position(|w| w.starts_with("buy") || w.starts_with("purchas"))
            {
                return if negated(at) {
                    Verdict::DontBuy
                } else {
                    Verdict::Buy
                };
            }
            declined |= words
                .iter()
                .any(|w| matches!(*w, "skip" | "avoid" | "pass"))
                || words.windows(2).any(|pair| pair == ["hold", "off"]);
        }

        // "Skip it", "Pass" and the like never mention buying.
        if declined {
            Verdict::DontBuy
        } else {
            Verdict::Unclear
        }
    }
}

impl Recommendation {
    pub fn verdict(&self) -> Verdict {
        Verdict::classify(&self.recommendation)
    }
}

impl ImageRecommendation {
    pub fn verdict(&self) -> Verdict {
        Verdict::classify(&self.recommendation)
    }
}
