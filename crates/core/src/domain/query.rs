use crate::domain::schema::{
    require_non_negative, require_positive, require_text, FieldIssues, ObjectReader,
    ValidationError,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Largest photo the model provider accepts inline.
pub const MAX_IMAGE_BYTES: usize = 4 * 1024 * 1024;

const ITEM_NAME: &[&str] = &["itemName"];
const COST: &[&str] = &["cost"];
const PURPOSE: &[&str] = &["purpose"];
const FREQUENCY: &[&str] = &["frequency"];
const PHOTO: &[&str] = &["photo", "image", "imageUrl", "photoDataUri"];
const ALTERNATIVES_PHOTO: &[&str] = &["photo", "itemImageUrl", "image"];
const INCOME: &[&str] = &["income"];
const EXPENSES: &[&str] = &["expenses"];
const SAVINGS: &[&str] = &["savings"];
const RISK_TOLERANCE: &[&str] = &["riskTolerance"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Rarely,
    #[serde(rename = "One-time")]
    OneTime,
}

impl Frequency {
    pub const ALL: [Frequency; 5] = [
        Frequency::Daily,
        Frequency::Weekly,
        Frequency::Monthly,
        Frequency::Rarely,
        Frequency::OneTime,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Frequency::Daily => "Daily",
            Frequency::Weekly => "Weekly",
            Frequency::Monthly => "Monthly",
            Frequency::Rarely => "Rarely",
            Frequency::OneTime => "One-time",
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Frequency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Frequency::ALL
            .into_iter()
            .find(|f| f.as_str() == s)
            .ok_or_else(|| {
                format!(
                    "must be one of Daily, Weekly, Monthly, Rarely, One-time (got {s:?})"
                )
            })
    }
}

/// Photo carried inline as base64, split out of a `data:<mime>;base64,<data>` URI.
#[derive(Clone, PartialEq, Eq)]
pub struct ImagePayload {
    pub mime_type: String,
    pub data: String,
}

impl ImagePayload {
    pub fn from_data_uri(uri: &str) -> Result<Self, String> {
        let rest = uri
            .trim()
            .strip_prefix("data:")
            .ok_or("must be a data URI (data:<mimetype>;base64,<data>)")?;
        let (header, data) = rest
            .split_once(";base64,")
            .ok_or("must be a base64 data URI (data:<mimetype>;base64,<data>)")?;
        // Parameters such as `name=` or `charset=` are not part of the mime type.
        let mime_type = header.split_once(';').map_or(header, |(mime, _)| mime).trim();
        let payload = Self {
            mime_type: mime_type.to_string(),
            data: data.to_string(),
        };
        payload.check()?;
        Ok(payload)
    }

    pub fn to_data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }

    /// Decoded size implied by the base64 length.
    pub fn approx_decoded_len(&self) -> usize {
        let padding = self.data.bytes().rev().take_while(|b| *b == b'=').count();
        (self.data.len() / 4 * 3).saturating_sub(padding)
    }

    // Shape and size only; the bytes themselves are left to the model provider.
    fn check(&self) -> Result<(), String> {
        if !self.mime_type.starts_with("image/") {
            return Err(format!("must be an image (got {:?})", self.mime_type));
        }
        if self.data.is_empty() {
            return Err("must not be empty".to_string());
        }
        if self.approx_decoded_len() > MAX_IMAGE_BYTES {
            return Err("must be smaller than 4MB".to_string());
        }
        Ok(())
    }
}

impl fmt::Debug for ImagePayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImagePayload")
            .field("mime_type", &self.mime_type)
            .field("bytes", &self.approx_decoded_len())
            .finish()
    }
}

/// Everything the user tells us about a purchase they are weighing.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PurchaseQuery {
    pub item_name: String,
    pub cost: f64,
    pub purpose: Option<String>,
    pub frequency: Option<Frequency>,
    pub photo: Option<ImagePayload>,
    pub profile: FinancialProfile,
}

/// Optional context about the user's finances.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FinancialProfile {
    pub income: Option<f64>,
    pub expenses: Option<f64>,
    pub savings: Option<f64>,
    pub risk_tolerance: Option<String>,
}

impl FinancialProfile {
    pub fn is_empty(&self) -> bool {
        self.income.is_none()
            && self.expenses.is_none()
            && self.savings.is_none()
            && self.risk_tolerance.is_none()
    }
}

impl PurchaseQuery {
    pub fn new(item_name: impl Into<String>, cost: f64) -> Self {
        Self {
            item_name: item_name.into(),
            cost,
            ..Default::default()
        }
    }

    /// Validates an arbitrary JSON value (camelCase keys) into a query.
    pub fn from_value(value: &Value) -> Result<Self, ValidationError> {
        let mut r = ObjectReader::new(value);

        let item_name = r.required_string(ITEM_NAME);
        let cost = r.required_number(COST);
        let purpose = r.string(PURPOSE);
        let frequency = match r.string(FREQUENCY).map(|s| s.parse::<Frequency>()) {
            Some(Ok(f)) => Some(f),
            Some(Err(problem)) => {
                r.issue(FREQUENCY[0], problem);
                None
            }
            None => None,
        };
        let photo = read_photo(&mut r, PHOTO);
        let profile = FinancialProfile {
            income: r.number(INCOME),
            expenses: r.number(EXPENSES),
            savings: r.number(SAVINGS),
            risk_tolerance: r.string(RISK_TOLERANCE),
        };

        let mut issues = r.into_issues();
        let query = Self {
            item_name: item_name.unwrap_or_default(),
            cost: cost.unwrap_or_default(),
            purpose,
            frequency,
            photo,
            profile,
        };
        query.check(&mut issues);
        issues.into_result(query)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut issues = FieldIssues::default();
        self.check(&mut issues);
        issues.into_result(())
    }

    pub(crate) fn check(&self, issues: &mut FieldIssues) {
        require_text(issues, ITEM_NAME[0], &self.item_name);
        require_positive(issues, COST[0], self.cost);
        if let Some(photo) = &self.photo {
            if let Err(problem) = photo.check() {
                issues.push(PHOTO[0], problem);
            }
        }
        for (field, value) in [
            (INCOME[0], self.profile.income),
            (EXPENSES[0], self.profile.expenses),
            (SAVINGS[0], self.profile.savings),
        ] {
            if let Some(v) = value {
                require_non_negative(issues, field, v);
            }
        }
    }
}

/// An item whose cheaper substitutes we want the model to propose.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AlternativesQuery {
    pub item_name: String,
    pub photo: Option<ImagePayload>,
}

impl AlternativesQuery {
    pub fn new(item_name: impl Into<String>, photo: ImagePayload) -> Self {
        Self {
            item_name: item_name.into(),
            photo: Some(photo),
        }
    }

    pub fn from_value(value: &Value) -> Result<Self, ValidationError> {
        let mut r = ObjectReader::new(value);
        let item_name = r.required_string(ITEM_NAME);
        let photo = read_photo(&mut r, ALTERNATIVES_PHOTO);

        let mut issues = r.into_issues();
        let query = Self {
            item_name: item_name.unwrap_or_default(),
            photo,
        };
        query.check(&mut issues);
        issues.into_result(query)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut issues = FieldIssues::default();
        self.check(&mut issues);
        issues.into_result(())
    }

    fn check(&self, issues: &mut FieldIssues) {
        require_text(issues, ITEM_NAME[0], &self.item_name);
        match &self.photo {
            Some(photo) => {
                if let Err(problem) = photo.check() {
                    issues.push(PHOTO[0], problem);
                }
            }
            None => issues.push(PHOTO[0], "is required"),
        }
    }
}

fn read_photo(r: &mut ObjectReader<'_>, names: &[&str]) -> Option<ImagePayload> {
    match ImagePayload::from_data_uri(&r.string(names)?) {
        Ok(photo) => Some(photo),
        Err(problem) => {
            r.issue(names[0], problem);
            None
        }
    }
}
