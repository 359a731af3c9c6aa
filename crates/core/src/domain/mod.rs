pub mod contract;
pub mod query;
pub mod recommendation;
pub mod schema;

pub use query::{AlternativesQuery, FinancialProfile, Frequency, ImagePayload, PurchaseQuery};
pub use recommendation::{
    Alternative, AlternativesResult, FinancialImpact, ImageRecommendation, Recommendation, Verdict,
};
pub use schema::{FieldIssue, ValidationError};
