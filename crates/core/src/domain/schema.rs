use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldIssue {
    pub field: String,
    pub problem: String,
}

/// A value failed its schema. Carries every offending field, not just the first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub issues: Vec<FieldIssue>,
}

impl ValidationError {
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.issues.iter().map(|i| i.field.as_str())
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.fields().any(|f| f == field)
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "validation failed: ")?;
        for (i, issue) in self.issues.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{} {}", issue.field, issue.problem)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

/// Accumulates field issues. Only the first issue per field is kept, so a
/// missing field is not reported again by a later range check.
#[derive(Debug, Default)]
pub struct FieldIssues {
    issues: Vec<FieldIssue>,
}

impl FieldIssues {
    pub fn push(&mut self, field: impl Into<String>, problem: impl Into<String>) {
        let field = field.into();
        if self.issues.iter().any(|i| i.field == field) {
            return;
        }
        self.issues.push(FieldIssue {
            field,
            problem: problem.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn into_result<T>(self, value: T) -> Result<T, ValidationError> {
        if self.issues.is_empty() {
            Ok(value)
        } else {
            Err(ValidationError {
                issues: self.issues,
            })
        }
    }
}

pub fn require_text(issues: &mut FieldIssues, field: &str, value: &str) {
    if value.trim().is_empty() {
        issues.push(field, "is required");
    }
}

pub fn require_positive(issues: &mut FieldIssues, field: &str, value: f64) {
    if !value.is_finite() || value <= 0.0 {
        issues.push(field, "must be greater than 0");
    }
}

pub fn require_non_negative(issues: &mut FieldIssues, field: &str, value: f64) {
    if !value.is_finite() || value < 0.0 {
        issues.push(field, "must not be negative");
    }
}

/// Typed field access over an untrusted JSON object.
///
/// Each field is looked up under its canonical name and then its aliases; the
/// canonical name is what appears in reported issues. `null` and blank strings
/// are treated as absent.
pub struct ObjectReader<'a> {
    object: Option<&'a Map<String, Value>>,
    issues: FieldIssues,
}

impl<'a> ObjectReader<'a> {
    pub fn new(value: &'a Value) -> Self {
        let mut issues = FieldIssues::default();
        let object = value.as_object();
        if object.is_none() {
            issues.push("$", "must be a JSON object");
        }
        Self { object, issues }
    }

    fn lookup(&self, names: &[&str]) -> Option<&'a Value> {
        let object = self.object?;
        names
            .iter()
            .filter_map(|name| object.get(*name))
            .find(|v| match v {
                Value::Null => false,
                Value::String(s) => !s.trim().is_empty(),
                _ => true,
            })
    }

    pub fn issue(&mut self, field: &str, problem: impl Into<String>) {
        self.issues.push(field, problem);
    }

    pub fn string(&mut self, names: &[&str]) -> Option<String> {
        match self.lookup(names)? {
            Value::String(s) if s.trim().is_empty() => None,
            Value::String(s) => Some(s.clone()),
            _ => {
                self.issues.push(names[0], "must be a string");
                None
            }
        }
    }

    pub fn required_string(&mut self, names: &[&str]) -> Option<String> {
        self.object?;
        let out = self.string(names);
        if out.is_none() {
            self.issues.push(names[0], "is required");
        }
        out
    }

    pub fn number(&mut self, names: &[&str]) -> Option<f64> {
        match self.lookup(names)? {
            Value::Number(n) => n.as_f64(),
            _ => {
                self.issues.push(names[0], "must be a number");
                None
            }
        }
    }

    pub fn required_number(&mut self, names: &[&str]) -> Option<f64> {
        self.object?;
        let out = self.number(names);
        if out.is_none() {
            self.issues.push(names[0], "is required");
        }
        out
    }

    pub fn into_issues(self) -> FieldIssues {
        self.issues
    }
}
