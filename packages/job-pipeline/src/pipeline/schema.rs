//! Validation of LLM replies against the extraction schema.
//!
//! `summary` is required. Every other key may be missing or `null` and
//! then takes its empty default, but when present it must have the right
//! shape. List items may be strings or numbers; blank items are dropped.
//! Salary bounds accept integers, floats (rounded) and amount strings such
//! as `"$120,000"` or `"95k"`. Only the first amount of a string counts, so
//! `"$90k-$120k"` reads as 90000.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

use crate::error::SchemaError;
use crate::types::job::{Education, ExtractedFields, SalaryRange};

/// Optional currency prefix, then the first amount with an optional `k`.
static RE_AMOUNT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\d\-]*?(\d[\d,]*(?:\.\d+)?)\s*([kK])?(?:[^\w]|$)").unwrap()
});

/// Parse and validate a raw reply.
pub fn validate_extraction(raw: &str) -> Result<ExtractedFields, SchemaError> {
    let value: Value =
        serde_json::from_str(raw.trim()).map_err(|e| SchemaError::InvalidJson(e.to_string()))?;
    let object = value.as_object().ok_or(SchemaError::NotAnObject)?;

    let summary = match object.get("summary") {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(other) => return Err(shape("summary", format!("expected string, got {}", kind(other)))),
        None => return Err(shape("summary", "missing")),
    };

    Ok(ExtractedFields {
        summary,
        industries: string_list(object, "industries")?,
        soft_skills: string_list(object, "soft_skills")?,
        hard_skills: string_list(object, "hard_skills")?,
        tech_stack: string_list(object, "tech_stack")?,
        programming_languages: string_list(object, "programming_languages")?,
        education: education(object)?,
        salary: salary(object)?,
        benefits: string_list(object, "benefits")?,
    })
}

fn shape(field: &str, reason: impl Into<String>) -> SchemaError {
    SchemaError::Shape {
        field: field.to_string(),
        reason: reason.into(),
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn string_list(object: &Map<String, Value>, field: &str) -> Result<Vec<String>, SchemaError> {
    let items = match object.get(field) {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Array(items)) => items,
        Some(other) => return Err(shape(field, format!("expected array, got {}", kind(other)))),
    };

    let mut out = Vec::with_capacity(items.len());
    for item in items {
        let text = match item {
            Value::String(s) => s.trim().to_string(),
            Value::Number(n) => n.to_string(),
            Value::Null => continue,
            other => {
                return Err(shape(
                    field,
                    format!("expected string items, got {}", kind(other)),
                ))
            }
        };
        if !text.is_empty() {
            out.push(text);
        }
    }
    Ok(out)
}

fn education(object: &Map<String, Value>) -> Result<Education, SchemaError> {
    let inner = match object.get("education") {
        None | Some(Value::Null) => return Ok(Education::default()),
        Some(Value::Object(inner)) => inner,
        Some(other) => {
            return Err(shape(
                "education",
                format!("expected object, got {}", kind(other)),
            ))
        }
    };

    let min_degree = match inner.get("min_degree") {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.trim().to_string(),
        Some(other) => {
            return Err(shape(
                "education.min_degree",
                format!("expected string, got {}", kind(other)),
            ))
        }
    };

    Ok(Education {
        min_degree,
        fields: string_list(inner, "fields").map_err(|e| match e {
            SchemaError::Shape { reason, .. } => shape("education.fields", reason),
            other => other,
        })?,
    })
}

fn salary(object: &Map<String, Value>) -> Result<SalaryRange, SchemaError> {
    let inner = match object.get("salary") {
        None | Some(Value::Null) => return Ok(SalaryRange::default()),
        Some(Value::Object(inner)) => inner,
        Some(other) => return Err(shape("salary", format!("expected object, got {}", kind(other)))),
    };

    Ok(SalaryRange {
        min: salary_bound(inner.get("min"), "salary.min")?,
        max: salary_bound(inner.get("max"), "salary.max")?,
    })
}

fn salary_bound(value: Option<&Value>, field: &str) -> Result<i64, SchemaError> {
    let amount = match value {
        None | Some(Value::Null) => return Ok(0),
        Some(Value::Number(n)) => match n.as_i64() {
            Some(i) => i,
            None => n
                .as_f64()
                .map(|f| f.round() as i64)
                .ok_or_else(|| shape(field, "number out of range"))?,
        },
        Some(Value::String(s)) if s.trim().is_empty() => 0,
        Some(Value::String(s)) => amount(s).ok_or_else(|| shape(field, format!("not an amount: {s:?}")))?,
        Some(other) => return Err(shape(field, format!("expected integer, got {}", kind(other)))),
    };

    if amount < 0 {
        return Err(shape(field, "must not be negative"));
    }
    Ok(amount)
}

/// First amount in a salary string, in whole units.
fn amount(s: &str) -> Option<i64> {
    let caps = RE_AMOUNT.captures(s.trim())?;
    let mut value: f64 = caps[1].replace(',', "").parse().ok()?;
    if caps.get(2).is_some() {
        value *= 1000.0;
    }
    let value = value.round();
    (value.is_finite() && value <= i64::MAX as f64).then_some(value as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::sample_extraction_json;

    #[test]
    fn test_well_formed_reply() {
        let fields = validate_extraction(&sample_extraction_json()).unwrap();

        assert_eq!(fields.tech_stack, vec!["PostgreSQL", "Kafka"]);
        assert_eq!(fields.programming_languages, vec!["Rust", "Python"]);
        assert_eq!(fields.education.min_degree, "Bachelor");
        assert_eq!(fields.salary, SalaryRange { min: 90000, max: 120000 });
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(
            validate_extraction("{not json"),
            Err(SchemaError::InvalidJson(_))
        ));
        assert_eq!(validate_extraction("[1, 2]"), Err(SchemaError::NotAnObject));
    }

    #[test]
    fn test_summary_is_required() {
        let err = validate_extraction(r#"{"tech_stack": ["Go"]}"#).unwrap_err();
        assert_eq!(
            err,
            SchemaError::Shape {
                field: "summary".into(),
                reason: "missing".into()
            }
        );
    }

    #[test]
    fn test_optional_fields_default() {
        let fields = validate_extraction(r#"{"summary": "x", "salary": null}"#).unwrap();
        assert!(fields.tech_stack.is_empty());
        assert_eq!(fields.education, Education::default());
        assert!(!fields.salary.is_stated());
    }

    #[test]
    fn test_wrong_shapes_are_rejected() {
        let err = validate_extraction(r#"{"summary": "x", "tech_stack": "Go, Rust"}"#).unwrap_err();
        assert!(matches!(err, SchemaError::Shape { ref field, .. } if field == "tech_stack"));

        let err = validate_extraction(
            r#"{"summary": "x", "education": {"min_degree": "BS", "fields": [{"a": 1}]}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, SchemaError::Shape { ref field, .. } if field == "education.fields"));
    }

    #[test]
    fn test_lenient_salary_and_items() {
        let fields = validate_extraction(
            r#"{
                "summary": "x",
                "salary": {"min": "$95,000", "max": 130000.4},
                "benefits": ["  401k ", "", null, 5]
            }"#,
        )
        .unwrap();

        assert_eq!(fields.salary, SalaryRange { min: 95000, max: 130000 });
        assert_eq!(fields.benefits, vec!["401k", "5"]);
    }

    #[test]
    fn test_negative_salary_is_rejected() {
        let err = validate_extraction(r#"{"summary": "x", "salary": {"min": -1}}"#).unwrap_err();
        assert!(matches!(err, SchemaError::Shape { ref field, .. } if field == "salary.min"));
    }

    fn salary_of(min: &str) -> Result<SalaryRange, SchemaError> {
        let raw = serde_json::json!({"summary": "x", "salary": {"min": min, "max": 0}}).to_string();
        validate_extraction(&raw).map(|f| f.salary)
    }

    #[test]
    fn test_salary_strings_use_first_amount() {
        assert_eq!(salary_of("$90k-$120k").unwrap().min, 90_000);
        assert_eq!(salary_of("$95,000 - $120,000").unwrap().min, 95_000);
        assert_eq!(salary_of("100k").unwrap().min, 100_000);
        assert_eq!(salary_of("92.5K per year").unwrap().min, 92_500);
        assert_eq!(salary_of("USD 80000").unwrap().min, 80_000);
        assert_eq!(salary_of("  ").unwrap().min, 0);
    }

    #[test]
    fn test_salary_strings_without_amount_are_rejected() {
        for s in ["competitive", "-5000", "10kx"] {
            let err = salary_of(s).unwrap_err();
            assert!(
                matches!(err, SchemaError::Shape { ref field, .. } if field == "salary.min"),
                "{s:?} gave {err:?}"
            );
        }
    }
}
