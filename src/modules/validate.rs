use chrono::{DateTime, NaiveDate};
use serde_json::{Map, Value};
use std::collections::HashMap;

use crate::modules::manifest::{FieldSpec, FieldType, ModuleManifest};

/// Checks one dynamic data entry against the manifest fields.
/// Returns per-field messages keyed by field name.
pub fn validate_record(
    manifest: &ModuleManifest,
    record: &Map<String, Value>,
) -> Result<(), HashMap<String, String>> {
    let mut errors = HashMap::new();

    for key in record.keys() {
        if manifest.field(key).is_none() {
            errors.insert(key.clone(), "Unknown field".to_string());
        }
    }

    for field in &manifest.fields {
        match record.get(&field.name) {
            None | Some(Value::Null) => {
                if field.required {
                    errors.insert(field.name.clone(), "This field is required".to_string());
                }
            }
            Some(Value::String(s)) if s.trim().is_empty() && field.required => {
                errors.insert(field.name.clone(), "This field is required".to_string());
            }
            Some(value) => {
                if let Err(message) = check_value(field, value) {
                    errors.insert(field.name.clone(), message);
                }
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_value(field: &FieldSpec, value: &Value) -> Result<(), String> {
    match field.field_type {
        FieldType::Text | FieldType::Textarea | FieldType::Phone => {
            value.as_str().map(|_| ()).ok_or_else(|| "Expected text".to_string())
        }
        FieldType::Email => match value.as_str() {
            Some(s) if s.is_empty() => Ok(()),
            Some(s) if looks_like_email(s) => Ok(()),
            _ => Err("Invalid email address".to_string()),
        },
        FieldType::Number => match value {
            Value::Number(_) => Ok(()),
            Value::String(s) if s.trim().parse::<f64>().is_ok_and(f64::is_finite) => Ok(()),
            _ => Err("Expected a number".to_string()),
        },
        FieldType::Boolean => value.as_bool().map(|_| ()).ok_or_else(|| "Expected true or false".to_string()),
        FieldType::Date => match value.as_str() {
            Some(s) if NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok() => Ok(()),
            Some(s) if DateTime::parse_from_rfc3339(s).is_ok() => Ok(()),
            _ => Err("Expected a date (YYYY-MM-DD)".to_string()),
        },
        FieldType::Select => match value.as_str() {
            Some(s) if field.options.iter().any(|o| o == s) => Ok(()),
            _ => Err(format!("Must be one of: {}", field.options.join(", "))),
        },
    }
}

fn looks_like_email(s: &str) -> bool {
    match s.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !domain.starts_with('.'),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn manifest() -> ModuleManifest {
        ModuleManifest::from_value(json!({
            "slug": "holidays",
            "name": "Holidays",
            "version": "1.0.0",
            "fields": [
                { "name": "employee", "type": "text", "required": true },
                { "name": "start", "type": "date", "required": true },
                { "name": "days", "type": "number" },
                { "name": "paid", "type": "boolean" },
                { "name": "contact", "type": "email" },
                { "name": "kind", "type": "select", "options": ["vacation", "sick"] }
            ]
        }))
        .unwrap()
    }

    fn record(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn accepts_well_formed_record() {
        let r = record(json!({
            "employee": "Ana",
            "start": "2026-08-01",
            "days": "5",
            "paid": true,
            "contact": "ana@example.com",
            "kind": "vacation"
        }));
        assert!(validate_record(&manifest(), &r).is_ok());
    }

    #[test]
    fn reports_every_bad_field() {
        let r = record(json!({
            "employee": "  ",
            "start": "01/08/2026",
            "days": "five",
            "paid": "yes",
            "contact": "ana",
            "kind": "party",
            "extra": 1
        }));
        let errors = validate_record(&manifest(), &r).unwrap_err();
        for key in ["employee", "start", "days", "paid", "contact", "kind", "extra"] {
            assert!(errors.contains_key(key), "missing error for {}", key);
        }
    }

    #[test]
    fn non_finite_numbers_are_rejected() {
        for days in ["NaN", "inf", "-infinity"] {
            let r = record(json!({ "employee": "Ana", "start": "2026-08-01", "days": days }));
            let errors = validate_record(&manifest(), &r).unwrap_err();
            assert!(errors.contains_key("days"), "{} was accepted", days);
        }
    }

    #[test]
    fn optional_fields_may_be_absent_or_null() {
        let r = record(json!({ "employee": "Luis", "start": "2026-01-02T09:00:00Z", "days": null }));
        assert!(validate_record(&manifest(), &r).is_ok());
    }
}
