//! Random rows for `Handle::mock`.
//!
//! A rule is an object whose `name|N` key holds a one-element array template:
//! `{"data|10": [{"title": "@title", "views": "@integer", "draft": false}]}` yields ten rows.
//! Template strings starting with `@` are placeholders, anything else is copied.

use chrono::{Duration, Utc};
use fake::faker::boolean::en::Boolean;
use fake::faker::internet::en::SafeEmail;
use fake::faker::lorem::en::{Paragraph, Sentence, Word, Words};
use fake::faker::name::en::Name;
use fake::Fake;
use serde_json::{json, Map, Value};

use crate::error::HandleError;

/// Upper bound on rows produced by one rule.
pub const MAX_MOCK_ROWS: usize = 100;

pub trait MockGenerator: Send + Sync {
    /// Rows produced from `rule`, as a JSON array.
    fn generate(&self, rule: &Value) -> Result<Value, HandleError>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct FakeGenerator;

impl MockGenerator for FakeGenerator {
    fn generate(&self, rule: &Value) -> Result<Value, HandleError> {
        let map = rule
            .as_object()
            .ok_or_else(|| HandleError::InvalidOptions("mock rule must be an object".into()))?;
        let (key, template) = map
            .iter()
            .next()
            .ok_or_else(|| HandleError::InvalidOptions("mock rule is empty".into()))?;
        let count = parse_count(key)?;
        let template = match template {
            Value::Array(items) if items.len() == 1 => &items[0],
            _ => {
                return Err(HandleError::InvalidOptions(format!(
                    "mock rule '{}' must hold a one-element array",
                    key
                )))
            }
        };
        Ok(Value::Array((0..count).map(|_| fill(template)).collect()))
    }
}

fn parse_count(key: &str) -> Result<usize, HandleError> {
    let count = key
        .split_once('|')
        .and_then(|(_, n)| n.trim().parse::<usize>().ok())
        .ok_or_else(|| HandleError::InvalidOptions(format!("mock rule key '{}' must look like 'name|N'", key)))?;
    if count > MAX_MOCK_ROWS {
        return Err(HandleError::InvalidOptions(format!(
            "mock rule asks for {} rows, limit is {}",
            count, MAX_MOCK_ROWS
        )));
    }
    Ok(count)
}

fn fill(template: &Value) -> Value {
    match template {
        Value::String(s) if s.starts_with('@') => placeholder(s).unwrap_or_else(|| template.clone()),
        Value::Object(m) => Value::Object(m.iter().map(|(k, v)| (k.clone(), fill(v))).collect::<Map<_, _>>()),
        Value::Array(items) => Value::Array(items.iter().map(fill).collect()),
        other => other.clone(),
    }
}

fn placeholder(name: &str) -> Option<Value> {
    Some(match &name[1..] {
        "word" => json!(Word().fake::<String>()),
        "title" => {
            let words: Vec<String> = Words(2..5).fake();
            json!(words.iter().map(|w| capitalize(w)).collect::<Vec<_>>().join(" "))
        }
        "sentence" => json!(Sentence(4..10).fake::<String>()),
        "paragraph" => json!(Paragraph(2..4).fake::<String>()),
        "name" => json!(Name().fake::<String>()),
        "email" => json!(SafeEmail().fake::<String>()),
        "integer" => json!((0..10_000).fake::<i64>()),
        "float" => json!((0.0..1000.0).fake::<f64>()),
        "bool" => json!(Boolean(50).fake::<bool>()),
        "uuid" => json!(uuid::Uuid::new_v4().to_string()),
        "datetime" => {
            let back = Duration::seconds((0..365 * 24 * 3600).fake::<i64>());
            json!((Utc::now() - back).to_rfc3339())
        }
        _ => return None,
    })
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generates_n_rows_from_template() {
        let rule = json!({"data|3": [{"title": "@title", "views": "@integer", "draft": false, "kind": "post"}]});
        let rows = FakeGenerator.generate(&rule).unwrap();
        let rows = rows.as_array().unwrap();
        assert_eq!(rows.len(), 3);
        for row in rows {
            assert!(row["title"].as_str().is_some_and(|s| !s.is_empty()));
            assert!(row["views"].is_i64());
            assert_eq!(row["draft"], json!(false));
            assert_eq!(row["kind"], json!("post"));
        }
    }

    #[test]
    fn unknown_placeholders_are_copied() {
        let rows = FakeGenerator.generate(&json!({"x|1": [{"a": "@nope"}]})).unwrap();
        assert_eq!(rows, json!([{"a": "@nope"}]));
    }

    #[test]
    fn placeholder_kinds() {
        let row = fill(&json!({"u": "@uuid", "b": "@bool", "f": "@float", "e": "@email", "d": "@datetime"}));
        assert!(uuid::Uuid::parse_str(row["u"].as_str().unwrap()).is_ok());
        assert!(row["b"].is_boolean());
        assert!(row["f"].is_f64());
        assert!(row["e"].as_str().unwrap().contains('@'));
        assert!(chrono::DateTime::parse_from_rfc3339(row["d"].as_str().unwrap()).is_ok());
    }

    #[test]
    fn malformed_rules_fail() {
        assert!(FakeGenerator.generate(&json!([])).is_err());
        assert!(FakeGenerator.generate(&json!({"data": [{}]})).is_err());
        assert!(FakeGenerator.generate(&json!({"data|2": [{}, {}]})).is_err());
        assert!(FakeGenerator.generate(&json!({"data|1000": [{}]})).is_err());
    }
}
