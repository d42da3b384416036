//! Convert serde_json::Value to the text form bound to PostgreSQL parameters.
//!
//! Every parameter is bound as nullable text and cast in SQL to the column type
//! (`$1::int8`), so PostgreSQL does the parsing and query-string values work as-is.

use serde_json::Value;
use sqlx::postgres::{PgArguments, Postgres};
use sqlx::query::Query;

pub fn bind_text(v: &Value) -> Option<String> {
    match v {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Array(_) | Value::Object(_) => Some(v.to_string()),
    }
}

/// Bind every parameter of a built query.
pub fn bind_all<'q>(
    mut query: Query<'q, Postgres, PgArguments>,
    params: &[Value],
) -> Query<'q, Postgres, PgArguments> {
    for p in params {
        query = query.bind(bind_text(p));
    }
    query
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn text_forms() {
        assert_eq!(bind_text(&json!(null)), None);
        assert_eq!(bind_text(&json!("a")), Some("a".into()));
        assert_eq!(bind_text(&json!(true)), Some("true".into()));
        assert_eq!(bind_text(&json!(12)), Some("12".into()));
        assert_eq!(bind_text(&json!(1.5)), Some("1.5".into()));
        assert_eq!(bind_text(&json!({"a": [1]})), Some(r#"{"a":[1]}"#.into()));
    }
}
