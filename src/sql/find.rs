//! Typed view of query options used by the SQL builder.

use serde_json::Value;

use crate::error::HandleError;
use crate::options::{int_of, QueryOptions};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

impl Direction {
    fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ASC" => Some(Direction::Asc),
            "DESC" => Some(Direction::Desc),
            _ => None,
        }
    }

    pub fn as_sql(self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrderTerm {
    pub column: String,
    pub direction: Direction,
}

#[derive(Clone, Debug, Default)]
pub struct FindOptions {
    pub filter: Option<Value>,
    pub attributes: Option<Vec<String>>,
    pub order: Vec<OrderTerm>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    pub include: Vec<String>,
}

impl FindOptions {
    pub fn parse(opts: &QueryOptions) -> Result<Self, HandleError> {
        Ok(FindOptions {
            filter: opts.get("where").filter(|v| !v.is_null()).cloned(),
            attributes: opts.get("attributes").map(parse_names).transpose()?,
            order: opts.get("order").map(parse_order).transpose()?.unwrap_or_default(),
            limit: parse_count("limit", opts.get("limit"))?,
            offset: parse_count("offset", opts.get("offset"))?,
            include: opts.get("include").map(parse_includes).transpose()?.unwrap_or_default(),
        })
    }

    pub fn has_filter(&self) -> bool {
        match &self.filter {
            Some(Value::Object(m)) => !m.is_empty(),
            Some(Value::Array(a)) => !a.is_empty(),
            Some(_) => true,
            None => false,
        }
    }
}

fn parse_count(key: &str, v: Option<&Value>) -> Result<Option<u64>, HandleError> {
    match v {
        None | Some(Value::Null) => Ok(None),
        Some(v) => {
            let n = int_of(Some(v));
            if n < 0 {
                return Err(HandleError::InvalidOptions(format!("{} must not be negative", key)));
            }
            Ok(Some(n as u64))
        }
    }
}

fn parse_names(v: &Value) -> Result<Vec<String>, HandleError> {
    match v {
        Value::String(s) => Ok(vec![s.clone()]),
        Value::Array(items) => items
            .iter()
            .map(|i| {
                i.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| HandleError::InvalidOptions(format!("expected a column name, got {}", i)))
            })
            .collect(),
        other => Err(HandleError::InvalidOptions(format!("expected column names, got {}", other))),
    }
}

fn parse_includes(v: &Value) -> Result<Vec<String>, HandleError> {
    let items = match v {
        Value::Array(items) => items.as_slice(),
        single => std::slice::from_ref(single),
    };
    items
        .iter()
        .map(|i| match i {
            Value::String(s) => Ok(s.clone()),
            Value::Object(o) => o
                .get("as")
                .or_else(|| o.get("association"))
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| HandleError::InvalidOptions(format!("include needs 'as': {}", i))),
            other => Err(HandleError::InvalidOptions(format!("invalid include: {}", other))),
        })
        .collect()
}

fn parse_term(v: &Value) -> Result<OrderTerm, HandleError> {
    match v {
        Value::String(s) => Ok(OrderTerm {
            column: s.clone(),
            direction: Direction::Asc,
        }),
        Value::Array(pair) if pair.len() == 2 => {
            let column = pair[0].as_str();
            let direction = pair[1].as_str().and_then(Direction::parse);
            match (column, direction) {
                (Some(column), Some(direction)) => Ok(OrderTerm {
                    column: column.to_string(),
                    direction,
                }),
                _ => Err(HandleError::InvalidOptions(format!("invalid order term: {}", v))),
            }
        }
        other => Err(HandleError::InvalidOptions(format!("invalid order term: {}", other))),
    }
}

/// `"col"`, `["col", "DESC"]` or a list of those.
fn parse_order(v: &Value) -> Result<Vec<OrderTerm>, HandleError> {
    match v {
        Value::Array(items) => {
            if let Ok(term) = parse_term(v) {
                return Ok(vec![term]);
            }
            items.iter().map(parse_term).collect()
        }
        single => Ok(vec![parse_term(single)?]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(v: Value) -> Result<FindOptions, HandleError> {
        FindOptions::parse(v.as_object().unwrap())
    }

    #[test]
    fn order_forms() {
        let asc = |c: &str| OrderTerm { column: c.into(), direction: Direction::Asc };
        let desc = |c: &str| OrderTerm { column: c.into(), direction: Direction::Desc };
        assert_eq!(parse(json!({"order": "id"})).unwrap().order, vec![asc("id")]);
        assert_eq!(parse(json!({"order": ["id", "desc"]})).unwrap().order, vec![desc("id")]);
        assert_eq!(parse(json!({"order": ["title", "id"]})).unwrap().order, vec![asc("title"), asc("id")]);
        assert_eq!(
            parse(json!({"order": [["title", "ASC"], ["id", "DESC"]]})).unwrap().order,
            vec![asc("title"), desc("id")]
        );
        assert!(parse(json!({"order": [["id", "sideways"]]})).is_err());
    }

    #[test]
    fn limits_accept_numeric_strings() {
        let f = parse(json!({"limit": "10", "offset": 20})).unwrap();
        assert_eq!((f.limit, f.offset), (Some(10), Some(20)));
        assert!(parse(json!({"limit": -1})).is_err());
    }

    #[test]
    fn includes_accept_names_and_objects() {
        let f = parse(json!({"include": ["author", {"as": "comments"}]})).unwrap();
        assert_eq!(f.include, vec!["author", "comments"]);
        assert_eq!(parse(json!({"include": "author"})).unwrap().include, vec!["author"]);
        assert!(parse(json!({"include": [{"model": "x"}]})).is_err());
    }

    #[test]
    fn filter_presence() {
        assert!(!parse(json!({})).unwrap().has_filter());
        assert!(!parse(json!({"where": {}})).unwrap().has_filter());
        assert!(parse(json!({"where": {"id": 1}})).unwrap().has_filter());
    }
}
