//! Option descriptors and their normalization into query options.

use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

use crate::error::HandleError;
use crate::extractors::RequestContext;
use crate::options::QueryOptions;

pub type OptionsFn = dyn Fn(&Value, &RequestContext) -> Result<Value, HandleError> + Send + Sync;

/// Declarative description of the options passed to a model call.
#[derive(Clone, Default)]
pub enum OptionDescriptor {
    #[default]
    None,
    /// Where-clause shorthand: each key is matched for equality against the request data.
    Keys(Vec<String>),
    Object(Value),
    Func(Arc<OptionsFn>),
}

impl OptionDescriptor {
    /// Comma separated key list, e.g. `"id, author_id"`.
    pub fn keys(list: &str) -> Self {
        OptionDescriptor::Keys(
            list.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }

    pub fn func<F>(f: F) -> Self
    where
        F: Fn(&Value, &RequestContext) -> Result<Value, HandleError> + Send + Sync + 'static,
    {
        OptionDescriptor::Func(Arc::new(f))
    }
}

impl fmt::Debug for OptionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionDescriptor::None => f.write_str("None"),
            OptionDescriptor::Keys(keys) => f.debug_tuple("Keys").field(keys).finish(),
            OptionDescriptor::Object(v) => f.debug_tuple("Object").field(v).finish(),
            OptionDescriptor::Func(_) => f.write_str("Func(..)"),
        }
    }
}

impl From<&str> for OptionDescriptor {
    fn from(s: &str) -> Self {
        OptionDescriptor::keys(s)
    }
}

impl From<String> for OptionDescriptor {
    fn from(s: String) -> Self {
        OptionDescriptor::keys(&s)
    }
}

impl From<Vec<&str>> for OptionDescriptor {
    fn from(keys: Vec<&str>) -> Self {
        OptionDescriptor::Keys(keys.into_iter().map(str::to_string).collect())
    }
}

impl<const N: usize> From<[&str; N]> for OptionDescriptor {
    fn from(keys: [&str; N]) -> Self {
        OptionDescriptor::Keys(keys.iter().map(|s| s.to_string()).collect())
    }
}

impl From<Vec<String>> for OptionDescriptor {
    fn from(keys: Vec<String>) -> Self {
        OptionDescriptor::Keys(keys)
    }
}

/// Strings and string arrays become key lists, null becomes `None`, anything else is used as-is.
impl From<Value> for OptionDescriptor {
    fn from(v: Value) -> Self {
        match v {
            Value::Null => OptionDescriptor::None,
            Value::String(s) => OptionDescriptor::keys(&s),
            Value::Array(items) if items.iter().all(Value::is_string) => OptionDescriptor::Keys(
                items
                    .into_iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect(),
            ),
            other => OptionDescriptor::Object(other),
        }
    }
}

impl From<Option<Value>> for OptionDescriptor {
    fn from(v: Option<Value>) -> Self {
        v.map(OptionDescriptor::from).unwrap_or_default()
    }
}

/// Normalizes a descriptor against the request data.
pub fn get_options(
    descriptor: &OptionDescriptor,
    data: &Value,
    ctx: &RequestContext,
) -> Result<QueryOptions, HandleError> {
    let value = match descriptor {
        OptionDescriptor::None => return Ok(Map::new()),
        OptionDescriptor::Keys(keys) => return Ok(where_from_keys(keys, data)),
        OptionDescriptor::Object(v) => v.clone(),
        OptionDescriptor::Func(f) => f(data, ctx)?,
    };
    match value {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Map::new()),
        other => Err(HandleError::InvalidOptions(format!(
            "options must be an object, got {}",
            other
        ))),
    }
}

fn where_from_keys(keys: &[String], data: &Value) -> QueryOptions {
    let mut out = Map::new();
    let Some(fields) = data.as_object() else {
        return out;
    };
    let mut clause = Map::new();
    for key in keys {
        match fields.get(key) {
            Some(v) if !v.is_null() => {
                clause.insert(key.clone(), v.clone());
            }
            _ => {}
        }
    }
    if !clause.is_empty() {
        out.insert("where".into(), Value::Object(clause));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn opts(descriptor: impl Into<OptionDescriptor>, data: Value) -> Value {
        let map = get_options(&descriptor.into(), &data, &RequestContext::detached()).unwrap();
        Value::Object(map)
    }

    #[test]
    fn none_yields_empty_options() {
        assert_eq!(opts(OptionDescriptor::None, json!({"id": 1})), json!({}));
    }

    #[test]
    fn key_string_builds_where() {
        let data = json!({"id": "3", "author_id": 7, "title": "x"});
        assert_eq!(opts("id, author_id", data), json!({"where": {"id": "3", "author_id": 7}}));
    }

    #[test]
    fn missing_and_null_keys_are_skipped() {
        let data = json!({"id": null});
        assert_eq!(opts(["id", "slug"], data), json!({}));
    }

    #[test]
    fn non_object_data_has_no_where() {
        assert_eq!(opts("id", json!([1, 2])), json!({}));
    }

    #[test]
    fn objects_are_used_as_is() {
        let o = json!({"where": {"published": true}, "limit": 3});
        assert_eq!(opts(o.clone(), json!({"id": 1})), o);
    }

    #[test]
    fn functions_see_data() {
        let f = OptionDescriptor::func(|d, _| Ok(json!({"where": {"author_id": d["me"].clone()}})));
        assert_eq!(opts(f, json!({"me": 9})), json!({"where": {"author_id": 9}}));
    }

    #[test]
    fn functions_see_headers() {
        let f = OptionDescriptor::func(|_, ctx| Ok(json!({"where": {"owner": ctx.header("x-user")}})));
        let mut ctx = RequestContext::detached();
        ctx.headers.insert("x-user", "ann".parse().unwrap());
        let map = get_options(&f, &json!({}), &ctx).unwrap();
        assert_eq!(Value::Object(map), json!({"where": {"owner": "ann"}}));
    }

    #[test]
    fn non_object_result_is_rejected() {
        let f = OptionDescriptor::func(|_, _| Ok(json!(42)));
        let err = get_options(&f, &json!({}), &RequestContext::detached()).unwrap_err();
        assert!(matches!(err, HandleError::InvalidOptions(_)));
    }

    #[test]
    fn value_strings_become_keys() {
        assert!(matches!(OptionDescriptor::from(json!("id")), OptionDescriptor::Keys(k) if k == vec!["id"]));
        assert!(matches!(OptionDescriptor::from(json!(["a", "b"])), OptionDescriptor::Keys(k) if k.len() == 2));
        assert!(matches!(OptionDescriptor::from(Value::Null), OptionDescriptor::None));
    }
}
