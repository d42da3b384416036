//! Composable scopes: option fragments derived from request data and merged into every call.
//!
//! A scope is either a static options object or a function of the request data. A function
//! may yield nothing, in which case it contributes no options. The factories here cover the
//! common cases: where shorthands, fuzzy search, pagination, includes, ordering, deep merge
//! and branching on field presence.

use serde_json::{json, Map, Value};
use std::fmt;
use std::sync::Arc;

use crate::error::HandleError;
use crate::extractors::RequestContext;
use crate::options::{deep_merge, get_options, int_of, truthy, OptionDescriptor, QueryOptions};

pub type ScopeFn = dyn Fn(&Value, &RequestContext) -> Result<Option<Value>, HandleError> + Send + Sync;

/// Field searched by the fuzzy scopes when the caller has no better name.
pub const DEFAULT_FUZZY_FIELD: &str = "name";
pub const DEFAULT_PAGE_SIZE: i64 = 5;
pub const DEFAULT_PAGE: i64 = 0;

#[derive(Clone)]
pub enum Scope {
    Static(Value),
    Func(Arc<ScopeFn>),
}

impl Scope {
    pub fn func<F>(f: F) -> Self
    where
        F: Fn(&Value, &RequestContext) -> Result<Option<Value>, HandleError> + Send + Sync + 'static,
    {
        Scope::Func(Arc::new(f))
    }

    /// Options contributed by this scope for the given request data.
    pub fn resolve(&self, data: &Value, ctx: &RequestContext) -> Result<Option<Value>, HandleError> {
        match self {
            Scope::Static(v) => Ok(Some(v.clone())),
            Scope::Func(f) => f(data, ctx),
        }
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Static(v) => f.debug_tuple("Static").field(v).finish(),
            Scope::Func(_) => f.write_str("Func(..)"),
        }
    }
}

impl From<Value> for Scope {
    fn from(v: Value) -> Self {
        Scope::Static(v)
    }
}

/// A condition checked by [`it`].
#[derive(Clone)]
pub enum Condition {
    /// The field is truthy in the request data.
    Present(String),
    /// The field strictly equals the value.
    Equals(String, Value),
    Predicate(Arc<dyn Fn(&Value) -> bool + Send + Sync>),
}

impl Condition {
    pub fn predicate<F>(f: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        Condition::Predicate(Arc::new(f))
    }

    fn holds(&self, data: &Value) -> bool {
        match self {
            Condition::Present(field) => truthy(data.get(field)),
            Condition::Equals(field, expected) => data.get(field).is_some_and(|v| strict_eq(v, expected)),
            Condition::Predicate(f) => f(data),
        }
    }
}

/// Equality where numbers compare by value, so `1` equals `1.0`.
fn strict_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

impl From<&str> for Condition {
    fn from(field: &str) -> Self {
        Condition::Present(field.to_string())
    }
}

impl From<(&str, Value)> for Condition {
    fn from((field, value): (&str, Value)) -> Self {
        Condition::Equals(field.to_string(), value)
    }
}

/// Where-clause shorthand as a scope.
pub fn where_(descriptor: impl Into<OptionDescriptor>) -> Scope {
    let descriptor = descriptor.into();
    Scope::func(move |d, ctx| Ok(Some(Value::Object(get_options(&descriptor, d, ctx)?))))
}

#[derive(Clone, Copy)]
enum LikeMode {
    Both,
    Left,
    Right,
}

fn fuzzy(field: &str, key: Option<&str>, mode: LikeMode) -> Scope {
    let field = field.to_string();
    let key = key.map(str::to_string).unwrap_or_else(|| field.clone());
    Scope::func(move |d, _| {
        let v = d.get(&key);
        if !truthy(v) {
            return Ok(None);
        }
        let text = match v {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => return Ok(None),
        };
        let pattern = match mode {
            LikeMode::Both => format!("%{}%", text),
            LikeMode::Left => format!("%{}", text),
            LikeMode::Right => format!("{}%", text),
        };
        Ok(Some(json!({ "where": { field.as_str(): { "like": pattern } } })))
    })
}

/// `field LIKE %value%` when the request carries a truthy value under `field`.
pub fn fuzzy_query(field: &str) -> Scope {
    fuzzy(field, None, LikeMode::Both)
}

/// Like [`fuzzy_query`] but reads the value from `key`.
pub fn fuzzy_query_keyed(field: &str, key: &str) -> Scope {
    fuzzy(field, Some(key), LikeMode::Both)
}

/// `field LIKE %value` (matches the end of the column).
pub fn fuzzy_query_left(field: &str) -> Scope {
    fuzzy(field, None, LikeMode::Left)
}

pub fn fuzzy_query_left_keyed(field: &str, key: &str) -> Scope {
    fuzzy(field, Some(key), LikeMode::Left)
}

/// `field LIKE value%` (matches the start of the column).
pub fn fuzzy_query_right(field: &str) -> Scope {
    fuzzy(field, None, LikeMode::Right)
}

pub fn fuzzy_query_right_keyed(field: &str, key: &str) -> Scope {
    fuzzy(field, Some(key), LikeMode::Right)
}

/// `limit`/`offset` from the `count` and `page` request fields (page is zero based).
pub fn pagination(default_count: i64, default_page: i64) -> Scope {
    Scope::func(move |d, _| {
        let count = match int_of(d.get("count")) {
            n if n > 0 => n,
            _ => default_count,
        };
        let page = match int_of(d.get("page")) {
            n if n > 0 => n,
            _ => default_page,
        };
        Ok(Some(json!({ "limit": count, "offset": page.saturating_mul(count) })))
    })
}

/// [`pagination`] with 5 rows per page starting at page 0.
pub fn pagination_default() -> Scope {
    pagination(DEFAULT_PAGE_SIZE, DEFAULT_PAGE)
}

pub fn includes<I, S>(names: I) -> Scope
where
    I: IntoIterator<Item = S>,
    S: Into<Value>,
{
    let names: Vec<Value> = names.into_iter().map(Into::into).collect();
    Scope::Static(json!({ "include": names }))
}

pub fn order(value: impl Into<Value>) -> Scope {
    Scope::Static(json!({ "order": value.into() }))
}

/// Deep merge of the request data followed by every part.
pub fn merge(parts: Vec<Scope>) -> Scope {
    Scope::func(move |d, ctx| {
        let mut out = d.clone();
        for part in &parts {
            if let Some(v) = part.resolve(d, ctx)? {
                deep_merge(&mut out, v);
            }
        }
        Ok(Some(out))
    })
}

/// Merges `then` when every condition holds, `otherwise` when any fails.
pub fn it(conditions: Vec<Condition>, then: Vec<Scope>, otherwise: Vec<Scope>) -> Scope {
    Scope::func(move |d, ctx| {
        let branch = if conditions.iter().all(|c| c.holds(d)) {
            &then
        } else {
            &otherwise
        };
        let mut out = Value::Object(Map::new());
        for scope in branch {
            if let Some(v) = scope.resolve(d, ctx)? {
                deep_merge(&mut out, v);
            }
        }
        Ok(Some(out))
    })
}

/// Merges, in order, the descriptor options, the default scopes and the method scopes.
pub fn mixin_scopes(
    data: &Value,
    ctx: &RequestContext,
    options: QueryOptions,
    default_scopes: &[Scope],
    method_scopes: &[Scope],
) -> Result<QueryOptions, HandleError> {
    let mut out = Value::Object(options);
    for scope in default_scopes.iter().chain(method_scopes) {
        match scope.resolve(data, ctx)? {
            None | Some(Value::Null) => {}
            Some(v @ Value::Object(_)) => deep_merge(&mut out, v),
            Some(other) => {
                return Err(HandleError::InvalidOptions(format!(
                    "scope must yield an object, got {}",
                    other
                )))
            }
        }
    }
    match out {
        Value::Object(map) => Ok(map),
        _ => Ok(Map::new()),
    }
}
