//! Request context handed to hooks, descriptors and scopes, plus request data extraction.

use async_trait::async_trait;
use axum::{
    body::Body,
    extract::{FromRequestParts, Query},
    http::{request::Parts, HeaderMap, Method, Uri},
};
use serde_json::{Map, Value};

use crate::error::HandleError;

/// Max accepted request body size in bytes.
pub const BODY_LIMIT: usize = 2 * 1024 * 1024;

/// Read-only view of the incoming request.
#[derive(Clone, Debug)]
pub struct RequestContext {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
}

impl RequestContext {
    pub fn from_parts(parts: &Parts) -> Self {
        Self {
            method: parts.method.clone(),
            uri: parts.uri.clone(),
            headers: parts.headers.clone(),
        }
    }

    /// Context for calls made outside of an HTTP request.
    pub fn detached() -> Self {
        Self {
            method: Method::GET,
            uri: Uri::from_static("/"),
            headers: HeaderMap::new(),
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::detached()
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(RequestContext::from_parts(parts))
    }
}

/// GET and DELETE read the query string; every other verb reads the JSON body.
pub fn reads_query(verb: &Method) -> bool {
    *verb == Method::GET || *verb == Method::DELETE || *verb == Method::HEAD
}

/// Request data for the declared verb. An empty body yields `{}`.
pub async fn request_data(verb: &Method, uri: &Uri, body: Body) -> Result<Value, HandleError> {
    if reads_query(verb) {
        return query_data(uri);
    }
    let bytes = axum::body::to_bytes(body, BODY_LIMIT)
        .await
        .map_err(|e| HandleError::BadRequest(format!("cannot read body: {}", e)))?;
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Object(Map::new()));
    }
    serde_json::from_slice(&bytes).map_err(|e| HandleError::BadRequest(format!("body must be JSON: {}", e)))
}

/// Query string as a JSON object of strings. Repeated keys collect into an array.
pub fn query_data(uri: &Uri) -> Result<Value, HandleError> {
    let Query(pairs) = Query::<Vec<(String, String)>>::try_from_uri(uri)
        .map_err(|e| HandleError::BadRequest(format!("invalid query string: {}", e)))?;
    let mut map = Map::new();
    for (k, v) in pairs {
        match map.get_mut(&k) {
            Some(Value::Array(items)) => items.push(Value::String(v)),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, Value::String(v)]);
            }
            None => {
                map.insert(k, Value::String(v));
            }
        }
    }
    Ok(Value::Object(map))
}
