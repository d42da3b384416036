//! Standard response envelope used by the default `data` hook.

use serde::Serialize;
use serde_json::Value;

use crate::error::{ErrorBody, ErrorDetail, HandleError};

#[derive(Serialize)]
pub struct SuccessOne<T> {
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
}

#[derive(Serialize)]
pub struct MetaCount {
    pub count: u64,
}

/// `{ "data": ..., "meta": { "count": n } }` for arrays, `{ "data": ... }` otherwise.
pub fn success_body(data: Value) -> Value {
    let meta = match &data {
        Value::Array(items) => serde_json::to_value(MetaCount {
            count: items.len() as u64,
        })
        .ok(),
        _ => None,
    };
    serde_json::to_value(SuccessOne { data, meta }).unwrap_or(Value::Null)
}

/// `{ "error": { "code", "message", "details"? } }`, the same shape `HandleError` responds with.
pub fn error_body(code: &str, message: String, details: Option<Value>) -> Value {
    let body = ErrorBody {
        error: ErrorDetail {
            code: code.to_string(),
            message,
            details,
        },
    };
    serde_json::to_value(body).unwrap_or(Value::Null)
}

/// Error envelope for a `HandleError`.
pub fn error_body_for(err: &HandleError) -> Value {
    let (_, code) = err.status_and_code();
    error_body(code, err.to_string(), None)
}
