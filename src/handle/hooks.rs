//! Global lifecycle hooks shared by every endpoint of a handle.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use crate::error::HandleError;
use crate::extractors::RequestContext;
use crate::mock::MockGenerator;
use crate::response::{error_body_for, success_body};

/// Rewrites request data before the call, or the result after it.
pub type HookFn = dyn Fn(Value, &RequestContext) -> Result<Value, HandleError> + Send + Sync;

/// Builds the response body from the error or the result.
pub type DataFn = dyn Fn(Option<&HandleError>, Option<Value>, &RequestContext) -> Value + Send + Sync;

#[derive(Clone, Default)]
pub struct HandleOptions {
    pub(crate) before: Option<Arc<HookFn>>,
    pub(crate) after: Option<Arc<HookFn>>,
    pub(crate) data: Option<Arc<DataFn>>,
    pub(crate) mock: Option<Arc<dyn MockGenerator>>,
}

impl HandleOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn before<F>(mut self, f: F) -> Self
    where
        F: Fn(Value, &RequestContext) -> Result<Value, HandleError> + Send + Sync + 'static,
    {
        self.before = Some(Arc::new(f));
        self
    }

    pub fn after<F>(mut self, f: F) -> Self
    where
        F: Fn(Value, &RequestContext) -> Result<Value, HandleError> + Send + Sync + 'static,
    {
        self.after = Some(Arc::new(f));
        self
    }

    /// Replaces the default `{ "data": .. }` / `{ "error": .. }` envelope.
    pub fn data<F>(mut self, f: F) -> Self
    where
        F: Fn(Option<&HandleError>, Option<Value>, &RequestContext) -> Value + Send + Sync + 'static,
    {
        self.data = Some(Arc::new(f));
        self
    }

    pub fn mock<G>(mut self, generator: G) -> Self
    where
        G: MockGenerator + 'static,
    {
        self.mock = Some(Arc::new(generator));
        self
    }

    pub(crate) fn run_before(&self, data: Value, ctx: &RequestContext) -> Result<Value, HandleError> {
        match &self.before {
            Some(f) => f(data, ctx),
            None => Ok(data),
        }
    }

    pub(crate) fn run_after(&self, result: Value, ctx: &RequestContext) -> Result<Value, HandleError> {
        match &self.after {
            Some(f) => f(result, ctx),
            None => Ok(result),
        }
    }

    /// Final response: the `data` hook's body with 200, or the error's status.
    pub(crate) fn respond(&self, result: Result<Value, HandleError>, ctx: &RequestContext) -> Response {
        let (status, body) = match result {
            Ok(value) => {
                let body = match &self.data {
                    Some(f) => f(None, Some(value), ctx),
                    None => success_body(value),
                };
                (StatusCode::OK, body)
            }
            Err(err) => {
                let (status, _) = err.status_and_code();
                let body = match &self.data {
                    Some(f) => f(Some(&err), None, ctx),
                    None => error_body_for(&err),
                };
                (status, body)
            }
        };
        (status, Json(body)).into_response()
    }
}

impl fmt::Debug for HandleOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandleOptions")
            .field("before", &self.before.is_some())
            .field("after", &self.after.is_some())
            .field("data", &self.data.is_some())
            .field("mock", &self.mock.is_some())
            .finish()
    }
}
