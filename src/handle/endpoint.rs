//! A generated request handler and its conversion into an axum route.

use axum::{
    extract::Request,
    http::Method as HttpMethod,
    response::Response,
    routing::{self, MethodRouter},
};
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::error::HandleError;
use crate::extractors::{request_data, RequestContext};
use crate::handle::hooks::{HandleOptions, HookFn};

pub(crate) type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;

/// Work done between the before and after hooks.
pub(crate) type RunFn = dyn Fn(Value, RequestContext) -> BoxFuture<Result<Value, HandleError>> + Send + Sync;

/// Handler answering one HTTP verb. Mount it with `MethodRouter::from(endpoint)`.
#[derive(Clone)]
pub struct Endpoint {
    verb: HttpMethod,
    options: Arc<HandleOptions>,
    run: Arc<RunFn>,
    before: Vec<Arc<HookFn>>,
    after: Vec<Arc<HookFn>>,
}

impl Endpoint {
    pub(crate) fn new(verb: HttpMethod, options: Arc<HandleOptions>, run: Arc<RunFn>) -> Self {
        Endpoint {
            verb,
            options,
            run,
            before: Vec::new(),
            after: Vec::new(),
        }
    }

    pub fn verb(&self) -> &HttpMethod {
        &self.verb
    }

    /// Local before hook, run after the global one.
    pub fn before<F>(mut self, f: F) -> Self
    where
        F: Fn(Value, &RequestContext) -> Result<Value, HandleError> + Send + Sync + 'static,
    {
        self.before.push(Arc::new(f));
        self
    }

    /// Local after hook, run after the global one.
    pub fn after<F>(mut self, f: F) -> Self
    where
        F: Fn(Value, &RequestContext) -> Result<Value, HandleError> + Send + Sync + 'static,
    {
        self.after.push(Arc::new(f));
        self
    }

    pub async fn call(&self, req: Request) -> Response {
        let (parts, body) = req.into_parts();
        let ctx = RequestContext::from_parts(&parts);
        let data = match request_data(&self.verb, &ctx.uri, body).await {
            Ok(data) => data,
            Err(e) => return self.finish(Err(e), &ctx),
        };
        let result = self.execute(data, &ctx).await;
        self.finish(result, &ctx)
    }

    async fn execute(&self, data: Value, ctx: &RequestContext) -> Result<Value, HandleError> {
        let data = self.options.run_before(data, ctx)?;
        let data = self.before.iter().try_fold(data, |d, hook| hook(d, ctx))?;
        let result = (self.run)(data, ctx.clone()).await?;
        let result = self.options.run_after(result, ctx)?;
        self.after.iter().try_fold(result, |r, hook| hook(r, ctx))
    }

    fn finish(&self, result: Result<Value, HandleError>, ctx: &RequestContext) -> Response {
        if let Err(e) = &result {
            tracing::warn!(method = %ctx.method, uri = %ctx.uri, error = %e, "request failed");
        }
        self.options.respond(result, ctx)
    }

    pub fn into_method_router<S>(self) -> MethodRouter<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        let verb = self.verb.clone();
        let handler = move |req: Request| {
            let endpoint = self.clone();
            async move { endpoint.call(req).await }
        };
        match verb {
            HttpMethod::POST => routing::post(handler),
            HttpMethod::PUT => routing::put(handler),
            HttpMethod::PATCH => routing::patch(handler),
            HttpMethod::DELETE => routing::delete(handler),
            HttpMethod::GET => routing::get(handler),
            _ => routing::any(handler),
        }
    }
}

impl<S> From<Endpoint> for MethodRouter<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn from(endpoint: Endpoint) -> Self {
        endpoint.into_method_router()
    }
}
