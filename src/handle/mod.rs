//! Handler generation: one shortcut endpoint or raw call per model method.

mod endpoint;
mod flow;
mod hooks;

pub use endpoint::Endpoint;
pub use flow::Flow;
pub use hooks::{DataFn, HandleOptions, HookFn};

use axum::http::Method as HttpMethod;
use serde_json::Value;
use std::future::Future;
use std::sync::{Arc, Mutex};

use crate::error::HandleError;
use crate::extractors::RequestContext;
use crate::model::{CallArgs, Method, Model};
use crate::options::{get_options, OptionDescriptor};
use crate::scopes::{mixin_scopes, Scope};
use endpoint::{BoxFuture, RunFn};

/// Generates endpoints and raw calls for one model.
///
/// Default scopes apply to every endpoint created afterwards. Scopes set with
/// [`Handle::scope`] are consumed by the next shortcut, `toggle` or raw call.
pub struct Handle {
    model: Arc<dyn Model>,
    options: Arc<HandleOptions>,
    default_scopes: Vec<Scope>,
    scopes: Mutex<Vec<Scope>>,
}

macro_rules! shortcuts {
    ($($fn_name:ident => $method:ident),* $(,)?) => {
        $(
            pub fn $fn_name(&self, descriptor: impl Into<OptionDescriptor>) -> Endpoint {
                self.shortcut(Method::$method, descriptor)
            }
        )*
    };
}

impl Handle {
    pub fn new<M>(model: M, options: HandleOptions) -> Self
    where
        M: Model + 'static,
    {
        Self::from_arc(Arc::new(model), options)
    }

    pub fn from_arc(model: Arc<dyn Model>, options: HandleOptions) -> Self {
        Handle {
            model,
            options: Arc::new(options),
            default_scopes: Vec::new(),
            scopes: Mutex::new(Vec::new()),
        }
    }

    pub fn model(&self) -> &Arc<dyn Model> {
        &self.model
    }

    /// Appends scopes applied to every method.
    pub fn default_scope(&mut self, scopes: impl IntoIterator<Item = Scope>) -> &mut Self {
        self.default_scopes.extend(scopes);
        self
    }

    /// Replaces the one-shot method scopes.
    pub fn scope(&self, scopes: impl IntoIterator<Item = Scope>) -> &Self {
        let mut guard = self.scopes.lock().unwrap_or_else(|e| e.into_inner());
        *guard = scopes.into_iter().collect();
        self
    }

    /// A handle over the model restricted by its named scopes, with the same hooks.
    pub fn raw_scope<I, S>(&self, names: I) -> Result<Handle, HandleError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        Ok(Handle {
            model: self.model.scoped(&names)?,
            options: self.options.clone(),
            default_scopes: Vec::new(),
            scopes: Mutex::new(Vec::new()),
        })
    }

    fn snapshot(&self) -> (Arc<[Scope]>, Arc<[Scope]>) {
        let defaults: Arc<[Scope]> = self.default_scopes.clone().into();
        let method: Arc<[Scope]> = take_scopes(&self.scopes).into();
        (defaults, method)
    }

    /// Endpoint that runs `method` with options derived from `descriptor`.
    pub fn shortcut(&self, method: Method, descriptor: impl Into<OptionDescriptor>) -> Endpoint {
        let descriptor = descriptor.into();
        let model = self.model.clone();
        let (defaults, scopes) = self.snapshot();
        let run: Arc<RunFn> = Arc::new(move |data: Value, ctx: RequestContext| -> BoxFuture<Result<Value, HandleError>> {
            let model = model.clone();
            let descriptor = descriptor.clone();
            let defaults = defaults.clone();
            let scopes = scopes.clone();
            Box::pin(async move {
                invoke(model.as_ref(), method, &descriptor, &data, None, &ctx, &defaults, &scopes).await
            })
        });
        Endpoint::new(method.http_method(), self.options.clone(), run)
    }

    shortcuts! {
        find_all => FindAll,
        find_one => FindOne,
        find_by_pk => FindByPk,
        find_and_count_all => FindAndCountAll,
        count => Count,
        max => Max,
        min => Min,
        sum => Sum,
        describe => Describe,
        create => Create,
        bulk_create => BulkCreate,
        upsert => Upsert,
        find_or_create => FindOrCreate,
        update => Update,
        destroy => Destroy,
    }

    /// Calls `method` directly and returns its result. No hooks run.
    pub async fn raw(
        &self,
        method: Method,
        descriptor: impl Into<OptionDescriptor>,
        data: Value,
    ) -> Result<Value, HandleError> {
        let descriptor = descriptor.into();
        let scopes = take_scopes(&self.scopes);
        let ctx = RequestContext::detached();
        invoke(
            self.model.as_ref(),
            method,
            &descriptor,
            &data,
            None,
            &ctx,
            &self.default_scopes,
            &scopes,
        )
        .await
    }

    /// Endpoint running `f` between one global before and one global after.
    pub fn process<F, Fut>(&self, verb: HttpMethod, f: F) -> Endpoint
    where
        F: Fn(Flow) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, HandleError>> + Send + 'static,
    {
        let model = self.model.clone();
        let defaults: Arc<[Scope]> = self.default_scopes.clone().into();
        let f = Arc::new(f);
        let run: Arc<RunFn> = Arc::new(move |data: Value, ctx: RequestContext| -> BoxFuture<Result<Value, HandleError>> {
            let flow = Flow::new(model.clone(), defaults.clone(), data, ctx);
            let f = f.clone();
            Box::pin(async move { f(flow).await })
        });
        Endpoint::new(verb, self.options.clone(), run)
    }

    /// Like [`Handle::process`], with the flow's model inside a transaction.
    /// Commits when `f` succeeds and rolls back when it fails.
    pub fn transaction<F, Fut>(&self, verb: HttpMethod, f: F) -> Endpoint
    where
        F: Fn(Flow) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, HandleError>> + Send + 'static,
    {
        let model = self.model.clone();
        let defaults: Arc<[Scope]> = self.default_scopes.clone().into();
        let f = Arc::new(f);
        let run: Arc<RunFn> = Arc::new(move |data: Value, ctx: RequestContext| -> BoxFuture<Result<Value, HandleError>> {
            let model = model.clone();
            let defaults = defaults.clone();
            let f = f.clone();
            Box::pin(async move {
                let tx = model.begin().await?;
                tracing::debug!(model = model.name(), "transaction begin");
                let flow = Flow::new(tx.model(), defaults, data, ctx);
                match f(flow).await {
                    Ok(result) => {
                        tx.commit().await?;
                        tracing::debug!(model = model.name(), "transaction commit");
                        Ok(result)
                    }
                    Err(e) => {
                        if let Err(rollback) = tx.rollback().await {
                            tracing::warn!(model = model.name(), error = %rollback, "rollback failed");
                        } else {
                            tracing::debug!(model = model.name(), "transaction rollback");
                        }
                        Err(e)
                    }
                }
            })
        });
        Endpoint::new(verb, self.options.clone(), run)
    }

    /// POST endpoint: destroys the row matched by `descriptor`, or creates one from the request data.
    pub fn toggle(&self, descriptor: impl Into<OptionDescriptor>) -> Endpoint {
        let descriptor = descriptor.into();
        let model = self.model.clone();
        let (defaults, scopes) = self.snapshot();
        let run: Arc<RunFn> = Arc::new(move |data: Value, ctx: RequestContext| -> BoxFuture<Result<Value, HandleError>> {
            let model = model.clone();
            let descriptor = descriptor.clone();
            let defaults = defaults.clone();
            let scopes = scopes.clone();
            Box::pin(async move { toggle_on(model.as_ref(), &descriptor, &data, &ctx, &defaults, &scopes).await })
        });
        Endpoint::new(HttpMethod::POST, self.options.clone(), run)
    }

    /// POST endpoint bulk-creating rows from the configured mock generator.
    /// Default and pending method scopes shape the bulkCreate options.
    pub fn mock(&self, rule: Value) -> Result<Endpoint, HandleError> {
        let generator = self.options.mock.clone().ok_or(HandleError::MockUnavailable)?;
        let model = self.model.clone();
        let (defaults, scopes) = self.snapshot();
        let run: Arc<RunFn> = Arc::new(move |data: Value, ctx: RequestContext| -> BoxFuture<Result<Value, HandleError>> {
            let model = model.clone();
            let defaults = defaults.clone();
            let scopes = scopes.clone();
            let rows = generator.generate(&rule);
            Box::pin(async move {
                invoke(
                    model.as_ref(),
                    Method::BulkCreate,
                    &OptionDescriptor::None,
                    &data,
                    Some(rows?),
                    &ctx,
                    &defaults,
                    &scopes,
                )
                .await
            })
        });
        Ok(Endpoint::new(HttpMethod::POST, self.options.clone(), run))
    }
}

pub(crate) fn take_scopes(scopes: &Mutex<Vec<Scope>>) -> Vec<Scope> {
    let mut guard = scopes.lock().unwrap_or_else(|e| e.into_inner());
    std::mem::take(&mut *guard)
}

/// Derives options, mixes scopes, shapes arguments by arity and calls the model.
#[allow(clippy::too_many_arguments)]
pub(crate) async fn invoke(
    model: &dyn Model,
    method: Method,
    descriptor: &OptionDescriptor,
    data: &Value,
    values: Option<Value>,
    ctx: &RequestContext,
    default_scopes: &[Scope],
    method_scopes: &[Scope],
) -> Result<Value, HandleError> {
    let options = get_options(descriptor, data, ctx)?;
    let options = mixin_scopes(data, ctx, options, default_scopes, method_scopes)?;
    let values = values.unwrap_or_else(|| data.clone());
    let args = CallArgs::build(model.arity(method), values, options);
    tracing::debug!(model = model.name(), method = method.name(), "model call");
    model.call(method, args).await
}

pub(crate) async fn toggle_on(
    model: &dyn Model,
    descriptor: &OptionDescriptor,
    data: &Value,
    ctx: &RequestContext,
    default_scopes: &[Scope],
    method_scopes: &[Scope],
) -> Result<Value, HandleError> {
    let options = get_options(descriptor, data, ctx)?;
    let options = mixin_scopes(data, ctx, options, default_scopes, method_scopes)?;
    let found = model
        .call(
            Method::FindOne,
            CallArgs::build(model.arity(Method::FindOne), data.clone(), options.clone()),
        )
        .await?;
    if found.is_null() {
        let mut create_opts = options;
        create_opts.remove("where");
        model
            .call(
                Method::Create,
                CallArgs::build(model.arity(Method::Create), data.clone(), create_opts),
            )
            .await
    } else {
        model
            .call(
                Method::Destroy,
                CallArgs::build(model.arity(Method::Destroy), data.clone(), options),
            )
            .await
    }
}
