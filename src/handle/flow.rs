//! Caller-driven multi-step flows for `Handle::process` and `Handle::transaction`.

use serde_json::Value;
use std::sync::{Arc, Mutex};

use crate::error::HandleError;
use crate::extractors::RequestContext;
use crate::handle::{invoke, take_scopes, toggle_on};
use crate::model::{Method, Model};
use crate::options::OptionDescriptor;
use crate::scopes::Scope;

/// Request data and model access handed to a process function.
///
/// Raw calls return the model's result instead of writing a response. Scopes set with
/// [`Flow::scope`] apply to the next raw call only. Inside `Handle::transaction` every
/// call runs on the open transaction.
pub struct Flow {
    model: Arc<dyn Model>,
    default_scopes: Arc<[Scope]>,
    scopes: Mutex<Vec<Scope>>,
    data: Value,
    ctx: RequestContext,
}

macro_rules! raw_methods {
    ($($fn_name:ident => $method:ident),* $(,)?) => {
        $(
            pub async fn $fn_name(&self, descriptor: impl Into<OptionDescriptor>) -> Result<Value, HandleError> {
                self.raw(Method::$method, descriptor).await
            }
        )*
    };
}

impl Flow {
    pub(crate) fn new(model: Arc<dyn Model>, default_scopes: Arc<[Scope]>, data: Value, ctx: RequestContext) -> Self {
        Flow {
            model,
            default_scopes,
            scopes: Mutex::new(Vec::new()),
            data,
            ctx,
        }
    }

    /// Request data after the global before hook.
    pub fn data(&self) -> &Value {
        &self.data
    }

    pub fn ctx(&self) -> &RequestContext {
        &self.ctx
    }

    pub fn model(&self) -> &Arc<dyn Model> {
        &self.model
    }

    /// One-shot scopes for the next raw call.
    pub fn scope(&self, scopes: impl IntoIterator<Item = Scope>) -> &Self {
        let mut guard = self.scopes.lock().unwrap_or_else(|e| e.into_inner());
        *guard = scopes.into_iter().collect();
        self
    }

    pub async fn raw(&self, method: Method, descriptor: impl Into<OptionDescriptor>) -> Result<Value, HandleError> {
        let scopes = take_scopes(&self.scopes);
        invoke(
            self.model.as_ref(),
            method,
            &descriptor.into(),
            &self.data,
            None,
            &self.ctx,
            &self.default_scopes,
            &scopes,
        )
        .await
    }

    /// Like [`Flow::raw`], with `values` in place of the request data as the first argument.
    pub async fn raw_with(
        &self,
        method: Method,
        descriptor: impl Into<OptionDescriptor>,
        values: Value,
    ) -> Result<Value, HandleError> {
        let scopes = take_scopes(&self.scopes);
        invoke(
            self.model.as_ref(),
            method,
            &descriptor.into(),
            &self.data,
            Some(values),
            &self.ctx,
            &self.default_scopes,
            &scopes,
        )
        .await
    }

    pub async fn raw_toggle(&self, descriptor: impl Into<OptionDescriptor>) -> Result<Value, HandleError> {
        let scopes = take_scopes(&self.scopes);
        toggle_on(
            self.model.as_ref(),
            &descriptor.into(),
            &self.data,
            &self.ctx,
            &self.default_scopes,
            &scopes,
        )
        .await
    }

    raw_methods! {
        raw_find_all => FindAll,
        raw_find_one => FindOne,
        raw_find_by_pk => FindByPk,
        raw_find_and_count_all => FindAndCountAll,
        raw_count => Count,
        raw_max => Max,
        raw_min => Min,
        raw_sum => Sum,
        raw_describe => Describe,
        raw_create => Create,
        raw_bulk_create => BulkCreate,
        raw_upsert => Upsert,
        raw_find_or_create => FindOrCreate,
        raw_update => Update,
        raw_destroy => Destroy,
    }
}
