//! Data-access contract consumed by handles, and the PostgreSQL implementation.

mod method;
pub mod pg;

pub use method::{CallArgs, Method};
pub use pg::PgModel;

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use crate::error::HandleError;

/// A data model that handles proxy calls to.
#[async_trait]
pub trait Model: Send + Sync {
    fn name(&self) -> &str;

    /// Declared argument count of `method`; decides the shape of [`CallArgs`].
    fn arity(&self, method: Method) -> usize {
        method.arity()
    }

    async fn call(&self, method: Method, args: CallArgs) -> Result<Value, HandleError>;

    /// Same model restricted by named scopes defined on it.
    fn scoped(&self, names: &[String]) -> Result<Arc<dyn Model>, HandleError> {
        let _ = names;
        Err(HandleError::Unsupported("named scopes".into()))
    }

    async fn begin(&self) -> Result<Box<dyn ModelTransaction>, HandleError> {
        Err(HandleError::Unsupported("transactions".into()))
    }
}

/// An open transaction. Calls on `model()` run inside it until commit or rollback.
#[async_trait]
pub trait ModelTransaction: Send {
    fn model(&self) -> Arc<dyn Model>;

    async fn commit(self: Box<Self>) -> Result<(), HandleError>;

    async fn rollback(self: Box<Self>) -> Result<(), HandleError>;
}
