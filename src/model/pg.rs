//! PostgreSQL model: executes proxied calls against one configured entity.

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use sqlx::{PgPool, Postgres, Row, Transaction};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::config::{IncludeDirection, ResolvedEntity, ResolvedModel};
use crate::error::HandleError;
use crate::model::{CallArgs, Method, Model, ModelTransaction};
use crate::options::{deep_merge, QueryOptions};
use crate::sql::{self, bind_all, Aggregate, FindOptions, QueryBuf};

/// Max rows accepted by one bulkCreate.
pub const BULK_LIMIT: usize = 100;

type SharedTx = Arc<Mutex<Option<Transaction<'static, Postgres>>>>;

#[derive(Clone)]
enum Executor {
    Pool(PgPool),
    Tx(SharedTx),
}

#[derive(Clone)]
pub struct PgModel {
    model: Arc<ResolvedModel>,
    entity: Arc<ResolvedEntity>,
    exec: Executor,
    /// Options from named scopes, merged under every call.
    base: QueryOptions,
}

impl PgModel {
    pub fn new(pool: PgPool, model: Arc<ResolvedModel>, entity: &str) -> Result<Self, HandleError> {
        let resolved = model
            .entity(entity)
            .cloned()
            .ok_or_else(|| HandleError::NotFound(format!("entity '{}'", entity)))?;
        Ok(PgModel {
            model,
            entity: Arc::new(resolved),
            exec: Executor::Pool(pool),
            base: QueryOptions::new(),
        })
    }

    pub fn entity(&self) -> &ResolvedEntity {
        &self.entity
    }

    fn with_base(&self, options: QueryOptions) -> QueryOptions {
        if self.base.is_empty() {
            return options;
        }
        let mut merged = Value::Object(self.base.clone());
        deep_merge(&mut merged, Value::Object(options));
        match merged {
            Value::Object(m) => m,
            _ => QueryOptions::new(),
        }
    }

    async fn begin_tx(&self) -> Result<(PgModel, SharedTx), HandleError> {
        let Executor::Pool(pool) = &self.exec else {
            return Err(HandleError::Custom("transaction already open".into()));
        };
        let tx = pool.begin().await?;
        let shared: SharedTx = Arc::new(Mutex::new(Some(tx)));
        let mut model = self.clone();
        model.exec = Executor::Tx(shared.clone());
        Ok((model, shared))
    }

    async fn fetch_all(&self, q: &QueryBuf) -> Result<Vec<Value>, HandleError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let query = bind_all(sqlx::query(&q.sql), &q.params);
        let rows = match &self.exec {
            Executor::Pool(pool) => query.fetch_all(pool).await?,
            Executor::Tx(shared) => {
                let mut guard = shared.lock().await;
                let tx = guard
                    .as_mut()
                    .ok_or_else(|| HandleError::Custom("transaction already finished".into()))?;
                query.fetch_all(&mut **tx).await?
            }
        };
        rows.iter()
            .map(|r| r.try_get::<Value, _>(0).map_err(HandleError::from))
            .collect()
    }

    async fn fetch_optional(&self, q: &QueryBuf) -> Result<Value, HandleError> {
        Ok(self.fetch_all(q).await?.into_iter().next().unwrap_or(Value::Null))
    }

    async fn find_all(&self, find: &FindOptions) -> Result<Value, HandleError> {
        let q = sql::select(&self.model, &self.entity, find)?;
        Ok(Value::Array(self.fetch_all(&q).await?))
    }

    async fn find_one(&self, find: &FindOptions) -> Result<Value, HandleError> {
        let mut find = find.clone();
        find.limit = Some(1);
        let q = sql::select(&self.model, &self.entity, &find)?;
        self.fetch_optional(&q).await
    }

    async fn count(&self, find: &FindOptions) -> Result<Value, HandleError> {
        let q = sql::count(&self.entity, find)?;
        self.fetch_optional(&q).await
    }

    async fn aggregate(&self, func: Aggregate, opts: &QueryOptions, find: &FindOptions) -> Result<Value, HandleError> {
        let field = opts
            .get("field")
            .and_then(Value::as_str)
            .ok_or_else(|| HandleError::InvalidOptions("aggregate needs a 'field' option".into()))?;
        let q = sql::aggregate(&self.entity, func, field, find)?;
        self.fetch_optional(&q).await
    }

    async fn find_by_pk(&self, values: &Value, opts: &QueryOptions) -> Result<Value, HandleError> {
        let pk = &self.entity.pk_column;
        let id = match values {
            Value::Object(m) => m.get(pk).cloned().unwrap_or(Value::Null),
            scalar => scalar.clone(),
        };
        if id.is_null() {
            return Err(HandleError::BadRequest(format!("'{}' is required", pk)));
        }
        let mut opts = opts.clone();
        let mut filter = json!({ pk.as_str(): id });
        if let Some(existing) = opts.remove("where") {
            filter = json!({ "and": [existing, filter] });
        }
        opts.insert("where".into(), filter);
        self.find_one(&FindOptions::parse(&opts)?).await
    }

    async fn create(&self, values: &Value, opts: &QueryOptions) -> Result<Value, HandleError> {
        let values = object_values(values)?;
        let fields = field_list(opts)?;
        let q = sql::insert(&self.entity, values, fields.as_deref());
        self.fetch_optional(&q).await
    }

    async fn upsert(&self, values: &Value, opts: &QueryOptions) -> Result<Value, HandleError> {
        let values = object_values(values)?;
        let fields = field_list(opts)?;
        let q = sql::upsert(&self.entity, values, fields.as_deref());
        self.fetch_optional(&q).await
    }

    async fn bulk_create(&self, values: &Value, opts: &QueryOptions) -> Result<Value, HandleError> {
        let items = values
            .as_array()
            .ok_or_else(|| HandleError::BadRequest("bulkCreate values must be a JSON array".into()))?;
        if items.len() > BULK_LIMIT {
            return Err(HandleError::BadRequest(format!(
                "bulk create limited to {} items",
                BULK_LIMIT
            )));
        }
        let fields = field_list(opts)?;
        let mut out = Vec::with_capacity(items.len());
        for item in items {
            let q = sql::insert(&self.entity, object_values(item)?, fields.as_deref());
            out.push(self.fetch_optional(&q).await?);
        }
        Ok(Value::Array(out))
    }

    async fn update(&self, values: &Value, opts: &QueryOptions, find: &FindOptions) -> Result<Value, HandleError> {
        if !find.has_filter() {
            return Err(HandleError::BadRequest("update requires a where clause".into()));
        }
        let values = object_values(values)?;
        let fields = field_list(opts)?;
        let q = sql::update(&self.entity, values, find, fields.as_deref())?;
        let rows = self.fetch_all(&q).await?;
        Ok(affected(rows, opts))
    }

    async fn destroy(&self, opts: &QueryOptions, find: &FindOptions) -> Result<Value, HandleError> {
        if !find.has_filter() {
            return Err(HandleError::BadRequest("destroy requires a where clause".into()));
        }
        let q = sql::delete(&self.entity, find)?;
        let rows = self.fetch_all(&q).await?;
        Ok(affected(rows, opts))
    }

    async fn find_or_create(&self, opts: &QueryOptions, find: &FindOptions) -> Result<Value, HandleError> {
        if !find.has_filter() {
            return Err(HandleError::BadRequest("findOrCreate requires a where clause".into()));
        }
        let found = self.find_one(find).await?;
        if !found.is_null() {
            return Ok(json!([found, false]));
        }
        let mut values = Value::Object(equality_values(find.filter.as_ref()));
        if let Some(defaults) = opts.get("defaults") {
            deep_merge(&mut values, defaults.clone());
        }
        let created = self.create(&values, opts).await?;
        Ok(json!([created, true]))
    }

    fn describe(&self) -> Value {
        let e = &self.entity;
        let columns: Vec<Value> = e
            .columns
            .iter()
            .map(|c| {
                json!({
                    "name": c.name,
                    "type": c.pg_type,
                    "nullable": c.nullable,
                    "hasDefault": c.has_default,
                })
            })
            .collect();
        let includes: Vec<Value> = e
            .includes
            .iter()
            .map(|i| {
                json!({
                    "name": i.name,
                    "entity": i.related,
                    "many": i.direction == IncludeDirection::ToMany,
                })
            })
            .collect();
        json!({
            "name": e.name,
            "schema": e.schema_name,
            "table": e.table_name,
            "primaryKey": e.pk_column,
            "columns": columns,
            "includes": includes,
        })
    }

    async fn dispatch(&self, method: Method, values: Option<Value>, opts: QueryOptions) -> Result<Value, HandleError> {
        let values = values.unwrap_or(Value::Null);
        let find = FindOptions::parse(&opts)?;
        match method {
            Method::FindAll => self.find_all(&find).await,
            Method::FindOne => self.find_one(&find).await,
            Method::FindByPk => self.find_by_pk(&values, &opts).await,
            Method::FindAndCountAll => {
                let count = self.count(&find).await?;
                let rows = self.find_all(&find).await?;
                Ok(json!({ "count": count, "rows": rows }))
            }
            Method::Count => self.count(&find).await,
            Method::Max => self.aggregate(Aggregate::Max, &opts, &find).await,
            Method::Min => self.aggregate(Aggregate::Min, &opts, &find).await,
            Method::Sum => self.aggregate(Aggregate::Sum, &opts, &find).await,
            Method::Describe => Ok(self.describe()),
            Method::Create => self.create(&values, &opts).await,
            Method::Upsert => self.upsert(&values, &opts).await,
            Method::Update => self.update(&values, &opts, &find).await,
            Method::Destroy => self.destroy(&opts, &find).await,
            Method::BulkCreate => self.bulk_create(&values, &opts).await,
            Method::FindOrCreate => self.find_or_create(&opts, &find).await,
        }
    }

    /// Runs a multi-statement call in its own transaction.
    async fn atomic(&self, method: Method, values: Option<Value>, opts: QueryOptions) -> Result<Value, HandleError> {
        let (model, shared) = self.begin_tx().await?;
        let result = model.dispatch(method, values, opts).await;
        let tx = shared.lock().await.take();
        if let Some(tx) = tx {
            if result.is_ok() {
                tx.commit().await?;
            } else if let Err(e) = tx.rollback().await {
                tracing::warn!(error = %e, "rollback failed");
            }
        }
        result
    }
}

fn object_values(values: &Value) -> Result<&Map<String, Value>, HandleError> {
    values
        .as_object()
        .ok_or_else(|| HandleError::BadRequest("values must be a JSON object".into()))
}

fn field_list(opts: &QueryOptions) -> Result<Option<Vec<String>>, HandleError> {
    match opts.get("fields") {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Array(items)) => Ok(Some(
            items.iter().filter_map(Value::as_str).map(str::to_string).collect(),
        )),
        Some(other) => Err(HandleError::InvalidOptions(format!("fields must be an array, got {}", other))),
    }
}

/// Affected row count, or the rows themselves with `returning: true`.
fn affected(rows: Vec<Value>, opts: &QueryOptions) -> Value {
    if opts.get("returning").and_then(Value::as_bool) == Some(true) {
        Value::Array(rows)
    } else {
        json!(rows.len())
    }
}

/// Plain `column = scalar` pairs of a where clause, used as values by findOrCreate.
fn equality_values(filter: Option<&Value>) -> Map<String, Value> {
    let mut out = Map::new();
    if let Some(Value::Object(m)) = filter {
        for (k, v) in m {
            if k.starts_with('$') || matches!(k.as_str(), "and" | "or" | "not") {
                continue;
            }
            if !(v.is_object() || v.is_array() || v.is_null()) {
                out.insert(k.clone(), v.clone());
            }
        }
    }
    out
}

#[async_trait]
impl Model for PgModel {
    fn name(&self) -> &str {
        &self.entity.name
    }

    async fn call(&self, method: Method, args: CallArgs) -> Result<Value, HandleError> {
        let (values, opts) = args.into_parts();
        let opts = self.with_base(opts);
        tracing::debug!(entity = %self.entity.name, method = method.name(), "model call");
        let pooled = matches!(self.exec, Executor::Pool(_));
        match method {
            Method::BulkCreate | Method::FindOrCreate if pooled => self.atomic(method, values, opts).await,
            _ => self.dispatch(method, values, opts).await,
        }
    }

    fn scoped(&self, names: &[String]) -> Result<Arc<dyn Model>, HandleError> {
        let mut base = Value::Object(self.base.clone());
        for name in names {
            let scope = self
                .entity
                .scopes
                .get(name)
                .ok_or_else(|| HandleError::UnknownScope(name.clone()))?;
            deep_merge(&mut base, scope.clone());
        }
        let mut model = self.clone();
        model.base = match base {
            Value::Object(m) => m,
            _ => QueryOptions::new(),
        };
        Ok(Arc::new(model))
    }

    async fn begin(&self) -> Result<Box<dyn ModelTransaction>, HandleError> {
        let (model, shared) = self.begin_tx().await?;
        tracing::debug!(entity = %self.entity.name, "transaction started");
        Ok(Box::new(PgTransaction {
            model: Arc::new(model),
            tx: shared,
        }))
    }
}

struct PgTransaction {
    model: Arc<PgModel>,
    tx: SharedTx,
}

#[async_trait]
impl ModelTransaction for PgTransaction {
    fn model(&self) -> Arc<dyn Model> {
        self.model.clone()
    }

    async fn commit(self: Box<Self>) -> Result<(), HandleError> {
        if let Some(tx) = self.tx.lock().await.take() {
            tx.commit().await?;
            tracing::debug!("transaction committed");
        }
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), HandleError> {
        if let Some(tx) = self.tx.lock().await.take() {
            tx.rollback().await?;
            tracing::debug!("transaction rolled back");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn equality_values_keep_plain_pairs() {
        let filter = json!({"slug": "a", "views": {"gt": 1}, "$or": [], "tags": [1], "owner": null, "n": 3});
        let values = equality_values(Some(&filter));
        assert_eq!(Value::Object(values), json!({"slug": "a", "n": 3}));
    }

    #[test]
    fn affected_counts_or_returns_rows() {
        let rows = vec![json!({"id": 1}), json!({"id": 2})];
        assert_eq!(affected(rows.clone(), &QueryOptions::new()), json!(2));
        let opts = json!({"returning": true}).as_object().cloned().unwrap();
        assert_eq!(affected(rows, &opts), json!([{"id": 1}, {"id": 2}]));
    }

    #[test]
    fn fields_must_be_an_array() {
        let opts = json!({"fields": "title"}).as_object().cloned().unwrap();
        assert!(field_list(&opts).is_err());
        let opts = json!({"fields": ["title"]}).as_object().cloned().unwrap();
        assert_eq!(field_list(&opts).unwrap(), Some(vec!["title".to_string()]));
    }
}
