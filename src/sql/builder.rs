//! Builds parameterized SELECT, INSERT, UPDATE, DELETE from a resolved entity and query options.
//!
//! Every statement yields rows of a single JSON column, so results decode the same way
//! whatever the entity looks like.

use crate::config::{IncludeDirection, IncludeSpec, ResolvedEntity, ResolvedModel};
use crate::error::HandleError;
use crate::sql::find::{FindOptions, OrderTerm};
use crate::sql::render_where;
use serde_json::{Map, Value};

/// Alias of the entity's table in SELECT statements.
pub const MAIN_ALIAS: &str = "main";

/// Quote identifier for PostgreSQL (safe: only from config).
pub fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

/// Full qualified table name.
fn qualified_table(schema: &str, table: &str) -> String {
    format!("{}.{}", quoted(schema), quoted(table))
}

fn entity_table(entity: &ResolvedEntity) -> String {
    qualified_table(&entity.schema_name, &entity.table_name)
}

#[derive(Debug)]
pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<Value>,
}

impl QueryBuf {
    pub fn new() -> Self {
        QueryBuf {
            sql: String::new(),
            params: Vec::new(),
        }
    }

    fn push_param(&mut self, v: Value) -> u32 {
        let n = self.params.len() as u32 + 1;
        self.params.push(v);
        n
    }

    /// Adds a parameter and returns its placeholder cast to `pg_type`.
    pub fn typed_param(&mut self, v: Value, pg_type: &str) -> String {
        let n = self.push_param(v);
        format!("${}::{}", n, pg_type)
    }
}

impl Default for QueryBuf {
    fn default() -> Self {
        Self::new()
    }
}

fn column_list(entity: &ResolvedEntity, alias: Option<&str>) -> String {
    entity
        .columns
        .iter()
        .map(|c| match alias {
            Some(a) => format!("{}.{}", a, quoted(&c.name)),
            None => quoted(&c.name),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn attribute_list(entity: &ResolvedEntity, attributes: Option<&[String]>) -> Result<Vec<String>, HandleError> {
    match attributes {
        None => Ok(entity
            .columns
            .iter()
            .map(|c| format!("{}.{}", MAIN_ALIAS, quoted(&c.name)))
            .collect()),
        Some(names) => names
            .iter()
            .map(|n| {
                entity
                    .column(n)
                    .map(|_| format!("{}.{}", MAIN_ALIAS, quoted(n)))
                    .ok_or_else(|| HandleError::UnknownColumn(n.clone()))
            })
            .collect(),
    }
}

/// Correlated subquery for one include: row_to_json for to_one, json_agg for to_many.
fn include_subquery(inc: &IncludeSpec, related: &ResolvedEntity) -> String {
    let rel_cols = column_list(related, None);
    let sub_from = format!(
        "{} WHERE {} = {}.{}",
        entity_table(related),
        quoted(&inc.their_key_column),
        MAIN_ALIAS,
        quoted(&inc.our_key_column)
    );
    let subquery = match inc.direction {
        IncludeDirection::ToOne => format!(
            "(SELECT row_to_json(inc) FROM (SELECT {} FROM {} LIMIT 1) inc)",
            rel_cols, sub_from
        ),
        IncludeDirection::ToMany => format!(
            "(SELECT COALESCE(json_agg(row_to_json(inc)), '[]'::json) FROM (SELECT {} FROM {} ORDER BY {}) inc)",
            rel_cols,
            sub_from,
            quoted(&related.pk_column)
        ),
    };
    format!("{} AS {}", subquery, quoted(&inc.name))
}

fn where_sql(
    entity: &ResolvedEntity,
    filter: Option<&Value>,
    alias: Option<&str>,
    q: &mut QueryBuf,
) -> Result<String, HandleError> {
    let Some(filter) = filter else {
        return Ok(String::new());
    };
    Ok(render_where(entity, filter, alias, q)?
        .map(|w| format!(" WHERE {}", w))
        .unwrap_or_default())
}

/// Like [`where_sql`] but fails when the filter renders to nothing.
fn required_where_sql(
    entity: &ResolvedEntity,
    filter: Option<&Value>,
    op: &str,
    q: &mut QueryBuf,
) -> Result<String, HandleError> {
    let rendered = match filter {
        Some(f) => render_where(entity, f, None, q)?,
        None => None,
    };
    rendered
        .map(|w| format!(" WHERE {}", w))
        .ok_or_else(|| HandleError::BadRequest(format!("{} requires a where clause", op)))
}

fn order_sql(entity: &ResolvedEntity, order: &[OrderTerm]) -> Result<String, HandleError> {
    if order.is_empty() {
        return Ok(format!(" ORDER BY {}.{}", MAIN_ALIAS, quoted(&entity.pk_column)));
    }
    let mut terms = Vec::with_capacity(order.len());
    for t in order {
        if entity.column(&t.column).is_none() {
            return Err(HandleError::UnknownColumn(t.column.clone()));
        }
        terms.push(format!("{}.{} {}", MAIN_ALIAS, quoted(&t.column), t.direction.as_sql()));
    }
    Ok(format!(" ORDER BY {}", terms.join(", ")))
}

/// SELECT rows as JSON objects with attributes, includes, where, order, limit (capped at max_limit) and offset.
pub fn select(model: &ResolvedModel, entity: &ResolvedEntity, find: &FindOptions) -> Result<QueryBuf, HandleError> {
    let mut q = QueryBuf::new();
    let mut select_parts = attribute_list(entity, find.attributes.as_deref())?;
    for name in &find.include {
        let inc = entity
            .include(name)
            .ok_or_else(|| HandleError::UnknownInclude(name.clone()))?;
        let related = model
            .entity(&inc.related)
            .ok_or_else(|| HandleError::UnknownInclude(inc.related.clone()))?;
        select_parts.push(include_subquery(inc, related));
    }
    let where_clause = where_sql(entity, find.filter.as_ref(), Some(MAIN_ALIAS), &mut q)?;
    let order_clause = order_sql(entity, &find.order)?;
    let limit = find.limit.unwrap_or(entity.max_limit).min(entity.max_limit);
    let offset_clause = find.offset.map(|n| format!(" OFFSET {}", n)).unwrap_or_default();
    q.sql = format!(
        "SELECT row_to_json(sub) FROM (SELECT {} FROM {} {}{}{} LIMIT {}{}) sub",
        select_parts.join(", "),
        entity_table(entity),
        MAIN_ALIAS,
        where_clause,
        order_clause,
        limit,
        offset_clause
    );
    Ok(q)
}

/// SELECT to_json(COUNT(*)) with the where clause only.
pub fn count(entity: &ResolvedEntity, find: &FindOptions) -> Result<QueryBuf, HandleError> {
    let mut q = QueryBuf::new();
    let where_clause = where_sql(entity, find.filter.as_ref(), Some(MAIN_ALIAS), &mut q)?;
    q.sql = format!(
        "SELECT to_json(COUNT(*)) FROM {} {}{}",
        entity_table(entity),
        MAIN_ALIAS,
        where_clause
    );
    Ok(q)
}

#[derive(Clone, Copy, Debug)]
pub enum Aggregate {
    Max,
    Min,
    Sum,
}

impl Aggregate {
    fn as_sql(self) -> &'static str {
        match self {
            Aggregate::Max => "MAX",
            Aggregate::Min => "MIN",
            Aggregate::Sum => "SUM",
        }
    }
}

/// SELECT to_json(MAX|MIN|SUM(field)) with the where clause.
pub fn aggregate(
    entity: &ResolvedEntity,
    func: Aggregate,
    field: &str,
    find: &FindOptions,
) -> Result<QueryBuf, HandleError> {
    if entity.column(field).is_none() {
        return Err(HandleError::UnknownColumn(field.to_string()));
    }
    let mut q = QueryBuf::new();
    let where_clause = where_sql(entity, find.filter.as_ref(), Some(MAIN_ALIAS), &mut q)?;
    q.sql = format!(
        "SELECT to_json({}({}.{})) FROM {} {}{}",
        func.as_sql(),
        MAIN_ALIAS,
        quoted(field),
        entity_table(entity),
        MAIN_ALIAS,
        where_clause
    );
    Ok(q)
}

/// Columns written by INSERT/UPDATE: present in the values, known to the entity and allowed by `fields`.
fn writable<'a>(
    entity: &'a ResolvedEntity,
    values: &'a Map<String, Value>,
    fields: Option<&'a [String]>,
) -> impl Iterator<Item = (&'a crate::config::ColumnInfo, &'a Value)> + 'a {
    entity.columns.iter().filter_map(move |c| {
        if let Some(allowed) = fields {
            if !allowed.iter().any(|f| *f == c.name) {
                return None;
            }
        }
        values.get(&c.name).map(|v| (c, v))
    })
}

/// INSERT one row; columns come from values the entity knows, unknown keys are ignored.
pub fn insert(entity: &ResolvedEntity, values: &Map<String, Value>, fields: Option<&[String]>) -> QueryBuf {
    let mut q = QueryBuf::new();
    let table = entity_table(entity);
    let mut cols = Vec::new();
    let mut placeholders = Vec::new();
    for (c, v) in writable(entity, values, fields) {
        cols.push(quoted(&c.name));
        placeholders.push(q.typed_param(v.clone(), &c.pg_type));
    }
    let insert = if cols.is_empty() {
        format!("INSERT INTO {} DEFAULT VALUES", table)
    } else {
        format!("INSERT INTO {} ({}) VALUES ({})", table, cols.join(", "), placeholders.join(", "))
    };
    q.sql = format!("WITH ins AS ({} RETURNING *) SELECT row_to_json(ins) FROM ins", insert);
    q
}

/// INSERT ... ON CONFLICT (pk) DO UPDATE for every written non-key column.
pub fn upsert(entity: &ResolvedEntity, values: &Map<String, Value>, fields: Option<&[String]>) -> QueryBuf {
    let mut q = QueryBuf::new();
    let table = entity_table(entity);
    let mut cols = Vec::new();
    let mut placeholders = Vec::new();
    let mut updates = Vec::new();
    for (c, v) in writable(entity, values, fields) {
        cols.push(quoted(&c.name));
        placeholders.push(q.typed_param(v.clone(), &c.pg_type));
        if !c.primary_key {
            updates.push(format!("{} = EXCLUDED.{}", quoted(&c.name), quoted(&c.name)));
        }
    }
    let action = if updates.is_empty() {
        "DO NOTHING".to_string()
    } else {
        format!("DO UPDATE SET {}", updates.join(", "))
    };
    let insert = if cols.is_empty() {
        format!("INSERT INTO {} DEFAULT VALUES", table)
    } else {
        format!(
            "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT ({}) {}",
            table,
            cols.join(", "),
            placeholders.join(", "),
            quoted(&entity.pk_column),
            action
        )
    };
    q.sql = format!("WITH ups AS ({} RETURNING *) SELECT row_to_json(ups) FROM ups", insert);
    q
}

/// UPDATE rows matching the where clause: SET only columns present in values, never the primary key.
/// Touches `updated_at` when the entity has it and the values do not set it.
pub fn update(
    entity: &ResolvedEntity,
    values: &Map<String, Value>,
    find: &FindOptions,
    fields: Option<&[String]>,
) -> Result<QueryBuf, HandleError> {
    let mut q = QueryBuf::new();
    let mut sets = Vec::new();
    for (c, v) in writable(entity, values, fields) {
        if c.primary_key {
            continue;
        }
        let rhs = q.typed_param(v.clone(), &c.pg_type);
        sets.push(format!("{} = {}", quoted(&c.name), rhs));
    }
    if sets.is_empty() {
        return Err(HandleError::Validation("nothing to update".into()));
    }
    if entity.column("updated_at").is_some() && !values.contains_key("updated_at") {
        sets.push(format!("{} = NOW()", quoted("updated_at")));
    }
    let where_clause = required_where_sql(entity, find.filter.as_ref(), "update", &mut q)?;
    q.sql = format!(
        "WITH upd AS (UPDATE {} SET {}{} RETURNING *) SELECT row_to_json(upd) FROM upd",
        entity_table(entity),
        sets.join(", "),
        where_clause
    );
    Ok(q)
}

/// DELETE rows matching the where clause.
pub fn delete(entity: &ResolvedEntity, find: &FindOptions) -> Result<QueryBuf, HandleError> {
    let mut q = QueryBuf::new();
    let where_clause = required_where_sql(entity, find.filter.as_ref(), "destroy", &mut q)?;
    q.sql = format!(
        "WITH del AS (DELETE FROM {}{} RETURNING *) SELECT row_to_json(del) FROM del",
        entity_table(entity),
        where_clause
    );
    Ok(q)
}
