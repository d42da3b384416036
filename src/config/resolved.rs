//! Resolved entity model: config validated and flattened for runtime use.

use serde_json::Value;
use std::collections::HashMap;

/// Direction of a related include: to_one (a single row or null) or to_many (an array).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IncludeDirection {
    ToOne,
    ToMany,
}

/// Spec for including a related entity in query results.
#[derive(Clone, Debug)]
pub struct IncludeSpec {
    pub name: String,
    pub direction: IncludeDirection,
    /// Name of the related entity (for lookup in model).
    pub related: String,
    /// Our column used in the join.
    pub our_key_column: String,
    /// Their column used in the join.
    pub their_key_column: String,
}

#[derive(Clone, Debug)]
pub struct ColumnInfo {
    pub name: String,
    /// PostgreSQL type name used to cast bound text parameters (e.g. "int8", "timestamptz").
    pub pg_type: String,
    pub nullable: bool,
    pub has_default: bool,
    pub primary_key: bool,
}

#[derive(Clone, Debug)]
pub struct ResolvedEntity {
    pub name: String,
    pub schema_name: String,
    pub table_name: String,
    pub pk_column: String,
    pub columns: Vec<ColumnInfo>,
    pub includes: Vec<IncludeSpec>,
    pub scopes: HashMap<String, Value>,
    pub max_limit: u64,
}

impl ResolvedEntity {
    pub fn column(&self, name: &str) -> Option<&ColumnInfo> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn include(&self, name: &str) -> Option<&IncludeSpec> {
        self.includes.iter().find(|i| i.name == name)
    }
}

#[derive(Clone, Debug)]
pub struct ResolvedModel {
    pub entities: Vec<ResolvedEntity>,
    pub entity_by_name: HashMap<String, ResolvedEntity>,
}

impl ResolvedModel {
    pub fn entity(&self, name: &str) -> Option<&ResolvedEntity> {
        self.entity_by_name.get(name)
    }
}
