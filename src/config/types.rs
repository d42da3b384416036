//! Raw model config types matching the JSON model file.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

fn default_schema() -> String {
    "public".into()
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Schema used by entities that do not set their own.
    #[serde(default = "default_schema")]
    pub schema: String,
    pub entities: Vec<EntityConfig>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EntityConfig {
    pub name: String,
    #[serde(default)]
    pub schema: Option<String>,
    pub table: String,
    pub primary_key: String,
    pub columns: Vec<ColumnConfig>,
    #[serde(default)]
    pub relations: Vec<RelationConfig>,
    /// Named scopes: options merged under every call made through `scoped`.
    #[serde(default)]
    pub scopes: HashMap<String, Value>,
    /// Upper bound applied to `limit`.
    #[serde(default)]
    pub max_limit: Option<u64>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColumnTypeConfig {
    Simple(String),
    Parameterized { name: String, params: Option<Vec<u32>> },
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ColumnConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub type_: ColumnTypeConfig,
    #[serde(default)]
    pub nullable: bool,
    /// Present when the database fills the column (serial, `now()`, ...).
    #[serde(default)]
    pub default: Option<Value>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationKind {
    /// We hold `foreign_key` pointing at the target.
    BelongsTo,
    /// The target holds `foreign_key` pointing at us; one row.
    HasOne,
    /// The target holds `foreign_key` pointing at us; many rows.
    HasMany,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RelationConfig {
    /// Include name, e.g. `"author"`.
    pub name: String,
    pub kind: RelationKind,
    /// Target entity name.
    pub target: String,
    pub foreign_key: String,
    /// Referenced key; defaults to the primary key of the referenced side.
    #[serde(default)]
    pub target_key: Option<String>,
}
