//! Load model config from JSON and resolve it for runtime use.

use crate::config::resolved::{ColumnInfo, IncludeDirection, IncludeSpec, ResolvedEntity, ResolvedModel};
use crate::config::types::*;
use crate::config::{type_name, validate};
use crate::error::ConfigError;
use std::collections::HashMap;
use std::path::Path;

/// Default cap on `limit` when an entity sets none.
pub const DEFAULT_MAX_LIMIT: u64 = 1000;

/// Read and parse a model config file.
pub async fn load_model_config(path: impl AsRef<Path>) -> Result<ModelConfig, ConfigError> {
    let path = path.as_ref();
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))?;
    parse_model_config(&text)
}

pub fn parse_model_config(text: &str) -> Result<ModelConfig, ConfigError> {
    serde_json::from_str(text).map_err(|e| ConfigError::Load(e.to_string()))
}

/// Build resolved model from config (validates first).
pub fn resolve(config: &ModelConfig) -> Result<ResolvedModel, ConfigError> {
    validate(config)?;
    let by_name: HashMap<&str, &EntityConfig> = config.entities.iter().map(|e| (e.name.as_str(), e)).collect();

    let mut entities = Vec::new();
    let mut entity_by_name = HashMap::new();

    for e in &config.entities {
        let columns = e
            .columns
            .iter()
            .map(|c| ColumnInfo {
                name: c.name.clone(),
                pg_type: column_pg_type_name(&c.type_),
                nullable: c.nullable,
                has_default: c.default.is_some() || is_serial(&c.type_),
                primary_key: c.name == e.primary_key,
            })
            .collect();

        let mut includes = Vec::with_capacity(e.relations.len());
        for r in &e.relations {
            let target = by_name.get(r.target.as_str()).ok_or_else(|| ConfigError::MissingReference {
                kind: "entity",
                id: r.target.clone(),
            })?;
            includes.push(build_include(e, target, r));
        }

        let entity = ResolvedEntity {
            name: e.name.clone(),
            schema_name: e.schema.clone().unwrap_or_else(|| config.schema.clone()),
            table_name: e.table.clone(),
            pk_column: e.primary_key.clone(),
            columns,
            includes,
            scopes: e.scopes.clone(),
            max_limit: e.max_limit.unwrap_or(DEFAULT_MAX_LIMIT),
        };
        entity_by_name.insert(e.name.clone(), entity.clone());
        entities.push(entity);
    }

    Ok(ResolvedModel {
        entities,
        entity_by_name,
    })
}

fn build_include(ours: &EntityConfig, target: &EntityConfig, r: &RelationConfig) -> IncludeSpec {
    match r.kind {
        RelationKind::BelongsTo => IncludeSpec {
            name: r.name.clone(),
            direction: IncludeDirection::ToOne,
            related: target.name.clone(),
            our_key_column: r.foreign_key.clone(),
            their_key_column: r.target_key.clone().unwrap_or_else(|| target.primary_key.clone()),
        },
        RelationKind::HasOne | RelationKind::HasMany => IncludeSpec {
            name: r.name.clone(),
            direction: if r.kind == RelationKind::HasOne {
                IncludeDirection::ToOne
            } else {
                IncludeDirection::ToMany
            },
            related: target.name.clone(),
            our_key_column: r.target_key.clone().unwrap_or_else(|| ours.primary_key.clone()),
            their_key_column: r.foreign_key.clone(),
        },
    }
}

fn is_serial(ty: &ColumnTypeConfig) -> bool {
    type_name(ty).to_lowercase().ends_with("serial")
}

/// Castable PostgreSQL type for a configured column type.
fn column_pg_type_name(ty: &ColumnTypeConfig) -> String {
    let name = type_name(ty);
    let lower = name.to_lowercase();
    match lower.as_str() {
        "smallserial" | "serial2" => "int2".into(),
        "serial" | "serial4" => "int4".into(),
        "bigserial" | "serial8" => "int8".into(),
        "timestamp with time zone" => "timestamptz".into(),
        "timestamp without time zone" => "timestamp".into(),
        // Schema-qualified custom type (e.g. blog.post_status) keeps its case
        _ if name.contains('.') => name.to_string(),
        _ => lower,
    }
}
