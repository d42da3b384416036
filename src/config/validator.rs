//! Config validation: identifiers, primary keys, relations and scopes.

use crate::config::{ColumnTypeConfig, EntityConfig, ModelConfig, RelationKind};
use crate::error::ConfigError;
use regex::Regex;
use std::collections::{HashMap, HashSet};

const IDENTIFIER: &str = r"^[A-Za-z_][A-Za-z0-9_]*$";
const TYPE_NAME: &str = r"^[A-Za-z_][A-Za-z0-9_ .]*(\[\])?$";

/// Name of a column type as written in config.
pub fn type_name(ty: &ColumnTypeConfig) -> &str {
    match ty {
        ColumnTypeConfig::Simple(s) => s.as_str(),
        ColumnTypeConfig::Parameterized { name, .. } => name.as_str(),
    }
}

pub fn validate(config: &ModelConfig) -> Result<(), ConfigError> {
    let ident = Regex::new(IDENTIFIER).map_err(|e| ConfigError::Load(e.to_string()))?;
    let type_re = Regex::new(TYPE_NAME).map_err(|e| ConfigError::Load(e.to_string()))?;
    let check = |name: &str| -> Result<(), ConfigError> {
        if ident.is_match(name) {
            Ok(())
        } else {
            Err(ConfigError::InvalidIdentifier(name.to_string()))
        }
    };

    check(&config.schema)?;
    let mut by_name: HashMap<&str, &EntityConfig> = HashMap::new();
    for e in &config.entities {
        check(&e.name)?;
        check(&e.table)?;
        if let Some(schema) = &e.schema {
            check(schema)?;
        }
        if by_name.insert(e.name.as_str(), e).is_some() {
            return Err(ConfigError::Duplicate {
                kind: "entity",
                name: e.name.clone(),
            });
        }

        let mut columns = HashSet::new();
        for c in &e.columns {
            check(&c.name)?;
            let ty = type_name(&c.type_);
            if !type_re.is_match(ty) {
                return Err(ConfigError::InvalidIdentifier(ty.to_string()));
            }
            if !columns.insert(c.name.as_str()) {
                return Err(ConfigError::Duplicate {
                    kind: "column",
                    name: format!("{}.{}", e.name, c.name),
                });
            }
        }
        if !columns.contains(e.primary_key.as_str()) {
            return Err(ConfigError::InvalidPrimaryKey {
                table: e.table.clone(),
                column: e.primary_key.clone(),
            });
        }

        for (name, scope) in &e.scopes {
            if !scope.is_object() {
                return Err(ConfigError::Load(format!(
                    "scope '{}' on '{}' must be an object",
                    name, e.name
                )));
            }
        }
    }

    for e in &config.entities {
        let mut relation_names = HashSet::new();
        for r in &e.relations {
            check(&r.name)?;
            if !relation_names.insert(r.name.as_str()) || e.columns.iter().any(|c| c.name == r.name) {
                return Err(ConfigError::Duplicate {
                    kind: "relation",
                    name: format!("{}.{}", e.name, r.name),
                });
            }
            let target = by_name.get(r.target.as_str()).ok_or_else(|| ConfigError::MissingReference {
                kind: "entity",
                id: r.target.clone(),
            })?;
            let (fk_owner, key_owner) = match r.kind {
                RelationKind::BelongsTo => (e, *target),
                RelationKind::HasOne | RelationKind::HasMany => (*target, e),
            };
            if !fk_owner.columns.iter().any(|c| c.name == r.foreign_key) {
                return Err(ConfigError::MissingReference {
                    kind: "column",
                    id: format!("{}.{}", fk_owner.name, r.foreign_key),
                });
            }
            let key = r.target_key.as_deref().unwrap_or(&key_owner.primary_key);
            if !key_owner.columns.iter().any(|c| c.name == key) {
                return Err(ConfigError::MissingReference {
                    kind: "column",
                    id: format!("{}.{}", key_owner.name, key),
                });
            }
        }
    }

    Ok(())
}
