//! Renders a JSON where clause into SQL with bound parameters.
//!
//! `{col: v}` is equality, `{col: null}` is `IS NULL`, `{col: [..]}` is `IN`, `{col: {op: v}}`
//! applies operators, and `and`/`or` keys group nested clauses. Operator and group keys
//! may carry a `$` prefix.

use serde_json::{Map, Value};

use crate::config::ResolvedEntity;
use crate::error::HandleError;
use crate::sql::{quoted, QueryBuf};

/// Where clause text without the `WHERE` keyword, or `None` for an empty clause.
pub fn render_where(
    entity: &ResolvedEntity,
    filter: &Value,
    alias: Option<&str>,
    q: &mut QueryBuf,
) -> Result<Option<String>, HandleError> {
    let r = Renderer { entity, alias };
    r.group(filter, q)
}

struct Renderer<'a> {
    entity: &'a ResolvedEntity,
    alias: Option<&'a str>,
}

impl Renderer<'_> {
    fn group(&self, filter: &Value, q: &mut QueryBuf) -> Result<Option<String>, HandleError> {
        match filter {
            Value::Null => Ok(None),
            Value::Object(map) => self.object(map, q),
            Value::Array(items) => self.join(items, " AND ", q),
            other => Err(HandleError::InvalidOptions(format!("invalid where clause: {}", other))),
        }
    }

    fn object(&self, map: &Map<String, Value>, q: &mut QueryBuf) -> Result<Option<String>, HandleError> {
        let mut parts = Vec::new();
        for (key, value) in map {
            let part = match key.trim_start_matches('$') {
                "and" => self.connective(value, " AND ", q)?.map(|s| format!("({})", s)),
                "or" => self.connective(value, " OR ", q)?.map(|s| format!("({})", s)),
                "not" => self.group(value, q)?.map(|s| format!("NOT ({})", s)),
                _ => Some(self.column(key, value, q)?),
            };
            if let Some(p) = part {
                parts.push(p);
            }
        }
        Ok(match parts.len() {
            0 => None,
            1 => parts.pop(),
            _ => Some(parts.join(" AND ")),
        })
    }

    fn connective(&self, value: &Value, sep: &str, q: &mut QueryBuf) -> Result<Option<String>, HandleError> {
        match value {
            Value::Array(items) => self.join(items, sep, q),
            // {"or": {"a": 1, "b": 2}} means a = 1 OR b = 2
            Value::Object(map) => {
                let items: Vec<Value> = map
                    .iter()
                    .map(|(k, v)| {
                        let mut m = Map::new();
                        m.insert(k.clone(), v.clone());
                        Value::Object(m)
                    })
                    .collect();
                self.join(&items, sep, q)
            }
            other => Err(HandleError::InvalidOptions(format!("invalid group: {}", other))),
        }
    }

    fn join(&self, items: &[Value], sep: &str, q: &mut QueryBuf) -> Result<Option<String>, HandleError> {
        let mut parts = Vec::new();
        for item in items {
            if let Some(p) = self.group(item, q)? {
                parts.push(format!("({})", p));
            }
        }
        Ok(if parts.is_empty() {
            None
        } else {
            Some(parts.join(sep))
        })
    }

    fn column_ref(&self, name: &str) -> Result<(String, &str), HandleError> {
        let col = self
            .entity
            .column(name)
            .ok_or_else(|| HandleError::UnknownColumn(name.to_string()))?;
        let lhs = match self.alias {
            Some(a) => format!("{}.{}", a, quoted(name)),
            None => quoted(name),
        };
        Ok((lhs, col.pg_type.as_str()))
    }

    fn column(&self, name: &str, value: &Value, q: &mut QueryBuf) -> Result<String, HandleError> {
        let (lhs, ty) = self.column_ref(name)?;
        match value {
            Value::Null => Ok(format!("{} IS NULL", lhs)),
            Value::Array(items) => Ok(in_list(&lhs, ty, items, false, q)),
            Value::Object(ops) => {
                let mut parts = Vec::with_capacity(ops.len());
                for (op, operand) in ops {
                    parts.push(operator(&lhs, ty, op, operand, q)?);
                }
                if parts.is_empty() {
                    return Err(HandleError::InvalidOptions(format!("empty operator object for {}", name)));
                }
                Ok(parts.join(" AND "))
            }
            scalar => Ok(format!("{} = {}", lhs, q.typed_param(scalar.clone(), ty))),
        }
    }
}

fn in_list(lhs: &str, ty: &str, items: &[Value], negate: bool, q: &mut QueryBuf) -> String {
    if items.is_empty() {
        return if negate { "1 = 1".into() } else { "1 = 0".into() };
    }
    let placeholders: Vec<String> = items.iter().map(|v| q.typed_param(v.clone(), ty)).collect();
    format!(
        "{} {}IN ({})",
        lhs,
        if negate { "NOT " } else { "" },
        placeholders.join(", ")
    )
}

fn operator(lhs: &str, ty: &str, op: &str, operand: &Value, q: &mut QueryBuf) -> Result<String, HandleError> {
    let op_name = op.trim_start_matches('$');
    let cmp = |sym: &str, q: &mut QueryBuf| format!("{} {} {}", lhs, sym, q.typed_param(operand.clone(), ty));
    let text_cmp = |sym: &str, q: &mut QueryBuf| {
        format!("{}::text {} {}", lhs, sym, q.typed_param(operand.clone(), "text"))
    };
    Ok(match op_name {
        "eq" if operand.is_null() => format!("{} IS NULL", lhs),
        "ne" if operand.is_null() => format!("{} IS NOT NULL", lhs),
        "eq" => cmp("=", q),
        "ne" => cmp("<>", q),
        "gt" => cmp(">", q),
        "gte" => cmp(">=", q),
        "lt" => cmp("<", q),
        "lte" => cmp("<=", q),
        "like" => text_cmp("LIKE", q),
        "notLike" => text_cmp("NOT LIKE", q),
        "iLike" => text_cmp("ILIKE", q),
        "notILike" => text_cmp("NOT ILIKE", q),
        "in" | "notIn" => {
            let items = operand
                .as_array()
                .ok_or_else(|| HandleError::InvalidOptions(format!("{} expects an array", op_name)))?;
            in_list(lhs, ty, items, op_name == "notIn", q)
        }
        "between" | "notBetween" => {
            let pair = operand
                .as_array()
                .filter(|a| a.len() == 2)
                .ok_or_else(|| HandleError::InvalidOptions(format!("{} expects [low, high]", op_name)))?;
            let low = q.typed_param(pair[0].clone(), ty);
            let high = q.typed_param(pair[1].clone(), ty);
            let not = if op_name == "notBetween" { "NOT " } else { "" };
            format!("{} {}BETWEEN {} AND {}", lhs, not, low, high)
        }
        "is" | "not" => {
            let negate = if op_name == "not" { " NOT" } else { "" };
            match operand {
                Value::Null => format!("{} IS{} NULL", lhs, negate),
                Value::Bool(true) => format!("{} IS{} TRUE", lhs, negate),
                Value::Bool(false) => format!("{} IS{} FALSE", lhs, negate),
                other => {
                    return Err(HandleError::InvalidOptions(format!(
                        "{} expects null or a boolean, got {}",
                        op_name, other
                    )))
                }
            }
        }
        _ => return Err(HandleError::InvalidOptions(format!("unknown operator: {}", op))),
    })
}
