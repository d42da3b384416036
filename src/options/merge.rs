//! Recursive merge of JSON option objects.

use serde_json::{Map, Value};

/// Objects merge key by key; any other source value replaces the target.
pub fn deep_merge(target: &mut Value, source: Value) {
    if let Value::Object(src) = source {
        if let Value::Object(dst) = target {
            for (key, value) in src {
                match dst.get_mut(&key) {
                    Some(slot) => deep_merge(slot, value),
                    None => {
                        dst.insert(key, value);
                    }
                }
            }
            return;
        }
        *target = Value::Object(src);
        return;
    }
    *target = source;
}

/// Folds every value into a fresh object, skipping nulls.
pub fn merge_all<I>(values: I) -> Value
where
    I: IntoIterator<Item = Value>,
{
    let mut out = Value::Object(Map::new());
    for v in values {
        if !v.is_null() {
            deep_merge(&mut out, v);
        }
    }
    out
}
