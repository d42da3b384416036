//! Query options: descriptor normalization, deep merge and value coercions.

mod descriptor;
mod merge;

pub use descriptor::{get_options, OptionDescriptor, OptionsFn};
pub use merge::{deep_merge, merge_all};

use serde_json::Value;

/// Options object passed to a model call (`where`, `limit`, `offset`, `order`, `include`, ...).
pub type QueryOptions = serde_json::Map<String, Value>;

/// JavaScript-style truthiness: null, false, 0, "" and missing values are falsy.
pub fn truthy(v: Option<&Value>) -> bool {
    match v {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().map(|f| f != 0.0 && !f.is_nan()).unwrap_or(true),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(_)) | Some(Value::Object(_)) => true,
    }
}

/// Integer coercion that truncates toward zero; non-numeric input is 0.
pub fn int_of(v: Option<&Value>) -> i64 {
    let f = match v {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().parse::<f64>().unwrap_or(0.0),
        Some(Value::Bool(true)) => 1.0,
        _ => 0.0,
    };
    if f.is_finite() {
        f.trunc() as i64
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn truthiness() {
        assert!(!truthy(None));
        assert!(!truthy(Some(&json!(null))));
        assert!(!truthy(Some(&json!(""))));
        assert!(!truthy(Some(&json!(0))));
        assert!(!truthy(Some(&json!(false))));
        assert!(truthy(Some(&json!("0"))));
        assert!(truthy(Some(&json!([]))));
        assert!(truthy(Some(&json!(-1))));
    }

    #[test]
    fn integer_coercion() {
        assert_eq!(int_of(Some(&json!("12"))), 12);
        assert_eq!(int_of(Some(&json!(3.9))), 3);
        assert_eq!(int_of(Some(&json!("-2.5"))), -2);
        assert_eq!(int_of(Some(&json!("abc"))), 0);
        assert_eq!(int_of(Some(&json!({"a": 1}))), 0);
        assert_eq!(int_of(None), 0);
    }
}
