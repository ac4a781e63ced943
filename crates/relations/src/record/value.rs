//! Scalar column values and the loose comparison used for key matching

/// Column value type, shared with the mapper layer
pub type Value = serde_json::Value;

/// Textual form of a scalar used for key matching and discriminator grouping.
///
/// Returns `None` for null, which never matches anything.
pub fn scalar_key(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        other => Some(other.to_string()),
    }
}

/// Same as [`scalar_key`], lowercased when `ignore_case` is set
pub fn match_key(value: &Value, ignore_case: bool) -> Option<String> {
    let key = scalar_key(value)?;
    if ignore_case {
        Some(key.to_lowercase())
    } else {
        Some(key)
    }
}

/// Loose equality between a native and a foreign column value
pub fn values_match(native: &Value, foreign: &Value, ignore_case: bool) -> bool {
    match (match_key(native, ignore_case), match_key(foreign, ignore_case)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_numbers_and_strings_compare_loosely() {
        assert!(values_match(&json!(1), &json!("1"), false));
        assert!(!values_match(&json!(1), &json!(2), false));
    }

    #[test]
    fn test_null_never_matches() {
        assert!(!values_match(&Value::Null, &Value::Null, false));
        assert_eq!(scalar_key(&Value::Null), None);
    }

    #[test]
    fn test_ignore_case() {
        assert!(!values_match(&json!("Post"), &json!("post"), false));
        assert!(values_match(&json!("Post"), &json!("post"), true));
    }
}
