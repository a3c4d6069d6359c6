//! Bounded rendering of JSON values for log lines

use serde::Serialize;
use serde_json::Value;

/// Limits applied when rendering a value into a log line
#[derive(Debug, Clone, Copy)]
pub struct LogLimits {
    pub max_depth: usize,
    pub max_items: usize,
    pub max_string: usize,
}

impl Default for LogLimits {
    fn default() -> Self {
        Self {
            max_depth: 4,
            max_items: 8,
            max_string: 120,
        }
    }
}

/// Serialize `value` and render it within the default limits
pub fn bounded<T: Serialize>(value: &T) -> String {
    bounded_with(value, LogLimits::default())
}

pub fn bounded_with<T: Serialize>(value: &T, limits: LogLimits) -> String {
    match serde_json::to_value(value) {
        Ok(json) => truncate_value(&json, limits, 0).to_string(),
        Err(e) => format!("<unserializable: {}>", e),
    }
}

fn truncate_value(value: &Value, limits: LogLimits, depth: usize) -> Value {
    match value {
        Value::String(s) => Value::String(truncate_str(s, limits.max_string)),
        Value::Array(items) => {
            if depth >= limits.max_depth {
                return Value::String(format!("[array; {}]", items.len()));
            }
            let mut out: Vec<Value> = items
                .iter()
                .take(limits.max_items)
                .map(|item| truncate_value(item, limits, depth + 1))
                .collect();
            if items.len() > limits.max_items {
                out.push(Value::String(format!("... {} more", items.len() - limits.max_items)));
            }
            Value::Array(out)
        }
        Value::Object(map) => {
            if depth >= limits.max_depth {
                return Value::String(format!("{{object; {} keys}}", map.len()));
            }
            let mut out = serde_json::Map::new();
            for (key, item) in map.iter().take(limits.max_items) {
                out.insert(key.clone(), truncate_value(item, limits, depth + 1));
            }
            if map.len() > limits.max_items {
                out.insert(
                    "...".to_string(),
                    Value::String(format!("{} more keys", map.len() - limits.max_items)),
                );
            }
            Value::Object(out)
        }
        other => other.clone(),
    }
}

fn truncate_str(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max).collect();
    out.push_str("...");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn small_values_pass_through() {
        assert_eq!(bounded(&json!({"a": 1, "b": "x"})), r#"{"a":1,"b":"x"}"#);
    }

    #[test]
    fn long_strings_are_cut() {
        let limits = LogLimits { max_string: 3, ..LogLimits::default() };
        assert_eq!(bounded_with(&"abcdef", limits), r#""abc...""#);
    }

    #[test]
    fn deep_nesting_is_summarized() {
        let limits = LogLimits { max_depth: 1, ..LogLimits::default() };
        let rendered = bounded_with(&json!({"outer": {"inner": [1, 2]}}), limits);
        assert_eq!(rendered, r#"{"outer":"{object; 1 keys}"}"#);
    }

    #[test]
    fn long_arrays_report_remainder() {
        let limits = LogLimits { max_items: 2, ..LogLimits::default() };
        let rendered = bounded_with(&vec![1, 2, 3, 4], limits);
        assert_eq!(rendered, r#"[1,2,"... 2 more"]"#);
    }
}
