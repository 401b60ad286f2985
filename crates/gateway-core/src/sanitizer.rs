// Recursively strips JSON-schema keys upstream OpenAI-shape APIs reject.

use serde_json::{Map, Value};

const DROPPED_KEYS: [&str; 2] = ["$schema", "additionalProperties"];
const ALLOWED_STRING_FORMATS: [&str; 2] = ["date-time", "enum"];

/// Cleans a tool input-schema fragment. Pure and total over acyclic JSON;
/// idempotent (`sanitize(sanitize(x)) == sanitize(x)`).
pub fn sanitize(value: &Value) -> Value {
    match value {
        Value::Object(map) => sanitize_object(map),
        Value::Array(items) => Value::Array(items.iter().map(sanitize).collect()),
        other => other.clone(),
    }
}

fn sanitize_object(map: &Map<String, Value>) -> Value {
    let mut out = Map::with_capacity(map.len());
    for (key, val) in map {
        if DROPPED_KEYS.contains(&key.as_str()) {
            continue;
        }
        out.insert(key.clone(), sanitize(val));
    }

    let is_string_type = matches!(out.get("type"), Some(Value::String(t)) if t == "string");
    if is_string_type {
        let drop_format = matches!(
            out.get("format"),
            Some(Value::String(f)) if !ALLOWED_STRING_FORMATS.contains(&f.as_str())
        );
        if drop_format {
            out.remove("format");
        }
    }

    Value::Object(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn drops_schema_and_additional_properties_at_every_depth() {
        let input = json!({
            "$schema": "http://json-schema.org/draft-07/schema#",
            "type": "object",
            "additionalProperties": false,
            "properties": {
                "nested": {
                    "$schema": "nope",
                    "type": "object",
                    "additionalProperties": true,
                }
            }
        });
        let out = sanitize(&input);
        assert_eq!(out["$schema"], Value::Null);
        assert_eq!(out["additionalProperties"], Value::Null);
        assert_eq!(out["properties"]["nested"]["additionalProperties"], Value::Null);
    }

    #[test]
    fn drops_disallowed_string_format_but_keeps_date_time_and_enum() {
        let input = json!({
            "type": "object",
            "properties": {
                "d": {"type": "string", "format": "email"},
                "t": {"type": "string", "format": "date-time"},
                "e": {"type": "string", "format": "enum"},
            }
        });
        let out = sanitize(&input);
        assert!(out["properties"]["d"].get("format").is_none());
        assert_eq!(out["properties"]["t"]["format"], "date-time");
        assert_eq!(out["properties"]["e"]["format"], "enum");
    }

    #[test]
    fn is_idempotent() {
        let input = json!({
            "$schema": "x",
            "type": "object",
            "additionalProperties": false,
            "properties": {"d": {"type": "string", "format": "email"}}
        });
        let once = sanitize(&input);
        let twice = sanitize(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn matches_the_worked_example() {
        let input = json!({
            "$schema": "…",
            "type": "object",
            "additionalProperties": false,
            "properties": {
                "d": {"type": "string", "format": "email"},
                "t": {"type": "string", "format": "date-time"}
            }
        });
        let expected = json!({
            "type": "object",
            "properties": {
                "d": {"type": "string"},
                "t": {"type": "string", "format": "date-time"}
            }
        });
        assert_eq!(sanitize(&input), expected);
    }

    #[test]
    fn non_string_type_keeps_format_untouched() {
        let input = json!({"type": "number", "format": "float"});
        assert_eq!(sanitize(&input), input);
    }
}
