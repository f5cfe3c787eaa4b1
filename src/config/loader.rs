//! Configuration loading and environment parsing.

use super::Config;
use serde_json::map::Entry;
use serde_json::Value;
use std::env;
use std::fs;
use std::path::Path;

/// Load configuration with the following precedence (highest first):
/// 1) `DUELGATE_CONFIG_JSON` env var containing raw JSON
/// 2) File pointed to by `DUELGATE_CONFIG_PATH`
/// 3) config.json in the current working directory
/// 4) Defaults compiled into the binary
///
/// Individual fields can additionally be overridden by environment variables
/// with the `DUELGATE__` prefix using `__` as a nested separator, e.g.
/// `DUELGATE__PORT=9000` or `DUELGATE__LOGGING__LEVEL=debug`.
///
/// Errors while reading or parsing any source are printed to stderr and that
/// source is skipped; `load()` always returns a `Config`. Callers who need a
/// hard failure should call [`Config::validate`] on the result.
#[must_use]
pub fn load() -> Config {
    let defaults = Config::default();
    let Ok(mut merged) = serde_json::to_value(&defaults) else {
        return defaults;
    };

    // Overlay lowest precedence first; each later document overwrites the
    // keys it names and leaves the rest alone.
    let documents = [
        json_from_file(Path::new("config.json")),
        env::var("DUELGATE_CONFIG_PATH")
            .ok()
            .and_then(|path| json_from_file(Path::new(&path))),
        env::var("DUELGATE_CONFIG_JSON")
            .ok()
            .and_then(|raw| json_from_str(&raw, "DUELGATE_CONFIG_JSON")),
    ];
    for document in documents.into_iter().flatten() {
        overlay(&mut merged, document);
    }

    // Environment overrides with prefix DUELGATE and nested separator __
    apply_env_overrides(&mut merged);

    match serde_json::from_value::<Config>(merged) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to deserialize config; using defaults: {e}");
            defaults
        }
    }
}

/// Parse one JSON document, reporting a failure to stderr and yielding
/// nothing. Blank input is silently skipped.
fn json_from_str(raw: &str, origin: &str) -> Option<Value> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    serde_json::from_str(trimmed)
        .map_err(|err| eprintln!("Ignoring config from {origin}: {err}"))
        .ok()
}

fn json_from_file(path: &Path) -> Option<Value> {
    if !path.is_file() {
        return None;
    }

    let contents = fs::read_to_string(path)
        .map_err(|err| eprintln!("Ignoring config file {}: {err}", path.display()))
        .ok()?;
    json_from_str(&contents, &path.display().to_string())
}

/// Overlay `patch` onto `base`: objects merge key by key, anything else
/// replaces the value it lands on.
fn overlay(base: &mut Value, patch: Value) {
    match patch {
        Value::Object(fields) => {
            let Some(base_map) = base.as_object_mut() else {
                *base = Value::Object(fields);
                return;
            };
            for (key, value) in fields {
                match base_map.entry(key) {
                    Entry::Occupied(mut existing) => overlay(existing.get_mut(), value),
                    Entry::Vacant(slot) => {
                        slot.insert(value);
                    }
                }
            }
        }
        replacement => *base = replacement,
    }
}

fn apply_env_overrides(root: &mut Value) {
    for (key, raw_value) in std::env::vars() {
        let Some(stripped) = key.strip_prefix("DUELGATE__") else {
            continue;
        };

        let segments: Vec<String> = stripped
            .split("__")
            .filter(|segment| !segment.is_empty())
            .map(str::to_ascii_lowercase)
            .collect();

        if segments.is_empty() {
            continue;
        }

        let value = parse_scalar(raw_value.trim());
        set_nested_value(root, &segments, value);
    }
}

fn parse_scalar(raw: &str) -> Value {
    if raw.is_empty() {
        return Value::String(String::new());
    }

    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn set_nested_value(target: &mut Value, segments: &[String], value: Value) {
    let Some((head, rest)) = segments.split_first() else {
        *target = value;
        return;
    };

    let map = ensure_object(target);
    if rest.is_empty() {
        map.insert(head.clone(), value);
        return;
    }

    let entry = map
        .entry(head.clone())
        .or_insert_with(|| Value::Object(serde_json::Map::new()));
    set_nested_value(entry, rest, value);
}

fn ensure_object(value: &mut Value) -> &mut serde_json::Map<String, Value> {
    if !value.is_object() {
        *value = Value::Object(serde_json::Map::new());
    }

    match value.as_object_mut() {
        Some(map) => map,
        // Unreachable: the branch above coerces `value` into an object.
        None => unreachable!("value was just coerced into an object"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlay_merges_nested_objects_key_by_key() {
        let mut base = serde_json::json!({
            "port": 8080,
            "websocket": {"ping_interval_secs": 54, "read_timeout_secs": 60}
        });
        overlay(
            &mut base,
            serde_json::json!({"websocket": {"ping_interval_secs": 20}}),
        );
        assert_eq!(base["port"], 8080);
        assert_eq!(base["websocket"]["ping_interval_secs"], 20);
        assert_eq!(base["websocket"]["read_timeout_secs"], 60);
    }

    #[test]
    fn overlay_replaces_scalars_and_mismatched_shapes() {
        let mut base = serde_json::json!({"logging": {"level": "info"}});
        overlay(&mut base, serde_json::json!({"logging": "off", "port": 9000}));
        assert_eq!(base["logging"], "off");
        assert_eq!(base["port"], 9000);

        let mut scalar = serde_json::json!(1);
        overlay(&mut scalar, serde_json::json!({"a": true}));
        assert_eq!(scalar, serde_json::json!({"a": true}));
    }

    #[test]
    fn blank_and_invalid_documents_are_skipped() {
        assert!(json_from_str("   ", "test").is_none());
        assert!(json_from_str("{broken", "test").is_none());
        assert_eq!(
            json_from_str(r#"{"port": 1}"#, "test"),
            Some(serde_json::json!({"port": 1}))
        );
    }

    #[test]
    fn scalars_parse_as_json_with_string_fallback() {
        assert_eq!(parse_scalar("8080"), serde_json::json!(8080));
        assert_eq!(parse_scalar("true"), serde_json::json!(true));
        assert_eq!(parse_scalar("debug"), serde_json::json!("debug"));
    }

    #[test]
    fn nested_values_land_under_lowercased_segments() {
        let mut root = serde_json::json!({});
        set_nested_value(
            &mut root,
            &["logging".to_string(), "level".to_string()],
            serde_json::json!("warn"),
        );
        assert_eq!(root["logging"]["level"], "warn");
    }
}
