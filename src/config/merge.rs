//! Layer merge rules
//!
//! - Tables merge key by key, recursively
//! - Arrays are replaced wholesale by the later layer
//! - Scalars (and null) from the later layer win

use serde_json::Value;

/// Merge `overlay` on top of `base`.
pub fn deep_merge(mut base: Value, overlay: Value) -> Value {
    merge_into(&mut base, overlay);
    base
}

fn merge_into(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(&key) {
                    Some(existing) => merge_into(existing, value),
                    None => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (slot, overlay) => *slot = overlay,
    }
}

/// Merge layers in precedence order; the last layer wins.
pub fn merge_layers(layers: Vec<Value>) -> Value {
    layers.into_iter().fold(Value::Null, deep_merge)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_nested_tables_merge() {
        let base = json!({ "cache": { "version": 1, "prefix": "petcare" } });
        let overlay = json!({ "cache": { "version": 2 } });
        let merged = deep_merge(base, overlay);

        assert_eq!(merged["cache"]["version"], 2);
        assert_eq!(merged["cache"]["prefix"], "petcare");
    }

    #[test]
    fn test_arrays_replace() {
        let base = json!({ "cache": { "precache": ["/", "/index.html", "/manifest.json"] } });
        let overlay = json!({ "cache": { "precache": ["/offline.html"] } });
        let merged = deep_merge(base, overlay);

        assert_eq!(merged["cache"]["precache"], json!(["/offline.html"]));
    }

    #[test]
    fn test_null_overrides() {
        let merged = deep_merge(
            json!({ "cache": { "navigation_fallback": "/index.html" } }),
            json!({ "cache": { "navigation_fallback": null } }),
        );
        assert!(merged["cache"]["navigation_fallback"].is_null());
    }

    #[test]
    fn test_layer_precedence() {
        let merged = merge_layers(vec![
            json!({ "telemetry": { "interval_seconds": 600, "cooldown_seconds": 300 } }),
            json!({ "telemetry": { "interval_seconds": 120 } }),
            json!({ "messaging": { "production": true } }),
            json!({ "telemetry": { "interval_seconds": 30 } }),
        ]);

        assert_eq!(merged["telemetry"]["interval_seconds"], 30);
        assert_eq!(merged["telemetry"]["cooldown_seconds"], 300);
        assert_eq!(merged["messaging"]["production"], true);
    }
}
