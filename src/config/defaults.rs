//! Built-in defaults (layer 1)

use serde_json::Value;

use super::settings::EdgeSettings;

/// The default settings as a mergeable JSON layer.
pub fn builtin_layer() -> Value {
    // EdgeSettings only holds plain data; serialization cannot fail.
    serde_json::to_value(EdgeSettings::default()).unwrap_or(Value::Null)
}
