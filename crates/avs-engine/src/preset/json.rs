//! JSON lowering for `avs-convert`: stable key order, params inline.

use serde_json::{json, Map, Value};

use crate::params::ParamValue;

use super::{EffectCommand, ParsedPreset};

fn param_value_to_json(value: &ParamValue) -> Value {
    match value {
        ParamValue::Bool(b) => Value::Bool(*b),
        ParamValue::Int(i) => json!(i),
        ParamValue::Float(f) => json!(f),
        ParamValue::Str(s) => Value::String(s.clone()),
    }
}

fn effect_to_json(command: &EffectCommand) -> Value {
    let mut object = Map::new();
    object.insert("token".to_string(), Value::String(command.token.clone()));

    let mut params = Map::new();
    for (key, value) in command.params.sorted_entries() {
        params.insert(key.to_string(), param_value_to_json(value));
    }
    object.insert("params".to_string(), Value::Object(params));

    if !command.children.is_empty() {
        object.insert(
            "children".to_string(),
            Value::Array(command.children.iter().map(effect_to_json).collect()),
        );
    }
    if command.unknown {
        object.insert("unknown".to_string(), Value::Bool(true));
        object.insert(
            "payload_bytes".to_string(),
            json!(command.raw_payload.len()),
        );
    }
    Value::Object(object)
}

pub fn preset_to_json(preset: &ParsedPreset) -> Value {
    json!({
        "version": preset.version,
        "warnings": preset.warnings,
        "effects": preset.effects.iter().map(effect_to_json).collect::<Vec<_>>(),
    })
}

pub fn preset_to_json_string(preset: &ParsedPreset) -> String {
    serde_json::to_string_pretty(&preset_to_json(preset)).unwrap_or_else(|_| "{}".to_string())
}
