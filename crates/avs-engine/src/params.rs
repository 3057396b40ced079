//! Typed parameter blocks passed to effects.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// One parameter value as produced by the preset parsers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i32),
    Float(f32),
    Str(String),
}

/// Mapping from lowercase parameter name to typed value.
///
/// Getters coerce between representations the way the legacy effects expect:
/// an int reads as a float, a bool reads as 0/1, and numeric strings parse on
/// demand.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParamBlock {
    values: FxHashMap<String, ParamValue>,
}

impl ParamBlock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn set_bool(&mut self, name: &str, value: bool) {
        self.values.insert(name.to_ascii_lowercase(), ParamValue::Bool(value));
    }

    pub fn set_int(&mut self, name: &str, value: i32) {
        self.values.insert(name.to_ascii_lowercase(), ParamValue::Int(value));
    }

    pub fn set_float(&mut self, name: &str, value: f32) {
        self.values.insert(name.to_ascii_lowercase(), ParamValue::Float(value));
    }

    pub fn set_string(&mut self, name: &str, value: impl Into<String>) {
        self.values
            .insert(name.to_ascii_lowercase(), ParamValue::Str(value.into()));
    }

    pub fn get_bool(&self, name: &str, default: bool) -> bool {
        match self.values.get(name) {
            Some(ParamValue::Bool(b)) => *b,
            Some(ParamValue::Int(i)) => *i != 0,
            Some(ParamValue::Float(f)) => *f != 0.0,
            Some(ParamValue::Str(s)) => match s.to_ascii_lowercase().as_str() {
                "true" | "yes" | "on" | "1" => true,
                "false" | "no" | "off" | "0" => false,
                _ => default,
            },
            None => default,
        }
    }

    pub fn get_int(&self, name: &str, default: i32) -> i32 {
        match self.values.get(name) {
            Some(ParamValue::Int(i)) => *i,
            Some(ParamValue::Float(f)) => *f as i32,
            Some(ParamValue::Bool(b)) => i32::from(*b),
            Some(ParamValue::Str(s)) => s.trim().parse().unwrap_or(default),
            None => default,
        }
    }

    pub fn get_float(&self, name: &str, default: f32) -> f32 {
        match self.values.get(name) {
            Some(ParamValue::Float(f)) => *f,
            Some(ParamValue::Int(i)) => *i as f32,
            Some(ParamValue::Bool(b)) => f32::from(u8::from(*b)),
            Some(ParamValue::Str(s)) => s.trim().parse().unwrap_or(default),
            None => default,
        }
    }

    pub fn get_string(&self, name: &str, default: &str) -> String {
        match self.values.get(name) {
            Some(ParamValue::Str(s)) => s.clone(),
            Some(ParamValue::Int(i)) => i.to_string(),
            Some(ParamValue::Float(f)) => f.to_string(),
            Some(ParamValue::Bool(b)) => b.to_string(),
            None => default.to_string(),
        }
    }

    /// Iterate entries in sorted key order (stable JSON output).
    pub fn sorted_entries(&self) -> Vec<(&str, &ParamValue)> {
        let mut entries: Vec<_> = self.values.iter().map(|(k, v)| (k.as_str(), v)).collect();
        entries.sort_by_key(|(k, _)| *k);
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_lowercased() {
        let mut p = ParamBlock::new();
        p.set_int("Radius", 5);
        assert!(p.contains("radius"));
        assert_eq!(p.get_int("radius", 0), 5);
    }

    #[test]
    fn numeric_coercions() {
        let mut p = ParamBlock::new();
        p.set_int("a", 3);
        p.set_float("b", 2.5);
        p.set_bool("c", true);
        p.set_string("d", "42");
        assert_eq!(p.get_float("a", 0.0), 3.0);
        assert_eq!(p.get_int("b", 0), 2);
        assert_eq!(p.get_int("c", 0), 1);
        assert_eq!(p.get_int("d", 0), 42);
        assert!(p.get_bool("a", false));
    }

    #[test]
    fn missing_keys_fall_back_to_defaults() {
        let p = ParamBlock::new();
        assert_eq!(p.get_int("x", -1), -1);
        assert_eq!(p.get_string("y", "fallback"), "fallback");
        assert!(!p.get_bool("z", false));
    }

    #[test]
    fn string_bool_parsing() {
        let mut p = ParamBlock::new();
        p.set_string("on", "yes");
        p.set_string("off", "off");
        assert!(p.get_bool("on", false));
        assert!(!p.get_bool("off", true));
    }
}
