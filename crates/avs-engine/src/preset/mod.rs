//! Preset loading: binary Nullsoft blobs and the newline-oriented
//! micro-preset text format, both lowered to (effect key, params) commands.

pub mod binary;
pub mod json;
pub mod micro;

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::params::ParamBlock;
use crate::pipeline::Pipeline;
use crate::registry::Registry;

/// One lowered effect command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EffectCommand {
    pub token: String,
    #[serde(default)]
    pub params: ParamBlock,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<EffectCommand>,
    /// Raw payload kept for effects the registry cannot decode.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub raw_payload: Vec<u8>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub unknown: bool,
}

impl EffectCommand {
    pub fn new(token: impl Into<String>, params: ParamBlock) -> Self {
        Self {
            token: token.into(),
            params,
            children: Vec::new(),
            raw_payload: Vec::new(),
            unknown: false,
        }
    }
}

/// Parse result: ordered commands plus recoverable warnings. Parsing never
/// aborts the whole file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParsedPreset {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub effects: Vec<EffectCommand>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl ParsedPreset {
    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        log::warn!("preset: {message}");
        self.warnings.push(message);
    }
}

/// Parse a preset file, sniffing the binary magic first.
pub fn parse_preset_bytes(data: &[u8]) -> ParsedPreset {
    if let Some((version, body_offset)) = binary::parse_magic_header(data) {
        let mut preset = binary::parse_binary_preset(&data[body_offset..]);
        preset.version = version.clone();
        if !binary::is_known_version(&version) {
            preset.warn(format!("unknown preset version: {version}"));
        }
        return preset;
    }
    micro::parse_micro_preset(&String::from_utf8_lossy(data))
}

fn build_effect(
    command: &EffectCommand,
    registry: &Registry,
    warnings: &mut Vec<String>,
) -> Box<dyn crate::effect::Effect> {
    if command.token == "render_list" {
        let mut composite = crate::effects::core::composite::CompositeEffect::new();
        for child in &command.children {
            composite.push(build_effect(child, registry, warnings));
        }
        return Box::new(composite);
    }
    if !command.unknown {
        if let Some(factory) = registry.find(&command.token) {
            let mut effect = factory();
            effect.set_params(&command.params);
            return effect;
        }
        warnings.push(format!("unknown effect: {}", command.token));
    }
    Box::new(crate::effects::core::unknown::UnknownEffect::new(
        command.token.clone(),
        command.raw_payload.clone(),
    ))
}

/// Instantiate a pipeline from parsed commands. Unknown effects become
/// no-op placeholders; the extra warnings are returned alongside.
pub fn build_pipeline(preset: &ParsedPreset, registry: &Registry) -> (Pipeline, Vec<String>) {
    let mut pipeline = Pipeline::new();
    let mut warnings = Vec::new();
    for command in &preset.effects {
        let effect = build_effect(command, registry, &mut warnings);
        pipeline.push_boxed(command.token.clone(), effect);
    }
    (pipeline, warnings)
}

pub fn parse_preset_file(path: &Path) -> ParsedPreset {
    match std::fs::read(path) {
        Ok(data) => parse_preset_bytes(&data),
        Err(e) => {
            let mut preset = ParsedPreset::default();
            preset.warn(format!("failed to open preset {}: {e}", path.display()));
            preset
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unreadable_file_yields_warning_not_panic() {
        let preset = parse_preset_file(Path::new("/definitely/not/here.avs"));
        assert!(preset.effects.is_empty());
        assert_eq!(preset.warnings.len(), 1);
    }

    #[test]
    fn sniffs_text_fallback() {
        let preset = parse_preset_bytes(b"clear color=#ff0000\n");
        assert_eq!(preset.effects.len(), 1);
        assert_eq!(preset.effects[0].token, "clear");
    }

    #[test]
    fn build_pipeline_substitutes_placeholders() {
        let registry = Registry::with_builtins();
        let preset = parse_preset_bytes(b"clear color=#ff0000\nnot_an_effect foo=1\nring\n");
        let (pipeline, warnings) = build_pipeline(&preset, &registry);
        assert_eq!(pipeline.len(), 3);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("not_an_effect"));
    }
}
