//! Name → factory mapping with legacy token normalization.

use rustc_hash::FxHashMap;

use crate::effect::Effect;

pub type EffectFactory = fn() -> Box<dyn Effect>;

/// Binary preset effect IDs resolve through this table. Empty preferred
/// entries fall back to the legacy name. Indexes mirror the legacy render
/// table order.
const PREFERRED_EFFECT_NAMES: [&str; 46] = [
    "Render / Simple",
    "Render / Dot Plane",
    "Render / Oscilloscope Star",
    "",
    "Trans / Blitter Feedback",
    "",
    "Trans / Blur",
    "Render / Bass Spin",
    "Render / Moving Particle",
    "Trans / Roto Blitter",
    "Render / SVP Loader",
    "Trans / Colorfade",
    "Trans / Color Clip",
    "Render / Rotating Stars",
    "Render / Ring",
    "",
    "Trans / Scatter",
    "",
    "",
    "Render / Dot Fountain",
    "Trans / Water",
    "Misc / Comment",
    "Trans / Brightness",
    "",
    "Trans / Grain",
    "",
    "",
    "",
    "",
    "",
    "Trans / Mosaic",
    "Trans / Water Bump",
    "Render / AVI",
    "Misc / Custom BPM",
    "",
    "",
    "",
    "",
    "Trans / Unique tone",
    "Render / Timescope",
    "Misc / Set render mode",
    "Trans / Interferences",
    "",
    "",
    "Trans / Fast Brightness",
    "Trans / Color Modifier",
];

const LEGACY_EFFECT_NAMES: [&str; 46] = [
    "Render / Simple",
    "Render / Dot Plane",
    "Render / Oscilliscope Star",
    "Trans / Fadeout",
    "Trans / Blitter Feedback",
    "Render / OnBeat Clear",
    "Trans / Blur",
    "Render / Bass Spin",
    "Render / Moving Particle",
    "Trans / Roto Blitter",
    "Render / SVP Loader",
    "Trans / Colorfade",
    "Trans / Color Clip",
    "Render / Rotating Stars",
    "Render / Ring",
    "Trans / Movement",
    "Trans / Scatter",
    "Render / Dot Grid",
    "Misc / Buffer Save",
    "Render / Dot Fountain",
    "Trans / Water",
    "Misc / Comment",
    "Trans / Brightness",
    "Trans / Interleave",
    "Trans / Grain",
    "Render / Clear screen",
    "Trans / Mirror",
    "Render / Starfield",
    "Render / Text",
    "Trans / Bump",
    "Trans / Mosaic",
    "Trans / Water Bump",
    "Render / AVI",
    "Misc / Custom BPM",
    "Render / Picture",
    "Trans / Dynamic Distance Modifier",
    "Render / SuperScope",
    "Trans / Invert",
    "Trans / Unique tone",
    "Render / Timescope",
    "Misc / Set render mode",
    "Trans / Interferences",
    "Trans / Dynamic Shift",
    "Trans / Dynamic Movement",
    "Trans / Fast Brightness",
    "Trans / Color Modifier",
];

/// Canonical display name for a binary effect ID, preferring the corrected
/// casing over the legacy alias (e.g. "Oscilliscope" → "Oscilloscope").
pub fn effect_name_for_id(effect_id: u32) -> Option<&'static str> {
    let index = effect_id as usize;
    if let Some(preferred) = PREFERRED_EFFECT_NAMES.get(index) {
        if !preferred.is_empty() {
            return Some(preferred);
        }
    }
    LEGACY_EFFECT_NAMES.get(index).copied()
}

/// Lowercase, drop whitespace, fold `/` into `_`.
pub fn normalize_legacy_token(token: &str) -> String {
    let mut out = String::with_capacity(token.len());
    for ch in token.chars() {
        if ch.is_whitespace() {
            continue;
        }
        if ch == '/' {
            out.push('_');
        } else {
            out.push(ch.to_ascii_lowercase());
        }
    }
    out
}

/// Name → factory mapping. Effects register under their canonical key plus
/// any legacy aliases, all pre-normalized.
#[derive(Default)]
pub struct Registry {
    factories: FxHashMap<String, EffectFactory>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with every built-in kernel registered.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        crate::effects::register_builtins(&mut registry);
        registry
    }

    pub fn register(&mut self, tokens: &[&str], factory: EffectFactory) {
        for token in tokens {
            self.factories
                .insert(normalize_legacy_token(token), factory);
        }
    }

    /// Look up by already-normalized key.
    pub fn find(&self, normalized_key: &str) -> Option<EffectFactory> {
        self.factories.get(normalized_key).copied()
    }

    /// Look up by raw token (normalizes first).
    pub fn find_token(&self, token: &str) -> Option<EffectFactory> {
        self.find(&normalize_legacy_token(token))
    }

    /// Canonical key for a binary-preset effect ID, if the table knows it.
    pub fn legacy_token_for(&self, effect_id: u32) -> Option<String> {
        effect_name_for_id(effect_id).map(normalize_legacy_token)
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}
