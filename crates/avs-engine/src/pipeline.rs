//! Ordered composition of effects applied each frame.

use crate::context::RenderContext;
use crate::effect::Effect;
use crate::error::EngineError;
use crate::params::ParamBlock;
use crate::registry::{normalize_legacy_token, Registry};

struct Entry {
    key: String,
    effect: Box<dyn Effect>,
}

/// Ordered list of instantiated effects. Construction goes through the
/// registry; rendering invokes every effect in sequence and ANDs the
/// results — a failing effect never stops the chain.
#[derive(Default)]
pub struct Pipeline {
    entries: Vec<Entry>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Instantiate `key` via the registry, apply `params`, append.
    pub fn add(
        &mut self,
        registry: &Registry,
        key: &str,
        params: &ParamBlock,
    ) -> Result<(), EngineError> {
        let normalized = normalize_legacy_token(key);
        let factory = registry
            .find(&normalized)
            .ok_or_else(|| EngineError::UnknownEffect(key.to_string()))?;
        let mut effect = factory();
        effect.set_params(params);
        self.entries.push(Entry {
            key: normalized,
            effect,
        });
        Ok(())
    }

    /// Append an already-built effect (composites, placeholders).
    pub fn push_boxed(&mut self, key: impl Into<String>, effect: Box<dyn Effect>) {
        self.entries.push(Entry {
            key: key.into(),
            effect,
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.key.as_str())
    }

    /// Render every effect in order. Returns the AND of all effect results.
    pub fn render(&mut self, context: &mut RenderContext<'_>) -> bool {
        let mut all_ok = true;
        for entry in &mut self.entries {
            if !entry.effect.render(context) {
                log::debug!("effect '{}' bailed out for this frame", entry.key);
                all_ok = false;
            }
        }
        all_ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::Analysis;
    use crate::context::FrameView;
    use crate::framebuffer::{BufferSlots, OverlayBands};
    use crate::globals::GlobalState;
    use crate::rng::DeterministicRng;

    struct FixedResult(bool);

    impl Effect for FixedResult {
        fn set_params(&mut self, _params: &ParamBlock) {}
        fn render(&mut self, _context: &mut RenderContext<'_>) -> bool {
            self.0
        }
    }

    fn with_context<R>(f: impl FnOnce(&mut RenderContext<'_>) -> R) -> R {
        let mut pixels = vec![0u8; 4 * 4 * 4];
        let previous = vec![0u8; 4 * 4 * 4];
        let spectrum = vec![0.0f32; 513];
        let analysis = Analysis::default();
        let mut rng = DeterministicRng::new(0);
        let mut globals = GlobalState::new();
        let mut slots = BufferSlots::default();
        let mut overlays = OverlayBands::default();
        let mut context = RenderContext {
            frame_index: 0,
            delta_seconds: 1.0 / 60.0,
            width: 4,
            height: 4,
            framebuffer: FrameView {
                data: &mut pixels,
                width: 4,
                height: 4,
            },
            previous: &previous,
            audio_spectrum: &spectrum,
            audio: Some(&analysis),
            audio_beat: false,
            rng: &mut rng,
            globals: &mut globals,
            slots: &mut slots,
            overlays: &mut overlays,
            backend_name: None,
        };
        f(&mut context)
    }

    #[test]
    fn result_is_and_of_effects_and_all_run() {
        let mut pipeline = Pipeline::new();
        pipeline.push_boxed("ok", Box::new(FixedResult(true)));
        pipeline.push_boxed("bad", Box::new(FixedResult(false)));
        pipeline.push_boxed("ok2", Box::new(FixedResult(true)));
        let ok = with_context(|ctx| pipeline.render(ctx));
        assert!(!ok);
        assert_eq!(pipeline.len(), 3);
    }

    #[test]
    fn unknown_key_is_an_error() {
        let registry = Registry::with_builtins();
        let mut pipeline = Pipeline::new();
        let err = pipeline.add(&registry, "no_such_effect", &ParamBlock::new());
        assert!(matches!(err, Err(EngineError::UnknownEffect(_))));
    }
}
