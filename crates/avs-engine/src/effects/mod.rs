//! The concrete effect kernels and their registry wiring.

pub mod blend;
pub mod core;
pub mod filters;
pub mod misc;
pub mod primitives;
pub mod render;
pub mod stack;
pub mod trans;

use crate::framebuffer::OverlayChannel;
use crate::registry::Registry;

/// Register every built-in kernel under its canonical key and legacy
/// aliases.
pub fn register_builtins(registry: &mut Registry) {
    // frame-stack operations
    registry.register(
        &["Render / Clear screen", "clear", "Render / OnBeat Clear"],
        || Box::new(stack::ClearEffect::default()),
    );
    registry.register(&["wrap"], || Box::new(stack::WrapEffect::default()));
    registry.register(&["in_slide", "slide_in"], || {
        Box::new(stack::SlideEffect::inward())
    });
    registry.register(&["out_slide", "slide_out"], || {
        Box::new(stack::SlideEffect::outward())
    });
    registry.register(&["transition"], || {
        Box::new(stack::TransitionEffect::default())
    });
    registry.register(&["persist_title"], || {
        Box::new(stack::PersistEffect::new(OverlayChannel::Title))
    });
    registry.register(&["persist_text1"], || {
        Box::new(stack::PersistEffect::new(OverlayChannel::Text1))
    });
    registry.register(&["persist_text2"], || {
        Box::new(stack::PersistEffect::new(OverlayChannel::Text2))
    });
    registry.register(&["Misc / Buffer Save", "buffer_save"], || {
        Box::new(stack::BufferSaveEffect::default())
    });

    // audio-reactive renderers
    registry.register(&["effect_wave", "wave"], || {
        Box::new(render::wave::WaveEffect::default())
    });
    registry.register(&["Render / Simple", "effect_spec", "spec"], || {
        Box::new(render::wave::SpectrumEffect::default())
    });
    registry.register(&["effect_bands", "bands"], || {
        Box::new(render::wave::BandsEffect::default())
    });
    registry.register(&["level_text", "levels"], || {
        Box::new(render::text::LevelTextEffect::default())
    });
    registry.register(&["band_text"], || {
        Box::new(render::text::BandTextEffect::default())
    });
    registry.register(&["Render / Ring", "ring"], || {
        Box::new(render::ring::RingEffect::default())
    });
    registry.register(
        &[
            "Render / Oscilloscope Star",
            "Render / Oscilliscope Star",
            "oscilloscope_star",
            "osc_star",
        ],
        || Box::new(render::oscilloscope_star::OscilloscopeStarEffect::default()),
    );
    registry.register(&["Render / Rotating Stars", "rotating_stars"], || {
        Box::new(render::rotating_stars::RotatingStarsEffect::default())
    });
    registry.register(&["Render / Bass Spin", "bass_spin"], || {
        Box::new(render::bass_spin::BassSpinEffect::default())
    });
    registry.register(&["Render / Moving Particle", "moving_particle"], || {
        Box::new(render::moving_particle::MovingParticleEffect::default())
    });
    registry.register(&["Render / Dot Plane", "dot_plane"], || {
        Box::new(render::dot_plane::DotPlaneEffect::default())
    });
    registry.register(&["Render / Dot Fountain", "dot_fountain"], || {
        Box::new(render::dot_fountain::DotFountainEffect::default())
    });
    registry.register(&["Render / Timescope", "timescope"], || {
        Box::new(render::timescope::TimescopeEffect::default())
    });

    // scripted
    registry.register(&["Render / SuperScope", "superscope", "scripted"], || {
        Box::new(core::scripted::ScriptedEffect::superscope())
    });
    registry.register(&["Trans / Color Modifier", "color_modifier"], || {
        Box::new(core::scripted::ScriptedEffect::color_modifier())
    });
    registry.register(&["Trans / Dynamic Movement", "dynamic_movement", "dmove"], || {
        Box::new(trans::dynamic::DynamicEffect::movement())
    });
    registry.register(&["Trans / Dynamic Shift", "dynamic_shift"], || {
        Box::new(trans::dynamic::DynamicEffect::shift())
    });
    registry.register(
        &[
            "Trans / Dynamic Distance Modifier",
            "dynamic_distance_modifier",
            "ddm",
        ],
        || Box::new(trans::dynamic::DynamicEffect::distance_modifier()),
    );

    // transforms
    registry.register(&["blur", "blur_box", "box_blur"], || {
        Box::new(trans::blur_box::BoxBlurEffect::default())
    });
    registry.register(&["Trans / Blur"], || {
        Box::new(trans::blur::BlurEffect::default())
    });
    registry.register(&["Trans / Brightness", "brightness"], || {
        Box::new(trans::brightness::BrightnessEffect::default())
    });
    registry.register(&["Trans / Fast Brightness", "fast_brightness"], || {
        Box::new(trans::fast_brightness::FastBrightnessEffect::default())
    });
    registry.register(&["Trans / Colorfade", "colorfade"], || {
        Box::new(trans::colorfade::ColorfadeEffect::default())
    });
    registry.register(&["channel_shift", "channelshift"], || {
        Box::new(trans::channel_shift::ChannelShiftEffect::default())
    });
    registry.register(&["Trans / Unique tone", "unique_tone"], || {
        Box::new(trans::unique_tone::UniqueToneEffect::default())
    });
    registry.register(&["Trans / Video Delay", "video_delay"], || {
        Box::new(trans::video_delay::VideoDelayEffect::default())
    });
    registry.register(&["Trans / Multi Delay", "multi_delay"], || {
        Box::new(trans::multi_delay::MultiDelayEffect::default())
    });
    registry.register(&["Trans / Mosaic", "mosaic"], || {
        Box::new(trans::mosaic::MosaicEffect::default())
    });
    registry.register(&["Trans / Scatter", "scatter"], || {
        Box::new(trans::scatter::ScatterEffect::default())
    });
    registry.register(&["Trans / Water", "water"], || {
        Box::new(trans::water::WaterEffect::default())
    });
    registry.register(&["Trans / Water Bump", "water_bump"], || {
        Box::new(trans::water_bump::WaterBumpEffect::default())
    });
    registry.register(&["Trans / Blitter Feedback", "blitter_feedback"], || {
        Box::new(trans::blitter_feedback::BlitterFeedbackEffect::default())
    });
    registry.register(&["Trans / Roto Blitter", "roto_blitter"], || {
        Box::new(trans::roto_blitter::RotoBlitterEffect::default())
    });
    registry.register(&["zoom_rotate", "zoomrotate"], || {
        Box::new(trans::zoom_rotate::ZoomRotateEffect::default())
    });
    registry.register(&["Trans / Multiplier", "multiplier"], || {
        Box::new(trans::multiplier::MultiplierEffect::default())
    });

    // filters
    registry.register(&["Trans / Grain", "grain"], || {
        Box::new(filters::grain::GrainEffect::default())
    });
    registry.register(&["colormap", "color_map"], || {
        Box::new(filters::color_map::ColorMapEffect::default())
    });
    registry.register(&["convolution", "conv3x3"], || {
        Box::new(filters::conv3x3::Convolution3x3Effect::default())
    });
    registry.register(&["Trans / Interferences", "interferences"], || {
        Box::new(filters::interferences::InterferencesEffect::default())
    });

    // misc
    registry.register(&["Misc / Comment", "comment"], || {
        Box::new(misc::comment::CommentEffect::default())
    });
    registry.register(&["Misc / Custom BPM", "custom_bpm", "custombpm"], || {
        Box::new(misc::custom_bpm::CustomBpmEffect::default())
    });
    registry.register(&["Misc / Set render mode", "set_render_mode"], || {
        Box::new(misc::set_render_mode::SetRenderModeEffect::default())
    });
    registry.register(&["Misc / Beat Gating", "beat_gating", "gating"], || {
        Box::new(misc::gating::BeatGatingEffect::default())
    });
    registry.register(&["transform_affine", "affine"], || {
        Box::new(misc::transform_affine::TransformAffineEffect::default())
    });
}

#[cfg(test)]
pub mod testing {
    //! Shared fixture for kernel unit tests.

    use crate::audio::Analysis;
    use crate::context::{FrameView, RenderContext};
    use crate::effect::Effect;
    use crate::framebuffer::{BufferSlots, OverlayBands};
    use crate::globals::GlobalState;
    use crate::rng::DeterministicRng;

    pub struct TestRig {
        pub width: i32,
        pub height: i32,
        pub pixels: Vec<u8>,
        pub previous: Vec<u8>,
        pub analysis: Analysis,
        pub beat: bool,
        pub frame_index: u64,
        pub delta_seconds: f64,
        pub rng: DeterministicRng,
        pub globals: GlobalState,
        pub slots: BufferSlots,
        pub overlays: OverlayBands,
        /// Captured from the context after each run.
        pub beat_after: bool,
    }

    impl TestRig {
        pub fn new(width: i32, height: i32) -> Self {
            Self::with_seed(width, height, 1234)
        }

        pub fn with_seed(width: i32, height: i32, seed: u64) -> Self {
            let bytes = (width * height * 4) as usize;
            Self {
                width,
                height,
                pixels: vec![0; bytes],
                previous: vec![0; bytes],
                analysis: Analysis::default(),
                beat: false,
                frame_index: 0,
                delta_seconds: 1.0 / 60.0,
                rng: DeterministicRng::new(seed),
                globals: GlobalState::new(),
                slots: BufferSlots::default(),
                overlays: OverlayBands::default(),
                beat_after: false,
            }
        }

        pub fn fill(&mut self, rgba: [u8; 4]) {
            for px in self.pixels.chunks_exact_mut(4) {
                px.copy_from_slice(&rgba);
            }
        }

        pub fn pixel(&self, x: i32, y: i32) -> [u8; 4] {
            let offset = (y * self.width + x) as usize * 4;
            self.pixels[offset..offset + 4].try_into().unwrap()
        }

        /// Render one frame with the rig's state, reseeding the RNG the way
        /// the driver does. Advances the frame index afterwards.
        pub fn run(&mut self, effect: &mut dyn Effect) -> bool {
            self.rng.reseed(self.frame_index);
            let mut context = RenderContext {
                frame_index: self.frame_index,
                delta_seconds: self.delta_seconds,
                width: self.width,
                height: self.height,
                framebuffer: FrameView {
                    data: &mut self.pixels,
                    width: self.width,
                    height: self.height,
                },
                previous: &self.previous,
                audio_spectrum: &self.analysis.spectrum,
                audio: Some(&self.analysis),
                audio_beat: self.beat,
                rng: &mut self.rng,
                globals: &mut self.globals,
                slots: &mut self.slots,
                overlays: &mut self.overlays,
                backend_name: None,
            };
            let ok = effect.render(&mut context);
            self.beat_after = context.audio_beat;
            self.frame_index += 1;
            ok
        }

        /// Run without advancing the frame index (repeat the same frame).
        pub fn run_same_frame(&mut self, effect: &mut dyn Effect) -> bool {
            let ok = self.run(effect);
            self.frame_index -= 1;
            ok
        }
    }
}
