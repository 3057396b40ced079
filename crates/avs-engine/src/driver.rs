//! Offscreen renderer: owns the analyzer, frame state, globals, and
//! pipeline; produces one frame per `render()` call.

use std::path::Path;

use crate::audio::{Analyzer, FFT_SIZE};
use crate::context::{FrameView, RenderContext};
use crate::error::EngineError;
use crate::framebuffer::Framebuffers;
use crate::globals::GlobalState;
use crate::pipeline::Pipeline;
use crate::preset::{self, ParsedPreset};
use crate::registry::Registry;
use crate::rng::DeterministicRng;

const DEFAULT_SAMPLE_RATE: i32 = 44100;
const DELTA_SECONDS: f64 = 1.0 / 60.0;

/// A borrowed view of the rendered frame.
pub struct FrameBytes<'a> {
    pub width: i32,
    pub height: i32,
    pub data: &'a [u8],
}

/// MD5 hex digest of a frame's bytes (golden-test fixture format).
pub fn compute_md5_hex(data: &[u8]) -> String {
    format!("{:x}", md5::compute(data))
}

struct AudioSource {
    samples: Vec<f32>,
    channels: i32,
    cursor: usize,
}

pub struct OffscreenRenderer {
    registry: Registry,
    framebuffers: Framebuffers,
    globals: GlobalState,
    analyzer: Analyzer,
    pipeline: Pipeline,
    rng: DeterministicRng,
    audio: Option<AudioSource>,
    scratch: Vec<f32>,
    warnings: Vec<String>,
}

impl OffscreenRenderer {
    pub fn new(width: i32, height: i32) -> Self {
        Self {
            registry: Registry::with_builtins(),
            framebuffers: Framebuffers::new(width, height),
            globals: GlobalState::new(),
            analyzer: Analyzer::new(DEFAULT_SAMPLE_RATE, 1),
            pipeline: Pipeline::new(),
            rng: DeterministicRng::from_env(),
            audio: None,
            scratch: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn frame_index(&self) -> u64 {
        self.framebuffers.frame_index()
    }

    pub fn resize(&mut self, width: i32, height: i32) {
        self.framebuffers.resize(width, height);
        self.analyzer.reset();
    }

    pub fn load_preset(&mut self, path: &Path) -> ParsedPreset {
        let parsed = preset::parse_preset_file(path);
        self.install_preset(&parsed);
        parsed
    }

    pub fn load_preset_bytes(&mut self, data: &[u8]) -> ParsedPreset {
        let parsed = preset::parse_preset_bytes(data);
        self.install_preset(&parsed);
        parsed
    }

    fn install_preset(&mut self, parsed: &ParsedPreset) {
        let (pipeline, build_warnings) = preset::build_pipeline(parsed, &self.registry);
        self.pipeline = pipeline;
        self.warnings = parsed.warnings.clone();
        self.warnings.extend(build_warnings);
        for warning in &self.warnings {
            log::warn!("preset: {warning}");
        }
        self.analyzer.reset();
        self.globals.reset();
    }

    /// Install a looping PCM source consumed `FFT_SIZE` frames at a time.
    pub fn set_audio_buffer(
        &mut self,
        samples: Vec<f32>,
        sample_rate: i32,
        channels: i32,
    ) -> Result<(), EngineError> {
        if sample_rate <= 0 || channels <= 0 {
            return Err(EngineError::InvalidArgument(format!(
                "invalid audio format: rate {sample_rate}, channels {channels}"
            )));
        }
        if samples.len() % channels as usize != 0 {
            return Err(EngineError::InvalidArgument(
                "sample count is not a whole number of frames".to_string(),
            ));
        }
        self.analyzer = Analyzer::new(sample_rate, channels);
        self.audio = Some(AudioSource {
            samples,
            channels,
            cursor: 0,
        });
        Ok(())
    }

    fn pull_audio(&mut self) {
        let Some(source) = self.audio.as_mut() else {
            return;
        };
        let channels = source.channels as usize;
        let needed = FFT_SIZE * channels;
        self.scratch.clear();
        self.scratch.reserve(needed);
        if source.samples.is_empty() {
            self.scratch.resize(needed, 0.0);
        } else {
            // Loop the source buffer.
            for _ in 0..needed {
                self.scratch.push(source.samples[source.cursor]);
                source.cursor = (source.cursor + 1) % source.samples.len();
            }
        }
        if let Err(e) = self.analyzer.process(&self.scratch) {
            log::warn!("audio analysis failed: {e}");
        }
    }

    /// Render one frame and return a view of its bytes.
    pub fn render(&mut self) -> FrameBytes<'_> {
        self.framebuffers.begin_frame();
        self.pull_audio();

        let frame_index = self.framebuffers.frame_index();
        self.rng.reseed(frame_index);

        let analysis = self.analyzer.analysis().clone();
        {
            let crate::framebuffer::FrameParts {
                current,
                previous,
                slots,
                overlays,
            } = self.framebuffers.parts();
            let (width, height) = (current.width, current.height);
            let mut context = RenderContext {
                frame_index,
                delta_seconds: DELTA_SECONDS,
                width,
                height,
                framebuffer: FrameView {
                    data: &mut current.pixels,
                    width,
                    height,
                },
                previous: &previous.pixels,
                audio_spectrum: &analysis.spectrum,
                audio: Some(&analysis),
                audio_beat: analysis.beat,
                rng: &mut self.rng,
                globals: &mut self.globals,
                slots,
                overlays,
                backend_name: None,
            };
            let ok = self.pipeline.render(&mut context);
            if !ok {
                log::debug!("frame {frame_index}: at least one effect bailed out");
            }
        }

        self.framebuffers.finish_frame();
        let frame = self.framebuffers.current();
        FrameBytes {
            width: frame.width,
            height: frame.height,
            data: &frame.pixels,
        }
    }

    /// Render one frame and hash it.
    pub fn render_md5(&mut self) -> String {
        let frame = self.render();
        compute_md5_hex(frame.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone_mix(seconds: f64, rate: u32, channels: usize) -> Vec<f32> {
        let frames = (seconds * f64::from(rate)) as usize;
        let mut out = Vec::with_capacity(frames * channels);
        for i in 0..frames {
            let t = i as f64 / f64::from(rate);
            let value = (0.4 * (2.0 * std::f64::consts::PI * 60.0 * t).sin()
                + 0.3 * (2.0 * std::f64::consts::PI * 440.0 * t).sin()
                + 0.2 * (2.0 * std::f64::consts::PI * 2200.0 * t).sin()) as f32;
            for _ in 0..channels {
                out.push(value);
            }
        }
        out
    }

    fn renderer_with(preset: &str, width: i32, height: i32) -> OffscreenRenderer {
        let mut renderer = OffscreenRenderer::new(width, height);
        renderer.load_preset_bytes(preset.as_bytes());
        renderer
            .set_audio_buffer(tone_mix(0.55, 48000, 2), 48000, 2)
            .unwrap();
        renderer
    }

    fn hashes(renderer: &mut OffscreenRenderer, frames: usize) -> Vec<String> {
        (0..frames).map(|_| renderer.render_md5()).collect()
    }

    #[test]
    fn empty_preset_produces_frames() {
        let mut renderer = OffscreenRenderer::new(32, 24);
        let frame = renderer.render();
        assert_eq!(frame.width, 32);
        assert_eq!(frame.height, 24);
        assert_eq!(frame.data.len(), 32 * 24 * 4);
    }

    #[test]
    fn same_seed_same_audio_same_hashes() {
        let preset = "clear color=#000000\nwave gain=1.0 damp=true\nring size=12\n";
        let mut a = renderer_with(preset, 64, 48);
        let mut b = renderer_with(preset, 64, 48);
        assert_eq!(hashes(&mut a, 10), hashes(&mut b, 10));
    }

    #[test]
    fn clear_then_blur_stabilizes_after_first_frame() {
        let preset = "clear color=#ff0000 blend=replace\nblur radius=2\n";
        let mut renderer = renderer_with(preset, 48, 36);
        let hashes = hashes(&mut renderer, 10);
        // Static pipeline: every frame after the first repeats exactly.
        for window in hashes[1..].windows(2) {
            assert_eq!(window[0], window[1]);
        }
    }

    #[test]
    fn scripted_superscope_is_reproducible() {
        let preset = concat!(
            "clear color=#000000\n",
            "superscope init=\"n=800\" frame=\"t=t-0.05\" ",
            "point=\"d=i+v*0.2; r=t+i*$PI*4; x=cos(r)*d; y=sin(r)*d\"\n",
        );
        let mut a = renderer_with(preset, 64, 64);
        let mut b = renderer_with(preset, 64, 64);
        assert_eq!(hashes(&mut a, 4), hashes(&mut b, 4));
    }

    #[test]
    fn dot_plane_scenario_renders_content() {
        let preset = "clear color=#000000\ndot_plane rotvel=14 angle=-25 color2=#7a2f2f color3=#d450a0\n";
        let mut renderer = renderer_with(preset, 80, 60);
        let mut lit = 0;
        for _ in 0..10 {
            let frame = renderer.render();
            lit += frame
                .data
                .chunks_exact(4)
                .filter(|px| px[0] > 0 || px[1] > 0 || px[2] > 0)
                .count();
        }
        assert!(lit > 0);
    }

    #[test]
    fn preset_reload_resets_state() {
        let mut renderer = OffscreenRenderer::new(16, 16);
        renderer.load_preset_bytes(b"clear color=#ffffff\n");
        renderer.render();
        renderer.load_preset_bytes(b"clear color=#000000 blend=replace\n");
        assert!(renderer.warnings().is_empty());
        let frame = renderer.render();
        assert_eq!(&frame.data[..4], &[0, 0, 0, 255]);
    }

    #[test]
    fn rejects_bad_audio_format() {
        let mut renderer = OffscreenRenderer::new(8, 8);
        assert!(renderer.set_audio_buffer(vec![0.0; 7], 44100, 2).is_err());
        assert!(renderer.set_audio_buffer(vec![0.0; 8], 0, 2).is_err());
    }
}
