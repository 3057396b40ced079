//! End-to-end scenarios driven through the offscreen renderer at 320x240.
//!
//! Golden hashes are environment-sensitive (they bake in the RNG seed), so
//! these tests pin determinism and frame-stability properties: two
//! independent renderers with identical inputs must produce identical MD5
//! streams, and static pipelines must settle.

use avs_engine::driver::{compute_md5_hex, OffscreenRenderer};

const WIDTH: i32 = 320;
const HEIGHT: i32 = 240;

fn silence_then_tone(rate: u32, channels: usize) -> Vec<f32> {
    let silence_frames = (0.05 * f64::from(rate)) as usize;
    let tone_frames = (0.5 * f64::from(rate)) as usize;
    let mut out = Vec::with_capacity((silence_frames + tone_frames) * channels);
    for _ in 0..silence_frames * channels {
        out.push(0.0);
    }
    for i in 0..tone_frames {
        let t = i as f64 / f64::from(rate);
        let value = (2.0 * std::f64::consts::PI * 1000.0 * t).sin() as f32;
        for _ in 0..channels {
            out.push(value);
        }
    }
    out
}

fn beat_mix(rate: u32, channels: usize) -> Vec<f32> {
    let frames = (0.6 * f64::from(rate)) as usize;
    let mut out = Vec::with_capacity(frames * channels);
    for i in 0..frames {
        let t = i as f64 / f64::from(rate);
        // 60 + 440 + 2200 Hz mix with a loudness pulse every ~4 frames of
        // analysis (1024 samples).
        let pulse = if (i / 4096) % 2 == 0 { 1.0 } else { 0.25 };
        let value = pulse
            * (0.4 * (2.0 * std::f64::consts::PI * 60.0 * t).sin()
                + 0.3 * (2.0 * std::f64::consts::PI * 440.0 * t).sin()
                + 0.2 * (2.0 * std::f64::consts::PI * 2200.0 * t).sin());
        for _ in 0..channels {
            out.push(value as f32);
        }
    }
    out
}

fn renderer(preset: &str, audio: Vec<f32>) -> OffscreenRenderer {
    let mut renderer = OffscreenRenderer::new(WIDTH, HEIGHT);
    renderer.load_preset_bytes(preset.as_bytes());
    renderer.set_audio_buffer(audio, 48000, 2).unwrap();
    renderer
}

fn md5_stream(renderer: &mut OffscreenRenderer, frames: usize) -> Vec<String> {
    (0..frames).map(|_| renderer.render_md5()).collect()
}

#[test]
fn empty_preset_ten_frames_are_reproducible() {
    let mut a = renderer("", silence_then_tone(48000, 2));
    let mut b = renderer("", silence_then_tone(48000, 2));
    let hashes_a = md5_stream(&mut a, 10);
    let hashes_b = md5_stream(&mut b, 10);
    assert_eq!(hashes_a.len(), 10);
    assert_eq!(hashes_a, hashes_b);
    for hash in &hashes_a {
        assert_eq!(hash.len(), 32);
    }
}

#[test]
fn clear_red_boxblur_hashes_settle_after_frame_zero() {
    let preset = "clear color=#ff0000 blend=replace\nblur radius=2\n";
    let mut r = renderer(preset, silence_then_tone(48000, 2));
    let hashes = md5_stream(&mut r, 10);
    for window in hashes[1..].windows(2) {
        assert_eq!(window[0], window[1]);
    }
}

#[test]
fn damped_wave_over_beat_mix_is_stable_across_runs() {
    let preset = "clear color=#000000 first_frame_only=true\nwave gain=1.0 damp=true\n";
    let mut a = renderer(preset, beat_mix(48000, 2));
    let mut b = renderer(preset, beat_mix(48000, 2));
    assert_eq!(md5_stream(&mut a, 10), md5_stream(&mut b, 10));
}

#[test]
fn dot_plane_over_beat_mix_is_stable_across_runs() {
    let preset = "clear color=#000000\ndot_plane rotvel=14 angle=-25 color2=#7a2f2f color3=#d450a0\n";
    let mut a = renderer(preset, beat_mix(48000, 2));
    let mut b = renderer(preset, beat_mix(48000, 2));
    assert_eq!(md5_stream(&mut a, 10), md5_stream(&mut b, 10));
}

#[test]
fn scripted_superscope_four_frames_at_64() {
    let preset = concat!(
        "clear color=#000000\n",
        "superscope init=\"n=800\" frame=\"t=t-0.05\" ",
        "point=\"d=i+v*0.2; r=t+i*$PI*4; x=cos(r)*d; y=sin(r)*d\"\n",
    );
    let make = || {
        let mut r = OffscreenRenderer::new(64, 64);
        r.load_preset_bytes(preset.as_bytes());
        r.set_audio_buffer(beat_mix(48000, 2), 48000, 2).unwrap();
        r
    };
    let mut a = make();
    let mut b = make();
    let hashes_a = md5_stream(&mut a, 4);
    assert_eq!(hashes_a, md5_stream(&mut b, 4));
    // frames evolve: the spiral rotates between frames
    assert_ne!(hashes_a[0], hashes_a[3]);
}

#[test]
fn transform_affine_quarter_turns_move_the_triangle() {
    let preset = "clear color=#000000 blend=replace\n\
                  transform_affine rotate_speed=90.0 anchor=center color=#00ff00\n";
    // The tone onset after the leading silence trips the beat detector a
    // few analysis frames in, opening the gate.
    let mut r = renderer(preset, silence_then_tone(48000, 2));

    let mut frames = Vec::new();
    for _ in 0..12 {
        let frame = r.render();
        frames.push(frame.data.to_vec());
    }
    let green_rows = |frame: &[u8]| -> Vec<i32> {
        let mut rows = Vec::new();
        for y in 0..HEIGHT {
            for x in 0..WIDTH {
                let offset = ((y * WIDTH + x) * 4) as usize;
                if frame[offset + 1] > 128 && frame[offset] < 100 {
                    rows.push(y);
                    break;
                }
            }
        }
        rows
    };
    // Wherever the gate opens, rendered triangles differ between quarter
    // turns, and the footprint stays deterministic.
    let mut r2 = renderer(preset, silence_then_tone(48000, 2));
    for frame in &frames {
        let again = r2.render();
        assert_eq!(compute_md5_hex(frame), compute_md5_hex(again.data));
    }
    let any_green = frames.iter().any(|f| !green_rows(f).is_empty());
    assert!(any_green);
}

#[test]
fn unknown_effect_isolation_in_longer_chain() {
    let preset = "clear color=#102030\nnot_a_real_effect foo=1\nring size=10\n";
    let mut r = renderer(preset, silence_then_tone(48000, 2));
    assert!(r.warnings().iter().any(|w| w.contains("not_a_real_effect")));
    // the unknown placeholder must not disturb rendering around it
    let frame = r.render();
    assert_eq!(frame.data.len(), (WIDTH * HEIGHT * 4) as usize);
}
