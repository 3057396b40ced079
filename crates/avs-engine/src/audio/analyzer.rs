//! Audio DSP front-end: windowed FFT, band reduction, beat detection.

use std::sync::Arc;

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};

use crate::error::EngineError;

/// Fixed analysis window in frames.
pub const FFT_SIZE: usize = 1024;
/// Magnitude bins of a real FFT over the window.
pub const SPECTRUM_SIZE: usize = FFT_SIZE / 2 + 1;
/// Decimated waveform length.
pub const WAVEFORM_SIZE: usize = 576;

const BEAT_THRESHOLD: f32 = 1.35;
const ENERGY_WINDOW: usize = 43; // ~1s at 1024 hop / 44100 Hz
const MIN_ENERGY: f32 = 1e-6;
const MAX_CONFIDENCE: f32 = 4.0;
const DAMPING_FACTOR: f32 = 0.6;

fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// One frame of analysis output.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub spectrum: [f32; SPECTRUM_SIZE],
    pub waveform: [f32; WAVEFORM_SIZE],
    pub bass: f32,
    pub mid: f32,
    pub treb: f32,
    pub beat: bool,
    pub bpm: f32,
    pub confidence: f32,
}

impl Default for Analysis {
    fn default() -> Self {
        Self {
            spectrum: [0.0; SPECTRUM_SIZE],
            waveform: [0.0; WAVEFORM_SIZE],
            bass: 0.0,
            mid: 0.0,
            treb: 0.0,
            beat: false,
            bpm: 0.0,
            confidence: 0.0,
        }
    }
}

impl Analysis {
    /// RMS of the decimated waveform, used by scripted effects.
    pub fn rms(&self) -> f32 {
        let sum: f32 = self.waveform.iter().map(|v| v * v).sum();
        (sum / WAVEFORM_SIZE as f32).sqrt()
    }
}

/// Converts interleaved float PCM into spectrum/waveform/bands/beat.
pub struct Analyzer {
    sample_rate: i32,
    channels: i32,
    damping_enabled: bool,

    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    mono: Vec<f32>,
    fft_buffer: Vec<Complex<f32>>,

    energy_history: Vec<f32>,
    last_beat_time: f32,
    accumulated_time: f32,
    frames_processed: u64,
    bpm_smoothing: f32,
    confidence_smoothing: f32,

    analysis: Analysis,
}

impl Analyzer {
    pub fn new(sample_rate: i32, channels: i32) -> Self {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(FFT_SIZE);

        // Hann window over the full block.
        let factor = 2.0 * std::f64::consts::PI / FFT_SIZE as f64;
        let window: Vec<f32> = (0..FFT_SIZE)
            .map(|i| (0.5 * (1.0 - (factor * i as f64).cos())) as f32)
            .collect();

        Self {
            sample_rate,
            channels: channels.max(1),
            damping_enabled: true,
            fft,
            window,
            mono: vec![0.0; FFT_SIZE],
            fft_buffer: vec![Complex::new(0.0, 0.0); FFT_SIZE],
            energy_history: Vec::with_capacity(ENERGY_WINDOW),
            last_beat_time: 0.0,
            accumulated_time: 0.0,
            frames_processed: 0,
            bpm_smoothing: 0.0,
            confidence_smoothing: 0.0,
            analysis: Analysis::default(),
        }
    }

    pub fn set_damping_enabled(&mut self, enabled: bool) {
        self.damping_enabled = enabled;
    }

    pub fn sample_rate(&self) -> i32 {
        self.sample_rate
    }

    pub fn analysis(&self) -> &Analysis {
        &self.analysis
    }

    /// Restore all persistent state to zero.
    pub fn reset(&mut self) {
        self.mono.fill(0.0);
        self.energy_history.clear();
        self.last_beat_time = 0.0;
        self.accumulated_time = 0.0;
        self.frames_processed = 0;
        self.bpm_smoothing = 0.0;
        self.confidence_smoothing = 0.0;
        self.analysis = Analysis::default();
    }

    /// Feed exactly `FFT_SIZE` frames of interleaved PCM.
    pub fn process(&mut self, interleaved: &[f32]) -> Result<&Analysis, EngineError> {
        let expected = FFT_SIZE * self.channels as usize;
        if interleaved.len() != expected {
            return Err(EngineError::InvalidArgument(format!(
                "analyzer expects {expected} samples ({} frames x {} channels), got {}",
                FFT_SIZE,
                self.channels,
                interleaved.len()
            )));
        }

        let damping = if self.damping_enabled { DAMPING_FACTOR } else { 0.0 };
        let channels = self.channels as usize;
        for i in 0..FFT_SIZE {
            let mut sum = 0.0f64;
            for ch in 0..channels {
                sum += f64::from(interleaved[i * channels + ch]);
            }
            let mono = (sum / channels as f64) as f32;
            let windowed = mono * self.window[i];
            self.mono[i] = damping * self.mono[i] + (1.0 - damping) * windowed;
        }

        self.update_spectrum();
        self.update_waveform();
        self.update_bands();
        self.update_beat();

        self.accumulated_time += FFT_SIZE as f32 / self.sample_rate as f32;
        self.frames_processed += 1;
        Ok(&self.analysis)
    }

    fn update_spectrum(&mut self) {
        for (dst, &src) in self.fft_buffer.iter_mut().zip(&self.mono) {
            *dst = Complex::new(src, 0.0);
        }
        self.fft.process(&mut self.fft_buffer);
        for i in 0..SPECTRUM_SIZE {
            self.analysis.spectrum[i] = self.fft_buffer[i].norm();
        }
    }

    fn update_waveform(&mut self) {
        let hop = FFT_SIZE / WAVEFORM_SIZE;
        for i in 0..WAVEFORM_SIZE {
            let begin = i * hop;
            let end = (begin + hop).min(self.mono.len());
            let count = end - begin;
            let sum: f32 = self.mono[begin..end].iter().sum();
            let value = if count > 0 { sum / count as f32 } else { 0.0 };
            self.analysis.waveform[i] = value.clamp(-1.0, 1.0);
        }
    }

    fn hz_for_bin(&self, bin: usize) -> f32 {
        bin as f32 * self.sample_rate as f32 / FFT_SIZE as f32
    }

    fn update_bands(&mut self) {
        let mut sums = [0.0f32; 3];
        let mut counts = [0u32; 3];
        // Bin 0 is DC and belongs to no band.
        for bin in 1..SPECTRUM_SIZE {
            let hz = self.hz_for_bin(bin);
            let slot = if hz < 250.0 {
                0
            } else if hz < 4000.0 {
                1
            } else {
                2
            };
            sums[slot] += self.analysis.spectrum[bin];
            counts[slot] += 1;
        }
        let means: Vec<f32> = sums
            .iter()
            .zip(&counts)
            .map(|(&s, &c)| if c > 0 { s / c as f32 } else { 0.0 })
            .collect();

        if self.damping_enabled {
            self.analysis.bass = lerp(self.analysis.bass, means[0], 0.5);
            self.analysis.mid = lerp(self.analysis.mid, means[1], 0.5);
            self.analysis.treb = lerp(self.analysis.treb, means[2], 0.5);
        } else {
            self.analysis.bass = means[0];
            self.analysis.mid = means[1];
            self.analysis.treb = means[2];
        }
    }

    fn update_beat(&mut self) {
        let mut energy: f32 = self.mono.iter().map(|v| v * v).sum();
        energy = energy.max(MIN_ENERGY);

        self.energy_history.push(energy);
        if self.energy_history.len() > ENERGY_WINDOW {
            self.energy_history.remove(0);
        }

        let avg = self.energy_history.iter().sum::<f32>() / self.energy_history.len() as f32;
        let beat_value = if avg > 0.0 { energy / avg } else { 0.0 };
        let beat = beat_value > BEAT_THRESHOLD;
        self.analysis.beat = beat;

        if beat {
            let now = self.accumulated_time;
            let delta = now - self.last_beat_time;
            if delta > 0.0 {
                let bpm = 60.0 / delta;
                self.bpm_smoothing = lerp(self.bpm_smoothing, bpm, 0.35);
                self.analysis.bpm = self.bpm_smoothing;
            }
            self.last_beat_time = now;
        }

        let confidence = beat_value.min(MAX_CONFIDENCE);
        self.confidence_smoothing = lerp(self.confidence_smoothing, confidence, 0.25);
        self.analysis.confidence = self.confidence_smoothing / MAX_CONFIDENCE;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone(freq: f32, rate: f32, frames: usize, channels: usize, gain: f32) -> Vec<f32> {
        let mut out = Vec::with_capacity(frames * channels);
        for i in 0..frames {
            let t = i as f32 / rate;
            let v = gain * (2.0 * std::f32::consts::PI * freq * t).sin();
            for _ in 0..channels {
                out.push(v);
            }
        }
        out
    }

    #[test]
    fn rejects_wrong_frame_count() {
        let mut analyzer = Analyzer::new(44100, 2);
        let samples = vec![0.0f32; 100];
        assert!(analyzer.process(&samples).is_err());
    }

    #[test]
    fn spectrum_nonnegative_waveform_bounded() {
        let mut analyzer = Analyzer::new(44100, 1);
        let samples = tone(440.0, 44100.0, FFT_SIZE, 1, 0.9);
        let analysis = analyzer.process(&samples).unwrap();
        assert!(analysis.spectrum.iter().all(|&m| m >= 0.0));
        assert!(analysis.waveform.iter().all(|&v| (-1.0..=1.0).contains(&v)));
        assert!((0.0..=1.0).contains(&analysis.confidence));
    }

    #[test]
    fn linearity_without_damping() {
        let mut a = Analyzer::new(44100, 1);
        let mut b = Analyzer::new(44100, 1);
        a.set_damping_enabled(false);
        b.set_damping_enabled(false);

        let quiet = tone(1000.0, 44100.0, FFT_SIZE, 1, 0.25);
        let loud: Vec<f32> = quiet.iter().map(|v| v * 2.0).collect();
        let sa = a.process(&quiet).unwrap().spectrum;
        let sb = b.process(&loud).unwrap().spectrum;
        for (lo, hi) in sa.iter().zip(&sb) {
            assert!((hi - lo * 2.0).abs() < 1e-2 + lo * 1e-3);
        }
    }

    #[test]
    fn silence_never_beats() {
        let mut analyzer = Analyzer::new(44100, 1);
        let silence = vec![0.0f32; FFT_SIZE];
        for _ in 0..50 {
            let analysis = analyzer.process(&silence).unwrap();
            assert!(!analysis.beat);
        }
    }

    #[test]
    fn energy_spike_declares_beat() {
        let mut analyzer = Analyzer::new(44100, 1);
        let quiet = tone(200.0, 44100.0, FFT_SIZE, 1, 0.05);
        for _ in 0..20 {
            analyzer.process(&quiet).unwrap();
        }
        let loud = tone(200.0, 44100.0, FFT_SIZE, 1, 0.9);
        let analysis = analyzer.process(&loud).unwrap();
        assert!(analysis.beat);
        assert!(analysis.confidence > 0.0);
    }

    #[test]
    fn reset_clears_state() {
        let mut analyzer = Analyzer::new(44100, 1);
        let loud = tone(200.0, 44100.0, FFT_SIZE, 1, 0.9);
        analyzer.process(&loud).unwrap();
        analyzer.reset();
        assert_eq!(analyzer.analysis().bass, 0.0);
        assert!(!analyzer.analysis().beat);
    }
}
