pub mod analyzer;
pub mod visdata;

pub use analyzer::{Analysis, Analyzer, FFT_SIZE, SPECTRUM_SIZE, WAVEFORM_SIZE};
pub use visdata::VisData;
