//! Spectral audio analysis feeding script-visible band values.

pub mod analysis;
pub mod fft;

pub use analysis::{AudioAnalysis, OfflineAnalyzer, live_analysis};
