//! Band/spectrum extraction for live byte buffers and decoded sample data.

use crate::audio::fft::fft_in_place;

/// Fixed analysis window for the offline path.
pub const FFT_SIZE: usize = 256;

const MIN_DB: f32 = -100.0;
const MAX_DB: f32 = -30.0;

/// Per-frame audio features exposed to scripts. Band values sit in `[0,1]`.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct AudioAnalysis {
    pub volume: f32,
    pub bass: f32,
    pub mid: f32,
    pub treble: f32,
    pub spectrum: Vec<f32>,
    pub waveform: Vec<f32>,
}

impl AudioAnalysis {
    /// All-zero analysis with the given buffer shapes.
    pub fn silent(bins: usize, samples: usize) -> Self {
        Self {
            spectrum: vec![0.0; bins],
            waveform: vec![0.0; samples],
            ..Self::default()
        }
    }
}

/// Derive an analysis from analyser-style byte buffers.
///
/// `freq_bytes` holds per-bin magnitudes in `0..=255`, `time_bytes` holds
/// unsigned 8-bit PCM centered on 128. Bands are fractional slices of the
/// bin range: bass `[0,0.1)`, mid `[0.1,0.5)`, treble `[0.5,1.0)`.
pub fn live_analysis(freq_bytes: &[u8], time_bytes: &[u8]) -> AudioAnalysis {
    let average = |start: f64, end: f64| -> f32 {
        let len = freq_bytes.len();
        let s = (start * len as f64).floor() as usize;
        let e = (end * len as f64).floor() as usize;
        if e <= s {
            return 0.0;
        }
        let sum: u32 = freq_bytes[s..e].iter().map(|&v| u32::from(v)).sum();
        (sum as f32 / (e - s) as f32) / 255.0
    };

    AudioAnalysis {
        volume: average(0.0, 1.0),
        bass: average(0.0, 0.1),
        mid: average(0.1, 0.5),
        treble: average(0.5, 1.0),
        spectrum: freq_bytes.iter().map(|&v| f32::from(v) / 255.0).collect(),
        waveform: time_bytes
            .iter()
            .map(|&v| (f32::from(v) - 128.0) / 128.0)
            .collect(),
    }
}

/// Windowed-FFT analyzer over decoded sample data, for deterministic
/// offline rendering where no live analyser node exists.
pub struct OfflineAnalyzer {
    channels: Vec<Vec<f32>>,
    sample_rate: f64,
    window: [f32; FFT_SIZE],
}

impl OfflineAnalyzer {
    /// Analyzer over decoded per-channel samples at `sample_rate` Hz.
    pub fn new(channels: Vec<Vec<f32>>, sample_rate: f64) -> Self {
        let mut window = [0.0f32; FFT_SIZE];
        for (i, w) in window.iter_mut().enumerate() {
            *w = 0.5
                * (1.0
                    - (2.0 * std::f32::consts::PI * i as f32 / (FFT_SIZE as f32 - 1.0)).cos());
        }
        Self {
            channels,
            sample_rate,
            window,
        }
    }

    fn frame_count(&self) -> usize {
        self.channels.first().map(|c| c.len()).unwrap_or(0)
    }

    /// Duration of the decoded data in seconds.
    pub fn duration(&self) -> f64 {
        self.frame_count() as f64 / self.sample_rate
    }

    /// Features at `time` seconds of global playback, honoring the asset's
    /// playback rate and start offset. Out-of-range times yield silence.
    pub fn analyze(&self, time: f64, playback_rate: f64, start_offset: f64) -> AudioAnalysis {
        let adj_time = (time - start_offset) * playback_rate;
        if adj_time < 0.0 || adj_time >= self.duration() || self.channels.is_empty() {
            return AudioAnalysis::silent(FFT_SIZE / 2, FFT_SIZE);
        }

        let start_sample = (adj_time * self.sample_rate).floor() as usize;
        let frames = self.frame_count();
        let chans = self.channels.len() as f32;

        let mut raw = [0.0f32; FFT_SIZE];
        let mut re = vec![0.0f32; FFT_SIZE];
        let mut im = vec![0.0f32; FFT_SIZE];
        for i in 0..FFT_SIZE {
            let idx = start_sample + i;
            if idx > 0 && idx < frames {
                let mixed: f32 = self.channels.iter().map(|c| c[idx]).sum();
                raw[i] = mixed / chans;
                re[i] = raw[i] * self.window[i];
            }
        }

        fft_in_place(&mut re, &mut im);

        let mut spectrum = vec![0.0f32; FFT_SIZE / 2];
        for (i, bin) in spectrum.iter_mut().enumerate() {
            let mag = (re[i] * re[i] + im[i] * im[i]).sqrt() / FFT_SIZE as f32;
            let db = 20.0 * mag.max(1e-10).log10();
            *bin = ((db - MIN_DB) / (MAX_DB - MIN_DB)).clamp(0.0, 1.0);
        }

        let average = |start: usize, end: usize| -> f32 {
            spectrum[start..end].iter().sum::<f32>() / (end - start) as f32
        };

        AudioAnalysis {
            volume: average(0, spectrum.len()),
            bass: average(0, 10),
            mid: average(10, 50),
            treble: average(50, 100),
            spectrum,
            waveform: raw.to_vec(),
        }
    }
}
