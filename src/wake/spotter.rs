//! Bundled multi-keyword spotter: MFCC features matched by DTW.
//!
//! Each configured wake phrase has a directory of reference recordings
//! (16 kHz mono WAV). Live audio is compared against every reference and
//! the phrase with the best score past the threshold fires. Built on
//! `rustfft`; no external wake-word model or credential required.

use crate::config::WakeConfig;
use crate::error::WakeEngineError;
use crate::wake::WakeEngine;
use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// MFCC coefficients per frame.
const NUM_MFCC: usize = 13;
/// Analysis frame length in samples (25 ms at 16 kHz).
const FRAME_LEN: usize = 400;
/// Frame hop in samples (10 ms at 16 kHz).
const FRAME_HOP: usize = 160;
/// Mel filter bands.
const MEL_BANDS: usize = 26;
/// The spotter consumes exactly this rate; the capture layer resamples.
const SAMPLE_RATE: u32 = 16_000;

type Features = Vec<Vec<f32>>;

struct Keyword {
    name: String,
    templates: Vec<Features>,
}

/// MFCC+DTW keyword spotter implementing the [`WakeEngine`] boundary.
pub struct KeywordSpotter {
    keywords: Vec<Keyword>,
    filterbank: Vec<Vec<f32>>,
    hann: Vec<f32>,
    fft: Arc<dyn Fft<f32>>,
    threshold: f32,
    /// Rolling buffer; one detection window is ~1 s of audio.
    buffer: Vec<f32>,
    window_samples: usize,
}

impl std::fmt::Debug for KeywordSpotter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeywordSpotter")
            .field("keywords", &self.keywords.len())
            .field("threshold", &self.threshold)
            .field("window_samples", &self.window_samples)
            .finish_non_exhaustive()
    }
}

impl KeywordSpotter {
    /// Build a spotter from the wake configuration.
    ///
    /// # Errors
    ///
    /// Returns [`WakeEngineError::Activation`] when no usable keyword
    /// references are found or the sample rate is unsupported.
    pub fn new(config: &WakeConfig, sample_rate: u32) -> Result<Self, WakeEngineError> {
        if sample_rate != SAMPLE_RATE {
            return Err(WakeEngineError::Activation(format!(
                "spotter requires {SAMPLE_RATE}Hz audio, got {sample_rate}Hz"
            )));
        }
        if config.keywords.is_empty() {
            return Err(WakeEngineError::Activation(
                "no wake phrases configured".into(),
            ));
        }
        if !(0.0..=1.0).contains(&config.threshold) || config.threshold == 0.0 {
            return Err(WakeEngineError::Activation(format!(
                "threshold must be in (0, 1], got {}",
                config.threshold
            )));
        }

        let filterbank = mel_filterbank(MEL_BANDS, FRAME_LEN, sample_rate);
        let hann = hann_window(FRAME_LEN);
        let fft = FftPlanner::<f32>::new().plan_fft_forward(FRAME_LEN);

        let mut keywords = Vec::with_capacity(config.keywords.len());
        for name in &config.keywords {
            let dir = config.references_root.join(name);
            let templates = load_templates(&dir, &filterbank, &hann, fft.as_ref())?;
            if templates.is_empty() {
                return Err(WakeEngineError::Activation(format!(
                    "no reference recordings for wake phrase '{name}' in {}",
                    dir.display()
                )));
            }
            info!(
                "wake phrase '{name}': {} reference recordings",
                templates.len()
            );
            keywords.push(Keyword {
                name: name.clone(),
                templates,
            });
        }

        let window_samples = sample_rate as usize;
        Ok(Self {
            keywords,
            filterbank,
            hann,
            fft,
            threshold: config.threshold,
            buffer: Vec::with_capacity(window_samples + FRAME_LEN),
            window_samples,
        })
    }

    /// Score the current window against every keyword. Returns the index of
    /// the best keyword at or above the threshold.
    fn best_match(&self, features: &Features) -> Option<usize> {
        let mut best: Option<(usize, f32)> = None;
        for (index, keyword) in self.keywords.iter().enumerate() {
            for template in &keyword.templates {
                let score = 1.0 / (1.0 + dtw_distance(features, template));
                if score >= self.threshold && best.is_none_or(|(_, b)| score > b) {
                    best = Some((index, score));
                }
            }
        }
        best.map(|(index, score)| {
            info!(
                "wake phrase '{}' matched with score {score:.3}",
                self.keywords[index].name
            );
            index
        })
    }
}

impl WakeEngine for KeywordSpotter {
    fn process(&mut self, samples: &[f32]) -> Result<Option<usize>, WakeEngineError> {
        self.buffer.extend_from_slice(samples);
        if self.buffer.len() < self.window_samples {
            return Ok(None);
        }

        let window = &self.buffer[self.buffer.len() - self.window_samples..];
        let features = extract_features(window, &self.filterbank, &self.hann, self.fft.as_ref());

        let hit = if features.is_empty() {
            None
        } else {
            self.best_match(&features)
        };

        // Slide by half a window so consecutive checks overlap.
        let drain = (self.window_samples / 2).min(self.buffer.len());
        self.buffer.drain(..drain);

        Ok(hit)
    }

    fn reset(&mut self) {
        self.buffer.clear();
    }
}

/// Load every `*.wav` under `dir` as a feature template.
fn load_templates(
    dir: &Path,
    filterbank: &[Vec<f32>],
    hann: &[f32],
    fft: &dyn Fft<f32>,
) -> Result<Vec<Features>, WakeEngineError> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let entries = std::fs::read_dir(dir)
        .map_err(|e| WakeEngineError::Engine(format!("cannot read {}: {e}", dir.display())))?;

    let mut templates = Vec::new();
    for entry in entries {
        let path = entry
            .map_err(|e| WakeEngineError::Engine(format!("cannot read dir entry: {e}")))?
            .path();
        if path.extension().and_then(|e| e.to_str()) != Some("wav") {
            continue;
        }
        match load_reference(&path) {
            Ok(samples) => {
                let features = extract_features(&samples, filterbank, hann, fft);
                if !features.is_empty() {
                    templates.push(features);
                }
            }
            Err(e) => {
                info!("skipping reference {}: {e}", path.display());
            }
        }
    }
    Ok(templates)
}

/// Read a reference recording as 16 kHz mono f32.
fn load_reference(path: &Path) -> Result<Vec<f32>, WakeEngineError> {
    let mut reader = hound::WavReader::open(path)
        .map_err(|e| WakeEngineError::Engine(format!("cannot open {}: {e}", path.display())))?;
    let spec = reader.spec();
    if spec.sample_rate != SAMPLE_RATE {
        return Err(WakeEngineError::Engine(format!(
            "reference must be {SAMPLE_RATE}Hz, got {}Hz",
            spec.sample_rate
        )));
    }

    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Int => {
            let max = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .filter_map(|s| s.ok())
                .map(|v| v as f32 / max)
                .collect()
        }
        hound::SampleFormat::Float => reader.samples::<f32>().filter_map(|s| s.ok()).collect(),
    };

    if spec.channels > 1 {
        let ch = spec.channels as usize;
        Ok(samples
            .chunks(ch)
            .map(|frame| frame.iter().sum::<f32>() / ch as f32)
            .collect())
    } else {
        Ok(samples)
    }
}

/// Extract MFCC frames from `samples`, one per hop.
fn extract_features(
    samples: &[f32],
    filterbank: &[Vec<f32>],
    hann: &[f32],
    fft: &dyn Fft<f32>,
) -> Features {
    if samples.len() < FRAME_LEN {
        return Vec::new();
    }

    let spectrum_len = FRAME_LEN / 2 + 1;
    let mut frames = Vec::with_capacity((samples.len() - FRAME_LEN) / FRAME_HOP + 1);
    let mut scratch = vec![Complex::new(0.0f32, 0.0f32); FRAME_LEN];

    let mut start = 0;
    while start + FRAME_LEN <= samples.len() {
        for (i, slot) in scratch.iter_mut().enumerate() {
            *slot = Complex::new(samples[start + i] * hann[i], 0.0);
        }
        fft.process(&mut scratch);

        let mel_log: Vec<f32> = filterbank
            .iter()
            .map(|band| {
                let energy: f32 = band
                    .iter()
                    .zip(scratch[..spectrum_len].iter())
                    .map(|(&w, c)| w * (c.re * c.re + c.im * c.im) / FRAME_LEN as f32)
                    .sum();
                energy.max(1e-10).ln()
            })
            .collect();

        frames.push(dct_ii(&mel_log, NUM_MFCC));
        start += FRAME_HOP;
    }

    frames
}

fn hann_window(len: usize) -> Vec<f32> {
    (0..len)
        .map(|n| {
            0.5 * (1.0 - (2.0 * std::f32::consts::PI * n as f32 / (len - 1) as f32).cos())
        })
        .collect()
}

/// Mel-spaced triangular filterbank over the power spectrum bins.
fn mel_filterbank(bands: usize, fft_len: usize, sample_rate: u32) -> Vec<Vec<f32>> {
    let to_mel = |hz: f32| 2595.0 * (1.0 + hz / 700.0).log10();
    let to_hz = |mel: f32| 700.0 * (10.0_f32.powf(mel / 2595.0) - 1.0);

    let spectrum_len = fft_len / 2 + 1;
    let top_mel = to_mel(sample_rate as f32 / 2.0);

    // bands + 2 evenly spaced mel points, converted back to FFT bins.
    let bins: Vec<usize> = (0..bands + 2)
        .map(|i| {
            let mel = top_mel * i as f32 / (bands + 1) as f32;
            ((fft_len as f32 + 1.0) * to_hz(mel) / sample_rate as f32).floor() as usize
        })
        .collect();

    (0..bands)
        .map(|b| {
            let (left, center, right) = (bins[b], bins[b + 1], bins[b + 2]);
            let mut band = vec![0.0f32; spectrum_len];
            for (i, w) in band.iter_mut().enumerate() {
                if i > left && i <= center && center > left {
                    *w = (i - left) as f32 / (center - left) as f32;
                } else if i > center && i < right && right > center {
                    *w = (right - i) as f32 / (right - center) as f32;
                }
            }
            band
        })
        .collect()
}

/// DCT-II, keeping the first `coeffs` coefficients.
fn dct_ii(input: &[f32], coeffs: usize) -> Vec<f32> {
    let n = input.len();
    (0..coeffs)
        .map(|k| {
            input
                .iter()
                .enumerate()
                .map(|(i, &v)| {
                    v * (std::f32::consts::PI * k as f32 * (2 * i + 1) as f32 / (2 * n) as f32)
                        .cos()
                })
                .sum()
        })
        .collect()
}

/// DTW distance between two feature sequences, normalized by path length.
///
/// Rolling two-row dynamic program; handles the length mismatch between a
/// short reference and the ~1 s live window.
fn dtw_distance(a: &Features, b: &Features) -> f32 {
    let (n, m) = (a.len(), b.len());
    if n == 0 || m == 0 {
        return f32::MAX;
    }

    let mut prev = vec![f32::MAX; m + 1];
    let mut row = vec![f32::MAX; m + 1];
    prev[0] = 0.0;

    for i in 1..=n {
        row[0] = f32::MAX;
        for j in 1..=m {
            let d = frame_distance(&a[i - 1], &b[j - 1]);
            let best = prev[j].min(row[j - 1]).min(prev[j - 1]);
            row[j] = if best == f32::MAX { f32::MAX } else { d + best };
        }
        std::mem::swap(&mut prev, &mut row);
    }

    prev[m] / (n + m) as f32
}

fn frame_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(&x, &y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::config::WakeConfig;

    fn features(rows: &[&[f32]]) -> Features {
        rows.iter().map(|r| r.to_vec()).collect()
    }

    #[test]
    fn dtw_identical_sequences_score_zero() {
        let seq = features(&[&[1.0, 2.0], &[3.0, 4.0]]);
        assert!(dtw_distance(&seq, &seq) < 0.001);
    }

    #[test]
    fn dtw_repeated_pattern_matches_shorter_reference() {
        let short = features(&[&[1.0, 2.0]]);
        let long = features(&[&[1.0, 2.0], &[1.0, 2.0], &[1.0, 2.0]]);
        assert!(dtw_distance(&long, &short) < 0.001);
    }

    #[test]
    fn dtw_distant_sequences_score_high() {
        let a = features(&[&[0.0, 0.0]]);
        let b = features(&[&[10.0, 10.0]]);
        assert!(dtw_distance(&a, &b) > 1.0);
    }

    #[test]
    fn dtw_empty_is_unmatchable() {
        let a: Features = Vec::new();
        let b = features(&[&[1.0]]);
        assert_eq!(dtw_distance(&a, &b), f32::MAX);
        assert_eq!(dtw_distance(&b, &a), f32::MAX);
    }

    #[test]
    fn filterbank_shape_and_range() {
        let fb = mel_filterbank(MEL_BANDS, FRAME_LEN, SAMPLE_RATE);
        assert_eq!(fb.len(), MEL_BANDS);
        for band in &fb {
            assert_eq!(band.len(), FRAME_LEN / 2 + 1);
            assert!(band.iter().all(|&w| (0.0..=1.0).contains(&w)));
        }
    }

    #[test]
    fn dct_first_coefficient_is_sum() {
        let out = dct_ii(&[1.0, 2.0, 3.0, 4.0], 3);
        assert_eq!(out.len(), 3);
        assert!((out[0] - 10.0).abs() < 0.01);
    }

    #[test]
    fn feature_extraction_frame_counts() {
        let fb = mel_filterbank(MEL_BANDS, FRAME_LEN, SAMPLE_RATE);
        let hann = hann_window(FRAME_LEN);
        let fft = FftPlanner::<f32>::new().plan_fft_forward(FRAME_LEN);

        assert!(extract_features(&[0.0; FRAME_LEN - 1], &fb, &hann, fft.as_ref()).is_empty());
        let one = extract_features(&[0.0; FRAME_LEN], &fb, &hann, fft.as_ref());
        assert_eq!(one.len(), 1);
        assert_eq!(one[0].len(), NUM_MFCC);
        // Half a second: (8000 - 400) / 160 + 1 frames.
        let many = extract_features(&[0.0; 8000], &fb, &hann, fft.as_ref());
        assert_eq!(many.len(), 48);
    }

    #[test]
    fn rejects_unsupported_sample_rate() {
        let config = WakeConfig::default();
        let err = KeywordSpotter::new(&config, 44_100).unwrap_err();
        assert!(matches!(err, WakeEngineError::Activation(_)));
    }

    #[test]
    fn rejects_empty_keyword_list() {
        let config = WakeConfig {
            keywords: Vec::new(),
            ..WakeConfig::default()
        };
        let err = KeywordSpotter::new(&config, SAMPLE_RATE).unwrap_err();
        assert!(matches!(err, WakeEngineError::Activation(_)));
    }

    #[test]
    fn rejects_keyword_without_references() {
        let dir = tempfile::tempdir().unwrap();
        let config = WakeConfig {
            keywords: vec!["hey-droid".into()],
            references_root: dir.path().to_path_buf(),
            ..WakeConfig::default()
        };
        let err = KeywordSpotter::new(&config, SAMPLE_RATE).unwrap_err();
        assert!(matches!(err, WakeEngineError::Activation(_)));
    }

    #[test]
    fn detects_its_own_reference() {
        let dir = tempfile::tempdir().unwrap();
        let phrase_dir = dir.path().join("hey-droid");
        std::fs::create_dir_all(&phrase_dir).unwrap();

        // A 1 s two-tone chirp standing in for a spoken phrase. It fills one
        // detection window exactly, so streaming the same audio back in
        // yields features identical to the template.
        let samples: Vec<f32> = (0..16_000)
            .map(|i| {
                let t = i as f32 / SAMPLE_RATE as f32;
                let hz = if i < 8000 { 440.0 } else { 880.0 };
                (2.0 * std::f32::consts::PI * hz * t).sin() * 0.5
            })
            .collect();
        write_wav(&phrase_dir.join("ref.wav"), &samples);

        let config = WakeConfig {
            keywords: vec!["hey-droid".into()],
            references_root: dir.path().to_path_buf(),
            threshold: 0.5,
            ..WakeConfig::default()
        };
        let mut spotter = KeywordSpotter::new(&config, SAMPLE_RATE).unwrap();

        let mut hit = None;
        for chunk in samples.chunks(500) {
            if let Some(index) = spotter.process(chunk).unwrap() {
                hit = Some(index);
                break;
            }
        }
        assert_eq!(hit, Some(0));
    }

    #[test]
    fn silence_does_not_fire() {
        let dir = tempfile::tempdir().unwrap();
        let phrase_dir = dir.path().join("hey-droid");
        std::fs::create_dir_all(&phrase_dir).unwrap();
        let tone: Vec<f32> = (0..8000)
            .map(|i| (2.0 * std::f32::consts::PI * 440.0 * i as f32 / 16_000.0).sin())
            .collect();
        write_wav(&phrase_dir.join("ref.wav"), &tone);

        let config = WakeConfig {
            keywords: vec!["hey-droid".into()],
            references_root: dir.path().to_path_buf(),
            threshold: 0.95,
            ..WakeConfig::default()
        };
        let mut spotter = KeywordSpotter::new(&config, SAMPLE_RATE).unwrap();

        let noise: Vec<f32> = (0..32_000)
            .map(|i| if i % 97 == 0 { 0.01 } else { -0.01 })
            .collect();
        for chunk in noise.chunks(512) {
            assert_eq!(spotter.process(chunk).unwrap(), None);
        }
    }

    fn write_wav(path: &Path, samples: &[f32]) {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: SAMPLE_RATE,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for &s in samples {
            writer
                .write_sample((s * 32767.0).clamp(-32768.0, 32767.0) as i16)
                .unwrap();
        }
        writer.finalize().unwrap();
    }
}
