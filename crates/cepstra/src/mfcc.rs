//! Mel-frequency cepstral coefficient extraction.
//!
//! Implemented in a deliberately literal way so output stays bit-similar to
//! the fixed-point reference models this crate targets:
//! - raised-cosine window over the unpadded frame length
//! - real-input FFT via a direct DFT against precomputed cos/sin tables,
//!   emitted in the interleaved layout `[re0, reNyq, re1, im1, re2, im2, ..]`
//! - triangular mel filterbank with first/last-bin index tracking
//! - model-specific behavior (mel scale, filterbank normalizer, spectrum
//!   pooling, log compression, DCT normalization) as policy values on the
//!   configuration, not subclassing

use serde::Deserialize;
use thiserror::Error;

use crate::constants::{LOG_DB_MULTIPLIER, LOG_DB_RANGE, MEL_AMPLITUDE_FLOOR, MEL_POWER_FLOOR};
use crate::quantize::{QuantParams, QuantTarget};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MfccError {
    #[error("mel filterbank bin {bin} covers no FFT bins; widen the mel range or lower the bin count")]
    EmptyFilterSpan { bin: usize },
    #[error("invalid MFCC configuration: {0}")]
    BadConfig(&'static str),
}

/// Mel-scale formula variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MelScale {
    /// `1127 * ln(1 + f/700)`.
    Htk,
    /// Piecewise linear below 1 kHz, logarithmic above.
    Slaney,
}

const SLANEY_FREQ_STEP: f32 = 200.0 / 3.0;
const SLANEY_MIN_LOG_HZ: f32 = 1000.0;
const SLANEY_MIN_LOG_MEL: f32 = SLANEY_MIN_LOG_HZ / SLANEY_FREQ_STEP;
const SLANEY_LOG_STEP: f32 = 0.068_751_777; // ln(6.4) / 27

impl MelScale {
    #[must_use]
    pub fn hz_to_mel(self, freq: f32) -> f32 {
        match self {
            Self::Htk => 1127.0 * (1.0 + freq / 700.0).ln(),
            Self::Slaney => {
                if freq >= SLANEY_MIN_LOG_HZ {
                    SLANEY_MIN_LOG_MEL + (freq / SLANEY_MIN_LOG_HZ).ln() / SLANEY_LOG_STEP
                } else {
                    freq / SLANEY_FREQ_STEP
                }
            }
        }
    }

    #[must_use]
    pub fn mel_to_hz(self, mel: f32) -> f32 {
        match self {
            Self::Htk => 700.0 * ((mel / 1127.0).exp() - 1.0),
            Self::Slaney => {
                if mel >= SLANEY_MIN_LOG_MEL {
                    SLANEY_MIN_LOG_HZ * (SLANEY_LOG_STEP * (mel - SLANEY_MIN_LOG_MEL)).exp()
                } else {
                    SLANEY_FREQ_STEP * mel
                }
            }
        }
    }
}

/// Per-triangle filterbank weight normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterbankNorm {
    /// Raw triangular weights.
    None,
    /// `2 / (mel_to_hz(right) - mel_to_hz(left))`, area-normalized.
    Slaney,
}

/// How the power spectrum is pooled into a mel bin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpectrumPooling {
    /// Sum of `weight * sqrt(power)`.
    Amplitude,
    /// Sum of `weight * power`.
    Power,
}

impl SpectrumPooling {
    fn energy_floor(self) -> f32 {
        match self {
            Self::Amplitude => MEL_AMPLITUDE_FLOOR,
            Self::Power => MEL_POWER_FLOOR,
        }
    }
}

/// Logarithmic compression applied to the pooled mel energies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogCompression {
    /// Bare natural log.
    NaturalLog,
    /// Natural log scaled to dB (`10 * log10(e)`), clamped to `max - 80 dB`.
    DbClamped,
}

/// DCT-II basis normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DctNorm {
    /// `sqrt(2/N)` on every row.
    Uniform,
    /// `2*sqrt(1/(4N))` on row 0, `2*sqrt(1/(2N))` on the rest.
    Orthonormal,
}

/// Immutable MFCC extraction parameters; owned by the engine.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MfccConfig {
    pub sampling_freq: f32,
    pub num_fbank_bins: usize,
    pub mel_lo_freq: f32,
    pub mel_hi_freq: f32,
    pub num_mfcc_features: usize,
    pub frame_len: usize,
    pub num_mfcc_vectors: usize,
    pub mel_scale: MelScale,
    pub fbank_norm: FilterbankNorm,
    pub pooling: SpectrumPooling,
    pub log_compression: LogCompression,
    pub dct_norm: DctNorm,
}

impl MfccConfig {
    /// Smallest power of two >= frame length (FFT size).
    #[must_use]
    pub fn frame_len_padded(&self) -> usize {
        self.frame_len.next_power_of_two()
    }

    fn validate(&self) -> Result<(), MfccError> {
        if self.frame_len == 0 {
            return Err(MfccError::BadConfig("frame length must be > 0"));
        }
        if self.num_fbank_bins == 0 {
            return Err(MfccError::BadConfig("filterbank bin count must be > 0"));
        }
        if self.num_mfcc_features == 0 {
            return Err(MfccError::BadConfig("cepstral coefficient count must be > 0"));
        }
        if self.sampling_freq <= 0.0 {
            return Err(MfccError::BadConfig("sampling frequency must be > 0"));
        }
        if self.mel_hi_freq <= self.mel_lo_freq {
            return Err(MfccError::BadConfig("mel high bound must exceed the low bound"));
        }
        Ok(())
    }
}

/// One triangular filter: dense weights over the FFT bins it covers.
#[derive(Debug, Clone)]
struct FilterBin {
    weights: Vec<f32>,
    first: usize,
    last: usize,
}

#[derive(Debug, Clone)]
struct Tables {
    filterbank: Vec<FilterBin>,
    /// `num_mfcc_features x num_fbank_bins`, row-major.
    dct: Vec<f32>,
    dft_cos: Vec<f32>,
    dft_sin: Vec<f32>,
}

/// MFCC extraction engine. Construct once per model configuration; the
/// filterbank, DCT matrix and DFT tables are built on the first `init()`
/// (or first compute) and never mutated afterwards.
#[derive(Debug, Clone)]
pub struct MfccEngine {
    config: MfccConfig,
    window_func: Vec<f32>,
    tables: Option<Tables>,
    // Scratch, reused across frames.
    frame: Vec<f32>,
    spectrum: Vec<f32>,
    mel_energies: Vec<f32>,
}

impl MfccEngine {
    #[must_use]
    pub fn new(config: MfccConfig) -> Self {
        let multiplier = 2.0 * std::f32::consts::PI / config.frame_len as f32;
        let window_func = (0..config.frame_len)
            .map(|i| 0.5 - 0.5 * (i as f32 * multiplier).cos())
            .collect();

        let padded = config.frame_len_padded();
        let frame = vec![0.0; padded];
        let spectrum = vec![0.0; padded];
        let mel_energies = vec![0.0; config.num_fbank_bins];

        Self {
            config,
            window_func,
            tables: None,
            frame,
            spectrum,
            mel_energies,
        }
    }

    #[must_use]
    pub fn config(&self) -> &MfccConfig {
        &self.config
    }

    /// Build the mel filterbank, DCT matrix and DFT tables. Idempotent;
    /// configuration problems are reported here rather than at compute time.
    pub fn init(&mut self) -> Result<(), MfccError> {
        if self.tables.is_some() {
            return Ok(());
        }
        self.config.validate()?;

        let filterbank = build_filterbank(&self.config)?;
        let dct = build_dct_matrix(
            self.config.num_fbank_bins,
            self.config.num_mfcc_features,
            self.config.dct_norm,
        );
        let (dft_cos, dft_sin) = build_dft_tables(self.config.frame_len_padded());

        self.tables = Some(Tables {
            filterbank,
            dct,
            dft_cos,
            dft_sin,
        });
        Ok(())
    }

    /// Extract one frame of cepstral coefficients as floats.
    ///
    /// `audio` is a windowed frame of normalized samples; anything beyond
    /// `frame_len` is ignored and a short frame is zero-padded.
    pub fn compute(&mut self, audio: &[f32]) -> Result<Vec<f32>, MfccError> {
        self.compute_pre_feature(audio)?;
        let tables = self.tables.as_ref().expect("init ran in pre-feature");

        let n_bins = self.config.num_fbank_bins;
        let mut out = Vec::with_capacity(self.config.num_mfcc_features);
        for row in tables.dct.chunks_exact(n_bins) {
            let mut acc = 0.0f32;
            for (d, &m) in row.iter().zip(self.mel_energies.iter()) {
                acc += d * m;
            }
            out.push(acc);
        }
        Ok(out)
    }

    /// Same pipeline, quantizing each coefficient as
    /// `round(v/scale + offset)` clamped to `T`'s range.
    pub fn compute_quantized<T: QuantTarget>(
        &mut self,
        audio: &[f32],
        quant: QuantParams,
    ) -> Result<Vec<T>, MfccError> {
        let features = self.compute(audio)?;
        Ok(features
            .into_iter()
            .map(|v| {
                let q = (v / quant.scale + quant.offset as f32).round();
                T::from_clamped(q.clamp(T::MIN_F, T::MAX_F))
            })
            .collect())
    }

    /// Window + FFT + power spectrum + filterbank + log, leaving the result
    /// in `self.mel_energies`.
    fn compute_pre_feature(&mut self, audio: &[f32]) -> Result<(), MfccError> {
        self.init()?;

        let frame_len = self.config.frame_len;
        let n = audio.len().min(frame_len);
        self.frame[..n].copy_from_slice(&audio[..n]);
        for (f, &w) in self.frame[..n].iter_mut().zip(&self.window_func[..n]) {
            *f *= w;
        }
        self.frame[n..].fill(0.0);

        let tables = self.tables.as_ref().expect("init succeeded above");
        fft_interleaved(
            &self.frame,
            &mut self.spectrum,
            &tables.dft_cos,
            &tables.dft_sin,
        );
        let power = power_spectrum_in_place(&mut self.spectrum);

        apply_filterbank(
            power,
            &tables.filterbank,
            self.config.pooling,
            &mut self.mel_energies,
        );
        apply_log_compression(&mut self.mel_energies, self.config.log_compression);
        Ok(())
    }
}

/// Real-input FFT via direct DFT, producing the interleaved layout
/// `[re0, reNyq, re1, im1, re2, im2, ..]` (length = `input.len()`).
fn fft_interleaved(input: &[f32], output: &mut [f32], cos_t: &[f32], sin_t: &[f32]) {
    let n = input.len();
    let half = n / 2;
    debug_assert_eq!(output.len(), n);
    debug_assert_eq!(cos_t.len(), (half + 1) * n);

    for k in 0..=half {
        let cos_row = &cos_t[k * n..(k + 1) * n];
        let sin_row = &sin_t[k * n..(k + 1) * n];
        let mut re = 0.0f32;
        let mut im = 0.0f32;
        for i in 0..n {
            re += input[i] * cos_row[i];
            im -= input[i] * sin_row[i];
        }

        if k == 0 {
            output[0] = re;
        } else if k == half {
            output[1] = re;
        } else {
            output[2 * k] = re;
            output[2 * k + 1] = im;
        }
    }
}

/// Collapse an interleaved spectrum to squared magnitudes in place and
/// return the `half + 1` power bins. Bins 0 and Nyquist are pure real.
fn power_spectrum_in_place(buffer: &mut [f32]) -> &[f32] {
    let half = buffer.len() / 2;

    let first_energy = buffer[0] * buffer[0];
    let last_energy = buffer[1] * buffer[1];

    for k in 1..half {
        let re = buffer[2 * k];
        let im = buffer[2 * k + 1];
        buffer[k] = re * re + im * im;
    }
    buffer[0] = first_energy;
    buffer[half] = last_energy;

    &buffer[..=half]
}

fn build_dft_tables(n: usize) -> (Vec<f32>, Vec<f32>) {
    let half = n / 2;
    let mut cos_t = vec![0.0f32; (half + 1) * n];
    let mut sin_t = vec![0.0f32; (half + 1) * n];
    for k in 0..=half {
        for i in 0..n {
            let angle = 2.0 * std::f64::consts::PI * (k as f64) * (i as f64) / (n as f64);
            cos_t[k * n + i] = angle.cos() as f32;
            sin_t[k * n + i] = angle.sin() as f32;
        }
    }
    (cos_t, sin_t)
}

fn build_filterbank(config: &MfccConfig) -> Result<Vec<FilterBin>, MfccError> {
    let num_fft_bins = config.frame_len_padded() / 2;
    let fft_bin_width = config.sampling_freq / config.frame_len_padded() as f32;

    let scale = config.mel_scale;
    let mel_lo = scale.hz_to_mel(config.mel_lo_freq);
    let mel_hi = scale.hz_to_mel(config.mel_hi_freq);
    let mel_step = (mel_hi - mel_lo) / (config.num_fbank_bins + 1) as f32;

    let mut filterbank = Vec::with_capacity(config.num_fbank_bins);
    for bin in 0..config.num_fbank_bins {
        let left_mel = mel_lo + bin as f32 * mel_step;
        let center_mel = mel_lo + (bin + 1) as f32 * mel_step;
        let right_mel = mel_lo + (bin + 2) as f32 * mel_step;

        let normalizer = match config.fbank_norm {
            FilterbankNorm::None => 1.0,
            FilterbankNorm::Slaney => {
                2.0 / (scale.mel_to_hz(right_mel) - scale.mel_to_hz(left_mel))
            }
        };

        let mut weights = Vec::new();
        let mut first = None;
        let mut last = 0usize;
        for i in 0..num_fft_bins {
            let freq = fft_bin_width * i as f32;
            let mel = scale.hz_to_mel(freq);
            if mel > left_mel && mel < right_mel {
                let weight = if mel <= center_mel {
                    (mel - left_mel) / (center_mel - left_mel)
                } else {
                    (right_mel - mel) / (right_mel - center_mel)
                };
                if first.is_none() {
                    first = Some(i);
                }
                last = i;
                weights.push(weight * normalizer);
            }
        }

        let Some(first) = first else {
            return Err(MfccError::EmptyFilterSpan { bin });
        };
        filterbank.push(FilterBin {
            weights,
            first,
            last,
        });
    }
    Ok(filterbank)
}

fn build_dct_matrix(input_len: usize, coeff_count: usize, norm: DctNorm) -> Vec<f32> {
    let mut dct = vec![0.0f32; input_len * coeff_count];
    let angle_incr = std::f32::consts::PI / input_len as f32;

    let (norm_k0, norm_rest) = match norm {
        DctNorm::Uniform => {
            let n = (2.0 / input_len as f32).sqrt();
            (n, n)
        }
        DctNorm::Orthonormal => (
            2.0 * (1.0 / (4.0 * input_len as f32)).sqrt(),
            2.0 * (1.0 / (2.0 * input_len as f32)).sqrt(),
        ),
    };

    // Row 0: cos(0) everywhere, only the normalizer matters.
    for v in dct.iter_mut().take(input_len) {
        *v = norm_k0;
    }
    let mut angle = angle_incr;
    for k in 1..coeff_count {
        let row = &mut dct[k * input_len..(k + 1) * input_len];
        for (n, v) in row.iter_mut().enumerate() {
            *v = norm_rest * ((n as f32 + 0.5) * angle).cos();
        }
        angle += angle_incr;
    }
    dct
}

fn apply_filterbank(
    power: &[f32],
    filterbank: &[FilterBin],
    pooling: SpectrumPooling,
    mel_energies: &mut [f32],
) {
    debug_assert_eq!(filterbank.len(), mel_energies.len());
    for (filter, energy) in filterbank.iter().zip(mel_energies.iter_mut()) {
        let mut acc = pooling.energy_floor();
        // The last index may exceed the spectrum when the configuration was
        // built for a wider band; clamp rather than read out of bounds.
        let last = filter.last.min(power.len() - 1);
        for (i, &w) in (filter.first..=last).zip(filter.weights.iter()) {
            let e = match pooling {
                SpectrumPooling::Amplitude => power[i].sqrt(),
                SpectrumPooling::Power => power[i],
            };
            acc += w * e;
        }
        *energy = acc;
    }
}

fn apply_log_compression(mel_energies: &mut [f32], policy: LogCompression) {
    match policy {
        LogCompression::NaturalLog => {
            for e in mel_energies.iter_mut() {
                *e = e.ln();
            }
        }
        LogCompression::DbClamped => {
            let mut max_energy = f32::MIN;
            for e in mel_energies.iter_mut() {
                *e = e.ln() * LOG_DB_MULTIPLIER;
                if *e > max_energy {
                    max_energy = *e;
                }
            }
            let floor = max_energy - LOG_DB_RANGE;
            for e in mel_energies.iter_mut() {
                *e = e.max(floor);
            }
        }
    }
}
