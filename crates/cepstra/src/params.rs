//! Model profile definitions.
//!
//! A profile bundles everything the pipeline needs to know about a trained
//! model besides its weights: MFCC parameters, window geometry, decoder
//! context partition and label table. Profiles are deserializable from
//! JSON for custom models; the two shipped models have built-in
//! constructors.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::decoder::{ContextWindow, GreedyDecoder};
use crate::mfcc::{
    DctNorm, FilterbankNorm, LogCompression, MelScale, MfccConfig, MfccEngine, SpectrumPooling,
};
use crate::preprocess::{AsrPreprocessor, KwsPreprocessor};

/// Continuous speech recognition (Wav2Letter-style) profile.
#[derive(Debug, Clone, Deserialize)]
pub struct AsrProfile {
    pub mfcc: MfccConfig,
    /// Samples between successive MFCC frames.
    pub frame_stride: usize,
    /// Samples per inference window.
    pub samples_per_window: usize,
    /// Samples between successive inference windows; the overlap is what
    /// the decoder's left/right context discards.
    pub window_stride: usize,
    pub context: ContextWindow,
    pub labels: Vec<char>,
    pub blank_label: char,
}

impl AsrProfile {
    /// The reference Wav2Letter int8 configuration: 16 kHz, 13 cepstral
    /// coefficients over 128 mel bins, 296 frames per window, 148 output
    /// steps of 29 classes.
    #[must_use]
    pub fn wav2letter() -> Self {
        let mut labels: Vec<char> = ('a'..='z').collect();
        labels.push('\'');
        labels.push(' ');
        labels.push('$');

        Self {
            mfcc: MfccConfig {
                sampling_freq: 16_000.0,
                num_fbank_bins: 128,
                mel_lo_freq: 0.0,
                mel_hi_freq: 8_000.0,
                num_mfcc_features: 13,
                frame_len: 512,
                num_mfcc_vectors: 296,
                mel_scale: MelScale::Slaney,
                fbank_norm: FilterbankNorm::Slaney,
                pooling: SpectrumPooling::Power,
                log_compression: LogCompression::DbClamped,
                dct_norm: DctNorm::Orthonormal,
            },
            frame_stride: 160,
            // (296 - 1) * 160 + 512 samples per window; the middle context
            // spans exactly one second, hence the 16000-sample stride.
            samples_per_window: 47_712,
            window_stride: 16_000,
            context: ContextWindow {
                left: 49,
                middle: 50,
                right: 49,
            },
            labels,
            blank_label: '$',
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let profile: Self = serde_json::from_str(json).context("parse ASR profile")?;
        profile.validate()?;
        Ok(profile)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path_ref = path.as_ref();
        let json = std::fs::read_to_string(path_ref)
            .with_context(|| format!("read {}", path_ref.display()))?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(self.frame_stride > 0, "frame stride must be > 0");
        anyhow::ensure!(self.window_stride > 0, "window stride must be > 0");
        anyhow::ensure!(
            self.samples_per_window >= self.mfcc.frame_len,
            "inference window shorter than one frame"
        );
        anyhow::ensure!(self.context.middle > 0, "middle context must be > 0");
        anyhow::ensure!(!self.labels.is_empty(), "label table is empty");
        anyhow::ensure!(
            self.labels.contains(&self.blank_label),
            "blank label '{}' is not in the label table",
            self.blank_label
        );
        Ok(())
    }

    #[must_use]
    pub fn preprocessor(&self) -> AsrPreprocessor {
        AsrPreprocessor::new(MfccEngine::new(self.mfcc.clone()), self.frame_stride)
    }

    #[must_use]
    pub fn decoder(&self) -> GreedyDecoder {
        GreedyDecoder::new(self.labels.clone(), self.blank_label, self.context)
    }
}

/// Keyword spotting (DS-CNN-style) profile.
#[derive(Debug, Clone, Deserialize)]
pub struct KwsProfile {
    pub mfcc: MfccConfig,
    pub frame_stride: usize,
    pub samples_per_window: usize,
    pub window_stride: usize,
    pub labels: Vec<String>,
}

impl KwsProfile {
    /// The reference DS-CNN int8 configuration: one-second windows, 49
    /// frames of 10 coefficients over 40 HTK mel bins, 12 keywords.
    #[must_use]
    pub fn ds_cnn() -> Self {
        Self {
            mfcc: MfccConfig {
                sampling_freq: 16_000.0,
                num_fbank_bins: 40,
                mel_lo_freq: 20.0,
                mel_hi_freq: 4_000.0,
                num_mfcc_features: 10,
                frame_len: 640,
                num_mfcc_vectors: 49,
                mel_scale: MelScale::Htk,
                fbank_norm: FilterbankNorm::None,
                pooling: SpectrumPooling::Amplitude,
                log_compression: LogCompression::NaturalLog,
                dct_norm: DctNorm::Uniform,
            },
            frame_stride: 320,
            samples_per_window: 16_000,
            window_stride: 16_000,
            labels: [
                "silence", "unknown", "yes", "no", "up", "down", "left", "right", "on", "off",
                "stop", "go",
            ]
            .iter()
            .map(|s| (*s).to_owned())
            .collect(),
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let profile: Self = serde_json::from_str(json).context("parse KWS profile")?;
        profile.validate()?;
        Ok(profile)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path_ref = path.as_ref();
        let json = std::fs::read_to_string(path_ref)
            .with_context(|| format!("read {}", path_ref.display()))?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(self.frame_stride > 0, "frame stride must be > 0");
        anyhow::ensure!(self.window_stride > 0, "window stride must be > 0");
        anyhow::ensure!(
            self.samples_per_window >= self.mfcc.frame_len,
            "inference window shorter than one frame"
        );
        anyhow::ensure!(!self.labels.is_empty(), "label table is empty");
        Ok(())
    }

    #[must_use]
    pub fn preprocessor(&self) -> KwsPreprocessor {
        KwsPreprocessor::new(MfccEngine::new(self.mfcc.clone()), self.frame_stride)
    }
}
