//! Model-ready feature buffer assembly.
//!
//! Two assemblers, one per shipped model family:
//! - [`AsrPreprocessor`]: MFCC + delta1 + delta2, whole-buffer
//!   normalization, affine quantization, transposed to the time-major
//!   `[mfcc | delta1 | delta2]` per-frame layout the model expects.
//! - [`KwsPreprocessor`]: quantized MFCC columns written straight into the
//!   time-major output, no derivatives and no normalization.
//!
//! Audio shorter than the inference window is not an error: the final
//! partial frame is computed from whatever samples remain (the engine
//! zero-pads), and wholly missing trailing frames replicate the last
//! computed feature column.

use thiserror::Error;

use crate::buffer::FeatureBuffer;
use crate::delta::{compute_deltas, DeltaError};
use crate::mfcc::{MfccEngine, MfccError};
use crate::normalize::normalize_in_place;
use crate::quantize::{QuantParams, QuantTarget};
use crate::window::SlidingWindow;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PreprocessError {
    #[error(transparent)]
    Mfcc(#[from] MfccError),
    #[error(transparent)]
    Delta(#[from] DeltaError),
}

/// Fills the MFCC buffer column by column from a sliding frame window.
/// Returns the number of columns actually computed from audio.
fn fill_mfcc_columns(
    engine: &mut MfccEngine,
    audio: &[f32],
    frame_len: usize,
    frame_stride: usize,
    mfcc: &mut FeatureBuffer,
) -> Result<usize, MfccError> {
    let num_frames = mfcc.cols();
    let mut frames = SlidingWindow::new(audio, frame_len, frame_stride);

    let mut filled = 0usize;
    while filled < num_frames {
        match frames.next() {
            Some(frame) => {
                let features = engine.compute(frame)?;
                mfcc.set_col(filled, &features);
                filled += 1;
            }
            None => {
                if filled == 0 || frames.remaining_data() > 0 {
                    // Partial or empty tail frame: the engine zero-pads it.
                    let start = frames.next_window_start().min(audio.len());
                    let features = engine.compute(&audio[start..])?;
                    mfcc.set_col(filled, &features);
                    filled += 1;
                }
                break;
            }
        }
    }

    // Short audio: replicate the last computed column into the tail.
    for c in filled..num_frames {
        mfcc.copy_col(filled - 1, c);
    }
    Ok(filled)
}

/// MFCC/delta/delta-delta assembler for the continuous-recognition model.
///
/// Buffers are shaped once from the engine configuration and reused in
/// place across windows; a single instance is not reentrant.
#[derive(Debug)]
pub struct AsrPreprocessor {
    engine: MfccEngine,
    frame_len: usize,
    frame_stride: usize,
    mfcc: FeatureBuffer,
    delta1: FeatureBuffer,
    delta2: FeatureBuffer,
}

impl AsrPreprocessor {
    #[must_use]
    pub fn new(engine: MfccEngine, frame_stride: usize) -> Self {
        let features = engine.config().num_mfcc_features;
        let frames = engine.config().num_mfcc_vectors;
        let frame_len = engine.config().frame_len;
        Self {
            engine,
            frame_len,
            frame_stride,
            mfcc: FeatureBuffer::new(features, frames),
            delta1: FeatureBuffer::new(features, frames),
            delta2: FeatureBuffer::new(features, frames),
        }
    }

    /// Features per frame in the output buffer (MFCC + two delta sets).
    #[must_use]
    pub fn output_frame_width(&self) -> usize {
        3 * self.mfcc.rows()
    }

    /// Total elements in the output buffer.
    #[must_use]
    pub fn output_len(&self) -> usize {
        self.output_frame_width() * self.mfcc.cols()
    }

    /// Turn one window of raw audio into the quantized model input buffer.
    ///
    /// Fails only before any output is written; on success `output` holds
    /// exactly [`Self::output_len`] elements.
    pub fn invoke<T: QuantTarget>(
        &mut self,
        audio: &[f32],
        quant: QuantParams,
        output: &mut Vec<T>,
    ) -> Result<(), PreprocessError> {
        self.mfcc.zero();
        self.delta1.zero();
        self.delta2.zero();

        fill_mfcc_columns(
            &mut self.engine,
            audio,
            self.frame_len,
            self.frame_stride,
            &mut self.mfcc,
        )?;

        compute_deltas(&self.mfcc, &mut self.delta1, &mut self.delta2)?;

        // Three independent normalizations, not one joint pass.
        normalize_in_place(&mut self.mfcc);
        normalize_in_place(&mut self.delta1);
        normalize_in_place(&mut self.delta2);

        // Feature-major internally, time-major for the model: emit per
        // frame, MFCC block then delta1 then delta2.
        output.clear();
        output.reserve(self.output_len());
        for frame in 0..self.mfcc.cols() {
            for buf in [&self.mfcc, &self.delta1, &self.delta2] {
                for feature in 0..buf.rows() {
                    output.push(quant.quantize(buf.get(feature, frame)));
                }
            }
        }
        Ok(())
    }
}

/// Quantized-MFCC assembler for the keyword-spotting model.
#[derive(Debug)]
pub struct KwsPreprocessor {
    engine: MfccEngine,
    frame_len: usize,
    frame_stride: usize,
    num_frames: usize,
}

impl KwsPreprocessor {
    #[must_use]
    pub fn new(engine: MfccEngine, frame_stride: usize) -> Self {
        let frame_len = engine.config().frame_len;
        let num_frames = engine.config().num_mfcc_vectors;
        Self {
            engine,
            frame_len,
            frame_stride,
            num_frames,
        }
    }

    /// Elements in the output buffer (`frames x features`).
    #[must_use]
    pub fn output_len(&self) -> usize {
        self.num_frames * self.engine.config().num_mfcc_features
    }

    /// Quantized MFCC features, time-major, one row per frame.
    pub fn invoke<T: QuantTarget>(
        &mut self,
        audio: &[f32],
        quant: QuantParams,
        output: &mut Vec<T>,
    ) -> Result<(), PreprocessError> {
        let mut frames = SlidingWindow::new(audio, self.frame_len, self.frame_stride);

        output.clear();
        output.reserve(self.output_len());

        let mut last_frame: Vec<T> = Vec::new();
        let mut filled = 0usize;
        while filled < self.num_frames {
            match frames.next() {
                Some(frame) => {
                    let features = self.engine.compute_quantized(frame, quant)?;
                    output.extend_from_slice(&features);
                    last_frame = features;
                    filled += 1;
                }
                None => {
                    if filled == 0 || frames.remaining_data() > 0 {
                        let start = frames.next_window_start().min(audio.len());
                        let features = self.engine.compute_quantized(&audio[start..], quant)?;
                        output.extend_from_slice(&features);
                        last_frame = features;
                        filled += 1;
                    }
                    break;
                }
            }
        }
        for _ in filled..self.num_frames {
            output.extend_from_slice(&last_frame);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{AsrPreprocessor, KwsPreprocessor};
    use crate::mfcc::{
        DctNorm, FilterbankNorm, LogCompression, MelScale, MfccConfig, MfccEngine, SpectrumPooling,
    };
    use crate::quantize::QuantParams;

    fn small_asr_engine() -> MfccEngine {
        MfccEngine::new(MfccConfig {
            sampling_freq: 16_000.0,
            num_fbank_bins: 32,
            mel_lo_freq: 0.0,
            mel_hi_freq: 8000.0,
            num_mfcc_features: 6,
            frame_len: 256,
            num_mfcc_vectors: 20,
            mel_scale: MelScale::Slaney,
            fbank_norm: FilterbankNorm::Slaney,
            pooling: SpectrumPooling::Power,
            log_compression: LogCompression::DbClamped,
            dct_norm: DctNorm::Orthonormal,
        })
    }

    fn kws_engine(num_frames: usize) -> MfccEngine {
        MfccEngine::new(MfccConfig {
            sampling_freq: 16_000.0,
            num_fbank_bins: 40,
            mel_lo_freq: 20.0,
            mel_hi_freq: 4000.0,
            num_mfcc_features: 10,
            frame_len: 640,
            num_mfcc_vectors: num_frames,
            mel_scale: MelScale::Htk,
            fbank_norm: FilterbankNorm::None,
            pooling: SpectrumPooling::Amplitude,
            log_compression: LogCompression::NaturalLog,
            dct_norm: DctNorm::Uniform,
        })
    }

    fn tone(len: usize, hz: f32) -> Vec<f32> {
        (0..len)
            .map(|i| (2.0 * std::f32::consts::PI * hz * i as f32 / 16_000.0).sin() * 0.3)
            .collect()
    }

    #[test]
    fn asr_output_has_full_shape_and_layout() {
        let mut pre = AsrPreprocessor::new(small_asr_engine(), 160);
        assert_eq!(pre.output_frame_width(), 18);
        assert_eq!(pre.output_len(), 18 * 20);

        let audio = tone(256 + 19 * 160, 300.0);
        let quant = QuantParams {
            scale: 0.1,
            offset: 0,
        };
        let mut out: Vec<i8> = Vec::new();
        pre.invoke(&audio, quant, &mut out).expect("preprocess");
        assert_eq!(out.len(), 18 * 20);
    }

    #[test]
    fn asr_short_audio_replicates_last_column() {
        let mut pre = AsrPreprocessor::new(small_asr_engine(), 160);
        // Only enough audio for ~4 of 20 frames.
        let audio = tone(256 + 3 * 160, 300.0);
        let quant = QuantParams {
            scale: 0.05,
            offset: 0,
        };
        let mut out: Vec<i8> = Vec::new();
        pre.invoke(&audio, quant, &mut out).expect("preprocess");
        assert_eq!(out.len(), pre.output_len());

        // The mfcc block of the last two frames must match (replication
        // survives normalization and quantization identically).
        let w = pre.output_frame_width();
        let f18 = &out[18 * w..18 * w + 6];
        let f19 = &out[19 * w..19 * w + 6];
        assert_eq!(f18, f19);
    }

    #[test]
    fn asr_reuses_buffers_across_invocations() {
        let mut pre = AsrPreprocessor::new(small_asr_engine(), 160);
        let quant = QuantParams {
            scale: 0.1,
            offset: 0,
        };
        let mut out1: Vec<i8> = Vec::new();
        let mut out2: Vec<i8> = Vec::new();

        let audio = tone(256 + 19 * 160, 520.0);
        pre.invoke(&audio, quant, &mut out1).expect("first window");
        pre.invoke(&tone(640, 100.0), quant, &mut out2)
            .expect("second window");
        pre.invoke(&audio, quant, &mut out2).expect("third window");

        // Same input after unrelated windows gives the same output: no
        // state leaks between invocations.
        assert_eq!(out1, out2);
    }

    #[test]
    fn kws_fills_expected_frame_count() {
        let mut pre = KwsPreprocessor::new(kws_engine(49), 320);
        assert_eq!(pre.output_len(), 490);

        let audio = tone(16_000, 700.0);
        let quant = QuantParams {
            scale: 1.107_164,
            offset: 95,
        };
        let mut out: Vec<i8> = Vec::new();
        pre.invoke(&audio, quant, &mut out).expect("preprocess");
        assert_eq!(out.len(), 490);
    }

    #[test]
    fn kws_short_audio_pads_with_last_frame() {
        let mut pre = KwsPreprocessor::new(kws_engine(49), 320);
        let audio = tone(1000, 700.0); // two frames, one partial
        let quant = QuantParams {
            scale: 1.107_164,
            offset: 95,
        };
        let mut out: Vec<i8> = Vec::new();
        pre.invoke(&audio, quant, &mut out).expect("preprocess");
        assert_eq!(out.len(), 490);
        assert_eq!(&out[470..480], &out[480..490]);
    }
}
