//! Streaming recognition pipelines: preprocess -> inference -> decode.
//!
//! Inference itself is an external collaborator behind [`InferenceEngine`];
//! this module only orchestrates and carries the per-stream decode state.
//! Everything is synchronous and caller-paced; a pipeline instance reuses
//! its buffers and is not reentrant.

use anyhow::Result;

use crate::decoder::{classify, ContextSlice, GreedyDecoder};
use crate::preprocess::{AsrPreprocessor, KwsPreprocessor, PreprocessError};
use crate::quantize::QuantParams;

/// External executor of the quantized model.
///
/// Quantization parameters are declared by the executor's tensor metadata,
/// never chosen here.
pub trait InferenceEngine {
    fn input_quantization(&self) -> QuantParams;
    fn output_quantization(&self) -> QuantParams;
    fn infer(&mut self, input: &[i8]) -> Result<Vec<i8>>;
}

/// Where a stream currently is, relative to its first inference window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WindowPosition {
    #[default]
    AwaitingFirstWindow,
    Streaming,
}

/// Cross-window decode state, explicit so tests can drive arbitrary window
/// sequences. The only mutable state shared between pipeline calls.
#[derive(Debug, Clone, Default)]
pub struct PipelineState {
    position: WindowPosition,
    carried_right: String,
}

impl PipelineState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn position(&self) -> WindowPosition {
        self.position
    }

    /// Drain the right-context fragment of the most recent window. For
    /// callers that only learn the stream ended after the last
    /// `post_process` call.
    pub fn finish(&mut self) -> String {
        std::mem::take(&mut self.carried_right)
    }
}

/// Continuous speech recognition pipeline.
pub struct AsrPipeline<E> {
    preprocessor: AsrPreprocessor,
    engine: E,
    decoder: GreedyDecoder,
    input_buffer: Vec<i8>,
}

impl<E: InferenceEngine> AsrPipeline<E> {
    #[must_use]
    pub fn new(preprocessor: AsrPreprocessor, decoder: GreedyDecoder, engine: E) -> Self {
        Self {
            preprocessor,
            engine,
            decoder,
            input_buffer: Vec::new(),
        }
    }

    /// Raw audio chunk -> quantized model input. Always available,
    /// regardless of stream state.
    pub fn pre_process(&mut self, chunk: &[f32]) -> Result<&[i8], PreprocessError> {
        let quant = self.engine.input_quantization();
        self.preprocessor
            .invoke(chunk, quant, &mut self.input_buffer)?;
        Ok(&self.input_buffer)
    }

    /// Delegate one inference call to the external executor.
    pub fn inference(&mut self, input: &[i8]) -> Result<Vec<i8>> {
        self.engine.infer(input)
    }

    /// Decode one window's output in the context mode the stream state
    /// calls for, then advance the state.
    ///
    /// The first window emits left + middle context; every later window
    /// emits middle only. The right-context fragment is decoded each call
    /// and carried in `state`; `is_last` appends it immediately, otherwise
    /// [`PipelineState::finish`] can drain it later.
    pub fn post_process(
        &self,
        output: &[i8],
        state: &mut PipelineState,
        is_last: bool,
    ) -> String {
        let slice = match state.position {
            WindowPosition::AwaitingFirstWindow => ContextSlice::LeftAndMiddle,
            WindowPosition::Streaming => ContextSlice::MiddleOnly,
        };
        let mut text = self.decoder.decode_window(output, slice);
        state.position = WindowPosition::Streaming;
        state.carried_right = self.decoder.decode_window(output, ContextSlice::RightOnly);

        if is_last {
            text.push_str(&state.finish());
        }
        text
    }

    /// Convenience: run one chunk through all three stages.
    pub fn run_window(
        &mut self,
        chunk: &[f32],
        state: &mut PipelineState,
        is_last: bool,
    ) -> Result<String> {
        self.pre_process(chunk)?;
        let input = std::mem::take(&mut self.input_buffer);
        let output = self.engine.infer(&input)?;
        self.input_buffer = input;
        Ok(self.post_process(&output, state, is_last))
    }
}

/// Keyword-spotting pipeline: every window is a standalone classification.
pub struct KwsPipeline<E> {
    preprocessor: KwsPreprocessor,
    engine: E,
    labels: Vec<String>,
    input_buffer: Vec<i8>,
}

impl<E: InferenceEngine> KwsPipeline<E> {
    #[must_use]
    pub fn new(preprocessor: KwsPreprocessor, labels: Vec<String>, engine: E) -> Self {
        Self {
            preprocessor,
            engine,
            labels,
            input_buffer: Vec::new(),
        }
    }

    pub fn pre_process(&mut self, chunk: &[f32]) -> Result<&[i8], PreprocessError> {
        let quant = self.engine.input_quantization();
        self.preprocessor
            .invoke(chunk, quant, &mut self.input_buffer)?;
        Ok(&self.input_buffer)
    }

    /// Winning label and dequantized confidence for one output vector.
    #[must_use]
    pub fn post_process(&self, output: &[i8]) -> Option<(usize, &str, f32)> {
        let quant = self.engine.output_quantization();
        let (index, score) = classify(output, quant)?;
        let label = self.labels.get(index)?;
        Some((index, label, score))
    }

    /// Classify one chunk of raw audio.
    pub fn run_window(&mut self, chunk: &[f32]) -> Result<Option<(usize, String, f32)>> {
        self.pre_process(chunk)?;
        let input = std::mem::take(&mut self.input_buffer);
        let output = self.engine.infer(&input)?;
        self.input_buffer = input;
        Ok(self
            .post_process(&output)
            .map(|(i, label, score)| (i, label.to_owned(), score)))
    }
}

#[cfg(test)]
mod tests {
    use super::{AsrPipeline, InferenceEngine, KwsPipeline, PipelineState, WindowPosition};
    use crate::decoder::{ContextWindow, GreedyDecoder};
    use crate::mfcc::{
        DctNorm, FilterbankNorm, LogCompression, MelScale, MfccConfig, MfccEngine, SpectrumPooling,
    };
    use crate::preprocess::{AsrPreprocessor, KwsPreprocessor};
    use crate::quantize::QuantParams;
    use std::collections::VecDeque;

    /// Canned-output stand-in for the external executor.
    struct FakeEngine {
        outputs: VecDeque<Vec<i8>>,
        seen_input_lens: Vec<usize>,
    }

    impl FakeEngine {
        fn new(outputs: Vec<Vec<i8>>) -> Self {
            Self {
                outputs: outputs.into(),
                seen_input_lens: Vec::new(),
            }
        }
    }

    impl InferenceEngine for FakeEngine {
        fn input_quantization(&self) -> QuantParams {
            QuantParams {
                scale: 0.1,
                offset: 0,
            }
        }

        fn output_quantization(&self) -> QuantParams {
            QuantParams {
                scale: 0.5,
                offset: 10,
            }
        }

        fn infer(&mut self, input: &[i8]) -> anyhow::Result<Vec<i8>> {
            self.seen_input_lens.push(input.len());
            self.outputs
                .pop_front()
                .ok_or_else(|| anyhow::anyhow!("no canned output left"))
        }
    }

    fn tiny_engine(features: usize, frames: usize) -> MfccEngine {
        MfccEngine::new(MfccConfig {
            sampling_freq: 16_000.0,
            num_fbank_bins: 16,
            mel_lo_freq: 0.0,
            mel_hi_freq: 8000.0,
            num_mfcc_features: features,
            frame_len: 128,
            num_mfcc_vectors: frames,
            mel_scale: MelScale::Slaney,
            fbank_norm: FilterbankNorm::Slaney,
            pooling: SpectrumPooling::Power,
            log_compression: LogCompression::DbClamped,
            dct_norm: DctNorm::Orthonormal,
        })
    }

    /// One-hot rows over 4 labels (a, b, space, blank '$').
    fn rows(indices: &[usize]) -> Vec<i8> {
        let mut out = vec![0i8; indices.len() * 4];
        for (t, &i) in indices.iter().enumerate() {
            out[t * 4 + i] = 100;
        }
        out
    }

    #[test]
    fn three_window_stream_stitches_without_duplicates() {
        // 8 output steps per window: left 2, middle 4, right 2.
        let ctx = ContextWindow {
            left: 2,
            middle: 4,
            right: 2,
        };
        let decoder = GreedyDecoder::new(vec!['a', 'b', ' ', '$'], '$', ctx);

        // Window 1: "ab" from left+middle, right holds "a" (overlap with
        // window 2's left). Window 2 middle: " b". Window 3 middle "a",
        // right context "b " emitted only because it is the last window.
        let w1 = rows(&[0, 3, 1, 1, 3, 3, 0, 0]);
        let w2 = rows(&[0, 0, 3, 2, 1, 3, 1, 3]);
        let w3 = rows(&[1, 3, 0, 0, 3, 3, 1, 2]);

        let engine = FakeEngine::new(vec![w1, w2, w3]);
        let pre = AsrPreprocessor::new(tiny_engine(4, 12), 64);
        let mut pipeline = AsrPipeline::new(pre, decoder, engine);

        let mut state = PipelineState::new();
        assert_eq!(state.position(), WindowPosition::AwaitingFirstWindow);

        let chunk = vec![0.01f32; 128 + 11 * 64];
        let t1 = pipeline.run_window(&chunk, &mut state, false).unwrap();
        let t2 = pipeline.run_window(&chunk, &mut state, false).unwrap();
        let t3 = pipeline.run_window(&chunk, &mut state, true).unwrap();

        assert_eq!(t1, "ab");
        assert_eq!(state.position(), WindowPosition::Streaming);
        assert_eq!(t2, " b");
        assert_eq!(t3, "ab ");
        assert_eq!(format!("{t1}{t2}{t3}"), "ab bab ");

        // The carried fragment was consumed by is_last.
        assert_eq!(state.finish(), "");
    }

    #[test]
    fn finish_drains_carried_right_context() {
        let ctx = ContextWindow {
            left: 1,
            middle: 2,
            right: 1,
        };
        let decoder = GreedyDecoder::new(vec!['a', 'b', ' ', '$'], '$', ctx);
        let engine = FakeEngine::new(vec![rows(&[0, 0, 1, 0])]);
        let pre = AsrPreprocessor::new(tiny_engine(4, 12), 64);
        let mut pipeline = AsrPipeline::new(pre, decoder, engine);

        let mut state = PipelineState::new();
        let chunk = vec![0.01f32; 512];
        let text = pipeline.run_window(&chunk, &mut state, false).unwrap();
        assert_eq!(text, "ab");

        // Caller discovers end-of-stream afterwards.
        assert_eq!(state.finish(), "a");
        assert_eq!(state.finish(), "");
    }

    #[test]
    fn kws_pipeline_classifies_a_window() {
        let pre = KwsPreprocessor::new(tiny_engine(4, 10), 64);
        let labels: Vec<String> = ["silence", "unknown", "yes", "no"]
            .iter()
            .map(|s| (*s).to_owned())
            .collect();
        let engine = FakeEngine::new(vec![vec![1, 4, 43, 3]]);
        let mut pipeline = KwsPipeline::new(pre, labels, engine);

        let chunk = vec![0.02f32; 128 + 9 * 64];
        let (index, label, score) = pipeline
            .run_window(&chunk)
            .unwrap()
            .expect("classification");
        assert_eq!(index, 2);
        assert_eq!(label, "yes");
        // Dequantized with the declared output params: 0.5 * (43 - 10).
        assert!((score - 16.5).abs() < 1e-6);

        // Model input had the expected element count.
        assert_eq!(pipeline.engine.seen_input_lens, vec![40]);
    }
}
