//! Fixed-point acoustic feature extraction and decoding for embedded
//! speech models.
//!
//! The crate covers the numeric front- and back-end around an external
//! quantized-model executor:
//! - MFCC extraction (windowing, FFT, mel filterbank, log, DCT)
//! - delta features, whole-buffer normalization, affine quantization
//! - greedy sequence decoding with overlap-window stitching, and argmax
//!   keyword classification
//! - the streaming pipelines that tie those together
//!
//! Everything is synchronous, allocation-lean and deterministic: given the
//! same configuration the output is bit-similar to the fixed-point
//! reference models this crate targets.

pub mod audio;
pub mod buffer;
pub mod constants;
pub mod decoder;
pub mod delta;
pub mod mfcc;
pub mod normalize;
pub mod params;
pub mod pipeline;
pub mod preprocess;
pub mod quantize;
pub mod window;
