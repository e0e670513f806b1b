//! First and second time-derivatives of a feature sequence.

use thiserror::Error;

use crate::buffer::FeatureBuffer;
use crate::constants::{DELTA1_KERNEL, DELTA2_KERNEL, DELTA_MARGIN};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DeltaError {
    #[error("delta buffers are empty")]
    EmptyBuffers,
    #[error("delta buffer shapes differ: {0}x{1} vs {2}x{3}")]
    ShapeMismatch(usize, usize, usize, usize),
}

/// Compute delta1/delta2 for every feature row of `mfcc` via valid-only
/// convolution with the fixed 9-tap kernels.
///
/// Results are written for frame indices `[DELTA_MARGIN, N-1-DELTA_MARGIN]`
/// only; the margin frames keep whatever the caller zero-initialized them
/// to. `delta1` and `delta2` must share `mfcc`'s shape and be non-empty.
pub fn compute_deltas(
    mfcc: &FeatureBuffer,
    delta1: &mut FeatureBuffer,
    delta2: &mut FeatureBuffer,
) -> Result<(), DeltaError> {
    if delta1.is_empty() || delta2.is_empty() {
        return Err(DeltaError::EmptyBuffers);
    }
    if delta1.rows() != delta2.rows()
        || delta1.cols() != delta2.cols()
        || delta1.rows() != mfcc.rows()
        || delta1.cols() != mfcc.cols()
    {
        return Err(DeltaError::ShapeMismatch(
            delta1.rows(),
            delta1.cols(),
            delta2.rows(),
            delta2.cols(),
        ));
    }

    let n_frames = mfcc.cols();
    if n_frames < DELTA1_KERNEL.len() {
        // Too short for one valid output position; margins stay zero.
        return Ok(());
    }

    for r in 0..mfcc.rows() {
        let src = mfcc.row(r);
        for t in DELTA_MARGIN..n_frames - DELTA_MARGIN {
            let span = &src[t - DELTA_MARGIN..t + DELTA_MARGIN + 1];

            let mut d1 = 0.0f32;
            let mut d2 = 0.0f32;
            for (i, &x) in span.iter().enumerate() {
                d1 += DELTA1_KERNEL[i] * x;
                d2 += DELTA2_KERNEL[i] * x;
            }
            delta1.row_mut(r)[t] = d1;
            delta2.row_mut(r)[t] = d2;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{compute_deltas, DeltaError};
    use crate::buffer::FeatureBuffer;
    use crate::constants::DELTA_MARGIN;

    #[test]
    fn constant_row_has_zero_deltas() {
        let mut mfcc = FeatureBuffer::new(2, 16);
        for v in mfcc.as_mut_slice() {
            *v = 3.5;
        }
        let mut d1 = FeatureBuffer::new(2, 16);
        let mut d2 = FeatureBuffer::new(2, 16);
        compute_deltas(&mfcc, &mut d1, &mut d2).expect("valid shapes");

        // Kernel taps sum to ~0, so a constant signal has no derivative.
        for t in DELTA_MARGIN..16 - DELTA_MARGIN {
            assert!(d1.get(0, t).abs() < 1e-5, "d1[{t}] = {}", d1.get(0, t));
            assert!(d2.get(1, t).abs() < 1e-5, "d2[{t}] = {}", d2.get(1, t));
        }
    }

    #[test]
    fn margins_stay_zero() {
        let mut mfcc = FeatureBuffer::new(1, 12);
        for (i, v) in mfcc.as_mut_slice().iter_mut().enumerate() {
            *v = (i as f32).sin();
        }
        let mut d1 = FeatureBuffer::new(1, 12);
        let mut d2 = FeatureBuffer::new(1, 12);
        compute_deltas(&mfcc, &mut d1, &mut d2).expect("valid shapes");

        for t in 0..DELTA_MARGIN {
            assert_eq!(d1.get(0, t), 0.0);
            assert_eq!(d1.get(0, 11 - t), 0.0);
            assert_eq!(d2.get(0, t), 0.0);
            assert_eq!(d2.get(0, 11 - t), 0.0);
        }
        // Interior is written.
        assert!(d1.get(0, 5).abs() > 0.0);
    }

    #[test]
    fn linear_ramp_has_constant_delta1() {
        let mut mfcc = FeatureBuffer::new(1, 16);
        for (i, v) in mfcc.as_mut_slice().iter_mut().enumerate() {
            *v = i as f32;
        }
        let mut d1 = FeatureBuffer::new(1, 16);
        let mut d2 = FeatureBuffer::new(1, 16);
        compute_deltas(&mfcc, &mut d1, &mut d2).expect("valid shapes");

        // Regression slope of an increasing unit ramp is -1 under this
        // kernel orientation (newest sample first in the span).
        let expect = d1.get(0, 5);
        for t in 5..10 {
            assert!((d1.get(0, t) - expect).abs() < 1e-5);
            assert!(d2.get(0, t).abs() < 1e-5);
        }
    }

    #[test]
    fn shape_mismatch_is_an_error() {
        let mfcc = FeatureBuffer::new(2, 16);
        let mut d1 = FeatureBuffer::new(2, 16);
        let mut d2 = FeatureBuffer::new(2, 8);
        assert_eq!(
            compute_deltas(&mfcc, &mut d1, &mut d2),
            Err(DeltaError::ShapeMismatch(2, 16, 2, 8))
        );

        let mut e1 = FeatureBuffer::new(0, 0);
        let mut e2 = FeatureBuffer::new(0, 0);
        assert_eq!(
            compute_deltas(&mfcc, &mut e1, &mut e2),
            Err(DeltaError::EmptyBuffers)
        );
    }
}
