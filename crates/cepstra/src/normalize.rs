//! Zero-mean / unit-variance normalization.

use crate::buffer::FeatureBuffer;

/// Normalize the whole buffer in place to zero mean and unit variance.
///
/// The mean and (population) standard deviation are taken over all
/// elements, all features and all frames together, not per row. A
/// zero-variance buffer is set to all zeros rather than dividing by zero.
pub fn normalize_in_place(buf: &mut FeatureBuffer) {
    let data = buf.as_mut_slice();
    if data.is_empty() {
        return;
    }

    let n = data.len() as f32;
    let mean = data.iter().sum::<f32>() / n;
    let var = data.iter().map(|&v| (v - mean) * (v - mean)).sum::<f32>() / n;
    let stddev = var.sqrt();

    if stddev == 0.0 {
        data.fill(0.0);
        return;
    }

    for v in data.iter_mut() {
        *v = (*v - mean) / stddev;
    }
}
