//! Signal-processing constants.
//!
//! These are mathematical properties of the chosen DSP techniques rather
//! than deployment parameters, so they stay compile-time constants.

/// First-derivative FIR kernel (9 taps, linear regression over +-4 frames).
pub const DELTA1_KERNEL: [f32; 9] = [
    6.666_666_7e-2,
    5.0e-2,
    3.333_333_3e-2,
    1.666_666_7e-2,
    -3.469_447e-18,
    -1.666_666_7e-2,
    -3.333_333_3e-2,
    -5.0e-2,
    -6.666_666_7e-2,
];

/// Second-derivative FIR kernel (9 taps).
pub const DELTA2_KERNEL: [f32; 9] = [
    0.060_606_06,
    0.015_151_52,
    -0.017_316_02,
    -0.036_796_54,
    -0.043_290_04,
    -0.036_796_54,
    -0.017_316_02,
    0.015_151_52,
    0.060_606_06,
];

/// Half-width of the delta kernels; frames closer than this to either edge
/// of the feature sequence stay zero.
pub const DELTA_MARGIN: usize = DELTA1_KERNEL.len() / 2;

/// Natural-log mel energies are rescaled by `10 * log10(e)` in the
/// dB-compressed log variant.
pub const LOG_DB_MULTIPLIER: f32 = 10.0 * 0.434_294_48;

/// dB-compressed mel energies are clamped to `max - 80 dB`.
pub const LOG_DB_RANGE: f32 = 80.0;

/// Energy floor for power-summed filterbank bins (avoids `ln(0)`).
pub const MEL_POWER_FLOOR: f32 = 1e-10;

/// Energy floor for amplitude-summed filterbank bins.
pub const MEL_AMPLITUDE_FLOOR: f32 = f32::MIN_POSITIVE;
