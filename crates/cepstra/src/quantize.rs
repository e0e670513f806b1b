//! Affine float -> fixed-point conversion.
//!
//! Out-of-range values are clamped to the representable range, never
//! rejected: the quantization parameters come from the model's declared
//! tensor metadata and inputs routinely exceed them slightly.

/// Fixed-point target types for affine quantization.
pub trait QuantTarget: Copy {
    const MIN_F: f32;
    const MAX_F: f32;

    /// `v` must already be rounded and within `[MIN_F, MAX_F]`.
    fn from_clamped(v: f32) -> Self;
}

macro_rules! impl_quant_target {
    ($($t:ty),*) => {$(
        impl QuantTarget for $t {
            const MIN_F: f32 = <$t>::MIN as f32;
            const MAX_F: f32 = <$t>::MAX as f32;

            fn from_clamped(v: f32) -> Self {
                v as $t
            }
        }
    )*};
}

impl_quant_target!(i8, u8, i16);

/// Scale and zero-point offset of a quantized tensor
/// (`real ~= scale * (quantized - offset)`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuantParams {
    pub scale: f32,
    pub offset: i32,
}

impl QuantParams {
    /// Map a real value to its fixed-point representation:
    /// `round(v / scale) + offset`, clamped.
    #[must_use]
    pub fn quantize<T: QuantTarget>(self, v: f32) -> T {
        let q = (v / self.scale).round() + self.offset as f32;
        T::from_clamped(q.clamp(T::MIN_F, T::MAX_F))
    }

    /// Recover the real value of a quantized element.
    #[must_use]
    pub fn dequantize(self, q: i32) -> f32 {
        self.scale * (q - self.offset) as f32
    }
}
