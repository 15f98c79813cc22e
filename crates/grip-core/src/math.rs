//! Scalar helpers shared by the smoothing and normalization stages.

/// Denominators at or below this are treated as zero.
pub const EPSILON: f32 = 1e-6;

#[inline]
pub fn clamp01(x: f32) -> f32 {
    if x.is_nan() {
        return 0.0;
    }
    x.clamp(0.0, 1.0)
}

/// `a + (b - a) * t`, with `t` clamped to [0, 1].
#[inline]
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * clamp01(t)
}

/// Position of `x` between `a` and `b`, clamped to [0, 1].
///
/// A degenerate range (`b - a <= EPSILON`) behaves as a step at `a`.
#[inline]
pub fn inverse_lerp(a: f32, b: f32, x: f32) -> f32 {
    let span = b - a;
    if span <= EPSILON {
        return if x > a { 1.0 } else { 0.0 };
    }
    clamp01((x - a) / span)
}

/// Exponential moving average step: `alpha * x + (1 - alpha) * prev`.
#[inline]
pub fn ema(prev: f32, x: f32, alpha: f32) -> f32 {
    alpha * x + (1.0 - alpha) * prev
}
