//! Small numeric helpers shared by both engines.

use ndarray::ArrayD;

/// `√2`, the constant in front of the adaptive step size.
pub const K: f32 = std::f32::consts::SQRT_2;

/// Divides `num` by `den`, flooring the denominator at `eps`.
#[inline]
pub fn safe_div(num: f32, den: f32, eps: f32) -> f32 {
    num / den.max(eps)
}

/// Returns `a` when `mask` holds, `b` otherwise.
#[inline]
pub fn select<T>(mask: bool, a: T, b: T) -> T {
    if mask { a } else { b }
}

/// Sign of `x` with `sign(0) = 0`.
#[inline]
pub fn sign(x: f32) -> f32 {
    if x > 0. {
        1.
    } else if x < 0. {
        -1.
    } else {
        0.
    }
}

/// Squared L2 norm of every element of `a`.
pub fn norm_sq(a: &ArrayD<f32>) -> f32 {
    a.iter().map(|x| x * x).sum()
}

/// Squared L2 norm of `a + b` without materializing the sum.
///
/// `a` and `b` must share a shape, extra elements of the longer one are ignored.
pub fn sum_norm_sq(a: &ArrayD<f32>, b: &ArrayD<f32>) -> f32 {
    debug_assert_eq!(a.shape(), b.shape());
    a.iter().zip(b).map(|(x, y)| (x + y) * (x + y)).sum()
}

/// The adaptive step size `lr / (√2 · √(2·denom))`, with `denom` floored at `eps`.
#[inline]
pub fn step_size(lr: f32, denom: f32, eps: f32) -> f32 {
    lr / (K * (2. * denom.max(eps)).sqrt())
}
