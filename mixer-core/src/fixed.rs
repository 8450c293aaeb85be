//! Fixed-point gain folding for the default (non-`float-mixing`) mixer build.
//! All products happen as `(acc * value) >> 16`; the ramp interpolant scales
//! its ratio to Q16 in `i128` before narrowing back, so a full-scale ramp
//! interpolates to the same precision as the `float-mixing` path.

use crate::walk::VolumeRamp;
use crate::FrameTime;

/// Q16.16: one unit of gain is `1 << 16`.
pub const Q16_ONE: i64 = 1 << 16;
/// Q14 headroom the per-frame accumulator starts from, giving 4x of
/// overshoot room above unity before the `i64` accumulator would need care.
pub const Q14_ONE: i64 = 1 << 14;

pub fn to_q16(v: f64) -> i64 {
    (v * Q16_ONE as f64).round() as i64
}

/// The APPLY_RANGE rule, fixed-point form: fold `ramp`'s contribution
/// at time `t` into a Q14 accumulator.
pub fn apply_range(ramp: &VolumeRamp, t: FrameTime, acc_q14: i64) -> i64 {
    let value_q16 = if t >= ramp.end {
        to_q16(ramp.end_vol)
    } else if t <= ramp.start {
        to_q16(ramp.start_vol)
    } else {
        let start_q16 = to_q16(ramp.start_vol);
        let end_q16 = to_q16(ramp.end_vol);
        let span = (ramp.end - ramp.start) as i128;
        let elapsed = (t - ramp.start) as i128;
        // Scale to a Q16 ratio in i128 before narrowing, so the divide isn't
        // truncated to a handful of bits ahead of the multiply.
        let ratio_q16 = (elapsed << 16) / span;
        let interp = (ratio_q16 * (end_q16 - start_q16) as i128) >> 16;
        start_q16 + interp as i64
    };
    (acc_q14 * value_q16) >> 16
}

/// Fold every ramp in `ramps` into a fresh Q14 accumulator seeded at unity.
pub fn fold_ramps(ramps: &[VolumeRamp], t: FrameTime) -> i64 {
    ramps.iter().fold(Q14_ONE, |acc, ramp| apply_range(ramp, t, acc))
}
