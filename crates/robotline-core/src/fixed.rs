use fixed::types::{I32F32, U64F64};

/// Q32.32 fixed-point: 32 integer bits, 32 fractional bits. Used for
/// probabilities and rates so seeded runs are bit-identical across platforms.
pub type Fixed64 = I32F32;

/// Ticks are the atomic unit of simulated time.
pub type Ticks = u64;

/// Convert an f64 to Fixed64. Use only for configuration, never in the sim loop.
#[inline]
pub fn f64_to_fixed64(v: f64) -> Fixed64 {
    Fixed64::from_num(v)
}

/// Convert Fixed64 to f64. Use only for display.
#[inline]
pub fn fixed64_to_f64(v: Fixed64) -> f64 {
    v.to_num::<f64>()
}

/// Ratio `num / den` as a Fixed64, or `None` when `den` is zero or the
/// quotient does not fit.
///
/// Divides in U64F64 so operands past `i32::MAX` (long runs) stay exact.
#[inline]
pub fn ratio(num: u64, den: u64) -> Option<Fixed64> {
    if den == 0 {
        return None;
    }
    let quotient = U64F64::from_num(num).checked_div(U64F64::from_num(den))?;
    Fixed64::checked_from_num(quotient)
}

/// Clamp a probability into `[0, 1]`.
#[inline]
pub fn clamp_probability(p: Fixed64) -> Fixed64 {
    p.clamp(Fixed64::ZERO, Fixed64::ONE)
}
