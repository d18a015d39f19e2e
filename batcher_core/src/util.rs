//! Small numeric helpers shared by the phase logic.

/// Milliseconds in one second.
pub const MILLIS_PER_SEC: u64 = 1_000;

/// Integer division rounding up; `den == 0` is treated as 1.
#[inline]
pub fn ceil_div(num: u64, den: u64) -> u64 {
    num.div_ceil(den.max(1))
}

/// Round a weight for presentation. Internals keep full precision so
/// rounding error never compounds across mixings.
#[inline]
pub fn round_kg(kg: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(i32::try_from(decimals).unwrap_or(0));
    (kg * factor).round() / factor
}

/// Split `total` evenly over `parts` shares; zero parts yields zero.
#[inline]
pub fn share(total: f64, parts: usize) -> f64 {
    if parts == 0 {
        return 0.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let n = parts as f64;
    total / n
}
