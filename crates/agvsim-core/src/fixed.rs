use fixed::types::I32F32;

/// Q32.32 fixed-point: 32 integer bits, 32 fractional bits.
pub type Fixed64 = I32F32;

/// Ticks are the atomic unit of simulation time.
pub type Ticks = u64;

/// Convert an f64 to Fixed64. Use only for initialization, never in sim loop.
#[inline]
pub fn f64_to_fixed64(v: f64) -> Fixed64 {
    Fixed64::from_num(v)
}

/// Convert Fixed64 to f64. Use only for display, never in sim loop.
#[inline]
pub fn fixed64_to_f64(v: Fixed64) -> f64 {
    v.to_num::<f64>()
}

/// `numerator / denominator` as a Fixed64, or zero when the denominator is zero.
///
/// Quotients past the integer range saturate at [`Fixed64::MAX`].
#[inline]
pub fn ratio(numerator: u64, denominator: u64) -> Fixed64 {
    if denominator == 0 {
        return Fixed64::ZERO;
    }
    let bits = (u128::from(numerator) << 32) / u128::from(denominator);
    Fixed64::from_bits(i64::try_from(bits).unwrap_or(i64::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_f64() {
        let v = 3.25;
        assert_eq!(fixed64_to_f64(f64_to_fixed64(v)), v);
    }

    #[test]
    fn ratio_handles_zero_denominator() {
        assert_eq!(ratio(5, 0), Fixed64::ZERO);
        assert_eq!(ratio(1, 4), Fixed64::from_num(0.25));
    }

    #[test]
    fn ratio_of_large_counts() {
        assert_eq!(ratio(6_000_000_000, 2_000_000_000), Fixed64::from_num(3));
        assert_eq!(ratio(5_000_000_000, 2), Fixed64::MAX);
        assert_eq!(ratio(u64::MAX, 1), Fixed64::MAX);
        assert_eq!(ratio(1, 3), Fixed64::from_num(1) / Fixed64::from_num(3));
    }
}
