/// Remaining balance at or below which a plan counts as fully paid.
pub const PAID_OFF_THRESHOLD: f64 = 1.0;

/// Rounds to whole cents, half away from zero.
pub fn round_money(value: f64) -> f64 {
    let rounded = (value * 100.0).round() / 100.0;
    // Avoid handing out -0.0 from tiny negative residues.
    if rounded == 0.0 { 0.0 } else { rounded }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_money_keeps_two_decimals() {
        assert_eq!(round_money(10.004), 10.0);
        assert_eq!(round_money(10.005_1), 10.01);
        assert_eq!(round_money(16.666_666), 16.67);
        assert_eq!(round_money(-2.346), -2.35);
    }

    #[test]
    fn round_money_never_returns_negative_zero() {
        let value = round_money(-0.001);
        assert_eq!(value, 0.0);
        assert!(value.is_sign_positive());
    }
}
