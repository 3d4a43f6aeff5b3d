//! Hysteresis for on-chain writes.

/// Whether `a` and `b` differ by more than `factor`, relative to the larger
/// of the two: `1 - min / max > factor`.
///
/// Two zero prices are never significantly different.
pub fn is_difference_significant(a: f64, b: f64, factor: f64) -> bool {
    let max = a.max(b);
    let min = a.min(b);
    if max <= 0.0 {
        return false;
    }
    factor < 1.0 - min / max
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_cases() {
        let cases = [
            (1.0, 1.0, 0.05, false),
            (4.0, 1.0, 0.25, true),
            (3.0, 1.0, 0.1, true),
            (4.0, 1.0, 0.9, false),
        ];
        for (a, b, factor, expect) in cases {
            assert_eq!(
                is_difference_significant(a, b, factor),
                expect,
                "a={a} b={b} factor={factor}"
            );
        }
    }

    #[test]
    fn argument_order_does_not_matter() {
        assert_eq!(
            is_difference_significant(1.0, 4.0, 0.5),
            is_difference_significant(4.0, 1.0, 0.5)
        );
    }

    #[test]
    fn zero_prices() {
        assert!(!is_difference_significant(0.0, 0.0, 0.05));
        assert!(is_difference_significant(0.0, 10.0, 0.05));
    }

    #[test]
    fn small_drift_is_suppressed() {
        // 1_000_000 → 1_030_000 is under the default 5%.
        assert!(!is_difference_significant(1_030_000.0, 1_000_000.0, 0.05));
        assert!(is_difference_significant(1_100_000.0, 1_000_000.0, 0.05));
    }
}
