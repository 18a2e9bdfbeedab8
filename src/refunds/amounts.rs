//! Decimal-string money arithmetic.
//!
//! USD amounts travel as decimal strings and are converted to integer
//! smallest-unit counts with pure string/integer arithmetic. Floating-point
//! multiplication is never used: many decimal fractions have no exact
//! binary representation, and the resulting under-rounding loses real
//! money (an amount expected to round up to 101 cents silently becoming
//! 100).

use thiserror::Error;

/// Errors from decimal amount parsing.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AmountError {
    #[error("'{0}' is not a decimal amount")]
    Malformed(String),

    #[error("'{0}' overflows the smallest-unit representation")]
    Overflow(String),
}

/// Convert a decimal string to an integer count of `10^-decimals` units,
/// rounding half-up on the first dropped digit.
///
/// `"1.005"` with 2 decimals is 101; `"100"` is 10000; `"0.1"` is 10.
pub fn to_smallest_units(value: &str, decimals: u32) -> Result<u128, AmountError> {
    let trimmed = value.trim();
    let malformed = || AmountError::Malformed(value.to_string());

    if trimmed.is_empty() || trimmed.starts_with('-') || trimmed.starts_with('+') {
        return Err(malformed());
    }

    let (int_part, frac_part) = match trimmed.split_once('.') {
        Some((i, f)) => (i, f),
        None => (trimmed, ""),
    };

    if int_part.is_empty() && frac_part.is_empty() {
        return Err(malformed());
    }
    if !int_part.chars().all(|c| c.is_ascii_digit())
        || !frac_part.chars().all(|c| c.is_ascii_digit())
    {
        return Err(malformed());
    }

    let scale = 10u128
        .checked_pow(decimals)
        .ok_or_else(|| AmountError::Overflow(value.to_string()))?;

    let whole: u128 = if int_part.is_empty() {
        0
    } else {
        int_part.parse().map_err(|_| AmountError::Overflow(value.to_string()))?
    };

    // Take exactly `decimals` fractional digits, then round half-up on the
    // first dropped digit.
    let kept: String = frac_part.chars().take(decimals as usize).collect();
    let mut frac_units: u128 = if kept.is_empty() {
        0
    } else {
        let padded = format!("{:0<width$}", kept, width = decimals as usize);
        padded.parse().map_err(|_| AmountError::Overflow(value.to_string()))?
    };

    let round_up = frac_part
        .chars()
        .nth(decimals as usize)
        .and_then(|c| c.to_digit(10))
        .is_some_and(|d| d >= 5);
    if round_up {
        frac_units += 1;
    }

    whole
        .checked_mul(scale)
        .and_then(|units| units.checked_add(frac_units))
        .ok_or_else(|| AmountError::Overflow(value.to_string()))
}

/// Convert a decimal USD string to whole cents.
pub fn usd_to_cents(value: &str) -> Result<u64, AmountError> {
    let cents = to_smallest_units(value, 2)?;
    u64::try_from(cents).map_err(|_| AmountError::Overflow(value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sub_cent_rounds_up() {
        assert_eq!(usd_to_cents("1.005").unwrap(), 101);
    }

    #[test]
    fn test_whole_dollars() {
        assert_eq!(usd_to_cents("100").unwrap(), 10000);
    }

    #[test]
    fn test_tenth_of_dollar() {
        assert_eq!(usd_to_cents("0.1").unwrap(), 10);
    }

    #[test]
    fn test_sub_cent_rounds_down_below_half() {
        assert_eq!(usd_to_cents("1.004").unwrap(), 100);
        assert_eq!(usd_to_cents("0.0049").unwrap(), 0);
    }

    #[test]
    fn test_token_units_six_decimals() {
        assert_eq!(to_smallest_units("25.50", 6).unwrap(), 25_500_000);
        assert_eq!(to_smallest_units("0.000001", 6).unwrap(), 1);
        assert_eq!(to_smallest_units("0.0000015", 6).unwrap(), 2);
    }

    #[test]
    fn test_leading_dot_and_trailing_dot() {
        assert_eq!(usd_to_cents(".5").unwrap(), 50);
        assert_eq!(usd_to_cents("5.").unwrap(), 500);
    }

    #[test]
    fn test_malformed_inputs_rejected() {
        for bad in ["", " ", "-1", "+1", "1.2.3", "12a", "1,50", "."] {
            assert!(
                matches!(to_smallest_units(bad, 2), Err(AmountError::Malformed(_))),
                "expected '{}' to be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_overflow_rejected() {
        let huge = "9".repeat(60);
        assert!(matches!(
            to_smallest_units(&huge, 6),
            Err(AmountError::Overflow(_))
        ));
    }

    #[test]
    fn test_zero_parses_to_zero() {
        assert_eq!(usd_to_cents("0").unwrap(), 0);
        assert_eq!(usd_to_cents("0.00").unwrap(), 0);
    }
}
