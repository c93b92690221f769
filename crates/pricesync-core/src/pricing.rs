//! # Pricing Module
//!
//! Conversion between tax-inclusive and tax-exclusive prices, plus the
//! number parsing and fixed-point formatting the widget displays with.
//!
//! ## Conversion Formulas
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  calculate_price(source_kind, price, rate, in_percent)                  │
//! │                                                                         │
//! │  factor = 100 when the rate is a percentage (20), else 1 (0.2)          │
//! │                                                                         │
//! │  source = notax:   price × factor × (factor + rate)                     │
//! │  source = tax:     price × factor ÷ (factor + rate)                     │
//! │                                                                         │
//! │  factor = 1    → the two directions invert each other                   │
//! │  factor = 100  → they do NOT: notax→tax scales by an extra factor²      │
//! │                  (kept as-is, see DESIGN.md)                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Raw vs Displayed Values
//! Cached values are never rounded. Only the text written into an input is
//! formatted to the configured precision, so repeated conversions do not
//! drift.

use crate::types::{PriceKind, ResolvedTaxRate};

/// Upper bound accepted for fixed-point precision.
pub const MAX_PRECISION: u32 = 20;

// =============================================================================
// Parsing
// =============================================================================

/// Parses the longest numeric prefix of `src`, the way a browser's
/// `parseFloat` does. Returns NaN when no digits are found.
///
/// ## Example
/// ```rust
/// use pricesync_core::pricing::parse_float;
///
/// assert_eq!(parse_float("  12.5€"), 12.5);
/// assert_eq!(parse_float("-3e2px"), -300.0);
/// assert!(parse_float("abc").is_nan());
/// ```
pub fn parse_float(src: &str) -> f64 {
    let src = src.trim_start();
    if src.is_empty() {
        return f64::NAN;
    }

    let bytes = src.as_bytes();
    let mut i = 0usize;

    if matches!(bytes.get(i), Some(b'+') | Some(b'-')) {
        i += 1;
    }

    if src[i..].starts_with("Infinity") {
        return if matches!(bytes.first(), Some(b'-')) {
            f64::NEG_INFINITY
        } else {
            f64::INFINITY
        };
    }

    let mut int_digits = 0usize;
    while matches!(bytes.get(i), Some(b) if b.is_ascii_digit()) {
        int_digits += 1;
        i += 1;
    }

    let mut frac_digits = 0usize;
    if bytes.get(i) == Some(&b'.') {
        i += 1;
        while matches!(bytes.get(i), Some(b) if b.is_ascii_digit()) {
            frac_digits += 1;
            i += 1;
        }
    }

    if int_digits + frac_digits == 0 {
        return f64::NAN;
    }

    if matches!(bytes.get(i), Some(b'e') | Some(b'E')) {
        let exp_start = i;
        i += 1;
        if matches!(bytes.get(i), Some(b'+') | Some(b'-')) {
            i += 1;
        }

        let mut exp_digits = 0usize;
        while matches!(bytes.get(i), Some(b) if b.is_ascii_digit()) {
            exp_digits += 1;
            i += 1;
        }

        if exp_digits == 0 {
            i = exp_start;
        }
    }

    src[..i].parse::<f64>().unwrap_or(f64::NAN)
}

/// Parses user input into a usable number.
///
/// Anything that is not a finite number (empty text, letters, `Infinity`)
/// is reported as absent rather than as an error.
pub fn parse_number(src: &str) -> Option<f64> {
    let value = parse_float(src);
    value.is_finite().then_some(value)
}

/// Returns true when the whole string (surrounding whitespace aside) is a
/// finite decimal number. `"20"` qualifies, `"20abc"` and `""` do not.
pub fn is_numeric_str(src: &str) -> bool {
    let trimmed = src.trim();
    let has_letters = trimmed
        .chars()
        .any(|c| c.is_ascii_alphabetic() && c != 'e' && c != 'E');
    if trimmed.is_empty() || has_letters {
        return false;
    }
    trimmed.parse::<f64>().map(f64::is_finite).unwrap_or(false)
}

/// Returns true when `value` holds a finite number.
#[inline]
pub fn is_valid(value: Option<f64>) -> bool {
    matches!(value, Some(v) if v.is_finite())
}

// =============================================================================
// Arithmetic
// =============================================================================

/// Converts a price of kind `source` into the complementary kind.
///
/// Non-finite inputs are returned unchanged.
///
/// ## Example
/// ```rust
/// use pricesync_core::pricing::calculate_price;
/// use pricesync_core::PriceKind;
///
/// let with_tax = calculate_price(PriceKind::NoTax, 100.0, 0.2, false);
/// assert!((with_tax - 120.0).abs() < 1e-9);
///
/// let without_tax = calculate_price(PriceKind::Tax, 120.0, 0.2, false);
/// assert!((without_tax - 100.0).abs() < 1e-9);
/// ```
pub fn calculate_price(source: PriceKind, price: f64, rate: f64, in_percent: bool) -> f64 {
    if !price.is_finite() || !rate.is_finite() {
        return price;
    }

    let factor = if in_percent { 100.0 } else { 1.0 };
    match source {
        PriceKind::NoTax => price * factor * (factor + rate),
        PriceKind::Tax => price * factor / (factor + rate),
    }
}

/// Difference between the tax-inclusive and tax-exclusive prices, floored
/// at zero. Absent unless both prices are valid numbers.
pub fn tax_amount(price_tax: Option<f64>, price_no_tax: Option<f64>) -> Option<f64> {
    match (price_tax, price_no_tax) {
        (Some(tax), Some(no_tax)) if tax.is_finite() && no_tax.is_finite() => {
            Some((tax - no_tax).max(0.0))
        }
        _ => None,
    }
}

/// Resolves the tax rate from an optional live input value and an optional
/// configured fallback.
///
/// ## Resolution Order
/// ```text
/// no live input ──────────────► fallback ─────────► zero
/// live input "20"  (numeric) ─► live value
/// live input "" / "x20" ──────► fallback ─────────► numeric prefix ─► zero
/// ```
pub fn resolve_tax_rate(live_input: Option<&str>, fallback: Option<f64>) -> ResolvedTaxRate {
    let fallback = fallback.filter(|rate| rate.is_finite());

    let Some(raw) = live_input else {
        return fallback.map_or_else(ResolvedTaxRate::zero, ResolvedTaxRate::fallback);
    };

    if is_numeric_str(raw) {
        return ResolvedTaxRate::live(parse_float(raw));
    }

    if let Some(rate) = fallback {
        return ResolvedTaxRate::fallback(rate);
    }

    parse_number(raw).map_or_else(ResolvedTaxRate::zero, ResolvedTaxRate::live)
}

// =============================================================================
// Formatting
// =============================================================================

/// Formats a number with exactly `precision` fractional digits.
///
/// Values exactly halfway between two outputs round away from zero, as a
/// browser's `toFixed` does (`0.125` → `0.13`, `2.5` → `3`). Negative zero
/// prints as `0`.
pub fn to_fixed(value: f64, precision: u32) -> String {
    let precision = precision.min(MAX_PRECISION);
    let value = if value == 0.0 { 0.0 } else { value };

    match halfway_rounded_up(value.abs(), precision) {
        Some(scaled) => {
            let sign = if value < 0.0 { "-" } else { "" };
            format!("{}{}", sign, insert_decimal_point(scaled, precision))
        }
        None => format!("{:.*}", precision as usize, value),
    }
}

/// When `abs` sits exactly halfway between two multiples of `10^-precision`,
/// returns the larger one scaled by `10^precision`.
///
/// ```text
/// abs = odd × 2^exp                  (exact decomposition of the f64)
/// abs × 10^p × 2 = odd × 5^p × 2^(exp + p + 1)
/// halfway  ⇔  that product is an odd integer  ⇔  exp = -(p + 1)
/// ```
fn halfway_rounded_up(abs: f64, precision: u32) -> Option<u128> {
    if !abs.is_finite() || abs == 0.0 {
        return None;
    }

    let bits = abs.to_bits();
    let biased = ((bits >> 52) & 0x7ff) as i32;
    let fraction = bits & ((1u64 << 52) - 1);
    let (mantissa, exp) = if biased == 0 {
        (fraction, -1074)
    } else {
        (fraction | (1u64 << 52), biased - 1075)
    };

    let zeros = mantissa.trailing_zeros();
    let odd = u128::from(mantissa >> zeros);
    if exp + zeros as i32 != -(precision as i32 + 1) {
        return None;
    }

    let scaled = odd.checked_mul(5u128.checked_pow(precision)?)?;
    Some((scaled + 1) / 2)
}

/// `12345`, 2 → `123.45`; `5`, 2 → `0.05`.
fn insert_decimal_point(scaled: u128, precision: u32) -> String {
    let precision = precision as usize;
    let digits = format!("{:0>width$}", scaled, width = precision + 1);
    if precision == 0 {
        return digits;
    }
    let (int_part, frac_part) = digits.split_at(digits.len() - precision);
    format!("{}.{}", int_part, frac_part)
}

/// Shortest plain rendering of a number: `2`, `0.2`, `120.5`.
///
/// Used for query parameters and for recognising numeric data attributes.
pub fn format_number(value: f64) -> String {
    if value == 0.0 {
        return "0".to_string();
    }
    format!("{value}")
}

/// Text written into an input for a cached value: fixed-point for numbers,
/// empty for anything absent, so `NaN` is never shown.
pub fn display_value(value: Option<f64>, precision: u32) -> String {
    match value {
        Some(v) if v.is_finite() => to_fixed(v, precision),
        _ => String::new(),
    }
}

/// Human-readable tax rate, e.g. `20.00%` or `20.00% (default)`.
///
/// ## Example
/// ```rust
/// use pricesync_core::pricing::display_tax_rate;
/// use pricesync_core::ResolvedTaxRate;
///
/// assert_eq!(display_tax_rate(ResolvedTaxRate::live(0.2), false, "default"), "20.00%");
/// assert_eq!(
///     display_tax_rate(ResolvedTaxRate::fallback(5.5), true, "default"),
///     "5.50% (default)"
/// );
/// ```
pub fn display_tax_rate(rate: ResolvedTaxRate, in_percent: bool, default_label: &str) -> String {
    let percent = if in_percent { rate.value } else { rate.value * 100.0 };
    let mut text = to_fixed(percent, 2);
    text.push('%');

    if rate.is_default() {
        text.push_str(&format!(" ({})", default_label));
    }

    text
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_parse_float_prefixes() {
        assert_eq!(parse_float("100"), 100.0);
        assert_eq!(parse_float(" 12.50 EUR"), 12.5);
        assert_eq!(parse_float(".5"), 0.5);
        assert_eq!(parse_float("1e3x"), 1000.0);
        assert_eq!(parse_float("7e"), 7.0);
        assert!(parse_float("").is_nan());
        assert!(parse_float("-").is_nan());
        assert!(parse_float("EUR 12").is_nan());
    }

    #[test]
    fn test_parse_number_rejects_non_finite() {
        assert_eq!(parse_number("42"), Some(42.0));
        assert_eq!(parse_number("0"), Some(0.0));
        assert_eq!(parse_number("Infinity"), None);
        assert_eq!(parse_number("abc"), None);
    }

    #[test]
    fn test_is_numeric_str() {
        assert!(is_numeric_str("20"));
        assert!(is_numeric_str(" 5.5 "));
        assert!(is_numeric_str("1e2"));
        assert!(!is_numeric_str(""));
        assert!(!is_numeric_str("20abc"));
        assert!(!is_numeric_str("inf"));
        assert!(!is_numeric_str("NaN"));
    }

    #[test]
    fn test_round_trip_with_fractional_rate() {
        for price in [0.0, 1.0, 9.99, 100.0, 1234.56] {
            for rate in [0.0, 0.055, 0.2] {
                let with_tax = calculate_price(PriceKind::NoTax, price, rate, false);
                let back = calculate_price(PriceKind::Tax, with_tax, rate, false);
                assert!(approx(back, price), "price {price} rate {rate} gave {back}");
            }
        }
    }

    /// With percentage rates the literal formulas do not invert each other.
    #[test]
    fn test_round_trip_breaks_with_percent_rate() {
        let with_tax = calculate_price(PriceKind::NoTax, 100.0, 20.0, true);
        assert!(approx(with_tax, 1_200_000.0));

        let back = calculate_price(PriceKind::Tax, with_tax, 20.0, true);
        assert!(!approx(back, 100.0));

        // The tax → notax direction alone is still the usual division.
        assert!(approx(calculate_price(PriceKind::Tax, 120.0, 20.0, true), 100.0));
    }

    #[test]
    fn test_calculate_price_passes_through_invalid() {
        assert!(calculate_price(PriceKind::NoTax, f64::NAN, 0.2, false).is_nan());
        assert_eq!(calculate_price(PriceKind::NoTax, 50.0, f64::NAN, false), 50.0);
    }

    #[test]
    fn test_tax_amount_never_negative() {
        assert_eq!(tax_amount(Some(120.0), Some(100.0)), Some(20.0));
        assert_eq!(tax_amount(Some(90.0), Some(100.0)), Some(0.0));
        assert_eq!(tax_amount(None, Some(100.0)), None);
        assert_eq!(tax_amount(Some(f64::NAN), Some(1.0)), None);

        for (tax, no_tax) in [(0.0, 5.0), (-3.0, 2.0), (1e9, -1e9), (7.5, 7.5)] {
            let amount = tax_amount(Some(tax), Some(no_tax)).unwrap();
            assert!(amount >= 0.0);
        }
    }

    #[test]
    fn test_resolve_tax_rate() {
        assert_eq!(resolve_tax_rate(None, Some(0.2)), ResolvedTaxRate::fallback(0.2));
        assert_eq!(resolve_tax_rate(None, None), ResolvedTaxRate::zero());
        assert_eq!(resolve_tax_rate(Some("0.1"), Some(0.2)), ResolvedTaxRate::live(0.1));
        assert_eq!(resolve_tax_rate(Some(""), Some(0.2)), ResolvedTaxRate::fallback(0.2));
        assert_eq!(resolve_tax_rate(Some("5%"), None), ResolvedTaxRate::live(5.0));
        assert_eq!(resolve_tax_rate(Some("abc"), None), ResolvedTaxRate::zero());
        assert_eq!(resolve_tax_rate(None, Some(f64::NAN)), ResolvedTaxRate::zero());
    }

    #[test]
    fn test_to_fixed() {
        assert_eq!(to_fixed(120.0, 2), "120.00");
        assert_eq!(to_fixed(1.0 / 3.0, 3), "0.333");
        assert_eq!(to_fixed(-0.0, 2), "0.00");
        assert_eq!(to_fixed(42.0, 0), "42");
        assert_eq!(to_fixed(1.005, 2), "1.00");
    }

    #[test]
    fn test_to_fixed_rounds_halfway_away_from_zero() {
        assert_eq!(to_fixed(0.125, 2), "0.13");
        assert_eq!(to_fixed(2.5, 0), "3");
        assert_eq!(to_fixed(0.5, 0), "1");
        assert_eq!(to_fixed(-0.125, 2), "-0.13");
        assert_eq!(to_fixed(1.0625, 3), "1.063");
        assert_eq!(to_fixed(0.375, 2), "0.38");
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(100.0), "100");
        assert_eq!(format_number(0.2), "0.2");
        assert_eq!(format_number(-0.0), "0");
        assert_eq!(format_number(120.5), "120.5");
    }

    #[test]
    fn test_display_value_never_nan() {
        assert_eq!(display_value(Some(20.0), 2), "20.00");
        assert_eq!(display_value(None, 2), "");
        assert_eq!(display_value(Some(f64::NAN), 2), "");
    }

    #[test]
    fn test_display_tax_rate() {
        assert_eq!(display_tax_rate(ResolvedTaxRate::live(0.2), false, "default"), "20.00%");
        assert_eq!(
            display_tax_rate(ResolvedTaxRate::fallback(0.2), false, "default"),
            "20.00% (default)"
        );
        assert_eq!(display_tax_rate(ResolvedTaxRate::live(19.6), true, "défaut"), "19.60%");
        assert_eq!(display_tax_rate(ResolvedTaxRate::zero(), false, "default"), "0.00%");
    }
}
