//! Predicates over token and rendered-value text.
//!
//! These never fail; malformed input is simply "not a number".

fn as_number(text: &str) -> Option<f64> { text.trim().parse::<f64>().ok() }

/// Does `text` parse as a real number?
pub fn is_numeric(text: &str) -> bool { as_number(text).is_some() }

/// Is `text` a number without a fractional part?
pub fn is_integer_valued(text: &str) -> bool {
    match as_number(text) {
        Some(value) => value.is_finite() && value.fract() == 0.0,
        None => false,
    }
}

/// Does `text` look negative?
///
/// Numbers are negative when their value is below zero. Anything else
/// (names, symbols, rendered sub-expressions) is negative when it starts
/// with a `-`.
pub fn is_sign_negative(text: &str) -> bool {
    match as_number(text) {
        Some(value) => value < 0.0,
        None => text.starts_with('-'),
    }
}

/// Does `text` denote the integer `expected` (`1`, `1.0` and `1e0` all
/// count as one)?
pub(crate) fn is_integer(text: &str, expected: i64) -> bool {
    is_integer_valued(text)
        && as_number(text).map(|value| value == expected as f64) == Some(true)
}
