//! Overflow-safe string/arithmetic helpers.
//!
//! The original engine carried these as bounded-buffer C helpers to avoid
//! silent truncation and integer overflow at API boundaries. Rust's owned
//! `String`/checked-arithmetic primitives remove the truncation hazard
//! outright, so this module keeps only the parts of the contract that have
//! no direct stdlib equivalent: overflow-checked size arithmetic and the
//! strict decimal parse/encode pair used throughout records, manifests and
//! the audit log.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SafeError {
    #[error("integer overflow")]
    Overflow,
    #[error("empty input")]
    Empty,
    #[error("invalid digit")]
    InvalidDigit,
    #[error("value out of range")]
    OutOfRange,
}

/// Checked `usize` addition, failing on wrap rather than panicking or
/// wrapping silently.
pub fn size_add(a: usize, b: usize) -> Result<usize, SafeError> {
    a.checked_add(b).ok_or(SafeError::Overflow)
}

/// Checked `usize` multiplication, failing on wrap.
pub fn size_mul(a: usize, b: usize) -> Result<usize, SafeError> {
    a.checked_mul(b).ok_or(SafeError::Overflow)
}

/// Strict decimal parse into `u32`. Accepts optional surrounding ASCII
/// whitespace, digits only, range `0..=u32::MAX`, rejects empty input.
pub fn parse_u32(s: &str) -> Result<u32, SafeError> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Err(SafeError::Empty);
    }
    if !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return Err(SafeError::InvalidDigit);
    }
    trimmed.parse::<u32>().map_err(|_| SafeError::OutOfRange)
}

/// Decimal encode: shortest form, no leading zero except for zero itself.
/// `u32::to_string` already satisfies this; kept as a named wrapper so call
/// sites read like the rest of the safety-primitive API.
pub fn to_dec(v: u32) -> String {
    v.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_u32_max() {
        assert_eq!(parse_u32("4294967295"), Ok(4294967295));
    }

    #[test]
    fn parse_u32_overflow() {
        assert_eq!(parse_u32("4294967296"), Err(SafeError::OutOfRange));
    }

    #[test]
    fn parse_u32_empty() {
        assert_eq!(parse_u32(""), Err(SafeError::Empty));
    }

    #[test]
    fn parse_u32_trailing_garbage() {
        assert_eq!(parse_u32("12x"), Err(SafeError::InvalidDigit));
    }

    #[test]
    fn parse_u32_whitespace_tolerant() {
        assert_eq!(parse_u32("  42  "), Ok(42));
    }

    #[test]
    fn to_dec_zero() {
        assert_eq!(to_dec(0), "0");
    }

    #[test]
    fn size_add_overflow() {
        assert_eq!(size_add(usize::MAX, 1), Err(SafeError::Overflow));
    }

    #[test]
    fn size_mul_overflow() {
        assert_eq!(size_mul(usize::MAX, 2), Err(SafeError::Overflow));
    }
}
