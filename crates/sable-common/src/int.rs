//! Big-integer helpers.
//!
//! Compile-time arithmetic is performed on [`num_bigint::BigInt`] so integer
//! literals and folded expressions never overflow host integers. This module
//! adds the pieces the front-end needs on top of `num-bigint`:
//!
//! - literal parsing with `0x`/`0o`/`0b` prefixes and `_` separators,
//! - fixed-width little-endian two's-complement conversions, used for
//!   compile-time casts and bitwise operators,
//! - width-widening bitwise operations over `size * 8` bits.

use num_bigint::{BigInt, Sign};
use num_traits::Zero;

/// Parse the textual form of an integer literal (sign excluded, suffix
/// already stripped). Supports decimal as well as `0x`, `0o`, and `0b`
/// prefixes, and `_` digit separators. Returns `None` for empty digit runs
/// or digits invalid in the chosen radix.
pub fn parse_integer(text: &str) -> Option<BigInt> {
    let (digits, radix) = if let Some(rest) = strip_radix_prefix(text, "0x") {
        (rest, 16)
    } else if let Some(rest) = strip_radix_prefix(text, "0o") {
        (rest, 8)
    } else if let Some(rest) = strip_radix_prefix(text, "0b") {
        (rest, 2)
    } else {
        (text, 10)
    };

    let cleaned: String = digits.chars().filter(|&c| c != '_').collect();
    if cleaned.is_empty() {
        return None;
    }
    BigInt::parse_bytes(cleaned.as_bytes(), radix)
}

fn strip_radix_prefix<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    if text.len() > prefix.len() && text[..prefix.len()].eq_ignore_ascii_case(prefix) {
        Some(&text[prefix.len()..])
    } else {
        None
    }
}

/// Serialize `value` into `width` little-endian bytes of two's complement.
///
/// Returns `None` when the value does not fit: non-negative values must be
/// representable in `width * 8` unsigned bits, negative values in
/// `width * 8` signed bits.
pub fn to_twos_complement(value: &BigInt, width: usize) -> Option<Vec<u8>> {
    if value.sign() == Sign::Minus {
        let mut bytes = value.to_signed_bytes_le();
        if bytes.len() > width {
            return None;
        }
        bytes.resize(width, 0xFF);
        Some(bytes)
    } else {
        let (_, mut bytes) = value.to_bytes_le();
        if bytes == [0] {
            bytes.clear();
        }
        if bytes.len() > width {
            return None;
        }
        bytes.resize(width, 0x00);
        Some(bytes)
    }
}

/// Rebuild a big integer from `width` little-endian two's-complement bytes.
/// With `signed` the top bit is a sign bit; otherwise the bytes are read as
/// an unsigned magnitude.
pub fn from_twos_complement(bytes: &[u8], signed: bool) -> BigInt {
    if signed {
        BigInt::from_signed_bytes_le(bytes)
    } else {
        BigInt::from_bytes_le(Sign::Plus, bytes)
    }
}

/// Bitwise NOT over a `width`-byte two's-complement representation.
///
/// Panics if `value` does not fit in `width` bytes; callers range-check
/// against the operand's type before widening.
pub fn bit_not(value: &BigInt, width: usize, signed: bool) -> BigInt {
    let mut bytes = to_twos_complement(value, width).expect("operand out of range for bit width");
    for byte in &mut bytes {
        *byte = !*byte;
    }
    from_twos_complement(&bytes, signed)
}

/// Bitwise binary operation (`&`, `|`, `^`) over a `width`-byte
/// two's-complement representation of both operands.
pub fn bit_binop(
    lhs: &BigInt,
    rhs: &BigInt,
    width: usize,
    signed: bool,
    op: impl Fn(u8, u8) -> u8,
) -> BigInt {
    let lhs_bytes = to_twos_complement(lhs, width).expect("operand out of range for bit width");
    let rhs_bytes = to_twos_complement(rhs, width).expect("operand out of range for bit width");
    let bytes: Vec<u8> = lhs_bytes
        .iter()
        .zip(&rhs_bytes)
        .map(|(&a, &b)| op(a, b))
        .collect();
    from_twos_complement(&bytes, signed)
}

/// Shift left within a `width`-byte two's-complement representation. Bits
/// shifted past the top are discarded, matching the machine behavior the
/// back-end emits.
pub fn bit_shl(value: &BigInt, amount: u64, width: usize, signed: bool) -> BigInt {
    let bits = (width * 8) as u64;
    if amount >= bits {
        return BigInt::zero();
    }
    let shifted = value << amount;
    let bytes = truncate_to_width(&shifted, width);
    from_twos_complement(&bytes, signed)
}

/// Arithmetic/logical shift right within a `width`-byte two's-complement
/// representation. Signed operands sign-extend, unsigned operands
/// zero-extend.
pub fn bit_shr(value: &BigInt, amount: u64, width: usize, signed: bool) -> BigInt {
    let bits = (width * 8) as u64;
    let bytes = to_twos_complement(value, width).expect("operand out of range for bit width");
    let wide = from_twos_complement(&bytes, signed);
    if amount >= bits {
        return if signed && wide.sign() == Sign::Minus {
            BigInt::from(-1)
        } else {
            BigInt::zero()
        };
    }
    let shifted = wide >> amount;
    let bytes = truncate_to_width(&shifted, width);
    from_twos_complement(&bytes, signed)
}

fn truncate_to_width(value: &BigInt, width: usize) -> Vec<u8> {
    let mut bytes = value.to_signed_bytes_le();
    let fill = if value.sign() == Sign::Minus { 0xFF } else { 0x00 };
    bytes.resize(width, fill);
    bytes.truncate(width);
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_radix_prefixes_and_separators() {
        assert_eq!(parse_integer("123"), Some(BigInt::from(123)));
        assert_eq!(parse_integer("1_000"), Some(BigInt::from(1000)));
        assert_eq!(parse_integer("0xFF"), Some(BigInt::from(255)));
        assert_eq!(parse_integer("0Xab"), Some(BigInt::from(171)));
        assert_eq!(parse_integer("0b1010"), Some(BigInt::from(10)));
        assert_eq!(parse_integer("0o17"), Some(BigInt::from(15)));
        assert_eq!(parse_integer("0x"), None);
        assert_eq!(parse_integer(""), None);
        assert_eq!(parse_integer("0b2"), None);
    }

    #[test]
    fn twos_complement_round_trip() {
        // Every representable value survives the widen/rebuild cycle.
        for width in [1usize, 2, 4, 8] {
            let bits = (width * 8) as u32;
            let umax: BigInt = (BigInt::from(1) << bits) - 1;
            let smin: BigInt = -(BigInt::from(1) << (bits - 1));
            let smax: BigInt = (BigInt::from(1) << (bits - 1)) - 1;
            for value in [
                BigInt::zero(),
                BigInt::from(1),
                smax.clone(),
                umax.clone(),
            ] {
                let bytes = to_twos_complement(&value, width).unwrap();
                assert_eq!(bytes.len(), width);
                assert_eq!(from_twos_complement(&bytes, false), value, "width {width}");
            }
            for value in [smin.clone(), BigInt::from(-1), smax.clone()] {
                let bytes = to_twos_complement(&value, width).unwrap();
                assert_eq!(from_twos_complement(&bytes, true), value, "width {width}");
            }
            // One past either end fails to serialize.
            assert!(to_twos_complement(&(umax + 1), width).is_none());
            assert!(to_twos_complement(&(smin - 1), width).is_none());
        }
    }

    #[test]
    fn negative_values_sign_extend() {
        let bytes = to_twos_complement(&BigInt::from(-1), 4).unwrap();
        assert_eq!(bytes, vec![0xFF, 0xFF, 0xFF, 0xFF]);
        let bytes = to_twos_complement(&BigInt::from(-128), 1).unwrap();
        assert_eq!(bytes, vec![0x80]);
    }

    #[test]
    fn bit_not_flips_within_width() {
        assert_eq!(bit_not(&BigInt::from(0), 1, false), BigInt::from(255));
        assert_eq!(bit_not(&BigInt::from(0xF0), 1, false), BigInt::from(0x0F));
        assert_eq!(bit_not(&BigInt::from(0), 1, true), BigInt::from(-1));
    }

    #[test]
    fn bit_binop_widens_both_sides() {
        let lhs = BigInt::from(0xFF00u32);
        let rhs = BigInt::from(0x0FF0u32);
        assert_eq!(
            bit_binop(&lhs, &rhs, 2, false, |a, b| a & b),
            BigInt::from(0x0F00u32)
        );
        assert_eq!(
            bit_binop(&lhs, &rhs, 2, false, |a, b| a | b),
            BigInt::from(0xFFF0u32)
        );
    }

    #[test]
    fn shifts_truncate_to_width() {
        assert_eq!(bit_shl(&BigInt::from(0x80u32), 1, 1, false), BigInt::zero());
        assert_eq!(bit_shl(&BigInt::from(1), 3, 1, false), BigInt::from(8));
        assert_eq!(bit_shr(&BigInt::from(-2), 1, 1, true), BigInt::from(-1));
        assert_eq!(bit_shr(&BigInt::from(0x80u32), 7, 1, false), BigInt::from(1));
    }
}
