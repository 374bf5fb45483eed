//! Signed byte codec for decimal values.
//!
//! Wire layout: the unscaled value as a big-endian two's-complement integer
//! of arbitrary length (the `BigInteger#toByteArray` layout that decimal
//! logical types use). Encoding always emits the minimal form; decoding
//! accepts redundant leading sign bytes from external producers.

use bigdecimal::BigDecimal;
use num_bigint::{BigInt, BigUint, Sign};
use num_traits::Zero;
use recast_api::PluginError;

// ═══════════════════════════════════════════════════════════════
//  Encode / decode
// ═══════════════════════════════════════════════════════════════

/// Minimal two's-complement bytes of `value`'s unscaled integer.
/// The scale is not part of the encoding.
pub fn encode(value: &BigDecimal) -> Vec<u8> {
    let (unscaled, _scale) = value.as_bigint_and_exponent();
    encode_unscaled(&unscaled)
}

/// Minimal big-endian two's-complement bytes of `value`.
///
/// Zero is a single `0x00`. A positive value whose top bit would be set
/// gets a leading `0x00`; a negative value never carries a redundant `0xFF`.
pub fn encode_unscaled(value: &BigInt) -> Vec<u8> {
    if value.is_zero() {
        return vec![0];
    }
    value.to_signed_bytes_be()
}

/// Decode big-endian two's-complement `bytes` as an unscaled value with `scale`.
///
/// Any length is accepted, including non-minimal encodings. Empty input is
/// `ErrorKind::Encoding`.
pub fn decode(bytes: &[u8], scale: u32) -> Result<BigDecimal, PluginError> {
    Ok(BigDecimal::new(decode_unscaled(bytes)?, i64::from(scale)))
}

pub fn decode_unscaled(bytes: &[u8]) -> Result<BigInt, PluginError> {
    if bytes.is_empty() {
        return Err(PluginError::encoding(
            "cannot decode a decimal from an empty byte sequence",
        ));
    }
    Ok(BigInt::from_signed_bytes_be(bytes))
}

/// Strip redundant leading sign bytes: `0x00` before a byte with the top bit
/// clear, `0xFF` before a byte with the top bit set. Does not allocate.
pub fn canonicalize(bytes: &[u8]) -> Result<&[u8], PluginError> {
    if bytes.is_empty() {
        return Err(PluginError::encoding("empty byte sequence has no canonical form"));
    }
    let mut start = 0;
    while start + 1 < bytes.len() {
        let next_negative = bytes[start + 1] & 0x80 != 0;
        let redundant = match bytes[start] {
            0x00 => !next_negative,
            0xFF => next_negative,
            _ => false,
        };
        if !redundant {
            break;
        }
        start += 1;
    }
    Ok(&bytes[start..])
}

/// Whether `bytes` is already the minimal encoding of its value.
pub fn is_minimal(bytes: &[u8]) -> bool {
    matches!(canonicalize(bytes), Ok(canonical) if canonical.len() == bytes.len())
}

// ═══════════════════════════════════════════════════════════════
//  Decimal96
// ═══════════════════════════════════════════════════════════════

/// Decimal with a 96-bit unscaled magnitude.
///
/// Layout used by platforms whose native decimal is three 32-bit words of
/// magnitude (`lo`, `mid`, `hi`), a sign flag and a power-of-ten scale in
/// `0..=28`. Its extremes (±79228162514264337593543950335) need 13 bytes on
/// the wire because of the sign byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Decimal96 {
    pub lo: u32,
    pub mid: u32,
    pub hi: u32,
    pub negative: bool,
    pub scale: u8,
}

impl Decimal96 {
    pub const MAX_SCALE: u8 = 28;

    pub const MAX: Decimal96 = Decimal96 {
        lo: u32::MAX,
        mid: u32::MAX,
        hi: u32::MAX,
        negative: false,
        scale: 0,
    };

    pub const MIN: Decimal96 = Decimal96 {
        negative: true,
        ..Decimal96::MAX
    };

    pub fn new(lo: u32, mid: u32, hi: u32, negative: bool, scale: u8) -> Result<Self, PluginError> {
        if scale > Self::MAX_SCALE {
            return Err(PluginError::encoding(format!(
                "decimal96 scale {scale} exceeds {}",
                Self::MAX_SCALE
            )));
        }
        Ok(Self {
            lo,
            mid,
            hi,
            negative,
            scale,
        })
    }

    pub fn unscaled(&self) -> BigInt {
        let magnitude = BigUint::from_slice(&[self.lo, self.mid, self.hi]);
        let sign = if self.negative { Sign::Minus } else { Sign::Plus };
        BigInt::from_biguint(sign, magnitude)
    }

    pub fn to_big_decimal(&self) -> BigDecimal {
        BigDecimal::new(self.unscaled(), i64::from(self.scale))
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        encode_unscaled(&self.unscaled())
    }

    /// Decode wire bytes into a Decimal96, failing if the value does not fit.
    pub fn from_bytes(bytes: &[u8], scale: u8) -> Result<Self, PluginError> {
        let unscaled = decode_unscaled(bytes)?;
        Self::from_unscaled(&unscaled, scale)
    }

    fn from_unscaled(unscaled: &BigInt, scale: u8) -> Result<Self, PluginError> {
        let magnitude = unscaled.magnitude();
        if magnitude.bits() > 96 {
            return Err(PluginError::encoding(format!(
                "decimal magnitude needs {} bits, decimal96 holds 96",
                magnitude.bits()
            )));
        }
        let words = magnitude.to_u32_digits();
        let word = |i: usize| words.get(i).copied().unwrap_or(0);
        Self::new(
            word(0),
            word(1),
            word(2),
            unscaled.sign() == Sign::Minus,
            scale,
        )
    }
}

impl TryFrom<&BigDecimal> for Decimal96 {
    type Error = PluginError;

    fn try_from(value: &BigDecimal) -> Result<Self, Self::Error> {
        let (mut unscaled, mut exponent) = value.as_bigint_and_exponent();
        if exponent < 0 {
            // Negative exponents mean trailing zeros: fold them into the magnitude.
            unscaled = value.with_scale(0).as_bigint_and_exponent().0;
            exponent = 0;
        }
        let scale = u8::try_from(exponent)
            .ok()
            .filter(|s| *s <= Self::MAX_SCALE)
            .ok_or_else(|| {
                PluginError::encoding(format!(
                    "decimal scale {exponent} exceeds {}",
                    Self::MAX_SCALE
                ))
            })?;
        Self::from_unscaled(&unscaled, scale)
    }
}

impl From<Decimal96> for BigDecimal {
    fn from(value: Decimal96) -> Self {
        value.to_big_decimal()
    }
}
