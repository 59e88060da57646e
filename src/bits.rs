//! Bit-cursor fixed-point codec.
//!
//! Packs signed fixed-point quantities into N-bit fields (N = 3..=32) at an arbitrary bit offset
//! inside a caller-owned buffer. The caller owns both the buffer and the cursor; each call
//! touches only the bits `[cursor, cursor + N)` and advances the cursor by exactly N.
//!
//! ## Wire layout
//!
//! - Bit position `p` lives in byte `p / 8` at bit `p % 8`; bits are packed least-significant
//!   first, the same convention the rest of the crate uses for bit-level fields.
//! - Codes are N-bit two's complement. With `H = 2^(N-1)`:
//!
//! | Code | Meaning |
//! |------|---------|
//! | `-(H-2) ..= H-2` | numeric code ([`FixedPoint::MIN`] ..= [`FixedPoint::MAX`]) |
//! | `H-1` | +Infinity |
//! | `-(H-1)` | -Infinity |
//! | `-H` | NaN |
//!
//! ## Scaling
//!
//! `physical = code * fraction + offset`. On write `code = round((value - offset) / fraction)`,
//! rounding half away from zero.
//!
//! The unbounded path ([`FixedPoint::encode`], [`FixedPoint::encode_scaled`]) saturates: values
//! above the largest representable physical value become +Infinity, values below the smallest
//! become -Infinity. The bounded path ([`FixedPoint::encode_bounded`],
//! [`FixedPoint::decode_bounded`]) rejects anything outside an explicit `[min, max]` instead.
//!
//! ## Example
//!
//! ```
//! use fieldpack::bits::Bits12;
//!
//! let mut buf = [0u8; 4];
//! let mut cursor = 3;
//! Bits12::encode_scaled(&mut buf, &mut cursor, 12.5, 0.25, 0.0).unwrap();
//! assert_eq!(cursor, 15);
//!
//! let mut cursor = 3;
//! assert_eq!(Bits12::decode_scaled(&buf, &mut cursor, 0.25, 0.0).unwrap(), 12.5);
//! ```

/// Errors raised by the bit-cursor codec.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BitError {
    #[error("cannot access {bits} bits at bit {cursor}: buffer holds {len_bits} bits")]
    OutOfBounds { cursor: usize, bits: u32, len_bits: usize },
    #[error("value {value} outside [{min}, {max}]")]
    OutOfRange { value: f64, min: f64, max: f64 },
    #[error("invalid bounds [{min}, {max}]")]
    InvalidBounds { min: f64, max: f64 },
    #[error("invalid scale: fraction {fraction}, offset {offset}")]
    InvalidScale { fraction: f64, offset: f64 },
    #[error("invalid raw bit width {0} (expected 1..=64)")]
    InvalidWidth(u32),
}

fn check_span(len_bytes: usize, cursor: usize, bits: u32) -> Result<(), BitError> {
    let len_bits = len_bytes.saturating_mul(8);
    match cursor.checked_add(bits as usize) {
        Some(end) if end <= len_bits => Ok(()),
        _ => Err(BitError::OutOfBounds { cursor, bits, len_bits }),
    }
}

/// Write the low `bits` bits of `value` at `cursor` (LSB first) and advance the cursor.
///
/// Bits outside `[cursor, cursor + bits)` are preserved. On error neither the buffer nor the
/// cursor changes.
pub fn write_bits(buffer: &mut [u8], cursor: &mut usize, bits: u32, value: u64) -> Result<(), BitError> {
    if bits == 0 || bits > 64 {
        return Err(BitError::InvalidWidth(bits));
    }
    check_span(buffer.len(), *cursor, bits)?;
    let mut pos = *cursor;
    let mut value = value;
    let mut remaining = bits;
    while remaining > 0 {
        let byte = pos / 8;
        let shift = (pos % 8) as u32;
        let take = (8 - shift).min(remaining);
        let mask = ((1u16 << take) - 1) as u8;
        buffer[byte] = (buffer[byte] & !(mask << shift)) | (((value as u8) & mask) << shift);
        value >>= take;
        pos += take as usize;
        remaining -= take;
    }
    *cursor = pos;
    Ok(())
}

/// Read `bits` bits at `cursor` (LSB first) and advance the cursor.
pub fn read_bits(buffer: &[u8], cursor: &mut usize, bits: u32) -> Result<u64, BitError> {
    if bits == 0 || bits > 64 {
        return Err(BitError::InvalidWidth(bits));
    }
    check_span(buffer.len(), *cursor, bits)?;
    let mut pos = *cursor;
    let mut out = 0u64;
    let mut filled = 0u32;
    while filled < bits {
        let byte = pos / 8;
        let shift = (pos % 8) as u32;
        let take = (8 - shift).min(bits - filled);
        let chunk = ((buffer[byte] >> shift) as u64) & ((1u64 << take) - 1);
        out |= chunk << filled;
        pos += take as usize;
        filled += take;
    }
    *cursor = pos;
    Ok(out)
}

fn check_scale(fraction: f64, offset: f64) -> Result<(), BitError> {
    if fraction.is_finite() && fraction > 0.0 && offset.is_finite() {
        Ok(())
    } else {
        Err(BitError::InvalidScale { fraction, offset })
    }
}

fn check_bounds(min: f64, max: f64) -> Result<(), BitError> {
    if min.is_nan() || max.is_nan() || min > max {
        Err(BitError::InvalidBounds { min, max })
    } else {
        Ok(())
    }
}

/// Relative slack for bound checks on quantized values, so `3 * 0.1` still counts as `0.3`.
const RANGE_TOLERANCE: f64 = 1e-9;

fn within_bounds(value: f64, min: f64, max: f64) -> bool {
    let slack = RANGE_TOLERANCE * min.abs().max(max.abs());
    value >= min - slack && value <= max + slack
}

/// Signed fixed-point codec over `BITS` bits (3..=32).
///
/// Use the [`Bits3`] .. [`Bits32`] aliases. Instantiating a width outside 3..=32 fails to
/// compile.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedPoint<const BITS: u32>;

impl<const BITS: u32> FixedPoint<BITS> {
    const WIDTH_OK: () = assert!(BITS >= 3 && BITS <= 32, "fixed-point width must be 3..=32 bits");
    const HALF: i64 = 1i64 << (BITS - 1);
    const MASK: u64 = (1u64 << BITS) - 1;

    /// Field width in bits; also the cursor advance of every call.
    pub const WIDTH: u32 = BITS;
    /// Largest numeric code.
    pub const MAX: i64 = Self::HALF - 2;
    /// Smallest numeric code (`-MAX`).
    pub const MIN: i64 = -Self::MAX;
    /// Reserved code for +Infinity.
    pub const POS_INF_CODE: i64 = Self::HALF - 1;
    /// Reserved code for -Infinity.
    pub const NEG_INF_CODE: i64 = -(Self::HALF - 1);
    /// Reserved code for NaN.
    pub const NAN_CODE: i64 = -Self::HALF;

    /// Largest finite physical value for the given scale.
    pub fn max_physical(fraction: f64, offset: f64) -> f64 {
        Self::MAX as f64 * fraction + offset
    }

    /// Smallest finite physical value for the given scale.
    pub fn min_physical(fraction: f64, offset: f64) -> f64 {
        Self::MIN as f64 * fraction + offset
    }

    /// Map a physical value to its code, saturating to the infinity sentinels.
    pub fn to_code(value: f64, fraction: f64, offset: f64) -> i64 {
        if value.is_nan() {
            return Self::NAN_CODE;
        }
        if value.is_infinite() {
            return if value > 0.0 { Self::POS_INF_CODE } else { Self::NEG_INF_CODE };
        }
        if value > Self::max_physical(fraction, offset) {
            return Self::POS_INF_CODE;
        }
        if value < Self::min_physical(fraction, offset) {
            return Self::NEG_INF_CODE;
        }
        let code = ((value - offset) / fraction).round() as i64;
        code.clamp(Self::MIN, Self::MAX)
    }

    /// Map a code back to its physical value; sentinels become NaN / ±Infinity.
    pub fn from_code(code: i64, fraction: f64, offset: f64) -> f64 {
        match code {
            c if c == Self::NAN_CODE => f64::NAN,
            c if c == Self::POS_INF_CODE => f64::INFINITY,
            c if c == Self::NEG_INF_CODE => f64::NEG_INFINITY,
            c => c as f64 * fraction + offset,
        }
    }

    /// Write a raw code (two's complement, truncated to `BITS`).
    pub fn write_code(buffer: &mut [u8], cursor: &mut usize, code: i64) -> Result<(), BitError> {
        let () = Self::WIDTH_OK;
        write_bits(buffer, cursor, BITS, (code as u64) & Self::MASK)
    }

    /// Read a raw code, sign-extended.
    pub fn read_code(buffer: &[u8], cursor: &mut usize) -> Result<i64, BitError> {
        let () = Self::WIDTH_OK;
        let raw = read_bits(buffer, cursor, BITS)?;
        if raw & (1u64 << (BITS - 1)) != 0 {
            Ok(raw as i64 - (1i64 << BITS))
        } else {
            Ok(raw as i64)
        }
    }

    /// Encode with `fraction = 1.0`, `offset = 0.0`.
    pub fn encode(buffer: &mut [u8], cursor: &mut usize, value: f64) -> Result<(), BitError> {
        Self::encode_scaled(buffer, cursor, value, 1.0, 0.0)
    }

    /// Encode `value` with saturation to the NaN / ±Infinity sentinels.
    pub fn encode_scaled(
        buffer: &mut [u8],
        cursor: &mut usize,
        value: f64,
        fraction: f64,
        offset: f64,
    ) -> Result<(), BitError> {
        check_scale(fraction, offset)?;
        Self::write_code(buffer, cursor, Self::to_code(value, fraction, offset))
    }

    /// Decode with `fraction = 1.0`, `offset = 0.0`.
    pub fn decode(buffer: &[u8], cursor: &mut usize) -> Result<f64, BitError> {
        Self::decode_scaled(buffer, cursor, 1.0, 0.0)
    }

    /// Decode a value written by [`encode_scaled`](Self::encode_scaled).
    pub fn decode_scaled(buffer: &[u8], cursor: &mut usize, fraction: f64, offset: f64) -> Result<f64, BitError> {
        check_scale(fraction, offset)?;
        let code = Self::read_code(buffer, cursor)?;
        Ok(Self::from_code(code, fraction, offset))
    }

    /// Encode `value`, rejecting anything outside `[min, max]` (NaN and ±Infinity included)
    /// with [`BitError::OutOfRange`] instead of saturating. The quantized value must also lie
    /// in `[min, max]`, so whatever is written passes [`decode_bounded`](Self::decode_bounded).
    pub fn encode_bounded(
        buffer: &mut [u8],
        cursor: &mut usize,
        value: f64,
        fraction: f64,
        offset: f64,
        min: f64,
        max: f64,
    ) -> Result<(), BitError> {
        check_scale(fraction, offset)?;
        check_bounds(min, max)?;
        if !(value >= min && value <= max) {
            return Err(BitError::OutOfRange { value, min, max });
        }
        let code = Self::to_code(value, fraction, offset);
        if Self::is_sentinel(code) || !within_bounds(Self::from_code(code, fraction, offset), min, max) {
            return Err(BitError::OutOfRange { value, min, max });
        }
        Self::write_code(buffer, cursor, code)
    }

    /// Decode a value and reject it when it lies outside `[min, max]`, up to a relative
    /// tolerance of 1e-9 for float error. Sentinels are always rejected. The cursor only
    /// advances on success.
    pub fn decode_bounded(
        buffer: &[u8],
        cursor: &mut usize,
        fraction: f64,
        offset: f64,
        min: f64,
        max: f64,
    ) -> Result<f64, BitError> {
        check_scale(fraction, offset)?;
        check_bounds(min, max)?;
        let mut probe = *cursor;
        let code = Self::read_code(buffer, &mut probe)?;
        let value = Self::from_code(code, fraction, offset);
        if Self::is_sentinel(code) || !within_bounds(value, min, max) {
            return Err(BitError::OutOfRange { value, min, max });
        }
        *cursor = probe;
        Ok(value)
    }

    fn is_sentinel(code: i64) -> bool {
        code == Self::NAN_CODE || code == Self::POS_INF_CODE || code == Self::NEG_INF_CODE
    }
}

macro_rules! fixed_point_widths {
    ($($name:ident = $bits:literal),* $(,)?) => {
        $(
            #[doc = concat!("Signed fixed-point codec over ", stringify!($bits), " bits.")]
            pub type $name = FixedPoint<$bits>;
        )*
    };
}

fixed_point_widths!(
    Bits3 = 3, Bits4 = 4, Bits5 = 5, Bits6 = 6, Bits7 = 7, Bits8 = 8, Bits9 = 9, Bits10 = 10,
    Bits11 = 11, Bits12 = 12, Bits13 = 13, Bits14 = 14, Bits15 = 15, Bits16 = 16, Bits17 = 17,
    Bits18 = 18, Bits19 = 19, Bits20 = 20, Bits21 = 21, Bits22 = 22, Bits23 = 23, Bits24 = 24,
    Bits25 = 25, Bits26 = 26, Bits27 = 27, Bits28 = 28, Bits29 = 29, Bits30 = 30, Bits31 = 31,
    Bits32 = 32,
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_constants() {
        assert_eq!(Bits3::MAX, 2);
        assert_eq!(Bits3::MIN, -2);
        assert_eq!(Bits3::POS_INF_CODE, 3);
        assert_eq!(Bits3::NEG_INF_CODE, -3);
        assert_eq!(Bits3::NAN_CODE, -4);
        assert_eq!(Bits8::MAX, 126);
        assert_eq!(Bits32::MAX, 2_147_483_646);
        assert_eq!(Bits32::NAN_CODE, i32::MIN as i64);
    }

    #[test]
    fn raw_bits_preserve_neighbours() {
        let mut buf = [0xFFu8; 2];
        let mut cursor = 3;
        write_bits(&mut buf, &mut cursor, 6, 0).unwrap();
        assert_eq!(cursor, 9);
        assert_eq!(buf, [0b0000_0111, 0b1111_1110]);
        let mut cursor = 0;
        assert_eq!(read_bits(&buf, &mut cursor, 16).unwrap(), 0xFE07);
    }

    #[test]
    fn raw_bits_full_width() {
        let mut buf = [0u8; 9];
        let mut cursor = 4;
        write_bits(&mut buf, &mut cursor, 64, u64::MAX - 1).unwrap();
        let mut cursor = 4;
        assert_eq!(read_bits(&buf, &mut cursor, 64).unwrap(), u64::MAX - 1);
        assert_eq!(cursor, 68);
    }

    #[test]
    fn raw_bits_reject_bad_width() {
        let mut buf = [0u8; 2];
        let mut cursor = 0;
        assert_eq!(write_bits(&mut buf, &mut cursor, 0, 1), Err(BitError::InvalidWidth(0)));
        assert_eq!(read_bits(&buf, &mut cursor, 65), Err(BitError::InvalidWidth(65)));
    }

    #[test]
    fn sentinel_bytes_8_bits() {
        let mut buf = [0u8; 4];
        let mut cursor = 0;
        Bits8::encode(&mut buf, &mut cursor, f64::NAN).unwrap();
        Bits8::encode(&mut buf, &mut cursor, f64::INFINITY).unwrap();
        Bits8::encode(&mut buf, &mut cursor, f64::NEG_INFINITY).unwrap();
        Bits8::encode(&mut buf, &mut cursor, -1.0).unwrap();
        assert_eq!(buf, [0x80, 0x7F, 0x81, 0xFF]);
    }

    #[test]
    fn infinity_maps_to_sentinel_when_scale_overflows() {
        // 126 * 1e308 overflows, so the physical maximum is itself infinite.
        assert!(Bits8::max_physical(1e308, 0.0).is_infinite());
        assert_eq!(Bits8::to_code(f64::INFINITY, 1e308, 0.0), Bits8::POS_INF_CODE);
        assert_eq!(Bits8::to_code(f64::NEG_INFINITY, 1e308, 0.0), Bits8::NEG_INF_CODE);
        let mut buf = [0u8; 1];
        Bits8::encode_scaled(&mut buf, &mut 0, f64::INFINITY, 1e308, 0.0).unwrap();
        assert_eq!(buf, [0x7F]);
    }

    #[test]
    fn rounding_is_half_away_from_zero() {
        assert_eq!(Bits8::to_code(2.5, 1.0, 0.0), 3);
        assert_eq!(Bits8::to_code(-2.5, 1.0, 0.0), -3);
        assert_eq!(Bits8::to_code(2.49, 1.0, 0.0), 2);
    }

    #[test]
    fn invalid_scale_rejected() {
        let mut buf = [0u8; 2];
        let mut cursor = 0;
        let err = Bits8::encode_scaled(&mut buf, &mut cursor, 1.0, 0.0, 0.0).unwrap_err();
        assert!(matches!(err, BitError::InvalidScale { .. }));
        let err = Bits8::decode_scaled(&buf, &mut cursor, 1.0, f64::NAN).unwrap_err();
        assert!(matches!(err, BitError::InvalidScale { .. }));
        assert_eq!(cursor, 0);
    }

    #[test]
    fn bounded_decode_accepts_rounded_bound() {
        // 0.3 is not exactly representable; the code for 0.3 must still read back.
        let mut buf = [0u8; 2];
        let mut cursor = 0;
        Bits10::encode_bounded(&mut buf, &mut cursor, 0.3, 0.1, 0.0, 0.0, 0.3).unwrap();
        let mut cursor = 0;
        let v = Bits10::decode_bounded(&buf, &mut cursor, 0.1, 0.0, 0.0, 0.3).unwrap();
        assert!((v - 0.3).abs() < 1e-9);
        assert_eq!(cursor, 10);
    }
}
