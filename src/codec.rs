//! Byte-aligned binary serialization of value trees, as a visitor pair.
//!
//! [`BinaryWriter`] (read visitor) appends a value to a byte vector; [`BinaryReader`] (write
//! visitor) rebuilds it from bytes. Everything is little-endian:
//!
//! | Field | Layout |
//! |-------|--------|
//! | integers, float, double | natural width |
//! | half | IEEE binary16 |
//! | bool | u8 0/1 |
//! | char | u32 scalar value |
//! | string | u32 byte length, UTF-8 |
//! | datetime | i64 seconds since 1970-01-01T00:00:00, u32 nanoseconds |
//! | date | i32 days from 0001-01-01 (day 1) |
//! | time | u32 seconds from midnight, u32 nanoseconds |
//! | timespan | i64 whole seconds, i32 sub-second nanoseconds (same sign) |
//! | nullable | u8 presence, then the value if present |
//! | array | elements |
//! | list | u32 count, elements |
//! | optional struct | u8 presence, then the children if present |
//!
//! Both sides check numeric domains, string constraints and list bounds; the reader also rejects
//! truncated input and trailing bytes.

use crate::field::{ArrayType, Field, FieldType, ListType, ScalarType, StructType};
use crate::value::Value;
use crate::visit::{walk, walk_mut, Access, Composite, ValueSlot, VisitError, Visitor, VisitorBase};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, TimeDelta, Timelike};
use std::io::{Cursor, Read};

/// Convert to IEEE binary16 bits, rounding to nearest even. Overflow becomes infinity.
pub fn f32_to_f16_bits(value: f32) -> u16 {
    let bits = value.to_bits();
    let sign = ((bits >> 16) & 0x8000) as u16;
    let exp = ((bits >> 23) & 0xff) as i32;
    let man = bits & 0x007f_ffff;
    if exp == 0xff {
        let nan = if man != 0 { 0x0200 } else { 0 };
        return sign | 0x7c00 | nan;
    }
    let e = exp - 127 + 15;
    if e >= 0x1f {
        return sign | 0x7c00;
    }
    let (kept, rem, shift, base) = if e <= 0 {
        if e < -10 {
            return sign;
        }
        let full = man | 0x0080_0000;
        let shift = (14 - e) as u32;
        (full >> shift, full & ((1 << shift) - 1), shift, 0)
    } else {
        (man >> 13, man & 0x1fff, 13, (e as u32) << 10)
    };
    let halfway = 1 << (shift - 1);
    let rounded = if rem > halfway || (rem == halfway && kept & 1 == 1) { kept + 1 } else { kept };
    // A mantissa carry rolls into the exponent, which is the correct result.
    sign | (base + rounded) as u16
}

pub fn f16_bits_to_f32(bits: u16) -> f32 {
    let sign = if bits & 0x8000 != 0 { -1.0 } else { 1.0 };
    let exp = i32::from((bits >> 10) & 0x1f);
    let man = f32::from(bits & 0x03ff);
    match exp {
        0 => sign * man * 2f32.powi(-24),
        0x1f if man == 0.0 => sign * f32::INFINITY,
        0x1f => f32::NAN,
        _ => sign * (1024.0 + man) * 2f32.powi(exp - 25),
    }
}

/// Nearest value representable as a half float.
pub fn round_to_half(value: f32) -> f32 {
    f16_bits_to_f32(f32_to_f16_bits(value))
}

fn domain_error(field: &Field, reason: String) -> VisitError {
    VisitError::Domain { field: field.name().to_string(), reason }
}

fn check_range<T: PartialOrd + std::fmt::Display>(field: &Field, x: T, min: T, max: T) -> Result<(), VisitError> {
    if x >= min && x <= max {
        Ok(())
    } else {
        Err(domain_error(field, format!("{} not in [{}, {}]", x, min, max)))
    }
}

/// Check a (non-null) scalar against its type's constraints.
pub fn check_scalar(field: &Field, ty: &ScalarType, value: &Value) -> Result<(), VisitError> {
    match (ty, value) {
        (ScalarType::Int8(d), Value::Int8(x)) => check_range(field, *x, d.min(), d.max()),
        (ScalarType::Int16(d), Value::Int16(x)) => check_range(field, *x, d.min(), d.max()),
        (ScalarType::Int32(d), Value::Int32(x)) => check_range(field, *x, d.min(), d.max()),
        (ScalarType::Int64(d), Value::Int64(x)) => check_range(field, *x, d.min(), d.max()),
        (ScalarType::UInt8(d), Value::UInt8(x)) => check_range(field, *x, d.min(), d.max()),
        (ScalarType::UInt16(d), Value::UInt16(x)) => check_range(field, *x, d.min(), d.max()),
        (ScalarType::UInt32(d), Value::UInt32(x)) => check_range(field, *x, d.min(), d.max()),
        (ScalarType::UInt64(d), Value::UInt64(x)) => check_range(field, *x, d.min(), d.max()),
        (ScalarType::Float(d), Value::Float(x)) => check_range(field, *x, d.min(), d.max()),
        (ScalarType::Double(d), Value::Double(x)) => check_range(field, *x, d.min(), d.max()),
        (ScalarType::HalfFloat(d), Value::HalfFloat(x)) => {
            check_range(field, *x, round_to_half(d.min()), round_to_half(d.max()))
        }
        (ScalarType::Char(set), Value::Char(c)) => {
            if set.contains(*c) {
                Ok(())
            } else {
                Err(domain_error(field, format!("character {:?} not allowed", c)))
            }
        }
        (ScalarType::String(st), Value::String(s)) => st.check(s).map_err(|reason| domain_error(field, reason)),
        (ScalarType::Bool, Value::Bool(_))
        | (ScalarType::DateTime, Value::DateTime(_))
        | (ScalarType::DateOnly, Value::Date(_))
        | (ScalarType::TimeOnly, Value::Time(_))
        | (ScalarType::TimeSpan, Value::TimeSpan(_)) => Ok(()),
        (_, other) => Err(VisitError::shape(field, ty.name(), other)),
    }
}

fn length_u32(field: &Field, len: usize) -> Result<u32, VisitError> {
    u32::try_from(len).map_err(|_| domain_error(field, format!("length {} exceeds u32", len)))
}

/// Serializes a value tree; see the module docs for the layout.
#[derive(Default)]
pub struct BinaryWriter<'s> {
    base: VisitorBase<'s>,
    out: Vec<u8>,
}

impl<'s> BinaryWriter<'s> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.out
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.out
    }

    fn write_scalar(&mut self, field: &Field, value: &Value) -> Result<(), VisitError> {
        let w = &mut self.out;
        match value {
            Value::Int8(x) => w.write_i8(*x)?,
            Value::Int16(x) => w.write_i16::<LittleEndian>(*x)?,
            Value::Int32(x) => w.write_i32::<LittleEndian>(*x)?,
            Value::Int64(x) => w.write_i64::<LittleEndian>(*x)?,
            Value::UInt8(x) => w.write_u8(*x)?,
            Value::UInt16(x) => w.write_u16::<LittleEndian>(*x)?,
            Value::UInt32(x) => w.write_u32::<LittleEndian>(*x)?,
            Value::UInt64(x) => w.write_u64::<LittleEndian>(*x)?,
            Value::Float(x) => w.write_f32::<LittleEndian>(*x)?,
            Value::Double(x) => w.write_f64::<LittleEndian>(*x)?,
            Value::HalfFloat(x) => w.write_u16::<LittleEndian>(f32_to_f16_bits(*x))?,
            Value::Bool(b) => w.write_u8(u8::from(*b))?,
            Value::Char(c) => w.write_u32::<LittleEndian>(u32::from(*c))?,
            Value::String(s) => {
                let len = length_u32(field, s.len())?;
                w.write_u32::<LittleEndian>(len)?;
                w.extend_from_slice(s.as_bytes());
            }
            Value::DateTime(t) => {
                let t = t.and_utc();
                w.write_i64::<LittleEndian>(t.timestamp())?;
                w.write_u32::<LittleEndian>(t.timestamp_subsec_nanos())?;
            }
            Value::Date(d) => w.write_i32::<LittleEndian>(d.num_days_from_ce())?,
            Value::Time(t) => {
                w.write_u32::<LittleEndian>(t.num_seconds_from_midnight())?;
                w.write_u32::<LittleEndian>(t.nanosecond())?;
            }
            Value::TimeSpan(d) => {
                w.write_i64::<LittleEndian>(d.num_seconds())?;
                w.write_i32::<LittleEndian>(d.subsec_nanos())?;
            }
            Value::Null | Value::Struct(_) | Value::Array(_) | Value::List(_) | Value::Optional(_) => {
                return Err(VisitError::shape(field, field.ty(), value))
            }
        }
        Ok(())
    }
}

impl<'s> Visitor<'s> for BinaryWriter<'s> {
    fn access(&self) -> Access {
        Access::Read
    }

    fn visit(&mut self, field: &'s Field, ty: &'s ScalarType, slot: &mut ValueSlot<'_>) -> Result<(), VisitError> {
        let value = slot.get();
        if field.is_nullable() {
            if value.is_null() {
                self.out.write_u8(0)?;
                return Ok(());
            }
            self.out.write_u8(1)?;
        }
        check_scalar(field, ty, value)?;
        self.write_scalar(field, value)
    }

    fn begin_struct(&mut self, field: &'s Field, _ty: &'s StructType) -> Result<(), VisitError> {
        self.base.open(Composite::Struct, field);
        Ok(())
    }

    fn end_struct(&mut self, field: &'s Field) -> Result<(), VisitError> {
        self.base.close(Composite::Struct, field)
    }

    fn begin_array(&mut self, field: &'s Field, _ty: &'s ArrayType) -> Result<(), VisitError> {
        self.base.open(Composite::Array, field);
        Ok(())
    }

    fn end_array(&mut self, field: &'s Field) -> Result<(), VisitError> {
        self.base.close(Composite::Array, field)
    }

    fn begin_list(&mut self, field: &'s Field, ty: &'s ListType, count: usize) -> Result<usize, VisitError> {
        if !ty.allows(count) {
            return Err(domain_error(
                field,
                format!("count {} not in [{}, {}]", count, ty.min_size(), ty.max_size()),
            ));
        }
        self.out.write_u32::<LittleEndian>(length_u32(field, count)?)?;
        self.base.open(Composite::List, field);
        Ok(count)
    }

    fn end_list(&mut self, field: &'s Field) -> Result<(), VisitError> {
        self.base.close(Composite::List, field)
    }

    fn begin_optional_struct(&mut self, field: &'s Field, _ty: &'s StructType, present: bool) -> Result<bool, VisitError> {
        self.out.write_u8(u8::from(present))?;
        self.base.open(Composite::OptionalStruct, field);
        Ok(present)
    }

    fn end_optional_struct(&mut self, field: &'s Field) -> Result<(), VisitError> {
        self.base.close(Composite::OptionalStruct, field)
    }

    fn finish(&mut self) -> Result<(), VisitError> {
        self.base.finish()
    }
}

fn scalar_len(ty: &ScalarType) -> usize {
    match ty {
        ScalarType::Int8(_) | ScalarType::UInt8(_) | ScalarType::Bool => 1,
        ScalarType::Int16(_) | ScalarType::UInt16(_) | ScalarType::HalfFloat(_) => 2,
        ScalarType::Int32(_) | ScalarType::UInt32(_) | ScalarType::Float(_) | ScalarType::Char(_) => 4,
        ScalarType::String(_) | ScalarType::DateOnly => 4,
        ScalarType::Int64(_) | ScalarType::UInt64(_) | ScalarType::Double(_) | ScalarType::TimeOnly => 8,
        ScalarType::DateTime | ScalarType::TimeSpan => 12,
    }
}

/// Fewest bytes any encoding of `field` occupies.
fn min_encoded_len(field: &Field) -> usize {
    match field.ty() {
        FieldType::Scalar(s) => scalar_len(s),
        FieldType::Nullable(_) | FieldType::OptionalStruct(_) => 1,
        FieldType::Array(a) => a.len().saturating_mul(min_encoded_len(a.element())),
        FieldType::List(_) => 4,
        FieldType::Struct(s) => s.fields().iter().map(min_encoded_len).fold(0, usize::saturating_add),
    }
}

/// Deserializes a value tree written by [`BinaryWriter`].
pub struct BinaryReader<'s, 'b> {
    base: VisitorBase<'s>,
    input: Cursor<&'b [u8]>,
}

impl<'s, 'b> BinaryReader<'s, 'b> {
    pub fn new(bytes: &'b [u8]) -> Self {
        BinaryReader { base: VisitorBase::default(), input: Cursor::new(bytes) }
    }

    /// Bytes consumed so far.
    pub fn position(&self) -> usize {
        self.input.position() as usize
    }

    fn remaining(&self) -> usize {
        self.input.get_ref().len().saturating_sub(self.position())
    }

    fn presence(&mut self, field: &Field) -> Result<bool, VisitError> {
        match self.input.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            b => Err(domain_error(field, format!("invalid presence byte {:#04x}", b))),
        }
    }

    fn ensure_available(&self, needed: usize) -> Result<(), VisitError> {
        if needed > self.remaining() {
            return Err(VisitError::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!("need {} bytes, {} left", needed, self.remaining()),
            )));
        }
        Ok(())
    }

    fn read_scalar(&mut self, field: &Field, ty: &ScalarType) -> Result<Value, VisitError> {
        let r = &mut self.input;
        let invalid = |what: &str| domain_error(field, format!("invalid {}", what));
        Ok(match ty {
            ScalarType::Int8(_) => Value::Int8(r.read_i8()?),
            ScalarType::Int16(_) => Value::Int16(r.read_i16::<LittleEndian>()?),
            ScalarType::Int32(_) => Value::Int32(r.read_i32::<LittleEndian>()?),
            ScalarType::Int64(_) => Value::Int64(r.read_i64::<LittleEndian>()?),
            ScalarType::UInt8(_) => Value::UInt8(r.read_u8()?),
            ScalarType::UInt16(_) => Value::UInt16(r.read_u16::<LittleEndian>()?),
            ScalarType::UInt32(_) => Value::UInt32(r.read_u32::<LittleEndian>()?),
            ScalarType::UInt64(_) => Value::UInt64(r.read_u64::<LittleEndian>()?),
            ScalarType::Float(_) => Value::Float(r.read_f32::<LittleEndian>()?),
            ScalarType::Double(_) => Value::Double(r.read_f64::<LittleEndian>()?),
            ScalarType::HalfFloat(_) => Value::HalfFloat(f16_bits_to_f32(r.read_u16::<LittleEndian>()?)),
            ScalarType::Bool => match r.read_u8()? {
                0 => Value::Bool(false),
                1 => Value::Bool(true),
                _ => return Err(invalid("bool byte")),
            },
            ScalarType::Char(_) => {
                Value::Char(char::from_u32(r.read_u32::<LittleEndian>()?).ok_or_else(|| invalid("char"))?)
            }
            ScalarType::String(_) => {
                let len = r.read_u32::<LittleEndian>()? as usize;
                self.ensure_available(len)?;
                let mut buf = vec![0u8; len];
                self.input.read_exact(&mut buf)?;
                Value::String(String::from_utf8(buf).map_err(|_| invalid("UTF-8"))?)
            }
            ScalarType::DateTime => {
                let secs = r.read_i64::<LittleEndian>()?;
                let nanos = r.read_u32::<LittleEndian>()?;
                let t = DateTime::from_timestamp(secs, nanos).ok_or_else(|| invalid("datetime"))?;
                Value::DateTime(t.naive_utc())
            }
            ScalarType::DateOnly => {
                let days = r.read_i32::<LittleEndian>()?;
                Value::Date(NaiveDate::from_num_days_from_ce_opt(days).ok_or_else(|| invalid("date"))?)
            }
            ScalarType::TimeOnly => {
                let secs = r.read_u32::<LittleEndian>()?;
                let nanos = r.read_u32::<LittleEndian>()?;
                let t = NaiveTime::from_num_seconds_from_midnight_opt(secs, nanos).ok_or_else(|| invalid("time"))?;
                Value::Time(t)
            }
            ScalarType::TimeSpan => {
                let secs = r.read_i64::<LittleEndian>()?;
                let nanos = r.read_i32::<LittleEndian>()?;
                if nanos.unsigned_abs() >= 1_000_000_000 || (secs != 0 && nanos != 0 && secs.signum() != i64::from(nanos.signum())) {
                    return Err(invalid("timespan nanoseconds"));
                }
                let d = TimeDelta::try_seconds(secs)
                    .and_then(|s| s.checked_add(&TimeDelta::nanoseconds(i64::from(nanos))))
                    .ok_or_else(|| invalid("timespan"))?;
                Value::TimeSpan(d)
            }
        })
    }
}

impl<'s, 'b> Visitor<'s> for BinaryReader<'s, 'b> {
    fn access(&self) -> Access {
        Access::Write
    }

    fn visit(&mut self, field: &'s Field, ty: &'s ScalarType, slot: &mut ValueSlot<'_>) -> Result<(), VisitError> {
        if field.is_nullable() && !self.presence(field)? {
            return slot.set(Value::Null);
        }
        let value = self.read_scalar(field, ty)?;
        check_scalar(field, ty, &value)?;
        slot.set(value)
    }

    fn begin_struct(&mut self, field: &'s Field, _ty: &'s StructType) -> Result<(), VisitError> {
        self.base.open(Composite::Struct, field);
        Ok(())
    }

    fn end_struct(&mut self, field: &'s Field) -> Result<(), VisitError> {
        self.base.close(Composite::Struct, field)
    }

    fn begin_array(&mut self, field: &'s Field, _ty: &'s ArrayType) -> Result<(), VisitError> {
        self.base.open(Composite::Array, field);
        Ok(())
    }

    fn end_array(&mut self, field: &'s Field) -> Result<(), VisitError> {
        self.base.close(Composite::Array, field)
    }

    fn begin_list(&mut self, field: &'s Field, ty: &'s ListType, _count: usize) -> Result<usize, VisitError> {
        let count = self.input.read_u32::<LittleEndian>()? as usize;
        if !ty.allows(count) {
            return Err(domain_error(
                field,
                format!("count {} not in [{}, {}]", count, ty.min_size(), ty.max_size()),
            ));
        }
        self.ensure_available(count.saturating_mul(min_encoded_len(ty.element())))?;
        self.base.open(Composite::List, field);
        Ok(count)
    }

    fn end_list(&mut self, field: &'s Field) -> Result<(), VisitError> {
        self.base.close(Composite::List, field)
    }

    fn begin_optional_struct(&mut self, field: &'s Field, _ty: &'s StructType, _present: bool) -> Result<bool, VisitError> {
        let present = self.presence(field)?;
        self.base.open(Composite::OptionalStruct, field);
        Ok(present)
    }

    fn end_optional_struct(&mut self, field: &'s Field) -> Result<(), VisitError> {
        self.base.close(Composite::OptionalStruct, field)
    }

    fn finish(&mut self) -> Result<(), VisitError> {
        self.base.finish()?;
        match self.remaining() {
            0 => Ok(()),
            n => Err(VisitError::TrailingBytes(n)),
        }
    }
}

pub fn serialize(schema: &Field, value: &Value) -> Result<Vec<u8>, VisitError> {
    let mut writer = BinaryWriter::new();
    walk(schema, value, &mut writer)?;
    Ok(writer.into_bytes())
}

/// Decode exactly one value of `schema` from `bytes`.
pub fn deserialize(schema: &Field, bytes: &[u8]) -> Result<Value, VisitError> {
    let mut value = Value::default_for(schema);
    walk_mut(schema, &mut value, &mut BinaryReader::new(bytes))?;
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::Domain;

    fn sample() -> Field {
        Field::structure(
            "root",
            vec![
                Field::scalar("n", ScalarType::Int16(Domain::new(-100, 100).unwrap())).unwrap(),
                Field::nullable("b", ScalarType::Bool).unwrap(),
                Field::string("s", 0, 4).unwrap(),
                Field::list("l", FieldType::Scalar(ScalarType::UInt8(Domain::full())), 0, 3).unwrap(),
            ],
        )
        .unwrap()
    }

    #[test]
    fn golden_layout() {
        let value = Value::Struct(vec![
            Value::Int16(-2),
            Value::Bool(true),
            Value::String("ab".to_string()),
            Value::List(vec![Value::UInt8(7), Value::UInt8(9)]),
        ]);
        let bytes = serialize(&sample(), &value).unwrap();
        assert_eq!(
            bytes,
            vec![0xfe, 0xff, 1, 1, 2, 0, 0, 0, b'a', b'b', 2, 0, 0, 0, 7, 9]
        );
        assert_eq!(deserialize(&sample(), &bytes).unwrap(), value);
    }

    #[test]
    fn reader_rejects_bad_input() {
        let schema = sample();
        // Truncated.
        assert!(matches!(deserialize(&schema, &[0xfe]), Err(VisitError::Io(_))));
        // Out of domain.
        let err = deserialize(&schema, &[0xe8, 0x03, 0, 0, 0, 0, 0, 0, 0, 0, 0]).unwrap_err();
        assert!(matches!(err, VisitError::Domain { ref field, .. } if field == "n"));
        // Presence byte other than 0/1.
        let err = deserialize(&schema, &[0, 0, 2, 0, 0, 0, 0, 0, 0, 0, 0]).unwrap_err();
        assert!(matches!(err, VisitError::Domain { ref field, .. } if field == "b"));
        // Count beyond the list bound.
        let err = deserialize(&schema, &[0, 0, 0, 0, 0, 0, 0, 9, 0, 0, 0]).unwrap_err();
        assert!(matches!(err, VisitError::Domain { ref field, .. } if field == "l"));
        // Trailing bytes.
        let err = deserialize(&schema, &[0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0xaa]).unwrap_err();
        assert!(matches!(err, VisitError::TrailingBytes(1)));
    }

    #[test]
    fn writer_checks_domains() {
        let value = Value::Struct(vec![
            Value::Int16(101),
            Value::Null,
            Value::String(String::new()),
            Value::List(vec![]),
        ]);
        assert!(matches!(serialize(&sample(), &value), Err(VisitError::Domain { .. })));
    }

    #[test]
    fn half_float_bits() {
        assert_eq!(f32_to_f16_bits(1.0), 0x3c00);
        assert_eq!(f32_to_f16_bits(-2.0), 0xc000);
        assert_eq!(f32_to_f16_bits(65504.0), 0x7bff);
        assert_eq!(f32_to_f16_bits(65520.0), 0x7c00);
        assert_eq!(f32_to_f16_bits(2f32.powi(-24)), 0x0001);
        assert_eq!(f32_to_f16_bits(2f32.powi(-25)), 0x0000);
        assert!(f16_bits_to_f32(f32_to_f16_bits(f32::NAN)).is_nan());
        assert_eq!(f16_bits_to_f32(0x3555), 0.333_251_95);
        assert_eq!(round_to_half(0.1), 0.099_975_586);
        assert_eq!(f16_bits_to_f32(0x8000).to_bits(), (-0.0f32).to_bits());
    }

    #[test]
    fn temporal_round_trip() {
        let schema = Field::structure(
            "t",
            vec![
                Field::scalar("dt", ScalarType::DateTime).unwrap(),
                Field::scalar("span", ScalarType::TimeSpan).unwrap(),
                Field::scalar("time", ScalarType::TimeOnly).unwrap(),
            ],
        )
        .unwrap();
        let value = Value::Struct(vec![
            Value::DateTime(NaiveDate::from_ymd_opt(1969, 7, 20).unwrap().and_hms_nano_opt(20, 17, 40, 5).unwrap()),
            Value::TimeSpan(TimeDelta::milliseconds(-1500)),
            Value::Time(NaiveTime::from_hms_milli_opt(23, 59, 59, 999).unwrap()),
        ]);
        let bytes = serialize(&schema, &value).unwrap();
        assert_eq!(bytes.len(), 12 + 12 + 8);
        assert_eq!(deserialize(&schema, &bytes).unwrap(), value);
    }
}
