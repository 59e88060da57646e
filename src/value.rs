//! Runtime values mirroring a schema tree.

use crate::field::{Field, FieldType, ScalarType, StructType};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};

/// A single value (scalar or composite). Struct children are in schema order.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    UInt8(u8),
    UInt16(u16),
    UInt32(u32),
    UInt64(u64),
    Float(f32),
    Double(f64),
    HalfFloat(f32),
    Bool(bool),
    Char(char),
    String(String),
    DateTime(NaiveDateTime),
    Date(NaiveDate),
    Time(NaiveTime),
    TimeSpan(TimeDelta),
    /// Absent nullable scalar.
    Null,
    Struct(Vec<Value>),
    Array(Vec<Value>),
    List(Vec<Value>),
    Optional(Option<Box<Value>>),
}

impl Value {
    /// Canonical default for a field: numeric values nearest zero, empty-ish strings,
    /// epoch/midnight temporals, `Null` for nullables, minimum-size lists, absent optionals.
    pub fn default_for(field: &Field) -> Value {
        match field.ty() {
            FieldType::Scalar(s) => Value::default_scalar(s),
            FieldType::Nullable(_) => Value::Null,
            FieldType::Array(a) => Value::Array(vec![Value::default_for(a.element()); a.len()]),
            FieldType::List(l) => Value::List(vec![Value::default_for(l.element()); l.min_size()]),
            FieldType::Struct(s) => Value::default_struct(s),
            FieldType::OptionalStruct(_) => Value::Optional(None),
        }
    }

    pub fn default_struct(ty: &StructType) -> Value {
        Value::Struct(ty.fields().iter().map(Value::default_for).collect())
    }

    pub fn default_scalar(ty: &ScalarType) -> Value {
        match ty {
            ScalarType::Int8(d) => Value::Int8(d.closest_to_zero()),
            ScalarType::Int16(d) => Value::Int16(d.closest_to_zero()),
            ScalarType::Int32(d) => Value::Int32(d.closest_to_zero()),
            ScalarType::Int64(d) => Value::Int64(d.closest_to_zero()),
            ScalarType::UInt8(d) => Value::UInt8(d.closest_to_zero()),
            ScalarType::UInt16(d) => Value::UInt16(d.closest_to_zero()),
            ScalarType::UInt32(d) => Value::UInt32(d.closest_to_zero()),
            ScalarType::UInt64(d) => Value::UInt64(d.closest_to_zero()),
            ScalarType::Float(d) => Value::Float(d.closest_to_zero()),
            ScalarType::Double(d) => Value::Double(d.closest_to_zero()),
            ScalarType::HalfFloat(d) => Value::HalfFloat(d.closest_to_zero()),
            ScalarType::Bool => Value::Bool(false),
            ScalarType::Char(set) => Value::Char(set.first()),
            ScalarType::String(st) => {
                Value::String(std::iter::repeat(st.allowed().first()).take(st.min_size()).collect())
            }
            ScalarType::DateTime => Value::DateTime(NaiveDateTime::default()),
            ScalarType::DateOnly => Value::Date(NaiveDate::default()),
            ScalarType::TimeOnly => Value::Time(NaiveTime::default()),
            ScalarType::TimeSpan => Value::TimeSpan(TimeDelta::zero()),
        }
    }

    /// Whether this value has the variant a scalar of `ty` carries (`Null` excluded).
    pub fn matches_scalar(&self, ty: &ScalarType) -> bool {
        matches!(
            (ty, self),
            (ScalarType::Int8(_), Value::Int8(_))
                | (ScalarType::Int16(_), Value::Int16(_))
                | (ScalarType::Int32(_), Value::Int32(_))
                | (ScalarType::Int64(_), Value::Int64(_))
                | (ScalarType::UInt8(_), Value::UInt8(_))
                | (ScalarType::UInt16(_), Value::UInt16(_))
                | (ScalarType::UInt32(_), Value::UInt32(_))
                | (ScalarType::UInt64(_), Value::UInt64(_))
                | (ScalarType::Float(_), Value::Float(_))
                | (ScalarType::Double(_), Value::Double(_))
                | (ScalarType::HalfFloat(_), Value::HalfFloat(_))
                | (ScalarType::Bool, Value::Bool(_))
                | (ScalarType::Char(_), Value::Char(_))
                | (ScalarType::String(_), Value::String(_))
                | (ScalarType::DateTime, Value::DateTime(_))
                | (ScalarType::DateOnly, Value::Date(_))
                | (ScalarType::TimeOnly, Value::Time(_))
                | (ScalarType::TimeSpan, Value::TimeSpan(_))
        )
    }

    /// Short variant name for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Int8(_) => "int8",
            Value::Int16(_) => "int16",
            Value::Int32(_) => "int32",
            Value::Int64(_) => "int64",
            Value::UInt8(_) => "uint8",
            Value::UInt16(_) => "uint16",
            Value::UInt32(_) => "uint32",
            Value::UInt64(_) => "uint64",
            Value::Float(_) => "float",
            Value::Double(_) => "double",
            Value::HalfFloat(_) => "half",
            Value::Bool(_) => "bool",
            Value::Char(_) => "char",
            Value::String(_) => "string",
            Value::DateTime(_) => "datetime",
            Value::Date(_) => "date",
            Value::Time(_) => "time",
            Value::TimeSpan(_) => "timespan",
            Value::Null => "null",
            Value::Struct(_) => "struct",
            Value::Array(_) => "array",
            Value::List(_) => "list",
            Value::Optional(_) => "optional",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::UInt8(x) => Some(*x as u64),
            Value::UInt16(x) => Some(*x as u64),
            Value::UInt32(x) => Some(*x as u64),
            Value::UInt64(x) => Some(*x),
            Value::Int8(x) => u64::try_from(*x).ok(),
            Value::Int16(x) => u64::try_from(*x).ok(),
            Value::Int32(x) => u64::try_from(*x).ok(),
            Value::Int64(x) => u64::try_from(*x).ok(),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int8(x) => Some(*x as i64),
            Value::Int16(x) => Some(*x as i64),
            Value::Int32(x) => Some(*x as i64),
            Value::Int64(x) => Some(*x),
            Value::UInt8(x) => Some(*x as i64),
            Value::UInt16(x) => Some(*x as i64),
            Value::UInt32(x) => Some(*x as i64),
            Value::UInt64(x) => i64::try_from(*x).ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(x) | Value::HalfFloat(x) => Some(*x as f64),
            Value::Double(x) => Some(*x),
            Value::UInt64(x) => Some(*x as f64),
            other => other.as_i64().map(|i| i as f64),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Struct children, also through a present optional struct.
    pub fn as_struct(&self) -> Option<&[Value]> {
        match self {
            Value::Struct(items) => Some(items),
            Value::Optional(Some(inner)) => inner.as_struct(),
            _ => None,
        }
    }

    /// Elements of an array or list.
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) | Value::List(items) => Some(items),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::Domain;

    #[test]
    fn default_shape_follows_schema() {
        let schema = Field::structure(
            "root",
            vec![
                Field::scalar("n", ScalarType::Int32(Domain::new(5, 10).unwrap())).unwrap(),
                Field::nullable("m", ScalarType::Bool).unwrap(),
                Field::array("a", FieldType::Scalar(ScalarType::Bool), 2).unwrap(),
                Field::list("l", FieldType::Scalar(ScalarType::Int8(Domain::full())), 1, 3).unwrap(),
                Field::optional("o", vec![Field::int8("x").unwrap()]).unwrap(),
                Field::string("s", 2, 4).unwrap(),
            ],
        )
        .unwrap();
        assert_eq!(
            Value::default_for(&schema),
            Value::Struct(vec![
                Value::Int32(5),
                Value::Null,
                Value::Array(vec![Value::Bool(false), Value::Bool(false)]),
                Value::List(vec![Value::Int8(0)]),
                Value::Optional(None),
                Value::String("AA".to_string()),
            ])
        );
    }

    #[test]
    fn numeric_accessors() {
        assert_eq!(Value::Int8(-3).as_i64(), Some(-3));
        assert_eq!(Value::Int8(-3).as_u64(), None);
        assert_eq!(Value::UInt64(u64::MAX).as_i64(), None);
        assert_eq!(Value::HalfFloat(0.5).as_f64(), Some(0.5));
        assert_eq!(Value::Bool(true).as_f64(), None);
    }

    #[test]
    fn scalar_matching() {
        assert!(Value::Date(NaiveDate::default()).matches_scalar(&ScalarType::DateOnly));
        assert!(!Value::Null.matches_scalar(&ScalarType::Bool));
        assert!(!Value::Float(1.0).matches_scalar(&ScalarType::HalfFloat(Domain::half())));
    }
}
