//! Value printer: one-line dump of a value tree.
//!
//! Delimiters are fixed per composite kind: struct `{...}`, array `[...]`, list `<...>`. Strings
//! are single-quoted; an absent nullable or optional struct prints `null`.

use crate::field::{ArrayType, Field, ListType, ScalarType, StructType};
use crate::value::Value;
use crate::visit::{walk, Access, Composite, ValueSlot, VisitError, Visitor, VisitorBase};
use std::fmt::Write;

struct Frame {
    first: bool,
    close: Option<char>,
}

#[derive(Default)]
pub struct ValuePrinter<'s> {
    base: VisitorBase<'s>,
    out: String,
    frames: Vec<Frame>,
}

impl<'s> ValuePrinter<'s> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn output(&self) -> &str {
        &self.out
    }

    pub fn into_output(self) -> String {
        self.out
    }

    fn separate(&mut self) {
        if let Some(frame) = self.frames.last_mut() {
            if !frame.first {
                self.out.push_str(", ");
            }
            frame.first = false;
        }
    }

    fn open(&mut self, kind: Composite, field: &'s Field, delimiters: Option<(char, char)>) {
        self.separate();
        let close = match delimiters {
            Some((open, close)) => {
                self.out.push(open);
                Some(close)
            }
            None => {
                self.out.push_str("null");
                None
            }
        };
        self.frames.push(Frame { first: true, close });
        self.base.open(kind, field);
    }

    fn close(&mut self, kind: Composite, field: &Field) -> Result<(), VisitError> {
        self.base.close(kind, field)?;
        if let Some(Frame { close: Some(c), .. }) = self.frames.pop() {
            self.out.push(c);
        }
        Ok(())
    }
}

fn write_scalar(out: &mut String, ty: &ScalarType, value: &Value, field: &Field) -> Result<(), VisitError> {
    if value.is_null() {
        out.push_str("null");
        return Ok(());
    }
    match (ty, value) {
        (ScalarType::Int8(_), Value::Int8(x)) => write!(out, "{}", x)?,
        (ScalarType::Int16(_), Value::Int16(x)) => write!(out, "{}", x)?,
        (ScalarType::Int32(_), Value::Int32(x)) => write!(out, "{}", x)?,
        (ScalarType::Int64(_), Value::Int64(x)) => write!(out, "{}", x)?,
        (ScalarType::UInt8(_), Value::UInt8(x)) => write!(out, "{}", x)?,
        (ScalarType::UInt16(_), Value::UInt16(x)) => write!(out, "{}", x)?,
        (ScalarType::UInt32(_), Value::UInt32(x)) => write!(out, "{}", x)?,
        (ScalarType::UInt64(_), Value::UInt64(x)) => write!(out, "{}", x)?,
        (ScalarType::Float(_), Value::Float(x)) | (ScalarType::HalfFloat(_), Value::HalfFloat(x)) => {
            write!(out, "{}", x)?
        }
        (ScalarType::Double(_), Value::Double(x)) => write!(out, "{}", x)?,
        (ScalarType::Bool, Value::Bool(x)) => write!(out, "{}", x)?,
        (ScalarType::Char(_), Value::Char(c)) => out.push(*c),
        (ScalarType::String(_), Value::String(s)) => write!(out, "'{}'", s)?,
        (ScalarType::DateTime, Value::DateTime(t)) => write!(out, "{}", t)?,
        (ScalarType::DateOnly, Value::Date(d)) => write!(out, "{}", d)?,
        (ScalarType::TimeOnly, Value::Time(t)) => write!(out, "{}", t)?,
        (ScalarType::TimeSpan, Value::TimeSpan(d)) => write!(out, "{}", d)?,
        (_, other) => return Err(VisitError::shape(field, ty.name(), other)),
    }
    Ok(())
}

impl<'s> Visitor<'s> for ValuePrinter<'s> {
    fn access(&self) -> Access {
        Access::Read
    }

    fn visit(&mut self, field: &'s Field, ty: &'s ScalarType, slot: &mut ValueSlot<'_>) -> Result<(), VisitError> {
        self.separate();
        write_scalar(&mut self.out, ty, slot.get(), field)
    }

    fn begin_struct(&mut self, field: &'s Field, _ty: &'s StructType) -> Result<(), VisitError> {
        self.open(Composite::Struct, field, Some(('{', '}')));
        Ok(())
    }

    fn end_struct(&mut self, field: &'s Field) -> Result<(), VisitError> {
        self.close(Composite::Struct, field)
    }

    fn begin_array(&mut self, field: &'s Field, _ty: &'s ArrayType) -> Result<(), VisitError> {
        self.open(Composite::Array, field, Some(('[', ']')));
        Ok(())
    }

    fn end_array(&mut self, field: &'s Field) -> Result<(), VisitError> {
        self.close(Composite::Array, field)
    }

    fn begin_list(&mut self, field: &'s Field, _ty: &'s ListType, count: usize) -> Result<usize, VisitError> {
        self.open(Composite::List, field, Some(('<', '>')));
        Ok(count)
    }

    fn end_list(&mut self, field: &'s Field) -> Result<(), VisitError> {
        self.close(Composite::List, field)
    }

    fn begin_optional_struct(&mut self, field: &'s Field, _ty: &'s StructType, present: bool) -> Result<bool, VisitError> {
        self.open(Composite::OptionalStruct, field, present.then_some(('{', '}')));
        Ok(present)
    }

    fn end_optional_struct(&mut self, field: &'s Field) -> Result<(), VisitError> {
        self.close(Composite::OptionalStruct, field)
    }

    fn finish(&mut self) -> Result<(), VisitError> {
        self.base.finish()
    }
}

/// Print `value` as laid out by `schema`.
pub fn print(schema: &Field, value: &Value) -> Result<String, VisitError> {
    let mut printer = ValuePrinter::new();
    walk(schema, value, &mut printer)?;
    Ok(printer.into_output())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::FieldType;
    use chrono::NaiveDate;

    #[test]
    fn nested_composites() {
        let schema = Field::structure(
            "root",
            vec![
                Field::array("a", FieldType::Scalar(ScalarType::Bool), 2).unwrap(),
                Field::nullable("n", ScalarType::DateOnly).unwrap(),
                Field::optional("o", vec![Field::int8("x").unwrap()]).unwrap(),
                Field::scalar("c", ScalarType::Char(Default::default())).unwrap(),
            ],
        )
        .unwrap();
        let value = Value::Struct(vec![
            Value::Array(vec![Value::Bool(true), Value::Bool(false)]),
            Value::Date(NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()),
            Value::Optional(None),
            Value::Char('Q'),
        ]);
        assert_eq!(print(&schema, &value).unwrap(), "{[true, false], 2024-02-29, null, Q}");

        let value = Value::Struct(vec![
            Value::Array(vec![Value::Bool(false), Value::Bool(false)]),
            Value::Null,
            Value::Optional(Some(Box::new(Value::Struct(vec![Value::Int8(-4)])))),
            Value::Char('Z'),
        ]);
        assert_eq!(print(&schema, &value).unwrap(), "{[false, false], null, {-4}, Z}");
    }
}
