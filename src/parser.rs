//! Parse schema source into a [`Field`] tree using PEST.
//!
//! ```text
//! struct Track {
//!   id: uint32;
//!   speed: double [0..400];
//!   callsign: string(1..8) "ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
//!   alt: int16? [-1000..5000];
//!   waypoints: list<Point>(0..4);
//!   flags: bool[3];
//!   extra: optional Point;
//! }
//! struct Point { x: float [-1..1]; y: float [-1..1]; }
//! ```
//!
//! The first struct is the root. Struct names are resolved by reference and inlined; a struct
//! that reaches itself is rejected. `T[a][b]` is an array of `b` arrays of `a` elements.
//! Defaults: numeric domains span the storage type, strings are `(0..32)` alphanumeric, chars are
//! alphanumeric, lists are `(0..16)`.

use crate::field::{
    ArrayType, CharSet, Domain, Field, FieldType, ListType, Numeric, ScalarType, StringType, StructType,
};
use pest::iterators::Pair;
use pest::Parser;
use pest_derive::Parser as PestParser;
use std::collections::HashMap;
use std::str::FromStr;

#[derive(PestParser)]
#[grammar = "schema.pest"]
struct SchemaParser;

const DEFAULT_STRING_SIZE: (usize, usize) = (0, 32);
const DEFAULT_LIST_SIZE: (usize, usize) = (0, 16);

/// Parse schema source and build the root field.
pub fn parse_schema(source: &str) -> Result<Field, String> {
    let pairs = SchemaParser::parse(Rule::schema, source).map_err(|e| format!("Parse error: {}", e))?;
    let schema = pairs.into_iter().next().ok_or("Empty parse")?;

    let mut order = Vec::new();
    let mut defs: HashMap<&str, Pair<Rule>> = HashMap::new();
    for def in schema.into_inner().filter(|p| p.as_rule() == Rule::struct_def) {
        let name = def
            .clone()
            .into_inner()
            .find(|p| p.as_rule() == Rule::ident)
            .ok_or("struct: missing name")?
            .as_str();
        if defs.insert(name, def).is_some() {
            return Err(format!("duplicate struct {}", name));
        }
        order.push(name);
    }
    let root = order.first().ok_or("schema defines no struct")?;
    let mut builder = Builder { defs, stack: Vec::new() };
    let ty = builder.struct_type(root)?;
    Field::new(*root, FieldType::Struct(ty)).map_err(|e| e.to_string())
}

struct Builder<'i> {
    defs: HashMap<&'i str, Pair<'i, Rule>>,
    stack: Vec<&'i str>,
}

impl<'i> Builder<'i> {
    fn struct_type(&mut self, name: &'i str) -> Result<StructType, String> {
        if self.stack.contains(&name) {
            return Err(format!("recursive struct reference: {} -> {}", self.stack.join(" -> "), name));
        }
        let def = self.defs.get(name).cloned().ok_or_else(|| format!("unknown struct {}", name))?;
        self.stack.push(name);
        let mut fields = Vec::new();
        for field_def in def.into_inner().filter(|p| p.as_rule() == Rule::field_def) {
            fields.push(self.field(field_def)?);
        }
        self.stack.pop();
        StructType::new(fields).map_err(|e| format!("struct {}: {}", name, e))
    }

    fn field(&mut self, pair: Pair<'i, Rule>) -> Result<Field, String> {
        let mut it = pair.into_inner();
        let name = it.next().ok_or("field: missing name")?.as_str();
        let spec = it.next().ok_or("field: missing type")?;
        let ty = self.type_spec(spec).map_err(|e| format!("field {}: {}", name, e))?;
        Field::new(name, ty).map_err(|e| e.to_string())
    }

    fn type_spec(&mut self, pair: Pair<'i, Rule>) -> Result<FieldType, String> {
        let inner = pair.into_inner().next().ok_or("type: empty")?;
        match inner.as_rule() {
            Rule::optional_spec => {
                let name = inner.into_inner().find(|p| p.as_rule() == Rule::ident).ok_or("optional: missing struct")?;
                Ok(FieldType::OptionalStruct(self.struct_type(name.as_str())?))
            }
            Rule::list_spec => {
                let mut element = None;
                let mut size = DEFAULT_LIST_SIZE;
                for part in inner.into_inner() {
                    match part.as_rule() {
                        Rule::type_spec => element = Some(self.type_spec(part)?),
                        Rule::size_range => size = size_range(part)?,
                        _ => {}
                    }
                }
                let element = Field::element(element.ok_or("list: missing element type")?).map_err(|e| e.to_string())?;
                Ok(FieldType::List(ListType::new(element, size.0, size.1).map_err(|e| e.to_string())?))
            }
            Rule::array_spec => {
                let mut it = inner.into_inner();
                let element = it.next().ok_or("array: missing element")?;
                let mut ty = self.element_spec(element)?;
                for len in it {
                    let n = parse_uint(len.into_inner().next().ok_or("array: missing length")?.as_str())?;
                    ty = FieldType::Array(ArrayType::new(Field::element(ty).map_err(|e| e.to_string())?, n));
                }
                Ok(ty)
            }
            other => Err(format!("type: unexpected {:?}", other)),
        }
    }

    fn element_spec(&mut self, pair: Pair<'i, Rule>) -> Result<FieldType, String> {
        let inner = pair.into_inner().next().ok_or("element: empty")?;
        match inner.as_rule() {
            Rule::ident => Ok(FieldType::Struct(self.struct_type(inner.as_str())?)),
            Rule::scalar_spec => scalar_spec(inner),
            other => Err(format!("element: unexpected {:?}", other)),
        }
    }
}

fn parse_uint(s: &str) -> Result<usize, String> {
    s.parse().map_err(|e| format!("invalid size {}: {}", s, e))
}

fn size_range(pair: Pair<Rule>) -> Result<(usize, usize), String> {
    let mut it = pair.into_inner();
    let min = parse_uint(it.next().ok_or("size range: missing min")?.as_str())?;
    let max = parse_uint(it.next().ok_or("size range: missing max")?.as_str())?;
    Ok((min, max))
}

fn domain<T>(bounds: Option<(&str, &str)>) -> Result<Domain<T>, String>
where
    T: Numeric + FromStr,
    T::Err: std::fmt::Display,
{
    let Some((min, max)) = bounds else {
        return Ok(Domain::full());
    };
    let parse = |s: &str| s.parse::<T>().map_err(|e| format!("invalid bound {}: {}", s, e));
    Domain::new(parse(min)?, parse(max)?).map_err(|e| e.to_string())
}

fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => out.extend(chars.next()),
            c => out.push(c),
        }
    }
    out
}

fn scalar_spec(pair: Pair<Rule>) -> Result<FieldType, String> {
    let mut name = "";
    let mut nullable = false;
    let mut bounds = None;
    let mut size = None;
    let mut chars = None;
    for part in pair.into_inner() {
        match part.as_rule() {
            Rule::scalar_name => name = part.as_str(),
            Rule::nullable => nullable = true,
            Rule::domain => {
                let mut it = part.into_inner();
                let min = it.next().ok_or("domain: missing min")?.as_str();
                let max = it.next().ok_or("domain: missing max")?.as_str();
                bounds = Some((min, max));
            }
            Rule::size_range => size = Some(size_range(part)?),
            Rule::string_lit => {
                let raw = part.into_inner().next().map_or("", |p| p.as_str());
                chars = Some(CharSet::new(unescape(raw).chars()).map_err(|e| e.to_string())?);
            }
            _ => {}
        }
    }
    let numeric = matches!(
        name,
        "int8" | "int16" | "int32" | "int64" | "uint8" | "uint16" | "uint32" | "uint64" | "float" | "double" | "half"
    );
    if bounds.is_some() && !numeric {
        return Err(format!("{} does not take a domain", name));
    }
    if size.is_some() && name != "string" {
        return Err(format!("{} does not take a size range", name));
    }
    if chars.is_some() && !matches!(name, "string" | "char") {
        return Err(format!("{} does not take allowed characters", name));
    }
    let ty = match name {
        "int8" => ScalarType::Int8(domain(bounds)?),
        "int16" => ScalarType::Int16(domain(bounds)?),
        "int32" => ScalarType::Int32(domain(bounds)?),
        "int64" => ScalarType::Int64(domain(bounds)?),
        "uint8" => ScalarType::UInt8(domain(bounds)?),
        "uint16" => ScalarType::UInt16(domain(bounds)?),
        "uint32" => ScalarType::UInt32(domain(bounds)?),
        "uint64" => ScalarType::UInt64(domain(bounds)?),
        "float" => ScalarType::Float(domain(bounds)?),
        "double" => ScalarType::Double(domain(bounds)?),
        "half" => ScalarType::HalfFloat(if bounds.is_some() { domain(bounds)? } else { Domain::half() }),
        "bool" => ScalarType::Bool,
        "char" => ScalarType::Char(chars.unwrap_or_default()),
        "string" => {
            let (min, max) = size.unwrap_or(DEFAULT_STRING_SIZE);
            ScalarType::String(StringType::new(min, max, chars.unwrap_or_default()).map_err(|e| e.to_string())?)
        }
        "datetime" => ScalarType::DateTime,
        "date" => ScalarType::DateOnly,
        "time" => ScalarType::TimeOnly,
        "timespan" => ScalarType::TimeSpan,
        other => return Err(format!("unknown scalar type {}", other)),
    };
    Ok(if nullable { FieldType::Nullable(ty) } else { FieldType::Scalar(ty) })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keywords_need_a_boundary() {
        let root = parse_schema("struct A { x: int8x; } struct int8x { y: bool; }").unwrap();
        let FieldType::Struct(s) = root.ty() else { panic!("root is not a struct") };
        assert!(matches!(s.fields()[0].ty(), FieldType::Struct(_)));
    }

    #[test]
    fn nested_arrays_wrap_left_to_right() {
        let root = parse_schema("struct A { m: uint8[2][3]; }").unwrap();
        let m = &root.children()[0];
        let FieldType::Array(outer) = m.ty() else { panic!("not an array") };
        assert_eq!(outer.len(), 3);
        let FieldType::Array(inner) = outer.element().ty() else { panic!("not an array") };
        assert_eq!(inner.len(), 2);
    }

    #[test]
    fn escaped_allowed_chars() {
        let root = parse_schema(r#"struct A { s: string(1..2) "a\"\\"; }"#).unwrap();
        let FieldType::Scalar(ScalarType::String(st)) = root.children()[0].ty() else { panic!("not a string") };
        assert_eq!(st.allowed().chars(), &['a', '"', '\\']);
    }
}
