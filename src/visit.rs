//! Visitor protocol: double dispatch over the closed field-type set without reflection.
//!
//! A driver walks a [`Field`] tree together with a [`Value`] tree and calls one visitor hook per
//! node, in strict stack discipline:
//!
//! ```text
//! visit(scalar)
//! begin_struct          → children              → end_struct
//! begin_array(N)        → N elements            → end_array
//! begin_list(count)     → count elements        → end_list
//! begin_optional_struct → children if present   → end_optional_struct
//! ```
//!
//! ## Read and write visitors
//!
//! Each visitor declares its [`Access`]. Read visitors (serializers, printers) only
//! [`get`](ValueSlot::get) values; write visitors (deserializers, randomizers) ignore the incoming
//! value and [`set`](ValueSlot::set) a new one. [`walk`] takes a shared value and refuses write
//! visitors; [`walk_mut`] reshapes the value to whatever a write visitor supplies (list counts,
//! optional presence).
//!
//! ## Fallback and balance
//!
//! [`VisitorBase`] is the shared part of every built-in visitor. It carries the per-instance
//! [`FallbackPolicy`] for variants a visitor declines, and the stack of open composites so an
//! unbalanced `end_*` fails immediately instead of producing corrupted output.
//!
//! | Driver entry point | Access | Value |
//! |--------------------|--------|-------|
//! | [`walk`] | read only | `&Value` |
//! | [`walk_mut`] | read or write | `&mut Value` |
//! | [`Visitable::accept`] on [`Record`] | read or write | owned by the record |

use crate::bits::BitError;
use crate::field::{ArrayType, Field, FieldType, ListType, ScalarType, StructType};
use crate::value::Value;
use std::fmt;
use tracing::{debug, trace};

#[derive(Debug, thiserror::Error)]
pub enum VisitError {
    #[error("field {field}: no handler for {kind}")]
    Unhandled { field: String, kind: String },
    #[error("field {field}: unbalanced end, expected {expected}, found {found}")]
    Unbalanced { field: String, expected: String, found: String },
    #[error("traversal finished with {depth} composite(s) still open")]
    Unclosed { depth: usize },
    #[error("field {field}: value is read-only in this traversal")]
    ReadOnly { field: String },
    #[error("field {field}: expected {expected}, found {found}")]
    Shape { field: String, expected: String, found: String },
    #[error("field {field}: visitor changed list count from {expected} to {found} in a read traversal")]
    CountMismatch { field: String, expected: usize, found: usize },
    #[error("field {field}: {reason}")]
    Domain { field: String, reason: String },
    #[error("{0} trailing byte(s) after the value")]
    TrailingBytes(usize),
    #[error("invalid visitor configuration: {0}")]
    InvalidConfig(String),
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),
    #[error("bits: {0}")]
    Bits(#[from] BitError),
    #[error("format: {0}")]
    Format(#[from] fmt::Error),
}

impl VisitError {
    pub(crate) fn shape(field: &Field, expected: impl fmt::Display, found: &Value) -> Self {
        VisitError::Shape {
            field: field.name().to_string(),
            expected: expected.to_string(),
            found: found.kind().to_string(),
        }
    }
}

/// Whether a visitor reads values or writes them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read,
    Write,
}

/// What a visitor does with a field type it does not handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FallbackPolicy {
    /// Log at debug level and continue.
    Skip,
    /// Fail with [`VisitError::Unhandled`].
    #[default]
    Fail,
}

/// Composite kinds tracked by [`VisitorBase`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Composite {
    Struct,
    Array,
    List,
    OptionalStruct,
}

impl fmt::Display for Composite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Composite::Struct => "struct",
            Composite::Array => "array",
            Composite::List => "list",
            Composite::OptionalStruct => "optional struct",
        })
    }
}

enum SlotRef<'v> {
    Shared(&'v Value),
    Exclusive(&'v mut Value),
}

/// Accessor for the value of the scalar being visited.
pub struct ValueSlot<'v> {
    field: &'v str,
    value: SlotRef<'v>,
}

impl<'v> ValueSlot<'v> {
    fn shared(field: &'v str, value: &'v Value) -> Self {
        ValueSlot { field, value: SlotRef::Shared(value) }
    }

    fn exclusive(field: &'v str, value: &'v mut Value) -> Self {
        ValueSlot { field, value: SlotRef::Exclusive(value) }
    }

    pub fn get(&self) -> &Value {
        match &self.value {
            SlotRef::Shared(v) => v,
            SlotRef::Exclusive(v) => v,
        }
    }

    pub fn is_writable(&self) -> bool {
        matches!(self.value, SlotRef::Exclusive(_))
    }

    /// Replace the value; fails with [`VisitError::ReadOnly`] in a read traversal.
    pub fn set(&mut self, value: Value) -> Result<(), VisitError> {
        match &mut self.value {
            SlotRef::Exclusive(v) => {
                **v = value;
                Ok(())
            }
            SlotRef::Shared(_) => Err(VisitError::ReadOnly { field: self.field.to_string() }),
        }
    }
}

/// One handler per node kind of a schema walk.
///
/// `'s` is the schema lifetime: visitors may keep `&'s Field` references for reporting but never
/// own part of the tree.
pub trait Visitor<'s> {
    fn access(&self) -> Access;

    /// Scalar or nullable scalar. `ty` is the scalar type; nullability is `field.is_nullable()`.
    fn visit(&mut self, field: &'s Field, ty: &'s ScalarType, slot: &mut ValueSlot<'_>) -> Result<(), VisitError>;

    fn begin_struct(&mut self, field: &'s Field, ty: &'s StructType) -> Result<(), VisitError>;
    fn end_struct(&mut self, field: &'s Field) -> Result<(), VisitError>;

    fn begin_array(&mut self, field: &'s Field, ty: &'s ArrayType) -> Result<(), VisitError>;
    fn end_array(&mut self, field: &'s Field) -> Result<(), VisitError>;

    /// Exchange the element count: readers return `count` unchanged, writers return the count
    /// to materialize. The driver then visits exactly that many elements.
    fn begin_list(&mut self, field: &'s Field, ty: &'s ListType, count: usize) -> Result<usize, VisitError>;
    fn end_list(&mut self, field: &'s Field) -> Result<(), VisitError>;

    /// Exchange presence: readers return `present` unchanged, writers decide.
    fn begin_optional_struct(&mut self, field: &'s Field, ty: &'s StructType, present: bool) -> Result<bool, VisitError>;
    fn end_optional_struct(&mut self, field: &'s Field) -> Result<(), VisitError>;

    /// Called once after the root node.
    fn finish(&mut self) -> Result<(), VisitError> {
        Ok(())
    }
}

/// Shared visitor state: fallback policy and the open-composite stack.
#[derive(Debug, Default)]
pub struct VisitorBase<'s> {
    policy: FallbackPolicy,
    open: Vec<(Composite, &'s Field)>,
}

impl<'s> VisitorBase<'s> {
    pub fn new(policy: FallbackPolicy) -> Self {
        VisitorBase { policy, open: Vec::new() }
    }

    pub fn policy(&self) -> FallbackPolicy {
        self.policy
    }

    pub fn set_policy(&mut self, policy: FallbackPolicy) {
        self.policy = policy;
    }

    /// Number of composites currently open.
    pub fn depth(&self) -> usize {
        self.open.len()
    }

    /// Handle a field type the visitor does not implement.
    pub fn fallback(&self, field: &Field) -> Result<(), VisitError> {
        match self.policy {
            FallbackPolicy::Skip => {
                debug!(field = field.name(), kind = %field.ty(), "skipping unhandled field type");
                Ok(())
            }
            FallbackPolicy::Fail => Err(VisitError::Unhandled {
                field: field.name().to_string(),
                kind: field.ty().to_string(),
            }),
        }
    }

    pub fn open(&mut self, kind: Composite, field: &'s Field) {
        self.open.push((kind, field));
    }

    /// Close the innermost composite; it must be `kind` opened for this same field.
    pub fn close(&mut self, kind: Composite, field: &Field) -> Result<(), VisitError> {
        match self.open.pop() {
            Some((k, f)) if k == kind && std::ptr::eq(f, field) => Ok(()),
            Some((k, f)) => Err(VisitError::Unbalanced {
                field: field.name().to_string(),
                expected: format!("end of {} {}", k, f.name()),
                found: format!("end of {}", kind),
            }),
            None => Err(VisitError::Unbalanced {
                field: field.name().to_string(),
                expected: "no open composite".to_string(),
                found: format!("end of {}", kind),
            }),
        }
    }

    /// Fails if composites are still open.
    pub fn finish(&self) -> Result<(), VisitError> {
        if self.open.is_empty() {
            Ok(())
        } else {
            Err(VisitError::Unclosed { depth: self.open.len() })
        }
    }
}

/// Entry point of a traversable node.
pub trait Visitable<'s> {
    fn accept<V: Visitor<'s> + ?Sized>(&mut self, visitor: &mut V) -> Result<(), VisitError>;
}

/// A value tree bound to its schema.
#[derive(Debug, Clone, PartialEq)]
pub struct Record<'s> {
    schema: &'s Field,
    value: Value,
}

impl<'s> Record<'s> {
    /// Record holding the schema's default value.
    pub fn new(schema: &'s Field) -> Self {
        Record { schema, value: Value::default_for(schema) }
    }

    pub fn with_value(schema: &'s Field, value: Value) -> Self {
        Record { schema, value }
    }

    pub fn schema(&self) -> &'s Field {
        self.schema
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn value_mut(&mut self) -> &mut Value {
        &mut self.value
    }

    pub fn into_value(self) -> Value {
        self.value
    }
}

impl<'s> Visitable<'s> for Record<'s> {
    fn accept<V: Visitor<'s> + ?Sized>(&mut self, visitor: &mut V) -> Result<(), VisitError> {
        walk_mut(self.schema, &mut self.value, visitor)
    }
}

/// Read-only walk. Write visitors are refused with [`VisitError::ReadOnly`].
pub fn walk<'s, V: Visitor<'s> + ?Sized>(field: &'s Field, value: &Value, visitor: &mut V) -> Result<(), VisitError> {
    if visitor.access() == Access::Write {
        return Err(VisitError::ReadOnly { field: field.name().to_string() });
    }
    read_node(field, value, visitor)?;
    visitor.finish()
}

/// Walk that lets write visitors replace values and reshape composites.
pub fn walk_mut<'s, V: Visitor<'s> + ?Sized>(field: &'s Field, value: &mut Value, visitor: &mut V) -> Result<(), VisitError> {
    match visitor.access() {
        Access::Read => read_node(field, value, visitor)?,
        Access::Write => write_node(field, value, visitor)?,
    }
    visitor.finish()
}

fn struct_items<'v>(field: &Field, value: &'v Value, ty: &StructType) -> Result<&'v [Value], VisitError> {
    match value {
        Value::Struct(items) if items.len() == ty.fields().len() => Ok(items),
        other => Err(VisitError::shape(field, format!("struct of {} fields", ty.fields().len()), other)),
    }
}

fn read_node<'s, V: Visitor<'s> + ?Sized>(field: &'s Field, value: &Value, v: &mut V) -> Result<(), VisitError> {
    match field.ty() {
        FieldType::Scalar(ty) => {
            if !value.matches_scalar(ty) {
                return Err(VisitError::shape(field, ty.name(), value));
            }
            v.visit(field, ty, &mut ValueSlot::shared(field.name(), value))
        }
        FieldType::Nullable(ty) => {
            if !value.is_null() && !value.matches_scalar(ty) {
                return Err(VisitError::shape(field, field.ty(), value));
            }
            v.visit(field, ty, &mut ValueSlot::shared(field.name(), value))
        }
        FieldType::Struct(ty) => {
            let items = struct_items(field, value, ty)?;
            trace!(field = field.name(), "struct");
            v.begin_struct(field, ty)?;
            for (child, item) in ty.fields().iter().zip(items) {
                read_node(child, item, v)?;
            }
            v.end_struct(field)
        }
        FieldType::Array(ty) => {
            let items = match value {
                Value::Array(items) if items.len() == ty.len() => items,
                other => return Err(VisitError::shape(field, field.ty(), other)),
            };
            trace!(field = field.name(), len = ty.len(), "array");
            v.begin_array(field, ty)?;
            for item in items {
                read_node(ty.element(), item, v)?;
            }
            v.end_array(field)
        }
        FieldType::List(ty) => {
            let items = match value {
                Value::List(items) => items,
                other => return Err(VisitError::shape(field, field.ty(), other)),
            };
            trace!(field = field.name(), count = items.len(), "list");
            let count = v.begin_list(field, ty, items.len())?;
            if count != items.len() {
                return Err(VisitError::CountMismatch {
                    field: field.name().to_string(),
                    expected: items.len(),
                    found: count,
                });
            }
            for item in items {
                read_node(ty.element(), item, v)?;
            }
            v.end_list(field)
        }
        FieldType::OptionalStruct(ty) => {
            let inner = match value {
                Value::Optional(inner) => inner.as_deref(),
                other => return Err(VisitError::shape(field, field.ty(), other)),
            };
            trace!(field = field.name(), present = inner.is_some(), "optional struct");
            v.begin_optional_struct(field, ty, inner.is_some())?;
            if let Some(inner) = inner {
                for (child, item) in ty.fields().iter().zip(struct_items(field, inner, ty)?) {
                    read_node(child, item, v)?;
                }
            }
            v.end_optional_struct(field)
        }
    }
}

fn ensure_struct<'v>(value: &'v mut Value, ty: &StructType) -> &'v mut Vec<Value> {
    if !matches!(value, Value::Struct(items) if items.len() == ty.fields().len()) {
        *value = Value::default_struct(ty);
    }
    match value {
        Value::Struct(items) => items,
        _ => unreachable!("value was just reset to a struct"),
    }
}

fn write_node<'s, V: Visitor<'s> + ?Sized>(field: &'s Field, value: &mut Value, v: &mut V) -> Result<(), VisitError> {
    match field.ty() {
        FieldType::Scalar(ty) => {
            v.visit(field, ty, &mut ValueSlot::exclusive(field.name(), value))?;
            if !value.matches_scalar(ty) {
                return Err(VisitError::shape(field, ty.name(), value));
            }
            Ok(())
        }
        FieldType::Nullable(ty) => {
            v.visit(field, ty, &mut ValueSlot::exclusive(field.name(), value))?;
            if !value.is_null() && !value.matches_scalar(ty) {
                return Err(VisitError::shape(field, field.ty(), value));
            }
            Ok(())
        }
        FieldType::Struct(ty) => {
            let items = ensure_struct(value, ty);
            trace!(field = field.name(), "struct");
            v.begin_struct(field, ty)?;
            for (child, item) in ty.fields().iter().zip(items.iter_mut()) {
                write_node(child, item, v)?;
            }
            v.end_struct(field)
        }
        FieldType::Array(ty) => {
            if !matches!(value, Value::Array(items) if items.len() == ty.len()) {
                *value = Value::default_for(field);
            }
            trace!(field = field.name(), len = ty.len(), "array");
            v.begin_array(field, ty)?;
            if let Value::Array(items) = value {
                for item in items.iter_mut() {
                    write_node(ty.element(), item, v)?;
                }
            }
            v.end_array(field)
        }
        FieldType::List(ty) => {
            if !matches!(value, Value::List(_)) {
                *value = Value::List(Vec::new());
            }
            let current = value.as_list().map_or(0, <[Value]>::len);
            let count = v.begin_list(field, ty, current)?;
            trace!(field = field.name(), count, "list");
            if let Value::List(items) = value {
                items.resize_with(count, || Value::default_for(ty.element()));
                for item in items.iter_mut() {
                    write_node(ty.element(), item, v)?;
                }
            }
            v.end_list(field)
        }
        FieldType::OptionalStruct(ty) => {
            let was_present = matches!(value, Value::Optional(Some(_)));
            let present = v.begin_optional_struct(field, ty, was_present)?;
            trace!(field = field.name(), present, "optional struct");
            if !present {
                *value = Value::Optional(None);
            } else if !was_present {
                *value = Value::Optional(Some(Box::new(Value::default_struct(ty))));
            }
            if let Value::Optional(Some(inner)) = value {
                let items = ensure_struct(inner, ty);
                for (child, item) in ty.fields().iter().zip(items.iter_mut()) {
                    write_node(child, item, v)?;
                }
            }
            v.end_optional_struct(field)
        }
    }
}
