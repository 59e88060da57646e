//! Schema flattener: every visited field, in visitation order.

use crate::field::{ArrayType, Field, ListType, ScalarType, StructType};
use crate::value::Value;
use crate::visit::{walk, Access, Composite, ValueSlot, VisitError, Visitor, VisitorBase};

/// Collects fields as they are visited: composites at `begin_*`, scalars at `visit`.
///
/// Array and list elements appear once per element visited; an absent optional struct
/// contributes only itself.
#[derive(Debug, Default)]
pub struct SchemaFlattener<'s> {
    base: VisitorBase<'s>,
    fields: Vec<&'s Field>,
}

impl<'s> SchemaFlattener<'s> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fields(&self) -> &[&'s Field] {
        &self.fields
    }

    pub fn into_fields(self) -> Vec<&'s Field> {
        self.fields
    }
}

impl<'s> Visitor<'s> for SchemaFlattener<'s> {
    fn access(&self) -> Access {
        Access::Read
    }

    fn visit(&mut self, field: &'s Field, _ty: &'s ScalarType, _slot: &mut ValueSlot<'_>) -> Result<(), VisitError> {
        self.fields.push(field);
        Ok(())
    }

    fn begin_struct(&mut self, field: &'s Field, _ty: &'s StructType) -> Result<(), VisitError> {
        self.fields.push(field);
        self.base.open(Composite::Struct, field);
        Ok(())
    }

    fn end_struct(&mut self, field: &'s Field) -> Result<(), VisitError> {
        self.base.close(Composite::Struct, field)
    }

    fn begin_array(&mut self, field: &'s Field, _ty: &'s ArrayType) -> Result<(), VisitError> {
        self.fields.push(field);
        self.base.open(Composite::Array, field);
        Ok(())
    }

    fn end_array(&mut self, field: &'s Field) -> Result<(), VisitError> {
        self.base.close(Composite::Array, field)
    }

    fn begin_list(&mut self, field: &'s Field, _ty: &'s ListType, count: usize) -> Result<usize, VisitError> {
        self.fields.push(field);
        self.base.open(Composite::List, field);
        Ok(count)
    }

    fn end_list(&mut self, field: &'s Field) -> Result<(), VisitError> {
        self.base.close(Composite::List, field)
    }

    fn begin_optional_struct(&mut self, field: &'s Field, _ty: &'s StructType, present: bool) -> Result<bool, VisitError> {
        self.fields.push(field);
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

/// Flatten `schema` walked over `value`.
pub fn flatten<'s>(schema: &'s Field, value: &Value) -> Result<Vec<&'s Field>, VisitError> {
    let mut flattener = SchemaFlattener::new();
    walk(schema, value, &mut flattener)?;
    Ok(flattener.into_fields())
}
