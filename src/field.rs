//! Schema model: named fields over a closed set of field types.
//!
//! A schema is a tree of [`Field`]s. Composite types own their children, so a field can never
//! appear among its own descendants. Every constructor validates eagerly and the tree is
//! read-only afterwards.
//!
//! The variant sets ([`FieldType`], [`ScalarType`]) are closed: traversal code matches on them
//! without wildcard arms, so adding a variant is a compile error everywhere it must be handled.

use std::collections::HashSet;
use std::fmt;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SchemaError {
    #[error("invalid field name {name:?}: {reason}")]
    InvalidName { name: String, reason: &'static str },
    #[error("invalid domain [{min}, {max}]")]
    InvalidDomain { min: String, max: String },
    #[error("invalid size range: min {min} > max {max}")]
    InvalidSize { min: usize, max: usize },
    #[error("allowed character set is empty")]
    EmptyCharSet,
    #[error("duplicate field name: {0}")]
    DuplicateField(String),
}

/// Storage types usable as numeric domain bounds.
pub trait Numeric: Copy + PartialOrd + fmt::Display + fmt::Debug {
    const LOWEST: Self;
    const HIGHEST: Self;
    const ZERO: Self;

    fn is_finite(self) -> bool {
        true
    }
}

macro_rules! numeric_int {
    ($($t:ty),*) => {
        $(impl Numeric for $t {
            const LOWEST: Self = <$t>::MIN;
            const HIGHEST: Self = <$t>::MAX;
            const ZERO: Self = 0;
        })*
    };
}

numeric_int!(i8, i16, i32, i64, u8, u16, u32, u64);

impl Numeric for f32 {
    const LOWEST: Self = f32::MIN;
    const HIGHEST: Self = f32::MAX;
    const ZERO: Self = 0.0;

    fn is_finite(self) -> bool {
        f32::is_finite(self)
    }
}

impl Numeric for f64 {
    const LOWEST: Self = f64::MIN;
    const HIGHEST: Self = f64::MAX;
    const ZERO: Self = 0.0;

    fn is_finite(self) -> bool {
        f64::is_finite(self)
    }
}

/// Largest finite IEEE binary16 value; bounds every half-float domain.
pub const HALF_MAX: f32 = 65504.0;

/// Inclusive `[min, max]` value domain of a numeric field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Domain<T> {
    min: T,
    max: T,
}

impl<T: Numeric> Domain<T> {
    pub fn new(min: T, max: T) -> Result<Self, SchemaError> {
        if !min.is_finite() || !max.is_finite() || min > max {
            return Err(SchemaError::InvalidDomain { min: min.to_string(), max: max.to_string() });
        }
        Ok(Domain { min, max })
    }

    /// The storage type's full range.
    pub fn full() -> Self {
        Domain { min: T::LOWEST, max: T::HIGHEST }
    }

    pub fn min(&self) -> T {
        self.min
    }

    pub fn max(&self) -> T {
        self.max
    }

    pub fn contains(&self, value: T) -> bool {
        value >= self.min && value <= self.max
    }

    /// Domain value nearest to zero.
    pub fn closest_to_zero(&self) -> T {
        if self.min > T::ZERO {
            self.min
        } else if self.max < T::ZERO {
            self.max
        } else {
            T::ZERO
        }
    }
}

impl Domain<f32> {
    /// Full finite half-float range.
    pub fn half() -> Self {
        Domain { min: -HALF_MAX, max: HALF_MAX }
    }
}

impl<T: Numeric> Default for Domain<T> {
    fn default() -> Self {
        Self::full()
    }
}

/// Ordered, duplicate-free set of allowed characters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharSet {
    chars: Vec<char>,
}

impl CharSet {
    pub fn new(chars: impl IntoIterator<Item = char>) -> Result<Self, SchemaError> {
        let mut seen = HashSet::new();
        let chars: Vec<char> = chars.into_iter().filter(|c| seen.insert(*c)).collect();
        if chars.is_empty() {
            return Err(SchemaError::EmptyCharSet);
        }
        Ok(CharSet { chars })
    }

    /// `A-Z`, `a-z`, `0-9`.
    pub fn alphanumeric() -> Self {
        CharSet { chars: ('A'..='Z').chain('a'..='z').chain('0'..='9').collect() }
    }

    /// Space through `~`.
    pub fn printable_ascii() -> Self {
        CharSet { chars: (' '..='~').collect() }
    }

    pub fn chars(&self) -> &[char] {
        &self.chars
    }

    pub fn len(&self) -> usize {
        self.chars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    pub fn first(&self) -> char {
        self.chars[0]
    }

    pub fn contains(&self, c: char) -> bool {
        self.chars.contains(&c)
    }
}

impl Default for CharSet {
    fn default() -> Self {
        Self::alphanumeric()
    }
}

/// String constraints: length in characters and the allowed alphabet.
#[derive(Debug, Clone, PartialEq)]
pub struct StringType {
    min_size: usize,
    max_size: usize,
    allowed: CharSet,
}

impl StringType {
    pub fn new(min_size: usize, max_size: usize, allowed: CharSet) -> Result<Self, SchemaError> {
        if min_size > max_size {
            return Err(SchemaError::InvalidSize { min: min_size, max: max_size });
        }
        Ok(StringType { min_size, max_size, allowed })
    }

    pub fn min_size(&self) -> usize {
        self.min_size
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn allowed(&self) -> &CharSet {
        &self.allowed
    }

    /// Checks length and alphabet; returns the reason on failure.
    pub fn check(&self, s: &str) -> Result<(), String> {
        let len = s.chars().count();
        if len < self.min_size || len > self.max_size {
            return Err(format!("length {} not in [{}, {}]", len, self.min_size, self.max_size));
        }
        if let Some(c) = s.chars().find(|c| !self.allowed.contains(*c)) {
            return Err(format!("character {:?} not allowed", c));
        }
        Ok(())
    }
}

/// Scalar types. Each has a nullable counterpart through [`FieldType::Nullable`].
#[derive(Debug, Clone, PartialEq)]
pub enum ScalarType {
    Int8(Domain<i8>),
    Int16(Domain<i16>),
    Int32(Domain<i32>),
    Int64(Domain<i64>),
    UInt8(Domain<u8>),
    UInt16(Domain<u16>),
    UInt32(Domain<u32>),
    UInt64(Domain<u64>),
    Float(Domain<f32>),
    Double(Domain<f64>),
    /// IEEE binary16, carried as `f32`; the domain must lie within ±[`HALF_MAX`].
    HalfFloat(Domain<f32>),
    Bool,
    Char(CharSet),
    String(StringType),
    DateTime,
    DateOnly,
    TimeOnly,
    TimeSpan,
}

impl ScalarType {
    pub fn name(&self) -> &'static str {
        match self {
            ScalarType::Int8(_) => "int8",
            ScalarType::Int16(_) => "int16",
            ScalarType::Int32(_) => "int32",
            ScalarType::Int64(_) => "int64",
            ScalarType::UInt8(_) => "uint8",
            ScalarType::UInt16(_) => "uint16",
            ScalarType::UInt32(_) => "uint32",
            ScalarType::UInt64(_) => "uint64",
            ScalarType::Float(_) => "float",
            ScalarType::Double(_) => "double",
            ScalarType::HalfFloat(_) => "half",
            ScalarType::Bool => "bool",
            ScalarType::Char(_) => "char",
            ScalarType::String(_) => "string",
            ScalarType::DateTime => "datetime",
            ScalarType::DateOnly => "date",
            ScalarType::TimeOnly => "time",
            ScalarType::TimeSpan => "timespan",
        }
    }

    fn validate(&self) -> Result<(), SchemaError> {
        if let ScalarType::HalfFloat(d) = self {
            if d.min() < -HALF_MAX || d.max() > HALF_MAX {
                return Err(SchemaError::InvalidDomain { min: d.min().to_string(), max: d.max().to_string() });
            }
        }
        Ok(())
    }
}

/// Fixed-length array of one element field.
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayType {
    element: Box<Field>,
    len: usize,
}

impl ArrayType {
    pub fn new(element: Field, len: usize) -> Self {
        ArrayType { element: Box::new(element), len }
    }

    pub fn element(&self) -> &Field {
        &self.element
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Variable-length list; the count is carried in-stream.
#[derive(Debug, Clone, PartialEq)]
pub struct ListType {
    element: Box<Field>,
    min_size: usize,
    max_size: usize,
}

impl ListType {
    pub fn new(element: Field, min_size: usize, max_size: usize) -> Result<Self, SchemaError> {
        if min_size > max_size {
            return Err(SchemaError::InvalidSize { min: min_size, max: max_size });
        }
        Ok(ListType { element: Box::new(element), min_size, max_size })
    }

    pub fn element(&self) -> &Field {
        &self.element
    }

    pub fn min_size(&self) -> usize {
        self.min_size
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn allows(&self, count: usize) -> bool {
        count >= self.min_size && count <= self.max_size
    }
}

/// Named children of a struct or optional struct.
#[derive(Debug, Clone, PartialEq)]
pub struct StructType {
    fields: Vec<Field>,
}

impl StructType {
    pub fn new(fields: Vec<Field>) -> Result<Self, SchemaError> {
        let mut names = HashSet::new();
        for f in &fields {
            if f.name() == Field::ELEMENT {
                return Err(SchemaError::InvalidName {
                    name: f.name().to_string(),
                    reason: "element name is reserved for array and list elements",
                });
            }
            if !names.insert(f.name()) {
                return Err(SchemaError::DuplicateField(f.name().to_string()));
            }
        }
        Ok(StructType { fields })
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name() == name)
    }
}

/// The closed set of field types.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldType {
    Scalar(ScalarType),
    Nullable(ScalarType),
    Array(ArrayType),
    List(ListType),
    Struct(StructType),
    OptionalStruct(StructType),
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::Scalar(s) => write!(f, "{}", s.name()),
            FieldType::Nullable(s) => write!(f, "{}?", s.name()),
            FieldType::Array(a) => write!(f, "{}[{}]", a.element().ty(), a.len()),
            FieldType::List(l) => write!(f, "list<{}>", l.element().ty()),
            FieldType::Struct(_) => write!(f, "struct"),
            FieldType::OptionalStruct(_) => write!(f, "optional struct"),
        }
    }
}

/// A named node of a schema tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    name: String,
    ty: FieldType,
}

fn validate_name(name: &str) -> Result<(), SchemaError> {
    let invalid = |reason| SchemaError::InvalidName { name: name.to_string(), reason };
    if name == Field::ELEMENT {
        return Ok(());
    }
    let mut chars = name.chars();
    match chars.next() {
        None => return Err(invalid("name is empty")),
        Some(c) if !(c.is_ascii_alphabetic() || c == '_') => {
            return Err(invalid("name must start with a letter or '_'"))
        }
        Some(_) => {}
    }
    if chars.any(|c| !(c.is_ascii_alphanumeric() || c == '_')) {
        return Err(invalid("name may only contain letters, digits and '_'"));
    }
    Ok(())
}

macro_rules! scalar_ctors {
    ($($fn_name:ident => $variant:ident),* $(,)?) => {
        $(
            #[doc = concat!("`", stringify!($fn_name), "` field over the storage type's full range.")]
            pub fn $fn_name(name: &str) -> Result<Field, SchemaError> {
                Field::new(name, FieldType::Scalar(ScalarType::$variant(Domain::full())))
            }
        )*
    };
}

impl Field {
    /// Reserved name of array and list element fields.
    pub const ELEMENT: &'static str = "[]";

    /// Build a field. Names must be identifiers (`[A-Za-z_][A-Za-z0-9_]*`) or [`Field::ELEMENT`];
    /// struct children may not use the element name.
    pub fn new(name: impl Into<String>, ty: FieldType) -> Result<Self, SchemaError> {
        let name = name.into();
        validate_name(&name)?;
        match &ty {
            FieldType::Scalar(s) | FieldType::Nullable(s) => s.validate()?,
            FieldType::Array(_) | FieldType::List(_) | FieldType::Struct(_) | FieldType::OptionalStruct(_) => {}
        }
        Ok(Field { name, ty })
    }

    /// Element field for an array or list.
    pub fn element(ty: FieldType) -> Result<Self, SchemaError> {
        Field::new(Field::ELEMENT, ty)
    }

    pub fn scalar(name: &str, ty: ScalarType) -> Result<Self, SchemaError> {
        Field::new(name, FieldType::Scalar(ty))
    }

    pub fn nullable(name: &str, ty: ScalarType) -> Result<Self, SchemaError> {
        Field::new(name, FieldType::Nullable(ty))
    }

    pub fn structure(name: &str, fields: Vec<Field>) -> Result<Self, SchemaError> {
        Field::new(name, FieldType::Struct(StructType::new(fields)?))
    }

    pub fn optional(name: &str, fields: Vec<Field>) -> Result<Self, SchemaError> {
        Field::new(name, FieldType::OptionalStruct(StructType::new(fields)?))
    }

    pub fn array(name: &str, element: FieldType, len: usize) -> Result<Self, SchemaError> {
        Field::new(name, FieldType::Array(ArrayType::new(Field::element(element)?, len)))
    }

    pub fn list(name: &str, element: FieldType, min_size: usize, max_size: usize) -> Result<Self, SchemaError> {
        Field::new(name, FieldType::List(ListType::new(Field::element(element)?, min_size, max_size)?))
    }

    scalar_ctors!(
        int8 => Int8, int16 => Int16, int32 => Int32, int64 => Int64,
        uint8 => UInt8, uint16 => UInt16, uint32 => UInt32, uint64 => UInt64,
        float => Float, double => Double,
    );

    pub fn half(name: &str) -> Result<Field, SchemaError> {
        Field::scalar(name, ScalarType::HalfFloat(Domain::half()))
    }

    pub fn boolean(name: &str) -> Result<Field, SchemaError> {
        Field::scalar(name, ScalarType::Bool)
    }

    pub fn string(name: &str, min_size: usize, max_size: usize) -> Result<Field, SchemaError> {
        Field::scalar(name, ScalarType::String(StringType::new(min_size, max_size, CharSet::default())?))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ty(&self) -> &FieldType {
        &self.ty
    }

    pub fn is_nullable(&self) -> bool {
        matches!(self.ty, FieldType::Nullable(_))
    }

    /// Direct children: struct members, or the single element field of an array or list.
    pub fn children(&self) -> &[Field] {
        match &self.ty {
            FieldType::Struct(s) | FieldType::OptionalStruct(s) => s.fields(),
            FieldType::Array(a) => std::slice::from_ref(a.element()),
            FieldType::List(l) => std::slice::from_ref(l.element()),
            FieldType::Scalar(_) | FieldType::Nullable(_) => &[],
        }
    }
}
