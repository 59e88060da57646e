//! # fieldpack: fixed-point bit packing and schema visitors
//!
//! Two pieces that work together to pack and traverse structured binary messages:
//!
//! - a bit-cursor codec for signed fixed-point values of 3..32 bits at arbitrary bit offsets,
//!   with NaN/±Infinity sentinel codes, saturation, and a bounded variant that rejects
//!   out-of-range values;
//! - a closed schema model ([`Field`], [`FieldType`]) walked by a visitor protocol, so that
//!   serializing, printing and randomizing are independent visitors over the same tree.
//!
//! ## Bit codec
//!
//! - `FixedPoint<N>` with aliases `Bits3`..`Bits32`
//! - `encode`/`decode` (`physical = code * fraction + offset`), saturating to ±Infinity
//! - `encode_bounded`/`decode_bounded`, failing with [`BitError::OutOfRange`]
//!
//! ## Field types
//!
//! - Numeric: `int8`..`int64`, `uint8`..`uint64`, `float`, `double`, `half`, each with a domain
//! - `bool`, `char`, `string`, `datetime`, `date`, `time`, `timespan`, plus nullable variants
//! - Containers: fixed arrays, bounded lists, structs, optional structs
//!
//! ## Visitors
//!
//! - [`SchemaFlattener`], [`ValuePrinter`]: read
//! - [`UniformRandomizer`], [`GridRandomizer`]: write
//! - [`BinaryWriter`], [`BinaryReader`]: byte-aligned little-endian serialization
//!
//! ## Example schema
//!
//! ```text
//! struct Track {
//!   id: uint32;
//!   speed: double [0..400];
//!   alt: int16? [-1000..5000];
//!   waypoints: list<Point>(0..4);
//! }
//! struct Point { x: float [-1..1]; y: float [-1..1]; }
//! ```
//!
//! ## Usage
//!
//! See `tests/integration.rs` for randomize → serialize → deserialize round trips.

pub mod bits;
pub mod codec;
pub mod field;
pub mod parser;
pub mod value;
pub mod visit;
pub mod visitors;

pub use bits::{BitError, FixedPoint};
pub use codec::{deserialize, serialize, BinaryReader, BinaryWriter};
pub use field::{
    ArrayType, CharSet, Domain, Field, FieldType, ListType, ScalarType, SchemaError, StringType, StructType,
};
pub use parser::parse_schema;
pub use value::Value;
pub use visit::{
    walk, walk_mut, Access, Composite, FallbackPolicy, Record, ValueSlot, VisitError, Visitable, Visitor,
    VisitorBase,
};
pub use visitors::{
    flatten, print, GridRandomizer, RandomizerConfig, SchemaFlattener, UniformRandomizer, ValuePrinter,
};
