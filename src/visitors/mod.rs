//! Built-in visitors.
//!
//! | Visitor | Access | Effect |
//! |---------|--------|--------|
//! | [`SchemaFlattener`] | read | every visited field, in order |
//! | [`ValuePrinter`] | read | one-line text dump |
//! | [`UniformRandomizer`] | write | uniform values within each domain |
//! | [`GridRandomizer`] | write | deterministic values from `(index, decimation)` |
//!
//! The binary serializer pair lives in [`crate::codec`].

mod flatten;
mod grid;
mod printer;
mod random;

pub use flatten::{flatten, SchemaFlattener};
pub use grid::GridRandomizer;
pub use printer::{print, ValuePrinter};
pub use random::{RandomizerConfig, UniformRandomizer, DEFAULT_SEED};

/// Linear interpolation that stays finite across the full `f64` range.
pub(crate) fn lerp(min: f64, max: f64, t: f64) -> f64 {
    min * (1.0 - t) + max * t
}
