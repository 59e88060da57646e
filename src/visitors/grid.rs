//! Grid-stepping randomizer: deterministic values selected by `(index, decimation)`.
//!
//! | Field | Value for `index` |
//! |-------|-------------------|
//! | float, double, half | point `index % decimation` of `decimation` evenly spaced points over `[min, max]` |
//! | integers | `min + index % (max - min + 1)` |
//! | bool | `index` odd |
//! | char | `allowed[index % len]` |
//! | string | length `min + index % (max - min + 1)`, char `i` is `allowed[(index + i) % len]` |
//! | nullable, optional struct | present when `index` is even |
//! | list | `min + index % (max - min)`, or `min` when the bounds are equal |
//! | temporal | 2000-01-01T00:00:00 advanced by `index` seconds (days for dates) |
//!
//! The same `(schema, index, decimation)` always yields the same value, and therefore the same
//! serialized bytes, which makes the output usable as golden data.

use super::lerp;
use crate::codec::round_to_half;
use crate::field::{ArrayType, Domain, Field, ListType, Numeric, ScalarType, StructType};
use crate::value::Value;
use crate::visit::{Access, Composite, ValueSlot, VisitError, Visitor, VisitorBase};
use chrono::{Days, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};

const SECS_PER_DAY: u64 = 86_400;
/// Temporal offsets wrap after this many days so every index maps to a valid date.
const DAYS_WRAP: u64 = 36_525;

fn step_int<T>(domain: &Domain<T>, index: u64) -> T
where
    T: Numeric + Into<i128> + TryFrom<i128>,
{
    let min: i128 = domain.min().into();
    let max: i128 = domain.max().into();
    let span = max - min + 1;
    T::try_from(min + (index as i128) % span).unwrap_or(domain.min())
}

pub struct GridRandomizer<'s> {
    base: VisitorBase<'s>,
    index: u64,
    decimation: u64,
    epoch: NaiveDateTime,
}

impl<'s> GridRandomizer<'s> {
    /// `decimation` is the number of grid points across each floating domain; it must be
    /// non-zero.
    pub fn new(index: u64, decimation: u64) -> Result<Self, VisitError> {
        if decimation == 0 {
            return Err(VisitError::InvalidConfig("decimation must be at least 1".to_string()));
        }
        let epoch = NaiveDate::from_ymd_opt(2000, 1, 1)
            .map(|d| NaiveDateTime::new(d, NaiveTime::MIN))
            .ok_or_else(|| VisitError::InvalidConfig("grid epoch out of range".to_string()))?;
        Ok(GridRandomizer { base: VisitorBase::default(), index, decimation, epoch })
    }

    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn decimation(&self) -> u64 {
        self.decimation
    }

    fn present(&self) -> bool {
        self.index % 2 == 0
    }

    /// Grid point of `[min, max]` selected by the index; both ends are hit exactly.
    fn point(&self, min: f64, max: f64) -> f64 {
        let k = self.index % self.decimation;
        if self.decimation == 1 || k == 0 {
            min
        } else if k == self.decimation - 1 {
            max
        } else {
            lerp(min, max, k as f64 / (self.decimation - 1) as f64)
        }
    }

    fn pick<T: Copy>(&self, items: &[T], offset: usize) -> T {
        items[(self.index as usize).wrapping_add(offset) % items.len()]
    }

    fn temporal_error(&self, field: &Field) -> VisitError {
        VisitError::Domain { field: field.name().to_string(), reason: format!("index {} overflows", self.index) }
    }

    fn scalar(&self, field: &Field, ty: &ScalarType) -> Result<Value, VisitError> {
        let index = self.index;
        Ok(match ty {
            ScalarType::Int8(d) => Value::Int8(step_int(d, index)),
            ScalarType::Int16(d) => Value::Int16(step_int(d, index)),
            ScalarType::Int32(d) => Value::Int32(step_int(d, index)),
            ScalarType::Int64(d) => Value::Int64(step_int(d, index)),
            ScalarType::UInt8(d) => Value::UInt8(step_int(d, index)),
            ScalarType::UInt16(d) => Value::UInt16(step_int(d, index)),
            ScalarType::UInt32(d) => Value::UInt32(step_int(d, index)),
            ScalarType::UInt64(d) => Value::UInt64(step_int(d, index)),
            ScalarType::Float(d) => Value::Float((self.point(d.min() as f64, d.max() as f64) as f32).clamp(d.min(), d.max())),
            ScalarType::Double(d) => Value::Double(self.point(d.min(), d.max()).clamp(d.min(), d.max())),
            ScalarType::HalfFloat(d) => {
                let x = (self.point(d.min() as f64, d.max() as f64) as f32).clamp(d.min(), d.max());
                Value::HalfFloat(round_to_half(x))
            }
            ScalarType::Bool => Value::Bool(index % 2 == 1),
            ScalarType::Char(set) => Value::Char(self.pick(set.chars(), 0)),
            ScalarType::String(st) => {
                let span = ((st.max_size() - st.min_size()) as u64).saturating_add(1);
                let len = st.min_size() + (index % span) as usize;
                Value::String((0..len).map(|i| self.pick(st.allowed().chars(), i)).collect())
            }
            ScalarType::DateTime => {
                let secs = index % (DAYS_WRAP * SECS_PER_DAY);
                let t = TimeDelta::try_seconds(secs as i64)
                    .and_then(|d| self.epoch.checked_add_signed(d))
                    .ok_or_else(|| self.temporal_error(field))?;
                Value::DateTime(t)
            }
            ScalarType::DateOnly => {
                let d = self.epoch.date().checked_add_days(Days::new(index % DAYS_WRAP));
                Value::Date(d.ok_or_else(|| self.temporal_error(field))?)
            }
            ScalarType::TimeOnly => {
                let t = NaiveTime::from_num_seconds_from_midnight_opt((index % SECS_PER_DAY) as u32, 0);
                Value::Time(t.ok_or_else(|| self.temporal_error(field))?)
            }
            ScalarType::TimeSpan => {
                let d = TimeDelta::try_seconds((index % SECS_PER_DAY) as i64);
                Value::TimeSpan(d.ok_or_else(|| self.temporal_error(field))?)
            }
        })
    }
}

impl<'s> Visitor<'s> for GridRandomizer<'s> {
    fn access(&self) -> Access {
        Access::Write
    }

    fn visit(&mut self, field: &'s Field, ty: &'s ScalarType, slot: &mut ValueSlot<'_>) -> Result<(), VisitError> {
        let value = if field.is_nullable() && !self.present() { Value::Null } else { self.scalar(field, ty)? };
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
        self.base.open(Composite::List, field);
        let span = (ty.max_size() - ty.min_size()) as u64;
        if span == 0 {
            return Ok(ty.min_size());
        }
        Ok(ty.min_size() + (self.index % span) as usize)
    }

    fn end_list(&mut self, field: &'s Field) -> Result<(), VisitError> {
        self.base.close(Composite::List, field)
    }

    fn begin_optional_struct(&mut self, field: &'s Field, _ty: &'s StructType, _present: bool) -> Result<bool, VisitError> {
        self.base.open(Composite::OptionalStruct, field);
        Ok(self.present())
    }

    fn end_optional_struct(&mut self, field: &'s Field) -> Result<(), VisitError> {
        self.base.close(Composite::OptionalStruct, field)
    }

    fn finish(&mut self) -> Result<(), VisitError> {
        self.base.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::{CharSet, FieldType, StringType};
    use crate::visit::walk_mut;

    fn fill(schema: &Field, index: u64, decimation: u64) -> Value {
        let mut value = Value::Null;
        walk_mut(schema, &mut value, &mut GridRandomizer::new(index, decimation).unwrap()).unwrap();
        value
    }

    #[test]
    fn zero_decimation_rejected() {
        assert!(matches!(GridRandomizer::new(0, 0), Err(VisitError::InvalidConfig(_))));
    }

    #[test]
    fn integers_wrap_over_domain() {
        let f = Field::scalar("n", ScalarType::Int8(Domain::new(-2, 1).unwrap())).unwrap();
        let got: Vec<Value> = (0..6).map(|i| fill(&f, i, 1)).collect();
        let want: Vec<Value> = [-2, -1, 0, 1, -2, -1].into_iter().map(Value::Int8).collect();
        assert_eq!(got, want);
        assert_eq!(fill(&Field::uint64("u").unwrap(), u64::MAX, 1), Value::UInt64(u64::MAX));
    }

    #[test]
    fn rotating_string_window() {
        let set = CharSet::new("abc".chars()).unwrap();
        let f = Field::scalar("s", ScalarType::String(StringType::new(2, 3, set).unwrap())).unwrap();
        assert_eq!(fill(&f, 0, 1), Value::String("ab".to_string()));
        assert_eq!(fill(&f, 1, 1), Value::String("bca".to_string()));
        assert_eq!(fill(&f, 2, 1), Value::String("ca".to_string()));
    }

    #[test]
    fn unbounded_string_size_does_not_overflow() {
        let set = CharSet::new("abc".chars()).unwrap();
        let f = Field::scalar("s", ScalarType::String(StringType::new(0, usize::MAX, set).unwrap())).unwrap();
        assert_eq!(fill(&f, 3, 1), Value::String("abc".to_string()));
    }

    #[test]
    fn presence_alternates() {
        let f = Field::structure(
            "root",
            vec![Field::nullable("n", ScalarType::Bool).unwrap(), Field::optional("o", vec![]).unwrap()],
        )
        .unwrap();
        assert_eq!(
            fill(&f, 0, 1),
            Value::Struct(vec![Value::Bool(false), Value::Optional(Some(Box::new(Value::Struct(vec![]))))])
        );
        assert_eq!(fill(&f, 1, 1), Value::Struct(vec![Value::Null, Value::Optional(None)]));
    }

    #[test]
    fn list_sizes() {
        let f = Field::list("l", FieldType::Scalar(ScalarType::Bool), 1, 3).unwrap();
        let sizes: Vec<usize> = (0..4).map(|i| fill(&f, i, 1).as_list().unwrap().len()).collect();
        assert_eq!(sizes, vec![1, 2, 1, 2]);
        let fixed = Field::list("l", FieldType::Scalar(ScalarType::Bool), 2, 2).unwrap();
        assert_eq!(fill(&fixed, 5, 1).as_list().unwrap().len(), 2);
    }

    #[test]
    fn temporal_from_epoch() {
        let f = Field::scalar("t", ScalarType::DateTime).unwrap();
        let want = NaiveDate::from_ymd_opt(2000, 1, 1).unwrap().and_hms_opt(0, 1, 1).unwrap();
        assert_eq!(fill(&f, 61, 1), Value::DateTime(want));
        let f = Field::scalar("d", ScalarType::DateOnly).unwrap();
        assert_eq!(fill(&f, 31, 1), Value::Date(NaiveDate::from_ymd_opt(2000, 2, 1).unwrap()));
    }
}
