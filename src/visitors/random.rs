//! Uniform randomizer: fills a value tree with values drawn uniformly from each field's domain.

use super::lerp;
use crate::codec::round_to_half;
use crate::field::{ArrayType, Field, ListType, ScalarType, StringType, StructType};
use crate::value::Value;
use crate::visit::{Access, Composite, ValueSlot, VisitError, Visitor, VisitorBase};
use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Seed used by [`UniformRandomizer::default`].
pub const DEFAULT_SEED: u64 = 0x5eed;

const NANOS_PER_SEC: u32 = 1_000_000_000;
const SECS_PER_DAY: u32 = 86_400;

/// Knobs of the uniform randomizer. Field domains bound numbers and strings; these bound
/// everything the schema leaves open.
#[derive(Debug, Clone, PartialEq)]
pub struct RandomizerConfig {
    /// Probability that a nullable scalar or optional struct is present.
    pub presence_probability: f64,
    /// First date generated for `datetime` and `date` fields.
    pub date_from: NaiveDate,
    /// Dates are strictly before this one.
    pub date_until: NaiveDate,
    pub span_min: TimeDelta,
    pub span_max: TimeDelta,
}

impl Default for RandomizerConfig {
    fn default() -> Self {
        RandomizerConfig {
            presence_probability: 0.5,
            date_from: NaiveDate::default(),
            date_until: NaiveDate::from_ymd_opt(2100, 1, 1).unwrap_or(NaiveDate::MAX),
            span_min: -TimeDelta::days(1),
            span_max: TimeDelta::days(1),
        }
    }
}

impl RandomizerConfig {
    pub fn validate(&self) -> Result<(), VisitError> {
        if !(0.0..=1.0).contains(&self.presence_probability) {
            return Err(VisitError::InvalidConfig(format!(
                "presence probability {} not in [0, 1]",
                self.presence_probability
            )));
        }
        if self.date_from >= self.date_until {
            return Err(VisitError::InvalidConfig(format!(
                "empty date range {}..{}",
                self.date_from, self.date_until
            )));
        }
        if self.span_min > self.span_max {
            return Err(VisitError::InvalidConfig(format!(
                "empty time span range {}..={}",
                self.span_min, self.span_max
            )));
        }
        if self.span_min.num_nanoseconds().is_none() || self.span_max.num_nanoseconds().is_none() {
            return Err(VisitError::InvalidConfig("time span bounds exceed i64 nanoseconds".to_string()));
        }
        Ok(())
    }
}

/// Fills every scalar uniformly within its declared domain.
///
/// Seeded construction is reproducible: two randomizers built with the same seed and config
/// produce the same values for the same schema.
pub struct UniformRandomizer<'s> {
    base: VisitorBase<'s>,
    rng: StdRng,
    config: RandomizerConfig,
}

impl<'s> UniformRandomizer<'s> {
    pub fn new(seed: u64) -> Self {
        UniformRandomizer {
            base: VisitorBase::default(),
            rng: StdRng::seed_from_u64(seed),
            config: RandomizerConfig::default(),
        }
    }

    pub fn with_config(seed: u64, config: RandomizerConfig) -> Result<Self, VisitError> {
        config.validate()?;
        Ok(UniformRandomizer { base: VisitorBase::default(), rng: StdRng::seed_from_u64(seed), config })
    }

    /// Seeded from OS entropy; not reproducible.
    pub fn from_entropy() -> Self {
        UniformRandomizer {
            base: VisitorBase::default(),
            rng: StdRng::from_entropy(),
            config: RandomizerConfig::default(),
        }
    }

    pub fn config(&self) -> &RandomizerConfig {
        &self.config
    }

    fn present(&mut self) -> bool {
        self.rng.gen_bool(self.config.presence_probability)
    }

    fn string(&mut self, ty: &StringType) -> String {
        let len = self.rng.gen_range(ty.min_size()..=ty.max_size());
        let chars = ty.allowed().chars();
        (0..len).map(|_| chars[self.rng.gen_range(0..chars.len())]).collect()
    }

    fn date(&mut self) -> NaiveDate {
        let from = self.config.date_from.num_days_from_ce();
        let until = self.config.date_until.num_days_from_ce();
        NaiveDate::from_num_days_from_ce_opt(self.rng.gen_range(from..until)).unwrap_or(self.config.date_from)
    }

    fn time(&mut self) -> NaiveTime {
        let secs = self.rng.gen_range(0..SECS_PER_DAY);
        let nanos = self.rng.gen_range(0..NANOS_PER_SEC);
        NaiveTime::from_num_seconds_from_midnight_opt(secs, nanos).unwrap_or(NaiveTime::MIN)
    }

    fn scalar(&mut self, ty: &ScalarType) -> Value {
        match ty {
            ScalarType::Int8(d) => Value::Int8(self.rng.gen_range(d.min()..=d.max())),
            ScalarType::Int16(d) => Value::Int16(self.rng.gen_range(d.min()..=d.max())),
            ScalarType::Int32(d) => Value::Int32(self.rng.gen_range(d.min()..=d.max())),
            ScalarType::Int64(d) => Value::Int64(self.rng.gen_range(d.min()..=d.max())),
            ScalarType::UInt8(d) => Value::UInt8(self.rng.gen_range(d.min()..=d.max())),
            ScalarType::UInt16(d) => Value::UInt16(self.rng.gen_range(d.min()..=d.max())),
            ScalarType::UInt32(d) => Value::UInt32(self.rng.gen_range(d.min()..=d.max())),
            ScalarType::UInt64(d) => Value::UInt64(self.rng.gen_range(d.min()..=d.max())),
            ScalarType::Float(d) => {
                let x = lerp(d.min() as f64, d.max() as f64, self.rng.gen()) as f32;
                Value::Float(x.clamp(d.min(), d.max()))
            }
            ScalarType::Double(d) => Value::Double(lerp(d.min(), d.max(), self.rng.gen()).clamp(d.min(), d.max())),
            ScalarType::HalfFloat(d) => {
                let x = lerp(d.min() as f64, d.max() as f64, self.rng.gen()) as f32;
                Value::HalfFloat(round_to_half(x.clamp(d.min(), d.max())))
            }
            ScalarType::Bool => Value::Bool(self.rng.gen_bool(0.5)),
            ScalarType::Char(set) => Value::Char(set.chars()[self.rng.gen_range(0..set.len())]),
            ScalarType::String(st) => Value::String(self.string(st)),
            ScalarType::DateTime => {
                let date = self.date();
                let time = self.time();
                Value::DateTime(NaiveDateTime::new(date, time))
            }
            ScalarType::DateOnly => Value::Date(self.date()),
            ScalarType::TimeOnly => Value::Time(self.time()),
            ScalarType::TimeSpan => {
                let lo = self.config.span_min.num_nanoseconds().unwrap_or(0);
                let hi = self.config.span_max.num_nanoseconds().unwrap_or(0);
                Value::TimeSpan(TimeDelta::nanoseconds(self.rng.gen_range(lo..=hi)))
            }
        }
    }
}

impl Default for UniformRandomizer<'_> {
    fn default() -> Self {
        Self::new(DEFAULT_SEED)
    }
}

impl<'s> Visitor<'s> for UniformRandomizer<'s> {
    fn access(&self) -> Access {
        Access::Write
    }

    fn visit(&mut self, field: &'s Field, ty: &'s ScalarType, slot: &mut ValueSlot<'_>) -> Result<(), VisitError> {
        let value = if field.is_nullable() && !self.present() { Value::Null } else { self.scalar(ty) };
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
        Ok(self.rng.gen_range(ty.min_size()..=ty.max_size()))
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
