use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::json;

use super::payload::{python_str_repr, PayloadFormat, PayloadStyle};
use super::SimulationError;
use crate::config::ChannelType;

pub const FLOAT_MIN: f64 = 0.0;
pub const FLOAT_MAX: f64 = 24.0;
pub const INTEGER_MIN: i64 = 0;
pub const INTEGER_MAX: i64 = 100;

/// Value types the generator can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Float,
    Integer,
    Boolean,
}

impl TryFrom<&ChannelType> for ValueKind {
    type Error = SimulationError;

    fn try_from(kind: &ChannelType) -> Result<Self, Self::Error> {
        match kind {
            ChannelType::Float => Ok(ValueKind::Float),
            ChannelType::Integer => Ok(ValueKind::Integer),
            ChannelType::Boolean => Ok(ValueKind::Boolean),
            ChannelType::Unsupported => Err(SimulationError::UnsupportedType),
        }
    }
}

/// A single generated scalar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SampleValue {
    Float(f64),
    Integer(i64),
    Boolean(bool),
}

impl SampleValue {
    /// Payload text when the value is published on its own.
    pub fn render(&self) -> String {
        match self {
            SampleValue::Float(value) => float_repr(*value),
            SampleValue::Integer(value) => value.to_string(),
            SampleValue::Boolean(value) => value.to_string(),
        }
    }

    // The boolean token is text, so it is quoted once it sits in a container.
    pub(crate) fn repr_in_container(&self) -> String {
        match self {
            SampleValue::Boolean(_) => python_str_repr(&self.render()),
            other => other.render(),
        }
    }

    pub(crate) fn to_json(&self) -> serde_json::Value {
        match self {
            SampleValue::Float(value) => json!(value),
            SampleValue::Integer(value) => json!(value),
            SampleValue::Boolean(value) => json!(value.to_string()),
        }
    }
}

fn float_repr(value: f64) -> String {
    let text = value.to_string();
    if value.is_finite() && !text.contains(['.', 'e', 'E']) {
        format!("{}.0", text)
    } else {
        text
    }
}

/// Random source for channel values.
#[derive(Debug)]
pub struct ValueGenerator {
    rng: StdRng,
}

impl ValueGenerator {
    /// Seeded generators repeat the same sequence; `None` draws from OS entropy.
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self { rng }
    }

    pub fn sample(&mut self, kind: ValueKind) -> SampleValue {
        match kind {
            ValueKind::Float => {
                let raw: f64 = self.rng.gen_range(FLOAT_MIN..=FLOAT_MAX);
                SampleValue::Float((raw * 100.0).round() / 100.0)
            }
            ValueKind::Integer => SampleValue::Integer(self.rng.gen_range(INTEGER_MIN..=INTEGER_MAX)),
            ValueKind::Boolean => SampleValue::Boolean(self.rng.gen_bool(0.5)),
        }
    }

    /// Draws a value and renders the final payload text.
    pub fn generate(
        &mut self,
        kind: ValueKind,
        format: Option<&PayloadFormat>,
        style: PayloadStyle,
    ) -> String {
        let value = self.sample(kind);
        match format {
            Some(format) => format.render(&value, style),
            None => value.render(),
        }
    }
}
