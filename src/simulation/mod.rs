//! Synthetic telemetry: value generation, payload wrapping and the publish loop.

pub mod engine;
pub mod generator;
pub mod payload;

use thiserror::Error;

use crate::mqtt::MqttError;

#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("channel type must be float, integer or boolean")]
    UnsupportedType,

    #[error("device '{device}' publishes '{suffix}' with an unsupported channel type")]
    UnsupportedChannel { device: String, suffix: String },

    #[error(transparent)]
    Publish(#[from] MqttError),
}
