//! Publication loop.
//!
//! Publish targets are derived once from the configuration: one per channel
//! that declares a status suffix on a device with a base topic. Every pass
//! draws a fresh value for each target and hands the message to a
//! [`TelemetrySink`], then sleeps for the configured interval. The loop ends on
//! cancellation or after an optional number of passes.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::generator::{ValueGenerator, ValueKind};
use super::payload::{PayloadFormat, PayloadStyle};
use super::SimulationError;
use crate::config::SimulatorConfig;
use crate::mqtt::message_manager::MQTTMessage;

/// Destination for generated messages.
pub trait TelemetrySink {
    fn publish(&mut self, message: &MQTTMessage) -> Result<(), SimulationError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct PublishTarget {
    pub nickname: String,
    pub topic: String,
    pub kind: ValueKind,
    pub format: Option<PayloadFormat>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimulationSettings {
    pub interval: Duration,
    /// Stop after this many passes; `None` runs until cancelled
    pub cycles: Option<u64>,
    pub style: PayloadStyle,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub published: usize,
    pub dropped: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub cycles: u64,
    pub published: usize,
    pub dropped: usize,
}

pub struct Simulator {
    targets: Vec<PublishTarget>,
    generator: ValueGenerator,
    settings: SimulationSettings,
}

impl Simulator {
    pub fn new(
        config: &SimulatorConfig,
        generator: ValueGenerator,
        settings: SimulationSettings,
    ) -> Result<Self, SimulationError> {
        let targets = publish_targets(config)?;
        if targets.is_empty() {
            warn!("No channel declares a status_suffix, nothing will be published");
        }
        Ok(Self {
            targets,
            generator,
            settings,
        })
    }

    pub fn targets(&self) -> &[PublishTarget] {
        &self.targets
    }

    /// Publishes one value on every target.
    pub fn run_cycle<S: TelemetrySink>(&mut self, sink: &mut S) -> CycleReport {
        let mut report = CycleReport::default();
        for target in &self.targets {
            let payload =
                self.generator
                    .generate(target.kind, target.format.as_ref(), self.settings.style);
            let message = MQTTMessage::from_topic(target.topic.clone(), payload);
            match sink.publish(&message) {
                Ok(()) => {
                    info!(
                        "[{}] Published {} to {}",
                        target.nickname,
                        message.content(),
                        message.topic()
                    );
                    report.published += 1;
                }
                Err(e) => {
                    warn!("[{}] Dropped {}: {}", target.nickname, message, e);
                    report.dropped += 1;
                }
            }
        }
        debug!("{}", "-".repeat(30));
        report
    }

    /// Runs passes until `shutdown` fires or the cycle limit is reached. A pass
    /// in progress always completes.
    pub async fn run<S: TelemetrySink>(
        &mut self,
        sink: &mut S,
        shutdown: CancellationToken,
    ) -> RunSummary {
        let mut summary = RunSummary::default();
        while !shutdown.is_cancelled() {
            let report = self.run_cycle(sink);
            summary.cycles += 1;
            summary.published += report.published;
            summary.dropped += report.dropped;

            if self
                .settings
                .cycles
                .is_some_and(|limit| summary.cycles >= limit)
            {
                break;
            }

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.settings.interval) => {}
            }
        }
        summary
    }
}

fn publish_targets(config: &SimulatorConfig) -> Result<Vec<PublishTarget>, SimulationError> {
    let mut targets = Vec::new();
    for device in &config.devices {
        for channel in &device.channels {
            let Some(topic) = device.topic_for(channel) else {
                continue;
            };
            let kind = ValueKind::try_from(&channel.kind).map_err(|_| {
                SimulationError::UnsupportedChannel {
                    device: device.nickname.clone(),
                    suffix: channel.status_suffix.clone().unwrap_or_default(),
                }
            })?;
            targets.push(PublishTarget {
                nickname: device.nickname.clone(),
                topic,
                kind,
                format: channel.payload_format.clone(),
            });
        }
    }
    Ok(targets)
}
