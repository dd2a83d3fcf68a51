//! # MQTT Integration Module
//!
//! Publishing side of the simulator. Configuration, message representation and
//! the broker session are kept apart:
//!
//! ```text
//! mqtt/
//! ├── config.rs           - Broker address parsing and client options
//! ├── message_manager.rs  - Outgoing message record
//! └── mqtt_handler.rs     - Session lifecycle, background event loop, publish
//! ```
//!
//! Delivery is fire-and-forget: messages go out at QoS 0, a publish that cannot
//! be queued is counted and reported, and nothing is retried.

pub mod config;
pub mod message_manager;
pub mod mqtt_handler;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MqttError {
    #[error("invalid broker address '{0}', expected host or host:port")]
    InvalidAddress(String),

    #[error("publish rejected by client: {0}")]
    Publish(#[from] rumqttc::ClientError),
}
