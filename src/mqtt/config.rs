use rumqttc::MqttOptions;
use std::time::Duration;

use super::MqttError;

pub const DEFAULT_PORT: u16 = 1883;
const DEFAULT_KEEP_ALIVE_SECS: u64 = 60;
const DEFAULT_REQUEST_CAPACITY: usize = 100;

#[derive(Debug, Clone, PartialEq)]
pub struct MqttConfig {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub keep_alive: Duration,
    /// Outgoing requests buffered between the publish loop and the event loop
    pub request_capacity: usize,
}

impl MqttConfig {
    /// Builds connection settings from a `host` or `host:port` broker string.
    pub fn from_broker(broker: &str) -> Result<Self, MqttError> {
        let mut server_comps = broker.trim().split(':');
        let host = server_comps.next().unwrap_or_default().trim();
        if host.is_empty() {
            return Err(MqttError::InvalidAddress(broker.to_string()));
        }
        let port = match server_comps.next() {
            Some(port) => port
                .trim()
                .parse()
                .map_err(|_| MqttError::InvalidAddress(broker.to_string()))?,
            None => DEFAULT_PORT,
        };
        if server_comps.next().is_some() {
            return Err(MqttError::InvalidAddress(broker.to_string()));
        }

        Ok(Self {
            host: host.to_string(),
            port,
            client_id: format!("mqtt-device-sim-{}", std::process::id()),
            keep_alive: Duration::from_secs(DEFAULT_KEEP_ALIVE_SECS),
            request_capacity: DEFAULT_REQUEST_CAPACITY,
        })
    }

    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = client_id.into();
        self
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn options(&self) -> MqttOptions {
        let mut mqtt_options = MqttOptions::new(self.client_id.clone(), self.host.clone(), self.port);
        mqtt_options
            .set_keep_alive(self.keep_alive)
            .set_clean_session(true);
        mqtt_options
    }
}
