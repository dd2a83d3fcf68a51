use std::time::Duration;

use chrono::{DateTime, Local};
use rumqttc::{AsyncClient, Event, EventLoop, Outgoing, Packet, QoS};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::config::MqttConfig;
use super::message_manager::MQTTMessage;
use super::MqttError;
use crate::simulation::engine::TelemetrySink;
use crate::simulation::SimulationError;

const RECONNECT_BACKOFF: Duration = Duration::from_secs(1);
const DISCONNECT_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Failed,
}

#[derive(Clone, Debug, Default)]
pub struct MQTTStatus {
    pub connection_state: ConnectionState,
    pub messages_sent: usize,
    pub messages_dropped: usize,
    pub last_activity: Option<DateTime<Local>>,
}

/// Broker session used by the publish loop.
///
/// The rumqttc event loop runs on its own task and owns the socket. The
/// handler only enqueues requests, so a publish never waits on the network:
/// it is accepted into the request queue or reported as dropped.
pub struct MqttHandler {
    status: MQTTStatus,
    client: AsyncClient,
    state_rx: watch::Receiver<ConnectionState>,
    event_task: JoinHandle<()>,
    config: MqttConfig,
}

impl MqttHandler {
    /// Starts the session. Must be called from within a tokio runtime.
    pub fn connect(config: MqttConfig) -> Self {
        info!("Connecting to broker at {}...", config.address());
        let (client, eventloop) = AsyncClient::new(config.options(), config.request_capacity);
        let (state_tx, state_rx) = watch::channel(ConnectionState::Connecting);
        let event_task = tokio::spawn(drive_event_loop(eventloop, state_tx, config.address()));

        MqttHandler {
            status: MQTTStatus {
                connection_state: ConnectionState::Connecting,
                ..MQTTStatus::default()
            },
            client,
            state_rx,
            event_task,
            config,
        }
    }

    pub fn status(&self) -> MQTTStatus {
        MQTTStatus {
            connection_state: *self.state_rx.borrow(),
            ..self.status.clone()
        }
    }

    /// Queues a QoS 0 publish without waiting for the network.
    pub fn publish(&mut self, message: &MQTTMessage) -> Result<(), MqttError> {
        match self.client.try_publish(
            message.topic(),
            QoS::AtMostOnce,
            false,
            message.content().as_bytes().to_vec(),
        ) {
            Ok(()) => {
                self.status.messages_sent += 1;
                self.status.last_activity = Some(Local::now());
                debug!("Queued publish at {}", message.timestamp());
                Ok(())
            }
            Err(e) => {
                self.status.messages_dropped += 1;
                Err(MqttError::Publish(e))
            }
        }
    }

    /// Sends DISCONNECT and waits briefly for the event loop to flush it.
    pub async fn disconnect(mut self) -> MQTTStatus {
        if let Err(e) = self.client.try_disconnect() {
            warn!("Failed to queue disconnect: {}", e);
        }
        match tokio::time::timeout(DISCONNECT_TIMEOUT, &mut self.event_task).await {
            Ok(Ok(())) => debug!("MQTT event loop finished"),
            Ok(Err(e)) => warn!("MQTT event loop task failed: {}", e),
            Err(_) => {
                warn!(
                    "Broker at {} did not acknowledge disconnect in time",
                    self.config.address()
                );
                self.event_task.abort();
            }
        }
        self.status.connection_state = ConnectionState::Disconnected;
        self.status
    }
}

impl TelemetrySink for MqttHandler {
    fn publish(&mut self, message: &MQTTMessage) -> Result<(), SimulationError> {
        MqttHandler::publish(self, message).map_err(SimulationError::from)
    }
}

async fn drive_event_loop(
    mut eventloop: EventLoop,
    state_tx: watch::Sender<ConnectionState>,
    address: String,
) {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                info!("Connected to MQTT broker at {} ({:?})", address, ack.code);
                state_tx.send_replace(ConnectionState::Connected);
            }
            Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                debug!("Disconnect sent to {}", address);
                state_tx.send_replace(ConnectionState::Disconnected);
                break;
            }
            Ok(_) => {}
            Err(e) => {
                warn!("MQTT connection to {} failed: {}", address, e);
                state_tx.send_replace(ConnectionState::Failed);
                tokio::time::sleep(RECONNECT_BACKOFF).await;
            }
        }
    }
}
