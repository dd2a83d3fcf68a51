pub mod config;
pub mod mqtt;
pub mod simulation;

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use color_eyre::{eyre::eyre, Result};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::config::SimulatorConfig;
use crate::mqtt::config::MqttConfig;
use crate::mqtt::mqtt_handler::MqttHandler;
use crate::simulation::engine::{SimulationSettings, Simulator};
use crate::simulation::generator::ValueGenerator;
use crate::simulation::payload::PayloadStyle;

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Publish synthetic device telemetry to an MQTT broker",
    long_about = None
)]
struct Cli {
    /// Device configuration file. Defaults to devices_configuration.yaml in the
    /// working directory, example/, or the user config directory
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Broker address, overrides `broker` from the configuration file
    #[arg(short, long, value_name = "HOST[:PORT]")]
    broker: Option<String>,

    /// Pause between publication passes in milliseconds
    #[arg(long)]
    interval_ms: Option<u64>,

    /// Stop after this many passes instead of running until interrupted
    #[arg(long)]
    cycles: Option<u64>,

    /// Seed for reproducible values
    #[arg(long)]
    seed: Option<u64>,

    /// MQTT client identifier
    #[arg(long)]
    client_id: Option<String>,

    /// Payload text style, overrides `payload_style` from the configuration file
    #[arg(long, value_enum)]
    payload_style: Option<PayloadStyle>,
}

#[tokio::main]
async fn main() -> Result<()> {
    setup()?;
    let cli = Cli::parse();

    let config_path = config::resolve_config_path(cli.config.clone());
    let sim_config = SimulatorConfig::load(&config_path)?;
    info!(
        "Loaded {} devices from {}",
        sim_config.devices.len(),
        config_path.display()
    );

    let mqtt_config = mqtt_config(&cli, &sim_config)?;
    let settings = simulation_settings(&cli, &sim_config)?;
    let mut simulator = Simulator::new(&sim_config, ValueGenerator::new(cli.seed), settings)?;
    info!(
        "{} channels publish every {:?}",
        simulator.targets().len(),
        settings.interval
    );

    let mut handler = MqttHandler::connect(mqtt_config);
    let shutdown = spawn_signal_listener();

    info!("Starting publication loop (press Ctrl-C to stop)...");
    let summary = simulator.run(&mut handler, shutdown).await;

    let before = handler.status();
    debug!(
        "Connection {:?}, last publish queued at {:?}",
        before.connection_state, before.last_activity
    );
    let status = handler.disconnect().await;
    info!(
        "Simulator stopped after {} passes: {} published, {} dropped, {} sent by client",
        summary.cycles, summary.published, summary.dropped, status.messages_sent
    );
    Ok(())
}

fn setup() -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info")
    }
    setup_logging_env();
    Ok(())
}

fn setup_logging_env() {
    FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_file(true)
        .with_line_number(true)
        .init();
}

fn spawn_signal_listener() -> CancellationToken {
    let shutdown = CancellationToken::new();
    let token = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Stopping simulator...");
                token.cancel();
            }
            Err(e) => error!("Unable to listen for shutdown signal: {}", e),
        }
    });
    shutdown
}

fn mqtt_config(cli: &Cli, sim_config: &SimulatorConfig) -> Result<MqttConfig> {
    let broker = cli.broker.as_deref().unwrap_or(&sim_config.broker);
    let mqtt_config = MqttConfig::from_broker(broker)?;
    Ok(match &cli.client_id {
        Some(client_id) => mqtt_config.with_client_id(client_id.clone()),
        None => mqtt_config,
    })
}

fn simulation_settings(cli: &Cli, sim_config: &SimulatorConfig) -> Result<SimulationSettings> {
    let interval_ms = cli
        .interval_ms
        .unwrap_or_else(|| sim_config.publish_interval_ms());
    if interval_ms == 0 {
        return Err(eyre!("publish interval must be greater than zero"));
    }
    if cli.cycles == Some(0) {
        return Err(eyre!("cycles must be greater than zero"));
    }

    Ok(SimulationSettings {
        interval: Duration::from_millis(interval_ms),
        cycles: cli.cycles,
        style: cli
            .payload_style
            .or(sim_config.payload_style)
            .unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_cli() -> Cli {
        Cli {
            config: None,
            broker: None,
            interval_ms: None,
            cycles: None,
            seed: None,
            client_id: None,
            payload_style: None,
        }
    }

    fn file_config() -> SimulatorConfig {
        serde_yaml::from_str(
            r#"
broker: broker.lan:1884
publish_interval_ms: 250
payload_style: json
devices: []
"#,
        )
        .unwrap()
    }

    #[test]
    fn cli_parses_flags() {
        let cli = Cli::try_parse_from([
            "mqtt-device-sim",
            "--config",
            "devices.yaml",
            "--broker",
            "10.0.0.2",
            "--cycles",
            "3",
            "--payload-style",
            "json",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("devices.yaml")));
        assert_eq!(cli.broker.as_deref(), Some("10.0.0.2"));
        assert_eq!(cli.cycles, Some(3));
        assert_eq!(cli.payload_style, Some(PayloadStyle::Json));
    }

    #[test]
    fn file_values_apply_without_flags() {
        let cli = base_cli();
        let config = file_config();
        let settings = simulation_settings(&cli, &config).unwrap();
        assert_eq!(settings.interval, Duration::from_millis(250));
        assert_eq!(settings.style, PayloadStyle::Json);
        assert_eq!(settings.cycles, None);

        let mqtt = mqtt_config(&cli, &config).unwrap();
        assert_eq!(mqtt.address(), "broker.lan:1884");
    }

    #[test]
    fn flags_override_file_values() {
        let mut cli = base_cli();
        cli.broker = Some("localhost".into());
        cli.client_id = Some("bench".into());
        cli.interval_ms = Some(1000);
        cli.payload_style = Some(PayloadStyle::Repr);
        let config = file_config();

        let settings = simulation_settings(&cli, &config).unwrap();
        assert_eq!(settings.interval, Duration::from_secs(1));
        assert_eq!(settings.style, PayloadStyle::Repr);

        let mqtt = mqtt_config(&cli, &config).unwrap();
        assert_eq!(mqtt.address(), "localhost:1883");
        assert_eq!(mqtt.client_id, "bench");
    }

    #[test]
    fn zero_interval_and_cycles_are_rejected() {
        let config = file_config();
        let mut cli = base_cli();
        cli.interval_ms = Some(0);
        assert!(simulation_settings(&cli, &config).is_err());

        let mut cli = base_cli();
        cli.cycles = Some(0);
        assert!(simulation_settings(&cli, &config).is_err());
    }

    #[test]
    fn default_interval_matches_half_second_cadence() {
        let config: SimulatorConfig = serde_yaml::from_str("devices: []").unwrap();
        let settings = simulation_settings(&base_cli(), &config).unwrap();
        assert_eq!(settings.interval, Duration::from_millis(500));
        assert_eq!(settings.style, PayloadStyle::Repr);
    }
}
