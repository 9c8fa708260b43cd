use crate::mqtt::client::{qos_from_level, MqttSettings};
use crate::utils::address_map::{AddressMap, MapError};
use clap::{Parser, ValueEnum};
use log::warn;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::filter::LevelFilter;

#[derive(ValueEnum, Debug, Copy, Clone, PartialEq, Eq)]
pub enum ConnectionMode {
    Serial,
    Telnet,
}

#[derive(ValueEnum, Debug, Copy, Clone, PartialEq, Eq)]
pub enum Verbosity {
    Error,
    Warn,
    Info,
    Debug,
}

impl Verbosity {
    pub fn level_filter(self) -> LevelFilter {
        match self {
            Verbosity::Error => LevelFilter::ERROR,
            Verbosity::Warn => LevelFilter::WARN,
            Verbosity::Info => LevelFilter::INFO,
            Verbosity::Debug => LevelFilter::DEBUG,
        }
    }
}

#[derive(Parser, Debug, Clone)]
/// Bridge FS20 dimmers to MQTT through a CUL
#[command(version)]
pub struct CmdArgs {
    /// Instance name, used as topic prefix and client id
    #[arg(short = 'n', long, default_value = "fs20dimmer")]
    pub name: String,
    /// Broker URL
    #[arg(short = 'm', long, default_value = "mqtt://127.0.0.1")]
    pub mqtt_url: String,
    #[arg(short = 'u', long)]
    pub mqtt_username: Option<String>,
    #[arg(short = 'p', long)]
    pub mqtt_password: Option<String>,
    /// Don't set the retain flag on status messages
    #[arg(short = 'r', long)]
    pub mqtt_no_retain: bool,
    #[arg(short = 'q', long, default_value_t = 0,
          value_parser = clap::value_parser!(u8).range(0..=2))]
    pub mqtt_qos: u8,
    #[arg(short = 'c', long, value_enum, default_value = "serial")]
    pub cul_connection_mode: ConnectionMode,
    #[arg(long)]
    pub cul_serialport: Option<String>,
    #[arg(long)]
    pub cul_baudrate: Option<u32>,
    /// The dongle is a COC
    #[arg(long)]
    pub cul_coc: bool,
    /// The dongle is a SCC
    #[arg(long)]
    pub cul_scc: bool,
    /// Host for telnet mode
    #[arg(long)]
    pub cul_host: Option<String>,
    /// Port for telnet mode
    #[arg(long, default_value_t = 2323)]
    pub cul_port: u16,
    /// Disable TCP keep-alive in telnet mode
    #[arg(long)]
    pub cul_no_network_timeout: bool,
    /// JSON file mapping FS20 addresses to names
    #[arg(long)]
    pub fs20_map: Option<PathBuf>,
    /// Publish status as JSON
    #[arg(short = 's', long)]
    pub json_values: bool,
    /// Seconds without traffic from the CUL before probing it, 0 disables
    #[arg(short = 'w', long, default_value_t = 0)]
    pub watchdog: u64,
    #[arg(short = 'v', long, value_enum, default_value = "info")]
    pub verbosity: Verbosity,
}

#[derive(Debug, PartialEq)]
pub enum ConfigError {
    MissingHost,
    InvalidQos(u8),
}

impl std::error::Error for ConfigError {}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::MissingHost => write!(f, "Telnet mode requires --cul-host"),
            ConfigError::InvalidQos(q) => write!(f, "Invalid QoS {}", q),
        }
    }
}

/// Settings for the whole bridge, fixed at start-up
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub name: String,
    pub mqtt: MqttSettings,
    pub retain: bool,
    pub json_values: bool,
    pub watchdog: Duration,
    pub map_file: Option<PathBuf>,
    pub cul_driver: String,
    pub cul_params: HashMap<String, String>,
}

impl BridgeConfig {
    pub fn from_args(args: &CmdArgs) -> Result<BridgeConfig, ConfigError> {
        let qos = qos_from_level(args.mqtt_qos).ok_or(ConfigError::InvalidQos(args.mqtt_qos))?;
        let mut params = HashMap::new();
        let driver = match args.cul_connection_mode {
            ConnectionMode::Serial => {
                if let Some(port) = &args.cul_serialport {
                    params.insert("port".to_string(), port.clone());
                }
                if let Some(baud) = args.cul_baudrate {
                    params.insert("baud_rate".to_string(), baud.to_string());
                }
                params.insert("coc".to_string(), args.cul_coc.to_string());
                params.insert("scc".to_string(), args.cul_scc.to_string());
                "SERIAL"
            }
            ConnectionMode::Telnet => {
                let host = args.cul_host.as_ref().ok_or(ConfigError::MissingHost)?;
                params.insert("host".to_string(), host.clone());
                params.insert("port".to_string(), args.cul_port.to_string());
                params.insert(
                    "network_timeout".to_string(),
                    (!args.cul_no_network_timeout).to_string(),
                );
                "TELNET"
            }
        };
        Ok(BridgeConfig {
            name: args.name.clone(),
            mqtt: MqttSettings {
                base: args.name.clone(),
                url: args.mqtt_url.clone(),
                username: args.mqtt_username.clone(),
                password: args.mqtt_password.clone(),
                qos,
            },
            retain: !args.mqtt_no_retain,
            json_values: args.json_values,
            watchdog: Duration::from_secs(args.watchdog),
            map_file: args.fs20_map.clone(),
            cul_driver: driver.to_string(),
            cul_params: params,
        })
    }

    pub fn load_map(&self) -> Result<AddressMap, MapError> {
        match &self.map_file {
            Some(path) => load_map_file(path),
            None => Ok(AddressMap::new()),
        }
    }
}

/// A missing file gives an empty map, any other failure is an error
pub fn load_map_file(path: &Path) -> Result<AddressMap, MapError> {
    if !path.exists() {
        warn!("Mapping file {} not found, using addresses", path.display());
        return Ok(AddressMap::new());
    }
    AddressMap::load(path)
}
