use crate::common::address::{DeviceAddress, ProtocolFamily};
use crate::common::cmd_defs::Fs20Command;
use crate::error::DynError;
use crate::utils::dyn_future::DynFuture;
use lazy_static::lazy_static;
use std::collections::HashMap;
use std::error::Error;
use std::fmt;
use std::sync::Mutex;
use std::time::Instant;

/// Something to send to the dongle
#[derive(Debug, Clone, PartialEq)]
pub enum CulFrame {
    Fs20 {
        address: DeviceAddress,
        command: Fs20Command,
    },
    /// Written as is, e.g. `V` to query the firmware version
    Raw(String),
}

#[derive(Debug)]
pub enum CulSendResult {
    Ok,
    NotConnected,
    DriverError(DynError),
}

impl CulSendResult {
    pub fn is_ok(&self) -> bool {
        matches!(self, CulSendResult::Ok)
    }
}

impl fmt::Display for CulSendResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CulSendResult::Ok => write!(f, "OK"),
            CulSendResult::NotConnected => write!(f, "Not connected"),
            CulSendResult::DriverError(e) => write!(f, "Driver error: {}", e),
        }
    }
}

/// Decoded FS20 telegram
#[derive(Debug, Clone, PartialEq)]
pub struct Fs20Message {
    pub address: DeviceAddress,
    pub command: Fs20Command,
    /// Command byte as received, including the extension flag
    pub cmd_raw: u8,
    pub extension: Option<u8>,
}

/// A frame received by the dongle
#[derive(Debug, Clone, PartialEq)]
pub struct RfFrame {
    pub family: ProtocolFamily,
    /// Only set for FS20 frames
    pub fs20: Option<Fs20Message>,
    /// Signal strength in dBm
    pub rssi: Option<f32>,
    /// Device type as reported in status messages
    pub device: Option<String>,
    pub raw: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CulBusEventType {
    /// Transport opened and initialised
    Ready,
    Closed,
    Frame(RfFrame),
    /// Anything else the dongle printed
    Line(String),
}

#[derive(Debug, Clone)]
pub struct CulBusEvent {
    pub timestamp: Instant,
    pub event_type: CulBusEventType,
}

impl CulBusEvent {
    pub fn now(event_type: CulBusEventType) -> CulBusEvent {
        CulBusEvent {
            timestamp: Instant::now(),
            event_type,
        }
    }
}

pub type CulBusEventResult = Result<CulBusEvent, DynError>;

pub trait CulDriver: Send {
    /// Resolves when the frame has been written to the dongle
    fn send_frame(&mut self, frame: CulFrame) -> DynFuture<'_, CulSendResult>;

    fn next_bus_event(&mut self) -> DynFuture<'_, CulBusEventResult>;
}

#[derive(Debug)]
pub enum OpenError {
    NotFound,
    ParameterError(String),
    DriverError(DynError),
}

impl Error for OpenError {}

impl fmt::Display for OpenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OpenError::NotFound => write!(f, "Driver not found"),
            OpenError::ParameterError(e) => write!(f, "Invalid parameter: {}", e),
            OpenError::DriverError(e) => write!(f, "Driver error: {}", e),
        }
    }
}

pub type DriverOpen = fn(HashMap<String, String>) -> Result<Box<dyn CulDriver>, OpenError>;

pub struct DriverInfo {
    pub name: String,
    pub description: String,
    pub open: DriverOpen,
}

lazy_static! {
    static ref DRIVERS: Mutex<Vec<DriverInfo>> = Mutex::new(Vec::new());
}

pub fn add_driver(info: DriverInfo) {
    if let Ok(mut drivers) = DRIVERS.lock() {
        if !drivers.iter().any(|d| d.name == info.name) {
            drivers.push(info);
        }
    }
}

pub fn driver_names() -> Vec<String> {
    match DRIVERS.lock() {
        Ok(drivers) => drivers
            .iter()
            .map(|d| format!("{} - {}", d.name, d.description))
            .collect(),
        Err(_) => Vec::new(),
    }
}

/// Open a registered driver. Names are matched case-insensitively.
pub fn open(name: &str, params: HashMap<String, String>) -> Result<Box<dyn CulDriver>, OpenError> {
    let open = {
        let drivers = DRIVERS
            .lock()
            .map_err(|_| OpenError::DriverError("Driver registry poisoned".into()))?;
        drivers
            .iter()
            .find(|d| d.name.eq_ignore_ascii_case(name))
            .map(|d| d.open)
            .ok_or(OpenError::NotFound)?
    };
    open(params)
}
