use super::status::{heartbeat_topic, status_topic, StatusPublisher, StatusReport};
use super::topic::{parse_topic, ControlTopic, Target};
use crate::common::address::{AddressError, DeviceAddress, ProtocolFamily};
use crate::common::cmd_defs::Fs20Command;
use crate::common::level;
use crate::dimmer::engine::DimmerEngine;
use crate::dimmer::state::DimmerState;
use crate::drivers::driver::{CulDriver, CulFrame, RfFrame};
use crate::utils::address_map::AddressMap;
use log::{debug, info};
use std::error::Error;
use std::fmt;
use std::time::Instant;

#[derive(Debug)]
pub enum RouteError {
    MalformedTopic(String),
    InvalidAddress(String, AddressError),
    UnsupportedFamily(ProtocolFamily),
    UnknownName(String),
    UnknownDevice(DeviceAddress),
    InvalidPayload(String),
    SendFailed(DeviceAddress, String),
    PublishFailed(String, String),
}

impl Error for RouteError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            RouteError::InvalidAddress(_, e) => Some(e),
            _ => None,
        }
    }
}

impl fmt::Display for RouteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteError::MalformedTopic(t) => write!(f, "Unrecognized topic {}", t),
            RouteError::InvalidAddress(a, e) => write!(f, "Invalid address {}: {}", a, e),
            RouteError::UnsupportedFamily(fam) => {
                write!(f, "Only FS20 devices can be controlled, not {}", fam)
            }
            RouteError::UnknownName(n) => write!(f, "No device named {}", n),
            RouteError::UnknownDevice(a) => write!(f, "Nothing known about {}", a),
            RouteError::InvalidPayload(p) => write!(f, "Invalid payload \"{}\"", p),
            RouteError::SendFailed(a, e) => write!(f, "Failed to send to {}: {}", a, e),
            RouteError::PublishFailed(t, e) => write!(f, "Failed to publish {}: {}", t, e),
        }
    }
}

/// What became of a received frame
#[derive(Debug, PartialEq)]
pub enum FrameOutcome {
    Status(DimmerState),
    Duplicate,
    Heartbeat,
}

/// Turn a set payload into a command. Accepts `on`, `off` and a
/// percentage, optionally followed by `%`.
pub fn parse_set_payload(payload: &str) -> Result<Fs20Command, RouteError> {
    let p = payload.trim().to_ascii_lowercase();
    match p.as_str() {
        "on" => return Ok(Fs20Command::On),
        "off" => return Ok(Fs20Command::Off),
        _ => {}
    }
    let percent: i64 = p
        .strip_suffix('%')
        .unwrap_or(&p)
        .trim_end()
        .parse()
        .map_err(|_| RouteError::InvalidPayload(payload.to_string()))?;
    if percent <= 0 {
        Ok(Fs20Command::Off)
    } else {
        Ok(Fs20Command::Dim(level::quantize(percent)))
    }
}

/// Status for set and get requests, which have no received command
fn request_report(address: &DeviceAddress, level: u8) -> StatusReport {
    StatusReport {
        device: Some(address.family().to_string()),
        ..StatusReport::level_only(level)
    }
}

pub struct CommandRouter {
    base: String,
    map: AddressMap,
    engine: DimmerEngine,
    json_values: bool,
    retain: bool,
}

impl CommandRouter {
    pub fn new(base: &str, map: AddressMap, json_values: bool, retain: bool) -> CommandRouter {
        CommandRouter {
            base: base.to_string(),
            map,
            engine: DimmerEngine::new(),
            json_values,
            retain,
        }
    }

    pub fn engine(&self) -> &DimmerEngine {
        &self.engine
    }

    /// Topics to subscribe to for control messages
    pub fn subscriptions(&self) -> [String; 2] {
        [format!("{}/set/#", self.base), format!("{}/get/#", self.base)]
    }

    fn resolve(&self, target: Target) -> Result<DeviceAddress, RouteError> {
        let address = match target {
            Target::Name(name) => match self.map.resolve_to_address(&name) {
                Some(a) => *a,
                None => return Err(RouteError::UnknownName(name)),
            },
            Target::Address(a) => a,
        };
        if address.family() != ProtocolFamily::Fs20 {
            return Err(RouteError::UnsupportedFamily(address.family()));
        }
        Ok(address)
    }

    async fn publish_status(
        &self,
        address: &DeviceAddress,
        report: StatusReport,
        publisher: &dyn StatusPublisher,
    ) -> Result<(), RouteError> {
        let topic = status_topic(&self.base, &self.map.display_name(address));
        let ts = chrono::Utc::now().timestamp_millis();
        let payload = report
            .payload(self.json_values, ts)
            .map_err(|e| RouteError::PublishFailed(topic.clone(), e.to_string()))?;
        debug!("Publishing {} {}", topic, payload);
        publisher
            .publish(topic.clone(), payload, self.retain)
            .await
            .map_err(|e| RouteError::PublishFailed(topic, e.to_string()))
    }

    /// Feed a frame received from the dongle through the dimmer state and
    /// publish the result.
    pub async fn handle_frame(
        &mut self,
        frame: &RfFrame,
        now: Instant,
        publisher: &dyn StatusPublisher,
    ) -> Result<FrameOutcome, RouteError> {
        let msg = match &frame.fs20 {
            Some(msg) => msg,
            None => {
                let topic = heartbeat_topic(&self.base);
                debug!("{} frame, heartbeat", frame.family);
                publisher
                    .publish(topic.clone(), "1".to_string(), self.retain)
                    .await
                    .map_err(|e| RouteError::PublishFailed(topic, e.to_string()))?;
                return Ok(FrameOutcome::Heartbeat);
            }
        };
        let (state, accepted) = self.engine.apply(&msg.address, msg.command, false, now);
        if !accepted {
            return Ok(FrameOutcome::Duplicate);
        }
        let report = StatusReport {
            level: state.level(),
            command: Some(msg.clone()),
            rssi: frame.rssi,
            device: frame.device.clone(),
        };
        self.publish_status(&msg.address, report, publisher).await?;
        Ok(FrameOutcome::Status(state))
    }

    /// Handle a control message from the broker. Set requests are sent to
    /// the dimmer and only published once the dongle has accepted them.
    pub async fn handle_message(
        &mut self,
        topic: &str,
        payload: &str,
        now: Instant,
        driver: &mut dyn CulDriver,
        publisher: &dyn StatusPublisher,
    ) -> Result<(), RouteError> {
        match parse_topic(&self.base, topic)? {
            ControlTopic::Set(target) => {
                let address = self.resolve(target)?;
                let cmd = parse_set_payload(payload)?;
                info!("Set {} to {}", self.map.display_name(&address), cmd);
                let (state, _) = self.engine.apply(&address, cmd, true, now);
                let res = driver
                    .send_frame(CulFrame::Fs20 {
                        address,
                        command: cmd,
                    })
                    .await;
                if !res.is_ok() {
                    return Err(RouteError::SendFailed(address, res.to_string()));
                }
                self.publish_status(&address, request_report(&address, state.level()), publisher)
                    .await
            }
            ControlTopic::Get(target) => {
                let address = self.resolve(target)?;
                let level = match self.engine.state(&address) {
                    Some(state) => state.level(),
                    None => return Err(RouteError::UnknownDevice(address)),
                };
                self.publish_status(&address, request_report(&address, level), publisher)
                    .await
            }
        }
    }
}
