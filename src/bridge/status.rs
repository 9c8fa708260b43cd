use crate::drivers::driver::Fs20Message;
use crate::error::DynResult;
use crate::utils::dyn_future::DynFuture;
use serde_derive::Serialize;

/// Outbound side of the messaging layer
pub trait StatusPublisher: Send + Sync {
    fn publish(&self, topic: String, payload: String, retain: bool) -> DynFuture<'_, DynResult<()>>;
}

pub fn status_topic(base: &str, device: &str) -> String {
    format!("{}/status/{}", base, device)
}

pub fn connected_topic(base: &str) -> String {
    format!("{}/connected", base)
}

pub fn heartbeat_topic(base: &str) -> String {
    format!("{}/heartbeat", base)
}

#[derive(Serialize)]
struct Fs20Info {
    cmd: String,
    #[serde(rename = "cmdRaw")]
    cmd_raw: String,
}

#[derive(Serialize)]
struct CulInfo {
    fs20: Fs20Info,
    #[serde(skip_serializing_if = "Option::is_none")]
    rssi: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    device: Option<String>,
}

#[derive(Serialize)]
struct StatusJson {
    ts: i64,
    val: String,
    #[serde(rename = "dimLevel")]
    dim_level: u8,
    cul: CulInfo,
}

/// Everything published about a dimmer after a state change
#[derive(Debug, Clone, PartialEq)]
pub struct StatusReport {
    pub level: u8,
    /// The received command, None for set and get requests
    pub command: Option<Fs20Message>,
    pub rssi: Option<f32>,
    pub device: Option<String>,
}

impl StatusReport {
    pub fn level_only(level: u8) -> StatusReport {
        StatusReport {
            level,
            command: None,
            rssi: None,
            device: None,
        }
    }

    /// Plain level, or with `json` set the level together with what was
    /// received. `ts` is milliseconds since the epoch.
    pub fn payload(&self, json: bool, ts: i64) -> Result<String, serde_json::Error> {
        if !json {
            return Ok(self.level.to_string());
        }
        let (cmd, cmd_raw) = match &self.command {
            Some(msg) => (msg.command.name(), format!("{:02x}", msg.cmd_raw)),
            None => (String::new(), String::new()),
        };
        serde_json::to_string(&StatusJson {
            ts,
            val: cmd_raw.clone(),
            dim_level: self.level,
            cul: CulInfo {
                fs20: Fs20Info { cmd, cmd_raw },
                rssi: self.rssi,
                device: self.device.clone(),
            },
        })
    }
}
