use super::driver::{CulFrame, CulSendResult, OpenError};
use std::collections::HashMap;
use std::str::FromStr;
use tokio::sync::oneshot;

pub struct CulReq {
    pub frame: CulFrame,
    pub reply: oneshot::Sender<CulSendResult>,
}

pub fn bool_param(
    params: &HashMap<String, String>,
    name: &str,
    default: bool,
) -> Result<bool, OpenError> {
    match params.get(name).map(|s| s.to_ascii_lowercase()) {
        None => Ok(default),
        Some(s) => match s.as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(OpenError::ParameterError(format!(
                "{} has invalid value",
                name
            ))),
        },
    }
}

pub fn num_param<T: FromStr>(
    params: &HashMap<String, String>,
    name: &str,
) -> Result<Option<T>, OpenError> {
    match params.get(name) {
        None => Ok(None),
        Some(s) => T::from_str(s)
            .map(Some)
            .map_err(|_| OpenError::ParameterError(format!("{} has invalid value", name))),
    }
}
