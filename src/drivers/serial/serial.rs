use crate::drivers;
use drivers::driver::{CulDriver, DriverInfo, OpenError};
use drivers::line_driver::{CulStream, LineDriver, RECONNECT_DELAY};
use drivers::utils::{bool_param, num_param};
use crate::utils::dyn_future::DynFuture;
use log::debug;
use std::collections::HashMap;
use std::io;
use tokio_serial::SerialStream;

const DEFAULT_PORT: &str = "/dev/ttyACM0";
const DEFAULT_PORT_SCC: &str = "/dev/ttyAMA0";
const DEFAULT_BAUD_RATE: u32 = 9600;
// COC and SCC boards run faster
const DEFAULT_BAUD_RATE_COC: u32 = 38400;

#[derive(Debug, PartialEq)]
struct SerialParams {
    port: String,
    baud_rate: u32,
}

fn serial_params(params: &HashMap<String, String>) -> Result<SerialParams, OpenError> {
    let coc = bool_param(params, "coc", false)?;
    let scc = bool_param(params, "scc", false)?;
    let port = match params.get("port") {
        Some(p) => p.clone(),
        None if scc => DEFAULT_PORT_SCC.to_string(),
        None => DEFAULT_PORT.to_string(),
    };
    let baud_rate = match num_param::<u32>(params, "baud_rate")? {
        Some(b) => b,
        None if coc || scc => DEFAULT_BAUD_RATE_COC,
        None => DEFAULT_BAUD_RATE,
    };
    Ok(SerialParams { port, baud_rate })
}

fn driver_open(params: HashMap<String, String>) -> Result<Box<dyn CulDriver>, OpenError> {
    let SerialParams { port, baud_rate } = serial_params(&params)?;
    debug!("Opening {} at {} baud", port, baud_rate);
    let driver = LineDriver::new(
        Box::new(move || -> DynFuture<'static, io::Result<Box<dyn CulStream>>> {
            let builder = tokio_serial::new(port.clone(), baud_rate);
            Box::pin(async move {
                SerialStream::open(&builder)
                    .map(|s| Box::new(s) as Box<dyn CulStream>)
                    .map_err(io::Error::from)
            })
        }),
        RECONNECT_DELAY,
    );
    Ok(Box::new(driver))
}

pub fn driver_info() -> DriverInfo {
    DriverInfo {
        name: "SERIAL".to_string(),
        description: "CUL, COC or SCC on a serial port".to_string(),
        open: driver_open,
    }
}

#[cfg(test)]
mod test {
    use super::{serial_params, SerialParams};
    use std::collections::HashMap;

    fn params(p: &[(&str, &str)]) -> HashMap<String, String> {
        p.iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn defaults_test() {
        assert_eq!(
            serial_params(&params(&[])).unwrap(),
            SerialParams {
                port: "/dev/ttyACM0".to_string(),
                baud_rate: 9600
            }
        );
        assert_eq!(
            serial_params(&params(&[("coc", "true")])).unwrap(),
            SerialParams {
                port: "/dev/ttyACM0".to_string(),
                baud_rate: 38400
            }
        );
        assert_eq!(
            serial_params(&params(&[("scc", "true"), ("baud_rate", "19200")])).unwrap(),
            SerialParams {
                port: "/dev/ttyAMA0".to_string(),
                baud_rate: 19200
            }
        );
        assert!(serial_params(&params(&[("baud_rate", "fast")])).is_err());
    }
}
