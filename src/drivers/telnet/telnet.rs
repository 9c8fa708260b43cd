use crate::drivers;
use drivers::driver::{CulDriver, DriverInfo, OpenError};
use drivers::line_driver::{CulStream, LineDriver, RECONNECT_DELAY};
use drivers::utils::{bool_param, num_param};
use crate::utils::dyn_future::DynFuture;
use log::debug;
use std::collections::HashMap;
use std::io;
use tokio::net::{lookup_host, TcpSocket};

const DEFAULT_PORT: u16 = 2323;

#[derive(Debug, PartialEq)]
struct TelnetParams {
    host: String,
    port: u16,
    keep_alive: bool,
}

fn telnet_params(params: &HashMap<String, String>) -> Result<TelnetParams, OpenError> {
    let host = params
        .get("host")
        .cloned()
        .ok_or_else(|| OpenError::ParameterError("host is required".to_string()))?;
    let port = num_param::<u16>(params, "port")?.unwrap_or(DEFAULT_PORT);
    let keep_alive = bool_param(params, "network_timeout", true)?;
    Ok(TelnetParams {
        host,
        port,
        keep_alive,
    })
}

async fn connect(host: String, port: u16, keep_alive: bool) -> io::Result<Box<dyn CulStream>> {
    let addr = lookup_host((host.as_str(), port))
        .await?
        .next()
        .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, format!("{} not found", host)))?;
    let socket = if addr.is_ipv4() {
        TcpSocket::new_v4()?
    } else {
        TcpSocket::new_v6()?
    };
    // Detects a dead network connection when the dongle is silent
    socket.set_keepalive(keep_alive)?;
    let stream = socket.connect(addr).await?;
    stream.set_nodelay(true)?;
    Ok(Box::new(stream))
}

fn driver_open(params: HashMap<String, String>) -> Result<Box<dyn CulDriver>, OpenError> {
    let TelnetParams {
        host,
        port,
        keep_alive,
    } = telnet_params(&params)?;
    debug!("Connecting to {}:{}", host, port);
    let driver = LineDriver::new(
        Box::new(move || -> DynFuture<'static, io::Result<Box<dyn CulStream>>> {
            Box::pin(connect(host.clone(), port, keep_alive))
        }),
        RECONNECT_DELAY,
    );
    Ok(Box::new(driver))
}

pub fn driver_info() -> DriverInfo {
    DriverInfo {
        name: "TELNET".to_string(),
        description: "CUL behind a serial to network bridge".to_string(),
        open: driver_open,
    }
}
