use crate::drivers;
#[cfg(feature = "serial_driver")]
use drivers::serial::serial;
use drivers::telnet::telnet;
use drivers::driver::add_driver;

pub fn init() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    #[cfg(feature = "serial_driver")]
    add_driver(serial::driver_info());
    add_driver(telnet::driver_info());
    Ok(())
}
