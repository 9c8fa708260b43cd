pub mod driver;
pub mod driver_init;
pub use driver::driver_names;
pub use driver::open;
pub use driver_init::init;

pub mod line_driver;
pub mod utils;
pub mod cul {
    pub mod codec;
}
#[cfg(feature = "serial_driver")]
pub mod serial {
    pub mod serial;
}
pub mod telnet {
    pub mod telnet;
}
