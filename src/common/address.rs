use core::fmt;
use core::str::FromStr;

#[derive(Debug, Clone, PartialEq)]
pub enum AddressError {
    UnknownFamily(String),
    InvalidLength,
    InvalidHex,
    MissingSeparator,
}

impl fmt::Display for AddressError {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AddressError::UnknownFamily(tag) => write!(fmt, "Unknown protocol family '{}'", tag),
            AddressError::InvalidLength => {
                write!(fmt, "Device address must be 4 hex digits followed by 2 hex digits")
            }
            AddressError::InvalidHex => write!(fmt, "Invalid hex digit in device address"),
            AddressError::MissingSeparator => write!(fmt, "Expected <family>/<address>"),
        }
    }
}

impl std::error::Error for AddressError {}

/// Protocol families reported by the CUL dongle. Only FS20 carries dimmer
/// state, the rest are recognised so that their traffic counts as a
/// heartbeat.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ProtocolFamily {
    Fs20,
    Fht,
    Em,
    Hms,
    Ks300,
    AskSin,
    Moritz,
    It,
    Hoermann,
    Tx3,
    Y,
}

const FAMILY_TAGS: [(ProtocolFamily, &str); 11] = [
    (ProtocolFamily::Fs20, "FS20"),
    (ProtocolFamily::Fht, "FHT"),
    (ProtocolFamily::Em, "EM"),
    (ProtocolFamily::Hms, "HMS"),
    (ProtocolFamily::Ks300, "KS300"),
    (ProtocolFamily::AskSin, "AS"),
    (ProtocolFamily::Moritz, "MORITZ"),
    (ProtocolFamily::It, "IT"),
    (ProtocolFamily::Hoermann, "HRM"),
    (ProtocolFamily::Tx3, "TX"),
    (ProtocolFamily::Y, "YF"),
];

impl ProtocolFamily {
    pub fn tag(&self) -> &'static str {
        FAMILY_TAGS
            .iter()
            .find(|(f, _)| f == self)
            .map(|(_, t)| *t)
            .unwrap_or("?")
    }

    /// Tags are matched case-insensitively
    pub fn from_tag(tag: &str) -> Result<ProtocolFamily, AddressError> {
        FAMILY_TAGS
            .iter()
            .find(|(_, t)| t.eq_ignore_ascii_case(tag))
            .map(|(f, _)| *f)
            .ok_or_else(|| AddressError::UnknownFamily(tag.to_string()))
    }
}

impl fmt::Display for ProtocolFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Canonical device identifier, written as `FS20/HHHHAA`: house code in
/// four hex digits followed by the two digit device (sub) address.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct DeviceAddress {
    family: ProtocolFamily,
    house_code: u16,
    device: u8,
}

fn parse_hex(s: &str) -> Result<u32, AddressError> {
    if s.is_empty() || !s.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(AddressError::InvalidHex);
    }
    u32::from_str_radix(s, 16).map_err(|_| AddressError::InvalidHex)
}

impl DeviceAddress {
    pub const fn new(family: ProtocolFamily, house_code: u16, device: u8) -> DeviceAddress {
        DeviceAddress {
            family,
            house_code,
            device,
        }
    }

    pub const fn fs20(house_code: u16, device: u8) -> DeviceAddress {
        DeviceAddress::new(ProtocolFamily::Fs20, house_code, device)
    }

    /// Build from a family tag and a six digit hex string, as used in
    /// `<base>/set/<family>/<addr><sub>` topics.
    pub fn from_parts(family: &str, address: &str) -> Result<DeviceAddress, AddressError> {
        let family = ProtocolFamily::from_tag(family)?;
        if address.len() != 6 || !address.is_ascii() {
            return Err(AddressError::InvalidLength);
        }
        let house_code = parse_hex(&address[..4])? as u16;
        let device = parse_hex(&address[4..])? as u8;
        Ok(DeviceAddress::new(family, house_code, device))
    }

    pub fn family(&self) -> ProtocolFamily {
        self.family
    }

    pub fn house_code(&self) -> u16 {
        self.house_code
    }

    pub fn device(&self) -> u8 {
        self.device
    }

    /// Hex part without the family tag
    pub fn hex(&self) -> String {
        format!("{:04X}{:02X}", self.house_code, self.device)
    }
}

impl fmt::Display for DeviceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{:04X}{:02X}", self.family, self.house_code, self.device)
    }
}

impl FromStr for DeviceAddress {
    type Err = AddressError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let Some((family, address)) = s.split_once('/') else {
            return Err(AddressError::MissingSeparator);
        };
        DeviceAddress::from_parts(family, address)
    }
}
