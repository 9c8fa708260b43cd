use crate::common::address::{AddressError, DeviceAddress};
use log::debug;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::Path;

#[derive(Debug)]
pub enum MapError {
    Io(std::io::Error),
    Json(serde_json::Error),
    InvalidEntry(String, String, AddressError),
    DuplicateAddress(DeviceAddress, String, String),
    DuplicateName(String),
}

impl fmt::Display for MapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MapError::Io(e) => write!(f, "Failed to read map: {}", e),
            MapError::Json(e) => write!(f, "Failed to parse map: {}", e),
            MapError::InvalidEntry(k, v, e) => {
                write!(f, "Neither '{}' nor '{}' is a device address: {}", k, v, e)
            }
            MapError::DuplicateAddress(a, first, second) => write!(
                f,
                "Map is not unique, {} is named both '{}' and '{}'",
                a, first, second
            ),
            MapError::DuplicateName(n) => {
                write!(f, "Map is not unique, '{}' has more than one address", n)
            }
        }
    }
}

impl std::error::Error for MapError {}

impl From<std::io::Error> for MapError {
    fn from(err: std::io::Error) -> MapError {
        MapError::Io(err)
    }
}

impl From<serde_json::Error> for MapError {
    fn from(err: serde_json::Error) -> MapError {
        MapError::Json(err)
    }
}

/// Display names for device addresses, usable in both directions.
/// Read only once built.
#[derive(Debug, Default)]
pub struct AddressMap {
    by_name: HashMap<String, DeviceAddress>,
    by_address: HashMap<DeviceAddress, String>,
}

impl AddressMap {
    pub fn new() -> AddressMap {
        AddressMap::default()
    }

    /// Build from (name, address) pairs. Fails if an address or a name
    /// occurs twice.
    pub fn from_pairs<I>(pairs: I) -> Result<AddressMap, MapError>
    where
        I: IntoIterator<Item = (String, DeviceAddress)>,
    {
        let mut map = AddressMap::new();
        for (name, address) in pairs {
            if let Some(first) = map.by_address.get(&address) {
                return Err(MapError::DuplicateAddress(address, first.clone(), name));
            }
            if map.by_name.contains_key(&name) {
                return Err(MapError::DuplicateName(name));
            }
            map.by_name.insert(name.clone(), address);
            map.by_address.insert(address, name);
        }
        Ok(map)
    }

    /// JSON object mapping addresses to names, e.g.
    /// `{"FS20/1234AB": "kitchen"}`. The reverse orientation is accepted
    /// too.
    pub fn from_json_str(json: &str) -> Result<AddressMap, MapError> {
        let entries: BTreeMap<String, String> = serde_json::from_str(json)?;
        let mut pairs = Vec::with_capacity(entries.len());
        for (k, v) in entries {
            match k.parse::<DeviceAddress>() {
                Ok(address) => pairs.push((v, address)),
                Err(key_err) => match v.parse::<DeviceAddress>() {
                    Ok(address) => pairs.push((k, address)),
                    Err(_) => return Err(MapError::InvalidEntry(k, v, key_err)),
                },
            }
        }
        AddressMap::from_pairs(pairs)
    }

    pub fn load(path: &Path) -> Result<AddressMap, MapError> {
        debug!("Loading address map from {}", path.display());
        let json = std::fs::read_to_string(path)?;
        AddressMap::from_json_str(&json)
    }

    pub fn resolve_to_address(&self, name: &str) -> Option<&DeviceAddress> {
        self.by_name.get(name)
    }

    pub fn resolve_to_name(&self, address: &DeviceAddress) -> Option<&str> {
        self.by_address.get(address).map(|s| s.as_str())
    }

    /// Name if mapped, otherwise the address itself
    pub fn display_name(&self, address: &DeviceAddress) -> String {
        match self.resolve_to_name(address) {
            Some(name) => name.to_string(),
            None => address.to_string(),
        }
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}
