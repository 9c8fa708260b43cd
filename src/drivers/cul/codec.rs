//! Text protocol of CUL compatible dongles.
//!
//! Received frames start with a letter identifying the protocol followed by
//! hex digits. With reporting mode `X2x` the last byte is the RSSI.

use crate::common::address::{DeviceAddress, ProtocolFamily};
use crate::common::cmd_defs::Fs20Command;
use crate::drivers::driver::{CulFrame, Fs20Message, RfFrame};

/// Report frames and repeats, append RSSI
pub const INIT_REPORTING: &str = "X23";
/// Version query, answered with a line like `V 1.67 CUL868`
pub const VERSION_QUERY: &str = "V";

const FS20_EXTENSION_FLAG: u8 = 0x20;
const FS20_COMMAND_MASK: u8 = 0x1f;

fn family_for_prefix(c: char) -> Option<ProtocolFamily> {
    let family = match c {
        'F' => ProtocolFamily::Fs20,
        'T' => ProtocolFamily::Fht,
        'E' => ProtocolFamily::Em,
        'H' => ProtocolFamily::Hms,
        'K' => ProtocolFamily::Ks300,
        'A' => ProtocolFamily::AskSin,
        'Z' => ProtocolFamily::Moritz,
        'i' => ProtocolFamily::It,
        'R' => ProtocolFamily::Hoermann,
        't' => ProtocolFamily::Tx3,
        'Y' => ProtocolFamily::Y,
        _ => return None,
    };
    Some(family)
}

fn hex_bytes(s: &str) -> Option<Vec<u8>> {
    if s.len() % 2 != 0 || !s.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).ok())
        .collect()
}

/// Convert the raw RSSI byte to dBm
pub fn rssi_dbm(raw: u8) -> f32 {
    let v = if raw >= 128 {
        raw as i16 - 256
    } else {
        raw as i16
    };
    v as f32 / 2.0 - 74.0
}

fn parse_fs20(data: &str) -> Option<(Fs20Message, Option<f32>)> {
    let bytes = hex_bytes(data)?;
    if bytes.len() < 4 {
        return None;
    }
    let house_code = u16::from_be_bytes([bytes[0], bytes[1]]);
    let cmd_raw = bytes[3];
    let command = Fs20Command::from_code(cmd_raw & FS20_COMMAND_MASK).ok()?;
    let mut rest = bytes[4..].iter().copied();
    let extension = if cmd_raw & FS20_EXTENSION_FLAG != 0 {
        Some(rest.next()?)
    } else {
        None
    };
    let rssi = rest.next().map(rssi_dbm);
    let msg = Fs20Message {
        address: DeviceAddress::fs20(house_code, bytes[2]),
        command,
        cmd_raw,
        extension,
    };
    Some((msg, rssi))
}

/// Decode a line from the dongle. Lines that are not radio frames, or
/// FS20 frames that do not decode, give `None`.
pub fn parse_line(line: &str) -> Option<RfFrame> {
    let line = line.trim();
    let prefix = line.chars().next()?;
    let family = family_for_prefix(prefix)?;
    let data = &line[prefix.len_utf8()..];
    if data.is_empty() {
        return None;
    }
    let (fs20, rssi) = if family == ProtocolFamily::Fs20 {
        let (msg, rssi) = parse_fs20(data)?;
        (Some(msg), rssi)
    } else {
        (None, None)
    };
    Some(RfFrame {
        family,
        fs20,
        rssi,
        device: Some(family.to_string()),
        raw: line.to_string(),
    })
}

pub fn encode(frame: &CulFrame) -> String {
    match frame {
        CulFrame::Fs20 { address, command } => format!(
            "F{:04X}{:02X}{:02X}",
            address.house_code(),
            address.device(),
            command.code()
        ),
        CulFrame::Raw(s) => s.clone(),
    }
}

#[cfg(test)]
mod test {
    use super::{encode, parse_line, rssi_dbm};
    use crate::common::address::{DeviceAddress, ProtocolFamily};
    use crate::common::cmd_defs::Fs20Command;
    use crate::drivers::driver::CulFrame;

    #[test]
    fn fs20_test() {
        let f = parse_line("F1234AB1114\r\n").unwrap();
        assert_eq!(f.family, ProtocolFamily::Fs20);
        let msg = f.fs20.unwrap();
        assert_eq!(msg.address, DeviceAddress::fs20(0x1234, 0xab));
        assert_eq!(msg.command, Fs20Command::On);
        assert_eq!(msg.cmd_raw, 0x11);
        assert_eq!(msg.extension, None);
        assert_eq!(f.rssi, Some(-64.0));
        assert_eq!(f.raw, "F1234AB1114");
        assert_eq!(f.device.as_deref(), Some("FS20"));
    }

    #[test]
    fn fs20_extension_test() {
        let f = parse_line("F00FF013905A0").unwrap();
        let msg = f.fs20.unwrap();
        assert_eq!(msg.command, Fs20Command::OnForTimer);
        assert_eq!(msg.cmd_raw, 0x39);
        assert_eq!(msg.extension, Some(0x05));
        assert_eq!(f.rssi, Some(rssi_dbm(0xa0)));
    }

    #[test]
    fn fs20_without_rssi_test() {
        let f = parse_line("F12340115").unwrap();
        assert_eq!(f.fs20.unwrap().command, Fs20Command::DimUpDown);
        assert_eq!(f.rssi, None);
    }

    #[test]
    fn other_lines_test() {
        let f = parse_line("H12345678").unwrap();
        assert_eq!(f.family, ProtocolFamily::Hms);
        assert_eq!(f.device.as_deref(), Some("HMS"));
        assert!(f.fs20.is_none());
        assert!(parse_line("V 1.67 CUL868").is_none());
        assert!(parse_line("").is_none());
        assert!(parse_line("F12").is_none());
        assert!(parse_line("F1234XY11").is_none());
    }

    #[test]
    fn rssi_test() {
        assert_eq!(rssi_dbm(0), -74.0);
        assert_eq!(rssi_dbm(0x14), -64.0);
        assert_eq!(rssi_dbm(0xff), -74.5);
        assert_eq!(rssi_dbm(0x80), -138.0);
    }

    #[test]
    fn encode_test() {
        let frame = CulFrame::Fs20 {
            address: DeviceAddress::fs20(0x1234, 0xab),
            command: Fs20Command::Dim(43),
        };
        assert_eq!(encode(&frame), "F1234AB07");
        assert_eq!(encode(&CulFrame::Raw("V".to_string())), "V");
    }
}
