use super::router::RouteError;
use crate::common::address::DeviceAddress;

#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    Name(String),
    Address(DeviceAddress),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ControlTopic {
    Set(Target),
    Get(Target),
}

/// Parse `<base>/set/<name>`, `<base>/set/<family>/<addr><sub>` and the
/// same forms with `get`.
pub fn parse_topic(base: &str, topic: &str) -> Result<ControlTopic, RouteError> {
    let malformed = || RouteError::MalformedTopic(topic.to_string());
    let rest = topic
        .strip_prefix(base)
        .and_then(|r| r.strip_prefix('/'))
        .ok_or_else(malformed)?;
    let parts: Vec<&str> = rest.split('/').collect();
    let target = match parts[1..] {
        [name] if !name.is_empty() => Target::Name(name.to_string()),
        [family, address] => Target::Address(
            DeviceAddress::from_parts(family, address)
                .map_err(|e| RouteError::InvalidAddress(format!("{}/{}", family, address), e))?,
        ),
        _ => return Err(malformed()),
    };
    match parts[0] {
        "set" => Ok(ControlTopic::Set(target)),
        "get" => Ok(ControlTopic::Get(target)),
        _ => Err(malformed()),
    }
}

#[cfg(test)]
mod test {
    use super::{parse_topic, ControlTopic, Target};
    use crate::bridge::router::RouteError;
    use crate::common::address::DeviceAddress;

    #[test]
    fn name_test() {
        assert_eq!(
            parse_topic("fs20dimmer", "fs20dimmer/set/hall").unwrap(),
            ControlTopic::Set(Target::Name("hall".to_string()))
        );
        assert_eq!(
            parse_topic("fs20dimmer", "fs20dimmer/get/hall").unwrap(),
            ControlTopic::Get(Target::Name("hall".to_string()))
        );
    }

    #[test]
    fn address_test() {
        assert_eq!(
            parse_topic("fs20dimmer", "fs20dimmer/set/FS20/1234ab").unwrap(),
            ControlTopic::Set(Target::Address(DeviceAddress::fs20(0x1234, 0xab)))
        );
        assert!(matches!(
            parse_topic("fs20dimmer", "fs20dimmer/get/FS20/12"),
            Err(RouteError::InvalidAddress(_, _))
        ));
    }

    #[test]
    fn nested_base_test() {
        assert_eq!(
            parse_topic("home/rf", "home/rf/get/desk").unwrap(),
            ControlTopic::Get(Target::Name("desk".to_string()))
        );
    }

    #[test]
    fn malformed_test() {
        for t in [
            "fs20dimmer/status/hall",
            "fs20dimmer/set",
            "fs20dimmer/set/",
            "fs20dimmer/set/a/b/c",
            "other/set/hall",
            "fs20dimmerx/set/hall",
        ] {
            assert!(
                matches!(
                    parse_topic("fs20dimmer", t),
                    Err(RouteError::MalformedTopic(_))
                ),
                "{}",
                t
            );
        }
    }
}
