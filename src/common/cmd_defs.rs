use super::level;
use core::fmt;
use core::str::FromStr;

#[derive(Debug, Clone, PartialEq)]
pub enum CommandError {
    Unknown(String),
    InvalidCode(u8),
}

impl fmt::Display for CommandError {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CommandError::Unknown(s) => write!(fmt, "Unknown FS20 command '{}'", s),
            CommandError::InvalidCode(c) => write!(fmt, "Invalid FS20 command code 0x{:02x}", c),
        }
    }
}

impl std::error::Error for CommandError {}

/// FS20 command as sent over the air. Every command has a name spelling
/// (`dim06%`, `toggle`) and a hex spelling (`01`, `12`), both parse to the
/// same value.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Fs20Command {
    Off,
    /// Absolute level, always one of `level::STEPS`
    Dim(u8),
    On,
    Toggle,
    DimUp,
    DimDown,
    DimUpDown,
    Timer,
    SendState,
    OffForTimer,
    OnForTimer,
    OnOldForTimer,
    Reset,
    RampOnTime,
    RampOffTime,
    OnOldForTimerPrev,
    On100ForTimerPrev,
}

const NAMED: [(Fs20Command, &str, u8); 16] = [
    (Fs20Command::Off, "off", 0x00),
    (Fs20Command::On, "on", 0x11),
    (Fs20Command::Toggle, "toggle", 0x12),
    (Fs20Command::DimUp, "dimup", 0x13),
    (Fs20Command::DimDown, "dimdown", 0x14),
    (Fs20Command::DimUpDown, "dimupdown", 0x15),
    (Fs20Command::Timer, "timer", 0x16),
    (Fs20Command::SendState, "sendstate", 0x17),
    (Fs20Command::OffForTimer, "off-for-timer", 0x18),
    (Fs20Command::OnForTimer, "on-for-timer", 0x19),
    (Fs20Command::OnOldForTimer, "on-old-for-timer", 0x1a),
    (Fs20Command::Reset, "reset", 0x1b),
    (Fs20Command::RampOnTime, "ramp-on-time", 0x1c),
    (Fs20Command::RampOffTime, "ramp-off-time", 0x1d),
    (Fs20Command::OnOldForTimerPrev, "on-old-for-timer-prev", 0x1e),
    (Fs20Command::On100ForTimerPrev, "on-100-for-timer-prev", 0x1f),
];

/// What a command does to the dimmer state
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DimmerAction {
    Off,
    Level(u8),
    On,
    Toggle,
    DimUp,
    DimDown,
    Ramp,
    NoChange,
}

impl Fs20Command {
    /// Absolute dim command, `None` unless `level` is a step
    pub fn dim(level: u8) -> Option<Fs20Command> {
        level::dim_code(level).map(|_| Fs20Command::Dim(level))
    }

    /// Command for a 5 bit code. The extension flag (0x20) must be masked
    /// off by the caller.
    pub fn from_code(code: u8) -> Result<Fs20Command, CommandError> {
        if let Some(l) = level::from_dim_code(code) {
            return Ok(Fs20Command::Dim(l));
        }
        NAMED
            .iter()
            .find(|(_, _, c)| *c == code)
            .map(|(cmd, _, _)| *cmd)
            .ok_or(CommandError::InvalidCode(code))
    }

    pub fn code(&self) -> u8 {
        match self {
            Fs20Command::Dim(l) => level::dim_code(*l).unwrap_or(0x10),
            cmd => NAMED
                .iter()
                .find(|(c, _, _)| c == cmd)
                .map(|(_, _, code)| *code)
                .unwrap_or(0),
        }
    }

    pub fn name(&self) -> String {
        match self {
            Fs20Command::Dim(l) => format!("dim{:02}%", l),
            cmd => NAMED
                .iter()
                .find(|(c, _, _)| c == cmd)
                .map(|(_, name, _)| name.to_string())
                .unwrap_or_default(),
        }
    }

    pub fn action(&self) -> DimmerAction {
        match self {
            Fs20Command::Off | Fs20Command::OffForTimer => DimmerAction::Off,
            Fs20Command::Dim(l) => DimmerAction::Level(*l),
            Fs20Command::OnForTimer => DimmerAction::Level(level::MAX),
            Fs20Command::On | Fs20Command::OnOldForTimer => DimmerAction::On,
            Fs20Command::Toggle => DimmerAction::Toggle,
            Fs20Command::DimUp => DimmerAction::DimUp,
            Fs20Command::DimDown => DimmerAction::DimDown,
            Fs20Command::DimUpDown => DimmerAction::Ramp,
            _ => DimmerAction::NoChange,
        }
    }
}

impl fmt::Display for Fs20Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

fn parse_dim_name(s: &str) -> Option<Fs20Command> {
    let digits = s.strip_prefix("dim")?.strip_suffix('%')?;
    if digits.is_empty() || digits.len() > 3 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    Fs20Command::dim(digits.parse().ok()?)
}

impl FromStr for Fs20Command {
    type Err = CommandError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        if let Some((cmd, _, _)) = NAMED.iter().find(|(_, name, _)| *name == lower) {
            return Ok(*cmd);
        }
        if let Some(cmd) = parse_dim_name(&lower) {
            return Ok(cmd);
        }
        if (1..=2).contains(&lower.len()) && lower.chars().all(|c| c.is_ascii_hexdigit()) {
            if let Ok(code) = u8::from_str_radix(&lower, 16) {
                return Fs20Command::from_code(code);
            }
        }
        Err(CommandError::Unknown(s.to_string()))
    }
}

#[cfg(test)]
mod test {
    use super::{CommandError, DimmerAction, Fs20Command};

    #[test]
    fn alias_test() {
        assert_eq!("dim06%".parse::<Fs20Command>(), Ok(Fs20Command::Dim(6)));
        assert_eq!("dim6%".parse::<Fs20Command>(), Ok(Fs20Command::Dim(6)));
        assert_eq!("01".parse::<Fs20Command>(), Ok(Fs20Command::Dim(6)));
        assert_eq!("off".parse::<Fs20Command>(), Ok(Fs20Command::Off));
        assert_eq!("00".parse::<Fs20Command>(), Ok(Fs20Command::Off));
        assert_eq!("0".parse::<Fs20Command>(), Ok(Fs20Command::Off));
        assert_eq!("0a".parse::<Fs20Command>(), Ok(Fs20Command::Dim(62)));
        assert_eq!("dim100%".parse::<Fs20Command>(), Ok(Fs20Command::Dim(100)));
        assert_eq!("10".parse::<Fs20Command>(), Ok(Fs20Command::Dim(100)));
        assert_eq!("Toggle".parse::<Fs20Command>(), Ok(Fs20Command::Toggle));
        assert_eq!("1a".parse::<Fs20Command>(), Ok(Fs20Command::OnOldForTimer));
    }

    #[test]
    fn invalid_test() {
        assert!(matches!(
            "dim40%".parse::<Fs20Command>(),
            Err(CommandError::Unknown(_))
        ));
        assert!(matches!(
            "blink".parse::<Fs20Command>(),
            Err(CommandError::Unknown(_))
        ));
        assert_eq!(
            "3f".parse::<Fs20Command>(),
            Err(CommandError::InvalidCode(0x3f))
        );
    }

    #[test]
    fn code_round_trip_test() {
        for code in 0..0x20u8 {
            let cmd = Fs20Command::from_code(code).unwrap();
            assert_eq!(cmd.code(), code);
            assert_eq!(cmd.name().parse::<Fs20Command>(), Ok(cmd));
        }
    }

    #[test]
    fn action_test() {
        assert_eq!(Fs20Command::OffForTimer.action(), DimmerAction::Off);
        assert_eq!(Fs20Command::OnForTimer.action(), DimmerAction::Level(100));
        assert_eq!(Fs20Command::OnOldForTimer.action(), DimmerAction::On);
        assert_eq!(Fs20Command::DimUpDown.action(), DimmerAction::Ramp);
        assert_eq!(Fs20Command::SendState.action(), DimmerAction::NoChange);
        assert_eq!(Fs20Command::Dim(43).name(), "dim43%");
    }
}
