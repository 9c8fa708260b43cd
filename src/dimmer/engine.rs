use super::state::{DimmerState, RampDirection};
use crate::common::address::DeviceAddress;
use crate::common::cmd_defs::{DimmerAction, Fs20Command};
use crate::common::level;
use log::debug;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Identical commands closer than this are radio repeats
pub const DUPLICATE_WINDOW: Duration = Duration::from_millis(120);
/// Gap that separates two button presses from a held button
pub const PRESS_GAP: Duration = Duration::from_millis(400);
/// Pause at either end of a bidirectional ramp
pub const RAMP_END_DEBOUNCE: Duration = Duration::from_millis(800);

/// Dimmer state store and the transition function working on it.
///
/// Dimmers are created on the first command seen for an address and are
/// never removed.
pub struct DimmerEngine {
    dimmers: HashMap<DeviceAddress, DimmerState>,
}

impl DimmerEngine {
    pub fn new() -> DimmerEngine {
        DimmerEngine {
            dimmers: HashMap::new(),
        }
    }

    pub fn state(&self, address: &DeviceAddress) -> Option<&DimmerState> {
        self.dimmers.get(address)
    }

    pub fn len(&self) -> usize {
        self.dimmers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dimmers.is_empty()
    }

    /// Apply `cmd` to the dimmer at `address`. Returns the resulting state
    /// and whether the command was accepted. Unless `force` is set, a
    /// command identical to the previous one within `DUPLICATE_WINDOW` is
    /// rejected and leaves the state untouched.
    pub fn apply(
        &mut self,
        address: &DeviceAddress,
        cmd: Fs20Command,
        force: bool,
        now: Instant,
    ) -> (DimmerState, bool) {
        let state = self.dimmers.entry(*address).or_insert_with(|| {
            debug!("New dimmer {}", address);
            DimmerState::new()
        });
        if !force
            && state.last_command == Some(cmd)
            && state.idle_for(now) < DUPLICATE_WINDOW
        {
            debug!("Duplicate {} for {}, ignoring", cmd, address);
            return (*state, false);
        }
        execute(state, cmd, now);
        state.last_command = Some(cmd);
        state.last_command_at = Some(now);
        debug!(
            "Dimmer {}: {} -> level {} (previous {})",
            address, cmd, state.level, state.previous_level
        );
        (*state, true)
    }
}

impl Default for DimmerEngine {
    fn default() -> Self {
        DimmerEngine::new()
    }
}

fn execute(state: &mut DimmerState, cmd: Fs20Command, now: Instant) {
    match cmd.action() {
        DimmerAction::Off => {
            if state.level > level::OFF {
                state.previous_level = state.level;
                state.level = level::OFF;
            }
        }
        DimmerAction::Level(l) => state.level = l,
        DimmerAction::On => {
            if state.level < level::MIN {
                state.level = state.previous_level;
            }
        }
        DimmerAction::Toggle => {
            if state.level < level::MIN {
                state.level = state.previous_level;
            } else {
                state.previous_level = state.level;
                state.level = level::OFF;
            }
        }
        DimmerAction::DimUp => {
            state.ramp_direction = RampDirection::Up;
            state.previous_level = state.level;
            state.level = level::step_up(state.level);
        }
        DimmerAction::DimDown => {
            if state.level == level::OFF {
                // Holding dim down on a switched off dimmer goes to full
                if state.idle_for(now) > PRESS_GAP {
                    state.ramp_direction = RampDirection::Up;
                    state.level = level::MAX;
                }
            } else {
                state.ramp_direction = RampDirection::Down;
                state.previous_level = state.level;
                state.level = level::step_down(state.level);
            }
        }
        DimmerAction::Ramp => ramp(state, now),
        DimmerAction::NoChange => {}
    }
}

fn ramp(state: &mut DimmerState, now: Instant) {
    let idle = state.idle_for(now);
    if let Some(until) = state.ramp_debounce_until {
        if idle > PRESS_GAP {
            state.ramp_debounce_until = None;
        } else if now < until {
            return;
        }
    }
    // A new press of the ramp button reverses the direction
    if state.last_command == Some(Fs20Command::DimUpDown) && idle > PRESS_GAP {
        state.ramp_direction = state.ramp_direction.reversed();
    }
    if state.level <= level::MIN {
        state.ramp_direction = RampDirection::Down;
    } else if state.level >= level::MAX {
        state.ramp_direction = RampDirection::Up;
    }
    state.level = match state.ramp_direction {
        RampDirection::Down => level::step_up(state.level),
        RampDirection::Up => level::step_down(state.level),
    };
    if state.level <= level::MIN || state.level >= level::MAX {
        state.ramp_debounce_until = Some(now + RAMP_END_DEBOUNCE);
    }
}

#[cfg(test)]
mod test {
    use super::DimmerEngine;
    use crate::common::address::DeviceAddress;
    use crate::common::cmd_defs::Fs20Command;
    use crate::common::level;
    use crate::dimmer::state::RampDirection;
    use std::time::{Duration, Instant};

    const ADDR: DeviceAddress = DeviceAddress::fs20(0x1234, 0x01);

    struct Clock(Instant);
    impl Clock {
        fn at(&self, ms: u64) -> Instant {
            self.0 + Duration::from_millis(ms)
        }
    }

    fn engine_at_level(level: u8, clock: &Clock) -> DimmerEngine {
        let mut engine = DimmerEngine::new();
        if level > 0 {
            engine.apply(&ADDR, Fs20Command::Dim(level), true, clock.at(0));
        }
        engine
    }

    #[test]
    fn new_dimmer_test() {
        let clock = Clock(Instant::now());
        let mut engine = DimmerEngine::new();
        assert!(engine.state(&ADDR).is_none());
        let (state, accepted) = engine.apply(&ADDR, Fs20Command::SendState, false, clock.at(0));
        assert!(accepted);
        assert_eq!(state.level(), 0);
        assert_eq!(state.previous_level(), 100);
        assert_eq!(state.ramp_direction(), RampDirection::Down);
        assert_eq!(engine.len(), 1);
    }

    #[test]
    fn duplicate_test() {
        let clock = Clock(Instant::now());
        let mut engine = engine_at_level(50, &clock);
        let (s, a) = engine.apply(&ADDR, Fs20Command::DimUp, false, clock.at(1000));
        assert!(a);
        assert_eq!(s.level(), 56);
        let (s, a) = engine.apply(&ADDR, Fs20Command::DimUp, false, clock.at(1100));
        assert!(!a);
        assert_eq!(s.level(), 56);
        // Outside the window it counts again
        let (s, a) = engine.apply(&ADDR, Fs20Command::DimUp, false, clock.at(1230));
        assert!(a);
        assert_eq!(s.level(), 62);
        // Different command inside the window is not a duplicate
        let (s, a) = engine.apply(&ADDR, Fs20Command::DimDown, false, clock.at(1250));
        assert!(a);
        assert_eq!(s.level(), 56);
    }

    #[test]
    fn duplicate_alias_test() {
        let clock = Clock(Instant::now());
        let mut engine = DimmerEngine::new();
        let a: Fs20Command = "dim06%".parse().unwrap();
        let b: Fs20Command = "01".parse().unwrap();
        assert!(engine.apply(&ADDR, a, false, clock.at(0)).1);
        assert!(!engine.apply(&ADDR, b, false, clock.at(50)).1);
    }

    #[test]
    fn forced_test() {
        let clock = Clock(Instant::now());
        let mut engine = DimmerEngine::new();
        assert!(engine.apply(&ADDR, Fs20Command::Dim(43), true, clock.at(0)).1);
        assert!(engine.apply(&ADDR, Fs20Command::Dim(43), true, clock.at(0)).1);
        assert!(engine.apply(&ADDR, Fs20Command::Dim(43), true, clock.at(10)).1);
    }

    #[test]
    fn off_on_test() {
        let clock = Clock(Instant::now());
        let mut engine = engine_at_level(62, &clock);
        let (s, _) = engine.apply(&ADDR, Fs20Command::Off, false, clock.at(1000));
        assert_eq!(s.level(), 0);
        assert_eq!(s.previous_level(), 62);
        let (s, _) = engine.apply(&ADDR, Fs20Command::On, false, clock.at(2000));
        assert_eq!(s.level(), 62);
        // On while on changes nothing
        let (s, _) = engine.apply(&ADDR, Fs20Command::Dim(25), true, clock.at(3000));
        assert_eq!(s.level(), 25);
        let (s, _) = engine.apply(&ADDR, Fs20Command::On, false, clock.at(4000));
        assert_eq!(s.level(), 25);
    }

    #[test]
    fn off_when_off_keeps_previous_test() {
        let clock = Clock(Instant::now());
        let mut engine = engine_at_level(31, &clock);
        engine.apply(&ADDR, Fs20Command::Off, false, clock.at(1000));
        let (s, _) = engine.apply(&ADDR, Fs20Command::OffForTimer, false, clock.at(2000));
        assert_eq!(s.level(), 0);
        assert_eq!(s.previous_level(), 31);
    }

    #[test]
    fn toggle_test() {
        let clock = Clock(Instant::now());
        let mut engine = DimmerEngine::new();
        let (s, _) = engine.apply(&ADDR, Fs20Command::Toggle, false, clock.at(0));
        assert_eq!(s.level(), 100);
        let (s, _) = engine.apply(&ADDR, Fs20Command::Toggle, false, clock.at(1000));
        assert_eq!(s.level(), 0);
        assert_eq!(s.previous_level(), 100);
    }

    #[test]
    fn dim_up_test() {
        let clock = Clock(Instant::now());
        let mut engine = engine_at_level(56, &clock);
        let (s, _) = engine.apply(&ADDR, Fs20Command::DimUp, false, clock.at(1000));
        assert_eq!(s.level(), 62);
        assert_eq!(s.previous_level(), 56);
        assert_eq!(s.ramp_direction(), RampDirection::Up);

        let mut engine = engine_at_level(100, &clock);
        let (s, _) = engine.apply(&ADDR, Fs20Command::DimUp, false, clock.at(1000));
        assert_eq!(s.level(), 100);
    }

    #[test]
    fn dim_down_test() {
        let clock = Clock(Instant::now());
        let mut engine = engine_at_level(12, &clock);
        let (s, _) = engine.apply(&ADDR, Fs20Command::DimDown, false, clock.at(1000));
        assert_eq!(s.level(), 6);
        assert_eq!(s.ramp_direction(), RampDirection::Down);
        let (s, _) = engine.apply(&ADDR, Fs20Command::DimDown, false, clock.at(2000));
        assert_eq!(s.level(), 6);
    }

    #[test]
    fn dim_down_from_off_test() {
        let clock = Clock(Instant::now());
        let mut engine = DimmerEngine::new();
        engine.apply(&ADDR, Fs20Command::Off, false, clock.at(0));
        // Right after another command nothing happens
        let (s, a) = engine.apply(&ADDR, Fs20Command::DimDown, false, clock.at(300));
        assert!(a);
        assert_eq!(s.level(), 0);
        let (s, _) = engine.apply(&ADDR, Fs20Command::DimDown, false, clock.at(800));
        assert_eq!(s.level(), 100);
        assert_eq!(s.ramp_direction(), RampDirection::Up);
    }

    #[test]
    fn ramp_top_debounce_test() {
        let clock = Clock(Instant::now());
        let mut engine = engine_at_level(93, &clock);
        let (s, _) = engine.apply(&ADDR, Fs20Command::DimUpDown, false, clock.at(1000));
        assert_eq!(s.level(), 100);
        assert_eq!(s.ramp_debounce_until(), Some(clock.at(1800)));

        // Held button inside the debounce window is ignored
        let (s, a) = engine.apply(&ADDR, Fs20Command::DimUpDown, false, clock.at(1200));
        assert!(a);
        assert_eq!(s.level(), 100);
        let (s, _) = engine.apply(&ADDR, Fs20Command::DimUpDown, false, clock.at(1400));
        assert_eq!(s.level(), 100);

        // A new press clears the debounce and reverses
        let (s, _) = engine.apply(&ADDR, Fs20Command::DimUpDown, false, clock.at(1900));
        assert_eq!(s.level(), 93);
        assert_eq!(s.ramp_direction(), RampDirection::Up);
        assert_eq!(s.ramp_debounce_until(), None);
    }

    #[test]
    fn ramp_held_at_top_test() {
        let clock = Clock(Instant::now());
        let mut engine = engine_at_level(93, &clock);
        engine.apply(&ADDR, Fs20Command::DimUpDown, false, clock.at(1000));
        let mut t = 1000;
        while t < 1600 {
            t += 200;
            let (s, _) = engine.apply(&ADDR, Fs20Command::DimUpDown, false, clock.at(t));
            assert_eq!(s.level(), 100);
        }
        // Debounce has run out while the button is still held
        let (s, _) = engine.apply(&ADDR, Fs20Command::DimUpDown, false, clock.at(1800));
        assert_eq!(s.level(), 93);
        let (s, _) = engine.apply(&ADDR, Fs20Command::DimUpDown, false, clock.at(2000));
        assert_eq!(s.level(), 87);
    }

    #[test]
    fn ramp_alternates_test() {
        let clock = Clock(Instant::now());
        let mut engine = engine_at_level(50, &clock);
        let (s, _) = engine.apply(&ADDR, Fs20Command::DimUpDown, false, clock.at(1000));
        assert_eq!(s.level(), 56);
        let (s, _) = engine.apply(&ADDR, Fs20Command::DimUpDown, false, clock.at(1200));
        assert_eq!(s.level(), 62);
        // Released and pressed again
        let (s, _) = engine.apply(&ADDR, Fs20Command::DimUpDown, false, clock.at(2000));
        assert_eq!(s.level(), 56);
        let (s, _) = engine.apply(&ADDR, Fs20Command::DimUpDown, false, clock.at(3000));
        assert_eq!(s.level(), 62);
    }

    #[test]
    fn ramp_from_off_test() {
        let clock = Clock(Instant::now());
        let mut engine = DimmerEngine::new();
        let (s, _) = engine.apply(&ADDR, Fs20Command::DimUpDown, false, clock.at(0));
        assert_eq!(s.level(), 6);
        assert_eq!(s.ramp_debounce_until(), Some(clock.at(800)));
    }

    #[test]
    fn unrecognized_test() {
        let clock = Clock(Instant::now());
        let mut engine = engine_at_level(75, &clock);
        let (s, a) = engine.apply(&ADDR, Fs20Command::Reset, false, clock.at(1000));
        assert!(a);
        assert_eq!(s.level(), 75);
        assert_eq!(s.last_command(), Some(Fs20Command::Reset));
        assert_eq!(s.last_command_at(), Some(clock.at(1000)));
    }

    #[test]
    fn levels_stay_on_table_test() {
        let clock = Clock(Instant::now());
        let mut engine = DimmerEngine::new();
        let cmds = [
            Fs20Command::DimUp,
            Fs20Command::DimUpDown,
            Fs20Command::Toggle,
            Fs20Command::DimDown,
            Fs20Command::On,
            Fs20Command::Dim(37),
            Fs20Command::DimUpDown,
            Fs20Command::Off,
            Fs20Command::OnForTimer,
            Fs20Command::DimDown,
        ];
        let mut t = 0;
        for round in 0..40u64 {
            for (i, cmd) in cmds.iter().enumerate() {
                t += 37 + (round * 13 + i as u64 * 71) % 500;
                let (s, _) = engine.apply(&ADDR, *cmd, false, clock.at(t));
                assert!(level::is_valid(s.level()), "level {}", s.level());
                if s.level() == 0 {
                    assert_ne!(s.previous_level(), 0);
                }
            }
        }
    }
}
