use crate::common::cmd_defs::Fs20Command;
use crate::common::level;
use std::time::{Duration, Instant};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RampDirection {
    Up,
    Down,
}

impl RampDirection {
    pub fn reversed(self) -> RampDirection {
        match self {
            RampDirection::Up => RampDirection::Down,
            RampDirection::Down => RampDirection::Up,
        }
    }
}

/// Tracked state of one dimmer. Only the engine changes it.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct DimmerState {
    pub(super) level: u8,
    // Restored by on and toggle
    pub(super) previous_level: u8,
    pub(super) last_command: Option<Fs20Command>,
    pub(super) last_command_at: Option<Instant>,
    // Direction of the last manual dim. A bidirectional ramp moves the
    // other way.
    pub(super) ramp_direction: RampDirection,
    pub(super) ramp_debounce_until: Option<Instant>,
}

impl DimmerState {
    pub fn new() -> DimmerState {
        DimmerState {
            level: level::OFF,
            previous_level: level::MAX,
            last_command: None,
            last_command_at: None,
            ramp_direction: RampDirection::Down,
            ramp_debounce_until: None,
        }
    }

    pub fn level(&self) -> u8 {
        self.level
    }

    pub fn previous_level(&self) -> u8 {
        self.previous_level
    }

    pub fn last_command(&self) -> Option<Fs20Command> {
        self.last_command
    }

    pub fn last_command_at(&self) -> Option<Instant> {
        self.last_command_at
    }

    pub fn ramp_direction(&self) -> RampDirection {
        self.ramp_direction
    }

    pub fn ramp_debounce_until(&self) -> Option<Instant> {
        self.ramp_debounce_until
    }

    /// Time since the last accepted command. A dimmer that has never seen a
    /// command counts as idle forever.
    pub(super) fn idle_for(&self, now: Instant) -> Duration {
        match self.last_command_at {
            Some(t) => now.saturating_duration_since(t),
            None => Duration::MAX,
        }
    }
}

impl Default for DimmerState {
    fn default() -> Self {
        DimmerState::new()
    }
}
