//! Brightness levels of an FS20 dimmer.
//!
//! A dimmer knows 16 brightness steps plus off. All level handling is done
//! with table lookups so that a level is always one of the values in
//! [`STEPS`] or 0.

/// Brightness in percent for dim codes 0x01..=0x10
pub const STEPS: [u8; 16] = [6, 12, 18, 25, 31, 37, 43, 50, 56, 62, 68, 75, 81, 87, 93, 100];

pub const OFF: u8 = 0;
pub const MIN: u8 = 6;
pub const MAX: u8 = 100;

pub fn is_valid(level: u8) -> bool {
    level == OFF || STEPS.contains(&level)
}

/// Round a requested percentage up to the nearest step. Anything at or
/// below zero is off, anything above 100 is full brightness.
pub fn quantize(percent: i64) -> u8 {
    if percent <= 0 {
        return OFF;
    }
    STEPS
        .iter()
        .copied()
        .find(|&s| percent <= s as i64)
        .unwrap_or(MAX)
}

/// Smallest step strictly greater than `level`, saturating at 100
pub fn step_up(level: u8) -> u8 {
    STEPS.iter().copied().find(|&s| s > level).unwrap_or(MAX)
}

/// Largest step strictly less than `level`, saturating at the lowest step.
/// Dimming down never switches the dimmer off.
pub fn step_down(level: u8) -> u8 {
    STEPS
        .iter()
        .rev()
        .copied()
        .find(|&s| s < level)
        .unwrap_or(MIN)
}

/// Dim code (1..=16) for a level, None for off or non-step levels
pub fn dim_code(level: u8) -> Option<u8> {
    STEPS.iter().position(|&s| s == level).map(|i| i as u8 + 1)
}

/// Level for a dim code (1..=16)
pub fn from_dim_code(code: u8) -> Option<u8> {
    STEPS.get((code as usize).checked_sub(1)?).copied()
}
