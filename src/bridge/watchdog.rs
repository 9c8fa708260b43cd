use log::debug;
use std::time::{Duration, Instant};

/// What to do when the watchdog expires
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Expiry {
    /// Ask the dongle for its version to provoke some traffic
    Probe,
    /// No traffic even after probing, give up
    Fatal,
}

/// Detects a silent dongle. Any traffic rearms it. The first expiry
/// results in a probe, a second one without traffic in between is fatal.
#[derive(Debug)]
pub struct LivenessWatchdog {
    window: Option<Duration>,
    deadline: Option<Instant>,
    probed: bool,
}

impl LivenessWatchdog {
    /// A zero window disables the watchdog
    pub fn new(window: Duration, now: Instant) -> LivenessWatchdog {
        let window = if window.is_zero() { None } else { Some(window) };
        LivenessWatchdog {
            window,
            deadline: window.map(|w| now + w),
            probed: false,
        }
    }

    pub fn enabled(&self) -> bool {
        self.window.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn rearm(&mut self, now: Instant) {
        self.probed = false;
        self.deadline = self.window.map(|w| now + w);
    }

    /// Call when the deadline has passed. A probe also restarts the window.
    pub fn expire(&mut self, now: Instant) -> Expiry {
        if self.probed {
            debug!("Watchdog expired after probe");
            self.deadline = None;
            Expiry::Fatal
        } else {
            debug!("Watchdog expired, probing");
            self.probed = true;
            self.deadline = self.window.map(|w| now + w);
            Expiry::Probe
        }
    }
}

/// Completes at `deadline`, never if there is none
pub async fn wait_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(d) => tokio::time::sleep_until(d.into()).await,
        None => futures::future::pending().await,
    }
}
