use std::fmt;

/// Connection status as published on `<base>/connected`
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Connectivity {
    /// Nothing connected, also what the broker publishes as last will
    Down = 0,
    /// Broker reachable but not the dongle
    Broker = 1,
    /// Broker and dongle both up
    Full = 2,
}

impl Connectivity {
    pub fn value(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for Connectivity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value())
    }
}

/// Combines the broker and dongle link states into a single value.
#[derive(Debug, Default)]
pub struct ConnectivityAggregator {
    broker: bool,
    rf: bool,
}

impl ConnectivityAggregator {
    pub fn new() -> ConnectivityAggregator {
        ConnectivityAggregator::default()
    }

    pub fn current(&self) -> Connectivity {
        match (self.broker, self.rf) {
            (false, _) => Connectivity::Down,
            (true, false) => Connectivity::Broker,
            (true, true) => Connectivity::Full,
        }
    }

    /// Value to publish, if any. Nothing can be published without the
    /// broker.
    fn publishable(&self, before: Connectivity) -> Option<Connectivity> {
        let now = self.current();
        if self.broker && now != before {
            Some(now)
        } else {
            None
        }
    }

    /// The broker accepted a connection. The retained value may have been
    /// replaced by the last will, so it is always republished.
    pub fn broker_handshake(&mut self) -> Connectivity {
        self.broker = true;
        self.current()
    }

    pub fn set_broker(&mut self, up: bool) -> Option<Connectivity> {
        let before = self.current();
        self.broker = up;
        self.publishable(before)
    }

    pub fn set_rf(&mut self, up: bool) -> Option<Connectivity> {
        let before = self.current();
        self.rf = up;
        self.publishable(before)
    }
}
