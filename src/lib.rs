pub mod error;

pub mod common {
    pub mod address;
    pub mod cmd_defs;
    pub mod level;
}

pub mod dimmer {
    pub mod engine;
    pub mod state;
}

pub mod utils {
    pub mod address_map;
    pub mod dyn_future;
}

pub mod drivers;

pub mod bridge {
    pub mod connectivity;
    pub mod event_loop;
    pub mod router;
    pub mod status;
    pub mod topic;
    pub mod watchdog;
}

pub mod mqtt {
    pub mod client;
}

pub mod config;
