use clap::Parser;
use fs20_dimmer as fs20;
use fs20::bridge::event_loop::{Bridge, Exit};
use fs20::bridge::router::CommandRouter;
use fs20::config::{BridgeConfig, CmdArgs};
use fs20::drivers::driver::OpenError;
use fs20::mqtt::client;
use log::{debug, error, info};
use std::process::ExitCode;
use std::time::Duration;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::mpsc;

async fn shutdown_signal() {
    let mut term = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(e) => {
            error!("Failed to install SIGTERM handler: {}", e);
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };
    tokio::select! {
        _ = tokio::signal::ctrl_c() => debug!("SIGINT"),
        _ = term.recv() => debug!("SIGTERM"),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = CmdArgs::parse();
    tracing_subscriber::fmt()
        .with_max_level(args.verbosity.level_filter())
        .init();
    info!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
    if let Err(e) = fs20::drivers::init() {
        error!("Failed to initialize CUL drivers: {}", e);
    }

    let conf = match BridgeConfig::from_args(&args) {
        Ok(c) => c,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    let map = match conf.load_map() {
        Ok(m) => m,
        Err(e) => {
            error!("Failed to load FS20 mapping: {}", e);
            return ExitCode::FAILURE;
        }
    };
    info!("{} mapped devices", map.len());

    let mut driver = match fs20::drivers::open(&conf.cul_driver, conf.cul_params.clone()) {
        Ok(d) => d,
        Err(e) => {
            error!("Failed to open CUL: {}", e);
            if let OpenError::NotFound = e {
                info!("Available drivers:");
                for name in fs20::drivers::driver_names() {
                    info!("  {}", name);
                }
            }
            return ExitCode::FAILURE;
        }
    };

    let (link, eventloop) = match client::connect(&conf.mqtt) {
        Ok(c) => c,
        Err(e) => {
            error!("Invalid broker URL {}: {}", conf.mqtt.url, e);
            return ExitCode::FAILURE;
        }
    };
    let router = CommandRouter::new(&conf.name, map, conf.json_values, conf.retain);
    let (mqtt_tx, mut mqtt_rx) = mpsc::channel(32);
    let pump = tokio::spawn(client::pump_events(
        eventloop,
        link.clone(),
        router.subscriptions().to_vec(),
        mqtt_tx,
    ));

    let mut bridge = Bridge::new(&conf.name, router, conf.watchdog);
    let exit = bridge
        .run(driver.as_mut(), &link, &mut mqtt_rx, shutdown_signal())
        .await;
    match exit {
        Exit::Shutdown => {
            if let Err(e) = link.shutdown().await {
                error!("Failed to disconnect from broker: {}", e);
            }
            drop(mqtt_rx);
            if tokio::time::timeout(Duration::from_secs(2), pump).await.is_err() {
                debug!("Broker connection did not close in time");
            }
            debug!("main done");
            ExitCode::SUCCESS
        }
        _ => {
            error!("Exiting: {:?}", exit);
            ExitCode::FAILURE
        }
    }
}
