use super::connectivity::{Connectivity, ConnectivityAggregator};
use super::router::CommandRouter;
use super::status::{connected_topic, StatusPublisher};
use super::watchdog::{wait_deadline, Expiry, LivenessWatchdog};
use crate::drivers::cul::codec;
use crate::drivers::driver::{CulBusEvent, CulBusEventType, CulDriver, CulFrame};
use log::{debug, error, info, warn};
use std::future::Future;
use std::time::{Duration, Instant};
use tokio::select;
use tokio::sync::mpsc;

/// Events from the broker connection
#[derive(Debug, Clone, PartialEq)]
pub enum MqttEvent {
    Connected,
    Disconnected,
    Message { topic: String, payload: String },
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Exit {
    Shutdown,
    WatchdogExpired,
    DriverFailed,
    BrokerGone,
}

/// Owns all bridge state. Events from the broker, the dongle and the
/// watchdog are handled one at a time.
pub struct Bridge {
    base: String,
    router: CommandRouter,
    connectivity: ConnectivityAggregator,
    watchdog: LivenessWatchdog,
}

impl Bridge {
    pub fn new(base: &str, router: CommandRouter, watchdog_window: Duration) -> Bridge {
        Bridge {
            base: base.to_string(),
            router,
            connectivity: ConnectivityAggregator::new(),
            watchdog: LivenessWatchdog::new(watchdog_window, Instant::now()),
        }
    }

    pub fn router(&self) -> &CommandRouter {
        &self.router
    }

    pub fn connectivity(&self) -> Connectivity {
        self.connectivity.current()
    }

    async fn publish_connectivity(&self, value: Connectivity, publisher: &dyn StatusPublisher) {
        info!("Connectivity {}", value);
        if let Err(e) = publisher
            .publish(connected_topic(&self.base), value.to_string(), true)
            .await
        {
            error!("Failed to publish connectivity: {}", e);
        }
    }

    async fn handle_mqtt(
        &mut self,
        event: MqttEvent,
        driver: &mut dyn CulDriver,
        publisher: &dyn StatusPublisher,
    ) {
        match event {
            MqttEvent::Connected => {
                let value = self.connectivity.broker_handshake();
                self.publish_connectivity(value, publisher).await;
            }
            MqttEvent::Disconnected => {
                self.connectivity.set_broker(false);
            }
            MqttEvent::Message { topic, payload } => {
                debug!("mqtt < {} {}", topic, payload);
                if let Err(e) = self
                    .router
                    .handle_message(&topic, &payload, Instant::now(), driver, publisher)
                    .await
                {
                    error!("{}", e);
                }
            }
        }
    }

    async fn handle_cul(&mut self, event: CulBusEvent, publisher: &dyn StatusPublisher) {
        match event.event_type {
            CulBusEventType::Ready => {
                info!("CUL ready");
                if let Some(value) = self.connectivity.set_rf(true) {
                    self.publish_connectivity(value, publisher).await;
                }
            }
            CulBusEventType::Closed => {
                warn!("CUL closed");
                if let Some(value) = self.connectivity.set_rf(false) {
                    self.publish_connectivity(value, publisher).await;
                }
            }
            CulBusEventType::Frame(frame) => {
                self.watchdog.rearm(event.timestamp);
                debug!("CUL < {}", frame.raw);
                if let Err(e) = self
                    .router
                    .handle_frame(&frame, event.timestamp, publisher)
                    .await
                {
                    error!("{}", e);
                }
            }
            CulBusEventType::Line(line) => {
                self.watchdog.rearm(event.timestamp);
                debug!("CUL < {}", line);
            }
        }
    }

    /// Returns true if the watchdog gave up
    async fn handle_watchdog(&mut self, driver: &mut dyn CulDriver) -> bool {
        match self.watchdog.expire(Instant::now()) {
            Expiry::Probe => {
                warn!("No traffic from CUL, requesting version");
                let res = driver
                    .send_frame(CulFrame::Raw(codec::VERSION_QUERY.to_string()))
                    .await;
                if !res.is_ok() {
                    warn!("Version request failed: {}", res);
                }
                false
            }
            Expiry::Fatal => {
                error!("Still no traffic from CUL after probing, giving up");
                true
            }
        }
    }

    /// Run until `shutdown` completes or something fatal happens.
    pub async fn run<F>(
        &mut self,
        driver: &mut dyn CulDriver,
        publisher: &dyn StatusPublisher,
        mqtt_events: &mut mpsc::Receiver<MqttEvent>,
        shutdown: F,
    ) -> Exit
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        loop {
            let deadline = self.watchdog.deadline();
            select! {
                res = mqtt_events.recv() => {
                    match res {
                        Some(event) => self.handle_mqtt(event, driver, publisher).await,
                        None => {
                            error!("Broker connection task ended");
                            return Exit::BrokerGone;
                        }
                    }
                },
                res = driver.next_bus_event() => {
                    match res {
                        Ok(event) => self.handle_cul(event, publisher).await,
                        Err(e) => {
                            error!("CUL driver failed: {}", e);
                            return Exit::DriverFailed;
                        }
                    }
                },
                _ = wait_deadline(deadline) => {
                    if self.handle_watchdog(driver).await {
                        return Exit::WatchdogExpired;
                    }
                },
                _ = &mut shutdown => {
                    info!("Shutting down");
                    return Exit::Shutdown;
                }
            }
        }
    }
}
