use crate::bridge::event_loop::MqttEvent;
use crate::bridge::status::{connected_topic, StatusPublisher};
use crate::error::{DynError, DynResult};
use crate::utils::dyn_future::DynFuture;
use log::{debug, error, info, warn};
use rumqttc::{AsyncClient, Event, EventLoop, LastWill, MqttOptions, Packet, QoS};
use std::error::Error;
use std::fmt;
use std::time::Duration;
use tokio::sync::mpsc;

pub const DEFAULT_PORT: u16 = 1883;
const KEEP_ALIVE: Duration = Duration::from_secs(30);
const RETRY_DELAY: Duration = Duration::from_secs(1);
const REQUEST_CAPACITY: usize = 64;
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, PartialEq)]
pub enum UrlError {
    UnsupportedScheme(String),
    MissingHost,
    InvalidPort(String),
}

impl Error for UrlError {}

impl fmt::Display for UrlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UrlError::UnsupportedScheme(s) => write!(f, "Unsupported URL scheme {}", s),
            UrlError::MissingHost => write!(f, "No host in broker URL"),
            UrlError::InvalidPort(p) => write!(f, "Invalid port {}", p),
        }
    }
}

/// Parse `mqtt://host[:port]`, `tcp://host[:port]` or `host[:port]`
pub fn parse_mqtt_url(url: &str) -> Result<(String, u16), UrlError> {
    let rest = match url.split_once("://") {
        Some(("mqtt" | "tcp", rest)) => rest,
        Some((scheme, _)) => return Err(UrlError::UnsupportedScheme(scheme.to_string())),
        None => url,
    };
    let rest = rest.trim_end_matches('/');
    let (host, port) = match rest.rsplit_once(':') {
        Some((host, port)) => (
            host,
            port.parse()
                .map_err(|_| UrlError::InvalidPort(port.to_string()))?,
        ),
        None => (rest, DEFAULT_PORT),
    };
    if host.is_empty() {
        return Err(UrlError::MissingHost);
    }
    Ok((host.to_string(), port))
}

pub fn qos_from_level(level: u8) -> Option<QoS> {
    match level {
        0 => Some(QoS::AtMostOnce),
        1 => Some(QoS::AtLeastOnce),
        2 => Some(QoS::ExactlyOnce),
        _ => None,
    }
}

#[derive(Debug, Clone)]
pub struct MqttSettings {
    pub base: String,
    pub url: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub qos: QoS,
}

/// Publishing half of the broker connection
#[derive(Clone)]
pub struct MqttLink {
    client: AsyncClient,
    qos: QoS,
    base: String,
}

impl MqttLink {
    /// Mark the bridge as gone and close the connection. Gives up after
    /// `SHUTDOWN_TIMEOUT` if the request queue does not drain.
    pub async fn shutdown(&self) -> DynResult<()> {
        let close = async {
            self.client
                .publish(connected_topic(&self.base), self.qos, true, "0")
                .await?;
            self.client.disconnect().await
        };
        tokio::time::timeout(SHUTDOWN_TIMEOUT, close).await??;
        Ok(())
    }
}

/// Never waits for the broker. With the request queue full, e.g. while
/// the broker is unreachable, the publication fails instead.
impl StatusPublisher for MqttLink {
    fn publish(&self, topic: String, payload: String, retain: bool) -> DynFuture<'_, DynResult<()>> {
        debug!("mqtt > {} {}", topic, payload);
        let res = self
            .client
            .try_publish(topic, self.qos, retain, payload)
            .map_err(DynError::from);
        Box::pin(std::future::ready(res))
    }
}

/// Set up the client. Nothing happens until the returned event loop is
/// polled by `pump_events`.
pub fn connect(settings: &MqttSettings) -> Result<(MqttLink, EventLoop), UrlError> {
    let (host, port) = parse_mqtt_url(&settings.url)?;
    let client_id = format!("{}_{:08x}", settings.base, rand::random::<u32>());
    info!("Connecting to {}:{} as {}", host, port, client_id);
    let mut options = MqttOptions::new(client_id, host, port);
    options.set_keep_alive(KEEP_ALIVE);
    options.set_last_will(LastWill::new(
        connected_topic(&settings.base),
        "0",
        settings.qos,
        true,
    ));
    if let Some(username) = &settings.username {
        options.set_credentials(
            username.clone(),
            settings.password.clone().unwrap_or_default(),
        );
    }
    let (client, eventloop) = AsyncClient::new(options, REQUEST_CAPACITY);
    Ok((
        MqttLink {
            client,
            qos: settings.qos,
            base: settings.base.clone(),
        },
        eventloop,
    ))
}

/// Drive the connection, resubscribing after every (re)connect. Ends when
/// the receiving side of `events` is gone.
pub async fn pump_events(
    mut eventloop: EventLoop,
    link: MqttLink,
    subscriptions: Vec<String>,
    events: mpsc::Sender<MqttEvent>,
) {
    let mut connected = false;
    loop {
        let event = match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                info!("Connected to broker");
                for topic in &subscriptions {
                    debug!("Subscribing to {}", topic);
                    if let Err(e) = link.client.try_subscribe(topic.as_str(), link.qos) {
                        error!("Failed to subscribe to {}: {}", topic, e);
                    }
                }
                connected = true;
                MqttEvent::Connected
            }
            Ok(Event::Incoming(Packet::Publish(msg))) => MqttEvent::Message {
                topic: msg.topic,
                payload: String::from_utf8_lossy(&msg.payload).into_owned(),
            },
            Ok(_) => continue,
            Err(e) => {
                if connected {
                    warn!("Broker connection lost: {}", e);
                    connected = false;
                    if events.send(MqttEvent::Disconnected).await.is_err() {
                        break;
                    }
                } else {
                    debug!("Broker connection failed: {}", e);
                }
                tokio::time::sleep(RETRY_DELAY).await;
                continue;
            }
        };
        if events.send(event).await.is_err() {
            break;
        }
    }
}

#[cfg(test)]
mod test {
    use super::{connect, parse_mqtt_url, qos_from_level, MqttSettings, UrlError, REQUEST_CAPACITY};
    use crate::bridge::status::StatusPublisher;
    use rumqttc::QoS;
    use std::time::Duration;

    fn unreachable_broker() -> MqttSettings {
        MqttSettings {
            base: "fs20dimmer".to_string(),
            url: "mqtt://127.0.0.1:1".to_string(),
            username: None,
            password: None,
            qos: QoS::AtMostOnce,
        }
    }

    #[test]
    fn url_test() {
        assert_eq!(
            parse_mqtt_url("mqtt://127.0.0.1").unwrap(),
            ("127.0.0.1".to_string(), 1883)
        );
        assert_eq!(
            parse_mqtt_url("tcp://broker.local:1884").unwrap(),
            ("broker.local".to_string(), 1884)
        );
        assert_eq!(
            parse_mqtt_url("broker:2000/").unwrap(),
            ("broker".to_string(), 2000)
        );
        assert_eq!(
            parse_mqtt_url("ws://broker"),
            Err(UrlError::UnsupportedScheme("ws".to_string()))
        );
        assert_eq!(
            parse_mqtt_url("mqtt://broker:x"),
            Err(UrlError::InvalidPort("x".to_string()))
        );
        assert_eq!(parse_mqtt_url("mqtt://:1883"), Err(UrlError::MissingHost));
    }

    #[test]
    fn qos_test() {
        assert_eq!(qos_from_level(0), Some(QoS::AtMostOnce));
        assert_eq!(qos_from_level(2), Some(QoS::ExactlyOnce));
        assert_eq!(qos_from_level(3), None);
    }

    #[tokio::test]
    async fn publish_without_broker_test() {
        // The event loop is never polled so nothing leaves the queue
        let (link, _eventloop) = connect(&unreachable_broker()).unwrap();
        let mut failed = 0;
        for i in 0..REQUEST_CAPACITY + 10 {
            let res = tokio::time::timeout(
                Duration::from_secs(1),
                link.publish(format!("fs20dimmer/status/{}", i), "100".to_string(), true),
            )
            .await
            .expect("publish waited for the broker");
            if res.is_err() {
                failed += 1;
            }
        }
        assert_eq!(failed, 10);

        let res = tokio::time::timeout(Duration::from_secs(5), link.shutdown()).await;
        assert!(matches!(res, Ok(Err(_))));
    }
}
