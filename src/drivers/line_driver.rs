//! Driver task shared by all CUL transports. The transport is opened by a
//! connect function so that it can be reopened when the dongle goes away.

use super::cul::codec;
use super::driver::{CulBusEvent, CulBusEventResult, CulBusEventType, CulDriver, CulFrame, CulSendResult};
use super::utils::CulReq;
use crate::utils::dyn_future::DynFuture;
use futures::FutureExt;
use log::{debug, info, warn};
use std::error::Error;
use std::fmt;
use std::io;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::select;
use tokio::sync::{mpsc, oneshot};

pub const RECONNECT_DELAY: Duration = Duration::from_secs(5);

pub trait CulStream: AsyncRead + AsyncWrite + Send + Unpin {}
impl<T> CulStream for T where T: AsyncRead + AsyncWrite + Send + Unpin {}

pub type Connect = Box<dyn FnMut() -> DynFuture<'static, io::Result<Box<dyn CulStream>>> + Send>;

#[derive(Debug)]
enum DriverError {
    QueueFull,
    ThreadError,
}

impl Error for DriverError {}

impl fmt::Display for DriverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DriverError::QueueFull => write!(f, "Command queue full"),
            DriverError::ThreadError => write!(f, "Driver task gone"),
        }
    }
}

enum SessionEnd {
    Closed,
    Shutdown,
}

async fn write_line<W>(writer: &mut W, line: &str) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    debug!("CUL > {}", line);
    writer.write_all(line.as_bytes()).await?;
    writer.write_all(b"\r\n").await?;
    writer.flush().await
}

async fn session(
    stream: Box<dyn CulStream>,
    recv: &mut mpsc::Receiver<CulReq>,
    events: &mpsc::Sender<CulBusEvent>,
) -> SessionEnd {
    let (rd, mut wr) = tokio::io::split(stream);
    let mut reader = BufReader::new(rd);
    if let Err(e) = write_line(&mut wr, codec::INIT_REPORTING).await {
        warn!("Failed to initialize CUL: {}", e);
        return SessionEnd::Closed;
    }
    if events
        .send(CulBusEvent::now(CulBusEventType::Ready))
        .await
        .is_err()
    {
        return SessionEnd::Shutdown;
    }
    let mut buf = Vec::new();
    loop {
        select! {
            req = recv.recv() => {
                let Some(req) = req else {
                    return SessionEnd::Shutdown;
                };
                match write_line(&mut wr, &codec::encode(&req.frame)).await {
                    Ok(()) => {
                        let _ = req.reply.send(CulSendResult::Ok);
                    }
                    Err(e) => {
                        warn!("Failed to write to CUL: {}", e);
                        let _ = req.reply.send(CulSendResult::DriverError(Box::new(e)));
                        return SessionEnd::Closed;
                    }
                }
            }
            // read_until keeps partial lines in buf when cancelled
            r = reader.read_until(b'\n', &mut buf) => {
                match r {
                    Ok(0) => return SessionEnd::Closed,
                    Ok(_) => {
                        let line = String::from_utf8_lossy(&buf).trim().to_string();
                        buf.clear();
                        if line.is_empty() {
                            continue;
                        }
                        debug!("CUL < {}", line);
                        let event_type = match codec::parse_line(&line) {
                            Some(frame) => CulBusEventType::Frame(frame),
                            None => CulBusEventType::Line(line),
                        };
                        if events.send(CulBusEvent::now(event_type)).await.is_err() {
                            return SessionEnd::Shutdown;
                        }
                    }
                    Err(e) => {
                        warn!("Failed to read from CUL: {}", e);
                        return SessionEnd::Closed;
                    }
                }
            }
        }
    }
}

/// Wait until `end`, refusing requests meanwhile. Returns false if the
/// driver has been dropped.
async fn refuse_until(recv: &mut mpsc::Receiver<CulReq>, end: Instant) -> bool {
    let sleep = tokio::time::sleep_until(end.into());
    tokio::pin!(sleep);
    loop {
        select! {
            _ = &mut sleep => return true,
            req = recv.recv() => match req {
                Some(req) => {
                    let _ = req.reply.send(CulSendResult::NotConnected);
                }
                None => return false,
            }
        }
    }
}

async fn driver_thread(
    mut connect: Connect,
    mut recv: mpsc::Receiver<CulReq>,
    events: mpsc::Sender<CulBusEvent>,
    retry: Duration,
) {
    loop {
        match connect().await {
            Ok(stream) => {
                info!("CUL connected");
                match session(stream, &mut recv, &events).await {
                    SessionEnd::Shutdown => break,
                    SessionEnd::Closed => {
                        info!("CUL closed");
                        if events
                            .send(CulBusEvent::now(CulBusEventType::Closed))
                            .await
                            .is_err()
                        {
                            break;
                        }
                    }
                }
            }
            Err(e) => warn!("Failed to open CUL: {}", e),
        }
        if !refuse_until(&mut recv, Instant::now() + retry).await {
            break;
        }
    }
    debug!("Driver exited");
}

pub struct LineDriver {
    send_cmd: mpsc::Sender<CulReq>,
    rx_events: mpsc::Receiver<CulBusEvent>,
}

impl LineDriver {
    /// Must be called from within a tokio runtime
    pub fn new(connect: Connect, retry: Duration) -> LineDriver {
        let (tx_cmd, rx_cmd) = mpsc::channel::<CulReq>(10);
        let (tx_events, rx_events) = mpsc::channel::<CulBusEvent>(32);
        tokio::spawn(driver_thread(connect, rx_cmd, tx_events, retry));
        LineDriver {
            send_cmd: tx_cmd,
            rx_events,
        }
    }
}

impl CulDriver for LineDriver {
    fn send_frame(&mut self, frame: CulFrame) -> DynFuture<'_, CulSendResult> {
        let (tx, rx) = oneshot::channel();
        let req = CulReq { frame, reply: tx };
        match self.send_cmd.try_send(req) {
            Ok(()) => Box::pin(async {
                match rx.await {
                    Ok(r) => r,
                    Err(e) => CulSendResult::DriverError(Box::new(e)),
                }
            }),
            Err(mpsc::error::TrySendError::Full(_)) => Box::pin(async {
                CulSendResult::DriverError(Box::new(DriverError::QueueFull))
            }),
            Err(mpsc::error::TrySendError::Closed(_)) => Box::pin(async {
                CulSendResult::DriverError(Box::new(DriverError::ThreadError))
            }),
        }
    }

    fn next_bus_event(&mut self) -> DynFuture<'_, CulBusEventResult> {
        Box::pin(
            self.rx_events
                .recv()
                .map(|r| -> CulBusEventResult { r.ok_or_else(|| "Event source closed".into()) }),
        )
    }
}
