//! C4: the raw line-framed TCP connection, with reconnect-with-backoff.
//!
//! `Transport` only moves lines in and out — it knows nothing about
//! envelopes, correlation, or dispatch. That routing lives in
//! [`crate::gateway`], which drains [`Transport::recv_line`] and decodes each
//! line itself.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::GatewayError;

/// Default delay between reconnection attempts, matching the reference
/// gateway's `DEFAULT_RECONNECT_DELAY`.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(2);

pub struct Transport {
    outbound: mpsc::UnboundedSender<String>,
    inbound: Mutex<mpsc::UnboundedReceiver<String>>,
    connected: Arc<AtomicBool>,
    shutdown: Arc<AtomicBool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Transport {
    /// Connects to `host:port`. `reconnect_delay` of `None` disables
    /// reconnection entirely (the negative-delay sentinel in spec terms);
    /// `Some(d)` retries every `d` after an unexpected disconnect.
    pub async fn connect(
        host: impl Into<String>,
        port: u16,
        reconnect_delay: Option<Duration>,
    ) -> Result<Self, GatewayError> {
        let host = host.into();
        let stream =
            TcpStream::connect((host.as_str(), port))
                .await
                .map_err(|source| GatewayError::TransportUnavailable {
                    host: host.clone(),
                    port,
                    source,
                })?;

        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        // The stream above is already live, so reflect that synchronously —
        // `run_connection` re-asserts this itself on every (re)connect, but
        // without setting it here `send_line` could see a stale `false` and
        // fail-fast spuriously before the spawned task gets scheduled.
        let connected = Arc::new(AtomicBool::new(true));
        let shutdown = Arc::new(AtomicBool::new(false));

        let task = tokio::spawn(run_connection(
            host,
            port,
            stream,
            inbound_tx,
            outbound_rx,
            connected.clone(),
            shutdown.clone(),
            reconnect_delay,
        ));

        Ok(Self {
            outbound: outbound_tx,
            inbound: Mutex::new(inbound_rx),
            connected,
            shutdown,
            task: Mutex::new(Some(task)),
        })
    }

    /// Queues a line for the socket; the transport appends the trailing `\n`.
    ///
    /// Fails fast with [`GatewayError::TransportBroken`] while disconnected
    /// or reconnecting, rather than buffering the line for delivery once the
    /// connection comes back — per spec, a message sent while disconnected
    /// is rejected, not queued.
    pub fn send_line(&self, line: String) -> Result<(), GatewayError> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(GatewayError::TransportBroken(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "transport is disconnected",
            )));
        }
        self.outbound.send(line).map_err(|_| GatewayError::Closed)
    }

    /// Awaits the next decoded line, or `None` once the transport has been
    /// closed and will not reconnect further.
    pub async fn recv_line(&self) -> Option<String> {
        self.inbound.lock().await.recv().await
    }

    pub fn is_alive(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Idempotent disconnect: best-effort `{"alive":false}` notice, then
    /// tears down the connection task.
    pub async fn close(&self) {
        if self.shutdown.swap(true, Ordering::SeqCst) {
            return;
        }
        let _ = self.outbound.send(r#"{"alive":false}"#.to_string());
        if let Some(task) = self.task.lock().await.take() {
            let _ = tokio::time::timeout(Duration::from_millis(200), task).await;
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_connection(
    host: String,
    port: u16,
    first_stream: TcpStream,
    inbound_tx: mpsc::UnboundedSender<String>,
    mut outbound_rx: mpsc::UnboundedReceiver<String>,
    connected: Arc<AtomicBool>,
    shutdown: Arc<AtomicBool>,
    reconnect_delay: Option<Duration>,
) {
    let mut stream_opt = Some(first_stream);

    loop {
        let stream = match stream_opt.take() {
            Some(stream) => stream,
            None => {
                let Some(delay) = reconnect_delay else {
                    break;
                };
                tokio::time::sleep(delay).await;
                match TcpStream::connect((host.as_str(), port)).await {
                    Ok(stream) => stream,
                    Err(source) => {
                        warn!(%host, port, %source, "reconnect attempt failed");
                        continue;
                    }
                }
            }
        };

        connected.store(true, Ordering::SeqCst);
        info!(%host, port, "transport connected");
        let (read_half, mut write_half) = stream.into_split();
        let mut lines = BufReader::new(read_half).lines();
        let _ = write_half.write_all(b"{\"alive\":true}\n").await;

        loop {
            tokio::select! {
                line = lines.next_line() => {
                    match line {
                        Ok(Some(line)) => {
                            if inbound_tx.send(line).is_err() {
                                shutdown.store(true, Ordering::SeqCst);
                                break;
                            }
                        }
                        Ok(None) | Err(_) => break,
                    }
                }
                out = outbound_rx.recv() => {
                    match out {
                        Some(line) => {
                            if write_half.write_all(line.as_bytes()).await.is_err()
                                || write_half.write_all(b"\n").await.is_err()
                            {
                                break;
                            }
                        }
                        None => {
                            shutdown.store(true, Ordering::SeqCst);
                            break;
                        }
                    }
                }
            }
            if shutdown.load(Ordering::SeqCst) {
                break;
            }
        }

        connected.store(false, Ordering::SeqCst);
        if shutdown.load(Ordering::SeqCst) {
            break;
        }
        info!(%host, port, "transport disconnected, will attempt reconnect");
    }
}
