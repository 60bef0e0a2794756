//! Device TCP listener: accept loop and per-connection read loops.
//!
//! One Tokio task accepts sockets; every accepted socket gets its own task
//! that:
//!
//! 1. Registers the socket as `Unidentified`.
//! 2. Reads into an accumulating buffer and pulls complete frames off the
//!    front with [`decode_frame`], so frames split across reads (or several
//!    frames in one read) are handled.
//! 3. Processes each frame in arrival order:
//!    - `PING` → reply with a 5-byte success response echoing the id.
//!    - `GET_SHARED_DASH`, or `INTERNAL` carrying an `id` key → bind the
//!      device id and acknowledge.
//!    - `RESPONSE` → the device acknowledging one of our commands; logged.
//!    - anything else → telemetry, handed to the ingest pipeline once the
//!      connection is identified, dropped before that.
//! 4. Deregisters on EOF, read error, idle timeout, or server shutdown.
//!
//! Shutdown goes through a `watch` channel every task holds a receiver for.
//! Dropping the sender (because the server itself was dropped) has the same
//! effect as an explicit stop.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use keg_core::protocol::{decode_frame, encode_ok_response, interpret, ProtocolError};
use keg_core::telemetry::ID_FIELD;
use keg_core::{Frame, MessageKind, PinEvent};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{watch, Mutex};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::application::ingest_telemetry::TelemetryIngest;
use crate::infrastructure::network::registry::{ConnectionId, ConnectionRegistry};

/// Size of each socket read.
const READ_CHUNK: usize = 4096;

/// Error type for starting the listener.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("bind failed on {addr}: {source}")]
    BindFailed {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("server already running on {0}")]
    AlreadyRunning(SocketAddr),
    #[error("device gateway is disabled in configuration")]
    Disabled,
}

/// State every connection task needs.
#[derive(Clone)]
struct ConnectionContext {
    registry: Arc<ConnectionRegistry>,
    ingest: Arc<TelemetryIngest>,
    idle_timeout: Option<Duration>,
}

struct RunningServer {
    local_addr: SocketAddr,
    shutdown_tx: watch::Sender<bool>,
    accept_task: JoinHandle<()>,
}

/// The device listener.  At most one accept loop runs at a time.
pub struct GatewayServer {
    context: ConnectionContext,
    running: Mutex<Option<RunningServer>>,
}

impl GatewayServer {
    /// Creates a stopped server.  `idle_timeout` of `None` keeps silent
    /// connections open indefinitely.
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        ingest: Arc<TelemetryIngest>,
        idle_timeout: Option<Duration>,
    ) -> Self {
        Self {
            context: ConnectionContext {
                registry,
                ingest,
                idle_timeout,
            },
            running: Mutex::new(None),
        }
    }

    /// The registry this server adds accepted connections to.  The command
    /// dispatcher shares it to route frames back to devices.
    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.context.registry
    }

    /// Binds `host:port` and spawns the accept loop.  Port 0 picks a free
    /// port; the bound address is returned.
    ///
    /// # Errors
    ///
    /// - [`ServerError::AlreadyRunning`] if the server was started and not stopped.
    /// - [`ServerError::BindFailed`] if the socket cannot be bound.
    pub async fn start_server(
        &self,
        host: &str,
        port: u16,
    ) -> Result<SocketAddr, ServerError> {
        let mut running = self.running.lock().await;
        if let Some(server) = running.as_ref() {
            return Err(ServerError::AlreadyRunning(server.local_addr));
        }

        let bind_err = |source: std::io::Error| ServerError::BindFailed {
            addr: format!("{host}:{port}"),
            source,
        };
        let listener = TcpListener::bind((host, port)).await.map_err(bind_err)?;
        let local_addr = listener.local_addr().map_err(bind_err)?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let accept_task = tokio::spawn(run_accept_loop(
            listener,
            self.context.clone(),
            shutdown_rx,
        ));

        info!("device gateway listening on {local_addr}");
        *running = Some(RunningServer {
            local_addr,
            shutdown_tx,
            accept_task,
        });
        Ok(local_addr)
    }

    /// Stops accepting, closes every device connection and waits for their
    /// tasks to finish.  Calling it on a stopped server does nothing.
    pub async fn stop_server(&self) {
        let Some(server) = self.running.lock().await.take() else {
            return;
        };

        // Receivers are gone only if the accept loop already exited.
        let _ = server.shutdown_tx.send(true);
        if let Err(e) = server.accept_task.await {
            error!("accept loop task failed: {e}");
        }
        info!("device gateway on {} stopped", server.local_addr);
    }

    /// `true` between a successful [`start_server`](Self::start_server) and the
    /// matching [`stop_server`](Self::stop_server).
    pub async fn is_running(&self) -> bool {
        self.running.lock().await.is_some()
    }

    /// Bound address while running.
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        self.running.lock().await.as_ref().map(|s| s.local_addr)
    }
}

// ── Accept loop ───────────────────────────────────────────────────────────────

async fn run_accept_loop(
    listener: TcpListener,
    context: ConnectionContext,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut handlers = JoinSet::new();

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    info!("device connection from {peer}");
                    handlers.spawn(handle_connection(
                        stream,
                        peer,
                        context.clone(),
                        shutdown.clone(),
                    ));
                }
                Err(e) => error!("accept error: {e}"),
            },
            Some(joined) = handlers.join_next(), if !handlers.is_empty() => {
                if let Err(e) = joined {
                    warn!("connection task failed: {e}");
                }
            }
        }
    }

    // Stop accepting before waiting on the open connections.
    drop(listener);
    while let Some(joined) = handlers.join_next().await {
        if let Err(e) = joined {
            warn!("connection task failed: {e}");
        }
    }
}

// ── Per-connection handler ────────────────────────────────────────────────────

/// Runs [`run_connection`] and logs how it ended.
async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    context: ConnectionContext,
    shutdown: watch::Receiver<bool>,
) {
    match run_connection(stream, peer, context, shutdown).await {
        Ok(()) => info!("device connection {peer} closed"),
        Err(e) => warn!("device connection {peer} closed with error: {e:#}"),
    }
}

async fn run_connection(
    stream: TcpStream,
    peer: SocketAddr,
    context: ConnectionContext,
    mut shutdown: watch::Receiver<bool>,
) -> anyhow::Result<()> {
    let (mut reader, writer) = stream.into_split();
    let connection = context.registry.register(peer, Box::new(writer)).await;

    let result = read_frames(&mut reader, connection, &context, &mut shutdown).await;

    if let Some(device_id) = context.registry.deregister(connection).await {
        info!(%device_id, %peer, "device disconnected");
    }
    result
}

/// Reads and processes frames until EOF, an error, or shutdown.
///
/// Shutdown is observed while reading *and* while processing, so a reply
/// write stuck on a device that stopped reading cannot hold up
/// [`GatewayServer::stop_server`].
async fn read_frames<R>(
    reader: &mut R,
    connection: ConnectionId,
    context: &ConnectionContext,
    shutdown: &mut watch::Receiver<bool>,
) -> anyhow::Result<()>
where
    R: AsyncRead + Unpin,
{
    let mut recv_buf: Vec<u8> = Vec::with_capacity(READ_CHUNK);
    let mut read_tmp = vec![0u8; READ_CHUNK];

    loop {
        let n = tokio::select! {
            _ = shutdown.changed() => {
                debug!(connection = %connection, "server stopping; closing connection");
                return Ok(());
            }
            read = read_chunk(reader, &mut read_tmp, context.idle_timeout) => read?,
        };
        if n == 0 {
            return Ok(());
        }
        recv_buf.extend_from_slice(&read_tmp[..n]);

        tokio::select! {
            _ = shutdown.changed() => {
                debug!(connection = %connection, "server stopping mid-frame; closing connection");
                return Ok(());
            }
            processed = process_buffered(&mut recv_buf, connection, context) => processed?,
        }
    }
}

/// Pulls every complete frame off the front of `recv_buf` and processes it.
/// A trailing partial frame stays in the buffer.
async fn process_buffered(
    recv_buf: &mut Vec<u8>,
    connection: ConnectionId,
    context: &ConnectionContext,
) -> anyhow::Result<()> {
    loop {
        match decode_frame(recv_buf) {
            Ok((frame, consumed)) => {
                recv_buf.drain(..consumed);
                process_frame(frame, connection, context)
                    .await
                    .context("failed to reply to device")?;
            }
            Err(ProtocolError::InsufficientData { .. }) => return Ok(()),
            Err(e) => return Err(e).context("undecodable frame"),
        }
    }
}

/// One socket read, bounded by the idle timeout.
async fn read_chunk<R>(
    reader: &mut R,
    buf: &mut [u8],
    idle_timeout: Option<Duration>,
) -> std::io::Result<usize>
where
    R: AsyncRead + Unpin,
{
    let Some(limit) = idle_timeout else {
        return reader.read(buf).await;
    };
    match timeout(limit, reader.read(buf)).await {
        Ok(read) => read,
        Err(_) => Err(std::io::Error::new(
            std::io::ErrorKind::TimedOut,
            format!("no data for {}s", limit.as_secs()),
        )),
    }
}

/// Handles one decoded frame.  Only reply write failures are errors; the
/// connection is then unusable.
async fn process_frame(
    frame: Frame,
    connection: ConnectionId,
    context: &ConnectionContext,
) -> std::io::Result<()> {
    match frame.kind {
        MessageKind::Ping => {
            debug!(connection = %connection, correlation_id = frame.correlation_id, "ping");
            return context
                .registry
                .send_to_connection(connection, &encode_ok_response(frame.correlation_id))
                .await;
        }
        MessageKind::Response => {
            debug!(
                connection = %connection,
                correlation_id = frame.correlation_id,
                status = ?frame.status(),
                "device response"
            );
            return Ok(());
        }
        _ => {}
    }

    let event = interpret(&frame);

    if let Some(device_id) = announced_device_id(&event) {
        context.registry.identify(connection, &device_id).await;
        context
            .registry
            .send_to_connection(connection, &encode_ok_response(frame.correlation_id))
            .await?;
        if frame.kind == MessageKind::GetSharedDash {
            return Ok(());
        }
    }

    let Some(device_id) = context.registry.device_id_of(connection).await else {
        warn!(
            connection = %connection,
            kind = %frame.kind.name(),
            "dropping frame from unidentified connection"
        );
        return Ok(());
    };

    debug!(
        %device_id,
        kind = %frame.kind.name(),
        correlation_id = frame.correlation_id,
        "telemetry frame"
    );
    if let Err(e) = context.ingest.ingest_event(&device_id, &event).await {
        warn!(%device_id, "failed to persist telemetry: {e}");
    }
    Ok(())
}

/// The device id an identification frame announces.
fn announced_device_id(event: &PinEvent) -> Option<String> {
    let id = match event.message_kind {
        MessageKind::GetSharedDash => event.payload.as_text()?,
        MessageKind::Internal => event.payload.as_map()?.get(ID_FIELD)?.as_str(),
        _ => return None,
    };
    let id = id.trim();
    (!id.is_empty()).then(|| id.to_string())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::storage::InMemoryTelemetryStore;
    use keg_core::protocol::encode_command;
    use keg_core::TelemetryMapper;
    use tokio::io::AsyncWriteExt;

    fn server_with_timeout(idle_timeout: Option<Duration>) -> GatewayServer {
        let store = Arc::new(InMemoryTelemetryStore::new());
        let ingest = Arc::new(TelemetryIngest::new(store, TelemetryMapper::new()));
        GatewayServer::new(Arc::new(ConnectionRegistry::new()), ingest, idle_timeout)
    }

    fn event_for(kind: MessageKind, body: &[u8]) -> PinEvent {
        let bytes = encode_command(kind, 1, body).unwrap();
        interpret(&keg_core::decode(&bytes)[0])
    }

    #[test]
    fn test_announced_device_id_from_get_shared_dash() {
        let event = event_for(MessageKind::GetSharedDash, b"device-42");
        assert_eq!(announced_device_id(&event).as_deref(), Some("device-42"));
    }

    #[test]
    fn test_announced_device_id_from_internal_id_key() {
        let event = event_for(MessageKind::Internal, b"ver\x000.6\x00id\x00device-7");
        assert_eq!(announced_device_id(&event).as_deref(), Some("device-7"));
    }

    #[test]
    fn test_no_device_id_from_other_frames() {
        assert_eq!(announced_device_id(&event_for(MessageKind::Internal, b"ver\x000.6")), None);
        assert_eq!(announced_device_id(&event_for(MessageKind::GetSharedDash, b"  ")), None);
        assert_eq!(announced_device_id(&event_for(MessageKind::Hardware, b"vw\x0048\x001")), None);
    }

    #[tokio::test]
    async fn test_start_twice_is_already_running() {
        let server = server_with_timeout(None);
        let addr = server.start_server("127.0.0.1", 0).await.unwrap();

        let second = server.start_server("127.0.0.1", 0).await;

        assert!(matches!(second, Err(ServerError::AlreadyRunning(a)) if a == addr));
        server.stop_server().await;
    }

    #[tokio::test]
    async fn test_stop_server_is_idempotent_and_allows_restart() {
        // Arrange
        let server = server_with_timeout(None);
        server.start_server("127.0.0.1", 0).await.unwrap();

        // Act
        server.stop_server().await;
        server.stop_server().await;

        // Assert
        assert!(!server.is_running().await);
        assert!(server.local_addr().await.is_none());
        server.start_server("127.0.0.1", 0).await.expect("restart after stop");
        server.stop_server().await;
    }

    #[tokio::test]
    async fn test_stop_server_on_never_started_server_is_noop() {
        let server = server_with_timeout(None);
        server.stop_server().await;
        assert!(!server.is_running().await);
    }

    #[tokio::test]
    async fn test_bind_failure_reports_address() {
        let server = server_with_timeout(None);
        let result = server.start_server("not-an-address.invalid", 0).await;
        assert!(matches!(result, Err(ServerError::BindFailed { .. })));
        assert!(!server.is_running().await);
    }

    #[tokio::test]
    async fn test_stop_server_closes_open_connections() {
        // Arrange
        let server = server_with_timeout(None);
        let addr = server.start_server("127.0.0.1", 0).await.unwrap();
        let mut device = TcpStream::connect(addr).await.unwrap();
        device
            .write_all(&encode_command(MessageKind::GetSharedDash, 1, b"device-42").unwrap())
            .await
            .unwrap();
        let mut ack = [0u8; 5];
        device.read_exact(&mut ack).await.unwrap();

        // Act
        server.stop_server().await;

        // Assert: the gateway side closed, so the device reads EOF
        let mut rest = Vec::new();
        let n = device.read_to_end(&mut rest).await.unwrap_or(0);
        assert_eq!(n, 0);
        assert!(server.registry().get_connection_ids().await.is_empty());
    }

    #[tokio::test]
    async fn test_idle_connection_is_closed() {
        let server = server_with_timeout(Some(Duration::from_millis(100)));
        let addr = server.start_server("127.0.0.1", 0).await.unwrap();
        let mut device = TcpStream::connect(addr).await.unwrap();

        // Send nothing; the gateway must hang up on its own
        let mut buf = [0u8; 1];
        let n = timeout(Duration::from_secs(5), device.read(&mut buf))
            .await
            .expect("gateway must close the idle connection")
            .unwrap_or(0);

        assert_eq!(n, 0);
        server.stop_server().await;
    }

    #[tokio::test]
    async fn test_shutdown_interrupts_reply_blocked_on_unread_socket() {
        // Arrange: replies go into an 8-byte pipe nobody drains, so the
        // second PING reply can never be written.
        let server = server_with_timeout(None);
        let context = server.context.clone();
        let (reply_pipe, _unread) = tokio::io::duplex(8);
        let peer: SocketAddr = "127.0.0.1:40000".parse().unwrap();
        let connection = context.registry.register(peer, Box::new(reply_pipe)).await;

        let (mut device, mut reader) = tokio::io::duplex(1024);
        let mut pings = Vec::new();
        for correlation_id in 1..=20u16 {
            pings.extend(encode_command(MessageKind::Ping, correlation_id, b"").unwrap());
        }
        device.write_all(&pings).await.unwrap();

        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let handler = tokio::spawn(async move {
            read_frames(&mut reader, connection, &context, &mut shutdown_rx).await
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!handler.is_finished(), "handler should be stuck writing a reply");

        // Act
        shutdown_tx.send(true).unwrap();

        // Assert
        let result = timeout(Duration::from_secs(5), handler)
            .await
            .expect("shutdown must not wait for the blocked write")
            .unwrap();
        assert!(result.is_ok());
        drop(device);
    }
}
