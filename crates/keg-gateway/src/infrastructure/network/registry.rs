//! ConnectionRegistry: the table of open device sockets and which device id
//! each one has identified as.
//!
//! # Connection lifecycle
//!
//! ```text
//! accept ──register──► Unidentified ──identify──► Identified
//!                            │                        │
//!                            └──────deregister────────┴──► Closed (removed)
//! ```
//!
//! Only identified connections are routable by device id.  If a device
//! identifies on a second socket (it rebooted before the old socket timed
//! out) the new connection takes over the id; the old socket drops back to
//! unidentified, so when it finally closes it cannot unbind the device.
//!
//! Both tables sit behind one `RwLock` so the connection table and the
//! device index never disagree.  The lock is never held across a socket
//! write: each connection's writer has its own `Mutex`, which also keeps a
//! command from interleaving with a handshake reply on the same socket.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};
use uuid::Uuid;

use crate::application::dispatch_command::{DeviceTransport, DispatchError};

/// Identifies one accepted socket for its whole lifetime.
pub type ConnectionId = Uuid;

/// Write half of a device socket.
pub type DeviceWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Where a connection is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Accepted; no device id yet.
    Unidentified,
    /// Bound to a device id; telemetry flows and commands are routable.
    Identified,
    /// Socket closed and removed from the registry (or never registered).
    Closed,
}

struct ConnectionEntry {
    peer: SocketAddr,
    device_id: Option<String>,
    writer: Arc<Mutex<DeviceWriter>>,
}

#[derive(Default)]
struct Tables {
    connections: HashMap<ConnectionId, ConnectionEntry>,
    /// device id -> connection currently bound to it
    devices: HashMap<String, ConnectionId>,
}

/// Shared registry of device connections.
///
/// Written by connection handlers (register, identify, deregister) and read by
/// the command dispatcher on every send.
#[derive(Default)]
pub struct ConnectionRegistry {
    tables: RwLock<Tables>,
}

impl ConnectionRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a freshly accepted socket in the `Unidentified` state.
    pub async fn register(&self, peer: SocketAddr, writer: DeviceWriter) -> ConnectionId {
        let id = Uuid::new_v4();
        let mut tables = self.tables.write().await;
        tables.connections.insert(
            id,
            ConnectionEntry {
                peer,
                device_id: None,
                writer: Arc::new(Mutex::new(writer)),
            },
        );
        debug!(connection = %id, %peer, "connection registered");
        id
    }

    /// Binds `device_id` to `connection`.
    ///
    /// Returns `false` if the connection is no longer registered.  Identifying
    /// again with the same id is a no-op; a different id rebinds the socket.
    pub async fn identify(&self, connection: ConnectionId, device_id: &str) -> bool {
        let mut tables = self.tables.write().await;
        let Tables {
            connections,
            devices,
        } = &mut *tables;

        let Some(entry) = connections.get_mut(&connection) else {
            return false;
        };
        if entry.device_id.as_deref() == Some(device_id) {
            return true;
        }

        // This socket was bound to another id before: release it.
        if let Some(previous) = entry.device_id.take() {
            if devices.get(&previous) == Some(&connection) {
                devices.remove(&previous);
            }
        }
        entry.device_id = Some(device_id.to_string());
        let peer = entry.peer;

        // Another socket held this id: it loses the binding.
        if let Some(stale) = devices.insert(device_id.to_string(), connection) {
            if stale != connection {
                if let Some(stale_entry) = connections.get_mut(&stale) {
                    stale_entry.device_id = None;
                }
                info!(
                    device_id,
                    %peer,
                    stale_connection = %stale,
                    "device re-identified on a new connection"
                );
                return true;
            }
        }

        info!(device_id, %peer, connection = %connection, "device identified");
        true
    }

    /// Removes `connection`.  Returns the device id it was bound to, if the
    /// binding was still current.
    pub async fn deregister(&self, connection: ConnectionId) -> Option<String> {
        let mut tables = self.tables.write().await;
        let entry = tables.connections.remove(&connection)?;
        let device_id = entry.device_id?;
        if tables.devices.get(&device_id) == Some(&connection) {
            tables.devices.remove(&device_id);
            Some(device_id)
        } else {
            None
        }
    }

    /// Writes `bytes` to the socket bound to `device_id`.
    ///
    /// # Errors
    ///
    /// - [`DispatchError::UnknownDeviceTarget`] if no connection is bound to the id.
    /// - [`DispatchError::Transport`] if the write fails.
    pub async fn send_command_to_keg(
        &self,
        device_id: &str,
        bytes: &[u8],
    ) -> Result<(), DispatchError> {
        let writer = {
            let tables = self.tables.read().await;
            tables
                .devices
                .get(device_id)
                .and_then(|id| tables.connections.get(id))
                .map(|entry| Arc::clone(&entry.writer))
        };
        let writer =
            writer.ok_or_else(|| DispatchError::UnknownDeviceTarget(device_id.to_string()))?;

        write_locked(&writer, bytes)
            .await
            .map_err(|source| DispatchError::Transport {
                device_id: device_id.to_string(),
                source,
            })
    }

    /// Writes `bytes` to a connection regardless of identification.  Used for
    /// protocol replies (ping, handshake acknowledgement).
    ///
    /// # Errors
    ///
    /// Returns `NotConnected` if the connection is gone, or the write error.
    pub async fn send_to_connection(
        &self,
        connection: ConnectionId,
        bytes: &[u8],
    ) -> std::io::Result<()> {
        let writer = {
            let tables = self.tables.read().await;
            tables
                .connections
                .get(&connection)
                .map(|entry| Arc::clone(&entry.writer))
        };
        match writer {
            Some(writer) => write_locked(&writer, bytes).await,
            None => Err(std::io::ErrorKind::NotConnected.into()),
        }
    }

    /// Device ids that have completed identification, sorted.
    pub async fn get_registered_device_ids(&self) -> Vec<String> {
        let tables = self.tables.read().await;
        let mut ids: Vec<String> = tables.devices.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Every open socket, identified or not.
    pub async fn get_connection_ids(&self) -> Vec<ConnectionId> {
        let tables = self.tables.read().await;
        tables.connections.keys().copied().collect()
    }

    /// Lifecycle state of `connection`.  Unknown or removed ids report
    /// [`ConnectionState::Closed`].
    pub async fn connection_state(&self, connection: ConnectionId) -> ConnectionState {
        let tables = self.tables.read().await;
        match tables.connections.get(&connection) {
            Some(entry) if entry.device_id.is_some() => ConnectionState::Identified,
            Some(_) => ConnectionState::Unidentified,
            None => ConnectionState::Closed,
        }
    }

    /// The device id `connection` is currently bound to.
    pub async fn device_id_of(&self, connection: ConnectionId) -> Option<String> {
        let tables = self.tables.read().await;
        tables
            .connections
            .get(&connection)
            .and_then(|entry| entry.device_id.clone())
    }
}

async fn write_locked(writer: &Mutex<DeviceWriter>, bytes: &[u8]) -> std::io::Result<()> {
    let mut writer = writer.lock().await;
    writer.write_all(bytes).await?;
    writer.flush().await
}

#[async_trait]
impl DeviceTransport for ConnectionRegistry {
    async fn send_to_device(&self, device_id: &str, bytes: &[u8]) -> Result<(), DispatchError> {
        self.send_command_to_keg(device_id, bytes).await
    }

    async fn identified_devices(&self) -> Vec<String> {
        self.get_registered_device_ids().await
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
