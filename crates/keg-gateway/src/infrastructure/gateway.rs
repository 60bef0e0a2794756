//! KegGateway: wires the registry, listener, ingest pipeline and dispatcher
//! from a [`GatewayConfig`].
//!
//! This is the one type a host application needs:
//!
//! ```no_run
//! use keg_gateway::infrastructure::gateway::KegGateway;
//! use keg_gateway::infrastructure::storage::GatewayConfig;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let gateway = KegGateway::new(GatewayConfig::default());
//! let addr = gateway.start().await?;
//! println!("devices connect to {addr}");
//!
//! gateway.dispatcher().set_keg_mode("device-42", Some("1")).await;
//! gateway.stop().await;
//! # Ok(())
//! # }
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use keg_core::TelemetryMapper;
use tracing::info;

use crate::application::dispatch_command::CommandDispatcher;
use crate::application::ingest_telemetry::TelemetryIngest;
use crate::infrastructure::network::listener::{GatewayServer, ServerError};
use crate::infrastructure::network::registry::ConnectionRegistry;
use crate::infrastructure::storage::{GatewayConfig, InMemoryTelemetryStore, TelemetryStore};

/// The assembled device gateway.
pub struct KegGateway {
    config: GatewayConfig,
    registry: Arc<ConnectionRegistry>,
    server: GatewayServer,
    dispatcher: CommandDispatcher,
}

impl KegGateway {
    /// A gateway persisting telemetry to an [`InMemoryTelemetryStore`].
    pub fn new(config: GatewayConfig) -> Self {
        Self::with_store(config, Arc::new(InMemoryTelemetryStore::new()))
    }

    /// A gateway persisting telemetry to `store`.
    pub fn with_store(config: GatewayConfig, store: Arc<dyn TelemetryStore>) -> Self {
        let mapper = if config.include_unknown_fields {
            TelemetryMapper::including_unknown()
        } else {
            TelemetryMapper::new()
        };
        let registry = Arc::new(ConnectionRegistry::new());
        let ingest = Arc::new(TelemetryIngest::new(store, mapper));
        let server = GatewayServer::new(Arc::clone(&registry), ingest, config.idle_timeout());
        let dispatcher = CommandDispatcher::new(registry.clone());

        Self {
            config,
            registry,
            server,
            dispatcher,
        }
    }

    /// Starts the listener on the configured address.
    ///
    /// # Errors
    ///
    /// Fails with [`ServerError::Disabled`] when `enabled = false`, on an
    /// invalid bind address, or when the listener cannot start.
    pub async fn start(&self) -> anyhow::Result<SocketAddr> {
        if !self.config.enabled {
            info!("device gateway disabled; not starting listener");
            return Err(ServerError::Disabled.into());
        }

        let addr = self
            .config
            .bind_addr()
            .context("invalid device gateway address")?;
        self.server
            .start_server(&addr.ip().to_string(), addr.port())
            .await
            .with_context(|| format!("failed to start device gateway on {addr}"))
    }

    /// Stops the listener and closes every device connection.
    pub async fn stop(&self) {
        self.server.stop_server().await;
    }

    /// The command dispatcher, for the typed setters.
    pub fn dispatcher(&self) -> &CommandDispatcher {
        &self.dispatcher
    }

    /// The shared connection registry.
    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// See [`CommandDispatcher::send_command`].
    pub async fn send_command(&self, device_id: &str, command: &str, value: Option<&str>) -> bool {
        self.dispatcher.send_command(device_id, command, value).await
    }

    /// Identified device ids.
    pub async fn get_connected_kegs(&self) -> Vec<String> {
        self.dispatcher.get_connected_kegs().await
    }
}
