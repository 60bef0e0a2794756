//! keg-gateway library crate.
//!
//! Keeps persistent TCP connections to keg-monitoring devices, identifies
//! each one, stores its telemetry and routes operator commands back to it.
//! The wire format itself lives in `keg-core`.
//!
//! # Architecture
//!
//! ```text
//! Device ──TCP──► [keg-gateway]
//!                   ├── application/
//!                   │     ├── dispatch_command/  command → HARDWARE frame → transport
//!                   │     └── ingest_telemetry/  pin event → field → store
//!                   └── infrastructure/
//!                         ├── network/registry/  connection ↔ device id table
//!                         ├── network/listener/  accept loop, per-connection read loop
//!                         ├── storage/           GatewayConfig (TOML), TelemetryStore
//!                         └── gateway/           KegGateway facade
//! ```
//!
//! The host application initialises `tracing` (e.g. `tracing-subscriber`
//! with an `EnvFilter`); this crate only emits events.

/// Application layer: use cases behind trait seams.
pub mod application;

/// Infrastructure layer: sockets, storage and the facade.
pub mod infrastructure;

pub use application::{CommandDispatcher, DeviceTransport, DispatchError};
pub use infrastructure::gateway::KegGateway;
pub use infrastructure::network::{ConnectionRegistry, GatewayServer, ServerError};
pub use infrastructure::storage::{GatewayConfig, InMemoryTelemetryStore, TelemetryStore};
