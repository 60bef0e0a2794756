//! Storage: gateway configuration and the telemetry persistence collaborator.

pub mod config;
pub mod telemetry_store;

pub use config::{load_config, save_config, ConfigError, GatewayConfig};
pub use telemetry_store::{InMemoryTelemetryStore, StoreError, StoredValue, TelemetryStore};
