//! Application layer use cases for the gateway.
//!
//! Use cases here depend on traits ([`DeviceTransport`], and the telemetry
//! store trait in `infrastructure::storage`) rather than on sockets, so they
//! can be unit-tested with mocks.
//!
//! - **`dispatch_command`** – validates operator commands, allocates
//!   correlation ids and hands encoded frames to the device transport.
//! - **`ingest_telemetry`** – maps inbound pin events to fields and writes
//!   them to the store, holding back values that would clobber a pending
//!   operator setting.

pub mod dispatch_command;
pub mod ingest_telemetry;

pub use dispatch_command::{CommandDispatcher, DeviceTransport, DispatchError};
pub use ingest_telemetry::{IngestOutcome, TelemetryIngest};
