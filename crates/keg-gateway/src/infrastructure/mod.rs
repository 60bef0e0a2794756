//! Infrastructure layer for the gateway.
//!
//! Contains the OS-facing adapters (the TCP listener and the connection
//! registry), configuration storage, the telemetry store, and the
//! [`gateway::KegGateway`] facade that wires them together.

pub mod gateway;
pub mod network;
pub mod storage;
