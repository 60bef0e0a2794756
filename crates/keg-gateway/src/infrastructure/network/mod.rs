//! Network: the device connection registry and the TCP listener.

pub mod listener;
pub mod registry;

pub use listener::{GatewayServer, ServerError};
pub use registry::{ConnectionId, ConnectionRegistry, ConnectionState};
