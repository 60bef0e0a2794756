//! DispatchCommandUseCase: turns operator commands into HARDWARE frames and
//! hands them to the device transport.
//!
//! Dispatch is fire-and-forget.  A `true` result means the bytes were written
//! to the device's socket, not that the device applied the setting; the
//! device's acknowledgement arrives later as a RESPONSE frame and its new
//! value as ordinary telemetry.
//!
//! # Architecture
//!
//! The dispatcher depends only on the [`DeviceTransport`] trait.  The
//! connection registry implements it in production; tests inject mocks.

use std::sync::Arc;

use async_trait::async_trait;
use keg_core::command::{pin_for_command, Command};
use keg_core::protocol::CorrelationCounter;
use keg_core::telemetry::{validate_and_pad_1_and_2, validate_decimal};
use thiserror::Error;
use tracing::{debug, warn};

/// Error type for delivering bytes to a device.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// No identified connection is bound to the device id.
    #[error("no connected device with id '{0}'")]
    UnknownDeviceTarget(String),

    /// The socket write failed.
    #[error("write to device '{device_id}' failed: {source}")]
    Transport {
        device_id: String,
        #[source]
        source: std::io::Error,
    },
}

/// Per-device send primitive.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DeviceTransport: Send + Sync {
    /// Writes `bytes` to the socket bound to `device_id`.
    async fn send_to_device(&self, device_id: &str, bytes: &[u8]) -> Result<(), DispatchError>;

    /// Ids of every device that has completed identification.
    async fn identified_devices(&self) -> Vec<String>;
}

/// Builds and sends commands, allocating a fresh correlation id for each.
pub struct CommandDispatcher {
    transport: Arc<dyn DeviceTransport>,
    counter: Arc<CorrelationCounter>,
}

impl CommandDispatcher {
    pub fn new(transport: Arc<dyn DeviceTransport>) -> Self {
        Self::with_counter(transport, Arc::new(CorrelationCounter::new()))
    }

    /// Uses an explicit counter, e.g. one shared with another dispatcher or
    /// seeded near the wrap point in tests.
    pub fn with_counter(
        transport: Arc<dyn DeviceTransport>,
        counter: Arc<CorrelationCounter>,
    ) -> Self {
        Self { transport, counter }
    }

    /// Sends `command` with `value` to `device_id`.
    ///
    /// Returns `false` without writing anything when the command is not in
    /// the command table or `value` is missing or blank.  Otherwise returns
    /// whether the transport write succeeded.
    pub async fn send_command(&self, device_id: &str, command: &str, value: Option<&str>) -> bool {
        let Some(value) = value.filter(|v| !v.trim().is_empty()) else {
            warn!(device_id, command, "rejecting command without a value");
            return false;
        };
        if pin_for_command(command).is_none() {
            warn!(device_id, command, "rejecting unrecognised command");
            return false;
        }

        let correlation_id = self.counter.next();
        let Some(cmd) = Command::new(device_id, command, value, correlation_id) else {
            return false;
        };
        let bytes = match cmd.encode() {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(device_id, command = %cmd.name, "failed to encode command: {e}");
                return false;
            }
        };

        match self.transport.send_to_device(device_id, &bytes).await {
            Ok(()) => {
                debug!(
                    device_id,
                    command = %cmd.name,
                    pin = %cmd.pin,
                    correlation_id,
                    "command dispatched"
                );
                true
            }
            Err(e) => {
                warn!(device_id, command = %cmd.name, "command dispatch failed: {e}");
                false
            }
        }
    }

    /// Ids of devices that currently accept commands.
    pub async fn get_connected_kegs(&self) -> Vec<String> {
        self.transport.identified_devices().await
    }

    // ── Typed setters ─────────────────────────────────────────────────────────

    /// Keg mode (CO2 / beer).  Accepts `1`/`2`/`01`/`02`.
    pub async fn set_keg_mode(&self, device_id: &str, value: Option<&str>) -> bool {
        self.send_validated(device_id, "set-mode", validate_and_pad_1_and_2(value))
            .await
    }

    /// Unit system (metric / imperial).  Accepts `1`/`2`/`01`/`02`.
    pub async fn set_unit_system(&self, device_id: &str, value: Option<&str>) -> bool {
        self.send_validated(device_id, "set-unit", validate_and_pad_1_and_2(value))
            .await
    }

    /// Measurement mode (weight / volume).  Accepts `1`/`2`/`01`/`02`.
    pub async fn set_measure_unit(&self, device_id: &str, value: Option<&str>) -> bool {
        self.send_validated(device_id, "set-measure-unit", validate_and_pad_1_and_2(value))
            .await
    }

    /// Tare weight of the empty keg.
    pub async fn set_empty_keg_weight(&self, device_id: &str, value: Option<&str>) -> bool {
        self.send_validated(device_id, "set-empty-keg-weight", validate_decimal(value))
            .await
    }

    /// Full keg volume.
    pub async fn set_max_keg_volume(&self, device_id: &str, value: Option<&str>) -> bool {
        self.send_validated(device_id, "set-max-keg-volume", validate_decimal(value))
            .await
    }

    async fn send_validated(&self, device_id: &str, command: &str, value: Option<String>) -> bool {
        match value {
            Some(value) => self.send_command(device_id, command, Some(&value)).await,
            None => {
                warn!(device_id, command, "rejecting invalid setting value");
                false
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
