//! Persistence collaborator for device telemetry.
//!
//! The gateway never owns a database.  The host application implements
//! [`TelemetryStore`] over whatever it persists to; [`InMemoryTelemetryStore`]
//! is the default used when nothing else is injected, and backs the tests.

use std::collections::{BTreeMap, HashMap};
use std::time::SystemTime;

use async_trait::async_trait;
use keg_core::TelemetryValue;
use thiserror::Error;
use tokio::sync::RwLock;

/// Error type for telemetry store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing store rejected or could not complete the operation.
    #[error("telemetry store unavailable: {0}")]
    Unavailable(String),
}

/// Upsert/read interface the ingest pipeline writes telemetry through.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TelemetryStore: Send + Sync {
    /// Sets `field` on `device_id` to `value`, observed at `at`.
    async fn set_field(
        &self,
        device_id: &str,
        field: &str,
        value: &TelemetryValue,
        at: SystemTime,
    ) -> Result<(), StoreError>;

    /// Value the operator set for `field` that the device has not yet confirmed.
    async fn user_override(&self, device_id: &str, field: &str)
        -> Result<Option<String>, StoreError>;

    /// Forgets a pending operator value once the device reports it.
    async fn clear_user_override(&self, device_id: &str, field: &str) -> Result<(), StoreError>;
}

/// A stored value with the time it was observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredValue {
    pub value: TelemetryValue,
    pub updated_at: SystemTime,
}

#[derive(Debug, Default)]
struct DeviceRecord {
    fields: BTreeMap<String, StoredValue>,
    overrides: HashMap<String, String>,
}

/// Process-local [`TelemetryStore`].
#[derive(Debug, Default)]
pub struct InMemoryTelemetryStore {
    devices: RwLock<HashMap<String, DeviceRecord>>,
}

impl InMemoryTelemetryStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Last persisted values for `device_id`, or `None` if nothing was ever stored.
    pub async fn snapshot(&self, device_id: &str) -> Option<BTreeMap<String, StoredValue>> {
        let devices = self.devices.read().await;
        devices
            .get(device_id)
            .filter(|record| !record.fields.is_empty())
            .map(|record| record.fields.clone())
    }

    /// Records a value the operator set through the host's settings path.
    /// Matching telemetry for the field is held back until the device reports
    /// this value.
    pub async fn set_user_override(&self, device_id: &str, field: &str, value: &str) {
        let mut devices = self.devices.write().await;
        devices
            .entry(device_id.to_string())
            .or_default()
            .overrides
            .insert(field.to_string(), value.to_string());
    }

    /// Ids of every device with at least one stored field.
    pub async fn device_ids(&self) -> Vec<String> {
        let devices = self.devices.read().await;
        let mut ids: Vec<String> = devices
            .iter()
            .filter(|(_, record)| !record.fields.is_empty())
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }
}

#[async_trait]
impl TelemetryStore for InMemoryTelemetryStore {
    async fn set_field(
        &self,
        device_id: &str,
        field: &str,
        value: &TelemetryValue,
        at: SystemTime,
    ) -> Result<(), StoreError> {
        let mut devices = self.devices.write().await;
        devices.entry(device_id.to_string()).or_default().fields.insert(
            field.to_string(),
            StoredValue {
                value: value.clone(),
                updated_at: at,
            },
        );
        Ok(())
    }

    async fn user_override(
        &self,
        device_id: &str,
        field: &str,
    ) -> Result<Option<String>, StoreError> {
        let devices = self.devices.read().await;
        Ok(devices
            .get(device_id)
            .and_then(|record| record.overrides.get(field))
            .cloned())
    }

    async fn clear_user_override(&self, device_id: &str, field: &str) -> Result<(), StoreError> {
        let mut devices = self.devices.write().await;
        if let Some(record) = devices.get_mut(device_id) {
            record.overrides.remove(field);
        }
        Ok(())
    }
}
