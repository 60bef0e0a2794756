//! IngestTelemetryUseCase: writes mapped telemetry to the persistence store.
//!
//! Operator-settable fields (unit system, measure unit, keg mode) get special
//! treatment.  When the operator has set a value the device has not yet
//! confirmed, telemetry reporting the old value must not overwrite it:
//!
//! ```text
//! pending override?  reported == pending?  action
//! ─────────────────  ────────────────────  ─────────────────────────────
//! no                 -                     write
//! yes                yes                   clear override, write
//! yes                no                    hold (skip write)
//! ```

use std::sync::Arc;
use std::time::SystemTime;

use keg_core::telemetry::ID_FIELD;
use keg_core::{PinEvent, TelemetryField, TelemetryMapper};
use tracing::debug;

use crate::infrastructure::storage::{StoreError, TelemetryStore};

/// What happened to one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    /// Written to the store.
    Written,
    /// Skipped because a different operator value is pending.
    HeldForOverride,
    /// Carried no telemetry (unmapped, identification, keepalive).
    Ignored,
}

/// Maps pin events and persists the resulting fields.
pub struct TelemetryIngest {
    store: Arc<dyn TelemetryStore>,
    mapper: TelemetryMapper,
}

impl TelemetryIngest {
    /// Creates the use case over `store`, mapping events with `mapper`.
    pub fn new(store: Arc<dyn TelemetryStore>, mapper: TelemetryMapper) -> Self {
        Self { store, mapper }
    }

    /// Maps `event` and persists the field it yields for `device_id`.
    ///
    /// # Errors
    ///
    /// Propagates [`StoreError`] from the store.
    pub async fn ingest_event(
        &self,
        device_id: &str,
        event: &PinEvent,
    ) -> Result<IngestOutcome, StoreError> {
        match self.mapper.map(event) {
            Some(field) => self.ingest_field(device_id, &field).await,
            None => Ok(IngestOutcome::Ignored),
        }
    }

    /// Persists one mapped field, honouring pending operator overrides.
    ///
    /// # Errors
    ///
    /// Propagates [`StoreError`] from the store.
    pub async fn ingest_field(
        &self,
        device_id: &str,
        field: &TelemetryField,
    ) -> Result<IngestOutcome, StoreError> {
        // The id is the record key, not an attribute.
        if field.name == ID_FIELD {
            return Ok(IngestOutcome::Ignored);
        }

        if field.is_user_overrideable() {
            if let Some(pending) = self.store.user_override(device_id, &field.name).await? {
                if field.value.as_text() != Some(pending.as_str()) {
                    debug!(
                        device_id,
                        field = %field.name,
                        %pending,
                        "holding telemetry until device confirms operator value"
                    );
                    return Ok(IngestOutcome::HeldForOverride);
                }
                self.store.clear_user_override(device_id, &field.name).await?;
            }
        }

        self.store
            .set_field(device_id, &field.name, &field.value, SystemTime::now())
            .await?;
        Ok(IngestOutcome::Written)
    }
}
