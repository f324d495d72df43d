//! Status update encoder
//!
//! Wraps tracker snapshots into the envelope published to presentation and
//! telemetry collaborators.

use crate::error::TrackerError;
use crate::types::Snapshot;
use crate::{FLUX_VERSION, PRODUCER_NAME};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Producer metadata stamped on every update
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Producer {
    pub name: String,
    pub version: String,
    pub instance_id: String,
}

/// A snapshot plus the provenance a consumer needs to order and attribute it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdate {
    pub producer: Producer,
    /// Sample timestamp the snapshot was computed for (ms)
    pub timestamp: i64,
    pub computed_at_utc: String,
    #[serde(flatten)]
    pub snapshot: Snapshot,
}

/// Status update encoder
pub struct SnapshotEncoder {
    instance_id: String,
}

impl Default for SnapshotEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotEncoder {
    /// Create a new encoder with a unique instance ID
    pub fn new() -> Self {
        Self {
            instance_id: Uuid::new_v4().to_string(),
        }
    }

    /// Create an encoder with a specific instance ID
    pub fn with_instance_id(instance_id: String) -> Self {
        Self { instance_id }
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    pub fn encode(&self, snapshot: Snapshot, timestamp: i64) -> StatusUpdate {
        StatusUpdate {
            producer: Producer {
                name: PRODUCER_NAME.to_string(),
                version: FLUX_VERSION.to_string(),
                instance_id: self.instance_id.clone(),
            },
            timestamp,
            computed_at_utc: Utc::now().to_rfc3339(),
            snapshot,
        }
    }

    /// Encode to a single-line JSON string
    pub fn encode_to_json(&self, snapshot: Snapshot, timestamp: i64) -> Result<String, TrackerError> {
        let update = self.encode(snapshot, timestamp);
        serde_json::to_string(&update).map_err(|e| TrackerError::EncodingError(e.to_string()))
    }
}
