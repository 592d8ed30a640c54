//! Gate event and summary types.

use serde::{Deserialize, Serialize};

/// Car registered at the entrance toll.
///
/// Missing fields decode as empty strings; only malformed JSON or a wrongly
/// typed field is a decode failure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntryEvent {
    /// Identifier for the event.
    pub id: String,
    /// Alphanumeric registration plate of the vehicle.
    #[serde(rename = "vehicle_plate", alias = "vehicleId")]
    pub vehicle_id: String,
    /// Entry timestamp as reported by the camera (UTC, opaque).
    #[serde(rename = "entry_date_time", alias = "entryTime")]
    pub entry_time: String,
}

/// Car registered at the exit toll.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExitEvent {
    /// Identifier for the event.
    pub id: String,
    /// Alphanumeric registration plate of the vehicle.
    #[serde(rename = "vehicle_plate", alias = "vehicleId")]
    pub vehicle_id: String,
    /// Exit timestamp as reported by the camera (UTC, opaque).
    #[serde(rename = "exit_date_time", alias = "exitTime")]
    pub exit_time: String,
}

/// One vehicle's stay, as sent to the downstream recorder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    #[serde(rename = "vehicle")]
    pub vehicle_id: String,
    #[serde(rename = "entryTime")]
    pub entry_time: String,
    #[serde(rename = "exitTime")]
    pub exit_time: String,
}

impl Summary {
    /// True when no entry was known and the exit time stood in for it.
    pub fn is_zero_duration(&self) -> bool {
        self.entry_time == self.exit_time
    }
}
