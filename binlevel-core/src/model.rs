//! Domain data structures for bins, fill-level history, and submissions.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
/// Identifier of a monitored bin.
pub struct BinId(pub String);

impl fmt::Display for BinId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.0)
    }
}

impl From<&str> for BinId {
    fn from(id: &str) -> Self {
        BinId(id.to_owned())
    }
}

impl From<String> for BinId {
    fn from(id: String) -> Self {
        BinId(id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// Registered bin as kept in the bin registry.
///
/// Records are provisioned out of band. Values are carried exactly as stored;
/// [`crate::fill::fill_level`] rejects metadata it cannot compute with.
pub struct BinRecord {
    /// Unique identifier and registry key.
    pub id: BinId,
    /// Usable vertical span the sensor measures against.
    pub height: f64,
    /// Dead zone right below the sensor. Absent on bins provisioned before buffers existed.
    pub buffer_height: Option<f64>,
    /// Shared secret the device has to present verbatim.
    pub token: String,
    /// Last computed fill level, if the bin ever reported.
    pub fill_level_percentage: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// Entry of the append-only fill-level history.
pub struct FillLevelRecord {
    /// Bin the reading belongs to.
    pub bin_id: BinId,
    /// Computed percentage in `[0, 100]`.
    pub fill_level_percentage: f64,
    /// Creation time assigned by the store.
    pub timestamp: DateTime<Utc>,
}

#[derive(Clone, PartialEq)]
/// A validated telemetry submission from a device.
pub struct Submission {
    /// Bin the device reports for.
    pub bin_id: BinId,
    /// Raw ultrasonic distance between sensor and fill surface.
    pub distance: f64,
    /// Token presented by the device.
    pub token: String,
}

impl fmt::Debug for Submission {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Submission")
            .field("bin_id", &self.bin_id)
            .field("distance", &self.distance)
            .field("token", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
/// Outcome of an accepted submission.
pub struct Ingested {
    /// Bin the reading was stored for.
    pub bin_id: BinId,
    /// Computed fill level.
    pub fill_level_percentage: f64,
}
