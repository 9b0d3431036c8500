use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A monitored structure as listed by the directory.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Structure {
    pub id: String,
    pub name: String,
}

/// A sensor as observed on the current poll.
///
/// Built fresh on every pass; the engine never keeps these around.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObservedSensor {
    /// Externally-assigned unique identifier (EUI)
    pub eui: String,
    /// User-facing sensor name (`userConfig.name` upstream)
    pub name: String,
    pub online: bool,
    pub structure_id: String,
    pub structure_name: String,
}

/// Persisted status for one physical sensor, keyed by EUI.
///
/// `last_status_change` only moves on a genuine online/offline flip or on
/// creation. `last_updated` moves on every pass that observes the sensor.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SensorStatusRecord {
    pub eui: String,
    pub is_online: bool,
    pub sensor_name: String,
    pub structure_name: String,
    pub last_status_change: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

/// A stored row as read back for reporting.
///
/// Rows written by older deployments may lack fields or carry values of the
/// wrong type; those read back as `None` here instead of hiding the sensor.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StoredStatus {
    pub eui: String,
    pub is_online: Option<bool>,
    pub sensor_name: Option<String>,
    pub structure_name: Option<String>,
    pub last_status_change: Option<DateTime<Utc>>,
    pub last_updated: Option<DateTime<Utc>>,
}

impl StoredStatus {
    pub fn is_online(&self) -> bool {
        self.is_online.unwrap_or(false)
    }

    pub fn sensor_name(&self) -> &str {
        self.sensor_name.as_deref().unwrap_or("Unknown Sensor")
    }

    pub fn structure_name(&self) -> &str {
        self.structure_name.as_deref().unwrap_or("Unknown Structure")
    }

    /// Converts to a full record, or `None` when any field is absent.
    pub fn into_record(self) -> Option<SensorStatusRecord> {
        Some(SensorStatusRecord {
            eui: self.eui,
            is_online: self.is_online?,
            sensor_name: self.sensor_name?,
            structure_name: self.structure_name?,
            last_status_change: self.last_status_change?,
            last_updated: self.last_updated?,
        })
    }
}

impl From<SensorStatusRecord> for StoredStatus {
    fn from(record: SensorStatusRecord) -> Self {
        Self {
            eui: record.eui,
            is_online: Some(record.is_online),
            sensor_name: Some(record.sensor_name),
            structure_name: Some(record.structure_name),
            last_status_change: Some(record.last_status_change),
            last_updated: Some(record.last_updated),
        }
    }
}

/// Human-readable status word used in notifications and digests.
pub fn status_word(online: bool) -> &'static str {
    if online {
        "online"
    } else {
        "offline"
    }
}

/// Trailing six characters of an EUI, used where the full id is too noisy.
pub fn short_eui(eui: &str) -> &str {
    let count = eui.chars().count();
    if count <= 6 {
        return eui;
    }
    let start = eui
        .char_indices()
        .nth(count - 6)
        .map(|(idx, _)| idx)
        .unwrap_or(0);
    &eui[start..]
}
