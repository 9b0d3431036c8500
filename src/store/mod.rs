//! Persisted sensor state, the system of record for online/offline status.
//!
//! One document per EUI. The reconciliation engine reads the prior record,
//! decides whether the status flipped, and writes the refreshed record back
//! through [`SensorStateStore::upsert`].
//!
//! # Implementations
//!
//! - [`SqliteStateStore`] - durable store, one write transaction per upsert
//! - [`MemoryStateStore`] - process-local store backed by `DashMap`
//!
//! # Usage
//!
//! ```no_run
//! use sensorwatch::store::{SensorStateStore, SqliteStateStore};
//!
//! # fn main() -> sensorwatch::Result<()> {
//! let store = SqliteStateStore::new("sensorwatch.db")?;
//!
//! // First observation: the record is created, both timestamps set
//! store.upsert("AA11BB22", true, "Temp1", "Plant 1", true)?;
//!
//! if let Some(record) = store.get("AA11BB22")? {
//!     println!("{} online={}", record.sensor_name, record.is_online);
//! }
//! # Ok(())
//! # }
//! ```

use crate::error::Result;
use crate::model::{SensorStatusRecord, StoredStatus};

mod memory;
mod sqlite;

pub use memory::MemoryStateStore;
pub use sqlite::SqliteStateStore;

/// Key-value store of last-known sensor status.
///
/// Implementations must make `upsert` atomic per EUI: a concurrent
/// read-modify-write for the same sensor may not lose the `is_online` value
/// being written.
pub trait SensorStateStore: Send + Sync {
    /// Returns the stored record for `eui`.
    ///
    /// A stored document that is missing required fields is reported as
    /// `Ok(None)` so the caller treats the sensor as never seen.
    fn get(&self, eui: &str) -> Result<Option<SensorStatusRecord>>;

    /// Writes the observed status for `eui`.
    ///
    /// `last_updated` is always set to the current time. `last_status_change`
    /// is set to the current time when `bump_status_change` is true or when
    /// the record did not exist yet.
    fn upsert(
        &self,
        eui: &str,
        is_online: bool,
        sensor_name: &str,
        structure_name: &str,
        bump_status_change: bool,
    ) -> Result<()>;

    /// Returns every stored row, ordered by structure then sensor name.
    ///
    /// Unlike `get`, rows with missing or mistyped fields are still listed,
    /// with those fields left empty.
    fn list_all(&self) -> Result<Vec<StoredStatus>>;
}
