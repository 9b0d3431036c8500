use super::SensorStateStore;
use crate::error::Result;
use crate::model::{SensorStatusRecord, StoredStatus};
use chrono::Utc;
use dashmap::DashMap;

/// Process-local sensor state store.
///
/// Upserts go through `DashMap::entry`, which holds the shard lock for the
/// whole read-modify-write, so per-EUI writes are atomic.
#[derive(Default)]
pub struct MemoryStateStore {
    records: DashMap<String, SensorStatusRecord>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a record verbatim, bypassing the upsert timestamp rules.
    pub fn insert(&self, record: SensorStatusRecord) {
        self.records.insert(record.eui.clone(), record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl SensorStateStore for MemoryStateStore {
    fn get(&self, eui: &str) -> Result<Option<SensorStatusRecord>> {
        Ok(self.records.get(eui).map(|entry| entry.value().clone()))
    }

    fn upsert(
        &self,
        eui: &str,
        is_online: bool,
        sensor_name: &str,
        structure_name: &str,
        bump_status_change: bool,
    ) -> Result<()> {
        let now = Utc::now();

        self.records
            .entry(eui.to_string())
            .and_modify(|record| {
                record.is_online = is_online;
                record.sensor_name = sensor_name.to_string();
                record.structure_name = structure_name.to_string();
                if bump_status_change && now > record.last_status_change {
                    record.last_status_change = now;
                }
                record.last_updated = now;
            })
            .or_insert_with(|| SensorStatusRecord {
                eui: eui.to_string(),
                is_online,
                sensor_name: sensor_name.to_string(),
                structure_name: structure_name.to_string(),
                last_status_change: now,
                last_updated: now,
            });

        Ok(())
    }

    fn list_all(&self) -> Result<Vec<StoredStatus>> {
        let mut records: Vec<SensorStatusRecord> =
            self.records.iter().map(|entry| entry.value().clone()).collect();
        records.sort_by(|a, b| {
            (&a.structure_name, &a.sensor_name, &a.eui)
                .cmp(&(&b.structure_name, &b.sensor_name, &b.eui))
        });
        Ok(records.into_iter().map(StoredStatus::from).collect())
    }
}
