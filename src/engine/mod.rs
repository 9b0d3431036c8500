//! Reconciliation engine - one poll, compare, persist, fan-out pass.
//!
//! # Flow
//!
//! ```text
//! StructureDirectory ──► structures ──► sensors (per structure)
//!                                           │
//!                    SensorStateStore.get ◄─┤ classify
//!                                           │
//!        ┌──────────────────┬───────────────┴──────────────┐
//!        ▼                  ▼                              ▼
//!   store.upsert      metrics.record          notifier.notify (Transitioned)
//! ```
//!
//! Only a failed top-level structure listing aborts the pass. Everything below
//! it is logged, counted in [`PassSummary`], and the pass moves on.

mod summary;

pub use summary::PassSummary;

use crate::directory::StructureDirectory;
use crate::error::Result;
use crate::metrics::MetricsSink;
use crate::model::{status_word, ObservedSensor, SensorStatusRecord};
use crate::notify::NotificationSink;
use crate::store::SensorStateStore;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// How an observed sensor relates to its stored record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transition {
    /// No usable prior record
    Created,
    /// Stored status equals observed status
    Unchanged,
    /// Stored status differs from observed status
    Transitioned,
}

impl Transition {
    /// Classifies an observation against the prior record, if any.
    pub fn classify(prior: Option<&SensorStatusRecord>, online: bool) -> Self {
        match prior {
            None => Transition::Created,
            Some(record) if record.is_online == online => Transition::Unchanged,
            Some(_) => Transition::Transitioned,
        }
    }

    /// Whether the store should move `last_status_change` to now.
    pub fn bumps_status_change(self) -> bool {
        !matches!(self, Transition::Unchanged)
    }

    /// Whether a human gets told. First sightings are silent.
    pub fn notifies(self) -> bool {
        matches!(self, Transition::Transitioned)
    }
}

/// Orchestrates reconciliation passes over injected collaborators.
///
/// Collaborators are built once per process and shared; the engine itself
/// holds no per-pass state, so `run` can be called repeatedly.
pub struct ReconciliationEngine {
    directory: Arc<dyn StructureDirectory>,
    store: Arc<dyn SensorStateStore>,
    notifier: Arc<dyn NotificationSink>,
    metrics: Arc<dyn MetricsSink>,
    /// Zone metric timestamps are reported in
    timezone: Tz,
}

impl ReconciliationEngine {
    pub fn new(
        directory: Arc<dyn StructureDirectory>,
        store: Arc<dyn SensorStateStore>,
        notifier: Arc<dyn NotificationSink>,
        metrics: Arc<dyn MetricsSink>,
        timezone: Tz,
    ) -> Self {
        Self {
            directory,
            store,
            notifier,
            metrics,
            timezone,
        }
    }

    /// Runs one reconciliation pass.
    ///
    /// # Returns
    /// * `Ok(PassSummary)` - pass completed, possibly with counted failures
    /// * `Err(Error::DirectoryUnavailable | Error::MalformedResponse)` - the
    ///   structure listing failed and nothing was touched
    pub async fn run(&self) -> Result<PassSummary> {
        let pass_id = Uuid::now_v7();
        let started_at = Utc::now();
        info!(pass_id = %pass_id, "Starting reconciliation pass");

        let structures = match self.directory.list_structures().await {
            Ok(listing) => listing,
            Err(e) => {
                error!(pass_id = %pass_id, error = %e, "Failed to list structures, aborting pass");
                return Err(e);
            }
        };

        let mut summary = PassSummary {
            malformed: structures.malformed,
            ..PassSummary::default()
        };

        for structure in &structures.items {
            summary.structures_seen += 1;

            let sensors = match self.directory.list_sensors(structure).await {
                Ok(listing) => listing,
                Err(e) => {
                    warn!(
                        pass_id = %pass_id,
                        structure_id = %structure.id,
                        structure = %structure.name,
                        error = %e,
                        "Failed to list sensors, skipping structure"
                    );
                    summary.structures_skipped += 1;
                    continue;
                }
            };

            summary.malformed += sensors.malformed;
            for sensor in &sensors.items {
                self.reconcile_sensor(sensor, started_at, &mut summary).await;
            }
        }

        info!(
            pass_id = %pass_id,
            structures = summary.structures_seen,
            structures_skipped = summary.structures_skipped,
            sensors = summary.sensors_seen,
            created = summary.created,
            transitioned = summary.transitioned,
            unchanged = summary.unchanged,
            failures = summary.failures(),
            elapsed_ms = (Utc::now() - started_at).num_milliseconds(),
            "Reconciliation pass finished"
        );

        Ok(summary)
    }

    /// Classifies one sensor and attempts its three side effects.
    ///
    /// Persist, metric and notification are independent: a failure in one is
    /// logged and counted and never prevents the others.
    async fn reconcile_sensor(
        &self,
        sensor: &ObservedSensor,
        pass_time: DateTime<Utc>,
        summary: &mut PassSummary,
    ) {
        summary.sensors_seen += 1;

        let transition = match self.store.get(&sensor.eui) {
            Ok(prior) => Some(Transition::classify(prior.as_ref(), sensor.online)),
            Err(e) => {
                warn!(eui = %sensor.eui, error = %e, "Failed to read prior sensor state");
                summary.store_failures += 1;
                summary.unclassified += 1;
                None
            }
        };

        if let Some(transition) = transition {
            summary.count(transition);
            debug!(
                eui = %sensor.eui,
                online = sensor.online,
                transition = ?transition,
                "Classified sensor"
            );

            if let Err(e) = self.store.upsert(
                &sensor.eui,
                sensor.online,
                &sensor.name,
                &sensor.structure_name,
                transition.bumps_status_change(),
            ) {
                warn!(eui = %sensor.eui, error = %e, "Failed to persist sensor state");
                summary.store_failures += 1;
            }
        }

        if let Err(e) = self
            .metrics
            .record(
                &sensor.eui,
                &sensor.structure_id,
                &sensor.structure_name,
                sensor.online,
                pass_time.with_timezone(&self.timezone),
            )
            .await
        {
            warn!(eui = %sensor.eui, error = %e, "Failed to record status metric");
            summary.metric_failures += 1;
        }

        if transition.is_some_and(Transition::notifies) {
            info!(
                eui = %sensor.eui,
                sensor = %sensor.name,
                structure = %sensor.structure_name,
                status = status_word(sensor.online),
                "Sensor status changed"
            );

            match self
                .notifier
                .notify(
                    &sensor.eui,
                    sensor.online,
                    &sensor.structure_name,
                    &sensor.name,
                )
                .await
            {
                Ok(()) => summary.notifications_sent += 1,
                Err(e) => {
                    warn!(eui = %sensor.eui, error = %e, "Failed to send status notification");
                    summary.notify_failures += 1;
                }
            }
        }
    }
}
