use super::Transition;
use serde::Serialize;
use std::fmt;

/// Counters for one reconciliation pass.
///
/// Separates "the directory had nothing" from "the directory failed": a pass
/// with `structures_skipped > 0` did not see every sensor.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PassSummary {
    pub structures_seen: usize,
    /// Structures whose sensor listing failed
    pub structures_skipped: usize,
    pub sensors_seen: usize,
    /// Directory entries dropped for missing fields
    pub malformed: usize,
    pub created: usize,
    pub unchanged: usize,
    pub transitioned: usize,
    /// Sensors whose prior state could not be read
    pub unclassified: usize,
    pub notifications_sent: usize,
    pub store_failures: usize,
    pub notify_failures: usize,
    pub metric_failures: usize,
}

impl PassSummary {
    pub(crate) fn count(&mut self, transition: Transition) {
        match transition {
            Transition::Created => self.created += 1,
            Transition::Unchanged => self.unchanged += 1,
            Transition::Transitioned => self.transitioned += 1,
        }
    }

    /// Total collaborator failures, directory included.
    pub fn failures(&self) -> usize {
        self.structures_skipped + self.store_failures + self.notify_failures + self.metric_failures
    }

    pub fn is_clean(&self) -> bool {
        self.failures() == 0 && self.malformed == 0
    }

    /// One-line status for the invoker.
    pub fn status_line(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for PassSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Sensor status check completed: {} sensors in {} structures ({} changed, {} new, {} unchanged)",
            self.sensors_seen,
            self.structures_seen,
            self.transitioned,
            self.created,
            self.unchanged
        )?;

        if !self.is_clean() {
            write!(
                f,
                "; issues: {} structures skipped, {} malformed, {} store, {} notify, {} metric",
                self.structures_skipped,
                self.malformed,
                self.store_failures,
                self.notify_failures,
                self.metric_failures
            )?;
        }

        Ok(())
    }
}
