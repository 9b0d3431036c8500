//! Morning digest - every tracked sensor, grouped by structure.
//!
//! Reads the store only; the directory is not polled. Offline sensors are
//! listed before online ones so problems sit at the top of the message.

use crate::error::Result;
use crate::model::{short_eui, StoredStatus};
use crate::notify::NotificationSink;
use crate::store::SensorStateStore;
use chrono_tz::Tz;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

pub const DIGEST_TITLE: &str = "Morning sensor digest";

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct DigestSummary {
    pub structures: usize,
    pub online: usize,
    pub offline: usize,
}

impl DigestSummary {
    pub fn status_line(&self) -> String {
        format!(
            "Morning digest sent: {} structures, {} offline, {} online",
            self.structures, self.offline, self.online
        )
    }
}

#[derive(Default)]
struct StructureGroup<'a> {
    offline: Vec<&'a StoredStatus>,
    online: Vec<&'a StoredStatus>,
}

/// Sends the grouped status digest through the notification sink.
pub struct DigestReporter {
    store: Arc<dyn SensorStateStore>,
    notifier: Arc<dyn NotificationSink>,
    timezone: Tz,
}

impl DigestReporter {
    pub fn new(
        store: Arc<dyn SensorStateStore>,
        notifier: Arc<dyn NotificationSink>,
        timezone: Tz,
    ) -> Self {
        Self {
            store,
            notifier,
            timezone,
        }
    }

    pub async fn run(&self) -> Result<DigestSummary> {
        let records = self.store.list_all()?;
        let (message, summary) = compose_digest(&records, self.timezone);

        self.notifier.send(&message, true).await?;

        info!(
            structures = summary.structures,
            online = summary.online,
            offline = summary.offline,
            "Morning digest sent"
        );
        Ok(summary)
    }
}

/// Renders the digest body (HTML-flavoured plain text) and its counts.
///
/// Each sensor line reads `<name> (<last 6 of eui>) - since MM/DD/YYYY HH:MM`
/// with the time of the last status change in `tz`, or `N/A` when the row has
/// none. Rows missing a status count as offline.
pub fn compose_digest(records: &[StoredStatus], tz: Tz) -> (String, DigestSummary) {
    let mut groups: BTreeMap<&str, StructureGroup<'_>> = BTreeMap::new();
    for record in records {
        let group = groups.entry(record.structure_name()).or_default();
        if record.is_online() {
            group.online.push(record);
        } else {
            group.offline.push(record);
        }
    }

    let summary = DigestSummary {
        structures: groups.len(),
        online: records.iter().filter(|r| r.is_online()).count(),
        offline: records.iter().filter(|r| !r.is_online()).count(),
    };

    let mut message = format!("{}\n\n", DIGEST_TITLE);
    if groups.is_empty() {
        message.push_str("No sensors are being tracked yet.");
        return (message, summary);
    }

    for (structure, group) in &groups {
        for (label, sensors) in [("offline", &group.offline), ("online", &group.online)] {
            if sensors.is_empty() {
                continue;
            }
            message.push_str(&format!(
                "<b>{} - {} sensors:</b>\n",
                escape_html(structure),
                label
            ));
            for record in sensors.iter() {
                message.push_str(&sensor_line(record, tz));
                message.push('\n');
            }
            message.push('\n');
        }
    }

    (message.trim_end().to_string(), summary)
}

fn sensor_line(record: &StoredStatus, tz: Tz) -> String {
    let since = match record.last_status_change {
        Some(at) => at.with_timezone(&tz).format("%m/%d/%Y %H:%M").to_string(),
        None => "N/A".to_string(),
    };
    format!(
        "{} ({}) - since {}",
        escape_html(record.sensor_name()),
        short_eui(&record.eui),
        since
    )
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
