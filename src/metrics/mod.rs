//! Time-series status sampling.
//!
//! Every observed sensor yields one `sensor_status` point per pass, whether or
//! not its status changed.

mod influx;

use crate::error::Result;
use async_trait::async_trait;
use chrono::DateTime;
use chrono_tz::Tz;

pub use influx::InfluxMetricsSink;

pub const MEASUREMENT: &str = "sensor_status";

/// Outbound time-series channel.
#[async_trait]
pub trait MetricsSink: Send + Sync {
    /// Writes one status point. `at` carries the reporting timezone.
    async fn record(
        &self,
        eui: &str,
        structure_id: &str,
        structure_name: &str,
        is_online: bool,
        at: DateTime<Tz>,
    ) -> Result<()>;
}

/// Sink used when metrics emission is switched off.
pub struct NoopMetricsSink;

#[async_trait]
impl MetricsSink for NoopMetricsSink {
    async fn record(
        &self,
        _eui: &str,
        _structure_id: &str,
        _structure_name: &str,
        _is_online: bool,
        _at: DateTime<Tz>,
    ) -> Result<()> {
        Ok(())
    }
}

/// One `sensor_status` point.
#[derive(Clone, Debug, PartialEq)]
pub struct StatusPoint {
    pub eui: String,
    pub structure_id: String,
    pub structure_name: String,
    pub is_online: bool,
    pub at: DateTime<Tz>,
}

impl StatusPoint {
    /// Serializes the point as InfluxDB line protocol with second precision.
    ///
    /// Tags are sorted by key, the order InfluxDB stores them in.
    pub fn to_line_protocol(&self) -> String {
        format!(
            "{},eui={},structure_id={},structure_name={} is_online={} {}",
            MEASUREMENT,
            escape_tag(&self.eui),
            escape_tag(&self.structure_id),
            escape_tag(&self.structure_name),
            self.is_online,
            self.at.timestamp()
        )
    }
}

/// Escapes commas, equals signs and spaces in a tag value.
///
/// Line breaks and tabs would end or split the line, so they become spaces.
fn escape_tag(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        let c = if matches!(c, '\n' | '\r' | '\t') { ' ' } else { c };
        if matches!(c, ',' | '=' | ' ' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use chrono_tz::Europe::Helsinki;

    fn point(structure_name: &str) -> StatusPoint {
        StatusPoint {
            eui: "AA11BB22".to_string(),
            structure_id: "S1".to_string(),
            structure_name: structure_name.to_string(),
            is_online: true,
            at: Helsinki.with_ymd_and_hms(2026, 10, 19, 9, 30, 0).unwrap(),
        }
    }

    #[test]
    fn test_line_protocol() {
        // 09:30 in Helsinki (UTC+3 in October) is 06:30 UTC
        assert_eq!(
            point("Plant 1").to_line_protocol(),
            "sensor_status,eui=AA11BB22,structure_id=S1,structure_name=Plant\\ 1 is_online=true 1792391400"
        );
    }

    #[test]
    fn test_tag_escaping() {
        assert_eq!(escape_tag("a,b=c d"), "a\\,b\\=c\\ d");
        assert_eq!(escape_tag("C:\\x"), "C:\\\\x");
        assert_eq!(escape_tag("plain"), "plain");
        assert_eq!(escape_tag("Plant\n1\r\n"), "Plant\\ 1\\ \\ ");
    }

    #[test]
    fn test_multiline_structure_name_stays_on_one_line() {
        let line = point("North\nWing").to_line_protocol();
        assert!(!line.contains('\n'));
        assert!(line.contains("structure_name=North\\ Wing "));
    }

    #[tokio::test]
    async fn test_noop_sink_accepts_everything() {
        let at = Helsinki.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        assert!(NoopMetricsSink
            .record("AA11BB22", "S1", "Plant 1", false, at)
            .await
            .is_ok());
    }
}
