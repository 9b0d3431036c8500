//! Human-facing push notifications.

mod pushover;

use crate::error::Result;
use crate::model::status_word;
use async_trait::async_trait;

pub use pushover::PushoverNotifier;

/// Outbound push-notification channel.
///
/// Delivery failures come back as `Error::SinkFailure`; callers decide
/// whether they matter. Nothing here retries.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Sends one message. `html` asks the channel to render basic markup.
    async fn send(&self, message: &str, html: bool) -> Result<()>;

    /// Announces that a sensor changed state.
    async fn notify(
        &self,
        eui: &str,
        new_status: bool,
        structure_name: &str,
        sensor_name: &str,
    ) -> Result<()> {
        let message = transition_message(eui, new_status, structure_name, sensor_name);
        self.send(&message, false).await
    }
}

/// `Sensor '<name>' (<eui>) in '<structure>' is now <online|offline>.`
pub fn transition_message(
    eui: &str,
    new_status: bool,
    structure_name: &str,
    sensor_name: &str,
) -> String {
    format!(
        "Sensor '{}' ({}) in '{}' is now {}.",
        sensor_name,
        eui,
        structure_name,
        status_word(new_status)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transition_message_online() {
        assert_eq!(
            transition_message("AA11BB22", true, "Plant 1", "Temp1"),
            "Sensor 'Temp1' (AA11BB22) in 'Plant 1' is now online."
        );
    }

    #[test]
    fn test_transition_message_offline() {
        let message = transition_message("CC33DD44", false, "Depot", "Tilt2");
        assert!(message.ends_with("is now offline."));
    }
}
