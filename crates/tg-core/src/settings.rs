//! Settings snapshot and command wire types
//!
//! The engine consumes two kinds of input from the extension: the persisted
//! settings (read once at start-up) and toggle commands sent by the control
//! surface. Both are plain JSON objects with camelCase keys.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::Feature;

/// Keys read from the settings store.
pub const SETTINGS_KEYS: [&str; 7] = [
    "blurEnabled",
    "shortsRemovalEnabled",
    "pauseOnHoverEnabled",
    "popupRemovalEnabled",
    "timeReminderEnabled",
    "timerInterval",
    "timerPreset",
];

/// Acknowledgement text returned for every inbound message.
pub const ACK_RESPONSE: &str = "Settings updated";

/// Error type for settings retrieval.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SettingsError {
    #[error("Settings store unavailable: {0}")]
    Unavailable(String),
    #[error("Settings payload is not an object")]
    NotAnObject,
}

/// Persisted settings as read from the store. Absent keys keep their
/// defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct SettingsSnapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blur_enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shorts_removal_enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pause_on_hover_enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub popup_removal_enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_reminder_enabled: Option<bool>,
    /// Minutes between reminders
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[cfg_attr(feature = "ts", ts(type = "number | null"))]
    pub timer_interval: Option<i64>,
    /// Preset label chosen in the control surface; informational only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timer_preset: Option<String>,
}

impl SettingsSnapshot {
    /// Read a snapshot leniently: values of the wrong type are dropped
    /// instead of failing the whole load.
    pub fn from_value(value: &Value) -> Result<Self, SettingsError> {
        let map = value.as_object().ok_or(SettingsError::NotAnObject)?;
        let flag = |key: &str| map.get(key).and_then(Value::as_bool);

        Ok(Self {
            blur_enabled: flag("blurEnabled"),
            shorts_removal_enabled: flag("shortsRemovalEnabled"),
            pause_on_hover_enabled: flag("pauseOnHoverEnabled"),
            popup_removal_enabled: flag("popupRemovalEnabled"),
            time_reminder_enabled: flag("timeReminderEnabled"),
            timer_interval: map.get("timerInterval").and_then(Value::as_i64),
            timer_preset: map.get("timerPreset").and_then(Value::as_str).map(str::to_string),
        })
    }

    pub fn from_json(text: &str) -> Result<Self, SettingsError> {
        let value: Value = serde_json::from_str(text).map_err(|e| SettingsError::Unavailable(e.to_string()))?;
        Self::from_value(&value)
    }

    /// The stored flag for `feature`, if present.
    pub fn feature(&self, feature: Feature) -> Option<bool> {
        match feature {
            Feature::Blur => self.blur_enabled,
            Feature::Shorts => self.shorts_removal_enabled,
            Feature::HoverPause => self.pause_on_hover_enabled,
            Feature::PopupRemoval => self.popup_removal_enabled,
            Feature::TimeReminder => self.time_reminder_enabled,
        }
    }
}

/// Inbound message from the control surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct CommandMessage {
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[cfg_attr(feature = "ts", ts(type = "number | null"))]
    pub interval: Option<i64>,
}

/// Reply sent for every inbound message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct CommandAck {
    pub response: String,
}

impl Default for CommandAck {
    fn default() -> Self {
        Self {
            response: ACK_RESPONSE.to_string(),
        }
    }
}

/// A validated command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    SetFeature { feature: Feature, enabled: bool },
    SetReminderInterval { minutes: i64 },
}

impl Command {
    /// Validate a raw JSON message. Unknown actions, missing payloads and
    /// ill-typed fields yield `None`.
    pub fn from_value(value: &Value) -> Option<Self> {
        let message: CommandMessage = serde_json::from_value(value.clone()).ok()?;
        Self::from_message(&message)
    }

    pub fn from_message(message: &CommandMessage) -> Option<Self> {
        if message.action == "updateTimerInterval" {
            return message
                .interval
                .map(|minutes| Command::SetReminderInterval { minutes });
        }
        let feature = feature_for_action(&message.action)?;
        message
            .enabled
            .map(|enabled| Command::SetFeature { feature, enabled })
    }

    /// Wire action name.
    pub fn action(&self) -> &'static str {
        match self {
            Command::SetFeature { feature, .. } => action_for_feature(*feature),
            Command::SetReminderInterval { .. } => "updateTimerInterval",
        }
    }
}

fn feature_for_action(action: &str) -> Option<Feature> {
    Feature::ALL
        .into_iter()
        .find(|feature| action_for_feature(*feature) == action)
}

fn action_for_feature(feature: Feature) -> &'static str {
    match feature {
        Feature::Blur => "toggleBlur",
        Feature::Shorts => "toggleShorts",
        Feature::HoverPause => "togglePauseOnHover",
        Feature::PopupRemoval => "togglePopupRemoval",
        Feature::TimeReminder => "toggleTimeReminder",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_toggle_commands() {
        let cases = [
            ("toggleBlur", Feature::Blur),
            ("toggleShorts", Feature::Shorts),
            ("togglePauseOnHover", Feature::HoverPause),
            ("togglePopupRemoval", Feature::PopupRemoval),
            ("toggleTimeReminder", Feature::TimeReminder),
        ];
        for (action, feature) in cases {
            let command = Command::from_value(&json!({"action": action, "enabled": false}));
            assert_eq!(command, Some(Command::SetFeature { feature, enabled: false }));
            assert_eq!(command.map(|c| c.action()), Some(action));
        }
    }

    #[test]
    fn test_parse_interval_command() {
        let command = Command::from_value(&json!({"action": "updateTimerInterval", "interval": 30}));
        assert_eq!(command, Some(Command::SetReminderInterval { minutes: 30 }));
    }

    #[test]
    fn test_malformed_commands_are_rejected() {
        for message in [
            json!({"action": "bogusAction"}),
            json!({"action": "toggleBlur"}),
            json!({"action": "toggleBlur", "enabled": "yes"}),
            json!({"action": "updateTimerInterval"}),
            json!({"action": "updateTimerInterval", "interval": 12.5}),
            json!({"enabled": true}),
            json!("toggleBlur"),
            json!(null),
        ] {
            assert_eq!(Command::from_value(&message), None, "{}", message);
        }
    }

    #[test]
    fn test_snapshot_is_lenient() {
        let snapshot = SettingsSnapshot::from_value(&json!({
            "blurEnabled": false,
            "shortsRemovalEnabled": "nope",
            "timerInterval": 45,
            "timerPreset": "custom",
            "unrelated": 1
        }))
        .unwrap();

        assert_eq!(snapshot.feature(Feature::Blur), Some(false));
        assert_eq!(snapshot.feature(Feature::Shorts), None);
        assert_eq!(snapshot.feature(Feature::TimeReminder), None);
        assert_eq!(snapshot.timer_interval, Some(45));
        assert_eq!(snapshot.timer_preset.as_deref(), Some("custom"));
    }

    #[test]
    fn test_snapshot_requires_object() {
        assert_eq!(SettingsSnapshot::from_value(&json!([1, 2])), Err(SettingsError::NotAnObject));
        assert!(matches!(SettingsSnapshot::from_json("{"), Err(SettingsError::Unavailable(_))));
    }

    #[test]
    fn test_snapshot_serializes_camel_case() {
        let snapshot = SettingsSnapshot {
            pause_on_hover_enabled: Some(true),
            timer_interval: Some(20),
            ..Default::default()
        };
        let value = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(value, json!({"pauseOnHoverEnabled": true, "timerInterval": 20}));
    }

    #[test]
    fn test_ack_text() {
        let ack = serde_json::to_value(CommandAck::default()).unwrap();
        assert_eq!(ack, json!({"response": "Settings updated"}));
    }
}
