//! Engine configuration
//!
//! Every field has a default, so an empty JSON object (or no config at all)
//! yields the documented behaviour.

use std::collections::HashMap;

use serde::Deserialize;

use crate::catalog::Category;

/// Tunables for the engine and its modules.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    /// Blur radius applied to thumbnails, in CSS pixels
    pub blur_amount_px: u32,
    /// Fallback re-apply tick
    pub check_interval_ms: u64,
    /// Delay before a touched thumbnail is revealed
    pub touch_reveal_delay_ms: u64,
    /// How long a pause must last before the reminder session ends
    pub pause_grace_ms: u64,
    /// How long the reminder prompt stays up without interaction
    pub prompt_timeout_ms: u64,
    /// Overlays stacked above this z-index are treated as blocking modals
    pub popup_z_index_threshold: i32,
    /// Location prefix of the single-video watch view
    pub watch_path_prefix: String,
    /// Replacement rule lists per selector category
    pub selector_overrides: HashMap<Category, Vec<String>>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            blur_amount_px: 10,
            check_interval_ms: 1000,
            touch_reveal_delay_ms: 200,
            pause_grace_ms: 5000,
            prompt_timeout_ms: 30_000,
            popup_z_index_threshold: 1000,
            watch_path_prefix: "/watch".to_string(),
            selector_overrides: HashMap::new(),
        }
    }
}

impl EngineConfig {
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// CSS filter value for a blurred thumbnail.
    pub fn blur_filter(&self) -> String {
        format!("blur({}px)", self.blur_amount_px)
    }

    /// True when `location` is the watch view itself: the prefix must end
    /// the path or be followed by a query or a subpath.
    pub fn is_watch_location(&self, location: &str) -> bool {
        match location.strip_prefix(self.watch_path_prefix.as_str()) {
            Some(rest) => rest.is_empty() || rest.starts_with(['?', '/']),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_json_uses_defaults() {
        let config = EngineConfig::from_json("{}").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.blur_filter(), "blur(10px)");
    }

    #[test]
    fn test_partial_json_overrides_fields() {
        let config = EngineConfig::from_json(
            r#"{"blurAmountPx": 4, "checkIntervalMs": 250, "selectorOverrides": {"video": ["video.main"]}}"#,
        )
        .unwrap();
        assert_eq!(config.blur_filter(), "blur(4px)");
        assert_eq!(config.check_interval_ms, 250);
        assert_eq!(config.pause_grace_ms, 5000);
        assert_eq!(
            config.selector_overrides.get(&Category::Video),
            Some(&vec!["video.main".to_string()])
        );
    }

    #[test]
    fn test_watch_location() {
        let config = EngineConfig::default();
        assert!(config.is_watch_location("/watch?v=abc"));
        assert!(!config.is_watch_location("/feed/subscriptions"));
        assert!(config.is_watch_location("/watch"));
        assert!(config.is_watch_location("/watch/abc"));
    }

    #[test]
    fn test_watch_location_needs_a_boundary() {
        let config = EngineConfig::default();
        assert!(!config.is_watch_location("/watchlater"));
        assert!(!config.is_watch_location("/watch_videos?video_ids=a,b"));
        assert!(!config.is_watch_location("/feed/watch?v=abc"));
    }
}
