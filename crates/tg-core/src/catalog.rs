//! Selector Catalog
//!
//! Every element-matching rule the feature modules use lives here, grouped by
//! category. When the platform changes its markup, this is the only place
//! that needs to change (or a `selectorOverrides` entry in the config).

use std::collections::HashMap;

use serde::Deserialize;

use crate::selector::{Selector, SelectorError};

/// Named group of element-matching rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Category {
    /// Thumbnail images to blur
    Thumbnail,
    /// Structural/attribute matches for short-form containers and nav entries
    ShortsContainer,
    /// Containers hidden when their text mentions "Shorts"
    ShortsTextContainer,
    /// Video players
    Video,
    /// The main player of the watch view
    WatchPlayer,
    /// Thumbnail containers that may mount a preview video
    ThumbnailContainer,
    /// Modal backdrop element
    PopupBackdrop,
    /// Popup dialog element
    PopupDialog,
    /// Generic overlays, removed when stacked above the z-index threshold
    Overlay,
}

impl Category {
    pub const ALL: [Category; 9] = [
        Category::Thumbnail,
        Category::ShortsContainer,
        Category::ShortsTextContainer,
        Category::Video,
        Category::WatchPlayer,
        Category::ThumbnailContainer,
        Category::PopupBackdrop,
        Category::PopupDialog,
        Category::Overlay,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Category::Thumbnail => "thumbnail",
            Category::ShortsContainer => "shortsContainer",
            Category::ShortsTextContainer => "shortsTextContainer",
            Category::Video => "video",
            Category::WatchPlayer => "watchPlayer",
            Category::ThumbnailContainer => "thumbnailContainer",
            Category::PopupBackdrop => "popupBackdrop",
            Category::PopupDialog => "popupDialog",
            Category::Overlay => "overlay",
        }
    }

    /// Built-in rules, in evaluation order.
    pub fn builtin_rules(self) -> &'static [&'static str] {
        match self {
            Category::Thumbnail => THUMBNAIL_RULES,
            Category::ShortsContainer => SHORTS_CONTAINER_RULES,
            Category::ShortsTextContainer => SHORTS_TEXT_RULES,
            Category::Video => VIDEO_RULES,
            Category::WatchPlayer => WATCH_PLAYER_RULES,
            Category::ThumbnailContainer => THUMBNAIL_CONTAINER_RULES,
            Category::PopupBackdrop => POPUP_BACKDROP_RULES,
            Category::PopupDialog => POPUP_DIALOG_RULES,
            Category::Overlay => OVERLAY_RULES,
        }
    }
}

// =============================================================================
// Built-in Rules
// =============================================================================

const THUMBNAIL_RULES: &[&str] = &[
    "ytd-thumbnail img",
    "ytd-compact-video-renderer img",
    "ytd-grid-video-renderer img",
    "ytd-video-renderer img",
    ".ytp-videowall-still-image img",
    "a[href^=\"/watch\"] img",
];

const SHORTS_CONTAINER_RULES: &[&str] = &[
    "ytd-rich-section-renderer[is-shorts-shelf]",
    "ytd-reel-shelf-renderer",
    "ytd-guide-entry-renderer a[title=\"Shorts\"]",
    "ytd-mini-guide-entry-renderer a[title=\"Shorts\"]",
    "ytd-grid-video-renderer a[href*=\"/shorts/\"]",
    "ytd-video-renderer a[href*=\"/shorts/\"]",
    "ytd-rich-grid-row:has(a[href*=\"/shorts/\"])",
    "ytd-shelf-renderer:has(a[href*=\"/shorts/\"])",
];

const SHORTS_TEXT_RULES: &[&str] = &[
    "ytd-browse[page-subtype=\"home\"] ytd-rich-grid-row",
    "ytd-browse[page-subtype=\"subscriptions\"] ytd-shelf-renderer",
    "ytd-browse ytd-rich-section-renderer",
];

const VIDEO_RULES: &[&str] = &["video"];

const WATCH_PLAYER_RULES: &[&str] = &["#movie_player video", "video.html5-main-video"];

const THUMBNAIL_CONTAINER_RULES: &[&str] = &[
    "ytd-thumbnail",
    "ytd-rich-item-renderer",
    "ytd-video-preview",
];

const POPUP_BACKDROP_RULES: &[&str] = &["tp-yt-iron-overlay-backdrop"];

const POPUP_DIALOG_RULES: &[&str] = &["tp-yt-paper-dialog.ytd-popup-container"];

const OVERLAY_RULES: &[&str] = &["[class*=\"overlay\"]"];

/// Text that marks a container as a shorts shelf.
pub const SHORTS_TEXT_MARKER: &str = "Shorts";

// =============================================================================
// Catalog
// =============================================================================

/// Compiled selector for every category.
#[derive(Debug, Clone)]
pub struct SelectorCatalog {
    selectors: HashMap<Category, Selector>,
}

impl SelectorCatalog {
    /// Compile the built-in rules.
    pub fn builtin() -> Result<Self, SelectorError> {
        Self::with_overrides(&HashMap::new())
    }

    /// Compile the built-in rules, replacing any category present in `overrides`.
    pub fn with_overrides(overrides: &HashMap<Category, Vec<String>>) -> Result<Self, SelectorError> {
        let mut selectors = HashMap::with_capacity(Category::ALL.len());
        for category in Category::ALL {
            let selector = match overrides.get(&category) {
                Some(rules) => {
                    log::info!("Using {} override rule(s) for {}", rules.len(), category.name());
                    Selector::from_rules(rules)?
                }
                None => Selector::from_rules(category.builtin_rules())?,
            };
            selectors.insert(category, selector);
        }
        Ok(Self { selectors })
    }

    /// Compiled selector for a category.
    pub fn get(&self, category: Category) -> &Selector {
        // Every category is inserted by the constructors.
        &self.selectors[&category]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_rules_compile() {
        let catalog = SelectorCatalog::builtin().expect("built-in rules should parse");
        for category in Category::ALL {
            assert_eq!(
                catalog.get(category).len(),
                category.builtin_rules().len(),
                "rule count mismatch for {}",
                category.name()
            );
        }
    }

    #[test]
    fn test_override_replaces_category() {
        let mut overrides = HashMap::new();
        overrides.insert(Category::Video, vec!["video.html5-main-video".to_string()]);
        let catalog = SelectorCatalog::with_overrides(&overrides).unwrap();
        assert_eq!(catalog.get(Category::Video).css(), "video.html5-main-video");
        assert_eq!(catalog.get(Category::Thumbnail).len(), THUMBNAIL_RULES.len());
    }

    #[test]
    fn test_invalid_override_is_reported() {
        let mut overrides = HashMap::new();
        overrides.insert(Category::Overlay, vec!["div:hover".to_string()]);
        let err = SelectorCatalog::with_overrides(&overrides).unwrap_err();
        assert_eq!(err, SelectorError::UnsupportedPseudo("hover".to_string()));
    }

    #[test]
    fn test_watch_player_excludes_previews() {
        use crate::dom::{Dom, MemoryDom};

        let catalog = SelectorCatalog::builtin().unwrap();
        let mut dom = MemoryDom::new("/watch?v=abc");
        let body = dom.body_id();
        let player = dom.append(body, "div", &[("id", "movie_player")]);
        let main = dom.append(player, "video", &[]);
        let thumb = dom.append(body, "ytd-thumbnail", &[]);
        let preview = dom.append(thumb, "video", &[]);

        let players = catalog.get(Category::WatchPlayer);
        assert!(dom.matches(&main, players));
        assert!(!dom.matches(&preview, players));
        assert_eq!(dom.query_all(catalog.get(Category::Video)).len(), 2);
    }
}
