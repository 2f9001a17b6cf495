//! Core type definitions for TubeGuard
//!
//! Feature flags, DOM event kinds and listener identities shared between the
//! engine and its hosts.

// =============================================================================
// Constants
// =============================================================================

/// Reminder interval used until a settings snapshot says otherwise.
pub const DEFAULT_REMINDER_INTERVAL_MINUTES: u32 = 15;
/// Smallest accepted reminder interval.
pub const MIN_REMINDER_INTERVAL_MINUTES: u32 = 1;
/// Largest accepted reminder interval.
pub const MAX_REMINDER_INTERVAL_MINUTES: u32 = 180;

// =============================================================================
// Features
// =============================================================================

bitflags::bitflags! {
    /// Enabled-feature bit mask.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Features: u8 {
        /// Thumbnail blurring
        const BLUR = 1 << 0;
        /// Shorts hiding
        const SHORTS = 1 << 1;
        /// Pause videos on hover/touch
        const HOVER_PAUSE = 1 << 2;
        /// Popup and overlay dismissal
        const POPUP_REMOVAL = 1 << 3;
        /// Watch-time reminder
        const TIME_REMINDER = 1 << 4;

        /// Every feature (the documented default)
        const ALL = Self::BLUR.bits()
            | Self::SHORTS.bits()
            | Self::HOVER_PAUSE.bits()
            | Self::POPUP_REMOVAL.bits()
            | Self::TIME_REMINDER.bits();
    }
}

/// A single toggleable feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Feature {
    Blur,
    Shorts,
    HoverPause,
    PopupRemoval,
    TimeReminder,
}

impl Feature {
    /// All features in apply-pass order.
    pub const ALL: [Feature; 5] = [
        Feature::Blur,
        Feature::Shorts,
        Feature::HoverPause,
        Feature::PopupRemoval,
        Feature::TimeReminder,
    ];

    pub fn mask(self) -> Features {
        match self {
            Feature::Blur => Features::BLUR,
            Feature::Shorts => Features::SHORTS,
            Feature::HoverPause => Features::HOVER_PAUSE,
            Feature::PopupRemoval => Features::POPUP_REMOVAL,
            Feature::TimeReminder => Features::TIME_REMINDER,
        }
    }

    /// Key under which the settings store persists this feature.
    pub fn storage_key(self) -> &'static str {
        match self {
            Feature::Blur => "blurEnabled",
            Feature::Shorts => "shortsRemovalEnabled",
            Feature::HoverPause => "pauseOnHoverEnabled",
            Feature::PopupRemoval => "popupRemovalEnabled",
            Feature::TimeReminder => "timeReminderEnabled",
        }
    }
}

/// The engine's flag snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureFlags {
    enabled: Features,
    reminder_interval_minutes: u32,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            enabled: Features::ALL,
            reminder_interval_minutes: DEFAULT_REMINDER_INTERVAL_MINUTES,
        }
    }
}

impl FeatureFlags {
    pub fn is_enabled(&self, feature: Feature) -> bool {
        self.enabled.contains(feature.mask())
    }

    pub fn enabled(&self) -> Features {
        self.enabled
    }

    /// Set a feature's flag. Returns true if the value changed.
    pub fn set(&mut self, feature: Feature, enabled: bool) -> bool {
        let before = self.enabled;
        self.enabled.set(feature.mask(), enabled);
        before != self.enabled
    }

    pub fn reminder_interval_minutes(&self) -> u32 {
        self.reminder_interval_minutes
    }

    pub fn reminder_interval_ms(&self) -> u64 {
        u64::from(self.reminder_interval_minutes) * 60_000
    }

    /// Set the reminder interval, clamped to the accepted range.
    /// Returns the stored value.
    pub fn set_reminder_interval(&mut self, minutes: i64) -> u32 {
        let clamped = minutes.clamp(
            i64::from(MIN_REMINDER_INTERVAL_MINUTES),
            i64::from(MAX_REMINDER_INTERVAL_MINUTES),
        );
        // In range after the clamp above.
        self.reminder_interval_minutes = clamped as u32;
        self.reminder_interval_minutes
    }
}

// =============================================================================
// DOM Events
// =============================================================================

/// DOM events the engine binds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DomEvent {
    PointerEnter,
    PointerLeave,
    TouchStart,
    TouchEnd,
    Play,
    Pause,
    Click,
}

impl DomEvent {
    /// Browser event type name.
    pub fn name(self) -> &'static str {
        match self {
            DomEvent::PointerEnter => "mouseenter",
            DomEvent::PointerLeave => "mouseleave",
            DomEvent::TouchStart => "touchstart",
            DomEvent::TouchEnd => "touchend",
            DomEvent::Play => "play",
            DomEvent::Pause => "pause",
            DomEvent::Click => "click",
        }
    }
}

/// Identity of a binding: which engine handler an event should reach.
///
/// Hosts hand the listener back with every event they deliver, so the engine
/// can route without keeping per-node closures of its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Listener {
    /// Touch-reveal on a blurred thumbnail
    BlurReveal,
    /// Hover/touch pause on a video element
    HoverVideo,
    /// Hover/touch pause on a thumbnail container (video resolved at event time)
    HoverContainer,
    /// Play/pause tracking for the watch-time reminder
    ReminderMedia,
    /// Reminder prompt "close" button
    PromptClose,
    /// Reminder prompt "continue" button
    PromptContinue,
    /// Reminder prompt "take a break" button
    PromptBreak,
}

impl Listener {
    pub fn name(self) -> &'static str {
        match self {
            Listener::BlurReveal => "blur-reveal",
            Listener::HoverVideo => "hover-video",
            Listener::HoverContainer => "hover-container",
            Listener::ReminderMedia => "reminder-media",
            Listener::PromptClose => "prompt-close",
            Listener::PromptContinue => "prompt-continue",
            Listener::PromptBreak => "prompt-break",
        }
    }
}

// =============================================================================
// Timers
// =============================================================================

/// Handle of a one-shot timer issued by a [`Scheduler`](crate::dom::Scheduler).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(pub u32);
