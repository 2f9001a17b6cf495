//! Dispatcher
//!
//! [`Engine`] owns the flag snapshot, the selector catalog, every feature
//! module and the change detector. Hosts feed it mutation batches, timer
//! expiries, bound DOM events, navigation notices, commands and the settings
//! snapshot; it answers each by running the relevant module code
//! synchronously against the host's [`Dom`].

use serde::Serialize;
use serde_json::Value;

use crate::catalog::SelectorCatalog;
use crate::config::EngineConfig;
use crate::detector::{ChangeDetector, DetectorStats, ObserverKind};
use crate::dom::{Dom, Scheduler};
use crate::modules::{Context, HoverPause, PopupDismissal, ShortsSuppression, ThumbnailBlur};
use crate::reminder::{ReminderSession, ReminderState, WatchTimeReminder};
use crate::selector::SelectorError;
use crate::settings::{Command, CommandAck, SettingsError, SettingsSnapshot};
use crate::types::{DomEvent, Feature, FeatureFlags, Listener, TimerId};

/// Error type for engine construction.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error("Invalid selector catalog: {0}")]
    Catalog(#[from] SelectorError),
    #[error("Invalid config: {0}")]
    InvalidConfig(&'static str),
}

/// What one pass changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PassReport {
    pub blurred: usize,
    pub shorts_hidden: usize,
    pub hover_bound: usize,
    pub popups_removed: usize,
}

impl PassReport {
    pub fn total(&self) -> usize {
        self.blurred + self.shorts_hidden + self.hover_bound + self.popups_removed
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

struct Modules<N> {
    blur: ThumbnailBlur<N>,
    shorts: ShortsSuppression,
    hover: HoverPause,
    popup: PopupDismissal,
    reminder: WatchTimeReminder<N>,
}

impl<N> Default for Modules<N> {
    fn default() -> Self {
        Self {
            blur: ThumbnailBlur::default(),
            shorts: ShortsSuppression,
            hover: HoverPause,
            popup: PopupDismissal,
            reminder: WatchTimeReminder::default(),
        }
    }
}

/// The modification engine.
pub struct Engine<D: Dom, S: Scheduler> {
    dom: D,
    scheduler: S,
    config: EngineConfig,
    catalog: SelectorCatalog,
    flags: FeatureFlags,
    detector: ChangeDetector,
    modules: Modules<D::Node>,
    running: bool,
    passes: u64,
}

impl<D: Dom, S: Scheduler> Engine<D, S> {
    /// Build an engine with default flags. Nothing touches the page until
    /// [`start`](Self::start).
    pub fn new(dom: D, scheduler: S, config: EngineConfig) -> Result<Self, EngineError> {
        if config.check_interval_ms == 0 {
            return Err(EngineError::InvalidConfig("checkIntervalMs must be positive"));
        }
        let catalog = SelectorCatalog::with_overrides(&config.selector_overrides)?;

        Ok(Self {
            dom,
            scheduler,
            detector: ChangeDetector::new(config.check_interval_ms),
            config,
            catalog,
            flags: FeatureFlags::default(),
            modules: Modules::default(),
            running: false,
            passes: 0,
        })
    }

    fn split(&mut self) -> (Context<'_, D, S>, &mut Modules<D::Node>) {
        let ctx = Context {
            dom: &mut self.dom,
            scheduler: &mut self.scheduler,
            catalog: &self.catalog,
            config: &self.config,
        };
        (ctx, &mut self.modules)
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Arm the fallback tick, run each enabled feature's enable path and one
    /// full apply pass.
    pub fn start(&mut self) -> PassReport {
        if self.running {
            return self.apply_pass();
        }
        self.running = true;
        self.detector.arm(&mut self.scheduler);
        log::info!("Engine started with features {:?}", self.flags.enabled());

        let flags = self.flags;
        let (mut ctx, modules) = self.split();
        let shorts_hidden = if flags.is_enabled(Feature::Shorts) {
            modules.shorts.set_enabled(&mut ctx, true)
        } else {
            0
        };
        let popups_removed = modules.popup.on_trigger(&mut ctx, flags.is_enabled(Feature::PopupRemoval));

        let mut report = self.apply_pass();
        report.shorts_hidden += shorts_hidden;
        report.popups_removed += popups_removed;
        report
    }

    /// Cancel every timer, drop the prompt and stop reacting to input.
    /// Page modifications already made stay in place.
    pub fn shutdown(&mut self) {
        if !self.running {
            return;
        }
        self.running = false;
        self.detector.disarm(&mut self.scheduler);
        let (mut ctx, modules) = self.split();
        modules.blur.shutdown(ctx.scheduler);
        modules.reminder.shutdown(&mut ctx);
        log::info!("Engine stopped after {} pass(es)", self.passes);
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    // =========================================================================
    // Passes
    // =========================================================================

    /// Run every enabled module's `apply` in fixed order, then the reminder
    /// observation.
    pub fn apply_pass(&mut self) -> PassReport {
        let flags = self.flags;
        let (mut ctx, modules) = self.split();

        let report = PassReport {
            blurred: modules.blur.apply(&mut ctx, flags.is_enabled(Feature::Blur)),
            shorts_hidden: modules.shorts.apply(&mut ctx, flags.is_enabled(Feature::Shorts)),
            hover_bound: modules.hover.apply(&mut ctx, flags.is_enabled(Feature::HoverPause)),
            popups_removed: 0,
        };
        modules.reminder.observe(
            &mut ctx,
            flags.is_enabled(Feature::TimeReminder),
            flags.reminder_interval_ms(),
        );

        self.passes += 1;
        if !report.is_empty() {
            log::debug!("Pass {}: {:?}", self.passes, report);
        }
        report
    }

    /// A mutation batch from one of the host's observers.
    pub fn on_mutations(&mut self, kind: ObserverKind, added: &[D::Node]) -> PassReport {
        if !self.running || !self.detector.on_mutations(kind, added.len()) {
            return PassReport::default();
        }

        match kind {
            ObserverKind::Content => self.apply_pass(),
            ObserverKind::Popup => {
                let enabled = self.flags.is_enabled(Feature::PopupRemoval);
                let (mut ctx, modules) = self.split();
                if !enabled || !modules.popup.is_trigger(&ctx, added) {
                    return PassReport::default();
                }
                PassReport {
                    popups_removed: modules.popup.on_trigger(&mut ctx, true),
                    ..PassReport::default()
                }
            }
        }
    }

    /// The host navigated within the page (history change).
    pub fn on_navigation(&mut self) -> PassReport {
        if !self.running {
            return PassReport::default();
        }
        log::debug!("Navigation to {}", self.dom.location());
        self.apply_pass()
    }

    /// A timer armed through the scheduler has expired.
    pub fn on_timer(&mut self, id: TimerId) {
        if !self.running {
            return;
        }
        if self.detector.on_timer(&mut self.scheduler, id) {
            self.apply_pass();
            return;
        }

        let flags = self.flags;
        let (mut ctx, modules) = self.split();
        let handled = modules.blur.on_timer(&mut ctx, id, flags.is_enabled(Feature::Blur))
            || modules.reminder.on_timer(
                &mut ctx,
                id,
                flags.is_enabled(Feature::TimeReminder),
                flags.reminder_interval_ms(),
            );
        if !handled {
            log::debug!("Ignoring stale timer {:?}", id);
        }
    }

    /// A bound DOM event fired on `node`.
    pub fn handle_event(&mut self, node: &D::Node, event: DomEvent, listener: Listener) {
        if !self.running {
            return;
        }

        let flags = self.flags;
        let reminder_on = flags.is_enabled(Feature::TimeReminder);
        let interval_ms = flags.reminder_interval_ms();
        let (mut ctx, modules) = self.split();

        match listener {
            Listener::BlurReveal => {
                modules
                    .blur
                    .handle_event(&mut ctx, node, event, flags.is_enabled(Feature::Blur));
            }
            Listener::HoverVideo | Listener::HoverContainer => {
                modules.hover.handle_event(
                    &mut ctx,
                    node,
                    event,
                    listener,
                    flags.is_enabled(Feature::HoverPause),
                );
            }
            Listener::ReminderMedia => {
                modules
                    .reminder
                    .handle_media(&mut ctx, node, event, reminder_on, interval_ms);
            }
            Listener::PromptClose | Listener::PromptContinue | Listener::PromptBreak => {
                if event == DomEvent::Click {
                    modules.reminder.handle_prompt(&mut ctx, listener, reminder_on, interval_ms);
                }
            }
        }
    }

    // =========================================================================
    // Commands & settings
    // =========================================================================

    /// Handle a raw message from the control surface. Every message is
    /// acknowledged, valid or not.
    pub fn handle_message(&mut self, message: &Value) -> CommandAck {
        match Command::from_value(message) {
            Some(command) => {
                self.handle_command(command);
            }
            None => log::debug!("Ignoring malformed command: {}", message),
        }
        CommandAck::default()
    }

    /// Apply a validated command. Returns true if a flag changed.
    pub fn handle_command(&mut self, command: Command) -> bool {
        match command {
            Command::SetFeature { feature, enabled } => self.set_feature(feature, enabled),
            Command::SetReminderInterval { minutes } => self.set_reminder_interval(minutes),
        }
    }

    /// Every toggle reaches its module, so a repeated `enabled: true`
    /// re-applies the feature (re-blurring a touch-revealed thumbnail, for
    /// one). A repeated reminder toggle leaves the running session alone.
    fn set_feature(&mut self, feature: Feature, enabled: bool) -> bool {
        let changed = self.flags.set(feature, enabled);
        if changed {
            log::info!("{} {}", feature.storage_key(), if enabled { "on" } else { "off" });
        }
        if !self.running || (!changed && feature == Feature::TimeReminder) {
            return changed;
        }

        let interval_ms = self.flags.reminder_interval_ms();
        let (mut ctx, modules) = self.split();
        match feature {
            Feature::Blur => {
                modules.blur.set_enabled(&mut ctx, enabled);
            }
            Feature::Shorts => {
                modules.shorts.set_enabled(&mut ctx, enabled);
            }
            Feature::HoverPause => {
                modules.hover.set_enabled(&mut ctx, enabled);
            }
            Feature::PopupRemoval => {
                modules.popup.on_trigger(&mut ctx, enabled);
            }
            Feature::TimeReminder => modules.reminder.set_enabled(&mut ctx, enabled, interval_ms),
        }
        changed
    }

    fn set_reminder_interval(&mut self, minutes: i64) -> bool {
        let before = self.flags.reminder_interval_minutes();
        let stored = self.flags.set_reminder_interval(minutes);
        if i64::from(stored) != minutes {
            log::warn!("Reminder interval {} out of range, using {}", minutes, stored);
        }
        if stored == before {
            return false;
        }
        log::info!("Reminder interval set to {} minute(s)", stored);
        if !self.running {
            return true;
        }

        let flags = self.flags;
        let (mut ctx, modules) = self.split();
        modules.reminder.set_interval(
            &mut ctx,
            flags.is_enabled(Feature::TimeReminder),
            flags.reminder_interval_ms(),
        );
        true
    }

    /// Reconcile with the persisted settings. Each stored value that differs
    /// from the current flags goes through the command path; a failed load
    /// keeps the current flags.
    pub fn apply_settings(&mut self, settings: Result<SettingsSnapshot, SettingsError>) {
        let snapshot = match settings {
            Ok(snapshot) => snapshot,
            Err(err) => {
                log::warn!("Could not load settings, keeping defaults: {}", err);
                return;
            }
        };

        let mut changed = 0;
        for feature in Feature::ALL {
            if let Some(enabled) = snapshot.feature(feature) {
                if self.handle_command(Command::SetFeature { feature, enabled }) {
                    changed += 1;
                }
            }
        }
        if let Some(minutes) = snapshot.timer_interval {
            if self.handle_command(Command::SetReminderInterval { minutes }) {
                changed += 1;
            }
        }
        log::info!("Settings loaded, {} value(s) differ from defaults", changed);
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn flags(&self) -> FeatureFlags {
        self.flags
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn catalog(&self) -> &SelectorCatalog {
        &self.catalog
    }

    pub fn dom(&self) -> &D {
        &self.dom
    }

    pub fn dom_mut(&mut self) -> &mut D {
        &mut self.dom
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut S {
        &mut self.scheduler
    }

    pub fn reminder_state(&self) -> ReminderState {
        self.modules.reminder.state()
    }

    pub fn reminder_session(&self) -> Option<&ReminderSession> {
        self.modules.reminder.session()
    }

    pub fn blur_has_pending_reveal(&self) -> bool {
        self.modules.blur.has_pending_reveal()
    }

    /// Apply passes run so far.
    pub fn passes(&self) -> u64 {
        self.passes
    }

    pub fn detector_stats(&self) -> DetectorStats {
        self.detector.stats()
    }
}
