//! Deterministic driver
//!
//! [`Simulation`] plays the host's part over a [`MemoryDom`] and a
//! [`ManualScheduler`]: it delivers queued DOM events to the bound
//! listeners, reports inserted nodes to both observers, and fires timers in
//! due order as virtual time advances. Tests, benches and the CLI drive the
//! engine through it.

use serde_json::Value;

use crate::config::EngineConfig;
use crate::detector::ObserverKind;
use crate::dom::memory::{NodeId, PageFixture};
use crate::dom::{ManualScheduler, MemoryDom, Scheduler};
use crate::engine::{Engine, EngineError, PassReport};
use crate::settings::{CommandAck, SettingsError, SettingsSnapshot};
use crate::types::DomEvent;

/// Upper bound on event/mutation rounds per [`Simulation::pump`]; a page
/// that keeps mutating itself in response to the engine stops here.
const MAX_PUMP_ROUNDS: usize = 64;

pub struct Simulation {
    engine: Engine<MemoryDom, ManualScheduler>,
}

impl Simulation {
    pub fn new(dom: MemoryDom, config: EngineConfig) -> Result<Self, EngineError> {
        Ok(Self {
            engine: Engine::new(dom, ManualScheduler::new(), config)?,
        })
    }

    pub fn from_fixture(fixture: &PageFixture, config: EngineConfig) -> Result<Self, EngineError> {
        Self::new(MemoryDom::from_fixture(fixture), config)
    }

    /// Empty page at `location` with the default config.
    #[cfg(test)]
    pub fn blank(location: &str) -> Self {
        Self::new(MemoryDom::new(location), EngineConfig::default()).expect("built-in catalog parses")
    }

    /// Start the engine and deliver whatever the start-up pass caused.
    pub fn start(&mut self) -> PassReport {
        let report = self.engine.start();
        self.pump();
        report
    }

    /// Deliver queued events and mutation batches until the page settles.
    /// Returns the number of rounds run.
    pub fn pump(&mut self) -> usize {
        for round in 0..MAX_PUMP_ROUNDS {
            let dom = self.engine.dom_mut();
            let events = dom.take_events();
            let added = dom.take_added();
            if events.is_empty() && added.is_empty() {
                return round;
            }

            for (node, event) in events {
                for listener in self.engine.dom().listeners_for(node, event) {
                    self.engine.handle_event(&node, event, listener);
                }
            }
            if !added.is_empty() {
                self.engine.on_mutations(ObserverKind::Content, &added);
                self.engine.on_mutations(ObserverKind::Popup, &added);
            }
        }
        log::warn!("Page did not settle after {} rounds", MAX_PUMP_ROUNDS);
        MAX_PUMP_ROUNDS
    }

    /// Queue `event` on `node` and deliver it.
    pub fn fire(&mut self, node: NodeId, event: DomEvent) {
        self.engine.dom_mut().fire(node, event);
        self.pump();
    }

    /// Move virtual time forward by `ms`, firing every timer that comes due
    /// on the way (including timers armed by earlier ones).
    pub fn advance(&mut self, ms: u64) {
        let until = self.now().saturating_add(ms);
        while let Some(id) = self.engine.scheduler_mut().pop_due(until) {
            self.engine.on_timer(id);
            self.pump();
        }
        self.engine.scheduler_mut().advance_to(until);
        self.pump();
    }

    /// Change the location and report the navigation.
    pub fn navigate(&mut self, location: &str) {
        self.engine.dom_mut().set_location(location);
        self.engine.on_navigation();
        self.pump();
    }

    /// Deliver a control-surface message given as JSON text. Text that is
    /// not JSON is handled like any other malformed message.
    pub fn send(&mut self, message: &str) -> CommandAck {
        let value = serde_json::from_str(message).unwrap_or(Value::Null);
        self.send_value(&value)
    }

    pub fn send_value(&mut self, message: &Value) -> CommandAck {
        let ack = self.engine.handle_message(message);
        self.pump();
        ack
    }

    /// Deliver the settings snapshot (or its failure).
    pub fn load_settings(&mut self, settings: Result<SettingsSnapshot, SettingsError>) {
        self.engine.apply_settings(settings);
        self.pump();
    }

    pub fn now(&self) -> u64 {
        self.engine.scheduler().now_ms()
    }

    pub fn dom(&self) -> &MemoryDom {
        self.engine.dom()
    }

    pub fn dom_mut(&mut self) -> &mut MemoryDom {
        self.engine.dom_mut()
    }

    pub fn engine(&self) -> &Engine<MemoryDom, ManualScheduler> {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut Engine<MemoryDom, ManualScheduler> {
        &mut self.engine
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::Dom;
    use crate::types::Listener;

    #[test]
    fn test_advance_fires_chained_timers_in_order() {
        let mut sim = Simulation::blank("/");
        sim.start();
        sim.advance(5500);
        assert_eq!(sim.now(), 5500);
        assert_eq!(sim.engine().detector_stats().ticks, 5);
        assert_eq!(sim.engine().scheduler().next_due(), Some(6000));
    }

    #[test]
    fn test_pump_delivers_events_to_bound_listeners() {
        let mut sim = Simulation::blank("/");
        let body = sim.dom().body_id();
        let video = sim.dom_mut().append(body, "video", &[("class", "html5-main-video")]);
        sim.start();
        assert_eq!(sim.dom().listeners_for(video, DomEvent::Play), vec![Listener::ReminderMedia]);

        sim.dom_mut().user_play(video);
        assert!(sim.dom().has_pending());
        sim.pump();
        assert!(!sim.dom().has_pending());
    }

    #[test]
    fn test_fixture_page_is_processed_on_start() {
        let fixture = PageFixture::from_json(
            r#"{
                "location": "/",
                "body": [
                    {"tag": "ytd-thumbnail", "children": [{"tag": "img"}]},
                    {"tag": "ytd-reel-shelf-renderer"}
                ]
            }"#,
        )
        .unwrap();
        let mut sim = Simulation::from_fixture(&fixture, EngineConfig::default()).unwrap();
        let report = sim.start();

        assert_eq!(report.blurred, 1);
        assert_eq!(report.shorts_hidden, 1);
        assert_eq!(report.hover_bound, 1);
        let img = sim.dom().select("img")[0];
        assert_eq!(sim.dom().style(&img, "filter").as_deref(), Some("blur(10px)"));
    }

    #[test]
    fn test_home_page_fixture() {
        let fixture = PageFixture::from_json(include_str!("../../../fixtures/home_page.json")).unwrap();
        let mut sim = Simulation::from_fixture(&fixture, EngineConfig::default()).unwrap();
        sim.start();

        assert_eq!(sim.dom().select(".tg-blurred-thumbnail").len(), 2);
        assert_eq!(sim.dom().select(".tg-shorts-hidden").len(), 3);
        let home_link = sim.dom().select("a[title=\"Home\"]")[0];
        assert!(!sim.dom().has_class(&home_link, "tg-shorts-hidden"));

        let preview = sim.dom().select("ytd-video-preview video")[0];
        assert!(!sim.dom().is_paused(&preview));
        let item = sim.dom().select("ytd-rich-item-renderer:has(video)")[0];
        sim.fire(item, DomEvent::PointerEnter);
        assert!(sim.dom().is_paused(&preview));
        sim.fire(item, DomEvent::PointerLeave);
        assert!(!sim.dom().is_paused(&preview));
    }

    #[test]
    fn test_watch_page_fixture() {
        let fixture = PageFixture::from_json(include_str!("../../../fixtures/watch_page.json")).unwrap();
        let mut sim = Simulation::from_fixture(&fixture, EngineConfig::default()).unwrap();
        let report = sim.start();

        assert_eq!(report.popups_removed, 1);
        assert!(sim.dom().select(".consent-overlay").is_empty());
        assert_eq!(sim.dom().select(".tg-blurred-thumbnail").len(), 1);
        assert_eq!(sim.engine().reminder_state(), crate::ReminderState::Watching);

        let settings = SettingsSnapshot::from_json(include_str!("../../../fixtures/settings.json"));
        sim.load_settings(settings);
        assert_eq!(sim.engine().flags().reminder_interval_minutes(), 30);
        assert!(sim.dom().select("[data-tg-hover-bound]").is_empty());

        sim.advance(30 * 60_000);
        assert!(sim.dom().element_by_id(crate::reminder::PROMPT_ID).is_some());
    }

    #[test]
    fn test_load_settings_applies_snapshot() {
        let mut sim = Simulation::blank("/");
        sim.start();
        sim.load_settings(SettingsSnapshot::from_json(r#"{"pauseOnHoverEnabled": false}"#));
        assert!(!sim.engine().flags().is_enabled(crate::Feature::HoverPause));
    }
}
