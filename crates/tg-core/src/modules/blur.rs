//! Thumbnail Blur
//!
//! Blurs thumbnail images and lets a touch preview them: a touch-start
//! reveals the image after a short delay, a touch-end puts the blur back.
//! Disabling unblurs tagged thumbnails but keeps their tags and listeners, so
//! toggling back and forth never stacks bindings.

use super::Context;
use crate::catalog::Category;
use crate::dom::{self, Dom, Scheduler};
use crate::selector::Selector;
use crate::types::{DomEvent, Listener, TimerId};

/// Class marking a thumbnail this module has processed.
pub const BLUR_TAG: &str = "tg-blurred-thumbnail";

const UNBLURRED: &str = "blur(0)";

/// Blur state: at most one pending touch-reveal.
#[derive(Debug)]
pub struct ThumbnailBlur<N> {
    pending_reveal: Option<TimerId>,
    reveal_target: Option<N>,
}

impl<N> Default for ThumbnailBlur<N> {
    fn default() -> Self {
        Self {
            pending_reveal: None,
            reveal_target: None,
        }
    }
}

impl<N: Clone> ThumbnailBlur<N> {
    /// Tag, blur and bind every untagged thumbnail. Returns how many were new.
    pub fn apply<D, S>(&mut self, ctx: &mut Context<'_, D, S>, enabled: bool) -> usize
    where
        D: Dom<Node = N>,
        S: Scheduler,
    {
        if !enabled {
            return 0;
        }

        let filter = ctx.config.blur_filter();
        let mut tagged = 0;
        for img in ctx.dom.query_all(ctx.catalog.get(Category::Thumbnail)) {
            if ctx.dom.has_class(&img, BLUR_TAG) {
                continue;
            }
            ctx.dom.add_class(&img, BLUR_TAG);
            ctx.dom.set_style(&img, "filter", &filter);
            ctx.dom.listen(&img, DomEvent::TouchStart, Listener::BlurReveal);
            ctx.dom.listen(&img, DomEvent::TouchEnd, Listener::BlurReveal);
            tagged += 1;
        }
        tagged
    }

    /// Unblur or re-blur tagged thumbnails. Enabling also picks up new ones.
    pub fn set_enabled<D, S>(&mut self, ctx: &mut Context<'_, D, S>, enabled: bool) -> usize
    where
        D: Dom<Node = N>,
        S: Scheduler,
    {
        let tagged = ctx.dom.query_all(&Selector::for_class(BLUR_TAG));
        if enabled {
            let filter = ctx.config.blur_filter();
            for img in &tagged {
                ctx.dom.set_style(img, "filter", &filter);
            }
            tagged.len() + self.apply(ctx, true)
        } else {
            self.cancel_reveal(ctx.scheduler);
            for img in &tagged {
                ctx.dom.set_style(img, "filter", UNBLURRED);
            }
            tagged.len()
        }
    }

    pub fn handle_event<D, S>(&mut self, ctx: &mut Context<'_, D, S>, node: &N, event: DomEvent, enabled: bool)
    where
        D: Dom<Node = N>,
        S: Scheduler,
    {
        match event {
            DomEvent::TouchStart => self.on_touch_start(ctx, node, enabled),
            DomEvent::TouchEnd => self.on_touch_end(ctx, node, enabled),
            _ => {}
        }
    }

    fn on_touch_start<D, S>(&mut self, ctx: &mut Context<'_, D, S>, node: &N, enabled: bool)
    where
        D: Dom<Node = N>,
        S: Scheduler,
    {
        if !enabled {
            return;
        }
        dom::rearm(ctx.scheduler, &mut self.pending_reveal, ctx.config.touch_reveal_delay_ms);
        self.reveal_target = Some(node.clone());
    }

    fn on_touch_end<D, S>(&mut self, ctx: &mut Context<'_, D, S>, node: &N, enabled: bool)
    where
        D: Dom<Node = N>,
        S: Scheduler,
    {
        self.cancel_reveal(ctx.scheduler);
        if enabled && ctx.dom.has_class(node, BLUR_TAG) {
            let filter = ctx.config.blur_filter();
            ctx.dom.set_style(node, "filter", &filter);
        }
    }

    /// Handle a timer expiry. Returns false if the timer is not ours.
    pub fn on_timer<D, S>(&mut self, ctx: &mut Context<'_, D, S>, id: TimerId, enabled: bool) -> bool
    where
        D: Dom<Node = N>,
        S: Scheduler,
    {
        if !dom::claim(&mut self.pending_reveal, id) {
            return false;
        }
        let Some(target) = self.reveal_target.take() else {
            return true;
        };
        if enabled && ctx.dom.has_class(&target, BLUR_TAG) {
            ctx.dom.set_style(&target, "filter", UNBLURRED);
        }
        true
    }

    pub fn has_pending_reveal(&self) -> bool {
        self.pending_reveal.is_some()
    }

    /// Drop the pending reveal without touching the page.
    pub fn shutdown<S: Scheduler>(&mut self, scheduler: &mut S) {
        self.cancel_reveal(scheduler);
    }

    fn cancel_reveal<S: Scheduler>(&mut self, scheduler: &mut S) {
        dom::cancel(scheduler, &mut self.pending_reveal);
        self.reveal_target = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::Simulation;

    fn page_with_thumbnails(count: usize) -> Simulation {
        let mut sim = Simulation::blank("/");
        let body = sim.dom().body_id();
        for _ in 0..count {
            let thumb = sim.dom_mut().append(body, "ytd-thumbnail", &[]);
            sim.dom_mut().append(thumb, "img", &[]);
        }
        sim.start();
        sim
    }

    #[test]
    fn test_apply_blurs_and_binds_once() {
        let mut sim = page_with_thumbnails(3);
        let imgs = sim.dom().select("img");
        assert_eq!(imgs.len(), 3);
        for img in &imgs {
            assert!(sim.dom().has_class(img, BLUR_TAG));
            assert_eq!(sim.dom().style(img, "filter").as_deref(), Some("blur(10px)"));
        }
        let bindings = sim.dom().binding_count_for(Listener::BlurReveal);
        assert_eq!(bindings, 6);

        sim.engine_mut().apply_pass();
        sim.engine_mut().apply_pass();
        assert_eq!(sim.dom().binding_count_for(Listener::BlurReveal), bindings);
        assert_eq!(sim.dom().select(".tg-blurred-thumbnail").len(), 3);
    }

    #[test]
    fn test_toggle_keeps_tags_and_listeners() {
        let mut sim = page_with_thumbnails(2);
        let img = sim.dom().select("img")[0];

        sim.send(r#"{"action": "toggleBlur", "enabled": false}"#);
        assert_eq!(sim.dom().style(&img, "filter").as_deref(), Some("blur(0)"));
        assert!(sim.dom().has_class(&img, BLUR_TAG));

        sim.send(r#"{"action": "toggleBlur", "enabled": true}"#);
        sim.send(r#"{"action": "toggleBlur", "enabled": false}"#);
        sim.send(r#"{"action": "toggleBlur", "enabled": true}"#);
        assert_eq!(sim.dom().style(&img, "filter").as_deref(), Some("blur(10px)"));
        assert_eq!(sim.dom().binding_count_for(Listener::BlurReveal), 4);
    }

    #[test]
    fn test_touch_reveal_after_delay() {
        let mut sim = page_with_thumbnails(1);
        let img = sim.dom().select("img")[0];

        sim.fire(img, DomEvent::TouchStart);
        sim.advance(199);
        assert_eq!(sim.dom().style(&img, "filter").as_deref(), Some("blur(10px)"));
        sim.advance(1);
        assert_eq!(sim.dom().style(&img, "filter").as_deref(), Some("blur(0)"));

        sim.fire(img, DomEvent::TouchEnd);
        assert_eq!(sim.dom().style(&img, "filter").as_deref(), Some("blur(10px)"));
    }

    #[test]
    fn test_touch_end_before_delay_keeps_blur() {
        let mut sim = page_with_thumbnails(1);
        let img = sim.dom().select("img")[0];

        sim.fire(img, DomEvent::TouchStart);
        sim.advance(100);
        sim.fire(img, DomEvent::TouchEnd);
        assert!(!sim.engine().blur_has_pending_reveal());
        sim.advance(1000);
        assert_eq!(sim.dom().style(&img, "filter").as_deref(), Some("blur(10px)"));
    }

    #[test]
    fn test_second_touch_start_replaces_pending_reveal() {
        let mut sim = page_with_thumbnails(2);
        let imgs = sim.dom().select("img");

        sim.fire(imgs[0], DomEvent::TouchStart);
        sim.advance(150);
        sim.fire(imgs[1], DomEvent::TouchStart);
        sim.advance(150);
        // The first reveal was cancelled; the second is still 50ms out.
        assert_eq!(sim.dom().style(&imgs[0], "filter").as_deref(), Some("blur(10px)"));
        assert_eq!(sim.dom().style(&imgs[1], "filter").as_deref(), Some("blur(10px)"));
        sim.advance(50);
        assert_eq!(sim.dom().style(&imgs[0], "filter").as_deref(), Some("blur(10px)"));
        assert_eq!(sim.dom().style(&imgs[1], "filter").as_deref(), Some("blur(0)"));
    }

    #[test]
    fn test_disable_cancels_pending_reveal() {
        let mut sim = page_with_thumbnails(1);
        let img = sim.dom().select("img")[0];

        sim.fire(img, DomEvent::TouchStart);
        sim.send(r#"{"action": "toggleBlur", "enabled": false}"#);
        sim.send(r#"{"action": "toggleBlur", "enabled": true}"#);
        sim.advance(500);
        assert_eq!(sim.dom().style(&img, "filter").as_deref(), Some("blur(10px)"));
    }

    #[test]
    fn test_repeated_enable_reblurs_revealed_thumbnail() {
        let mut sim = page_with_thumbnails(1);
        let img = sim.dom().select("img")[0];

        sim.fire(img, DomEvent::TouchStart);
        sim.advance(200);
        assert_eq!(sim.dom().style(&img, "filter").as_deref(), Some("blur(0)"));

        let ack = sim.send(r#"{"action": "toggleBlur", "enabled": true}"#);
        assert_eq!(ack.response, "Settings updated");
        assert_eq!(sim.dom().style(&img, "filter").as_deref(), Some("blur(10px)"));
        assert_eq!(sim.dom().binding_count_for(Listener::BlurReveal), 2);
    }
}
