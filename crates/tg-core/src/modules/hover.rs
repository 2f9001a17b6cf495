//! Hover/Touch Pause
//!
//! Pauses a playing video while the pointer (or a finger) is on it and
//! resumes it on leave, but only if this module was the one that paused it.
//! Thumbnail containers get the same treatment with their preview video
//! looked up at event time, since previews mount after the container is
//! bound.

use super::Context;
use crate::catalog::Category;
use crate::dom::{Dom, Scheduler};
use crate::selector::Selector;
use crate::types::{DomEvent, Listener};

/// Attribute marking a video with hover bindings.
pub const VIDEO_TAG: &str = "data-tg-hover-bound";
/// Attribute marking a thumbnail container with hover bindings.
pub const CONTAINER_TAG: &str = "data-tg-hover-container";
/// Node-local flag: paused by this module, resume on leave.
pub const AUTO_PAUSED: &str = "data-tg-autopaused";

const HOVER_EVENTS: [DomEvent; 4] = [
    DomEvent::PointerEnter,
    DomEvent::TouchStart,
    DomEvent::PointerLeave,
    DomEvent::TouchEnd,
];

#[derive(Debug, Default)]
pub struct HoverPause;

impl HoverPause {
    /// Bind every untagged video and thumbnail container. Returns how many
    /// nodes gained bindings.
    pub fn apply<D: Dom, S: Scheduler>(&mut self, ctx: &mut Context<'_, D, S>, enabled: bool) -> usize {
        if !enabled {
            return 0;
        }

        let videos = ctx.dom.query_all(ctx.catalog.get(Category::Video));
        let containers = ctx.dom.query_all(ctx.catalog.get(Category::ThumbnailContainer));
        bind_untagged(ctx.dom, &videos, VIDEO_TAG, Listener::HoverVideo)
            + bind_untagged(ctx.dom, &containers, CONTAINER_TAG, Listener::HoverContainer)
    }

    /// Enable: bind. Disable: detach every binding this module made and strip
    /// its tags and flags. Returns the number of nodes touched.
    pub fn set_enabled<D: Dom, S: Scheduler>(&mut self, ctx: &mut Context<'_, D, S>, enabled: bool) -> usize {
        if enabled {
            return self.apply(ctx, true);
        }

        let released = unbind_tagged(ctx.dom, VIDEO_TAG, Listener::HoverVideo)
            + unbind_tagged(ctx.dom, CONTAINER_TAG, Listener::HoverContainer);
        for node in ctx.dom.query_all(&Selector::for_attribute(AUTO_PAUSED)) {
            ctx.dom.remove_attribute(&node, AUTO_PAUSED);
        }
        log::debug!("Released hover bindings on {} node(s)", released);
        released
    }

    pub fn handle_event<D: Dom, S: Scheduler>(
        &mut self,
        ctx: &mut Context<'_, D, S>,
        node: &D::Node,
        event: DomEvent,
        listener: Listener,
        enabled: bool,
    ) {
        if !enabled {
            return;
        }

        let video = match listener {
            Listener::HoverVideo if ctx.dom.has_attribute(node, VIDEO_TAG) => Some(node.clone()),
            Listener::HoverContainer if ctx.dom.has_attribute(node, CONTAINER_TAG) => {
                ctx.dom.query_within(node, ctx.catalog.get(Category::Video))
            }
            _ => None,
        };
        let Some(video) = video else {
            return;
        };

        match event {
            DomEvent::PointerEnter | DomEvent::TouchStart => {
                if !ctx.dom.is_paused(&video) {
                    ctx.dom.pause(&video);
                    ctx.dom.set_attribute(&video, AUTO_PAUSED, "");
                }
            }
            DomEvent::PointerLeave | DomEvent::TouchEnd => {
                if ctx.dom.has_attribute(&video, AUTO_PAUSED) {
                    ctx.dom.remove_attribute(&video, AUTO_PAUSED);
                    if let Err(err) = ctx.dom.play(&video) {
                        log::warn!("Could not resume video after hover: {}", err);
                    }
                }
            }
            _ => {}
        }
    }
}

fn bind_untagged<D: Dom>(dom: &mut D, nodes: &[D::Node], tag: &str, listener: Listener) -> usize {
    let mut bound = 0;
    for node in nodes {
        if dom.has_attribute(node, tag) {
            continue;
        }
        for event in HOVER_EVENTS {
            dom.listen(node, event, listener);
        }
        dom.set_attribute(node, tag, "");
        bound += 1;
    }
    bound
}

fn unbind_tagged<D: Dom>(dom: &mut D, tag: &str, listener: Listener) -> usize {
    let tagged = dom.query_all(&Selector::for_attribute(tag));
    for node in &tagged {
        for event in HOVER_EVENTS {
            dom.unlisten(node, event, listener);
        }
        dom.remove_attribute(node, tag);
    }
    tagged.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::memory::NodeId;
    use crate::sim::Simulation;

    struct Page {
        sim: Simulation,
        video: NodeId,
        container: NodeId,
    }

    fn page() -> Page {
        let mut sim = Simulation::blank("/");
        let dom = sim.dom_mut();
        let body = dom.body_id();
        let player = dom.append(body, "div", &[("id", "movie_player")]);
        let video = dom.append(player, "video", &[]);
        let container = dom.append(body, "ytd-rich-item-renderer", &[]);
        sim.start();
        Page { sim, video, container }
    }

    #[test]
    fn test_apply_binds_each_node_once() {
        let mut page = page();
        let sim = &mut page.sim;
        assert_eq!(sim.dom().bindings_on(page.video).len(), 4 + 2); // hover + reminder media
        assert_eq!(sim.dom().binding_count_for(Listener::HoverContainer), 4);

        sim.engine_mut().apply_pass();
        sim.engine_mut().apply_pass();
        assert_eq!(sim.dom().binding_count_for(Listener::HoverVideo), 4);
        assert_eq!(sim.dom().binding_count_for(Listener::HoverContainer), 4);
        assert!(sim.dom().has_attribute(&page.video, VIDEO_TAG));
        assert!(sim.dom().has_attribute(&page.container, CONTAINER_TAG));
    }

    #[test]
    fn test_hover_pauses_playing_video_and_resumes_on_leave() {
        let mut page = page();
        let video = page.video;
        page.sim.dom_mut().user_play(video);
        page.sim.pump();

        page.sim.fire(video, DomEvent::PointerEnter);
        assert!(page.sim.dom().is_paused(&video));
        assert!(page.sim.dom().has_attribute(&video, AUTO_PAUSED));

        page.sim.fire(video, DomEvent::PointerLeave);
        assert!(!page.sim.dom().is_paused(&video));
        assert!(!page.sim.dom().has_attribute(&video, AUTO_PAUSED));
    }

    #[test]
    fn test_leave_does_not_resume_video_paused_by_user() {
        let mut page = page();
        let video = page.video;

        page.sim.fire(video, DomEvent::PointerEnter);
        assert!(!page.sim.dom().has_attribute(&video, AUTO_PAUSED));
        page.sim.fire(video, DomEvent::PointerLeave);
        assert!(page.sim.dom().is_paused(&video));
    }

    #[test]
    fn test_container_resolves_preview_mounted_later() {
        let mut page = page();
        let container = page.container;
        let preview = page.sim.dom_mut().append(container, "video", &[]);
        page.sim.dom_mut().user_play(preview);
        page.sim.pump();

        page.sim.fire(container, DomEvent::TouchStart);
        assert!(page.sim.dom().is_paused(&preview));
        page.sim.fire(container, DomEvent::TouchEnd);
        assert!(!page.sim.dom().is_paused(&preview));
    }

    #[test]
    fn test_rejected_resume_is_swallowed() {
        let mut page = page();
        let video = page.video;
        page.sim.dom_mut().user_play(video);
        page.sim.pump();
        page.sim.dom_mut().set_autoplay_blocked(true);

        page.sim.fire(video, DomEvent::PointerEnter);
        page.sim.fire(video, DomEvent::PointerLeave);
        assert!(page.sim.dom().is_paused(&video));
        assert!(!page.sim.dom().has_attribute(&video, AUTO_PAUSED));
    }

    #[test]
    fn test_disable_removes_bindings_and_enable_rebinds_cleanly() {
        let mut page = page();
        page.sim.send(r#"{"action": "togglePauseOnHover", "enabled": false}"#);

        assert_eq!(page.sim.dom().binding_count_for(Listener::HoverVideo), 0);
        assert_eq!(page.sim.dom().binding_count_for(Listener::HoverContainer), 0);
        assert!(!page.sim.dom().has_attribute(&page.video, VIDEO_TAG));
        assert!(!page.sim.dom().has_attribute(&page.container, CONTAINER_TAG));
        // Other modules keep their bindings.
        assert_eq!(page.sim.dom().binding_count_for(Listener::ReminderMedia), 2);

        page.sim.send(r#"{"action": "togglePauseOnHover", "enabled": true}"#);
        page.sim.engine_mut().apply_pass();
        assert_eq!(page.sim.dom().binding_count_for(Listener::HoverVideo), 4);
        assert_eq!(page.sim.dom().binding_count_for(Listener::HoverContainer), 4);
    }

    #[test]
    fn test_events_after_disable_do_nothing() {
        let mut page = page();
        let video = page.video;
        page.sim.dom_mut().user_play(video);
        page.sim.pump();
        page.sim.send(r#"{"action": "togglePauseOnHover", "enabled": false}"#);

        page.sim.fire(video, DomEvent::PointerEnter);
        assert!(!page.sim.dom().is_paused(&video));
    }
}
