//! Shorts Suppression
//!
//! Hides short-form shelves and navigation entries. Structural rules run
//! first, then text matching over container elements; the hidden tag keeps an
//! element matched by both from being processed twice. Disabling fully
//! reverses the module's work.

use super::Context;
use crate::catalog::{Category, SHORTS_TEXT_MARKER};
use crate::dom::{Dom, Scheduler};
use crate::selector::Selector;

/// Class marking an element this module has hidden.
pub const SHORTS_TAG: &str = "tg-shorts-hidden";
/// Body class set while the module is enabled.
pub const BODY_MARKER: &str = "tg-hide-shorts";

#[derive(Debug, Default)]
pub struct ShortsSuppression;

impl ShortsSuppression {
    /// Hide every untagged shorts match. Returns how many were hidden.
    pub fn apply<D: Dom, S: Scheduler>(&mut self, ctx: &mut Context<'_, D, S>, enabled: bool) -> usize {
        if !enabled {
            return 0;
        }

        let mut hidden = 0;
        for element in ctx.dom.query_all(ctx.catalog.get(Category::ShortsContainer)) {
            if hide(ctx.dom, &element) {
                hidden += 1;
            }
        }

        for element in ctx.dom.query_all(ctx.catalog.get(Category::ShortsTextContainer)) {
            if ctx.dom.has_class(&element, SHORTS_TAG) {
                continue;
            }
            if ctx.dom.text_content(&element).contains(SHORTS_TEXT_MARKER) && hide(ctx.dom, &element) {
                hidden += 1;
            }
        }

        hidden
    }

    /// Enable: mark the body and hide. Disable: unhide and untag everything
    /// this module hid. Returns the number of elements touched.
    pub fn set_enabled<D: Dom, S: Scheduler>(&mut self, ctx: &mut Context<'_, D, S>, enabled: bool) -> usize {
        if enabled {
            if let Some(body) = ctx.dom.body() {
                ctx.dom.add_class(&body, BODY_MARKER);
            }
            return self.apply(ctx, true);
        }

        if let Some(body) = ctx.dom.body() {
            ctx.dom.remove_class(&body, BODY_MARKER);
        }
        let hidden = ctx.dom.query_all(&Selector::for_class(SHORTS_TAG));
        for element in &hidden {
            ctx.dom.set_style(element, "display", "");
            ctx.dom.remove_class(element, SHORTS_TAG);
        }
        log::debug!("Restored {} shorts element(s)", hidden.len());
        hidden.len()
    }
}

fn hide<D: Dom>(dom: &mut D, element: &D::Node) -> bool {
    if dom.has_class(element, SHORTS_TAG) {
        return false;
    }
    dom.set_style(element, "display", "none");
    dom.add_class(element, SHORTS_TAG);
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::memory::NodeId;
    use crate::sim::Simulation;

    struct HomePage {
        sim: Simulation,
        shelf: NodeId,
        shorts_row: NodeId,
        text_row: NodeId,
        plain_row: NodeId,
        guide_link: NodeId,
    }

    fn home_page() -> HomePage {
        let mut sim = Simulation::blank("/");
        let dom = sim.dom_mut();
        let body = dom.body_id();
        let browse = dom.append(body, "ytd-browse", &[("page-subtype", "home")]);
        let shelf = dom.append(browse, "ytd-rich-section-renderer", &[("is-shorts-shelf", "")]);
        let shorts_row = dom.append(browse, "ytd-rich-grid-row", &[]);
        dom.append(shorts_row, "a", &[("href", "/shorts/xyz")]);
        let text_row = dom.append(browse, "ytd-rich-grid-row", &[]);
        let title = dom.append(text_row, "span", &[]);
        dom.set_node_text(title, "Shorts");
        let plain_row = dom.append(browse, "ytd-rich-grid-row", &[]);
        dom.append(plain_row, "a", &[("href", "/watch?v=1")]);
        let guide = dom.append(body, "ytd-guide-entry-renderer", &[]);
        let guide_link = dom.append(guide, "a", &[("title", "Shorts")]);
        sim.start();
        HomePage {
            sim,
            shelf,
            shorts_row,
            text_row,
            plain_row,
            guide_link,
        }
    }

    fn is_hidden(sim: &Simulation, node: NodeId) -> bool {
        sim.dom().has_class(&node, SHORTS_TAG) && sim.dom().style(&node, "display").as_deref() == Some("none")
    }

    #[test]
    fn test_hides_structural_and_text_matches() {
        let page = home_page();
        assert!(is_hidden(&page.sim, page.shelf));
        assert!(is_hidden(&page.sim, page.shorts_row));
        assert!(is_hidden(&page.sim, page.text_row));
        assert!(is_hidden(&page.sim, page.guide_link));
        assert!(!is_hidden(&page.sim, page.plain_row));
        assert_eq!(page.sim.dom().select(".tg-shorts-hidden").len(), 4);
    }

    #[test]
    fn test_apply_is_idempotent() {
        let mut page = home_page();
        let before = page.sim.dom().outline();
        page.sim.engine_mut().apply_pass();
        page.sim.engine_mut().apply_pass();
        assert_eq!(page.sim.dom().outline(), before);
    }

    #[test]
    fn test_disable_restores_everything() {
        let mut page = home_page();
        page.sim.send(r#"{"action": "toggleShorts", "enabled": false}"#);

        assert!(page.sim.dom().select(".tg-shorts-hidden").is_empty());
        for node in [page.shelf, page.shorts_row, page.text_row, page.guide_link] {
            assert_eq!(page.sim.dom().style(&node, "display"), None);
        }
        let body = page.sim.dom().body_id();
        assert!(!page.sim.dom().has_class(&body, BODY_MARKER));

        // Disabled: passes leave the page alone.
        page.sim.advance(3000);
        assert!(page.sim.dom().select(".tg-shorts-hidden").is_empty());
    }

    #[test]
    fn test_enable_then_disable_round_trip() {
        let mut page = home_page();
        page.sim.send(r#"{"action": "toggleShorts", "enabled": false}"#);
        let clean = page.sim.dom().outline();

        page.sim.send(r#"{"action": "toggleShorts", "enabled": true}"#);
        let body = page.sim.dom().body_id();
        assert!(page.sim.dom().has_class(&body, BODY_MARKER));
        assert!(is_hidden(&page.sim, page.text_row));

        page.sim.send(r#"{"action": "toggleShorts", "enabled": false}"#);
        assert_eq!(page.sim.dom().outline(), clean);
    }

    #[test]
    fn test_new_rows_are_hidden_on_mutation() {
        let mut page = home_page();
        let browse = page.sim.dom().select("ytd-browse")[0];
        let row = page.sim.dom_mut().append(browse, "ytd-reel-shelf-renderer", &[]);
        page.sim.pump();
        assert!(is_hidden(&page.sim, row));
    }
}
