//! Popup Dismissal
//!
//! Reacts to its own narrow observer: when a backdrop or popup dialog is
//! inserted, removes it along with any high-stacked overlay and unlocks page
//! scrolling. Nothing is tagged; every step acts only on current matches.

use super::Context;
use crate::catalog::Category;
use crate::dom::{Dom, Scheduler};

#[derive(Debug, Default)]
pub struct PopupDismissal;

impl PopupDismissal {
    /// Does this batch of inserted nodes bring in a popup?
    pub fn is_trigger<D: Dom, S: Scheduler>(&self, ctx: &Context<'_, D, S>, added: &[D::Node]) -> bool {
        let backdrop = ctx.catalog.get(Category::PopupBackdrop);
        let dialog = ctx.catalog.get(Category::PopupDialog);
        added
            .iter()
            .any(|node| ctx.dom.contains_match(node, backdrop) || ctx.dom.contains_match(node, dialog))
    }

    /// Remove popups and blocking overlays, then restore scrolling.
    /// Returns the number of removed elements.
    pub fn on_trigger<D: Dom, S: Scheduler>(&mut self, ctx: &mut Context<'_, D, S>, enabled: bool) -> usize {
        if !enabled {
            return 0;
        }

        let mut removed = 0;
        for category in [Category::PopupBackdrop, Category::PopupDialog] {
            for node in ctx.dom.query_all(ctx.catalog.get(category)) {
                ctx.dom.remove(&node);
                removed += 1;
            }
        }

        let threshold = ctx.config.popup_z_index_threshold;
        for node in ctx.dom.query_all(ctx.catalog.get(Category::Overlay)) {
            if ctx.dom.z_index(&node).is_some_and(|z| z > threshold) {
                ctx.dom.remove(&node);
                removed += 1;
            }
        }

        for element in [ctx.dom.document_element(), ctx.dom.body()].into_iter().flatten() {
            ctx.dom.set_style(&element, "overflow", "");
        }

        if removed > 0 {
            log::info!("Dismissed {} popup element(s)", removed);
        }
        removed
    }
}
