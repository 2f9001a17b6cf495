//! Feature Modules
//!
//! Each module owns an idempotent `apply` (scan and mutate) and a
//! `set_enabled` that reverts or restores its own mutations only. Modules
//! never read the flag snapshot themselves: the engine passes the relevant
//! flag in with every call.

pub mod blur;
pub mod hover;
pub mod popup;
pub mod shorts;

use crate::catalog::SelectorCatalog;
use crate::config::EngineConfig;
use crate::dom::{Dom, Scheduler};

pub use blur::ThumbnailBlur;
pub use hover::HoverPause;
pub use popup::PopupDismissal;
pub use shorts::ShortsSuppression;

/// Borrowed view of everything a module may touch during one call.
pub struct Context<'a, D: Dom, S: Scheduler> {
    pub dom: &'a mut D,
    pub scheduler: &'a mut S,
    pub catalog: &'a SelectorCatalog,
    pub config: &'a EngineConfig,
}
