//! Watch-Time Reminder
//!
//! A three-state machine (`Idle`, `Watching`, `PromptShown`) that starts a
//! session when the page enters the watch view, prompts the viewer once the
//! configured interval has elapsed, and ends the session when they navigate
//! away, take a break, or leave the video paused past the grace window.
//!
//! Only the watch view's main player (`Category::WatchPlayer`) counts as
//! watching. Hover previews and other embedded videos never start, pause or
//! end a session.
//!
//! Every timer this module arms is kept in an `Option<TimerId>` slot and
//! claimed on expiry, so a superseded or cancelled timer that still fires is
//! ignored.

use crate::catalog::Category;
use crate::dom::{self, Dom, DomError, Scheduler};
use crate::modules::Context;
use crate::types::{DomEvent, Listener, TimerId};

/// DOM id of the reminder prompt.
pub const PROMPT_ID: &str = "tg-watch-reminder";
/// Attribute marking the main player with reminder play/pause bindings.
pub const MEDIA_TAG: &str = "data-tg-reminder-bound";

const PROMPT_CLASS: &str = "tg-reminder-prompt";

/// Reminder state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReminderState {
    /// No session
    Idle,
    /// Session running, deadline armed
    Watching,
    /// Deadline reached, prompt visible
    PromptShown,
}

/// One continuous watching interval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReminderSession {
    pub started_at_ms: u64,
    deadline: Option<TimerId>,
}

impl ReminderSession {
    pub fn has_deadline(&self) -> bool {
        self.deadline.is_some()
    }
}

/// Reminder state machine. `N` is the host's node type.
#[derive(Debug)]
pub struct WatchTimeReminder<N> {
    state: ReminderState,
    session: Option<ReminderSession>,
    grace: Option<TimerId>,
    grace_target: Option<N>,
    prompt_timeout: Option<TimerId>,
    last_location: Option<String>,
}

impl<N> Default for WatchTimeReminder<N> {
    fn default() -> Self {
        Self {
            state: ReminderState::Idle,
            session: None,
            grace: None,
            grace_target: None,
            prompt_timeout: None,
            last_location: None,
        }
    }
}

impl<N: Clone> WatchTimeReminder<N> {
    pub fn state(&self) -> ReminderState {
        self.state
    }

    pub fn session(&self) -> Option<&ReminderSession> {
        self.session.as_ref()
    }

    /// Per-pass observation: bind media listeners on the main player and
    /// react to location changes.
    pub fn observe<D, S>(&mut self, ctx: &mut Context<'_, D, S>, enabled: bool, interval_ms: u64)
    where
        D: Dom<Node = N>,
        S: Scheduler,
    {
        if !enabled {
            return;
        }

        for video in ctx.dom.query_all(ctx.catalog.get(Category::WatchPlayer)) {
            if ctx.dom.has_attribute(&video, MEDIA_TAG) {
                continue;
            }
            ctx.dom.listen(&video, DomEvent::Play, Listener::ReminderMedia);
            ctx.dom.listen(&video, DomEvent::Pause, Listener::ReminderMedia);
            ctx.dom.set_attribute(&video, MEDIA_TAG, "");
        }

        let location = ctx.dom.location();
        if self.last_location.as_deref() == Some(location.as_str()) {
            return;
        }

        if ctx.config.is_watch_location(&location) {
            log::info!("Entered watch view at {}", location);
            self.start_session(ctx, interval_ms);
        } else if self.state != ReminderState::Idle {
            log::info!("Left watch view for {}", location);
            self.end_session(ctx);
        }
        self.last_location = Some(location);
    }

    /// Play/pause on a bound player. Events from any other video are ignored.
    pub fn handle_media<D, S>(
        &mut self,
        ctx: &mut Context<'_, D, S>,
        node: &N,
        event: DomEvent,
        enabled: bool,
        interval_ms: u64,
    ) where
        D: Dom<Node = N>,
        S: Scheduler,
    {
        if !enabled || !ctx.dom.matches(node, ctx.catalog.get(Category::WatchPlayer)) {
            return;
        }

        match event {
            DomEvent::Play => {
                self.cancel_grace(ctx.scheduler);
                if self.state == ReminderState::Idle && ctx.config.is_watch_location(&ctx.dom.location()) {
                    log::info!("Playback started in watch view");
                    self.start_session(ctx, interval_ms);
                }
            }
            DomEvent::Pause => {
                // The latest pause is authoritative: it replaces any earlier grace check.
                if self.state == ReminderState::Watching {
                    dom::rearm(ctx.scheduler, &mut self.grace, ctx.config.pause_grace_ms);
                    self.grace_target = Some(node.clone());
                }
            }
            _ => {}
        }
    }

    /// Click on one of the prompt's buttons.
    pub fn handle_prompt<D, S>(&mut self, ctx: &mut Context<'_, D, S>, listener: Listener, enabled: bool, interval_ms: u64)
    where
        D: Dom<Node = N>,
        S: Scheduler,
    {
        if !enabled || self.state != ReminderState::PromptShown {
            return;
        }

        match listener {
            Listener::PromptClose | Listener::PromptContinue => {
                self.dismiss_prompt(ctx);
                self.reschedule(ctx, interval_ms);
            }
            Listener::PromptBreak => {
                log::info!("Viewer is taking a break");
                self.end_session(ctx);
                pause_active_video(ctx);
            }
            _ => {}
        }
    }

    /// Handle a timer expiry. Returns false if the timer is not ours.
    pub fn on_timer<D, S>(&mut self, ctx: &mut Context<'_, D, S>, id: TimerId, enabled: bool, interval_ms: u64) -> bool
    where
        D: Dom<Node = N>,
        S: Scheduler,
    {
        if let Some(session) = self.session.as_mut() {
            if dom::claim(&mut session.deadline, id) {
                if enabled && self.state == ReminderState::Watching {
                    self.show_prompt(ctx);
                }
                return true;
            }
        }

        if dom::claim(&mut self.grace, id) {
            let target = self.grace_target.take();
            let still_paused = target.as_ref().map_or(true, |video| ctx.dom.is_paused(video));
            if enabled && self.state == ReminderState::Watching && still_paused {
                log::info!("Video stayed paused past the grace window; ending session");
                self.end_session(ctx);
            }
            return true;
        }

        if dom::claim(&mut self.prompt_timeout, id) {
            if self.state == ReminderState::PromptShown {
                log::debug!("Reminder prompt timed out");
                self.dismiss_prompt(ctx);
                self.reschedule(ctx, interval_ms);
            }
            return true;
        }

        false
    }

    /// New interval: a running session's deadline restarts from now.
    pub fn set_interval<D, S>(&mut self, ctx: &mut Context<'_, D, S>, enabled: bool, interval_ms: u64)
    where
        D: Dom<Node = N>,
        S: Scheduler,
    {
        if !enabled || self.state != ReminderState::Watching {
            return;
        }
        if let Some(session) = self.session.as_mut() {
            dom::rearm(ctx.scheduler, &mut session.deadline, interval_ms);
            log::info!("Reminder deadline moved to {} ms from now", interval_ms);
        }
    }

    /// Disable: drop everything and go dormant. Enable: forget the last
    /// location so the current watch view (if any) starts a fresh session.
    pub fn set_enabled<D, S>(&mut self, ctx: &mut Context<'_, D, S>, enabled: bool, interval_ms: u64)
    where
        D: Dom<Node = N>,
        S: Scheduler,
    {
        self.last_location = None;
        if enabled {
            self.observe(ctx, true, interval_ms);
        } else {
            self.end_session(ctx);
        }
    }

    /// Cancel timers and remove the prompt without touching the flag.
    pub fn shutdown<D, S>(&mut self, ctx: &mut Context<'_, D, S>)
    where
        D: Dom<Node = N>,
        S: Scheduler,
    {
        self.end_session(ctx);
    }

    fn start_session<D, S>(&mut self, ctx: &mut Context<'_, D, S>, interval_ms: u64)
    where
        D: Dom<Node = N>,
        S: Scheduler,
    {
        self.end_session(ctx);
        let deadline = ctx.scheduler.set_timeout(interval_ms);
        self.session = Some(ReminderSession {
            started_at_ms: ctx.scheduler.now_ms(),
            deadline: Some(deadline),
        });
        self.state = ReminderState::Watching;
    }

    fn end_session<D, S>(&mut self, ctx: &mut Context<'_, D, S>)
    where
        D: Dom<Node = N>,
        S: Scheduler,
    {
        if let Some(mut session) = self.session.take() {
            dom::cancel(ctx.scheduler, &mut session.deadline);
        }
        self.cancel_grace(ctx.scheduler);
        self.dismiss_prompt(ctx);
        self.state = ReminderState::Idle;
    }

    fn reschedule<D, S>(&mut self, ctx: &mut Context<'_, D, S>, interval_ms: u64)
    where
        D: Dom<Node = N>,
        S: Scheduler,
    {
        match self.session.as_mut() {
            Some(session) => {
                dom::rearm(ctx.scheduler, &mut session.deadline, interval_ms);
                self.state = ReminderState::Watching;
            }
            None => self.start_session(ctx, interval_ms),
        }
    }

    fn show_prompt<D, S>(&mut self, ctx: &mut Context<'_, D, S>)
    where
        D: Dom<Node = N>,
        S: Scheduler,
    {
        self.state = ReminderState::PromptShown;
        self.cancel_grace(ctx.scheduler);
        pause_active_video(ctx);

        if ctx.dom.element_by_id(PROMPT_ID).is_none() {
            let started = self.session.as_ref().map_or(0, |s| s.started_at_ms);
            let minutes = ctx.scheduler.now_ms().saturating_sub(started) / 60_000;
            if let Err(err) = render_prompt(ctx, minutes) {
                log::warn!("Could not render reminder prompt: {}", err);
            }
        }

        dom::rearm(ctx.scheduler, &mut self.prompt_timeout, ctx.config.prompt_timeout_ms);
        log::info!("Watch-time reminder shown");
    }

    fn dismiss_prompt<D, S>(&mut self, ctx: &mut Context<'_, D, S>)
    where
        D: Dom<Node = N>,
        S: Scheduler,
    {
        dom::cancel(ctx.scheduler, &mut self.prompt_timeout);
        if let Some(prompt) = ctx.dom.element_by_id(PROMPT_ID) {
            ctx.dom.remove(&prompt);
        }
    }

    fn cancel_grace<S: Scheduler>(&mut self, scheduler: &mut S) {
        dom::cancel(scheduler, &mut self.grace);
        self.grace_target = None;
    }
}

fn pause_active_video<D: Dom, S: Scheduler>(ctx: &mut Context<'_, D, S>) {
    let videos = ctx.dom.query_all(ctx.catalog.get(Category::WatchPlayer));
    let active = videos.iter().find(|video| !ctx.dom.is_paused(video));
    if let Some(video) = active.cloned() {
        ctx.dom.pause(&video);
    }
}

fn render_prompt<D: Dom, S: Scheduler>(ctx: &mut Context<'_, D, S>, minutes: u64) -> Result<(), DomError> {
    let body = ctx.dom.body().ok_or(DomError::Detached)?;
    let dom = &mut *ctx.dom;

    let prompt = dom.create_element("div")?;
    dom.set_attribute(&prompt, "id", PROMPT_ID);
    dom.add_class(&prompt, PROMPT_CLASS);
    dom.set_attribute(&prompt, "role", "dialog");

    let close = dom.create_element("button")?;
    dom.set_attribute(&close, "data-action", "close");
    dom.set_attribute(&close, "aria-label", "Close");
    dom.set_text(&close, "\u{00d7}");
    dom.listen(&close, DomEvent::Click, Listener::PromptClose);
    dom.append_child(&prompt, &close)?;

    let message = dom.create_element("p")?;
    let text = match minutes {
        0 | 1 => "You've been watching for a while. Time for a break?".to_string(),
        n => format!("You've been watching for {} minutes. Time for a break?", n),
    };
    dom.set_text(&message, &text);
    dom.append_child(&prompt, &message)?;

    for (action, label, listener) in [
        ("continue", "Continue watching", Listener::PromptContinue),
        ("break", "Take a break", Listener::PromptBreak),
    ] {
        let button = dom.create_element("button")?;
        dom.set_attribute(&button, "data-action", action);
        dom.set_text(&button, label);
        dom.listen(&button, DomEvent::Click, listener);
        dom.append_child(&prompt, &button)?;
    }

    dom.append_child(&body, &prompt)
}
